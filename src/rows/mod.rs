//! Row-table storage: paths, rows, the table contract and the in-memory
//! table.

mod memory;
mod path;
mod row;
mod table;

pub use memory::{MemoryTable, ReadTransaction, WriteTransaction};
pub use path::Path;
pub use row::{Row, RowContent};
pub use table::{Database, RowIter, RowRead, RowTransaction, RowWrite};
