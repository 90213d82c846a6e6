pub mod result_set;
pub mod row;

pub use result_set::SqlResult;
pub use row::Row;
