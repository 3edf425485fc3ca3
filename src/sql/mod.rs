//! Safe SQL builder: identifiers from config only, values as parameters.

mod builder;
pub mod dialect;
pub mod value;
pub use builder::*;
pub use dialect::{DatabaseProvider, PostgresDialect, SqlDialect, SqlServerDialect, SqliteDialect};
pub use value::{bind_all, row_to_json, AnyQuery, SqlValue};
