pub mod source;

pub use source::{read_sql_script, PgRowSource, RelationalSource};
