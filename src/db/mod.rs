pub mod database;
pub mod db_pool;
pub mod insights;
pub mod introspect;
pub mod result;
pub mod rows;
pub mod sample;
pub mod sandbox;
pub mod schema;
pub mod validator;

pub use database::{Access, Database, DatabaseError};
pub use introspect::{IntrospectionError, Introspector};
pub use result::{QueryErrorKind, QueryResult, QueryStatus, ResultColumn};
pub use sandbox::Sandbox;
pub use schema::{ColumnInfo, DataType, Row, SchemaDescription, TableInfo};
