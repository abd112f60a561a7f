//! C7: the SQL execution engine. Ties `k9db-storage`, `k9db-planner`,
//! `k9db-gdpr` and `k9db-compliance` together behind one [`Database`] handle
//! and a per-connection [`Session`], the way `spacetimedb-core`'s
//! `Database`/transaction types sit on top of its own datastore crates.

mod adapters;
mod config;
mod database;
mod ddl;
mod error;
mod expr;
mod explain;
mod prepared;
mod session;

pub use config::Config;
pub use database::Database;
pub use error::{ErrorKind, SqlError};
pub use prepared::{PreparedStatement, PreparedStatementCache};
pub use session::{Session, StatementResult};
