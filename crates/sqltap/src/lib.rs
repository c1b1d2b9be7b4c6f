//! # sqltap
//!
//! Transparent call-level instrumentation for SQL database clients.
//!
//! sqltap sits between application code and a database client and records
//! every call made against connections, statements, prepared statements, and
//! result sets — without changing what the caller observes. Return values,
//! errors, and side effects are exactly those of the wrapped resource;
//! recording and notification are strictly additive.
//!
//! ## Features
//!
//! - **Transparent wrappers**: an instrumented resource implements the same
//!   capability trait as the resource it wraps, so it drops into existing
//!   code
//! - **Transitive instrumentation**: sub-resources (statements from a
//!   connection, result sets from a statement) are wrapped automatically
//!   with the parent's data-source name and listeners
//! - **Batch tracking**: batched queries are accumulated per statement and
//!   reported as one record when the batch executes
//! - **Pluggable listeners**: per-call records pushed to any number of
//!   observers, with failures isolated per observer
//! - **Query counting**: per-data-source select/insert/update/delete tallies
//!   scoped to a unit of work via a task-local registry
//! - **Postgres backend**: capability-trait implementations over
//!   tokio-postgres in the `pg` module
//!
//! ## Example
//!
//! ```ignore
//! use sqltap::{wrap, Connection, LoggingListener, QueryCountRegistry, Statement};
//! use sqltap::pg::PgConnection;
//! use std::sync::Arc;
//!
//! let conn = PgConnection::connect("postgres://localhost/app").await?;
//! let conn = wrap(conn, "main", vec![Arc::new(LoggingListener::new())]);
//!
//! let registry = Arc::new(QueryCountRegistry::new());
//! QueryCountRegistry::scope(registry.clone(), async {
//!     let stmt = conn.create_statement().await?;
//!     stmt.execute_update("UPDATE users SET active = true").await?;
//!     Ok::<_, sqltap::TapError>(())
//! })
//! .await?;
//!
//! println!("{}", registry.report());
//! registry.clear();
//! ```

pub mod count;
pub mod error;
pub mod instrument;
pub mod listener;
pub mod pg;
pub mod record;
pub mod resource;
pub mod sql;
pub mod value;

#[cfg(feature = "tracing")]
mod tracing_listener;

pub use count::{QueryCount, QueryCountRegistry, QueryCountSnapshot};
pub use error::{TapError, TapResult};
pub use instrument::{
    InstrumentedConnection, InstrumentedPrepared, InstrumentedResultSet, InstrumentedStatement,
    wrap,
};
pub use listener::{CallListener, CompositeListener, LoggingListener};
pub use record::{CallOutcome, CallRecord, QueryRecord, ResourceKind};
pub use resource::{Connection, PreparedStatement, ResultSet, Statement};
pub use sql::StatementKind;
pub use value::ParamValue;

#[cfg(feature = "tracing")]
pub use tracing_listener::TracingListener;
