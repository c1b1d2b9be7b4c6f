//! Capability traits for the interceptable resource kinds.
//!
//! The instrumentation layer depends only on these operation surfaces, not
//! on any particular backend protocol. A backend makes itself instrumentable
//! by implementing the traits (the `pg` module does this for
//! tokio-postgres); the `instrument` module then provides wrappers that
//! implement the same traits over any implementation, so an instrumented
//! resource can be used wherever the real one can.
//!
//! Statement-like resources take `&self` and are expected to synchronize
//! internal state themselves: a wrapper shared across concurrent callers
//! must not race on batch accumulation. Result-set cursors take `&mut self`;
//! forward-only consumption is inherently exclusive.

use crate::error::TapResult;
use crate::value::ParamValue;

/// A connection-like resource: produces statement-like and
/// prepared-statement-like resources and exposes lifecycle operations.
pub trait Connection: Send + Sync {
    /// Statement type produced by this connection.
    type Stmt: Statement;
    /// Prepared-statement type produced by this connection.
    type Prepared: PreparedStatement;

    /// Create a statement for executing ad-hoc SQL.
    fn create_statement(&self) -> impl Future<Output = TapResult<Self::Stmt>> + Send;

    /// Prepare a parameterized statement.
    fn prepare(&self, sql: &str) -> impl Future<Output = TapResult<Self::Prepared>> + Send;

    /// Close the connection.
    fn close(&self) -> impl Future<Output = TapResult<()>> + Send;

    /// Whether the connection is closed.
    fn is_closed(&self) -> bool;
}

/// A statement-like resource: executes SQL strings and accumulates batches.
pub trait Statement: Send + Sync {
    /// Result-set type produced by queries.
    type Rows: ResultSet;
    /// Connection type this statement belongs to.
    type Conn: Connection;

    /// Execute a query and return its rows.
    fn execute_query(&self, sql: &str) -> impl Future<Output = TapResult<Self::Rows>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute_update(&self, sql: &str) -> impl Future<Output = TapResult<u64>> + Send;

    /// Execute arbitrary SQL; returns whether it produced rows.
    fn execute(&self, sql: &str) -> impl Future<Output = TapResult<bool>> + Send;

    /// Append a query to the pending batch.
    fn add_batch(&self, sql: &str) -> impl Future<Output = TapResult<()>> + Send;

    /// Discard the pending batch.
    fn clear_batch(&self) -> impl Future<Output = TapResult<()>> + Send;

    /// Execute the pending batch and return per-entry affected-row counts.
    /// The pending batch is consumed whether execution succeeds or fails.
    fn execute_batch(&self) -> impl Future<Output = TapResult<Vec<u64>>> + Send;

    /// The connection this statement belongs to.
    fn connection(&self) -> TapResult<Self::Conn>;

    /// Close the statement.
    fn close(&self) -> impl Future<Output = TapResult<()>> + Send;
}

/// A prepared-statement-like resource: a fixed query with bindable
/// parameters, executed one parameter set at a time or as a batch.
pub trait PreparedStatement: Send + Sync {
    /// Result-set type produced by queries.
    type Rows: ResultSet;

    /// The SQL this statement was prepared with.
    fn sql(&self) -> &str;

    /// Bind a parameter value. Indices are 1-based, matching `$n`
    /// placeholder numbering.
    fn bind(&self, index: usize, value: ParamValue) -> TapResult<()>;

    /// Clear all bound parameter values.
    fn clear_bindings(&self) -> TapResult<()>;

    /// Execute with the current bindings and return rows.
    fn execute_query(&self) -> impl Future<Output = TapResult<Self::Rows>> + Send;

    /// Execute with the current bindings and return the affected-row count.
    fn execute_update(&self) -> impl Future<Output = TapResult<u64>> + Send;

    /// Append the current parameter set to the pending batch.
    fn add_batch(&self) -> impl Future<Output = TapResult<()>> + Send;

    /// Discard the pending batch.
    fn clear_batch(&self) -> impl Future<Output = TapResult<()>> + Send;

    /// Execute the pending batch and return per-entry affected-row counts.
    /// The pending batch is consumed whether execution succeeds or fails.
    fn execute_batch(&self) -> impl Future<Output = TapResult<Vec<u64>>> + Send;

    /// Close the statement.
    fn close(&self) -> impl Future<Output = TapResult<()>> + Send;
}

/// A result-set-like resource: a forward-only cursor over query results.
///
/// Unlike the other resource kinds, a cursor is exclusively owned (`Send`
/// without `Sync`): forward-only consumption has a single reader.
pub trait ResultSet: Send {
    /// Move to the next row. Returns `false` once the rows are exhausted.
    fn advance(&mut self) -> impl Future<Output = TapResult<bool>> + Send;

    /// Read a column of the current row. Indices are 0-based.
    fn column(&self, index: usize) -> TapResult<ParamValue>;

    /// Close the result set and release the underlying rows.
    fn close(&mut self) -> impl Future<Output = TapResult<()>> + Send;
}
