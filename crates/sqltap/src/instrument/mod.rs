//! The interception engine: wrappers that forward every call to the real
//! resource, record it, and notify listeners.
//!
//! Wrapping starts at a connection and composes transitively: statements
//! created by an instrumented connection, result sets produced by an
//! instrumented statement, and the owning connection reachable from a
//! statement are all wrapped with the same data-source name and listener
//! set, so an entire call graph rooted at one data source stays
//! instrumented without per-depth special cases.
//!
//! Recording is strictly additive: the wrapped call's return value or error
//! reaches the caller exactly as the real resource produced it, after the
//! call's [`CallRecord`] has been dispatched.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqltap::{wrap, Connection, LoggingListener};
//! use std::sync::Arc;
//!
//! let conn = wrap(pg_conn, "main", vec![Arc::new(LoggingListener::new())]);
//! let stmt = conn.create_statement().await?;      // instrumented
//! let rows = stmt.execute_query("SELECT 1").await?; // instrumented too
//! ```

mod batch;
mod connection;
mod prepared;
mod result_set;
mod statement;


pub use connection::InstrumentedConnection;
pub use prepared::InstrumentedPrepared;
pub use result_set::InstrumentedResultSet;
pub use statement::InstrumentedStatement;

pub(crate) use batch::BatchState;

use crate::count::QueryCountRegistry;
use crate::error::TapResult;
use crate::listener::{CallListener, report_listener_failure};
use crate::record::{CallOutcome, CallRecord, QueryRecord, ResourceKind};
use crate::resource::Connection;
use crate::value::ParamValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wrap a connection-like resource for instrumentation.
///
/// Every call on the returned connection — and on every sub-resource
/// obtained from it — is forwarded unchanged, recorded, and delivered to
/// `listeners` in registration order under the given data-source name.
pub fn wrap<C: Connection>(
    connection: C,
    data_source: impl Into<String>,
    listeners: Vec<Arc<dyn CallListener>>,
) -> InstrumentedConnection<C> {
    let mut wrapped = InstrumentedConnection::new(connection, data_source);
    for listener in listeners {
        wrapped = wrapped.with_listener_arc(listener);
    }
    wrapped
}

/// Shared context of one wrapper chain: the data-source name assigned at the
/// root and the listeners registered at construction time. Cloned by `Arc`
/// into every derived wrapper, never mutated after sub-wrapping starts.
#[derive(Clone)]
pub(crate) struct Instrumentation {
    data_source: String,
    listeners: Vec<Arc<dyn CallListener>>,
}

impl Instrumentation {
    pub(crate) fn new(data_source: String) -> Self {
        Self {
            data_source,
            listeners: Vec::new(),
        }
    }

    pub(crate) fn data_source(&self) -> &str {
        &self.data_source
    }

    pub(crate) fn push_listener(&mut self, listener: Arc<dyn CallListener>) {
        self.listeners.push(listener);
    }

    /// Run the delegate call, then build and dispatch the call's record.
    ///
    /// The record is dispatched after the call completes and before the
    /// result is handed back, on success and failure alike.
    pub(crate) async fn dispatch<T>(
        &self,
        kind: ResourceKind,
        method: &'static str,
        method_args: Vec<ParamValue>,
        queries: Vec<QueryRecord>,
        call: impl Future<Output = TapResult<T>>,
    ) -> TapResult<T> {
        let started = Instant::now();
        let result = call.await;
        self.record(kind, method, &method_args, &queries, &result, started.elapsed());
        result
    }

    /// Synchronous variant of [`Instrumentation::dispatch`].
    pub(crate) fn dispatch_sync<T>(
        &self,
        kind: ResourceKind,
        method: &'static str,
        method_args: Vec<ParamValue>,
        queries: Vec<QueryRecord>,
        call: impl FnOnce() -> TapResult<T>,
    ) -> TapResult<T> {
        let started = Instant::now();
        let result = call();
        self.record(kind, method, &method_args, &queries, &result, started.elapsed());
        result
    }

    fn record<T>(
        &self,
        kind: ResourceKind,
        method: &'static str,
        method_args: &[ParamValue],
        queries: &[QueryRecord],
        result: &TapResult<T>,
        elapsed: Duration,
    ) {
        let outcome = match result {
            Ok(_) => CallOutcome::Success,
            Err(err) => CallOutcome::Failure(err),
        };
        let record = CallRecord {
            data_source: &self.data_source,
            kind,
            method,
            method_args,
            queries,
            outcome,
            elapsed,
        };

        for listener in &self.listeners {
            if let Err(err) = listener.after_call(&record) {
                report_listener_failure(record.method, &err);
            }
        }

        if let Some(registry) = QueryCountRegistry::current() {
            registry.record(&self.data_source, queries, record.is_success(), elapsed);
        }
    }
}
