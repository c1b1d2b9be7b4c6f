//! Per-call execution metadata delivered to listeners.

use crate::error::TapError;
use crate::value::ParamValue;
use std::fmt;
use std::time::Duration;

/// The interceptable resource categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Connection-like resource
    Connection,
    /// Statement-like resource
    Statement,
    /// Prepared-statement-like resource
    PreparedStatement,
    /// Result-set-like resource
    ResultSet,
}

impl ResourceKind {
    /// Short name, used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Connection => "connection",
            ResourceKind::Statement => "statement",
            ResourceKind::PreparedStatement => "prepared",
            ResourceKind::ResultSet => "result-set",
        }
    }
}

/// One query submitted to the backend: opaque text plus its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    /// The query text, exactly as passed by the caller.
    pub query: String,
    /// Bound parameter values, in bind order. Empty when none were bound.
    pub params: Vec<ParamValue>,
}

impl QueryRecord {
    /// A query record with no bound values.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }

    /// A query record with bound values.
    pub fn with_params(query: impl Into<String>, params: Vec<ParamValue>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }
}

/// How an intercepted call ended.
///
/// Built before listener notification so the propagate-after-record step is
/// an explicit branch: on failure the record borrows the exact error the
/// delegate raised, and that same error value is then returned to the
/// caller.
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    /// The delegate call returned normally.
    Success,
    /// The delegate call failed with this error.
    Failure(&'a TapError),
}

impl CallOutcome<'_> {
    /// Whether the delegate call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }

    /// The delegate error, if the call failed.
    pub fn error(&self) -> Option<&TapError> {
        match *self {
            CallOutcome::Success => None,
            CallOutcome::Failure(err) => Some(err),
        }
    }
}

impl fmt::Display for CallOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Success => write!(f, "ok"),
            CallOutcome::Failure(err) => write!(f, "error: {err}"),
        }
    }
}

/// Metadata for one intercepted call.
///
/// Emitted exactly once per call, after the delegate returns or fails and
/// before the wrapper returns to its caller. Borrowed fields live for the
/// duration of the notification only; listeners that retain data must copy
/// it out.
#[derive(Debug)]
pub struct CallRecord<'a> {
    /// Logical data-source name, shared by every wrapper in the chain.
    pub data_source: &'a str,
    /// The kind of resource the call was made on.
    pub kind: ResourceKind,
    /// Name of the intercepted method.
    pub method: &'static str,
    /// Arguments exactly as passed by the caller.
    pub method_args: &'a [ParamValue],
    /// Queries this call submitted: empty for lifecycle/metadata calls, one
    /// entry for single-query execution, the accumulated batch for
    /// execute-batch.
    pub queries: &'a [QueryRecord],
    /// Call outcome; failures borrow the delegate's error.
    pub outcome: CallOutcome<'a>,
    /// Wall-clock time spent in the delegate call.
    pub elapsed: Duration,
}

impl CallRecord<'_> {
    /// Whether the delegate call succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Whether this call submitted any queries.
    pub fn has_queries(&self) -> bool {
        !self.queries.is_empty()
    }
}
