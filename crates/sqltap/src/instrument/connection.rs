use super::{InstrumentedPrepared, InstrumentedStatement, Instrumentation};
use crate::error::TapResult;
use crate::listener::CallListener;
use crate::record::ResourceKind;
use crate::resource::Connection;
use crate::value::ParamValue;
use std::sync::Arc;

/// An instrumented connection wrapping a real connection-like resource.
///
/// Implements [`Connection`] itself, so it can be used wherever the wrapped
/// connection can. Statements and prepared statements it produces are
/// instrumented with the same data-source name and listener set.
pub struct InstrumentedConnection<C: Connection> {
    inner: C,
    core: Arc<Instrumentation>,
}

impl<C: Connection> InstrumentedConnection<C> {
    /// Wrap `inner` under the given data-source name, with no listeners.
    pub fn new(inner: C, data_source: impl Into<String>) -> Self {
        Self {
            inner,
            core: Arc::new(Instrumentation::new(data_source.into())),
        }
    }

    pub(crate) fn from_parts(inner: C, core: Arc<Instrumentation>) -> Self {
        Self { inner, core }
    }

    /// Register a listener. Listeners are notified in registration order.
    pub fn with_listener<L: CallListener + 'static>(self, listener: L) -> Self {
        self.with_listener_arc(Arc::new(listener))
    }

    /// Register an Arc-wrapped listener.
    pub fn with_listener_arc(mut self, listener: Arc<dyn CallListener>) -> Self {
        Arc::make_mut(&mut self.core).push_listener(listener);
        self
    }

    /// The logical data-source name assigned to this wrapper chain.
    pub fn data_source(&self) -> &str {
        self.core.data_source()
    }

    /// The wrapped connection. Bypasses recording.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap to the real connection, consuming the wrapper.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for InstrumentedConnection<C> {
    type Stmt = InstrumentedStatement<C::Stmt>;
    type Prepared = InstrumentedPrepared<C::Prepared>;

    async fn create_statement(&self) -> TapResult<Self::Stmt> {
        let stmt = self
            .core
            .dispatch(
                ResourceKind::Connection,
                "create_statement",
                Vec::new(),
                Vec::new(),
                self.inner.create_statement(),
            )
            .await?;
        Ok(InstrumentedStatement::from_parts(stmt, self.core.clone()))
    }

    async fn prepare(&self, sql: &str) -> TapResult<Self::Prepared> {
        let prepared = self
            .core
            .dispatch(
                ResourceKind::Connection,
                "prepare",
                vec![ParamValue::from(sql)],
                Vec::new(),
                self.inner.prepare(sql),
            )
            .await?;
        Ok(InstrumentedPrepared::from_parts(prepared, self.core.clone()))
    }

    async fn close(&self) -> TapResult<()> {
        self.core
            .dispatch(
                ResourceKind::Connection,
                "close",
                Vec::new(),
                Vec::new(),
                self.inner.close(),
            )
            .await
    }

    fn is_closed(&self) -> bool {
        // Identity/delegation operation: forwarded without a record.
        self.inner.is_closed()
    }
}
