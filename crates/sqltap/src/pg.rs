//! tokio-postgres implementations of the resource capability traits.
//!
//! This is the concrete backend: wrap a [`PgConnection`] with
//! [`wrap`](crate::wrap) and the whole chain — statements, prepared
//! statements, result sets — runs against PostgreSQL while being
//! instrumented.
//!
//! Captured [`ParamValue`]s are bridged back to wire parameters through a
//! [`ToSql`] implementation, and result-set columns are read back into
//! `ParamValue`s for the common scalar types.

use crate::error::{TapError, TapResult};
use crate::resource::{Connection, PreparedStatement, ResultSet, Statement};
use crate::value::ParamValue;
use bytes::BytesMut;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Row, SimpleQueryMessage};

type BoxRowStream = Pin<Box<dyn Stream<Item = Result<Row, tokio_postgres::Error>> + Send>>;

/// A PostgreSQL connection.
///
/// Cheap to clone into sub-resources; the underlying client is shared. The
/// wire connection closes when the last handle is dropped — `close` marks
/// nothing on the server, it exists to satisfy the lifecycle surface.
#[derive(Clone)]
pub struct PgConnection {
    client: Arc<tokio_postgres::Client>,
}

impl PgConnection {
    /// Wrap an already-established client.
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Wrap a shared client.
    pub fn from_shared(client: Arc<tokio_postgres::Client>) -> Self {
        Self { client }
    }

    /// Connect to `url` and spawn the connection driver task.
    pub async fn connect(url: &str) -> TapResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, tokio_postgres::NoTls)
            .await
            .map_err(TapError::from_db_error)?;
        tokio::spawn(async move {
            let _ = connection.await;
        });
        Ok(Self::new(client))
    }
}

impl Connection for PgConnection {
    type Stmt = PgStatement;
    type Prepared = PgPrepared;

    async fn create_statement(&self) -> TapResult<Self::Stmt> {
        Ok(PgStatement {
            client: self.client.clone(),
            batch: Mutex::new(Vec::new()),
        })
    }

    async fn prepare(&self, sql: &str) -> TapResult<Self::Prepared> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(TapError::from_db_error)?;
        Ok(PgPrepared {
            client: self.client.clone(),
            statement,
            sql: sql.to_string(),
            bindings: Mutex::new(Vec::new()),
            batch: Mutex::new(Vec::new()),
        })
    }

    async fn close(&self) -> TapResult<()> {
        // Drop-driven: the connection terminates when all handles are gone.
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// A statement executing ad-hoc SQL against a [`PgConnection`].
pub struct PgStatement {
    client: Arc<tokio_postgres::Client>,
    batch: Mutex<Vec<String>>,
}

impl Statement for PgStatement {
    type Rows = PgResultSet;
    type Conn = PgConnection;

    async fn execute_query(&self, sql: &str) -> TapResult<Self::Rows> {
        let params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let stream = self
            .client
            .query_raw(sql, params)
            .await
            .map_err(TapError::from_db_error)?;
        Ok(PgResultSet::from_stream(stream))
    }

    async fn execute_update(&self, sql: &str) -> TapResult<u64> {
        self.client
            .execute(sql, &[])
            .await
            .map_err(TapError::from_db_error)
    }

    async fn execute(&self, sql: &str) -> TapResult<bool> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(TapError::from_db_error)?;
        Ok(messages
            .iter()
            .any(|m| matches!(m, SimpleQueryMessage::Row(_))))
    }

    async fn add_batch(&self, sql: &str) -> TapResult<()> {
        self.batch.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn clear_batch(&self) -> TapResult<()> {
        self.batch.lock().unwrap().clear();
        Ok(())
    }

    async fn execute_batch(&self) -> TapResult<Vec<u64>> {
        // Consume the batch up front so a failing entry does not leave
        // stale queries behind for the next accumulation.
        let pending: Vec<String> = std::mem::take(&mut *self.batch.lock().unwrap());
        let mut results = Vec::with_capacity(pending.len());
        for sql in &pending {
            let affected = self
                .client
                .execute(sql.as_str(), &[])
                .await
                .map_err(TapError::from_db_error)?;
            results.push(affected);
        }
        Ok(results)
    }

    fn connection(&self) -> TapResult<Self::Conn> {
        Ok(PgConnection {
            client: self.client.clone(),
        })
    }

    async fn close(&self) -> TapResult<()> {
        Ok(())
    }
}

/// A server-side prepared statement with client-tracked bindings.
pub struct PgPrepared {
    client: Arc<tokio_postgres::Client>,
    statement: tokio_postgres::Statement,
    sql: String,
    bindings: Mutex<Vec<ParamValue>>,
    batch: Mutex<Vec<Vec<ParamValue>>>,
}

impl PgPrepared {
    fn bindings_snapshot(&self) -> Vec<ParamValue> {
        self.bindings.lock().unwrap().clone()
    }
}

impl PreparedStatement for PgPrepared {
    type Rows = PgResultSet;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&self, index: usize, value: ParamValue) -> TapResult<()> {
        if index == 0 {
            return Err(TapError::invalid_index(
                "bind indices are 1-based ($1 is index 1)",
            ));
        }
        if index > self.statement.params().len() {
            return Err(TapError::invalid_index(format!(
                "statement has {} parameters, no ${index}",
                self.statement.params().len(),
            )));
        }
        let mut bindings = self.bindings.lock().unwrap();
        if bindings.len() < index {
            bindings.resize(index, ParamValue::Null);
        }
        bindings[index - 1] = value;
        Ok(())
    }

    fn clear_bindings(&self) -> TapResult<()> {
        self.bindings.lock().unwrap().clear();
        Ok(())
    }

    async fn execute_query(&self) -> TapResult<Self::Rows> {
        let bindings = self.bindings_snapshot();
        let params: Vec<&(dyn ToSql + Sync)> =
            bindings.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let stream = self
            .client
            .query_raw(&self.statement, params)
            .await
            .map_err(TapError::from_db_error)?;
        Ok(PgResultSet::from_stream(stream))
    }

    async fn execute_update(&self) -> TapResult<u64> {
        let bindings = self.bindings_snapshot();
        let params: Vec<&(dyn ToSql + Sync)> =
            bindings.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        self.client
            .execute(&self.statement, &params)
            .await
            .map_err(TapError::from_db_error)
    }

    async fn add_batch(&self) -> TapResult<()> {
        let snapshot = self.bindings_snapshot();
        self.batch.lock().unwrap().push(snapshot);
        Ok(())
    }

    async fn clear_batch(&self) -> TapResult<()> {
        self.batch.lock().unwrap().clear();
        Ok(())
    }

    async fn execute_batch(&self) -> TapResult<Vec<u64>> {
        let pending: Vec<Vec<ParamValue>> =
            std::mem::take(&mut *self.batch.lock().unwrap());
        let mut results = Vec::with_capacity(pending.len());
        for set in &pending {
            let params: Vec<&(dyn ToSql + Sync)> =
                set.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            let affected = self
                .client
                .execute(&self.statement, &params)
                .await
                .map_err(TapError::from_db_error)?;
            results.push(affected);
        }
        Ok(results)
    }

    async fn close(&self) -> TapResult<()> {
        Ok(())
    }
}

/// Forward-only cursor over a row stream.
pub struct PgResultSet {
    stream: Option<BoxRowStream>,
    current: Option<Row>,
}

impl PgResultSet {
    pub(crate) fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
    {
        Self {
            stream: Some(Box::pin(stream)),
            current: None,
        }
    }

    /// The current row, if the cursor is positioned on one.
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }
}

impl ResultSet for PgResultSet {
    async fn advance(&mut self) -> TapResult<bool> {
        let Some(stream) = self.stream.as_mut() else {
            self.current = None;
            return Ok(false);
        };
        match std::future::poll_fn(|cx| stream.as_mut().poll_next(cx)).await {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(err)) => {
                self.stream = None;
                self.current = None;
                Err(TapError::from_db_error(err))
            }
            None => {
                self.stream = None;
                self.current = None;
                Ok(false)
            }
        }
    }

    fn column(&self, index: usize) -> TapResult<ParamValue> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| TapError::Other("cursor is not on a row".to_string()))?;
        let column = row
            .columns()
            .get(index)
            .ok_or_else(|| TapError::invalid_index(format!("no column {index}")))?;
        read_column(row, index, column.type_())
    }

    async fn close(&mut self) -> TapResult<()> {
        self.stream = None;
        self.current = None;
        Ok(())
    }
}

fn read_column(row: &Row, index: usize, ty: &Type) -> TapResult<ParamValue> {
    fn get<'a, T>(row: &'a Row, index: usize) -> TapResult<Option<T>>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(index)
            .map_err(TapError::from_db_error)
    }

    if *ty == Type::BOOL {
        Ok(get::<bool>(row, index)?.map_or(ParamValue::Null, ParamValue::Bool))
    } else if *ty == Type::INT2 {
        Ok(get::<i16>(row, index)?.map_or(ParamValue::Null, |v| ParamValue::Int(v.into())))
    } else if *ty == Type::INT4 {
        Ok(get::<i32>(row, index)?.map_or(ParamValue::Null, |v| ParamValue::Int(v.into())))
    } else if *ty == Type::INT8 {
        Ok(get::<i64>(row, index)?.map_or(ParamValue::Null, ParamValue::Int))
    } else if *ty == Type::FLOAT4 {
        Ok(get::<f32>(row, index)?.map_or(ParamValue::Null, |v| ParamValue::Float(v.into())))
    } else if *ty == Type::FLOAT8 {
        Ok(get::<f64>(row, index)?.map_or(ParamValue::Null, ParamValue::Float))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        Ok(get::<String>(row, index)?.map_or(ParamValue::Null, ParamValue::Text))
    } else if *ty == Type::BYTEA {
        Ok(get::<Vec<u8>>(row, index)?.map_or(ParamValue::Null, ParamValue::Bytes))
    } else {
        Err(TapError::unsupported(format!("column type {ty}")))
    }
}

impl ToSql for ParamValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            ParamValue::Null => Ok(IsNull::Yes),
            ParamValue::Bool(v) => v.to_sql(ty, out),
            ParamValue::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            ParamValue::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            ParamValue::Text(v) => v.to_sql(ty, out),
            ParamValue::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn param_value_accepts_common_types() {
        assert!(<ParamValue as ToSql>::accepts(&Type::BOOL));
        assert!(<ParamValue as ToSql>::accepts(&Type::INT8));
        assert!(<ParamValue as ToSql>::accepts(&Type::TEXT));
        assert!(<ParamValue as ToSql>::accepts(&Type::BYTEA));
    }

    #[test]
    fn param_value_encodes_null_and_text() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            ParamValue::Null.to_sql(&Type::TEXT, &mut buf).unwrap(),
            IsNull::Yes
        ));
        assert!(matches!(
            ParamValue::Text("x".into())
                .to_sql(&Type::TEXT, &mut buf)
                .unwrap(),
            IsNull::No
        ));
        assert_eq!(&buf[..], b"x");
    }

    #[test]
    fn param_value_narrows_integers_per_column_type() {
        let mut buf = BytesMut::new();
        ParamValue::Int(7).to_sql(&Type::INT4, &mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        // Narrowing that cannot fit errors instead of truncating.
        let mut buf = BytesMut::new();
        assert!(
            ParamValue::Int(i64::from(i32::MAX) + 1)
                .to_sql(&Type::INT4, &mut buf)
                .is_err()
        );
    }

    #[tokio::test]
    async fn exhausted_cursor_reports_no_rows() {
        let mut rows = PgResultSet::from_stream(stream::iter(Vec::<
            Result<Row, tokio_postgres::Error>,
        >::new()));
        assert!(!rows.advance().await.unwrap());
        // Repeated advance stays at the end.
        assert!(!rows.advance().await.unwrap());
        assert!(rows.column(0).is_err());
    }

    #[tokio::test]
    async fn closed_cursor_stops_advancing() {
        let mut rows = PgResultSet::from_stream(stream::iter(Vec::<
            Result<Row, tokio_postgres::Error>,
        >::new()));
        rows.close().await.unwrap();
        assert!(!rows.advance().await.unwrap());
        assert!(rows.current().is_none());
    }
}
