//! End-to-end checks of the public API: a caller-defined in-memory backend
//! implements the capability traits, gets wrapped, and the whole chain is
//! driven through the instrumented surface only.

use sqltap::{
    CallListener, CallRecord, Connection, ParamValue, PreparedStatement, QueryCountRegistry,
    QueryRecord, ResourceKind, ResultSet, Statement, TapError, TapResult, wrap,
};
use std::sync::{Arc, Mutex};

// ── A minimal in-memory backend ──

#[derive(Clone, Default)]
struct MemConnection {
    executed: Arc<Mutex<Vec<String>>>,
}

struct MemStatement {
    executed: Arc<Mutex<Vec<String>>>,
    batch: Mutex<Vec<String>>,
}

struct MemPrepared {
    executed: Arc<Mutex<Vec<String>>>,
    sql: String,
    bindings: Mutex<Vec<ParamValue>>,
    batch: Mutex<Vec<Vec<ParamValue>>>,
}

struct MemRows {
    rows: Vec<Vec<ParamValue>>,
    cursor: Option<usize>,
}

impl Connection for MemConnection {
    type Stmt = MemStatement;
    type Prepared = MemPrepared;

    async fn create_statement(&self) -> TapResult<MemStatement> {
        Ok(MemStatement {
            executed: self.executed.clone(),
            batch: Mutex::new(Vec::new()),
        })
    }

    async fn prepare(&self, sql: &str) -> TapResult<MemPrepared> {
        Ok(MemPrepared {
            executed: self.executed.clone(),
            sql: sql.to_string(),
            bindings: Mutex::new(Vec::new()),
            batch: Mutex::new(Vec::new()),
        })
    }

    async fn close(&self) -> TapResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

impl Statement for MemStatement {
    type Rows = MemRows;
    type Conn = MemConnection;

    async fn execute_query(&self, sql: &str) -> TapResult<MemRows> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(MemRows {
            rows: vec![vec![ParamValue::Int(1)], vec![ParamValue::Int(2)]],
            cursor: None,
        })
    }

    async fn execute_update(&self, sql: &str) -> TapResult<u64> {
        if sql.contains("boom") {
            return Err(TapError::Other("backend rejected the query".into()));
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(1)
    }

    async fn execute(&self, sql: &str) -> TapResult<bool> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(false)
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
        let pending: Vec<String> = std::mem::take(&mut *self.batch.lock().unwrap());
        let mut executed = self.executed.lock().unwrap();
        for sql in &pending {
            executed.push(sql.clone());
        }
        Ok(vec![1; pending.len()])
    }

    fn connection(&self) -> TapResult<MemConnection> {
        Ok(MemConnection {
            executed: self.executed.clone(),
        })
    }

    async fn close(&self) -> TapResult<()> {
        Ok(())
    }
}

impl PreparedStatement for MemPrepared {
    type Rows = MemRows;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&self, index: usize, value: ParamValue) -> TapResult<()> {
        if index == 0 {
            return Err(TapError::invalid_index("1-based"));
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

    async fn execute_query(&self) -> TapResult<MemRows> {
        self.executed.lock().unwrap().push(self.sql.clone());
        Ok(MemRows {
            rows: Vec::new(),
            cursor: None,
        })
    }

    async fn execute_update(&self) -> TapResult<u64> {
        self.executed.lock().unwrap().push(self.sql.clone());
        Ok(1)
    }

    async fn add_batch(&self) -> TapResult<()> {
        let snapshot = self.bindings.lock().unwrap().clone();
        self.batch.lock().unwrap().push(snapshot);
        Ok(())
    }

    async fn clear_batch(&self) -> TapResult<()> {
        self.batch.lock().unwrap().clear();
        Ok(())
    }

    async fn execute_batch(&self) -> TapResult<Vec<u64>> {
        let pending: Vec<Vec<ParamValue>> = std::mem::take(&mut *self.batch.lock().unwrap());
        let mut executed = self.executed.lock().unwrap();
        for _ in &pending {
            executed.push(self.sql.clone());
        }
        Ok(vec![1; pending.len()])
    }

    async fn close(&self) -> TapResult<()> {
        Ok(())
    }
}

impl ResultSet for MemRows {
    async fn advance(&mut self) -> TapResult<bool> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next);
        Ok(next < self.rows.len())
    }

    fn column(&self, index: usize) -> TapResult<ParamValue> {
        self.cursor
            .and_then(|c| self.rows.get(c))
            .and_then(|row| row.get(index))
            .cloned()
            .ok_or_else(|| TapError::invalid_index(format!("column {index}")))
    }

    async fn close(&mut self) -> TapResult<()> {
        self.rows.clear();
        Ok(())
    }
}

// ── A listener defined outside the crate ──

#[derive(Default)]
struct QueryLog(Mutex<Vec<(String, Vec<QueryRecord>, bool)>>);

impl CallListener for QueryLog {
    fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()> {
        if record.has_queries() {
            self.0.lock().unwrap().push((
                record.method.to_string(),
                record.queries.to_vec(),
                record.is_success(),
            ));
        }
        Ok(())
    }
}

#[tokio::test]
async fn full_chain_is_observable_through_the_public_api() {
    let log = Arc::new(QueryLog::default());
    let backend = MemConnection::default();
    let conn = wrap(backend.clone(), "mem", vec![log.clone()]);

    let stmt = conn.create_statement().await.unwrap();
    let mut rows = stmt.execute_query("SELECT id FROM t").await.unwrap();
    assert!(rows.advance().await.unwrap());
    assert_eq!(rows.column(0).unwrap(), ParamValue::Int(1));

    stmt.add_batch("INSERT INTO t VALUES (1)").await.unwrap();
    stmt.add_batch("INSERT INTO t VALUES (2)").await.unwrap();
    stmt.clear_batch().await.unwrap();
    stmt.add_batch("INSERT INTO t VALUES (3)").await.unwrap();
    let counts = stmt.execute_batch().await.unwrap();
    assert_eq!(counts, vec![1]);

    let err = stmt.execute_update("UPDATE boom").await.unwrap_err();
    assert!(matches!(err, TapError::Other(_)));

    let entries = log.0.lock().unwrap().clone();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].0, "execute_query");
    assert_eq!(entries[1].0, "execute_batch");
    assert_eq!(
        entries[1].1,
        vec![QueryRecord::new("INSERT INTO t VALUES (3)")]
    );
    assert_eq!(entries[2].0, "execute_update");
    assert!(!entries[2].2);

    // The backend saw exactly the forwarded calls, in order.
    assert_eq!(
        *backend.executed.lock().unwrap(),
        vec!["SELECT id FROM t", "INSERT INTO t VALUES (3)"]
    );
}

#[tokio::test]
async fn prepared_statements_report_bound_values() {
    let log = Arc::new(QueryLog::default());
    let conn = wrap(MemConnection::default(), "mem", vec![log.clone()]);

    let prepared = conn.prepare("INSERT INTO t VALUES ($1)").await.unwrap();
    prepared.bind(1, ParamValue::Text("alpha".into())).unwrap();
    prepared.execute_update().await.unwrap();

    let entries = log.0.lock().unwrap().clone();
    assert_eq!(
        entries[0].1,
        vec![QueryRecord::with_params(
            "INSERT INTO t VALUES ($1)",
            vec![ParamValue::Text("alpha".into())],
        )]
    );
}

#[tokio::test]
async fn counts_aggregate_per_unit_of_work() {
    let registry = Arc::new(QueryCountRegistry::new());
    let conn = wrap(MemConnection::default(), "mem", Vec::new());

    QueryCountRegistry::scope(registry.clone(), async {
        let stmt = conn.create_statement().await.unwrap();
        stmt.execute_update("INSERT INTO t VALUES (1)").await.unwrap();
        let mut rows = stmt.execute_query("SELECT 1").await.unwrap();
        let _ = rows.advance().await.unwrap();
        let _ = stmt.execute_update("UPDATE boom").await;
    })
    .await;

    assert_eq!(registry.data_source_names(), vec!["mem"]);
    let snap = registry.snapshot("mem").unwrap();
    assert_eq!(snap.insert, 1);
    assert_eq!(snap.select, 1);
    assert_eq!(snap.update, 1);
    assert_eq!(snap.success, 2);
    assert_eq!(snap.failure, 1);

    // The reporting hook defines the unit-of-work boundary.
    let report = registry.report();
    assert!(report.starts_with("datasource:mem "));
    registry.clear();
    assert!(registry.data_source_names().is_empty());
}

#[tokio::test]
async fn record_kinds_follow_the_resource_chain() {
    #[derive(Default)]
    struct Kinds(Mutex<Vec<ResourceKind>>);
    impl CallListener for Kinds {
        fn after_call(&self, record: &CallRecord<'_>) -> TapResult<()> {
            self.0.lock().unwrap().push(record.kind);
            Ok(())
        }
    }

    let kinds = Arc::new(Kinds::default());
    let conn = wrap(MemConnection::default(), "mem", vec![kinds.clone()]);

    let stmt = conn.create_statement().await.unwrap();
    let mut rows = stmt.execute_query("SELECT 1").await.unwrap();
    rows.advance().await.unwrap();
    let prepared = conn.prepare("SELECT $1").await.unwrap();
    prepared.bind(1, ParamValue::Int(1)).unwrap();

    assert_eq!(
        *kinds.0.lock().unwrap(),
        vec![
            ResourceKind::Connection,
            ResourceKind::Statement,
            ResourceKind::ResultSet,
            ResourceKind::Connection,
            ResourceKind::PreparedStatement,
        ]
    );
}
