//! SQLite-backed store.
//!
//! Two tables: `metric_types` (fixed rows for counter and gauge) and
//! `metrics` with a unique index on `(name, type_id)`. Every multi-step
//! operation runs in one transaction that is committed only when all steps
//! succeed.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{info, instrument, warn};

use metrix_core::error::{MetrixError, Result};
use metrix_core::{Metric, MetricKind, MetricValue};

use super::{not_found, parse_snapshot, MetricsStorage, Snapshot};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS metric_types (
        id   INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    "INSERT OR IGNORE INTO metric_types (id, name) VALUES (1, 'counter'), (2, 'gauge')",
    r#"
    CREATE TABLE IF NOT EXISTS metrics (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        name    TEXT NOT NULL,
        type_id INTEGER NOT NULL REFERENCES metric_types (id),
        delta   INTEGER,
        value   REAL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS metrics_name_type_idx ON metrics (name, type_id)",
];

fn type_id(kind: MetricKind) -> i64 {
    match kind {
        MetricKind::Counter => 1,
        MetricKind::Gauge => 2,
    }
}

fn db_err(e: sqlx::Error) -> MetrixError {
    MetrixError::Storage(format!("database: {e}"))
}

#[derive(Clone)]
pub struct DatabaseStorage {
    pool: SqlitePool,
}

impl DatabaseStorage {
    /// Open (creating if missing) the database at `dsn` and run migrations.
    #[instrument(skip_all)]
    pub async fn connect(dsn: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)
            .map_err(db_err)?
            .create_if_missing(true);

        // An in-memory database lives only as long as its connection.
        let pool = if dsn.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        }
        .connect_with(options)
        .await
        .map_err(db_err)?;

        let store = Self { pool };
        store.migrate().await?;
        info!("metrics database ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn finish<T>(tx: Transaction<'_, Sqlite>, res: Result<T>) -> Result<T> {
        match res {
            Ok(v) => {
                tx.commit().await.map_err(db_err)?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "metrics transaction rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn add_in_tx(tx: &mut Transaction<'_, Sqlite>, metrics: &[Metric]) -> Result<Vec<Metric>> {
        let mut out = Vec::with_capacity(metrics.len());
        for incoming in metrics {
            let kind = incoming.kind();
            let row = sqlx::query("SELECT delta, value FROM metrics WHERE name = ? AND type_id = ?")
                .bind(incoming.name())
                .bind(type_id(kind))
                .fetch_optional(&mut **tx)
                .await
                .map_err(db_err)?;

            let next = match row {
                Some(row) => {
                    let current = Metric::new(incoming.name(), value_of(kind, incoming.name(), &row)?);
                    current.set_value(incoming.value())?;
                    current
                }
                None => Metric::new(incoming.name(), incoming.value().finite()?),
            };
            Self::upsert(tx, &next).await?;
            out.push(next);
        }
        Ok(out)
    }

    async fn restore_in_tx(tx: &mut Transaction<'_, Sqlite>, metrics: &[Metric]) -> Result<()> {
        sqlx::query("DELETE FROM metrics")
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        for m in metrics {
            Self::upsert(tx, m).await?;
        }
        Ok(())
    }

    async fn upsert(tx: &mut Transaction<'_, Sqlite>, metric: &Metric) -> Result<()> {
        let (delta, value) = match metric.value() {
            MetricValue::Counter(d) => (Some(d), None),
            MetricValue::Gauge(v) => (None, Some(v)),
        };
        sqlx::query(
            r#"
            INSERT INTO metrics (name, type_id, delta, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (name, type_id) DO UPDATE SET delta = excluded.delta, value = excluded.value
            "#,
        )
        .bind(metric.name())
        .bind(type_id(metric.kind()))
        .bind(delta)
        .bind(value)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

fn value_of(kind: MetricKind, name: &str, row: &SqliteRow) -> Result<MetricValue> {
    let value = match kind {
        MetricKind::Counter => row
            .try_get::<Option<i64>, _>("delta")
            .map_err(db_err)?
            .map(MetricValue::Counter),
        MetricKind::Gauge => row
            .try_get::<Option<f64>, _>("value")
            .map_err(db_err)?
            .map(MetricValue::Gauge),
    };
    value.ok_or_else(|| MetrixError::Storage(format!("metric {kind}/{name} has no stored value")))
}

#[async_trait]
impl MetricsStorage for DatabaseStorage {
    #[instrument(skip_all, fields(batch = metrics.len()))]
    async fn add_metric_values(&self, metrics: &[Metric]) -> Result<Vec<Metric>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let res = Self::add_in_tx(&mut tx, metrics).await;
        Self::finish(tx, res).await
    }

    async fn get_metric_values(&self) -> Result<Snapshot> {
        let rows = sqlx::query(
            r#"
            SELECT m.name AS name, t.name AS type, m.delta AS delta, m.value AS value
            FROM metrics m
            JOIN metric_types t ON t.id = m.type_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut snap = Snapshot::new();
        for row in rows {
            let name: String = row.try_get("name").map_err(db_err)?;
            let mtype: String = row.try_get("type").map_err(db_err)?;
            let kind: MetricKind = mtype.parse()?;
            let value = value_of(kind, &name, &row)?;
            snap.entry(mtype).or_default().insert(name, value.to_string());
        }
        Ok(snap)
    }

    async fn get_metric(&self, kind: MetricKind, name: &str) -> Result<Metric> {
        let row = sqlx::query("SELECT delta, value FROM metrics WHERE name = ? AND type_id = ?")
            .bind(name)
            .bind(type_id(kind))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| not_found(kind, name))?;
        Ok(Metric::new(name, value_of(kind, name, &row)?))
    }

    #[instrument(skip_all)]
    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        let parsed = parse_snapshot(snapshot)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let res = Self::restore_in_tx(&mut tx, &parsed).await;
        Self::finish(tx, res).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
