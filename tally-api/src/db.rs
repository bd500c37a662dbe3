//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! [`CounterStore`] implementation over the `equipment_types` and
//! `service_orders` tables. Every statement is parameterized and scoped by
//! tenant id.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tally_core::{
    EntityIdType, EntityKind, EquipmentType, EquipmentTypeId, OrderEquipmentRef, ServiceOrderId,
    StorageError, StoreOp, TallyResult, TenantId,
};
use tally_storage::CounterStore;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

/// Schema the store expects, applied by [`DbClient::apply_schema`].
pub const SCHEMA_SQL: &str = include_str!("../migrations/V1__equipment_counters.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection wait timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tally".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("TALLY_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TALLY_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("TALLY_DB_NAME").unwrap_or_else(|_| "tally".to_string()),
            user: std::env::var("TALLY_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("TALLY_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("TALLY_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("TALLY_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> TallyResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// PostgreSQL-backed counter store.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> TallyResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist.
    pub async fn apply_schema(&self) -> TallyResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| StorageError::Unavailable {
                reason: format!("Failed to apply schema: {}", e),
            })?;
        tracing::info!("Database schema applied");
        Ok(())
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> TallyResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            StorageError::Unavailable {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn query_failed(op: StoreOp) -> impl FnOnce(tokio_postgres::Error) -> StorageError {
    move |e| {
        tracing::error!(%op, "Database error: {:?}", e);
        StorageError::QueryFailed {
            op,
            reason: e.to_string(),
        }
    }
}

fn write_failed(id: EquipmentTypeId) -> impl FnOnce(tokio_postgres::Error) -> StorageError {
    move |e| {
        tracing::error!(equipment_type_id = %id, "Database error: {:?}", e);
        StorageError::WriteFailed {
            entity_kind: EntityKind::EquipmentType,
            id: id.as_uuid(),
            reason: e.to_string(),
        }
    }
}

/// BIGINT column to counter; the table's CHECK keeps it non-negative.
fn counter_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn equipment_from_row(row: &Row) -> Result<EquipmentType, tokio_postgres::Error> {
    let id: Uuid = row.try_get("id")?;
    let tenant_id: Uuid = row.try_get("tenant_id")?;
    let usage_counter: i64 = row.try_get("usage_counter")?;
    Ok(EquipmentType {
        equipment_type_id: EquipmentTypeId::new(id),
        tenant_id: TenantId::new(tenant_id),
        name: row.try_get("name")?,
        usage_counter: counter_from_db(usage_counter),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const EQUIPMENT_COLUMNS: &str = "id, tenant_id, name, usage_counter, created_at, updated_at";

#[async_trait]
impl CounterStore for DbClient {
    async fn tenant_ids(&self) -> TallyResult<Vec<TenantId>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT DISTINCT tenant_id FROM equipment_types ORDER BY tenant_id",
                &[],
            )
            .await
            .map_err(query_failed(StoreOp::ListTenants))?;

        rows.iter()
            .map(|row| row.try_get::<_, Uuid>(0).map(TenantId::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_failed(StoreOp::ListTenants)(e).into())
    }

    async fn equipment_types(&self, tenant_id: TenantId) -> TallyResult<Vec<EquipmentType>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM equipment_types WHERE tenant_id = $1 ORDER BY id",
            EQUIPMENT_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&tenant_id.as_uuid()])
            .await
            .map_err(query_failed(StoreOp::ListEquipmentTypes))?;

        rows.iter()
            .map(equipment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_failed(StoreOp::ListEquipmentTypes)(e).into())
    }

    async fn equipment_types_by_name(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<Vec<EquipmentType>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM equipment_types WHERE tenant_id = $1 AND name = $2 ORDER BY id",
            EQUIPMENT_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&tenant_id.as_uuid(), &name])
            .await
            .map_err(query_failed(StoreOp::FindEquipmentByName))?;

        rows.iter()
            .map(equipment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_failed(StoreOp::FindEquipmentByName)(e).into())
    }

    async fn order_equipment(&self, tenant_id: TenantId) -> TallyResult<Vec<OrderEquipmentRef>> {
        let conn = self.get_conn().await?;
        // No LIMIT: a truncated list would produce wrong counters.
        let rows = conn
            .query(
                "SELECT id, equipment_name FROM service_orders \
                 WHERE tenant_id = $1 AND equipment_name IS NOT NULL",
                &[&tenant_id.as_uuid()],
            )
            .await
            .map_err(query_failed(StoreOp::ListOrderEquipment))?;

        rows.iter()
            .map(|row| {
                Ok(OrderEquipmentRef {
                    service_order_id: ServiceOrderId::new(row.try_get("id")?),
                    equipment_name: row.try_get("equipment_name")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| query_failed(StoreOp::ListOrderEquipment)(e).into())
    }

    async fn count_orders_with_equipment(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> TallyResult<u64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM service_orders WHERE tenant_id = $1 AND equipment_name = $2",
                &[&tenant_id.as_uuid(), &name],
            )
            .await
            .map_err(query_failed(StoreOp::CountOrders))?;

        let count: i64 = row
            .try_get(0)
            .map_err(query_failed(StoreOp::CountOrders))?;
        Ok(counter_from_db(count))
    }

    async fn set_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        value: u64,
    ) -> TallyResult<bool> {
        let value = i64::try_from(value).map_err(|_| StorageError::WriteFailed {
            entity_kind: EntityKind::EquipmentType,
            id: equipment_type_id.as_uuid(),
            reason: format!("counter {} exceeds BIGINT", value),
        })?;

        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE equipment_types SET usage_counter = $3, updated_at = now() \
                 WHERE tenant_id = $1 AND id = $2",
                &[&tenant_id.as_uuid(), &equipment_type_id.as_uuid(), &value],
            )
            .await
            .map_err(write_failed(equipment_type_id))?;
        Ok(updated > 0)
    }

    async fn increment_usage_counter(
        &self,
        tenant_id: TenantId,
        equipment_type_id: EquipmentTypeId,
        delta: i64,
    ) -> TallyResult<Option<u64>> {
        let conn = self.get_conn().await?;
        // Single statement: the row lock serializes concurrent increments.
        let row = conn
            .query_opt(
                "UPDATE equipment_types \
                 SET usage_counter = GREATEST(usage_counter + $3, 0), updated_at = now() \
                 WHERE tenant_id = $1 AND id = $2 \
                 RETURNING usage_counter",
                &[&tenant_id.as_uuid(), &equipment_type_id.as_uuid(), &delta],
            )
            .await
            .map_err(write_failed(equipment_type_id))?;

        match row {
            Some(row) => {
                let value: i64 = row.try_get(0).map_err(write_failed(equipment_type_id))?;
                Ok(Some(counter_from_db(value)))
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> TallyResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(query_failed(StoreOp::Ping))?;
        Ok(())
    }
}
