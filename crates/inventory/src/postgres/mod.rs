//! Postgres-backed inventory implementation.
//!
//! Every phase that touches a record runs in its own transaction and locks
//! the row with `SELECT … FOR UPDATE`. No transaction is open while the
//! changer moves media.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `InventoryError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | InventoryError | Scenario |
//! |------------|----------------------|----------------|----------|
//! | Database (unique violation) | `23505` | `LocationOccupied` / `AlreadyExists` | Slot already taken / duplicate serial or path |
//! | Database (foreign key violation) | `23503` | `NotFound` | Tree entry for an unknown serial |
//! | Database (check constraint violation) | `23514` | `Storage` | Row rejected by a schema CHECK |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresInventory` is `Send + Sync`; all access goes through the SQLx
//! connection pool.

pub mod schema;

use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, error, info, instrument};

use tapevault_changer::Changer;
use tapevault_core::{
    ConfigError, Location, Options, PathName, Serial, SlotCategory, SlotStatus, Volume,
    VolumeCategory, VolumeFlags,
};

use crate::audit::AuditPlan;
use crate::config::PostgresConfig;
use crate::protocol::{self, MoveIntent, MoveKind, MoveLedger};
use crate::r#trait::{AuditReport, Inventory, InventoryError, InventoryResult, TreeIndex};
use crate::rules;

/// Postgres-backed inventory.
#[derive(Debug, Clone)]
pub struct PostgresInventory {
    pool: PgPool,
    cleaning_prefix: Arc<str>,
}

impl PostgresInventory {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, cleaning_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            pool,
            cleaning_prefix: cleaning_prefix.into(),
        }
    }

    /// Build a pool that connects on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(config: &PostgresConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(config.connect_options());
        Self::new(pool, config.cleaning_prefix.as_str())
    }

    /// Registry constructor. Options are validated before any pool exists.
    pub fn from_options(options: &Options) -> Result<Arc<dyn Inventory>, ConfigError> {
        let config = PostgresConfig::from_options(options)?;
        Ok(Arc::new(Self::connect_lazy(&config)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> InventoryResult<()> {
        const OP: &str = "ensure_schema";
        let mut tx = begin(OP, &self.pool).await?;
        let result = run_statements(OP, &mut tx, schema::CREATE_SCHEMA).await;
        settle(OP, tx, result).await
    }
}

async fn begin(op: &'static str, pool: &PgPool) -> InventoryResult<Transaction<'static, Postgres>> {
    pool.begin().await.map_err(|e| map_sqlx_error(op, e))
}

/// Commit on success, roll back on failure.
async fn settle<T>(
    op: &'static str,
    tx: Transaction<'static, Postgres>,
    result: InventoryResult<T>,
) -> InventoryResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!(op, error = %e, "could not commit");
                map_sqlx_error(op, e)
            })?;
            Ok(value)
        }
        Err(err) => {
            debug!(op, error = %err, "transaction rolled back");
            if let Err(e) = tx.rollback().await {
                error!(op, error = %e, "could not roll back transaction");
            }
            Err(err)
        }
    }
}

async fn run_statements(
    op: &'static str,
    tx: &mut Transaction<'static, Postgres>,
    statements: &[&str],
) -> InventoryResult<()> {
    for stmt in statements {
        sqlx::query(stmt)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(op, e))?;
    }
    Ok(())
}

/// Load and lock one record.
async fn fetch_locked(
    op: &'static str,
    tx: &mut Transaction<'static, Postgres>,
    serial: &Serial,
) -> InventoryResult<Volume> {
    let row = sqlx::query(
        r#"
        SELECT serial, location_addr, location_category, home_addr, home_category, category, flags
        FROM volumes
        WHERE serial = $1
        FOR UPDATE
        "#,
    )
    .bind(serial.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(op, e))?;

    match row {
        Some(row) => volume_from_row(op, &row),
        None => Err(InventoryError::not_found(op, format!("volume {serial}"))),
    }
}

/// Serial other than `except` recorded at `location`.
async fn occupant(
    op: &'static str,
    tx: &mut Transaction<'static, Postgres>,
    location: Location,
    except: &Serial,
) -> InventoryResult<Option<String>> {
    let (addr, category) = location_columns(Some(location));
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT serial
        FROM volumes
        WHERE location_addr = $1 AND location_category = $2 AND serial <> $3
        "#,
    )
    .bind(addr)
    .bind(category)
    .bind(except.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(op, e))
}

/// Overwrite the mutable columns of an existing record.
async fn write_volume(
    op: &'static str,
    tx: &mut Transaction<'static, Postgres>,
    volume: &Volume,
) -> InventoryResult<()> {
    let (location_addr, location_category) = location_columns(volume.location);
    let (home_addr, home_category) = location_columns(volume.home);

    let result = sqlx::query(
        r#"
        UPDATE volumes
        SET
            location_addr = $2,
            location_category = $3,
            home_addr = $4,
            home_category = $5,
            category = $6,
            flags = $7
        WHERE serial = $1
        "#,
    )
    .bind(volume.serial.as_str())
    .bind(location_addr)
    .bind(location_category)
    .bind(home_addr)
    .bind(home_category)
    .bind(volume.category.as_str())
    .bind(i64::from(volume.flags.bits()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_write_error(op, volume, e))?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::not_found(op, format!("volume {}", volume.serial)));
    }
    Ok(())
}

/// Insert a record, or overwrite its position and flags if the serial is
/// known. The category of a known serial is left alone.
async fn upsert_observed(
    op: &'static str,
    tx: &mut Transaction<'static, Postgres>,
    volume: &Volume,
) -> InventoryResult<()> {
    let (location_addr, location_category) = location_columns(volume.location);
    let (home_addr, home_category) = location_columns(volume.home);

    sqlx::query(
        r#"
        INSERT INTO volumes (
            serial, location_addr, location_category, home_addr, home_category, category, flags
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (serial)
        DO UPDATE SET
            location_addr = EXCLUDED.location_addr,
            location_category = EXCLUDED.location_category,
            home_addr = EXCLUDED.home_addr,
            home_category = EXCLUDED.home_category,
            flags = EXCLUDED.flags
        "#,
    )
    .bind(volume.serial.as_str())
    .bind(location_addr)
    .bind(location_category)
    .bind(home_addr)
    .bind(home_category)
    .bind(volume.category.as_str())
    .bind(i64::from(volume.flags.bits()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_write_error(op, volume, e))?;

    Ok(())
}

async fn stage_intent(
    tx: &mut Transaction<'static, Postgres>,
    kind: MoveKind,
    serial: &Serial,
    dst: Option<Location>,
) -> InventoryResult<MoveIntent> {
    let op = kind.as_str();
    let current = fetch_locked(op, tx, serial).await?;
    let intent = protocol::begin(kind, &current, dst)?;

    if let Some(other) = occupant(op, tx, intent.dst, serial).await? {
        debug!(%other, dst = %intent.dst, "destination recorded as occupied");
        return Err(InventoryError::LocationOccupied {
            op,
            location: intent.dst,
        });
    }

    write_volume(op, tx, &intent.volume).await?;
    Ok(intent)
}

async fn stage_finish(tx: &mut Transaction<'static, Postgres>, intent: &MoveIntent) -> InventoryResult<Volume> {
    let op = intent.kind.as_str();
    let current = fetch_locked(op, tx, intent.serial()).await?;
    let volume = protocol::finish(intent, &current);
    write_volume(op, tx, &volume).await?;
    Ok(volume)
}

async fn stage_alloc(tx: &mut Transaction<'static, Postgres>) -> InventoryResult<Serial> {
    const OP: &str = "alloc";

    // COLLATE "C" keeps the order bytewise, matching the in-memory backend.
    let row = sqlx::query(
        r#"
        SELECT serial, location_addr, location_category, home_addr, home_category, category, flags
        FROM volumes
        WHERE category IN ('filling', 'scratch')
          AND location_category = 'storage'
          AND (flags & $1) = 0
        ORDER BY category COLLATE "C", serial COLLATE "C"
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(i64::from(VolumeFlags::TRANSFERING.bits()))
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(OP, e))?;

    let mut volume = match row {
        Some(row) => volume_from_row(OP, &row)?,
        None => return Err(InventoryError::Exhausted { op: OP }),
    };

    let category = rules::allocated_category(volume.category);
    if category != volume.category {
        volume.category = category;
        write_volume(OP, tx, &volume).await?;
    }
    Ok(volume.serial)
}

async fn stage_audit(
    tx: &mut Transaction<'static, Postgres>,
    snapshot: &SlotStatus,
    cleaning_prefix: &str,
) -> InventoryResult<AuditPlan> {
    const OP: &str = "audit";

    let rows = sqlx::query(
        r#"
        SELECT serial, location_addr, location_category, home_addr, home_category, category, flags
        FROM volumes
        ORDER BY serial
        FOR UPDATE
        "#,
    )
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(OP, e))?;

    let records = rows
        .iter()
        .map(|row| volume_from_row(OP, row))
        .collect::<InventoryResult<Vec<_>>>()?;

    let plan = AuditPlan::new(snapshot, &records, cleaning_prefix);

    if !plan.vacate.is_empty() {
        let serials: Vec<String> = plan.vacate.iter().map(|s| s.to_string()).collect();
        sqlx::query(
            r#"
            UPDATE volumes
            SET location_addr = NULL, location_category = NULL
            WHERE serial = ANY($1)
            "#,
        )
        .bind(serials)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;
    }

    for volume in &plan.writes {
        upsert_observed(OP, tx, volume).await?;
    }
    Ok(plan)
}

async fn stage_update(tx: &mut Transaction<'static, Postgres>, volume: &Volume) -> InventoryResult<()> {
    const OP: &str = "update";
    let existing = fetch_locked(OP, tx, &volume.serial).await?;
    rules::check_update(OP, &existing, volume)?;
    write_volume(OP, tx, volume).await
}

#[async_trait::async_trait]
impl MoveLedger for PostgresInventory {
    async fn commit_intent(
        &self,
        kind: MoveKind,
        serial: &Serial,
        dst: Option<Location>,
    ) -> InventoryResult<MoveIntent> {
        let op = kind.as_str();
        let mut tx = begin(op, &self.pool).await?;
        let result = stage_intent(&mut tx, kind, serial, dst).await;
        settle(op, tx, result).await
    }

    async fn finalize(&self, intent: &MoveIntent) -> InventoryResult<Volume> {
        let op = intent.kind.as_str();
        let mut tx = begin(op, &self.pool).await?;
        let result = stage_finish(&mut tx, intent).await;
        settle(op, tx, result).await
    }
}

#[async_trait::async_trait]
impl TreeIndex for PostgresInventory {
    #[instrument(skip_all, fields(op = "create", path = %path, serial = %serial), err)]
    async fn create(&self, path: &PathName, serial: &Serial) -> InventoryResult<()> {
        const OP: &str = "create";

        sqlx::query(
            r#"
            INSERT INTO tree (path, serial)
            VALUES ($1, $2)
            "#,
        )
        .bind(path.as_str())
        .bind(serial.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, UNIQUE_VIOLATION) {
                InventoryError::already_exists(OP, format!("path {path}"))
            } else if has_code(&e, FOREIGN_KEY_VIOLATION) {
                InventoryError::not_found(OP, format!("volume {serial}"))
            } else {
                map_sqlx_error(OP, e)
            }
        })?;

        Ok(())
    }

    async fn lookup(&self, path: &PathName) -> InventoryResult<Volume> {
        const OP: &str = "lookup";

        let row = sqlx::query(
            r#"
            SELECT
                v.serial, v.location_addr, v.location_category,
                v.home_addr, v.home_category, v.category, v.flags
            FROM tree t
            JOIN volumes v ON v.serial = t.serial
            WHERE t.path = $1
            "#,
        )
        .bind(path.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        match row {
            Some(row) => volume_from_row(OP, &row),
            None => Err(InventoryError::not_found(OP, format!("path {path}"))),
        }
    }
}

#[async_trait::async_trait]
impl Inventory for PostgresInventory {
    #[instrument(skip(self), fields(op = "alloc", serial = tracing::field::Empty), err)]
    async fn alloc(&self) -> InventoryResult<Serial> {
        const OP: &str = "alloc";
        let mut tx = begin(OP, &self.pool).await?;
        let result = stage_alloc(&mut tx).await;
        let serial = settle(OP, tx, result).await?;

        Span::current().record("serial", tracing::field::display(&serial));
        Ok(serial)
    }

    async fn load(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Load, serial, Some(dst), changer).await?;
        Ok(())
    }

    async fn unload(
        &self,
        serial: &Serial,
        dst: Option<Location>,
        changer: &dyn Changer,
    ) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Unload, serial, dst, changer).await?;
        Ok(())
    }

    async fn transfer(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Transfer, serial, Some(dst), changer).await?;
        Ok(())
    }

    #[instrument(skip(self, changer), fields(op = "audit"), err)]
    async fn audit(&self, changer: &dyn Changer) -> InventoryResult<AuditReport> {
        const OP: &str = "audit";
        let snapshot = changer
            .status()
            .await
            .map_err(|source| InventoryError::Status { op: OP, source })?;

        let mut tx = begin(OP, &self.pool).await?;
        let result = stage_audit(&mut tx, &snapshot, &self.cleaning_prefix).await;
        let plan = settle(OP, tx, result).await?;

        let report = plan.report(Utc::now());
        info!(
            discovered = report.discovered.len(),
            relocated = report.relocated.len(),
            displaced = report.displaced.len(),
            unchanged = report.unchanged,
            "audit complete"
        );
        Ok(report)
    }

    async fn loaded(&self, drive: Location) -> InventoryResult<Option<Serial>> {
        const OP: &str = "loaded";

        let serial = sqlx::query_scalar::<_, String>(
            r#"
            SELECT serial
            FROM volumes
            WHERE location_addr = $1 AND location_category = $2
            "#,
        )
        .bind(i64::from(drive.addr))
        .bind(SlotCategory::Transfer.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        serial
            .map(|s| Serial::new(s).map_err(|e| InventoryError::domain(OP, e)))
            .transpose()
    }

    #[instrument(skip(self), fields(op = "reset"), err)]
    async fn reset(&self) -> InventoryResult<()> {
        const OP: &str = "reset";
        let mut tx = begin(OP, &self.pool).await?;
        let result = async {
            run_statements(OP, &mut tx, schema::DROP_SCHEMA).await?;
            run_statements(OP, &mut tx, schema::CREATE_SCHEMA).await
        }
        .await;
        settle(OP, tx, result).await?;
        info!("inventory reset");
        Ok(())
    }

    async fn volumes(&self) -> InventoryResult<Vec<Volume>> {
        const OP: &str = "volumes";

        let rows = sqlx::query(
            r#"
            SELECT serial, location_addr, location_category, home_addr, home_category, category, flags
            FROM volumes
            ORDER BY serial COLLATE "C"
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        rows.iter().map(|row| volume_from_row(OP, row)).collect()
    }

    async fn info(&self, serial: &Serial) -> InventoryResult<Volume> {
        const OP: &str = "info";

        let row = sqlx::query(
            r#"
            SELECT serial, location_addr, location_category, home_addr, home_category, category, flags
            FROM volumes
            WHERE serial = $1
            "#,
        )
        .bind(serial.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        match row {
            Some(row) => volume_from_row(OP, &row),
            None => Err(InventoryError::not_found(OP, format!("volume {serial}"))),
        }
    }

    #[instrument(skip(self, volume), fields(op = "register", serial = %volume.serial), err)]
    async fn register(&self, volume: Volume) -> InventoryResult<()> {
        const OP: &str = "register";
        rules::check_register(OP, &volume)?;

        let (location_addr, location_category) = location_columns(volume.location);
        let (home_addr, home_category) = location_columns(volume.home);

        sqlx::query(
            r#"
            INSERT INTO volumes (
                serial, location_addr, location_category, home_addr, home_category, category, flags
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(volume.serial.as_str())
        .bind(location_addr)
        .bind(location_category)
        .bind(home_addr)
        .bind(home_category)
        .bind(volume.category.as_str())
        .bind(i64::from(volume.flags.bits()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(OP, &volume, e))?;

        Ok(())
    }

    #[instrument(skip(self, volume), fields(op = "update", serial = %volume.serial), err)]
    async fn update(&self, volume: Volume) -> InventoryResult<()> {
        const OP: &str = "update";
        let mut tx = begin(OP, &self.pool).await?;
        let result = stage_update(&mut tx, &volume).await;
        settle(OP, tx, result).await
    }
}

// Row mapping

fn location_columns(location: Option<Location>) -> (Option<i64>, Option<&'static str>) {
    match location {
        Some(l) => (Some(i64::from(l.addr)), Some(l.category.as_str())),
        None => (None, None),
    }
}

fn location_from_columns(
    op: &'static str,
    addr: Option<i64>,
    category: Option<String>,
) -> InventoryResult<Option<Location>> {
    match (addr, category) {
        (None, None) => Ok(None),
        (Some(addr), Some(category)) => {
            let addr = u32::try_from(addr)
                .map_err(|_| InventoryError::storage(op, format!("slot address {addr} out of range")))?;
            let category = category
                .parse::<SlotCategory>()
                .map_err(|e| InventoryError::domain(op, e))?;
            Ok(Some(Location::new(addr, category)))
        }
        _ => Err(InventoryError::storage(op, "half-set location columns")),
    }
}

fn volume_from_row(op: &'static str, row: &PgRow) -> InventoryResult<Volume> {
    let column = |e: sqlx::Error| InventoryError::storage(op, format!("failed to read volume row: {e}"));

    let serial: String = row.try_get("serial").map_err(column)?;
    let location_addr: Option<i64> = row.try_get("location_addr").map_err(column)?;
    let location_category: Option<String> = row.try_get("location_category").map_err(column)?;
    let home_addr: Option<i64> = row.try_get("home_addr").map_err(column)?;
    let home_category: Option<String> = row.try_get("home_category").map_err(column)?;
    let category: String = row.try_get("category").map_err(column)?;
    let flags: i64 = row.try_get("flags").map_err(column)?;

    let flags = u32::try_from(flags)
        .map_err(|_| InventoryError::storage(op, format!("flags {flags} out of range")))?;

    Ok(Volume {
        serial: Serial::new(serial).map_err(|e| InventoryError::domain(op, e))?,
        location: location_from_columns(op, location_addr, location_category)?,
        home: location_from_columns(op, home_addr, home_category)?,
        category: category
            .parse::<VolumeCategory>()
            .map_err(|e| InventoryError::domain(op, e))?,
        flags: VolumeFlags::try_from_bits(flags).map_err(|e| InventoryError::domain(op, e))?,
    })
}

// Error mapping

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(c) = db_err.code() {
            return c.as_ref() == code;
        }
    }
    false
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Map errors of statements that write `volume`, naming the conflict.
fn map_write_error(op: &'static str, volume: &Volume, err: sqlx::Error) -> InventoryError {
    if has_code(&err, UNIQUE_VIOLATION) {
        match (violated_constraint(&err), volume.location) {
            (Some(schema::LOCATION_KEY), Some(location)) => {
                return InventoryError::LocationOccupied { op, location };
            }
            (Some(schema::VOLUMES_PKEY), _) => {
                return InventoryError::already_exists(op, format!("volume {}", volume.serial));
            }
            _ => {}
        }
    }
    map_sqlx_error(op, err)
}

/// Map SQLx errors to InventoryError.
fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> InventoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error: {}", db_err.message());

            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => InventoryError::AlreadyExists {
                    op,
                    what: db_err.constraint().unwrap_or("row").to_string(),
                },
                Some(FOREIGN_KEY_VIOLATION) => InventoryError::NotFound { op, what: msg },
                Some(CHECK_VIOLATION) => InventoryError::storage(op, format!("check constraint: {msg}")),
                _ => InventoryError::storage(op, msg),
            }
        }
        sqlx::Error::PoolClosed => InventoryError::storage(op, "connection pool closed"),
        sqlx::Error::PoolTimedOut => InventoryError::storage(op, "timed out waiting for a connection"),
        _ => InventoryError::storage(op, format!("sqlx error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_location_has_no_columns() {
        assert_eq!(location_columns(None), (None, None));
        assert_eq!(
            location_columns(Some(Location::import_export(3))),
            (Some(3), Some("import-export"))
        );
    }

    #[test]
    fn location_columns_are_read_back() {
        assert_eq!(location_from_columns("t", None, None).unwrap(), None);
        assert_eq!(
            location_from_columns("t", Some(10), Some("storage".to_string())).unwrap(),
            Some(Location::storage(10))
        );
        assert!(location_from_columns("t", Some(10), None).is_err());
        assert!(location_from_columns("t", Some(-1), Some("storage".to_string())).is_err());
        assert!(matches!(
            location_from_columns("t", Some(1), Some("shelf".to_string())),
            Err(InventoryError::Domain { .. })
        ));
    }

    #[test]
    fn missing_option_fails_before_connecting() {
        let options = Options::new()
            .with("dbhost", "localhost")
            .with("dbname", "tapevault")
            .with("username", "tape")
            .with("cleaning-prefix", "CLN");

        let err = PostgresInventory::from_options(&options).err().unwrap();
        assert_eq!(err.to_string(), "the password option must be specified");
    }

    #[tokio::test]
    async fn pool_is_created_lazily() {
        let options = Options::new()
            .with("dbhost", "db.invalid")
            .with("dbname", "tapevault")
            .with("username", "tape")
            .with("password", "secret")
            .with("cleaning-prefix", "CLN");

        assert!(PostgresInventory::from_options(&options).is_ok());
    }

    #[test]
    fn non_database_errors_are_storage() {
        let err = map_sqlx_error("volumes", sqlx::Error::PoolClosed);
        assert!(matches!(err, InventoryError::Storage { op: "volumes", .. }));
        assert!(err.is_retryable());
    }
}
