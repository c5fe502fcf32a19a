//! PostgreSQL implementations of the ReportTracker repository traits.

pub mod flags;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reporttracker_core::repository::{DailyDataRepository, RepositoryError};
use reporttracker_core::types::{DailyDataRecord, DailyPatch};

pub use flags::PostgresFlagRepository;

/// Establishes the shared connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, RepositoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PostgresDailyDataRepository {
    pool: PgPool,
}

impl PostgresDailyDataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn daily_from_row(row: &PgRow) -> Result<DailyDataRecord, RepositoryError> {
    Ok(DailyDataRecord {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        liters: row.try_get("liters")?,
        dry_kilos: row.try_get("dry_kilos")?,
        metrolac: row.try_get("metrolac")?,
        supplier_code: row.try_get("supplier_code")?,
        nh3_volume: row.try_get("nh3_volume")?,
        tmt_d_volume: row.try_get("tmt_d_volume")?,
        division: row.try_get("division")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DailyDataRepository for PostgresDailyDataRepository {
    async fn insert(&self, record: &DailyDataRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO daily_data (
                id, date, liters, dry_kilos, metrolac, supplier_code,
                nh3_volume, tmt_d_volume, division, created_by,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(record.date)
        .bind(record.liters)
        .bind(record.dry_kilos)
        .bind(record.metrolac)
        .bind(&record.supplier_code)
        .bind(record.nh3_volume)
        .bind(record.tmt_d_volume)
        .bind(&record.division)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DailyDataRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, date, liters, dry_kilos, metrolac, supplier_code,
                nh3_volume, tmt_d_volume, division, created_by,
                created_at, updated_at
            FROM daily_data
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(daily_from_row).transpose()
    }

    async fn apply_patch(&self, id: Uuid, patch: &DailyPatch) -> Result<(), RepositoryError> {
        // Sparse merge in one statement: absent patch fields keep the stored
        // value via COALESCE.
        sqlx::query(
            r#"
            UPDATE daily_data SET
                date = COALESCE($2, date),
                liters = COALESCE($3, liters),
                dry_kilos = COALESCE($4, dry_kilos),
                metrolac = COALESCE($5, metrolac),
                nh3_volume = COALESCE($6, nh3_volume),
                tmt_d_volume = COALESCE($7, tmt_d_volume),
                division = COALESCE($8, division),
                supplier_code = COALESCE($9, supplier_code),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.date)
        .bind(patch.liters)
        .bind(patch.dry_kilos)
        .bind(patch.metrolac)
        .bind(patch.nh3_volume)
        .bind(patch.tmt_d_volume)
        .bind(&patch.division)
        .bind(&patch.supplier_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
