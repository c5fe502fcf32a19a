//! Flag store. The status transition is a single conditional UPDATE so the
//! "allowed from" check and the acted-by stamp are one atomic step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use reporttracker_core::repository::{FlagRepository, RepositoryError};
use reporttracker_core::types::{DailyPatch, FlagRecord, FlagStatus};

#[derive(Clone)]
pub struct PostgresFlagRepository {
    pool: PgPool,
}

impl PostgresFlagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FLAG_COLUMNS: &str = r#"
    id, daily_data_id, admin_data, user_proposed, user_id,
    remark_text, remark_tags, slip_url, status, acted_by, action_at,
    created_at, updated_at
"#;

fn flag_from_row(row: &PgRow) -> Result<FlagRecord, RepositoryError> {
    let status_str: String = row.try_get("status")?;
    let status = FlagStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::InvalidStatus(status_str.clone()))?;

    let admin_data: serde_json::Value = row.try_get("admin_data")?;
    let user_proposed: serde_json::Value = row.try_get("user_proposed")?;

    Ok(FlagRecord {
        id: row.try_get("id")?,
        daily_data_id: row.try_get("daily_data_id")?,
        admin_data: serde_json::from_value::<DailyPatch>(admin_data)?,
        user_proposed: serde_json::from_value::<DailyPatch>(user_proposed)?,
        user_id: row.try_get("user_id")?,
        remark_text: row.try_get("remark_text")?,
        remark_tags: row.try_get("remark_tags")?,
        slip_url: row.try_get("slip_url")?,
        status,
        acted_by: row.try_get("acted_by")?,
        action_at: row.try_get("action_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl FlagRepository for PostgresFlagRepository {
    async fn insert(&self, flag: &FlagRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO flagged_daily_data (
                id, daily_data_id, admin_data, user_proposed, user_id,
                remark_text, remark_tags, slip_url, status, acted_by,
                action_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(flag.id)
        .bind(flag.daily_data_id)
        .bind(serde_json::to_value(&flag.admin_data)?)
        .bind(serde_json::to_value(&flag.user_proposed)?)
        .bind(flag.user_id)
        .bind(&flag.remark_text)
        .bind(&flag.remark_tags)
        .bind(&flag.slip_url)
        .bind(flag.status.as_str())
        .bind(flag.acted_by)
        .bind(flag.action_at)
        .bind(flag.created_at)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FlagRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {FLAG_COLUMNS} FROM flagged_daily_data WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(flag_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FLAG_COLUMNS} FROM flagged_daily_data ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(flag_from_row).collect()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<FlagRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FLAG_COLUMNS} FROM flagged_daily_data WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(flag_from_row).collect()
    }

    async fn has_active_for_daily(&self, daily_data_id: Uuid) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM flagged_daily_data
                WHERE daily_data_id = $1 AND status IN ('open', 'revived')
            )
            "#,
        )
        .bind(daily_data_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update_details(&self, flag: &FlagRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE flagged_daily_data SET
                user_proposed = $2,
                remark_text = $3,
                remark_tags = $4,
                slip_url = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(flag.id)
        .bind(serde_json::to_value(&flag.user_proposed)?)
        .bind(&flag.remark_text)
        .bind(&flag.remark_tags)
        .bind(&flag.slip_url)
        .bind(flag.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[FlagStatus],
        to: FlagStatus,
        acted_by: Uuid,
        action_at: DateTime<Utc>,
    ) -> Result<Option<FlagRecord>, RepositoryError> {
        let allowed: Vec<String> = allowed_from.iter().map(|s| s.as_str().to_string()).collect();

        let row = sqlx::query(&format!(
            r#"
            UPDATE flagged_daily_data SET
                status = $2,
                acted_by = $3,
                action_at = $4,
                updated_at = $4
            WHERE id = $1 AND status = ANY($5)
            RETURNING {FLAG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(acted_by)
        .bind(action_at)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(flag_from_row).transpose()
    }
}
