//! Repository seams for the two stores the workflow mutates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{DailyDataRecord, DailyPatch, FlagRecord, FlagStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("invalid status value '{0}'")]
    InvalidStatus(String),

    #[error("invalid stored patch: {0}")]
    InvalidPatch(#[from] serde_json::Error),
}

#[async_trait]
pub trait DailyDataRepository: Send + Sync {
    async fn insert(&self, record: &DailyDataRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DailyDataRecord>, RepositoryError>;
    /// Writes only the fields present in `patch` onto the stored record.
    async fn apply_patch(&self, id: Uuid, patch: &DailyPatch) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait FlagRepository: Send + Sync {
    async fn insert(&self, flag: &FlagRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<FlagRecord>, RepositoryError>;
    /// All flags, newest first.
    async fn list_all(&self) -> Result<Vec<FlagRecord>, RepositoryError>;
    /// One user's flags, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<FlagRecord>, RepositoryError>;
    /// True when an open or revived flag already references the record.
    async fn has_active_for_daily(&self, daily_data_id: Uuid) -> Result<bool, RepositoryError>;
    /// Persists the mutable detail fields (proposed data, remarks, slip,
    /// updated_at). Status and the admin snapshot are never written here.
    async fn update_details(&self, flag: &FlagRecord) -> Result<(), RepositoryError>;
    /// Conditional status transition: succeeds only if the current status is
    /// one of `allowed_from`, stamping `acted_by`/`action_at` in the same
    /// step. Returns the updated flag, or `None` when no row matched (flag
    /// missing or status outside the allowed set).
    async fn transition(
        &self,
        id: Uuid,
        allowed_from: &[FlagStatus],
        to: FlagStatus,
        acted_by: Uuid,
        action_at: DateTime<Utc>,
    ) -> Result<Option<FlagRecord>, RepositoryError>;
}
