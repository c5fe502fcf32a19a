//! In-memory repository backend. Backs the behavior tests and local
//! development without Postgres; the conditional-transition contract matches
//! the SQL implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::{DailyDataRepository, FlagRepository, RepositoryError};
use crate::types::{DailyDataRecord, DailyPatch, FlagRecord, FlagStatus};

#[derive(Default)]
pub struct MemoryDailyDataRepository {
    records: Mutex<HashMap<Uuid, DailyDataRecord>>,
}

impl MemoryDailyDataRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DailyDataRepository for MemoryDailyDataRepository {
    async fn insert(&self, record: &DailyDataRecord) -> Result<(), RepositoryError> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DailyDataRecord>, RepositoryError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn apply_patch(&self, id: Uuid, patch: &DailyPatch) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&id) {
            patch.apply_to(record);
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFlagRepository {
    flags: Mutex<HashMap<Uuid, FlagRecord>>,
}

impl MemoryFlagRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagRepository for MemoryFlagRepository {
    async fn insert(&self, flag: &FlagRecord) -> Result<(), RepositoryError> {
        self.flags.lock().await.insert(flag.id, flag.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FlagRecord>, RepositoryError> {
        Ok(self.flags.lock().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<FlagRecord>, RepositoryError> {
        let flags = self.flags.lock().await;
        let mut all: Vec<FlagRecord> = flags.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<FlagRecord>, RepositoryError> {
        let flags = self.flags.lock().await;
        let mut own: Vec<FlagRecord> = flags
            .values()
            .filter(|flag| flag.user_id == user_id)
            .cloned()
            .collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(own)
    }

    async fn has_active_for_daily(&self, daily_data_id: Uuid) -> Result<bool, RepositoryError> {
        let flags = self.flags.lock().await;
        Ok(flags
            .values()
            .any(|flag| flag.daily_data_id == daily_data_id && flag.status.is_actionable()))
    }

    async fn update_details(&self, flag: &FlagRecord) -> Result<(), RepositoryError> {
        let mut flags = self.flags.lock().await;
        if let Some(stored) = flags.get_mut(&flag.id) {
            stored.user_proposed = flag.user_proposed.clone();
            stored.remark_text = flag.remark_text.clone();
            stored.remark_tags = flag.remark_tags.clone();
            stored.slip_url = flag.slip_url.clone();
            stored.updated_at = flag.updated_at;
        }
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
        let mut flags = self.flags.lock().await;
        match flags.get_mut(&id) {
            Some(flag) if allowed_from.contains(&flag.status) => {
                flag.status = to;
                flag.acted_by = Some(acted_by);
                flag.action_at = Some(action_at);
                flag.updated_at = action_at;
                Ok(Some(flag.clone()))
            }
            _ => Ok(None),
        }
    }
}
