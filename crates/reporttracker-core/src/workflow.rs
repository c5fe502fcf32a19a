//! The flag review & reconciliation engine: the state machine over
//! `FlagRecord` and its interaction with the canonical `DailyDataRecord`.
//!
//! Accept and discard are the symmetric halves of one mechanism: each applies
//! a sparse patch onto the daily record. Accept applies the disputant's
//! proposed values, discard re-applies the snapshot captured when the flag
//! was raised.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::evidence::{EvidenceStore, SlipUpload};
use crate::notify::{
    dispatch, NotificationEvent, NotificationKind, NotificationSink, Recipient,
};
use crate::repository::{DailyDataRepository, FlagRepository};
use crate::types::{DailyDataRecord, DailyPatch, FlagRecord, FlagStatus, Principal};

/// The five numeric fields a submitter may contest. Kept separate from
/// `DailyPatch` so requests cannot propose division or date changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposedValues {
    pub liters: Option<f64>,
    pub dry_kilos: Option<f64>,
    pub metrolac: Option<f64>,
    pub nh3_volume: Option<f64>,
    pub tmt_d_volume: Option<f64>,
}

impl ProposedValues {
    /// Validates each present value (finite, non-negative) and converts to
    /// the shared patch type.
    pub fn into_patch(self) -> Result<DailyPatch> {
        Ok(DailyPatch {
            liters: checked("liters", self.liters)?,
            dry_kilos: checked("dryKilos", self.dry_kilos)?,
            metrolac: checked("metrolac", self.metrolac)?,
            nh3_volume: checked("nh3Volume", self.nh3_volume)?,
            tmt_d_volume: checked("tmtDVolume", self.tmt_d_volume)?,
            ..Default::default()
        })
    }
}

fn checked(field: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(WorkflowError::Validation(format!(
            "{field} must be a non-negative number"
        ))),
        other => Ok(other),
    }
}

#[derive(Debug, Clone)]
pub struct CreateFlagRequest {
    pub daily_data_id: Uuid,
    pub proposed: ProposedValues,
    pub remark_text: Option<String>,
    pub remark_tags: Vec<String>,
    pub slip: Option<SlipUpload>,
}

#[derive(Debug, Clone, Default)]
pub struct EditFlagRequest {
    pub proposed: ProposedValues,
    pub remark_text: Option<String>,
    pub remark_tags: Option<Vec<String>>,
    pub slip: Option<SlipUpload>,
}

pub struct FlagWorkflow {
    daily: Arc<dyn DailyDataRepository>,
    flags: Arc<dyn FlagRepository>,
    evidence: Arc<dyn EvidenceStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl FlagWorkflow {
    pub fn new(
        daily: Arc<dyn DailyDataRepository>,
        flags: Arc<dyn FlagRepository>,
        evidence: Arc<dyn EvidenceStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            daily,
            flags,
            evidence,
            notifier,
        }
    }

    /// Opens a dispute against a daily record. Captures the admin snapshot,
    /// stores the optional slip, and notifies all admins.
    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateFlagRequest,
    ) -> Result<FlagRecord> {
        let daily = self
            .daily
            .find_by_id(request.daily_data_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("Daily data not found".to_string()))?;

        authorize_flag_target(principal, &daily)?;

        let proposed = request.proposed.into_patch()?;
        if proposed.is_empty() {
            return Err(WorkflowError::Validation(
                "No proposed data provided".to_string(),
            ));
        }

        if self.flags.has_active_for_daily(daily.id).await? {
            return Err(WorkflowError::Conflict(
                "An open flag already exists for this record".to_string(),
            ));
        }

        let slip_url = match &request.slip {
            Some(upload) => {
                upload.validate().map_err(WorkflowError::Validation)?;
                Some(self.evidence.store(upload).await?)
            }
            None => None,
        };

        let now = Utc::now();
        let flag = FlagRecord {
            id: Uuid::new_v4(),
            daily_data_id: daily.id,
            admin_data: DailyPatch::snapshot_of(&daily),
            user_proposed: proposed,
            user_id: principal.user_id,
            remark_text: request.remark_text.unwrap_or_default(),
            remark_tags: request.remark_tags,
            slip_url,
            status: FlagStatus::Open,
            acted_by: None,
            action_at: None,
            created_at: now,
            updated_at: now,
        };
        self.flags.insert(&flag).await?;

        dispatch(
            self.notifier.clone(),
            NotificationEvent {
                recipient: Recipient::AllAdmins,
                kind: NotificationKind::FlagRaised,
                message: format!("Flag raised for {}", record_context(&flag.admin_data)),
                flag_id: flag.id,
                daily_data_id: flag.daily_data_id,
            },
        );

        Ok(flag)
    }

    /// Updates proposed values, remarks, or the slip on an existing flag.
    /// Owners may edit only while the flag is open or revived; admins may
    /// edit in any state. Status is never changed here.
    pub async fn edit(
        &self,
        principal: &Principal,
        flag_id: Uuid,
        request: EditFlagRequest,
    ) -> Result<FlagRecord> {
        let mut flag = self.fetch(flag_id).await?;

        if flag.user_id != principal.user_id && !principal.is_admin() {
            return Err(WorkflowError::Forbidden("Not authorized".to_string()));
        }
        if !principal.is_admin() && !flag.status.is_actionable() {
            return Err(WorkflowError::Forbidden(
                "Cannot edit flag after it has been accepted or discarded".to_string(),
            ));
        }

        let patch = request.proposed.into_patch()?;
        flag.user_proposed.merge_from(&patch);
        if let Some(text) = request.remark_text {
            flag.remark_text = text;
        }
        if let Some(tags) = request.remark_tags {
            flag.remark_tags = tags;
        }
        if let Some(upload) = &request.slip {
            upload.validate().map_err(WorkflowError::Validation)?;
            flag.slip_url = Some(self.evidence.store(upload).await?);
        }
        flag.updated_at = Utc::now();

        self.flags.update_details(&flag).await?;
        Ok(flag)
    }

    /// Commits the disputant's proposed values into the daily record. The
    /// status transition is a single conditional update, so a concurrent
    /// accept loses cleanly with a conflict.
    pub async fn accept(&self, principal: &Principal, flag_id: Uuid) -> Result<FlagRecord> {
        require_admin(principal)?;

        let flag = self
            .flags
            .transition(
                flag_id,
                &[FlagStatus::Open, FlagStatus::Revived],
                FlagStatus::Accepted,
                principal.user_id,
                Utc::now(),
            )
            .await?;

        let flag = match flag {
            Some(flag) => flag,
            None => return Err(self.transition_refusal(flag_id, FlagStatus::Accepted).await?),
        };

        self.daily
            .apply_patch(flag.daily_data_id, &flag.user_proposed)
            .await?;

        self.notify_owner(
            &flag,
            NotificationKind::FlagAccepted,
            format!(
                "Your flag for {} was accepted",
                record_context(&flag.admin_data)
            ),
        );
        Ok(flag)
    }

    /// Restores the daily record from the creation-time snapshot and closes
    /// the flag. Allowed from any state; restoring the same snapshot twice is
    /// harmless.
    pub async fn discard(&self, principal: &Principal, flag_id: Uuid) -> Result<FlagRecord> {
        require_admin(principal)?;

        let flag = self
            .flags
            .transition(
                flag_id,
                &[
                    FlagStatus::Open,
                    FlagStatus::Accepted,
                    FlagStatus::Discarded,
                    FlagStatus::Revived,
                ],
                FlagStatus::Discarded,
                principal.user_id,
                Utc::now(),
            )
            .await?
            .ok_or_else(|| WorkflowError::NotFound("Flag not found".to_string()))?;

        self.daily
            .apply_patch(flag.daily_data_id, &flag.admin_data)
            .await?;

        self.notify_owner(
            &flag,
            NotificationKind::FlagDiscarded,
            format!(
                "Your flag for {} was discarded by admin and the record was restored",
                record_context(&flag.admin_data)
            ),
        );
        Ok(flag)
    }

    /// Re-opens an accepted or discarded flag for admin action. Does not
    /// touch the daily record.
    pub async fn revive(&self, principal: &Principal, flag_id: Uuid) -> Result<FlagRecord> {
        require_admin(principal)?;

        let flag = self
            .flags
            .transition(
                flag_id,
                &[FlagStatus::Accepted, FlagStatus::Discarded],
                FlagStatus::Revived,
                principal.user_id,
                Utc::now(),
            )
            .await?;

        let flag = match flag {
            Some(flag) => flag,
            None => return Err(self.transition_refusal(flag_id, FlagStatus::Revived).await?),
        };

        self.notify_owner(
            &flag,
            NotificationKind::FlagRevived,
            format!(
                "Your flag for {} was revived by admin",
                record_context(&flag.admin_data)
            ),
        );
        Ok(flag)
    }

    /// Admins see every flag; everyone else only their own.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<FlagRecord>> {
        if principal.is_admin() {
            Ok(self.flags.list_all().await?)
        } else {
            Ok(self.flags.list_by_user(principal.user_id).await?)
        }
    }

    pub async fn get(&self, principal: &Principal, flag_id: Uuid) -> Result<FlagRecord> {
        let flag = self.fetch(flag_id).await?;
        if flag.user_id != principal.user_id && !principal.is_admin() {
            return Err(WorkflowError::Forbidden("Not authorized".to_string()));
        }
        Ok(flag)
    }

    async fn fetch(&self, flag_id: Uuid) -> Result<FlagRecord> {
        self.flags
            .find_by_id(flag_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("Flag not found".to_string()))
    }

    /// Distinguishes a missing flag from one whose status refused the
    /// transition.
    async fn transition_refusal(&self, flag_id: Uuid, to: FlagStatus) -> Result<WorkflowError> {
        match self.flags.find_by_id(flag_id).await? {
            Some(flag) if to == FlagStatus::Accepted && flag.status == FlagStatus::Accepted => {
                Ok(WorkflowError::Conflict("Already accepted".to_string()))
            }
            Some(flag) => Ok(WorkflowError::Conflict(format!(
                "Flag cannot be {} while {}",
                to.as_str(),
                flag.status.as_str()
            ))),
            None => Ok(WorkflowError::NotFound("Flag not found".to_string())),
        }
    }

    fn notify_owner(&self, flag: &FlagRecord, kind: NotificationKind, message: String) {
        dispatch(
            self.notifier.clone(),
            NotificationEvent {
                recipient: Recipient::User(flag.user_id),
                kind,
                message,
                flag_id: flag.id,
                daily_data_id: flag.daily_data_id,
            },
        );
    }
}

fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden("Forbidden".to_string()))
    }
}

/// A division user may only flag records of their own division; the
/// comparison is trimmed and case-insensitive. Admins may flag anything.
fn authorize_flag_target(principal: &Principal, daily: &DailyDataRecord) -> Result<()> {
    if principal.is_admin() {
        return Ok(());
    }
    let code = principal.code.as_deref().unwrap_or("").trim();
    if !code.is_empty() && code.eq_ignore_ascii_case(daily.division.trim()) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(
            "Not authorized to flag this record".to_string(),
        ))
    }
}

/// Human-readable "{division} on {date}" context for notification messages,
/// built from the creation-time snapshot.
fn record_context(snapshot: &DailyPatch) -> String {
    let division = snapshot.division.as_deref().unwrap_or("Division");
    match snapshot.date {
        Some(date) => format!("{division} on {}", date.format("%Y-%m-%d")),
        None => division.to_string(),
    }
}
