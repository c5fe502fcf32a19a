use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// The authenticated actor, as issued by the auth collaborator. `code` is the
/// division code for division users; admins usually carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub code: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Canonical production entry for one division on one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyDataRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub liters: f64,
    pub dry_kilos: f64,
    pub metrolac: f64,
    pub supplier_code: Option<String>,
    pub nh3_volume: f64,
    pub tmt_d_volume: f64,
    pub division: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse view of a DailyDataRecord's content fields. Used both for the
/// write-once admin snapshot captured at flag creation and for the
/// user-proposed replacement values, so accept and discard share one merge
/// path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_kilos: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrolac: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nh3_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmt_d_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,
}

impl DailyPatch {
    /// Captures every content field of `record`. This is the restoration
    /// baseline for discard, so nothing is left out.
    pub fn snapshot_of(record: &DailyDataRecord) -> Self {
        Self {
            date: Some(record.date),
            liters: Some(record.liters),
            dry_kilos: Some(record.dry_kilos),
            metrolac: Some(record.metrolac),
            nh3_volume: Some(record.nh3_volume),
            tmt_d_volume: Some(record.tmt_d_volume),
            division: Some(record.division.clone()),
            supplier_code: record.supplier_code.clone(),
        }
    }

    /// Sparse merge: writes only the fields present in the patch, leaving
    /// absent fields of the target untouched.
    pub fn apply_to(&self, target: &mut DailyDataRecord) {
        if let Some(date) = self.date {
            target.date = date;
        }
        if let Some(liters) = self.liters {
            target.liters = liters;
        }
        if let Some(dry_kilos) = self.dry_kilos {
            target.dry_kilos = dry_kilos;
        }
        if let Some(metrolac) = self.metrolac {
            target.metrolac = metrolac;
        }
        if let Some(nh3_volume) = self.nh3_volume {
            target.nh3_volume = nh3_volume;
        }
        if let Some(tmt_d_volume) = self.tmt_d_volume {
            target.tmt_d_volume = tmt_d_volume;
        }
        if let Some(division) = &self.division {
            target.division = division.clone();
        }
        if let Some(supplier_code) = &self.supplier_code {
            target.supplier_code = Some(supplier_code.clone());
        }
    }

    /// Overlays the fields present in `other` onto `self`. Used by edit so a
    /// partial update extends the proposed set instead of replacing it.
    pub fn merge_from(&mut self, other: &DailyPatch) {
        if other.date.is_some() {
            self.date = other.date;
        }
        if other.liters.is_some() {
            self.liters = other.liters;
        }
        if other.dry_kilos.is_some() {
            self.dry_kilos = other.dry_kilos;
        }
        if other.metrolac.is_some() {
            self.metrolac = other.metrolac;
        }
        if other.nh3_volume.is_some() {
            self.nh3_volume = other.nh3_volume;
        }
        if other.tmt_d_volume.is_some() {
            self.tmt_d_volume = other.tmt_d_volume;
        }
        if other.division.is_some() {
            self.division = other.division.clone();
        }
        if other.supplier_code.is_some() {
            self.supplier_code = other.supplier_code.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.liters.is_none()
            && self.dry_kilos.is_none()
            && self.metrolac.is_none()
            && self.nh3_volume.is_none()
            && self.tmt_d_volume.is_none()
            && self.division.is_none()
            && self.supplier_code.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Open,
    Accepted,
    Discarded,
    Revived,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Open => "open",
            FlagStatus::Accepted => "accepted",
            FlagStatus::Discarded => "discarded",
            FlagStatus::Revived => "revived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "accepted" => Some(Self::Accepted),
            "discarded" => Some(Self::Discarded),
            "revived" => Some(Self::Revived),
            _ => None,
        }
    }

    /// Open and revived are the two "awaiting admin action" states; the
    /// distinction only records provenance.
    pub fn is_actionable(&self) -> bool {
        matches!(self, FlagStatus::Open | FlagStatus::Revived)
    }
}

/// A dispute against one DailyDataRecord. `admin_data` is the snapshot taken
/// at creation and is never altered afterwards; `user_proposed` holds only
/// the fields the submitter chose to contest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagRecord {
    pub id: Uuid,
    pub daily_data_id: Uuid,
    pub admin_data: DailyPatch,
    pub user_proposed: DailyPatch,
    pub user_id: Uuid,
    pub remark_text: String,
    pub remark_tags: Vec<String>,
    pub slip_url: Option<String>,
    pub status: FlagStatus,
    pub acted_by: Option<Uuid>,
    pub action_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
