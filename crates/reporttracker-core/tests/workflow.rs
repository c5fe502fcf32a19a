use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use reporttracker_core::error::WorkflowError;
use reporttracker_core::evidence::{NoopEvidenceStore, SlipUpload};
use reporttracker_core::memory::{MemoryDailyDataRepository, MemoryFlagRepository};
use reporttracker_core::notify::{NotificationEvent, NotificationSink, NotifyError, Recipient};
use reporttracker_core::repository::DailyDataRepository;
use reporttracker_core::types::{DailyDataRecord, FlagStatus, Principal, Role};
use reporttracker_core::workflow::{
    CreateFlagRequest, EditFlagRequest, FlagWorkflow, ProposedValues,
};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError("transport down".to_string()))
    }
}

struct TestEnv {
    workflow: FlagWorkflow,
    daily: Arc<MemoryDailyDataRepository>,
    sink: Arc<RecordingSink>,
}

fn env() -> TestEnv {
    let daily = Arc::new(MemoryDailyDataRepository::new());
    let flags = Arc::new(MemoryFlagRepository::new());
    let sink = Arc::new(RecordingSink::default());
    let workflow = FlagWorkflow::new(
        daily.clone(),
        flags.clone(),
        Arc::new(NoopEvidenceStore),
        sink.clone(),
    );
    TestEnv {
        workflow,
        daily,
        sink,
    }
}

fn admin() -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
        code: None,
    }
}

fn division_user(code: &str) -> Principal {
    Principal {
        user_id: Uuid::new_v4(),
        role: Role::User,
        code: Some(code.to_string()),
    }
}

fn daily_record(division: &str) -> DailyDataRecord {
    let now = Utc::now();
    DailyDataRecord {
        id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        liters: 100.0,
        dry_kilos: 40.0,
        metrolac: 33.0,
        supplier_code: Some("S-7".to_string()),
        nh3_volume: 5.0,
        tmt_d_volume: 2.0,
        division: division.to_string(),
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn create_request(daily_data_id: Uuid, liters: Option<f64>) -> CreateFlagRequest {
    CreateFlagRequest {
        daily_data_id,
        proposed: ProposedValues {
            liters,
            ..Default::default()
        },
        remark_text: Some("entry looks wrong".to_string()),
        remark_tags: vec!["wrong-volume".to_string()],
        slip: None,
    }
}

async fn drain_spawned() {
    // Dispatch runs on spawned tasks; give them a beat to land.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn accept_applies_only_proposed_fields() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    env.workflow.accept(&admin(), flag.id).await?;

    let updated = env.daily.find_by_id(record.id).await?.unwrap();
    assert_eq!(updated.liters, 90.0);
    assert_eq!(updated.dry_kilos, 40.0);
    assert_eq!(updated.metrolac, 33.0);
    assert_eq!(updated.division, "north");
    Ok(())
}

#[tokio::test]
async fn discard_restores_snapshot_even_after_accept() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let reviewer = admin();
    env.workflow.accept(&reviewer, flag.id).await?;
    env.workflow.discard(&reviewer, flag.id).await?;

    let restored = env.daily.find_by_id(record.id).await?.unwrap();
    assert_eq!(restored.liters, 100.0);
    assert_eq!(restored.dry_kilos, 40.0);
    assert_eq!(restored.metrolac, 33.0);
    Ok(())
}

#[tokio::test]
async fn discard_twice_leaves_same_state_as_once() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let reviewer = admin();
    env.workflow.discard(&reviewer, flag.id).await?;
    let after_first = env.daily.find_by_id(record.id).await?.unwrap();

    env.workflow.discard(&reviewer, flag.id).await?;
    let after_second = env.daily.find_by_id(record.id).await?.unwrap();

    assert_eq!(after_first.liters, after_second.liters);
    assert_eq!(after_first.dry_kilos, after_second.dry_kilos);
    assert_eq!(after_first.metrolac, after_second.metrolac);
    assert_eq!(after_first.division, after_second.division);
    Ok(())
}

#[tokio::test]
async fn cross_division_user_cannot_create_but_admin_can() -> Result<()> {
    let env = env();
    let record = daily_record("south");
    env.daily.insert(&record).await?;

    let outsider = division_user("north");
    let err = env
        .workflow
        .create(&outsider, create_request(record.id, Some(90.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let flag = env
        .workflow
        .create(&admin(), create_request(record.id, Some(90.0)))
        .await?;
    assert_eq!(flag.status, FlagStatus::Open);
    Ok(())
}

#[tokio::test]
async fn division_match_is_trimmed_and_case_insensitive() -> Result<()> {
    let env = env();
    let record = daily_record("North");
    env.daily.insert(&record).await?;

    let owner = division_user(" north ");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;
    assert_eq!(flag.user_id, owner.user_id);
    Ok(())
}

#[tokio::test]
async fn owner_edit_locked_after_accept_until_revive() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let reviewer = admin();
    env.workflow.accept(&reviewer, flag.id).await?;

    let edit = EditFlagRequest {
        proposed: ProposedValues {
            liters: Some(95.0),
            ..Default::default()
        },
        remark_text: Some("changed my mind".to_string()),
        ..Default::default()
    };
    let err = env
        .workflow
        .edit(&owner, flag.id, edit.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // Nothing on the flag moved.
    let unchanged = env.workflow.get(&owner, flag.id).await?;
    assert_eq!(unchanged.user_proposed.liters, Some(90.0));
    assert_eq!(unchanged.remark_text, "entry looks wrong");

    // Revive re-enables the same edit.
    env.workflow.revive(&reviewer, flag.id).await?;
    let edited = env.workflow.edit(&owner, flag.id, edit).await?;
    assert_eq!(edited.user_proposed.liters, Some(95.0));
    assert_eq!(edited.remark_text, "changed my mind");
    Ok(())
}

#[tokio::test]
async fn accept_on_accepted_flag_conflicts_without_touching_record() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let reviewer = admin();
    env.workflow.accept(&reviewer, flag.id).await?;
    let after_first = env.daily.find_by_id(record.id).await?.unwrap();

    let err = env.workflow.accept(&reviewer, flag.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));

    let after_second = env.daily.find_by_id(record.id).await?.unwrap();
    assert_eq!(after_first, after_second);
    Ok(())
}

#[tokio::test]
async fn revive_requires_closed_flag() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let err = env.workflow.revive(&admin(), flag.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn transitions_are_admin_only() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    for result in [
        env.workflow.accept(&owner, flag.id).await,
        env.workflow.discard(&owner, flag.id).await,
        env.workflow.revive(&owner, flag.id).await,
    ] {
        assert!(matches!(result.unwrap_err(), WorkflowError::Forbidden(_)));
    }
    Ok(())
}

#[tokio::test]
async fn create_rejects_empty_proposal() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let err = env
        .workflow
        .create(&owner, create_request(record.id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    assert!(env.workflow.list(&owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn create_rejects_negative_proposed_value() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let err = env
        .workflow
        .create(&owner, create_request(record.id, Some(-1.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn create_rejects_unknown_daily_record() {
    let env = env();
    let err = env
        .workflow
        .create(&admin(), create_request(Uuid::new_v4(), Some(1.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn create_rejects_second_active_flag_for_same_record() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    env.workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;

    let err = env
        .workflow
        .create(&owner, create_request(record.id, Some(80.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Conflict(_)));

    // A discarded flag frees the record for a new dispute.
    let flags = env.workflow.list(&owner).await?;
    env.workflow.discard(&admin(), flags[0].id).await?;
    env.workflow
        .create(&owner, create_request(record.id, Some(80.0)))
        .await?;
    Ok(())
}

#[tokio::test]
async fn create_rejects_disallowed_slip_type() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let mut request = create_request(record.id, Some(90.0));
    request.slip = Some(SlipUpload {
        filename: "slip.gif".to_string(),
        content_type: "image/gif".to_string(),
        bytes: Bytes::from_static(b"gif"),
    });

    let err = env.workflow.create(&owner, request).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(env.workflow.list(&owner).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn edit_replaces_slip_and_merges_proposed() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let mut request = create_request(record.id, Some(90.0));
    request.slip = Some(SlipUpload {
        filename: "first.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: Bytes::from_static(b"pdf"),
    });
    let flag = env.workflow.create(&owner, request).await?;
    let first_slip = flag.slip_url.clone().unwrap();

    let edited = env
        .workflow
        .edit(
            &owner,
            flag.id,
            EditFlagRequest {
                proposed: ProposedValues {
                    metrolac: Some(30.5),
                    ..Default::default()
                },
                slip: Some(SlipUpload {
                    filename: "second.png".to_string(),
                    content_type: "image/png".to_string(),
                    bytes: Bytes::from_static(b"png"),
                }),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(edited.user_proposed.liters, Some(90.0));
    assert_eq!(edited.user_proposed.metrolac, Some(30.5));
    assert_ne!(edited.slip_url.unwrap(), first_slip);
    Ok(())
}

#[tokio::test]
async fn list_scopes_to_owner_unless_admin() -> Result<()> {
    let env = env();
    let north = daily_record("north");
    let south = daily_record("south");
    env.daily.insert(&north).await?;
    env.daily.insert(&south).await?;

    let north_user = division_user("north");
    let south_user = division_user("south");
    env.workflow
        .create(&north_user, create_request(north.id, Some(90.0)))
        .await?;
    env.workflow
        .create(&south_user, create_request(south.id, Some(10.0)))
        .await?;

    assert_eq!(env.workflow.list(&north_user).await?.len(), 1);
    assert_eq!(env.workflow.list(&admin()).await?.len(), 2);

    let err = env
        .workflow
        .get(
            &north_user,
            env.workflow.list(&south_user).await?[0].id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn create_notifies_admins_and_decisions_notify_owner() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;
    env.workflow.accept(&admin(), flag.id).await?;
    drain_spawned().await;

    let events = env.sink.events.lock().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].recipient, Recipient::AllAdmins);
    assert!(events[0].message.contains("north"));
    assert!(events[0].message.contains("2025-03-14"));
    assert_eq!(events[1].recipient, Recipient::User(owner.user_id));
    assert_eq!(events[1].flag_id, flag.id);
    Ok(())
}

#[tokio::test]
async fn notification_failure_does_not_fail_transition() -> Result<()> {
    let daily = Arc::new(MemoryDailyDataRepository::new());
    let flags = Arc::new(MemoryFlagRepository::new());
    let workflow = FlagWorkflow::new(
        daily.clone(),
        flags,
        Arc::new(NoopEvidenceStore),
        Arc::new(FailingSink),
    );

    let record = daily_record("north");
    daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;
    let accepted = workflow.accept(&admin(), flag.id).await?;
    assert_eq!(accepted.status, FlagStatus::Accepted);
    drain_spawned().await;

    let updated = daily.find_by_id(record.id).await?.unwrap();
    assert_eq!(updated.liters, 90.0);
    Ok(())
}

#[tokio::test]
async fn transition_stamps_acting_admin() -> Result<()> {
    let env = env();
    let record = daily_record("north");
    env.daily.insert(&record).await?;

    let owner = division_user("north");
    let flag = env
        .workflow
        .create(&owner, create_request(record.id, Some(90.0)))
        .await?;
    assert!(flag.acted_by.is_none());
    assert!(flag.action_at.is_none());

    let reviewer = admin();
    let accepted = env.workflow.accept(&reviewer, flag.id).await?;
    assert_eq!(accepted.acted_by, Some(reviewer.user_id));
    assert!(accepted.action_at.is_some());
    Ok(())
}
