use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{ActionType, ActivityStatus, Engine, EngineError, SplitOption};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for (username, role) in [
        ("amei", "user"),
        ("banai", "user"),
        ("cudad", "user"),
        ("dongi", "user"),
        ("root", "admin"),
    ] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, role) VALUES (?, ?)",
            vec![username.into(), role.into()],
        ))
        .await
        .unwrap();
    }
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO groups (id, name) VALUES (?, ?)",
        vec!["g1".into(), "Hearthside".into()],
    ))
    .await
    .unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, d, 12, 0, 0).unwrap()
}

async fn harvest_feast(engine: &Engine) -> engine::Activity {
    engine
        .new_activity("Harvest feast", day(10), day(12), "g1", None, "amei", day(1))
        .await
        .unwrap()
}

#[tokio::test]
async fn creator_is_sole_manager() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    let err = engine
        .settle_activity(activity.id, "banai", day(13))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let settled = engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap();
    assert_eq!(settled.status, ActivityStatus::Completed);
}

#[tokio::test]
async fn settlement_rejects_second_call() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap();
    let err = engine
        .settle_activity(activity.id, "amei", day(14))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let loaded = engine.activity(activity.id, "amei").await.unwrap();
    assert_eq!(loaded.status, ActivityStatus::Completed);
    assert!(loaded.is_locked);
    assert_eq!(loaded.settlement_date, Some(day(13)));
}

#[tokio::test]
async fn cancelled_activity_cannot_settle() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .cancel_activity(activity.id, "amei", day(5))
        .await
        .unwrap();
    let err = engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn join_after_start_requires_invite() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    let err = engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(11),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let participant = engine
        .invite_participant(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            "amei",
            day(11),
        )
        .await
        .unwrap();
    assert!(participant.is_active);
}

#[tokio::test]
async fn rejoin_reactivates_the_row() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(2),
        )
        .await
        .unwrap();
    let err = engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(3),
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("participant".to_string()));

    engine.leave_activity(activity.id, "banai", day(4)).await.unwrap();
    let rejoined = engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::NoSplit,
            BTreeSet::new(),
            day(5),
        )
        .await
        .unwrap();
    assert!(rejoined.is_active);
    assert_eq!(rejoined.split_option, SplitOption::NoSplit);
    assert_eq!(rejoined.joined_at, day(5));

    let listed = engine.participants(activity.id, "amei").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_id, "banai");
}

#[tokio::test]
async fn admin_joiner_is_auto_manager() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .join_activity(
            activity.id,
            "root",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(2),
        )
        .await
        .unwrap();

    // Settling by the admin exercises the manager row, and leaving amei
    // behind keeps the manager set non-empty.
    engine
        .settle_activity(activity.id, "root", day(13))
        .await
        .unwrap();
}

#[tokio::test]
async fn last_manager_cannot_be_removed() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    let err = engine
        .remove_manager(activity.id, "amei", "root", day(2))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::LastManagerViolation);

    // The sole manager may not leave either, even as a participant.
    engine
        .join_activity(
            activity.id,
            "amei",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(2),
        )
        .await
        .unwrap();
    let err = engine
        .leave_activity(activity.id, "amei", day(3))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::LastManagerViolation);

    // With a second manager in place the leave succeeds and drops both roles.
    engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(3),
        )
        .await
        .unwrap();
    engine
        .add_manager(activity.id, "banai", "amei", day(3))
        .await
        .unwrap();
    engine.leave_activity(activity.id, "amei", day(4)).await.unwrap();

    let err = engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn managers_cannot_remove_themselves() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(2),
        )
        .await
        .unwrap();
    engine
        .add_manager(activity.id, "banai", "amei", day(2))
        .await
        .unwrap();

    let err = engine
        .remove_manager(activity.id, "amei", "amei", day(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    // An admin may remove anyone, themselves included.
    engine
        .remove_manager(activity.id, "amei", "root", day(3))
        .await
        .unwrap();
    let err = engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn manager_grant_requires_active_participant() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    let err = engine
        .add_manager(activity.id, "banai", "amei", day(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    // Admins are exempt from the participant requirement.
    engine
        .add_manager(activity.id, "root", "amei", day(2))
        .await
        .unwrap();
    let err = engine
        .add_manager(activity.id, "root", "amei", day(2))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("manager".to_string()));

    let err = engine
        .add_manager(activity.id, "nobody", "amei", day(2))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("user".to_string()));
}

#[tokio::test]
async fn non_participant_manager_can_step_down() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .add_manager(activity.id, "root", "amei", day(2))
        .await
        .unwrap();
    let message = engine
        .leave_activity(activity.id, "root", day(3))
        .await
        .unwrap();
    assert!(message.contains("stepped down"));

    let err = engine
        .leave_activity(activity.id, "cudad", day(3))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("participant".to_string()));
}

#[tokio::test]
async fn audit_trail_is_newest_first_and_gated() {
    let (engine, _db) = engine_with_db().await;
    let activity = harvest_feast(&engine).await;

    engine
        .join_activity(
            activity.id,
            "banai",
            SplitOption::FullSplit,
            BTreeSet::new(),
            day(2),
        )
        .await
        .unwrap();
    engine
        .settle_activity(activity.id, "amei", day(13))
        .await
        .unwrap();

    let logs = engine.activity_logs(activity.id, "amei").await.unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].action, ActionType::Settlement);
    assert_eq!(logs[1].action, ActionType::UserJoin);
    assert_eq!(logs[2].action, ActionType::ActivityEdit);
    assert_eq!(logs[0].operator.as_deref(), Some("amei"));

    // A participant may read the trail; an outsider may not.
    engine.activity_logs(activity.id, "banai").await.unwrap();
    let err = engine
        .activity_logs(activity.id, "cudad")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}
