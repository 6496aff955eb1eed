//! Shared tests for StageRecordRepo implementations

use chrono::Utc;

use crate::{
    db::{
        DbPool,
        error::DbError,
        tests::harness::{date, seed_case, seed_visit},
    },
    models::{RecordStage, RecordStatus, StageRecord},
};

async fn seed_visit_id(db: &DbPool) -> i64 {
    let case = seed_case(db, 2, 1).await;
    seed_visit(db, case.id, date(2022, 1, 1), "inpatient").await.id
}

async fn test_create_and_get(db: &DbPool) {
    let visit_id = seed_visit_id(db).await;
    let repo = db.transfer_records();

    let created = repo
        .create(StageRecord::pending(RecordStage::Transfer, visit_id, Utc::now()))
        .await
        .expect("Failed to create record");
    assert_eq!(created.id, visit_id);
    assert_eq!(created.stage, RecordStage::Transfer);

    let fetched = repo
        .get_by_visit_id(visit_id)
        .await
        .expect("Query failed")
        .expect("Record should exist");
    assert_eq!(fetched.status, RecordStatus::Pending);
    assert!(fetched.report_date.is_none());
}

async fn test_get_missing(db: &DbPool) {
    let result = db.transfer_records().get_by_visit_id(42).await.expect("Query failed");
    assert!(result.is_none());
}

async fn test_duplicate_create_conflicts(db: &DbPool) {
    let visit_id = seed_visit_id(db).await;
    let repo = db.transfer_records();

    repo.create(StageRecord::pending(RecordStage::Transfer, visit_id, Utc::now()))
        .await
        .expect("Failed to create record");
    repo.complete(visit_id, date(2024, 7, 1))
        .await
        .expect("Failed to complete record");

    let result = repo
        .create(StageRecord::pending(RecordStage::Transfer, visit_id, Utc::now()))
        .await;
    assert!(matches!(result, Err(DbError::Conflict(_))));

    // The existing record is never overwritten
    let record = repo
        .get_by_visit_id(visit_id)
        .await
        .expect("Query failed")
        .expect("Record should exist");
    assert_eq!(record.status, RecordStatus::Done);
    assert_eq!(record.report_date, Some(date(2024, 7, 1)));
}

async fn test_complete(db: &DbPool) {
    let visit_id = seed_visit_id(db).await;
    let repo = db.retention_records();

    repo.create(StageRecord::pending(RecordStage::Retention, visit_id, Utc::now()))
        .await
        .expect("Failed to create record");

    let done = repo
        .complete(visit_id, date(2025, 1, 15))
        .await
        .expect("Failed to complete record");
    assert_eq!(done.status, RecordStatus::Done);
    assert_eq!(done.report_date, Some(date(2025, 1, 15)));
    assert_eq!(done.stage, RecordStage::Retention);

    let again = repo.complete(visit_id, date(2025, 2, 1)).await;
    assert!(matches!(again, Err(DbError::Conflict(_))));
}

async fn test_complete_missing(db: &DbPool) {
    let result = db.destruction_records().complete(7, date(2025, 1, 1)).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

async fn test_stages_are_separate(db: &DbPool) {
    let visit_id = seed_visit_id(db).await;

    db.transfer_records()
        .create(StageRecord::pending(RecordStage::Transfer, visit_id, Utc::now()))
        .await
        .expect("Failed to create record");

    assert!(
        db.retention_records()
            .get_by_visit_id(visit_id)
            .await
            .expect("Query failed")
            .is_none()
    );
    assert!(
        db.destruction_records()
            .get_by_visit_id(visit_id)
            .await
            .expect("Query failed")
            .is_none()
    );
}

async fn test_stats(db: &DbPool) {
    let repo = db.transfer_records();
    let empty = repo.stats().await.expect("Stats failed");
    assert_eq!((empty.total, empty.done, empty.pending), (0, 0, 0));

    let case = seed_case(db, 2, 1).await;
    for day in 1..=3 {
        let visit = seed_visit(db, case.id, date(2022, 1, day), "inpatient").await;
        repo.create(StageRecord::pending(RecordStage::Transfer, visit.id, Utc::now()))
            .await
            .expect("Failed to create record");
        if day == 1 {
            repo.complete(visit.id, date(2024, 1, 1))
                .await
                .expect("Failed to complete record");
        }
    }

    let stats = repo.stats().await.expect("Stats failed");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.pending, 2);
}

async fn test_create_for_missing_visit_fails(db: &DbPool) {
    let err = db
        .transfer_records()
        .create(StageRecord::pending(RecordStage::Transfer, 9999, Utc::now()))
        .await
        .expect_err("Record for a missing visit should be rejected");
    assert!(matches!(err, DbError::Validation(_)));
    assert!(
        db.transfer_records()
            .get_by_visit_id(9999)
            .await
            .expect("Query failed")
            .is_none()
    );
}

backend_tests!(
    test_create_and_get,
    test_create_for_missing_visit_fails,
    test_get_missing,
    test_duplicate_create_conflicts,
    test_complete,
    test_complete_missing,
    test_stages_are_separate,
    test_stats,
);
