use sqlx::{Row, sqlite::SqliteRow};

use crate::{
    db::error::{DbError, DbResult},
    models::{RecordStage, StageRecord, Visit},
};

/// Map a `visits` row. The visit type is kept as stored text.
pub fn visit_from_row(row: &SqliteRow) -> DbResult<Visit> {
    let status_str: String = row.get("status");

    Ok(Visit {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        case_type_id: row.get("case_type_id"),
        visit_date: row.get("visit_date"),
        visit_type: row.get("visit_type"),
        status: status_str
            .parse()
            .map_err(|e: String| DbError::Internal(e))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a row of one of the stage record tables
pub fn stage_record_from_row(stage: RecordStage, row: &SqliteRow) -> DbResult<StageRecord> {
    let status_str: String = row.get("status");

    Ok(StageRecord {
        id: row.get("visit_id"),
        stage,
        report_date: row.get("report_date"),
        status: status_str
            .parse()
            .map_err(|e: String| DbError::Internal(e))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
