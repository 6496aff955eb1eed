//! In-memory repository backend.
//!
//! Implements the same repository traits as the SQLite backend, keeping all
//! rows in process memory behind `parking_lot` mutexes. Used by the test
//! suites and for local dry runs without a database file.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{CaseTypeRepo, StageRecordRepo, VisitRepo},
    },
    models::{
        CaseType, CreateCaseType, CreateVisit, RecordStage, RecordStatus, StageRecord, StageStats,
        Visit, VisitStatus, VisitType,
    },
    retention::add_years,
};

#[derive(Default)]
struct Tables {
    cases: BTreeMap<i64, CaseType>,
    visits: BTreeMap<i64, Visit>,
    next_case_id: i64,
    next_visit_id: i64,
}

/// Visit and case tables shared by the visit and case type repos, since the
/// look-ahead query joins them.
#[derive(Clone, Default)]
pub struct MemoryTables {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryTables {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryVisitRepo {
    tables: MemoryTables,
}

impl MemoryVisitRepo {
    pub fn new(tables: MemoryTables) -> Self {
        Self { tables }
    }
}

/// Whether the look-ahead query selects `visit`, as the SQL backend decides
/// it: unknown visit types always match, a missing case never does.
fn is_lookahead_candidate(
    visit: &Visit,
    cases: &BTreeMap<i64, CaseType>,
    cutoff: NaiveDate,
) -> bool {
    let Some(case) = cases.get(&visit.case_type_id) else {
        return false;
    };
    match visit.visit_type.parse::<VisitType>() {
        Ok(visit_type) => add_years(visit.visit_date, case.periods.inactive_years(visit_type))
            .is_some_and(|exp| exp <= cutoff),
        Err(_) => true,
    }
}

#[async_trait]
impl VisitRepo for MemoryVisitRepo {
    async fn create(&self, input: CreateVisit) -> DbResult<Visit> {
        let mut tables = self.tables.inner.lock();
        if !tables.cases.contains_key(&input.case_type_id) {
            return Err(DbError::Validation(format!(
                "Case type {} does not exist",
                input.case_type_id
            )));
        }

        tables.next_visit_id += 1;
        let now = Utc::now();
        let visit = Visit {
            id: tables.next_visit_id,
            patient_id: input.patient_id,
            case_type_id: input.case_type_id,
            visit_date: input.visit_date,
            visit_type: input.visit_type,
            status: VisitStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    async fn get_visit_by_id(&self, id: i64) -> DbResult<Option<Visit>> {
        Ok(self.tables.inner.lock().visits.get(&id).cloned())
    }

    async fn get_active_visits(&self) -> DbResult<Vec<Visit>> {
        let tables = self.tables.inner.lock();
        let mut visits: Vec<Visit> = tables
            .visits
            .values()
            .filter(|v| v.is_active())
            .cloned()
            .collect();
        visits.sort_by_key(|v| (v.visit_date, v.id));
        Ok(visits)
    }

    async fn get_potentially_expired_visits(
        &self,
        cutoff: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Visit>> {
        let tables = self.tables.inner.lock();
        let mut candidates: Vec<Visit> = tables
            .visits
            .values()
            .filter(|v| is_lookahead_candidate(v, &tables.cases, cutoff))
            .cloned()
            .collect();
        candidates.sort_by_key(|v| (v.visit_date, v.id));

        Ok(candidates
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_visit_count(&self) -> DbResult<i64> {
        Ok(self.tables.inner.lock().visits.len() as i64)
    }

    async fn update_visit_status(&self, id: i64, status: VisitStatus) -> DbResult<()> {
        let mut tables = self.tables.inner.lock();
        let visit = tables.visits.get_mut(&id).ok_or(DbError::NotFound)?;
        visit.status = status;
        visit.updated_at = Utc::now();
        Ok(())
    }
}

pub struct MemoryCaseTypeRepo {
    tables: MemoryTables,
}

impl MemoryCaseTypeRepo {
    pub fn new(tables: MemoryTables) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl CaseTypeRepo for MemoryCaseTypeRepo {
    async fn create(&self, input: CreateCaseType) -> DbResult<CaseType> {
        let mut tables = self.tables.inner.lock();
        tables.next_case_id += 1;
        let case = CaseType {
            id: tables.next_case_id,
            name: input.name,
            periods: input.periods,
            notes: input.notes,
            created_at: Utc::now(),
        };
        tables.cases.insert(case.id, case.clone());
        Ok(case)
    }

    async fn get_case_by_id(&self, id: i64) -> DbResult<Option<CaseType>> {
        Ok(self.tables.inner.lock().cases.get(&id).cloned())
    }
}

pub struct MemoryStageRecordRepo {
    stage: RecordStage,
    tables: MemoryTables,
    records: Mutex<BTreeMap<i64, StageRecord>>,
}

impl MemoryStageRecordRepo {
    /// Records reference visits in `tables`, like the foreign key in SQLite.
    pub fn new(tables: MemoryTables, stage: RecordStage) -> Self {
        Self {
            stage,
            tables,
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl StageRecordRepo for MemoryStageRecordRepo {
    async fn get_by_visit_id(&self, visit_id: i64) -> DbResult<Option<StageRecord>> {
        Ok(self.records.lock().get(&visit_id).cloned())
    }

    async fn create(&self, record: StageRecord) -> DbResult<StageRecord> {
        if !self.tables.inner.lock().visits.contains_key(&record.id) {
            return Err(DbError::Validation(format!(
                "Visit {} does not exist",
                record.id
            )));
        }

        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(DbError::Conflict(format!(
                "{} record for visit {} already exists",
                self.stage, record.id
            )));
        }
        let record = StageRecord {
            stage: self.stage,
            ..record
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn complete(&self, visit_id: i64, report_date: NaiveDate) -> DbResult<StageRecord> {
        let mut records = self.records.lock();
        let record = records.get_mut(&visit_id).ok_or(DbError::NotFound)?;
        if record.is_done() {
            return Err(DbError::Conflict(format!(
                "{} record for visit {} is already done",
                self.stage, visit_id
            )));
        }
        record.status = RecordStatus::Done;
        record.report_date = Some(report_date);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn stats(&self) -> DbResult<StageStats> {
        let records = self.records.lock();
        let done = records.values().filter(|r| r.is_done()).count() as u64;
        let total = records.len() as u64;
        Ok(StageStats {
            total,
            done,
            pending: total - done,
        })
    }
}
