use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::VisitType;

/// A case category with its configured retention periods.
///
/// Periods are whole years counted from the visit date. The engine only reads
/// case types; they are maintained by administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseType {
    pub id: i64,
    /// Display name, e.g. "General surgery"
    pub name: String,
    #[serde(flatten)]
    pub periods: RetentionPeriods,
    /// Free-text notes
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The four retention periods of a case type, in years.
///
/// Stored as signed integers so that a corrupted row surfaces as a validation
/// failure for the affected visits instead of a decode failure for the whole
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetentionPeriods {
    #[validate(range(min = 0))]
    pub active_inpatient_years: i32,
    #[validate(range(min = 0))]
    pub inactive_inpatient_years: i32,
    #[validate(range(min = 0))]
    pub active_outpatient_years: i32,
    #[validate(range(min = 0))]
    pub inactive_outpatient_years: i32,
}

impl RetentionPeriods {
    /// Inactive period that drives media-transfer eligibility for a visit type.
    pub fn inactive_years(&self, visit_type: VisitType) -> i32 {
        match visit_type {
            VisitType::Inpatient => self.inactive_inpatient_years,
            VisitType::Outpatient => self.inactive_outpatient_years,
        }
    }
}

/// Request to register a new case type
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCaseType {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(nested)]
    pub periods: RetentionPeriods,
    pub notes: Option<String>,
}
