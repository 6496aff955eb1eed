use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of patient encounter. Each kind has its own retention periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    Inpatient,
    Outpatient,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Inpatient => "inpatient",
            VisitType::Outpatient => "outpatient",
        }
    }
}

impl std::str::FromStr for VisitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inpatient" => Ok(VisitType::Inpatient),
            "outpatient" => Ok(VisitType::Outpatient),
            _ => Err(format!("Invalid visit type: {}", s)),
        }
    }
}

impl std::fmt::Display for VisitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visit status. The retention engine only ever moves `Active` to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[default]
    Active,
    Inactive,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Active => "active",
            VisitStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VisitStatus::Active),
            "inactive" => Ok(VisitStatus::Inactive),
            _ => Err(format!("Invalid visit status: {}", s)),
        }
    }
}

/// A single patient encounter.
///
/// `visit_type` holds the code recorded at registration. It is kept as text
/// so that a visit with an unknown code can still be loaded and reported as a
/// per-visit failure by the retention engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub patient_id: i64,
    pub case_type_id: i64,
    pub visit_date: NaiveDate,
    pub visit_type: String,
    pub status: VisitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn is_active(&self) -> bool {
        self.status == VisitStatus::Active
    }
}

/// Request to register a visit
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVisit {
    pub patient_id: i64,
    pub case_type_id: i64,
    pub visit_date: NaiveDate,
    pub visit_type: String,
}
