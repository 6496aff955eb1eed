use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Post-visit lifecycle stages. Each stage has its own record table keyed by
/// visit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    /// Conversion of the physical record to another medium
    Transfer,
    Retention,
    Destruction,
}

impl RecordStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStage::Transfer => "transfer",
            RecordStage::Retention => "retention",
            RecordStage::Destruction => "destruction",
        }
    }

    /// Backing table name for this stage.
    pub fn table(&self) -> &'static str {
        match self {
            RecordStage::Transfer => "transfer_records",
            RecordStage::Retention => "retention_records",
            RecordStage::Destruction => "destruction_records",
        }
    }

    /// Stage that must be `Done` before this one can be opened.
    pub fn predecessor(&self) -> Option<RecordStage> {
        match self {
            RecordStage::Transfer => None,
            RecordStage::Retention => Some(RecordStage::Transfer),
            RecordStage::Destruction => Some(RecordStage::Retention),
        }
    }
}

impl std::str::FromStr for RecordStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(RecordStage::Transfer),
            "retention" => Ok(RecordStage::Retention),
            "destruction" => Ok(RecordStage::Destruction),
            _ => Err(format!("Invalid record stage: {}", s)),
        }
    }
}

impl std::fmt::Display for RecordStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    Done,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "done" => Ok(RecordStatus::Done),
            _ => Err(format!("Invalid record status: {}", s)),
        }
    }
}

/// A lifecycle record sharing its id with the visit it belongs to.
///
/// A record is created `Pending` with no report date and later completed by an
/// administrator, which sets the report date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Same value as the visit id
    pub id: i64,
    pub stage: RecordStage,
    pub report_date: Option<NaiveDate>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StageRecord {
    /// A new pending record for a visit.
    pub fn pending(stage: RecordStage, visit_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: visit_id,
            stage,
            report_date: None,
            status: RecordStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == RecordStatus::Done
    }
}

pub type TransferRecord = StageRecord;
pub type RetentionRecord = StageRecord;
pub type DestructionRecord = StageRecord;

/// Record counts for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub total: u64,
    pub done: u64,
    pub pending: u64,
}
