mod case_types;
mod common;
mod stage_records;
mod visits;

pub use case_types::SqliteCaseTypeRepo;
pub use stage_records::SqliteStageRecordRepo;
pub use visits::SqliteVisitRepo;
