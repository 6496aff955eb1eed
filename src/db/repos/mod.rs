mod case_types;
mod stage_records;
mod visits;

pub use case_types::*;
pub use stage_records::*;
pub use visits::*;
