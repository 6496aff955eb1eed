mod case_type;
mod stage_record;
mod visit;

pub use case_type::*;
pub use stage_record::*;
pub use visit::*;
