use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CaseType, CreateCaseType},
};

/// Repository trait for case type operations
#[async_trait]
pub trait CaseTypeRepo: Send + Sync {
    async fn create(&self, input: CreateCaseType) -> DbResult<CaseType>;

    async fn get_case_by_id(&self, id: i64) -> DbResult<Option<CaseType>>;
}
