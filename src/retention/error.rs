use thiserror::Error;

use crate::db::DbError;

/// Broad classification of a [`RetentionError`], used for metric labels and
/// for callers that only care about the category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: unknown visit type or a misconfigured case
    Validation,
    NotFound,
    Store,
    Cancelled,
    /// A worker task panicked or was aborted
    Internal,
    /// Several errors collected from a page or a whole batch run
    Aggregate,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Store => "store",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
            ErrorKind::Aggregate => "aggregate",
        }
    }
}

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Invalid visit type: '{0}'")]
    InvalidVisitType(String),

    #[error("Case type {case_id} is misconfigured: {reason}")]
    InvalidCase { case_id: i64, reason: String },

    #[error("Case type {0} not found")]
    CaseNotFound(i64),

    #[error("Visit {0} not found")]
    VisitNotFound(i64),

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Look-ahead of {0} months is out of range")]
    LookaheadOutOfRange(u32),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Visit {visit_id}: {source}")]
    Visit {
        visit_id: i64,
        source: Box<RetentionError>,
    },

    #[error("Page {page}: {}", join_errors(errors))]
    Page {
        page: u64,
        errors: Vec<RetentionError>,
    },

    #[error("{} page(s) failed: {}", errors.len(), join_errors(errors))]
    Batch { errors: Vec<RetentionError> },
}

fn join_errors(errors: &[RetentionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RetentionError {
    /// Attach the id of the visit being processed
    pub fn visit(visit_id: i64, source: RetentionError) -> Self {
        RetentionError::Visit {
            visit_id,
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RetentionError::InvalidVisitType(_)
            | RetentionError::InvalidCase { .. }
            | RetentionError::LookaheadOutOfRange(_) => ErrorKind::Validation,
            RetentionError::CaseNotFound(_) | RetentionError::VisitNotFound(_) => {
                ErrorKind::NotFound
            }
            RetentionError::Store(_) => ErrorKind::Store,
            RetentionError::Cancelled => ErrorKind::Cancelled,
            RetentionError::Worker(_) => ErrorKind::Internal,
            RetentionError::Visit { source, .. } => source.kind(),
            RetentionError::Page { .. } | RetentionError::Batch { .. } => ErrorKind::Aggregate,
        }
    }

    /// True if this error, or any error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            RetentionError::Cancelled => true,
            RetentionError::Visit { source, .. } => source.is_cancelled(),
            RetentionError::Page { errors, .. } | RetentionError::Batch { errors } => {
                errors.iter().any(RetentionError::is_cancelled)
            }
            _ => false,
        }
    }

    /// Number of leaf errors, counting through page and batch aggregates.
    pub fn leaf_count(&self) -> usize {
        match self {
            RetentionError::Page { errors, .. } | RetentionError::Batch { errors } => {
                errors.iter().map(RetentionError::leaf_count).sum()
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_context_keeps_inner_kind() {
        let err = RetentionError::visit(7, RetentionError::InvalidVisitType("x".into()));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Visit 7: Invalid visit type: 'x'");
    }

    #[test]
    fn test_batch_message_joins_pages() {
        let err = RetentionError::Batch {
            errors: vec![
                RetentionError::Page {
                    page: 0,
                    errors: vec![
                        RetentionError::visit(1, RetentionError::CaseNotFound(9)),
                        RetentionError::visit(2, RetentionError::Store(DbError::NotFound)),
                    ],
                },
                RetentionError::Page {
                    page: 2,
                    errors: vec![RetentionError::Cancelled],
                },
            ],
        };

        assert_eq!(err.kind(), ErrorKind::Aggregate);
        assert_eq!(err.leaf_count(), 3);
        assert!(err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "2 page(s) failed: Page 0: Visit 1: Case type 9 not found; \
             Visit 2: Store error: Not found; Page 2: Run cancelled"
        );
    }

    #[test]
    fn test_not_cancelled() {
        let err = RetentionError::Page {
            page: 1,
            errors: vec![RetentionError::VisitNotFound(3)],
        };
        assert!(!err.is_cancelled());
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
    }
}
