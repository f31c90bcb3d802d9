//! Jobs, per-job outcomes and the terminal batch report

use std::time::SystemTime;

use crate::errors::{VfsError, VfsResult};

/// File operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Copy,
    Move,
    Delete,
}

impl TransferOp {
    pub fn verb(&self) -> &'static str {
        match self {
            TransferOp::Copy => "Copy",
            TransferOp::Move => "Move",
            TransferOp::Delete => "Delete",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            TransferOp::Copy => "Copied",
            TransferOp::Move => "Moved",
            TransferOp::Delete => "Deleted",
        }
    }
}

/// A single planned unit of work: one file copy, one rename or one removal
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub id: usize,
    pub source: String,
    /// Destination path in the destination view; `None` for deletes
    pub target: Option<String>,
    /// Planned size in bytes (copy) or 1 (move, delete)
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Result of one job. `Ok` carries the bytes moved through the job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: usize,
    pub source: String,
    pub target: Option<String>,
    pub result: VfsResult<u64>,
}

/// The single terminal message of a batch
#[derive(Debug)]
pub struct BatchReport {
    pub op: TransferOp,
    /// One outcome per job, ordered by job id
    pub outcomes: Vec<JobOutcome>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn bytes(&self) -> u64 {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).sum()
    }

    pub fn first_error(&self) -> Option<&VfsError> {
        self.outcomes.iter().find_map(|o| o.result.as_ref().err())
    }

    /// Status line such as "Copied 3 of 4 items"
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} of {} item{}",
            self.op.past_tense(),
            self.succeeded(),
            self.total(),
            if self.total() == 1 { "" } else { "s" }
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }

    /// Collapse into the batch result: the summary, or the failure count
    /// with the first error
    pub fn into_result(self) -> VfsResult<String> {
        let summary = self.summary();
        let failed = self.failed();
        let total = self.total();
        match self.outcomes.into_iter().find_map(|o| o.result.err()) {
            None => Ok(summary),
            Some(first) => Err(VfsError::PartialBatchFailure {
                failed,
                total,
                first: Box::new(first),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(job_id: usize, result: VfsResult<u64>) -> JobOutcome {
        JobOutcome {
            job_id,
            source: format!("/src/{}", job_id),
            target: None,
            result,
        }
    }

    #[test]
    fn test_all_ok_report() {
        let report = BatchReport {
            op: TransferOp::Copy,
            outcomes: vec![outcome(0, Ok(10)), outcome(1, Ok(5))],
            cancelled: false,
        };
        assert_eq!(report.bytes(), 15);
        assert!(report.first_error().is_none());
        assert_eq!(report.into_result().unwrap(), "Copied 2 of 2 items");
    }

    #[test]
    fn test_failure_carries_first_error() {
        let report = BatchReport {
            op: TransferOp::Delete,
            outcomes: vec![
                outcome(0, Ok(1)),
                outcome(1, Err(VfsError::NotFound("/src/1".to_string()))),
                outcome(2, Err(VfsError::PermissionDenied("/src/2".to_string()))),
            ],
            cancelled: false,
        };
        assert_eq!(report.failed(), 2);
        match report.into_result() {
            Err(VfsError::PartialBatchFailure { failed, total, first }) => {
                assert_eq!((failed, total), (2, 3));
                assert!(first.is_not_found());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_summary_marks_cancel() {
        let report = BatchReport {
            op: TransferOp::Move,
            outcomes: vec![outcome(0, Ok(1))],
            cancelled: true,
        };
        assert_eq!(report.summary(), "Moved 1 of 1 item (cancelled)");
    }
}
