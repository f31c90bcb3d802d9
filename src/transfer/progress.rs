//! Progress records sent from a running batch, and their aggregation

use std::collections::HashMap;

/// One record on a batch's progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Sent once, after planning
    Planned { jobs: usize, total_bytes: u64 },
    /// Running byte count of one job
    Job { job_id: usize, bytes_done: u64, total: u64 },
    /// Sent once, right before the terminal report
    Settled,
}

/// Byte-weighted batch progress built from tagged job records.
///
/// Each job contributes the largest `bytes_done` seen for it, so records
/// arriving out of order never move the fraction backwards.
#[derive(Debug, Default)]
pub struct BatchProgress {
    total_bytes: u64,
    done: HashMap<usize, u64>,
    fraction: f64,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in and return the current fraction
    pub fn apply(&mut self, event: &ProgressEvent) -> f64 {
        match *event {
            ProgressEvent::Planned { total_bytes, .. } => {
                self.total_bytes = total_bytes;
            }
            ProgressEvent::Job { job_id, bytes_done, total } => {
                let done = self.done.entry(job_id).or_insert(0);
                *done = (*done).max(bytes_done.min(total));
            }
            ProgressEvent::Settled => {
                self.fraction = 1.0;
                return self.fraction;
            }
        }

        if self.total_bytes > 0 {
            let done: u64 = self.done.values().sum();
            let current = (done as f64 / self.total_bytes as f64).min(1.0);
            self.fraction = self.fraction.max(current);
        }
        self.fraction
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(job_id: usize, bytes_done: u64, total: u64) -> ProgressEvent {
        ProgressEvent::Job { job_id, bytes_done, total }
    }

    #[test]
    fn test_fraction_is_byte_weighted() {
        let mut p = BatchProgress::new();
        p.apply(&ProgressEvent::Planned { jobs: 2, total_bytes: 1000 });
        // the small job finishing moves the bar by its share only
        assert_eq!(p.apply(&job(0, 100, 100)), 0.1);
        assert_eq!(p.apply(&job(1, 450, 900)), 0.55);
        assert_eq!(p.apply(&job(1, 900, 900)), 1.0);
    }

    #[test]
    fn test_out_of_order_records_do_not_go_backwards() {
        let mut p = BatchProgress::new();
        p.apply(&ProgressEvent::Planned { jobs: 1, total_bytes: 100 });
        p.apply(&job(0, 80, 100));
        assert_eq!(p.apply(&job(0, 40, 100)), 0.8);
    }

    #[test]
    fn test_settled_completes_even_empty_batches() {
        let mut p = BatchProgress::new();
        assert_eq!(p.apply(&ProgressEvent::Planned { jobs: 0, total_bytes: 0 }), 0.0);
        assert_eq!(p.apply(&ProgressEvent::Settled), 1.0);
        assert_eq!(p.fraction(), 1.0);
    }
}
