//! Batch planning and execution

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::thread;

use rayon::prelude::*;

use super::{BatchReport, JobOutcome, ProgressEvent, TransferHandle, TransferJob, TransferOp, TransferRequest};
use crate::config::TransferConfig;
use crate::errors::{VfsError, VfsResult};
use crate::fs::utils::{base_name, copy_stream_with_progress, normalize_lexical};
use crate::providers::FileSystemView;

/// Runs batches on a fixed-size worker pool shared by every batch
pub struct TransferEngine {
    pool: Arc<rayon::ThreadPool>,
    chunk_size: usize,
}

impl TransferEngine {
    pub fn new(config: &TransferConfig) -> VfsResult<Self> {
        let workers = config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("transfer-{}", i))
            .build()
            .map_err(|e| VfsError::Io {
                path: "transfer pool".to_string(),
                source: std::io::Error::other(e),
            })?;
        log::debug!("transfer pool with {} workers", workers);

        Ok(Self {
            pool: Arc::new(pool),
            chunk_size: config.chunk_size.max(1),
        })
    }

    /// Spawn a batch and return its handle immediately
    pub fn start(&self, request: TransferRequest) -> VfsResult<TransferHandle> {
        if request.sources.is_empty() || request.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(VfsError::InvalidTarget(format!(
                "{} needs non-empty source paths",
                request.op.verb()
            )));
        }

        let (progress_tx, progress_rx) = channel::<ProgressEvent>();
        let (result_tx, result_rx) = channel::<BatchReport>();
        let cancel = Arc::new(AtomicBool::new(false));
        let pool = Arc::clone(&self.pool);
        let chunk_size = self.chunk_size;
        let flag = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("transfer-batch".to_string())
            .spawn(move || {
                let report = run_batch(&request, &pool, chunk_size, &progress_tx, &flag);
                let _ = progress_tx.send(ProgressEvent::Settled);
                let _ = result_tx.send(report);
            })
            .map_err(|e| VfsError::from_io(e, "transfer-batch"))?;

        Ok(TransferHandle {
            progress_rx,
            result_rx,
            cancel,
            handle: Some(handle),
        })
    }
}

/// Plan and execute one batch, producing its report
fn run_batch(
    request: &TransferRequest,
    pool: &rayon::ThreadPool,
    chunk_size: usize,
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> BatchReport {
    let mut planner = Planner::default();

    let mut outcomes = match request.op {
        TransferOp::Copy => {
            planner.plan_copy(request, cancel);
            let _ = progress.send(ProgressEvent::Planned {
                jobs: planner.jobs.len(),
                total_bytes: planner.jobs.iter().map(|j| j.size).sum(),
            });
            run_copy(request, &planner.jobs, pool, chunk_size, progress, cancel)
        }
        TransferOp::Move => {
            planner.plan_move(request);
            let _ = progress.send(ProgressEvent::Planned {
                jobs: planner.jobs.len(),
                total_bytes: planner.jobs.len() as u64,
            });
            run_move(request, &planner.jobs, progress, cancel)
        }
        TransferOp::Delete => {
            planner.plan_delete(request);
            let _ = progress.send(ProgressEvent::Planned {
                jobs: planner.jobs.len(),
                total_bytes: planner.jobs.len() as u64,
            });
            run_delete(request, &planner.jobs, progress, cancel)
        }
    };

    outcomes.append(&mut planner.failures);
    outcomes.sort_by_key(|o| o.job_id);

    let report = BatchReport {
        op: request.op,
        outcomes,
        cancelled: cancel.load(Ordering::Relaxed),
    };

    let mut errors = report.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (o, e)));
    if errors.next().is_some() {
        for (outcome, error) in errors {
            log::warn!("{} {}: {}", report.op.verb(), outcome.source, error);
        }
    }
    log::info!("{}", report.summary());
    report
}

/// Where planned items land in the destination view
enum Destination {
    /// An existing directory; items keep their base name
    Into(String),
    /// The exact path of a single item
    Exact(String),
}

impl Destination {
    fn resolve(view: &dyn FileSystemView, dest: &str, count: usize) -> VfsResult<Self> {
        let dest = view.resolve(dest);
        match view.stat(&dest) {
            Ok(stat) if stat.is_dir => Ok(Destination::Into(dest)),
            _ if count == 1 => Ok(Destination::Exact(dest)),
            Ok(_) => Err(VfsError::InvalidTarget(format!("{} is not a directory", dest))),
            Err(_) => {
                view.create_dir(&dest)?;
                Ok(Destination::Into(dest))
            }
        }
    }

    fn target_for(&self, view: &dyn FileSystemView, source: &str) -> String {
        match self {
            Destination::Into(dir) => view.join(dir, base_name(source)),
            Destination::Exact(path) => path.clone(),
        }
    }
}

/// Turns a request into single-file jobs; anything that fails before a job
/// exists is recorded as a failed outcome under its own job id.
#[derive(Default)]
struct Planner {
    next_id: usize,
    jobs: Vec<TransferJob>,
    failures: Vec<JobOutcome>,
}

impl Planner {
    fn take_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fail(&mut self, source: &str, target: Option<String>, error: VfsError) {
        let job_id = self.take_id();
        self.failures.push(JobOutcome {
            job_id,
            source: source.to_string(),
            target,
            result: Err(error),
        });
    }

    fn push(&mut self, source: String, target: Option<String>, size: u64, modified: Option<std::time::SystemTime>) {
        let id = self.take_id();
        self.jobs.push(TransferJob { id, source, target, size, modified });
    }

    /// Resolve the destination once for the whole batch; on failure every
    /// source fails with the same message.
    fn destination(&mut self, request: &TransferRequest, sources: &[String]) -> Option<Destination> {
        let (dest_view, dest) = request.destination.as_ref()?;

        if !dest_view.is_writable() {
            for source in sources {
                self.fail(source, Some(dest.clone()), VfsError::read_only(&dest_view.label(), dest));
            }
            return None;
        }

        match Destination::resolve(dest_view.as_ref(), dest, sources.len()) {
            Ok(d) => Some(d),
            Err(e) => {
                let message = e.to_string();
                for source in sources {
                    self.fail(source, Some(dest.clone()), VfsError::InvalidTarget(message.clone()));
                }
                None
            }
        }
    }

    fn resolved_sources(request: &TransferRequest) -> Vec<String> {
        request.sources.iter().map(|s| request.source_view.resolve(s)).collect()
    }

    fn plan_copy(&mut self, request: &TransferRequest, cancel: &AtomicBool) {
        let sources = Self::resolved_sources(request);
        let Some(destination) = self.destination(request, &sources) else {
            return;
        };
        let Some((dest_view, _)) = request.destination.as_ref() else {
            return;
        };
        let source_view = request.source_view.as_ref();

        for source in &sources {
            let target = destination.target_for(dest_view.as_ref(), source);
            if same_local_path(source_view, source, dest_view.as_ref(), &target) {
                self.fail(
                    source,
                    Some(target),
                    VfsError::InvalidTarget(format!("{} would be copied onto itself", source)),
                );
                continue;
            }
            match source_view.stat(source) {
                Err(e) => self.fail(source, Some(target), e),
                Ok(stat) if stat.is_dir => {
                    if copies_into_itself(source_view, source, dest_view.as_ref(), &target) {
                        self.fail(
                            source,
                            Some(target),
                            VfsError::Unsupported(format!("cannot copy {} into itself", source)),
                        );
                        continue;
                    }
                    self.expand_dir(source_view, dest_view.as_ref(), source, target, cancel);
                }
                Ok(stat) => self.push(source.clone(), Some(target), stat.size, stat.modified),
            }
        }
    }

    /// Create `target` and plan every file below `source`
    fn expand_dir(
        &mut self,
        source_view: &dyn FileSystemView,
        dest_view: &dyn FileSystemView,
        source: &str,
        target: String,
        cancel: &AtomicBool,
    ) {
        if cancel.load(Ordering::Relaxed) {
            self.fail(source, Some(target), VfsError::Cancelled(source.to_string()));
            return;
        }
        if let Err(e) = dest_view.create_dir(&target) {
            self.fail(source, Some(target), e);
            return;
        }
        let entries = match source_view.list_directory(source) {
            Ok(entries) => entries,
            Err(e) => {
                self.fail(source, Some(target), e);
                return;
            }
        };

        for entry in entries {
            let child_target = dest_view.join(&target, &entry.name);
            if entry.is_dir {
                self.expand_dir(source_view, dest_view, &entry.path, child_target, cancel);
            } else {
                self.push(entry.path, Some(child_target), entry.size, entry.modified);
            }
        }
    }

    fn plan_move(&mut self, request: &TransferRequest) {
        let sources = Self::resolved_sources(request);
        let Some(destination) = self.destination(request, &sources) else {
            return;
        };
        let Some((dest_view, _)) = request.destination.as_ref() else {
            return;
        };

        for source in &sources {
            let target = destination.target_for(dest_view.as_ref(), source);
            if request.source_view.local_path(source).is_none() || dest_view.local_path(&target).is_none() {
                self.fail(
                    source,
                    Some(target),
                    VfsError::Unsupported(format!(
                        "move needs local endpoints ({} -> {})",
                        request.source_view.label(),
                        dest_view.label()
                    )),
                );
                continue;
            }
            self.push(source.clone(), Some(target), 1, None);
        }
    }

    fn plan_delete(&mut self, request: &TransferRequest) {
        for source in Self::resolved_sources(request) {
            self.push(source, None, 1, None);
        }
    }
}

/// Whether `source` and `target` name the same local file
fn same_local_path(
    source_view: &dyn FileSystemView,
    source: &str,
    dest_view: &dyn FileSystemView,
    target: &str,
) -> bool {
    match (source_view.local_path(source), dest_view.local_path(target)) {
        (Some(src), Some(dst)) => normalize_lexical(&src) == normalize_lexical(&dst),
        _ => false,
    }
}

/// Whether `target` lies inside the local directory `source`
fn copies_into_itself(
    source_view: &dyn FileSystemView,
    source: &str,
    dest_view: &dyn FileSystemView,
    target: &str,
) -> bool {
    match (source_view.local_path(source), dest_view.local_path(target)) {
        (Some(src), Some(dst)) => dst.starts_with(&src),
        _ => false,
    }
}

fn run_copy(
    request: &TransferRequest,
    jobs: &[TransferJob],
    pool: &rayon::ThreadPool,
    chunk_size: usize,
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> Vec<JobOutcome> {
    let Some((dest_view, _)) = request.destination.as_ref() else {
        return Vec::new();
    };
    let source_view = request.source_view.as_ref();
    let dest_view = dest_view.as_ref();

    pool.install(|| {
        jobs.par_iter()
            .map(|job| JobOutcome {
                job_id: job.id,
                source: job.source.clone(),
                target: job.target.clone(),
                result: copy_job(job, source_view, dest_view, chunk_size, progress, cancel),
            })
            .collect()
    })
}

/// Stream one file into the destination, removing the partial file when
/// the copy does not complete
fn copy_job(
    job: &TransferJob,
    source_view: &dyn FileSystemView,
    dest_view: &dyn FileSystemView,
    chunk_size: usize,
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> VfsResult<u64> {
    if cancel.load(Ordering::Relaxed) {
        return Err(VfsError::Cancelled(job.source.clone()));
    }
    let target = job.target.as_deref().unwrap_or_default();
    log::debug!("copy {} -> {}", job.source, target);

    let mut reader = source_view.open(&job.source)?;
    let total = reader.size();
    let mut writer = dest_view.create_file(target)?;

    let job_id = job.id;
    let result = copy_stream_with_progress(&mut reader, &mut writer, chunk_size, cancel, &mut |bytes_done| {
        let _ = progress.send(ProgressEvent::Job { job_id, bytes_done, total });
    });
    drop(writer);

    match result {
        Ok(copied) => {
            if let Err(e) = reader.close() {
                log::debug!("closing {}: {}", job.source, e);
            }
            if let Some(modified) = job.modified
                && let Err(e) = dest_view.set_modified(target, modified)
            {
                log::debug!("keeping mtime of {}: {}", target, e);
            }
            Ok(copied)
        }
        Err(e) => {
            if let Err(cleanup) = dest_view.remove(target) {
                log::debug!("removing partial {}: {}", target, cleanup);
            }
            Err(VfsError::from_io(e, job.source.clone()))
        }
    }
}

fn run_move(
    request: &TransferRequest,
    jobs: &[TransferJob],
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> Vec<JobOutcome> {
    let Some((dest_view, _)) = request.destination.as_ref() else {
        return Vec::new();
    };

    run_sequential(jobs, progress, cancel, |job| {
        let target = job.target.as_deref().unwrap_or_default();
        if request.source_view.local_path(&job.source).is_none() || dest_view.local_path(target).is_none() {
            return Err(VfsError::Unsupported(format!("{} is not local", job.source)));
        }
        log::debug!("rename {} -> {}", job.source, target);
        dest_view.rename(&job.source, target)?;
        Ok(1)
    })
}

fn run_delete(
    request: &TransferRequest,
    jobs: &[TransferJob],
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> Vec<JobOutcome> {
    run_sequential(jobs, progress, cancel, |job| {
        log::debug!("remove {}", job.source);
        request.source_view.remove(&job.source)?;
        Ok(1)
    })
}

/// Run jobs one after another, collecting every outcome; each job counts
/// as one unit of progress.
fn run_sequential(
    jobs: &[TransferJob],
    progress: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
    mut run: impl FnMut(&TransferJob) -> VfsResult<u64>,
) -> Vec<JobOutcome> {
    jobs.iter()
        .map(|job| {
            let result = if cancel.load(Ordering::Relaxed) {
                Err(VfsError::Cancelled(job.source.clone()))
            } else {
                run(job)
            };
            let _ = progress.send(ProgressEvent::Job {
                job_id: job.id,
                bytes_done: 1,
                total: 1,
            });
            JobOutcome {
                job_id: job.id,
                source: job.source.clone(),
                target: job.target.clone(),
                result,
            }
        })
        .collect()
}
