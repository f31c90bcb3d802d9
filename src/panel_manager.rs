//! Panel manager (handles dual-pane logic)

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::commands::{Command, CommandOutcome};
use crate::config::Config;
use crate::errors::{VfsError, VfsResult};
use crate::providers::{self, LocalView, MountTarget, RemoteTarget, SharedView};
use crate::state::panel::sort_entries;
use crate::state::{Panel, Side};
use crate::transfer::{BatchProgress, BatchReport, TransferEngine, TransferHandle, TransferRequest};

/// Something the front end should show after polling
#[derive(Debug)]
pub enum Notice {
    /// New aggregate fraction of the running batch
    Progress(f64),
    /// Terminal report; the origin selection is already cleared
    Finished(BatchReport),
}

/// A batch in flight and the panel that started it
struct RunningBatch {
    origin: Side,
    handle: TransferHandle,
    progress: BatchProgress,
}

/// Manages the two file panels and their interaction
pub struct PanelManager {
    pub left: Panel,
    pub right: Panel,
    pub active: Side,
    config: Config,
    engine: TransferEngine,
    running: Option<RunningBatch>,
    /// Directory the process started in, for `local` without a path
    startup_dir: PathBuf,
}

impl PanelManager {
    /// Both panels on the local filesystem at the process working directory
    pub fn new(config: Config) -> VfsResult<Self> {
        let left: SharedView = Arc::new(LocalView::at_startup_dir());
        let right: SharedView = Arc::new(LocalView::at_startup_dir());
        Self::with_views(config, left, right)
    }

    pub fn with_views(config: Config, left: SharedView, right: SharedView) -> VfsResult<Self> {
        let engine = TransferEngine::new(&config.transfer)?;
        let startup_dir = PathBuf::from(left.current_directory());
        let show_hidden = config.general.show_hidden;

        Ok(Self {
            left: Panel::new(Side::Left, left, show_hidden),
            right: Panel::new(Side::Right, right, show_hidden),
            active: Side::Left,
            config,
            engine,
            running: None,
            startup_dir,
        })
    }

    pub fn panel(&self, side: Side) -> &Panel {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn panel_mut(&mut self, side: Side) -> &mut Panel {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Get a reference to the active panel
    pub fn active_panel(&self) -> &Panel {
        self.panel(self.active)
    }

    /// Get a mutable reference to the active panel
    pub fn active_panel_mut(&mut self) -> &mut Panel {
        self.panel_mut(self.active)
    }

    /// Get a reference to the inactive panel
    pub fn inactive_panel(&self) -> &Panel {
        self.panel(self.active.other())
    }

    /// Toggle active panel
    pub fn toggle_panel(&mut self) {
        self.active = self.active.other();
    }

    /// Refresh all panels (re-read directory contents)
    pub fn refresh_panels(&mut self) {
        self.left.refresh();
        self.right.refresh();
    }

    pub fn is_transfer_running(&self) -> bool {
        self.running.is_some()
    }

    /// Parse and run one command line
    pub fn execute(&mut self, line: &str) -> VfsResult<CommandOutcome> {
        let command = Command::parse(line)?;
        self.run(command)
    }

    pub fn run(&mut self, command: Command) -> VfsResult<CommandOutcome> {
        match command {
            Command::Navigate(target) => self.navigate(&target),
            Command::Local(path) => self.mount_local(path.as_deref()),
            Command::List(path) => {
                let view = self.active_panel().view();
                let path = view.resolve(path.as_deref().unwrap_or(""));
                let mut entries = view.list_directory(&path)?;
                sort_entries(&mut entries);
                Ok(CommandOutcome::Listing { path, entries })
            }
            Command::Stat(path) => {
                let view = self.active_panel().view();
                let path = view.resolve(&path);
                let stat = view.stat(&path)?;
                Ok(CommandOutcome::Stat { path, stat })
            }
            Command::Open(path) => self.open(&path),
            Command::Copy(pair) => self.start_transfer(TransferKind::Copy, pair),
            Command::Move(pair) => self.start_transfer(TransferKind::Move, pair),
            Command::Delete => self.start_transfer(TransferKind::Delete, None),
            Command::Select(paths) => {
                let panel = self.active_panel_mut();
                for path in &paths {
                    panel.select(path);
                }
                Ok(CommandOutcome::Selection(panel.selection.len()))
            }
            Command::Unselect(paths) => {
                let panel = self.active_panel_mut();
                for path in &paths {
                    panel.unselect(path);
                }
                Ok(CommandOutcome::Selection(panel.selection.len()))
            }
            Command::Clear => {
                self.active_panel_mut().selection.clear();
                Ok(CommandOutcome::Selection(0))
            }
            Command::Switch => {
                self.toggle_panel();
                Ok(CommandOutcome::Switched(self.active))
            }
            Command::Cancel => match &self.running {
                Some(batch) => {
                    batch.handle.cancel();
                    Ok(CommandOutcome::Cancelled)
                }
                None => Err(VfsError::Unsupported("no transfer running".to_string())),
            },
            Command::Mkdir(dir) => {
                let panel = self.active_panel_mut();
                let path = panel.view().resolve(&dir);
                panel.view().create_dir(&path)?;
                panel.refresh();
                Ok(CommandOutcome::Created(path))
            }
            Command::Touch(name) => {
                let panel = self.active_panel_mut();
                let view = Arc::clone(panel.view());
                let path = view.resolve(&name);
                match view.stat(&path) {
                    Ok(_) => view.set_modified(&path, SystemTime::now())?,
                    Err(e) if e.is_not_found() => drop(view.create_file(&path)?),
                    Err(e) => return Err(e),
                }
                panel.refresh();
                Ok(CommandOutcome::Created(path))
            }
            Command::External { program, args } => {
                let view = self.active_panel().view();
                let cwd = view.local_path(&view.current_directory());
                Ok(CommandOutcome::External { program, args, cwd })
            }
        }
    }

    /// Mount a remote or archive target, leave an archive with "..", or
    /// change directory on the current view
    fn navigate(&mut self, target: &str) -> VfsResult<CommandOutcome> {
        let view = Arc::clone(self.active_panel().view());

        let mount = if RemoteTarget::looks_remote(target) {
            Some(MountTarget::Remote(RemoteTarget::parse(target)?))
        } else if !view.is_navigable() && target == ".." {
            let anchor = view.current_directory();
            let parent = Path::new(&anchor).parent().unwrap_or(Path::new("/")).to_path_buf();
            Some(MountTarget::Local(parent))
        } else {
            MountTarget::classify(target, view.as_ref())
        };

        match mount {
            Some(mount) => {
                let new_view = providers::mount(&mount, &self.config)?;
                self.active_panel_mut().rebind(new_view);
            }
            None => self.active_panel_mut().change_directory(target)?,
        }
        Ok(self.navigated())
    }

    /// Where the active panel now is and what its view allows
    fn navigated(&self) -> CommandOutcome {
        let view = self.active_panel().view();
        CommandOutcome::Navigated {
            label: view.label(),
            path: view.current_directory(),
            writable: view.is_writable(),
            seekable: view.supports_seek(),
        }
    }

    fn mount_local(&mut self, path: Option<&str>) -> VfsResult<CommandOutcome> {
        let path = match path {
            Some(p) => crate::fs::utils::normalize_lexical(&self.startup_dir.join(p)),
            None => self.startup_dir.clone(),
        };
        if !path.is_dir() {
            return Err(VfsError::NotFound(path.display().to_string()));
        }
        let view = providers::mount(&MountTarget::Local(path), &self.config)?;
        self.active_panel_mut().rebind(view);
        Ok(self.navigated())
    }

    /// Read a whole file, up to `general.max_open_bytes`
    fn open(&self, path: &str) -> VfsResult<CommandOutcome> {
        let view = self.active_panel().view();
        let path = view.resolve(path);
        let stat = view.stat(&path)?;
        let limit = self.config.general.max_open_bytes;
        if stat.is_dir {
            return Err(VfsError::Unsupported(format!("{} is a directory", path)));
        }
        if stat.size > limit {
            return Err(VfsError::Unsupported(format!(
                "{} is {} bytes, over the {} byte limit",
                path, stat.size, limit
            )));
        }

        let stream = view.open(&path)?;
        let mut data = Vec::with_capacity(stat.size as usize);
        let mut limited = stream.take(limit);
        limited
            .read_to_end(&mut data)
            .map_err(|e| VfsError::from_io(e, path.clone()))?;
        limited.into_inner().close()?;
        Ok(CommandOutcome::Content { path, data })
    }

    fn start_transfer(&mut self, kind: TransferKind, pair: Option<(String, String)>) -> VfsResult<CommandOutcome> {
        if self.running.is_some() {
            return Err(VfsError::Unsupported("transfer already running".to_string()));
        }

        let origin = self.active;
        let source_view = Arc::clone(self.active_panel().view());
        let dest_view = Arc::clone(self.inactive_panel().view());

        let (sources, dest) = match pair {
            Some((src, dst)) => (vec![src], dst),
            None => {
                let sources = self.active_panel().selection.to_vec();
                if sources.is_empty() {
                    return Err(VfsError::InvalidTarget("nothing selected".to_string()));
                }
                (sources, dest_view.current_directory())
            }
        };
        let items = sources.len();

        let request = match kind {
            TransferKind::Copy => TransferRequest::copy(source_view, sources, dest_view, dest),
            TransferKind::Move => TransferRequest::moving(source_view, sources, dest_view, dest),
            TransferKind::Delete => TransferRequest::delete(source_view, sources),
        };
        let op = request.op;
        log::debug!("starting {} of {} item(s) from {:?} panel", op.verb(), items, origin);

        let handle = match self.engine.start(request) {
            Ok(handle) => handle,
            Err(e) => {
                self.panel_mut(origin).selection.clear();
                return Err(e);
            }
        };
        self.running = Some(RunningBatch {
            origin,
            handle,
            progress: BatchProgress::new(),
        });
        Ok(CommandOutcome::TransferStarted { op, items })
    }

    /// Drain progress and, once the batch has settled, finish it
    pub fn poll(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        let Some(batch) = self.running.as_mut() else {
            return notices;
        };

        let before = batch.progress.fraction();
        for event in batch.handle.try_progress() {
            batch.progress.apply(&event);
        }

        if let Some(report) = batch.handle.try_result() {
            for event in batch.handle.try_progress() {
                batch.progress.apply(&event);
            }
            notices.push(Notice::Progress(batch.progress.fraction()));
            self.finish(&report);
            notices.push(Notice::Finished(report));
        } else if batch.progress.fraction() > before {
            notices.push(Notice::Progress(batch.progress.fraction()));
        }
        notices
    }

    /// Block until the running batch settles
    pub fn wait_for_transfer(&mut self) -> Option<VfsResult<BatchReport>> {
        let batch = self.running.take()?;
        let origin = batch.origin;
        let report = batch.handle.wait();
        self.panel_mut(origin).selection.clear();
        self.refresh_panels();
        Some(report)
    }

    fn finish(&mut self, report: &BatchReport) {
        if let Some(batch) = self.running.take() {
            self.panel_mut(batch.origin).selection.clear();
        }
        self.refresh_panels();
        log::debug!("{}", report.summary());
    }
}

#[derive(Clone, Copy)]
enum TransferKind {
    Copy,
    Move,
    Delete,
}
