//! Background reloading of watched file and URL layers.
//!
//! A watch re-reads its origin on every tick. Unchanged bytes are ignored;
//! changed bytes are parsed and swapped into every live config holding the
//! watched layer. A failed reload keeps the previous snapshot and is
//! reported through the log and the error callback; the next tick retries.

mod scheduler;


pub use scheduler::{
    ManualScheduler, ScheduledFn, ScheduledTask, Scheduler, TaskControl, ThreadScheduler,
    TokioScheduler,
};

use crate::codec::Codec;
use crate::config::{Config, LayerId, Shared};
use crate::error::ConfigError;
use crate::feature::{Feature, FeatureSet};
use crate::loader::{Loader, LoaderOptions, Origin, parse};
use crate::tree::TreeNode;
use log::{debug, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Poll interval used when none is configured.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Callback run with each config updated by a successful reload.
pub type ReloadCallback = Arc<dyn Fn(&Config) + Send + Sync>;
/// Callback run with each failed reload.
pub type ErrorCallback = Arc<dyn Fn(&ConfigError) + Send + Sync>;

/// What wakes a watch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadTrigger {
    /// Re-read on every scheduler tick.
    #[default]
    Interval,
    /// Re-read when the file system reports a change to the file. Origins
    /// without a local file fall back to [`ReloadTrigger::Interval`].
    FileEvents,
}

/// Lifecycle of one watched layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Loading,
    Watching,
    Reloading,
}

/// How a watched layer is reloaded.
#[derive(Clone)]
pub struct WatchOptions {
    interval: Duration,
    scheduler: Arc<dyn Scheduler>,
    trigger: ReloadTrigger,
    on_reload: Option<ReloadCallback>,
    on_error: Option<ErrorCallback>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_WATCH_INTERVAL,
            scheduler: Arc::new(ThreadScheduler),
            trigger: ReloadTrigger::Interval,
            on_reload: None,
            on_error: None,
        }
    }
}

impl WatchOptions {
    /// Poll every five seconds on a [`ThreadScheduler`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Time between polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run polls on `scheduler`, e.g. a [`ManualScheduler`] in tests.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_trigger(mut self, trigger: ReloadTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Called once per config whose snapshot a reload replaced.
    pub fn on_reload(mut self, callback: impl Fn(&Config) + Send + Sync + 'static) -> Self {
        self.on_reload = Some(Arc::new(callback));
        self
    }

    /// Called for every failed or rejected reload.
    pub fn on_error(mut self, callback: impl Fn(&ConfigError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn trigger(&self) -> ReloadTrigger {
        self.trigger
    }
}

impl fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOptions")
            .field("interval", &self.interval)
            .field("trigger", &self.trigger)
            .field("on_reload", &self.on_reload.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Load `origin` through `loader` and keep it reloaded.
pub(crate) fn start(
    loader: &Loader,
    origin: Origin,
    options: WatchOptions,
) -> Result<Config, ConfigError> {
    let description = origin.info().description().to_string();
    debug!("starting watch (source={description}, state={:?})", WatchState::Loading);
    let loaded = loader.load_origin(origin.clone())?;
    let features = loader.features();

    let watch = Arc::new(WatchShared {
        description,
        layer: loaded.layer,
        origin,
        codec: loaded.codec,
        overrides: loader.overrides().clone(),
        optional: features.is_enabled(Feature::OptionalSourceOnNotFound),
        loader_options: loader.config().loader_options().clone(),
        on_reload: options.on_reload.clone(),
        on_error: options.on_error.clone(),
        state: Mutex::new(WatchState::Loading),
        last: Mutex::new(loaded.bytes),
        targets: Mutex::new(vec![Arc::downgrade(loaded.config.shared())]),
        cancelled: AtomicBool::new(false),
        reload_lock: Mutex::new(()),
        task: Mutex::new(None),
        notifier: Mutex::new(None),
    });
    watch.arm(&options)?;
    loaded.config.shared().add_watch(Arc::clone(&watch));
    *watch.state.lock() = WatchState::Watching;
    info!(
        "watching config source (source={}, interval={:?}, trigger={:?})",
        watch.description, options.interval, options.trigger
    );
    Ok(loaded.config)
}

/// Result of one reload across all targets.
#[derive(Default)]
struct ReloadOutcome {
    updated: Vec<Config>,
    rejected: Vec<ConfigError>,
}

pub(crate) struct WatchShared {
    description: String,
    layer: LayerId,
    origin: Origin,
    codec: Arc<dyn Codec>,
    overrides: FeatureSet,
    /// A missing source reloads as an empty layer.
    optional: bool,
    loader_options: LoaderOptions,
    on_reload: Option<ReloadCallback>,
    on_error: Option<ErrorCallback>,
    state: Mutex<WatchState>,
    /// Bytes of the last applied content; `None` while the source is missing.
    last: Mutex<Option<Vec<u8>>>,
    targets: Mutex<Vec<Weak<Shared>>>,
    cancelled: AtomicBool,
    reload_lock: Mutex<()>,
    task: Mutex<Option<ScheduledTask>>,
    notifier: Mutex<Option<RecommendedWatcher>>,
}

impl WatchShared {
    /// Hook the watch up to its scheduler or to file system events.
    fn arm(self: &Arc<Self>, options: &WatchOptions) -> Result<(), ConfigError> {
        if options.trigger == ReloadTrigger::FileEvents {
            if let Some(path) = self.origin.local_path(&self.loader_options) {
                let notifier = self.file_notifier(&path)?;
                *self.notifier.lock() = Some(notifier);
                return Ok(());
            }
            debug!(
                "no local file to watch, polling instead (source={})",
                self.description
            );
        }
        let weak = Arc::downgrade(self);
        let task = options.scheduler.schedule(
            options.interval,
            Box::new(move || match weak.upgrade() {
                Some(watch) => watch.tick(),
                None => TaskControl::Stop,
            }),
        )?;
        *self.task.lock() = Some(task);
        Ok(())
    }

    fn file_notifier(self: &Arc<Self>, path: &Path) -> Result<RecommendedWatcher, ConfigError> {
        let weak = Arc::downgrade(self);
        let file_name = path.file_name().map(|name| name.to_os_string());
        let mut notifier = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let Some(watch) = weak.upgrade() else {
                return;
            };
            match event {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|changed| changed.file_name() == file_name.as_deref());
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        watch.tick();
                    }
                }
                Err(err) => warn!(
                    "file watch error (source={}, error={})",
                    watch.description, err
                ),
            }
        })?;
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        notifier.watch(directory, RecursiveMode::NonRecursive)?;
        Ok(notifier)
    }

    /// One scheduled run: reload unless cancelled or a reload is in flight.
    fn tick(&self) -> TaskControl {
        if self.cancelled.load(Ordering::SeqCst) {
            return TaskControl::Stop;
        }
        let Some(_reloading) = self.reload_lock.try_lock() else {
            return TaskControl::Continue;
        };
        *self.state.lock() = WatchState::Reloading;
        match self.reload() {
            Ok(outcome) => self.report(outcome),
            Err(err) => self.report_error(&err),
        }

        // Callbacks may drop the last config, which cancels the watch.
        let cancelled = self.cancelled.load(Ordering::SeqCst);
        *self.state.lock() = if cancelled {
            WatchState::Stopped
        } else {
            WatchState::Watching
        };
        if cancelled {
            TaskControl::Stop
        } else {
            TaskControl::Continue
        }
    }

    fn report(&self, outcome: ReloadOutcome) {
        let ReloadOutcome { updated, rejected } = outcome;
        if !updated.is_empty() {
            info!(
                "reloaded config source (source={}, configs={})",
                self.description,
                updated.len()
            );
        }
        for err in &rejected {
            self.report_error(err);
        }
        if let Some(callback) = &self.on_reload {
            updated.iter().for_each(|config| callback(config));
        }
    }

    fn report_error(&self, err: &ConfigError) {
        warn!(
            "config reload failed, keeping previous values (source={}, error={})",
            self.description, err
        );
        if let Some(callback) = &self.on_error {
            callback(err);
        }
    }

    /// Re-read and re-merge into every live target.
    ///
    /// Fails only when the source cannot be read or parsed. A target whose
    /// features reject the new layer keeps its snapshot and the rejection is
    /// returned in the outcome; the other targets are still updated.
    fn reload(&self) -> Result<ReloadOutcome, ConfigError> {
        let bytes = match self.origin.read(&self.loader_options) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.is_not_found() && self.optional => None,
            Err(err) => return Err(err),
        };
        if *self.last.lock() == bytes {
            return Ok(ReloadOutcome::default());
        }
        let info = self.origin.info();
        let tree = match &bytes {
            Some(bytes) => parse(self.codec.as_ref(), bytes, &info)?,
            None => TreeNode::empty(),
        };

        let targets = self
            .targets
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect::<Vec<_>>();
        let mut outcome = ReloadOutcome::default();
        for shared in targets {
            match shared.replace_layer(self.layer, &tree, &self.overrides) {
                Ok(true) => outcome.updated.push(Config::from_shared(shared)),
                Ok(false) => {}
                Err(err) => outcome.rejected.push(err),
            }
        }
        *self.last.lock() = bytes;
        Ok(outcome)
    }

    pub(crate) fn add_target(&self, target: Weak<Shared>) {
        self.targets.lock().push(target);
    }

    /// Forget dropped configs; stop once none is left.
    pub(crate) fn release(&self) {
        let remaining = {
            let mut targets = self.targets.lock();
            targets.retain(|target| target.strong_count() > 0);
            targets.len()
        };
        if remaining == 0 {
            self.cancel();
        }
    }

    pub(crate) fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopped watching config source (source={})", self.description);
        if let Some(task) = self.task.lock().take() {
            task.cancel();
        }
        self.notifier.lock().take();
        // An in-flight reload moves to Stopped when it finishes.
        if let Some(_idle) = self.reload_lock.try_lock() {
            *self.state.lock() = WatchState::Stopped;
        }
    }

    pub(crate) fn handle(self: &Arc<Self>) -> WatchHandle {
        WatchHandle {
            watch: Arc::clone(self),
        }
    }
}

/// Control over one watch.
#[derive(Clone)]
pub struct WatchHandle {
    watch: Arc<WatchShared>,
}

impl WatchHandle {
    /// Stop reloading. A reload already running is allowed to finish.
    pub fn cancel(&self) {
        self.watch.cancel();
    }

    pub fn state(&self) -> WatchState {
        *self.watch.state.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        self.watch.cancelled.load(Ordering::SeqCst)
    }

    /// Description of the watched source.
    pub fn description(&self) -> &str {
        &self.watch.description
    }

    /// Layer this watch keeps up to date.
    pub fn layer(&self) -> LayerId {
        self.watch.layer
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("source", &self.watch.description)
            .field("state", &self.state())
            .finish()
    }
}
