//! Debounced filesystem watching.
//!
//! [`WatchLoop`] turns a stream of [`WatchEvent`]s from any [`EventSource`]
//! into rebuild triggers. One worker thread runs the Idle/Pending state
//! machine and calls the trigger callback; bursts of events inside the window
//! collapse into a single call.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::event::{CreateKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// One observed filesystem change
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub observed_at: Instant,
    pub is_dir: bool,
}

impl WatchEvent {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observed_at: Instant::now(),
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            is_dir: true,
            ..Self::file(path)
        }
    }
}

pub type EventCallback = Box<dyn Fn(WatchEvent) + Send + Sync>;

/// Minimal seam over a filesystem notification mechanism
pub trait EventSource {
    fn subscribe(&mut self, callback: EventCallback) -> Result<()>;

    /// Stop delivering events. Must be safe to call when not subscribed.
    ///
    /// Once this returns the callback is never invoked again, even if the
    /// backend still has a thread winding down.
    fn unsubscribe(&mut self);
}

/// [`EventSource`] backed by `notify`, recursive on one root directory.
///
/// Dropping a `notify` watcher only asks its event thread to exit, so each
/// delivery holds a gate that `unsubscribe` closes first.
pub struct NotifySource {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    active: Arc<Mutex<bool>>,
}

impl NotifySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watcher: None,
            active: Arc::new(Mutex::new(false)),
        }
    }
}

impl EventSource for NotifySource {
    fn subscribe(&mut self, callback: EventCallback) -> Result<()> {
        let active = Arc::new(Mutex::new(true));
        self.active = Arc::clone(&active);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| deliver(&active, &callback, res),
            Config::default(),
        )?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;
        info!("file watcher started on {:?}", self.root);
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        // Waits for an in-flight delivery to finish.
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = false;
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
            debug!("file watcher stopped");
        }
    }
}

fn deliver(active: &Mutex<bool>, callback: &EventCallback, res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            let open = active.lock().unwrap_or_else(|e| e.into_inner());
            if !*open {
                return;
            }
            for watch_event in convert_event(event) {
                callback(watch_event);
            }
        }
        Err(err) => warn!("file watch error: {err}"),
    }
}

fn convert_event(event: Event) -> Vec<WatchEvent> {
    let is_dir_kind = matches!(
        event.kind,
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
    );
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
            .paths
            .into_iter()
            .map(|path| {
                let is_dir = is_dir_kind || path.is_dir();
                WatchEvent {
                    path,
                    observed_at: Instant::now(),
                    is_dir,
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Compiled watch globs, matched against paths relative to a root
#[derive(Debug, Clone)]
pub struct PatternSet {
    root: PathBuf,
    set: GlobSet,
}

impl PatternSet {
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .with_context(|| format!("Invalid watch pattern '{}'", pattern))?;
            builder.add(glob);
        }
        Ok(Self {
            root: root.into(),
            set: builder.build()?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let rel = rel.to_string_lossy().replace('\\', "/");
        self.set.is_match(rel.as_str())
    }

    /// Not a directory event, and under a watched pattern
    pub fn is_eligible(&self, event: &WatchEvent) -> bool {
        !event.is_dir && self.matches(&event.path)
    }
}

enum Message {
    Event(WatchEvent),
    Shutdown,
}

/// Debounced trigger loop over an [`EventSource`]
pub struct WatchLoop<S: EventSource> {
    source: S,
    root: PathBuf,
    window: Duration,
    control: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: EventSource> WatchLoop<S> {
    /// `root` is the directory patterns are relative to
    pub fn new(source: S, root: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            source,
            root: root.into(),
            window,
            control: None,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Subscribe and start the debounce worker. `on_trigger` runs on the
    /// worker thread and must not touch this `WatchLoop`.
    pub fn start<F>(&mut self, patterns: &[String], on_trigger: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        if self.is_running() {
            anyhow::bail!("watch loop already started");
        }

        let patterns = PatternSet::new(&self.root, patterns)?;
        let (tx, rx) = mpsc::channel::<Message>();

        let event_tx = tx.clone();
        self.source.subscribe(Box::new(move |event| {
            let _ = event_tx.send(Message::Event(event));
        }))?;

        let window = self.window;
        let worker = std::thread::Builder::new()
            .name("ciqx-watch".into())
            .spawn(move || debounce_loop(rx, patterns, window, on_trigger));
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                self.source.unsubscribe();
                return Err(e).context("Failed to start watch worker");
            }
        };

        self.control = Some(tx);
        self.worker = Some(worker);
        Ok(())
    }

    /// Unsubscribe and wait for the worker to finish. A trigger that has not
    /// fired yet is dropped. Calling `stop` twice is fine.
    pub fn stop(&mut self) {
        self.source.unsubscribe();
        if let Some(tx) = self.control.take() {
            let _ = tx.send(Message::Shutdown);
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("watch worker panicked");
        }
    }
}

impl<S: EventSource> Drop for WatchLoop<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn debounce_loop<F: FnMut()>(
    rx: Receiver<Message>,
    patterns: PatternSet,
    window: Duration,
    mut on_trigger: F,
) {
    // Idle: block until the first eligible event.
    // Pending: wait out the window from the latest eligible event.
    let mut pending: Option<Instant> = None;

    loop {
        let message = match pending {
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => return,
            },
            Some(last) => {
                let deadline = last + window;
                let now = Instant::now();
                if now >= deadline {
                    pending = None;
                    debug!("debounce window elapsed; triggering");
                    on_trigger();
                    continue;
                }
                match rx.recv_timeout(deadline - now) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        };

        match message {
            Message::Shutdown => return,
            Message::Event(event) => {
                if patterns.is_eligible(&event) {
                    debug!(path = %event.path.display(), "eligible change");
                    pending = Some(match pending {
                        Some(last) => last.max(event.observed_at),
                        None => event.observed_at,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> PatternSet {
        let list: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        PatternSet::new("/project", &list).unwrap()
    }

    #[test]
    fn test_source_glob_matches_nested_files() {
        let set = patterns(&["source/**/*.mc"]);
        assert!(set.matches(Path::new("/project/source/App.mc")));
        assert!(set.matches(Path::new("/project/source/views/Face.mc")));
        assert!(!set.matches(Path::new("/project/source/App.xml")));
        assert!(!set.matches(Path::new("/project/other/App.mc")));
    }

    #[test]
    fn test_relative_paths_match_as_is() {
        let set = patterns(&["manifest.xml", "resources/**/*"]);
        assert!(set.matches(Path::new("manifest.xml")));
        assert!(set.matches(Path::new("resources/strings/strings.xml")));
        assert!(!set.matches(Path::new("build/manifest.xml")));
    }

    #[test]
    fn test_directory_events_are_ignored() {
        let set = patterns(&["resources/**/*"]);
        assert!(!set.is_eligible(&WatchEvent::dir("/project/resources/drawables")));
        assert!(set.is_eligible(&WatchEvent::file("/project/resources/drawables/icon.png")));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let list = vec!["source/[".to_string()];
        assert!(PatternSet::new("/project", &list).is_err());
    }

    #[test]
    fn test_inactive_source_delivers_nothing() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let callback: EventCallback = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let modify = || {
            Ok(Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
                .add_path(PathBuf::from("/project/source/App.mc")))
        };

        let active = Mutex::new(true);
        deliver(&active, &callback, modify());
        *active.lock().unwrap() = false;
        deliver(&active, &callback, modify());

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_without_subscribe_is_harmless() {
        let mut source = NotifySource::new("/project");
        source.unsubscribe();
        source.unsubscribe();
    }

    #[test]
    fn test_access_events_are_dropped() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/project/source/App.mc"));
        assert!(convert_event(event).is_empty());

        let event = Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(PathBuf::from("/project/source/new"));
        let converted = convert_event(event);
        assert_eq!(converted.len(), 1);
        assert!(converted[0].is_dir);
    }
}
