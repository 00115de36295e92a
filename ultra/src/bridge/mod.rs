//! Live bridge between the session's message log and the external viewer.
//!
//! On attach the bridge writes the log to a mirror file, registers an
//! observer that rewrites the mirror after every local mutation, starts a
//! poller that folds edits made in the viewer back into the log, and
//! launches the viewer as a detached process.
//!
//! Consistency is last-snapshot-wins. Mirror writes from the observer and
//! the poller's read-compare-replace both run under the log lock, so within
//! this process a local append can never be overwritten by a stale read.

mod mirror;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::context::{ContextManager, LogChange, ObserverId, SharedLog};
use crate::names::generate_mirror_id;

pub use mirror::{
    backup_path, checksum, read_snapshot, write_backup, write_snapshot, MirrorError, MirrorFile,
    MirrorSnapshot,
};

const MIRROR_PREFIX: &str = "ultra-context";

/// How the bridge polls and whether it starts a viewer.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// The viewer's own refresh interval.
    pub refresh_interval: Duration,
    /// Spawn the viewer process.
    pub launch_viewer: bool,
    /// Ask the viewer to open a browser once it is listening.
    pub open_browser: bool,
    /// Directory for the mirror file.
    pub mirror_dir: PathBuf,
    /// Working directory handed to the viewer, so its config and log land
    /// next to the session's.
    pub working_dir: Option<PathBuf>,
}

impl BridgeOptions {
    /// The poller runs at half the viewer's refresh rate so it does not race
    /// the viewer's own writes.
    pub fn poll_interval(&self) -> Duration {
        self.refresh_interval * 2
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl From<&ViewerConfig> for BridgeOptions {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            refresh_interval: Duration::from_millis(config.refresh_interval_ms.max(50)),
            launch_viewer: true,
            open_browser: config.open_browser,
            mirror_dir: std::env::temp_dir(),
            working_dir: None,
        }
    }
}

/// An attached viewer. Owned by the session; dropping it stops the poller
/// and the mirror observer. The viewer process itself is left running.
#[derive(Debug)]
pub struct ContextBridge {
    mirror: Arc<MirrorFile>,
    log: SharedLog,
    observer: ObserverId,
    poller: JoinHandle<()>,
    viewer_url: Option<String>,
}

impl ContextBridge {
    /// Attach a viewer to the session's log. Never fails: if the mirror or
    /// the viewer cannot be set up, the session simply has no live view.
    pub fn attach(context: &ContextManager, options: &BridgeOptions) -> Self {
        let path = options
            .mirror_dir
            .join(format!("{MIRROR_PREFIX}-{}.json", generate_mirror_id()));
        let mirror = Arc::new(MirrorFile::new(path));
        let log = context.log().clone();

        let observer = {
            let mut guard = log.lock();
            if let Err(e) = mirror.publish(guard.messages()) {
                tracing::warn!("Initial mirror write failed: {e}");
            }

            let observed = Arc::clone(&mirror);
            guard.subscribe(Box::new(move |change, messages| {
                if change == LogChange::Reconciled {
                    return;
                }
                if let Err(e) = observed.publish(messages) {
                    tracing::debug!("Mirror write after {change:?} failed: {e}");
                }
            }))
        };

        let poller = spawn_poller(log.clone(), Arc::clone(&mirror), options.poll_interval());

        let viewer_url = if options.launch_viewer {
            launch_viewer(mirror.path(), options)
        } else {
            None
        };

        tracing::info!(
            session = context.session_name(),
            mirror = %mirror.path().display(),
            "Context viewer attached"
        );

        Self {
            mirror,
            log,
            observer,
            poller,
            viewer_url,
        }
    }

    pub fn mirror_path(&self) -> &Path {
        self.mirror.path()
    }

    pub fn viewer_url(&self) -> Option<&str> {
        self.viewer_url.as_deref()
    }

    /// Run one reconciliation pass immediately.
    pub fn reconcile_now(&self) -> bool {
        reconcile(&self.log, &self.mirror)
    }
}

impl Drop for ContextBridge {
    fn drop(&mut self) {
        self.poller.abort();
        self.log.lock().unsubscribe(self.observer);
    }
}

fn spawn_poller(log: SharedLog, mirror: Arc<MirrorFile>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            reconcile(&log, &mirror);
        }
    })
}

/// Replace the log with the mirror's content if the viewer changed it.
///
/// Returns `true` when the log was replaced. Missing or corrupt mirror files
/// count as "no update".
pub fn reconcile(log: &SharedLog, mirror: &MirrorFile) -> bool {
    let mut guard = log.lock();

    let snapshot = match mirror.poll_changed() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return false,
        Err(e) => {
            tracing::debug!(mirror = %mirror.path().display(), "No mirror update: {e}");
            return false;
        }
    };

    let changed = snapshot.messages.as_slice() != guard.messages();
    mirror.remember(snapshot.checksum);
    if changed {
        let count = snapshot.messages.len();
        guard.replace(snapshot.messages, LogChange::Reconciled);
        tracing::info!(count, "Log replaced with viewer edits");
    }
    changed
}

/// Spawn `ultra view` detached. Returns the URL it will listen on.
fn launch_viewer(mirror: &Path, options: &BridgeOptions) -> Option<String> {
    use std::process::{Command, Stdio};

    let port = match free_port() {
        Ok(port) => port,
        Err(e) => {
            tracing::warn!("No free port for the context viewer: {e}");
            return None;
        }
    };
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::warn!("Cannot locate the ultra executable: {e}");
            return None;
        }
    };

    let mut cmd = Command::new(exe);
    cmd.args(viewer_args(mirror, port, options))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group: Ctrl-C in the chat does not reach the viewer.
        cmd.process_group(0);
    }

    match cmd.spawn() {
        Ok(child) => {
            tracing::info!(pid = child.id(), port, "Context viewer launched");
            Some(format!("http://127.0.0.1:{port}"))
        }
        Err(e) => {
            tracing::warn!("Failed to launch context viewer: {e}");
            None
        }
    }
}

/// Arguments for the hidden `ultra view` subcommand.
fn viewer_args(mirror: &Path, port: u16, options: &BridgeOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "view".into(),
        "--mirror".into(),
        mirror.into(),
        "--port".into(),
        port.to_string().into(),
        "--refresh-ms".into(),
        options.refresh_interval.as_millis().to_string().into(),
    ];
    if let Some(dir) = &options.working_dir {
        args.push("--working-dir".into());
        args.push(dir.into());
    }
    if options.open_browser {
        args.push("--open".into());
    }
    args
}

fn free_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
