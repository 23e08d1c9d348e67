//! Background daemon for periodic sync.
//!
//! Every tick replays the sync queue and, when configured, queues the top of
//! a story list first so it is readable offline.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::time::interval;

use crate::app::{AppContext, Result, StorylineError};
use crate::fetcher::{CacheMode, ContentSource};
use crate::sync::{SyncJob, SyncOutcome};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Sync interval in seconds (default: 1800 = 30 minutes)
    pub update_interval_secs: u64,
    /// Whether to run a sync immediately on start
    pub update_on_start: bool,
    /// Log file path (None = stdout)
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 1800,
            update_on_start: true,
            log_file: None,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();
        let (digits, unit) = match s.char_indices().last() {
            Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
            _ => (s.as_str(), 's'),
        };
        let multiplier = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            _ => {
                return Err(format!(
                    "Invalid interval: {}. Use format like '1h', '30m', '1d'",
                    s
                ))
            }
        };
        match digits.parse::<u64>() {
            Ok(0) => Err("Interval must be greater than zero".to_string()),
            Ok(n) => Ok(n * multiplier),
            Err(_) => Err(format!(
                "Invalid interval: {}. Use format like '1h', '30m', '1d'",
                s
            )),
        }
    }

    /// Largest whole unit that divides `secs`, e.g. `5400` becomes `90m`.
    pub fn format_interval(secs: u64) -> String {
        const UNITS: [(u64, char); 3] = [(86400, 'd'), (3600, 'h'), (60, 'm')];
        UNITS
            .iter()
            .find(|(size, _)| secs >= *size && secs.is_multiple_of(*size))
            .map(|(size, unit)| format!("{}{}", secs / size, unit))
            .unwrap_or_else(|| format!("{}s", secs))
    }
}

/// PID file guarding against two daemons syncing the same database.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<runtime or cache dir>/storyline/daemon.pid`
    pub fn default_location() -> Option<Self> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| Self::new(d.join("storyline").join("daemon.pid")))
    }

    pub fn read(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    /// PID of a live daemon, ignoring stale files.
    pub fn running_pid(&self) -> Option<u32> {
        self.read().filter(|pid| process_exists(*pid))
    }

    pub fn write(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        writeln!(file, "{}", std::process::id())
    }

    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self {
            ctx,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Log a message with timestamp
    fn log(&self, msg: &str) {
        tracing::info!("{}", msg);
        let line = format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), msg);

        if let Some(ref log_path) = self.config.log_file {
            if let Ok(mut file) = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
            {
                let _ = writeln!(file, "{}", line);
            }
        } else {
            println!("{}", line);
        }
    }

    /// Run until SIGTERM/SIGINT
    pub async fn run(&self) -> Result<()> {
        let pid_file = PidFile::default_location()
            .ok_or_else(|| StorylineError::Other("Could not determine PID file path".into()))?;

        if let Some(pid) = pid_file.running_pid() {
            return Err(StorylineError::Other(format!(
                "Another daemon instance is already running (PID {})",
                pid
            )));
        }
        pid_file
            .write()
            .map_err(|e| StorylineError::Other(format!("Failed to write PID file: {}", e)))?;

        self.watch_signals();

        self.log(&format!(
            "storyline daemon started (sync interval: {}, PID: {})",
            DaemonConfig::format_interval(self.config.update_interval_secs),
            std::process::id()
        ));

        if self.config.update_on_start {
            self.log("Running initial sync...");
            self.run_update().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.update_interval_secs));
        timer.tick().await; // Skip the first immediate tick

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.log("Running scheduled sync...");
            self.run_update().await;
        }

        self.log("Daemon shutting down...");
        pid_file.remove();

        Ok(())
    }

    #[cfg(unix)]
    fn watch_signals(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let running = self.running.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::error!("Failed to set up signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            running.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(windows)]
    fn watch_signals(&self) {
        let running = self.running.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            running.store(false, Ordering::SeqCst);
        });
    }

    /// Run a single sync cycle
    pub async fn run_update(&self) {
        let start = Utc::now();
        let settings = &self.ctx.config.sync;

        if settings.prefetch_count > 0 {
            self.prefetch().await;
        }

        match self.ctx.sync.perform_sync(SyncJob::replay(settings)).await {
            Ok(outcomes) if outcomes.is_empty() => self.log("Sync queue is empty"),
            Ok(outcomes) => {
                let count = |wanted: SyncOutcome| outcomes.iter().filter(|(_, o)| *o == wanted).count();
                let elapsed = Utc::now().signed_duration_since(start);
                self.log(&format!(
                    "Sync complete: {} done, {} still queued, {} dropped ({:.1}s)",
                    count(SyncOutcome::Completed),
                    outcomes.iter().filter(|(_, o)| o.is_queued()).count(),
                    count(SyncOutcome::Dropped),
                    elapsed.num_milliseconds() as f64 / 1000.0
                ));
            }
            Err(e) => self.log(&format!("Failed to replay sync queue: {}", e)),
        }
    }

    async fn prefetch(&self) {
        let settings = &self.ctx.config.sync;
        match self
            .ctx
            .client
            .fetch_story_ids(settings.prefetch_filter, CacheMode::NetworkOnly)
            .await
        {
            Ok(ids) => {
                let mut queued = 0;
                for id in ids.iter().take(settings.prefetch_count) {
                    match self.ctx.sync.queue().enqueue(id) {
                        Ok(true) => queued += 1,
                        Ok(false) => {}
                        Err(e) => self.log(&format!("  Failed to queue {}: {}", id, e)),
                    }
                }
                self.log(&format!(
                    "Queued {} new {} stories",
                    queued, settings.prefetch_filter
                ));
            }
            Err(e) => self.log(&format!(
                "Failed to fetch {} stories: {}",
                settings.prefetch_filter, e
            )),
        }
    }

    /// Ask the loop to exit after the current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Signal the daemon named in the PID file to terminate.
pub fn stop_daemon() -> std::result::Result<(), String> {
    let pid_file =
        PidFile::default_location().ok_or_else(|| "Could not determine PID file path".to_string())?;
    let pid = pid_file
        .read()
        .ok_or_else(|| "No daemon is running (PID file not found)".to_string())?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();

    let status = status.map_err(|e| format!("Failed to send signal: {}", e))?;
    if status.success() {
        pid_file.remove();
        Ok(())
    } else {
        Err(format!("Failed to stop daemon (PID {})", pid))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    let Some(pid_file) = PidFile::default_location() else {
        return "Daemon is not running".to_string();
    };
    match (pid_file.read(), pid_file.running_pid()) {
        (_, Some(pid)) => format!("Daemon is running (PID: {})", pid),
        (Some(_), None) => "Daemon is not running (stale PID file)".to_string(),
        (None, None) => "Daemon is not running".to_string(),
    }
}
