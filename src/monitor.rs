//! Progress monitoring and throughput reporting
//!
//! A cheap clonable handle over shared atomic counters. Workers bump the
//! checked-address count after every batch; an optional background thread
//! renders an indicatif status line and logs throughput periodically.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Configuration for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Show the interactive status line
    pub show_progress_bar: bool,
    /// Refresh interval in milliseconds
    pub update_interval_ms: u64,
    /// Log throughput to tracing every this many seconds (0 disables)
    pub log_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            show_progress_bar: true,
            update_interval_ms: 500,
            log_interval_secs: 10,
        }
    }
}

struct MonitorState {
    checked: AtomicU64,
    matches: AtomicU64,
    running: AtomicBool,
    start: Mutex<Instant>,
}

/// Shared progress tracker for one search.
#[derive(Clone)]
pub struct SearchMonitor {
    state: Arc<MonitorState>,
}

impl SearchMonitor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MonitorState {
                checked: AtomicU64::new(0),
                matches: AtomicU64::new(0),
                running: AtomicBool::new(false),
                start: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Mark the search as started and reset the clock.
    pub fn start(&self) {
        if let Ok(mut start) = self.state.start.lock() {
            *start = Instant::now();
        }
        self.state.checked.store(0, Ordering::Relaxed);
        self.state.matches.store(0, Ordering::Relaxed);
        self.state.running.store(true, Ordering::SeqCst);
    }

    /// Mark the search as finished; stops the background reporter.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Add to the checked-address count.
    pub fn add_checked(&self, n: u64) {
        self.state.checked.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one verified match.
    pub fn record_match(&self) {
        self.state.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checked(&self) -> u64 {
        self.state.checked.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> u64 {
        self.state.matches.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.state
            .start
            .lock()
            .map(|s| s.elapsed())
            .unwrap_or_default()
    }

    /// Addresses per second since start.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.checked() as f64 / secs
        } else {
            0.0
        }
    }

    /// Spawn the background status reporter. It exits when `stop` is called.
    pub fn spawn_reporter(&self, config: MonitorConfig) -> thread::JoinHandle<()> {
        let monitor = self.clone();

        thread::spawn(move || {
            let bar = if config.show_progress_bar {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap(),
                );
                Some(pb)
            } else {
                None
            };

            let mut last_log = Instant::now();
            let log_interval = Duration::from_secs(config.log_interval_secs.max(1));

            while monitor.is_running() {
                thread::sleep(Duration::from_millis(config.update_interval_ms));

                let checked = monitor.checked();
                let matches = monitor.matches();
                let rate = monitor.rate();

                if let Some(pb) = &bar {
                    pb.set_message(format!(
                        "{} checked | {} | {} match(es)",
                        utils::format_number(checked),
                        utils::format_rate(rate),
                        matches
                    ));
                    pb.tick();
                }

                if config.log_interval_secs > 0 && last_log.elapsed() >= log_interval {
                    info!(
                        checked,
                        matches,
                        rate = format!("{:.0}/s", rate),
                        "search progress"
                    );
                    last_log = Instant::now();
                }
            }

            if let Some(pb) = bar {
                pb.finish_and_clear();
            }
        })
    }
}

impl Default for SearchMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Formatting helpers for progress output
pub mod utils {
    use std::time::Duration;

    /// Format large numbers with comma separators.
    pub fn format_number(num: u64) -> String {
        let num_str = num.to_string();
        let mut result = String::new();
        for (i, c) in num_str.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result.chars().rev().collect()
    }

    /// Format a rate with K/M units.
    pub fn format_rate(rate: f64) -> String {
        if rate >= 1_000_000.0 {
            format!("{:.1}M/s", rate / 1_000_000.0)
        } else if rate >= 1_000.0 {
            format!("{:.1}K/s", rate / 1_000.0)
        } else {
            format!("{:.0}/s", rate)
        }
    }

    /// Format a duration as h/m/s.
    pub fn format_duration(duration: Duration) -> String {
        let total = duration.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
