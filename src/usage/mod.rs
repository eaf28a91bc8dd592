// src/usage/mod.rs — Provider quota poller
//
// A background task fetches `/api/usage` on a fixed interval and publishes
// each result on a watch channel. When a provider's reset countdown runs
// out before the next scheduled poll, the poll is brought forward so the
// fresh quota shows up right after the reset.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::backend::types::ProviderUsage;
use crate::backend::ChatBackend;
use crate::util::group_thousands;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageStatus {
    Good,
    Moderate,
    Warning,
    Critical,
}

impl UsageStatus {
    pub fn from_percent(percent_used: f64) -> Self {
        if percent_used >= 95.0 {
            UsageStatus::Critical
        } else if percent_used >= 75.0 {
            UsageStatus::Warning
        } else if percent_used >= 50.0 {
            UsageStatus::Moderate
        } else {
            UsageStatus::Good
        }
    }

    /// Server label when recognised, otherwise derived from the percentage.
    pub fn resolve(label: &str, percent_used: f64) -> Self {
        match label {
            "good" => UsageStatus::Good,
            "moderate" => UsageStatus::Moderate,
            "warning" => UsageStatus::Warning,
            "critical" => UsageStatus::Critical,
            _ => Self::from_percent(percent_used),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Good => "good",
            UsageStatus::Moderate => "moderate",
            UsageStatus::Warning => "warning",
            UsageStatus::Critical => "critical",
        }
    }
}

/// One successful fetch. Countdowns are measured from `fetched_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub providers: BTreeMap<String, ProviderUsage>,
    pub fetched_at: Instant,
}

impl UsageSnapshot {
    pub fn new(providers: BTreeMap<String, ProviderUsage>) -> Self {
        Self {
            providers,
            fetched_at: Instant::now(),
        }
    }

    /// Seconds until `usage` resets, as of `now`.
    pub fn seconds_until_reset(&self, usage: &ProviderUsage, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.fetched_at).as_secs();
        usage.reset_in_seconds.saturating_sub(elapsed)
    }

    /// Time until the earliest provider reset, if any provider reports one.
    pub fn next_reset(&self) -> Option<Duration> {
        self.providers
            .values()
            .filter(|p| p.reset_in_seconds > 0)
            .map(|p| Duration::from_secs(p.reset_in_seconds))
            .min()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UsageState {
    Loading,
    Ready(UsageSnapshot),
    Unavailable,
}

/// Delay before the next poll: the regular interval, or just after the
/// earliest reset when that comes sooner.
pub fn next_poll_delay(state: &UsageState, interval: Duration) -> Duration {
    let reset = match state {
        UsageState::Ready(snapshot) => snapshot.next_reset(),
        _ => None,
    };
    match reset {
        Some(reset) => interval.min(reset + Duration::from_secs(1)),
        None => interval,
    }
}

pub async fn fetch_usage(backend: &dyn ChatBackend) -> UsageState {
    match backend.usage().await {
        Ok(providers) => UsageState::Ready(UsageSnapshot::new(providers)),
        Err(e) => {
            tracing::warn!("Usage fetch failed: {}", e);
            UsageState::Unavailable
        }
    }
}

/// Background usage poller with an explicit start/stop lifecycle. Dropping
/// the poller stops it.
pub struct UsagePoller {
    state_rx: watch::Receiver<UsageState>,
    refresh_tx: mpsc::Sender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl UsagePoller {
    pub fn start(backend: Arc<dyn ChatBackend>, interval: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(UsageState::Loading);
        let (refresh_tx, mut refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            tracing::debug!("Usage poller started ({}s interval)", interval.as_secs());
            loop {
                let state = fetch_usage(backend.as_ref()).await;
                let delay = next_poll_delay(&state, interval);
                if state_tx.send(state).is_err() {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    Some(()) = refresh_rx.recv() => {}
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Usage poller stopping");
                        break;
                    }
                }
            }
        });

        Self {
            state_rx,
            refresh_tx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> UsageState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UsageState> {
        self.state_rx.clone()
    }

    /// Poll now instead of waiting for the timer.
    pub fn refresh(&self) {
        // A refresh already queued is as good as a second one.
        let _ = self.refresh_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for UsagePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `{h}h {m}m`, `{m}m {s}s` or `{s}s`.
pub fn format_countdown(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

pub fn render_usage(state: &UsageState, now: Instant) -> String {
    let mut out = String::from("API Usage\n");
    let snapshot = match state {
        UsageState::Loading => {
            out.push_str("  Loading…");
            return out;
        }
        UsageState::Unavailable => {
            out.push_str("  Unavailable");
            return out;
        }
        UsageState::Ready(snapshot) => snapshot,
    };
    if snapshot.providers.is_empty() {
        out.push_str("  No providers reported.");
        return out;
    }

    let lines: Vec<String> = snapshot
        .providers
        .values()
        .map(|p| {
            let status = UsageStatus::resolve(&p.status, p.percent_used);
            let filled = ((p.percent_used.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round()
                as usize;
            let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
            let reset = format_countdown(snapshot.seconds_until_reset(p, now));
            format!(
                "  {} {:<14} {:>5.1}% [{}] {} left · resets in {} ({})",
                p.icon,
                p.display_name,
                p.percent_used,
                bar,
                group_thousands(p.remaining),
                reset,
                status.as_str()
            )
        })
        .collect();
    out.push_str(&lines.join("\n"));
    out
}
