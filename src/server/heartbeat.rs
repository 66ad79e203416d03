//! Periodic maintenance for cmdlog
//!
//! A ticker task only signals that a period elapsed; the heartbeat task does
//! the lock-taking work. Ticks that arrive while the previous one is still
//! pending are coalesced.

use crate::config::HeartbeatSettings;
use crate::server::{shutdown_requested, SharedLog};
use crate::types::Entry;
use crate::Result;
use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};

/// Heartbeat that appends a timestamp record every few ticks
pub struct Heartbeat {
    settings: HeartbeatSettings,
    state: SharedLog,
}

impl Heartbeat {
    /// Create a heartbeat over the shared log
    pub fn new(settings: &HeartbeatSettings, state: SharedLog) -> Self {
        Self {
            settings: settings.clone(),
            state,
        }
    }

    /// Spawn the ticker and the heartbeat task into `tasks`
    pub fn spawn(self, tasks: &mut JoinSet<()>, shutdown: watch::Receiver<bool>) {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        tasks.spawn(run_ticker(self.settings.period(), tick_tx, shutdown.clone()));
        tasks.spawn(self.run(tick_rx, shutdown));
    }

    /// Count ticks and stamp the log on every `ticks_per_stamp`-th one.
    ///
    /// Returns when shutdown is requested or the ticker goes away.
    pub async fn run(self, mut ticks: mpsc::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        let every = u64::from(self.settings.ticks_per_stamp.max(1));
        let mut wakes = 0u64;

        loop {
            tokio::select! {
                tick = ticks.recv() => {
                    if tick.is_none() {
                        break;
                    }
                    wakes += 1;
                    if wakes % every == 0 {
                        if let Err(e) = self.stamp().await {
                            warn!("Failed to append timestamp: {}", e);
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    break;
                }
            }
        }

        debug!("Heartbeat finished after {} ticks", wakes);
    }

    /// Append one timestamp record under the log lock
    pub async fn stamp(&self) -> Result<()> {
        let entry = Entry::timestamp(&Local::now());
        let mut state = self.state.lock().await;
        state.backend.append_entry(entry).await
    }
}

async fn run_ticker(period: Duration, ticks: mpsc::Sender<()>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ticks.try_send(()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(())) => debug!("Heartbeat busy, tick coalesced"),
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
            _ = shutdown_requested(&mut shutdown) => {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::LogState;
    use crate::store::{Backend, RingStore};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn empty_log(capacity: usize) -> SharedLog {
        let ring = RingStore::new(capacity).unwrap();
        Arc::new(Mutex::new(LogState::new(Backend::Ring(ring))))
    }

    fn settings(ticks_per_stamp: u32) -> HeartbeatSettings {
        HeartbeatSettings {
            enabled: true,
            period_ms: 10,
            ticks_per_stamp,
        }
    }

    #[tokio::test]
    async fn test_stamps_every_nth_tick() {
        let log = empty_log(10);
        let heartbeat = Heartbeat::new(&settings(3), Arc::clone(&log));
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(heartbeat.run(tick_rx, shutdown_rx));
        for _ in 0..7 {
            tick_tx.send(()).await.unwrap();
        }
        drop(tick_tx);
        task.await.unwrap();

        let state = log.lock().await;
        assert_eq!(state.backend.len(), 2);
        if let Backend::Ring(ring) = &state.backend {
            assert!(ring.iter().all(|e| e.data().starts_with(b"timestamp:")));
        }
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let log = empty_log(10);
        let heartbeat = Heartbeat::new(&settings(1), Arc::clone(&log));
        let (_tick_tx, tick_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(heartbeat.run(tick_rx, shutdown_rx));
        shutdown_tx.send_replace(true);
        task.await.unwrap();

        assert!(log.lock().await.backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_delivers_ticks() {
        let (tick_tx, mut tick_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ticker = tokio::spawn(run_ticker(Duration::from_millis(10), tick_tx, shutdown_rx));
        for _ in 0..3 {
            assert_eq!(tick_rx.recv().await, Some(()));
        }

        shutdown_tx.send_replace(true);
        ticker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_heartbeat_drains() {
        let log = empty_log(10);
        let heartbeat = Heartbeat::new(&settings(2), Arc::clone(&log));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        heartbeat.spawn(&mut tasks, shutdown_rx);
        tokio::time::sleep(Duration::from_millis(55)).await;
        shutdown_tx.send_replace(true);
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        assert!(log.lock().await.backend.len() >= 1);
    }
}
