//! Background fleet poller. It regularly runs the status aggregator and
//! publishes the latest snapshot to any number of observers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::aggregate::Aggregator;
use super::snapshot::FleetSnapshot;

/// Options for a manually triggered refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOpts {
    /// Drop the session's cached device and group ids before the cycle,
    /// forcing a full re-discovery.
    pub reconnect: bool,
}

/// The poller's published state, replaced atomically on every cycle.
///
/// A failed cycle keeps the last good snapshot and records the error;
/// observers decide how to present stale data.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Most recent successful snapshot, if any cycle has succeeded yet.
    pub snapshot: Option<Arc<FleetSnapshot>>,
    /// Error from the most recent cycle, cleared on the next success.
    pub error: Option<String>,
    /// Number of completed cycles, successful or not.
    pub cycles: u64,
}

/// Service that periodically aggregates fleet status and publishes it
/// over a watch channel.
///
/// One cycle runs immediately on spawn, then every `poll_interval`. A
/// manual [`refresh`](FleetPoller::refresh) runs one extra cycle without
/// re-arming the scheduled timer. Shutdown is cooperative: it is observed
/// at loop-iteration boundaries only, so a cycle that is already running
/// always completes and publishes its result.
pub struct FleetPoller {
    refresh_tx: mpsc::Sender<RefreshOpts>,
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<PollState>,
}

impl FleetPoller {
    /// Spawns the polling task.
    ///
    /// `max_jitter` adds a random delay to every scheduled cycle; pass
    /// `Duration::ZERO` for a fixed cadence.
    pub fn spawn(aggregator: Aggregator, poll_interval: Duration, max_jitter: Duration) -> Self {
        // Lossy channel with capacity 1: only the most recent pending
        // refresh request is kept.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, state_rx) = watch::channel(PollState::default());

        tokio::spawn(run(
            aggregator,
            poll_interval,
            max_jitter,
            refresh_rx,
            shutdown_rx,
            state_tx,
        ));

        Self {
            refresh_tx,
            shutdown_tx,
            state_rx,
        }
    }

    /// A receiver for the published poll state. The current value is
    /// always a complete, internally consistent state.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    /// Requests one extra aggregation cycle outside the regular cadence.
    ///
    /// Does not block. If a refresh is already pending, the newer request
    /// is dropped. The scheduled cycle's deadline is left untouched, so
    /// the regular cadence shifts by at most the manual cycle's duration.
    pub fn refresh(&self, opts: RefreshOpts) {
        let _ = self.refresh_tx.try_send(opts);
    }

    /// Stops the loop after any in-flight cycle finishes.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for FleetPoller {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn run(
    mut aggregator: Aggregator,
    poll_interval: Duration,
    max_jitter: Duration,
    mut refresh_rx: mpsc::Receiver<RefreshOpts>,
    mut shutdown_rx: broadcast::Receiver<()>,
    state_tx: watch::Sender<PollState>,
) {
    // First cycle runs right away so observers don't wait a full interval
    // for initial data.
    run_cycle(&mut aggregator, &state_tx).await;
    let mut next_poll = Instant::now() + next_delay(poll_interval, max_jitter);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("poller shutting down");
                break;
            }

            opts = refresh_rx.recv() => {
                match opts {
                    Some(RefreshOpts { reconnect }) => {
                        if reconnect {
                            aggregator.reset();
                        }
                        run_cycle(&mut aggregator, &state_tx).await;
                    }
                    None => break,
                }
            }

            _ = tokio::time::sleep_until(next_poll) => {
                run_cycle(&mut aggregator, &state_tx).await;
                next_poll = Instant::now() + next_delay(poll_interval, max_jitter);
            }
        }
    }
}

fn next_delay(poll_interval: Duration, max_jitter: Duration) -> Duration {
    if max_jitter.is_zero() {
        return poll_interval;
    }
    let jitter_ms = rand::random_range(0..=max_jitter.as_millis() as u64);
    poll_interval + Duration::from_millis(jitter_ms)
}

#[instrument(level = "debug", skip_all)]
async fn run_cycle(aggregator: &mut Aggregator, state_tx: &watch::Sender<PollState>) {
    match aggregator.snapshot().await {
        Ok(snapshot) => {
            state_tx.send_modify(|state| {
                state.snapshot = Some(Arc::new(snapshot));
                state.error = None;
                state.cycles += 1;
            });
        }
        Err(err) => {
            warn!(error = %err, "fleet poll cycle failed");
            state_tx.send_modify(|state| {
                state.error = Some(err.to_string());
                state.cycles += 1;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestConfig;
    use crate::controller::{Endpoint, FleetClient};
    use mockito::{Matcher, Server, ServerGuard};
    use pretty_assertions::assert_eq;
    use tokio::time::timeout;

    fn test_aggregator(server: &Server) -> Aggregator {
        let endpoint: Endpoint = server.host_with_port().parse().unwrap();
        let client = FleetClient::new(endpoint, &RequestConfig::default()).unwrap();
        Aggregator::new(client, Duration::from_secs(2))
    }

    async fn mock_fleet(server: &mut ServerGuard) -> [mockito::Mock; 4] {
        let devices = server
            .mock("GET", "/api/devices")
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"devices": [{"deviceId": "dev-1"}]}}"#)
            .create_async()
            .await;
        let groups = server
            .mock("GET", "/api/robot/groups")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"robotGroups": [{"id": "grp-1"}]}}"#)
            .create_async()
            .await;
        let robots = server
            .mock("GET", "/api/robots")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"robots": [{"id": "r1", "name": "Bella"}]}}"#)
            .create_async()
            .await;
        let status = server
            .mock("GET", "/api/robot/status")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"robotState": "Free", "robotPower": 90}}"#)
            .create_async()
            .await;
        [devices, groups, robots, status]
    }

    /// Waits until the published cycle counter reaches `cycles`.
    async fn wait_for_cycles(rx: &mut watch::Receiver<PollState>, cycles: u64, wait: Duration) {
        timeout(wait, async {
            loop {
                if rx.borrow().cycles >= cycles {
                    return;
                }
                rx.changed().await.expect("poller dropped the channel");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("poller did not reach {cycles} cycles in {wait:?}"));
    }

    #[tokio::test]
    async fn poller_publishes_snapshots_on_schedule() {
        let mut server = Server::new_async().await;
        let _fleet = mock_fleet(&mut server).await;

        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_millis(150),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();

        // Initial cycle plus at least two scheduled ones.
        wait_for_cycles(&mut rx, 3, Duration::from_secs(3)).await;

        let state = rx.borrow().clone();
        assert!(state.error.is_none());
        let snapshot = state.snapshot.expect("snapshot after successful cycles");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.robots()[0].name, "Bella");
    }

    #[tokio::test]
    async fn failed_cycle_holds_last_snapshot_and_reports_error() {
        let mut server = Server::new_async().await;
        let [_devices, _groups, robots, _status] = mock_fleet(&mut server).await;

        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();
        wait_for_cycles(&mut rx, 1, Duration::from_secs(2)).await;

        let good = rx.borrow().clone();
        assert!(good.error.is_none());
        let good_snapshot = good.snapshot.clone().unwrap();

        // Discovery is cached, so breaking the robot listing fails every
        // following cycle.
        robots.remove_async().await;

        timeout(Duration::from_secs(2), async {
            loop {
                if rx.borrow().error.is_some() {
                    return;
                }
                rx.changed().await.expect("poller dropped the channel");
            }
        })
        .await
        .expect("a failing cycle should publish its error");

        let degraded = rx.borrow().clone();
        let held = degraded.snapshot.expect("last good snapshot is held");
        assert_eq!(*held, *good_snapshot);
    }

    #[tokio::test]
    async fn manual_refresh_runs_one_extra_cycle_without_rescheduling() {
        let mut server = Server::new_async().await;
        let _fleet = mock_fleet(&mut server).await;

        // Interval far beyond the test duration: every cycle after the
        // first can only come from the manual trigger.
        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_secs(60),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();
        wait_for_cycles(&mut rx, 1, Duration::from_secs(2)).await;

        poller.refresh(RefreshOpts::default());
        wait_for_cycles(&mut rx, 2, Duration::from_secs(2)).await;

        // No further cycles: the scheduled deadline is still a minute out.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rx.borrow().cycles, 2);
    }

    #[tokio::test]
    async fn reconnect_refresh_rediscovers_the_device() {
        let mut server = Server::new_async().await;
        // Once for the initial discovery, once more for the reconnect.
        let devices = server
            .mock("GET", "/api/devices")
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"devices": [{"deviceId": "dev-1"}]}}"#)
            .expect(2)
            .create_async()
            .await;
        let _groups = server
            .mock("GET", "/api/robot/groups")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"robotGroups": [{"id": "grp-1"}]}}"#)
            .create_async()
            .await;
        let _robots = server
            .mock("GET", "/api/robots")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 0, "data": {"robots": []}}"#)
            .create_async()
            .await;

        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_secs(60),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();
        wait_for_cycles(&mut rx, 1, Duration::from_secs(2)).await;

        poller.refresh(RefreshOpts { reconnect: true });
        wait_for_cycles(&mut rx, 2, Duration::from_secs(2)).await;

        devices.assert_async().await;
    }

    #[tokio::test]
    async fn shutdown_stops_future_cycles() {
        let mut server = Server::new_async().await;
        let _fleet = mock_fleet(&mut server).await;

        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();
        wait_for_cycles(&mut rx, 1, Duration::from_secs(2)).await;

        poller.shutdown();
        // Give any in-flight cycle time to finish publishing.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let cycles = rx.borrow().cycles;

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(rx.borrow().cycles, cycles);
    }

    #[tokio::test]
    async fn dropping_the_handle_shuts_the_poller_down() {
        let mut server = Server::new_async().await;
        let _fleet = mock_fleet(&mut server).await;

        let poller = FleetPoller::spawn(
            test_aggregator(&server),
            Duration::from_millis(100),
            Duration::ZERO,
        );
        let mut rx = poller.subscribe();
        wait_for_cycles(&mut rx, 1, Duration::from_secs(2)).await;

        drop(poller);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let cycles = rx.borrow().cycles;

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(rx.borrow().cycles, cycles);
    }
}
