//! # State Publisher Module
//!
//! Forwards the shared controller state to the device session on a fixed period.
//!
//! Every tick pushes, whether or not the state changed: the platform polls the
//! device, and a redundant push only repeats the same hardware write. A failed
//! push is logged and the cadence continues; it never stops the publisher.
//!
//! The publisher is the only owner of the [`DeviceSession`] while it runs and
//! hands it back when it stops, so no push can overlap the final detach.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::controller::StateReader;
use crate::device::{DeviceSession, InputInjector, PushError, SessionHandle};
use crate::diagnostics::DiagnosticsSink;

/// Counters reported when the publisher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub pushes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

/// Periodic state publisher.
pub struct StatePublisher<I: InputInjector> {
    session: DeviceSession<I>,
    handle: SessionHandle,
    reader: StateReader,
    diagnostics: Arc<dyn DiagnosticsSink>,
    period: Duration,
    stats: PublishStats,
}

impl<I: InputInjector> std::fmt::Debug for StatePublisher<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePublisher")
            .field("session", &self.session)
            .field("period", &self.period)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<I: InputInjector> StatePublisher<I> {
    /// Creates a publisher for an attached session.
    pub fn new(
        session: DeviceSession<I>,
        handle: SessionHandle,
        reader: StateReader,
        diagnostics: Arc<dyn DiagnosticsSink>,
        period: Duration,
    ) -> Self {
        Self {
            session,
            handle,
            reader,
            diagnostics,
            period,
            stats: PublishStats::default(),
        }
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Push the current state once
    ///
    /// The state lock is held only for the snapshot copy, never across the push.
    /// The first failure of a streak and the recovery after it are written to
    /// diagnostics; failures in between only go to the trace log.
    pub fn publish_once(&mut self) -> Result<(), PushError> {
        let snapshot = self.reader.snapshot();

        match self.session.push(self.handle, &snapshot) {
            Ok(()) => {
                self.stats.pushes += 1;
                if self.stats.consecutive_failures > 0 {
                    info!("State push recovered after {} failures", self.stats.consecutive_failures);
                    self.diagnostics.log(&format!(
                        "state push recovered after {} failures",
                        self.stats.consecutive_failures
                    ));
                    self.stats.consecutive_failures = 0;
                }
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                if self.stats.consecutive_failures == 1 {
                    warn!("State push failed: {}", e);
                    self.diagnostics.log(&format!("state push failed: {}", e));
                } else {
                    debug!("State push failed ({} in a row): {}", self.stats.consecutive_failures, e);
                }
                Err(e)
            }
        }
    }

    /// Publish until shutdown, then return the session for detaching.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> (DeviceSession<I>, PublishStats) {
        info!("State publisher started ({:?} period)", self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_once() {
                        trace!("Publish cycle skipped: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("State publisher stopped: {:?}", self.stats);
        (self.session, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{shared_state, BUTTON_A, BUTTON_X};
    use crate::device::injector::MockInputInjector;
    use crate::device::{DeviceInfo, InjectorError, SessionState, SimulatedInjector};
    use crate::diagnostics::testing::MemorySink;
    use crate::protocol::InboundCommand;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, timeout};

    fn failing_mock(calls: Arc<AtomicU64>) -> MockInputInjector {
        let mut mock = MockInputInjector::new();
        mock.expect_attach_work_buffer().returning(|| Ok(1));
        mock.expect_attach_device().returning(|_| Ok(2));
        mock.expect_set_state().returning(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(InjectorError::Platform(0x2A))
        });
        mock
    }

    #[test]
    fn test_publish_once_pushes_snapshot() {
        let injector = SimulatedInjector::new();
        let observer = injector.clone();
        let mut session = DeviceSession::new(injector, DeviceInfo::default(), 4);
        let handle = session.attach().unwrap();

        let (mut writer, reader) = shared_state();
        let sink = MemorySink::new();
        let mut publisher = StatePublisher::new(session, handle, reader, sink.clone(), Duration::from_millis(5));

        writer.apply(&InboundCommand::SetButtons(BUTTON_X));
        publisher.publish_once().unwrap();

        assert_eq!(observer.last_state().unwrap().buttons, BUTTON_X);
        assert_eq!(publisher.stats().pushes, 1);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_failure_streak_logs_once_and_recovery() {
        let calls = Arc::new(AtomicU64::new(0));
        let mut mock = MockInputInjector::new();
        mock.expect_attach_work_buffer().returning(|| Ok(1));
        mock.expect_attach_device().returning(|_| Ok(2));
        let counter = Arc::clone(&calls);
        mock.expect_set_state().returning(move |_, _| {
            // Fail the first three pushes, then succeed.
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(InjectorError::Platform(0x2A))
            } else {
                Ok(())
            }
        });

        let mut session = DeviceSession::new(mock, DeviceInfo::default(), 4);
        let handle = session.attach().unwrap();
        let (_writer, reader) = shared_state();
        let sink = MemorySink::new();
        let mut publisher = StatePublisher::new(session, handle, reader, sink.clone(), Duration::from_millis(5));

        for _ in 0..3 {
            assert!(publisher.publish_once().is_err());
        }
        assert!(publisher.publish_once().is_ok());

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(publisher.stats().failures, 3);
        assert_eq!(publisher.stats().consecutive_failures, 0);
        assert_eq!(sink.count_containing("state push failed"), 1);
        assert_eq!(sink.count_containing("recovered after 3 failures"), 1);
    }

    #[tokio::test]
    async fn test_run_keeps_pushing_through_failures() {
        let calls = Arc::new(AtomicU64::new(0));
        let mut session = DeviceSession::new(failing_mock(Arc::clone(&calls)), DeviceInfo::default(), 4);
        let handle = session.attach().unwrap();
        let (_writer, reader) = shared_state();
        let publisher = StatePublisher::new(session, handle, reader, MemorySink::new(), Duration::from_millis(2));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(publisher.run(shutdown_rx));

        timeout(Duration::from_secs(5), async {
            while calls.load(Ordering::SeqCst) < 10 {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("publisher stopped pushing after failures");

        shutdown_tx.send(true).unwrap();
        let (session, stats) = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Attached);
        assert!(stats.failures >= 10);
        assert_eq!(stats.pushes, 0);
    }

    #[tokio::test]
    async fn test_run_pushes_unconditionally_and_returns_session() {
        let injector = SimulatedInjector::new();
        let observer = injector.clone();
        let mut session = DeviceSession::new(injector, DeviceInfo::default(), 4);
        let handle = session.attach().unwrap();

        let (mut writer, reader) = shared_state();
        writer.apply(&InboundCommand::SetButtons(BUTTON_A));
        let publisher = StatePublisher::new(session, handle, reader, MemorySink::new(), Duration::from_millis(2));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(publisher.run(shutdown_rx));

        timeout(Duration::from_secs(5), async {
            while observer.push_count() < 5 {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("unchanged state was not re-pushed");

        shutdown_tx.send(true).unwrap();
        let (mut session, stats) = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(stats.pushes >= 5);
        assert_eq!(observer.last_state().unwrap().buttons, BUTTON_A);

        session.detach(handle);
        assert!(!observer.is_attached());
    }
}
