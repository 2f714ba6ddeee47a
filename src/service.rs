//! # Service Module
//!
//! Brings the pipeline up, keeps it alive, and tears it down in order.
//!
//! ## Control Flow
//!
//! 1. **Start**
//!    - Attach the virtual controller (fatal on failure)
//!    - Bind the command endpoint (fatal on failure, the device is detached first)
//!    - Spawn the ingestion worker and the state publisher
//!
//! 2. **Run**
//!    - Idle driving loop on a coarse tick until the stop future resolves
//!    - Notice, once, when ingestion has stopped and the controller is frozen
//!
//! 3. **Shutdown**
//!    - Signal both tasks and join them
//!    - Detach the device only after the publisher has handed the session back,
//!      so no push or state change races the teardown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controller::{shared_state, ControllerState, StateReader};
use crate::device::{DeviceSession, InputInjector, SessionHandle};
use crate::diagnostics::DiagnosticsSink;
use crate::error::{BridgeError, Result};
use crate::ingest::{bind_socket, CommandWorker, DatagramSource, ExitReason, IngestStats};
use crate::publisher::{PublishStats, StatePublisher};

/// Summary returned after an orderly shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceReport {
    pub ingest: IngestStats,
    /// `None` if the worker task panicked
    pub ingest_exit: Option<ExitReason>,
    pub publish: PublishStats,
    pub ticks: u64,
}

/// Entry point for bringing the service up.
pub struct Service;

impl Service {
    /// Attach the device, bind the transport, and spawn both execution contexts
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be attached or the command endpoint
    /// cannot be bound. Both are fatal to the process.
    pub async fn start<I>(
        config: &Config,
        injector: I,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<RunningService<I>>
    where
        I: InputInjector + 'static,
    {
        Self::start_on(config, injector, diagnostics, bind_socket(&config.network)).await
    }

    /// Like [`Service::start`], receiving commands from an already open source.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be attached.
    pub async fn start_with_source<I, S>(
        config: &Config,
        injector: I,
        source: S,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<RunningService<I>>
    where
        I: InputInjector + 'static,
        S: DatagramSource + 'static,
    {
        Self::start_on(config, injector, diagnostics, async { Ok(source) }).await
    }

    /// `open` is only awaited once the device is attached.
    async fn start_on<I, S, F>(
        config: &Config,
        injector: I,
        diagnostics: Arc<dyn DiagnosticsSink>,
        open: F,
    ) -> Result<RunningService<I>>
    where
        I: InputInjector + 'static,
        S: DatagramSource + 'static,
        F: Future<Output = Result<S>>,
    {
        let mut session = DeviceSession::new(
            injector,
            config.device.device_info(),
            config.device.battery_level,
        );
        let handle = session.attach()?;
        diagnostics.log(&format!("session id is {}", handle.session_id()));

        let (writer, reader) = shared_state();
        let bound = open.await.and_then(|source| {
            let worker =
                CommandWorker::from_source(source, &config.network, writer, Arc::clone(&diagnostics));
            worker.local_addr().map(|addr| (worker, addr))
        });
        let (worker, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                session.detach(handle);
                return Err(e);
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let ingest = tokio::spawn(worker.run(shutdown_rx.clone()));

        let publisher = StatePublisher::new(
            session,
            handle,
            reader.clone(),
            Arc::clone(&diagnostics),
            config.publisher.interval(),
        );
        let publisher = tokio::spawn(publisher.run(shutdown_rx));

        info!("Service ready, listening on {}", local_addr);
        diagnostics.log(&format!("READY on {}", local_addr));

        Ok(RunningService {
            shutdown,
            ingest,
            publisher,
            handle,
            local_addr,
            reader,
            diagnostics,
            tick: config.service.tick(),
        })
    }
}

/// A started service.
pub struct RunningService<I: InputInjector + 'static> {
    shutdown: watch::Sender<bool>,
    ingest: JoinHandle<(IngestStats, ExitReason)>,
    publisher: JoinHandle<(DeviceSession<I>, PublishStats)>,
    handle: SessionHandle,
    local_addr: SocketAddr,
    reader: StateReader,
    diagnostics: Arc<dyn DiagnosticsSink>,
    tick: Duration,
}

impl<I: InputInjector + 'static> std::fmt::Debug for RunningService<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningService")
            .field("local_addr", &self.local_addr)
            .field("session_id", &self.handle.session_id())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<I: InputInjector + 'static> RunningService<I> {
    /// Address of the command endpoint.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        self.reader.snapshot()
    }

    /// Whether the ingestion worker is still receiving.
    pub fn is_ingesting(&self) -> bool {
        !self.ingest.is_finished()
    }

    /// Drive the idle loop until `stop` resolves, then shut down.
    pub async fn run_until<F>(self, stop: F) -> Result<ServiceReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;
        let mut frozen_reported = false;

        loop {
            tokio::select! {
                _ = &mut stop => {
                    info!("Stop requested, shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    ticks += 1;
                    if !frozen_reported && self.ingest.is_finished() {
                        warn!("Command ingestion has stopped; controller state is frozen");
                        self.diagnostics.log("command ingestion stopped, controller frozen at last state");
                        frozen_reported = true;
                    }
                }
            }
        }

        debug!("Driving loop exited after {} ticks", ticks);
        let mut report = self.shutdown().await?;
        report.ticks = ticks;
        Ok(report)
    }

    /// Stop both execution contexts, then detach the device
    ///
    /// # Errors
    ///
    /// Returns error if the publisher task panicked; the session it owned is
    /// lost and cannot be detached.
    pub async fn shutdown(self) -> Result<ServiceReport> {
        // Receivers may already be gone if both tasks ended on their own.
        let _ = self.shutdown.send(true);

        let (ingest, ingest_exit) = match self.ingest.await {
            Ok((stats, reason)) => (stats, Some(reason)),
            Err(e) => {
                error!("Ingestion task failed: {}", e);
                (IngestStats::default(), None)
            }
        };

        let (mut session, publish) = self.publisher.await.map_err(|e| {
            error!("Publisher task failed: {}", e);
            BridgeError::Task(format!("publisher: {}", e))
        })?;

        session.detach(self.handle);
        self.diagnostics.log("controller detached");

        let report = ServiceReport {
            ingest,
            ingest_exit,
            publish,
            ticks: 0,
        };
        info!("Service stopped: {:?}", report);
        Ok(report)
    }
}
