//! # Command Ingestion Module
//!
//! Receives command datagrams and applies them to the shared controller state.
//!
//! This module handles:
//! - Binding the UDP command endpoint
//! - Decoding each datagram into one command, dropping malformed ones whole
//! - Applying commands through the sole [`StateWriter`]
//! - Receive-error policy: bounded retry for transient errors, exit otherwise
//!
//! The receive side is behind [`DatagramSource`], implemented for
//! `tokio::net::UdpSocket`.
//!
//! When the worker exits because the transport failed, the service keeps
//! running and the controller stays frozen at the last applied state. A silent
//! peer likewise leaves the state unchanged; there is no liveness timeout.

pub mod source;

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::NetworkConfig;
use crate::controller::StateWriter;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{BridgeError, Result};
use crate::protocol::{decode_command, DecodeError, InboundCommand};

pub use source::DatagramSource;

/// Counters reported when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub applied: u64,
    pub keepalives: u64,
    pub rejected: u64,
    pub receive_errors: u64,
}

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Service asked the worker to stop
    Shutdown,
    /// Transport failed and will not recover
    TransportFailed,
}

/// Outcome of handling one datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum DatagramOutcome {
    Applied(InboundCommand),
    Keepalive,
    Rejected(DecodeError),
}

/// Whether a receive error is worth retrying.
pub fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
    )
}

/// Bind the command endpoint
///
/// # Errors
///
/// Returns error if the configured address is invalid or cannot be bound.
pub async fn bind_socket(config: &NetworkConfig) -> Result<UdpSocket> {
    let addr = config.socket_addr()?;
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|e| BridgeError::Transport(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Command endpoint bound at {}", socket.local_addr()?);
    Ok(socket)
}

/// The command ingestion worker.
pub struct CommandWorker<S = UdpSocket> {
    source: S,
    writer: StateWriter,
    diagnostics: Arc<dyn DiagnosticsSink>,
    buffer: Vec<u8>,
    max_consecutive_errors: u32,
    retry_backoff: Duration,
    last_peer: Option<(SocketAddr, Instant)>,
    stats: IngestStats,
}

impl<S: DatagramSource> std::fmt::Debug for CommandWorker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWorker")
            .field("source", &self.source.local_addr().ok())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl CommandWorker<UdpSocket> {
    /// Bind the command endpoint and wrap it in a worker
    ///
    /// # Errors
    ///
    /// Returns error if the configured address is invalid or cannot be bound.
    pub async fn bind(
        config: &NetworkConfig,
        writer: StateWriter,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        let socket = bind_socket(config).await?;
        Ok(Self::from_source(socket, config, writer, diagnostics))
    }
}

impl<S: DatagramSource> CommandWorker<S> {
    /// Wrap an already bound source.
    pub fn from_source(
        source: S,
        config: &NetworkConfig,
        writer: StateWriter,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            source,
            writer,
            diagnostics,
            buffer: vec![0u8; config.max_datagram_size],
            max_consecutive_errors: config.max_consecutive_errors,
            retry_backoff: config.retry_backoff(),
            last_peer: None,
            stats: IngestStats::default(),
        }
    }

    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.source.local_addr()?)
    }

    /// Last peer heard from and when.
    pub fn last_peer(&self) -> Option<(SocketAddr, Instant)> {
        self.last_peer
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Decode and apply one datagram.
    ///
    /// Malformed datagrams leave the state untouched and produce exactly one
    /// diagnostics line.
    pub fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) -> DatagramOutcome {
        self.stats.received += 1;
        self.last_peer = Some((peer, Instant::now()));

        match decode_command(datagram) {
            Ok(InboundCommand::Keepalive) => {
                self.stats.keepalives += 1;
                trace!("Keepalive from {}", peer);
                DatagramOutcome::Keepalive
            }
            Ok(command) => {
                self.writer.apply(&command);
                self.stats.applied += 1;
                debug!("Applied {} from {}: {:?}", command.name(), peer, command);
                DatagramOutcome::Applied(command)
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!("Dropped {}-byte datagram from {}: {}", datagram.len(), peer, e);
                self.diagnostics
                    .log(&format!("dropped datagram from {}: {}", peer, e));
                DatagramOutcome::Rejected(e)
            }
        }
    }

    /// Run the receive loop until shutdown or transport failure
    ///
    /// The worker suspends only on the source and on the retry backoff; it never
    /// holds the state lock across either.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> (IngestStats, ExitReason) {
        info!("Command ingestion started");
        let mut consecutive_errors = 0u32;

        let reason = loop {
            if *shutdown.borrow() {
                break ExitReason::Shutdown;
            }

            let received = tokio::select! {
                result = self.source.recv_from(&mut self.buffer) => result,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Service side dropped the stop signal.
                        break ExitReason::Shutdown;
                    }
                    continue;
                }
            };

            match received {
                Ok((len, peer)) => {
                    consecutive_errors = 0;
                    let buffer = std::mem::take(&mut self.buffer);
                    self.handle_datagram(&buffer[..len], peer);
                    self.buffer = buffer;
                }
                Err(e) => {
                    self.stats.receive_errors += 1;
                    consecutive_errors += 1;

                    if !is_transient(e.kind()) {
                        error!("Command transport failed: {}", e);
                        self.diagnostics.log(&format!("network receive failed: {}", e));
                        break ExitReason::TransportFailed;
                    }
                    if consecutive_errors > self.max_consecutive_errors {
                        error!("Giving up after {} consecutive receive errors: {}", consecutive_errors, e);
                        self.diagnostics.log(&format!(
                            "network receive failed {} times in a row: {}",
                            consecutive_errors, e
                        ));
                        break ExitReason::TransportFailed;
                    }

                    warn!("Transient receive error ({}/{}): {}", consecutive_errors, self.max_consecutive_errors, e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_backoff) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break ExitReason::Shutdown;
                            }
                        }
                    }
                }
            }
        };

        info!("Command ingestion stopped ({:?}): {:?}", reason, self.stats);
        (self.stats, reason)
    }
}
