//! Transport loop — bridges the datagram socket to the reassembly engine.
//!
//! One datagram at a time: decode the header, feed the chunk to the
//! session, write the file on EOF, acknowledge. The loop owns its session
//! exclusively and runs until the shutdown channel fires or the socket
//! fails. Either way the partially assembled output is flushed before
//! [`Receiver::run`] returns.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use ferry_core::wire::{self, Chunk, MAX_DATAGRAM};
use ferry_core::{Action, FerryConfig, ReassemblySession};

use crate::stats::ReceiverStats;
use crate::storage::Storage;
use crate::transport::DatagramSocket;

/// Per-receiver settings taken from [`FerryConfig`].
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    pub output_path: PathBuf,
    /// 0 = unbounded reorder buffer.
    pub reorder_window: u32,
}

impl ReceiverSettings {
    pub fn from_config(config: &FerryConfig) -> Self {
        Self {
            output_path: config.output.path.clone(),
            reorder_window: config.reassembly.reorder_window,
        }
    }
}

/// Returned by [`Receiver::run`] on an orderly exit.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: ReceiverStats,
    /// Bytes flushed from an unfinished transfer on shutdown, if any.
    pub partial_bytes: Option<usize>,
}

/// Bind a UDP socket for the receiver.
///
/// Goes through socket2 so SO_REUSEADDR and SO_RCVBUF can be set before
/// bind. `recv_buffer_bytes == 0` keeps the kernel default.
pub fn bind_socket(addr: SocketAddr, recv_buffer_bytes: usize) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    if recv_buffer_bytes > 0 {
        socket
            .set_recv_buffer_size(recv_buffer_bytes)
            .context("SO_RCVBUF")?;
    }
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;

    UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}

/// The receiving end of a transfer.
pub struct Receiver<S, T = UdpSocket> {
    socket: T,
    session: ReassemblySession,
    storage: S,
    output_path: PathBuf,
    stats: ReceiverStats,
    shutdown: broadcast::Receiver<()>,
}

impl<S: Storage, T: DatagramSocket> Receiver<S, T> {
    pub fn new(
        socket: T,
        storage: S,
        settings: ReceiverSettings,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            socket,
            session: ReassemblySession::with_window(settings.reorder_window),
            storage,
            output_path: settings.output_path,
            stats: ReceiverStats::default(),
            shutdown,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("local_addr")
    }

    /// Receive until shutdown or a fatal socket error.
    ///
    /// A closed shutdown channel counts as a shutdown signal. Returns the
    /// socket error if one ended the loop, after the partial flush; a
    /// failed partial flush is also returned as an error.
    pub async fn run(mut self) -> Result<RunSummary> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        tracing::info!(
            addr = %self.local_addr()?,
            output = %self.output_path.display(),
            "receiver listening"
        );

        let outcome = loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("receiver stopped by shutdown signal");
                    break Ok(());
                }

                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => self.handle_datagram(&buf[..len], peer).await,
                    Err(e) => {
                        tracing::error!(error = %e, "recv_from failed, stopping receiver");
                        break Err(e);
                    }
                },
            }
        };

        let flushed = self.flush_partial();
        self.stats.log();
        tracing::info!("receiver stopped");

        outcome.context("recv_from failed")?;
        let partial_bytes = flushed?;
        Ok(RunSummary {
            stats: self.stats,
            partial_bytes,
        })
    }

    async fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        self.stats.datagrams += 1;

        let chunk = match Chunk::decode(datagram) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.stats.noise += 1;
                tracing::trace!(peer = %peer, error = %e, "noise datagram, discarding");
                return;
            }
        };

        let payload_len = chunk.payload.len();
        let action = self.session.process(chunk);
        self.stats.record(&action);

        match &action {
            Action::Accepted { sequence, drained } => {
                tracing::trace!(sequence, payload_len, drained, peer = %peer, "chunk accepted");
            }
            Action::Buffered { sequence } => {
                tracing::debug!(
                    sequence,
                    cursor = self.session.cursor(),
                    buffered = self.session.buffered(),
                    "stored out-of-order chunk in buffer"
                );
            }
            Action::DuplicateOutOfOrder { sequence } => {
                tracing::debug!(sequence, "duplicate out-of-order chunk, ignoring");
            }
            Action::DuplicateStale { sequence } => {
                tracing::debug!(sequence, "duplicate chunk, ignoring");
            }
            Action::BeyondWindow { sequence } => {
                tracing::debug!(
                    sequence,
                    cursor = self.session.cursor(),
                    "chunk beyond reorder window, not buffered"
                );
            }
            Action::Finalize { output } => {
                tracing::info!(peer = %peer, bytes = output.len(), "end of file signal received");
                match self.persist(output, false) {
                    Ok(()) => {}
                    // Logged and counted in persist. Keep listening for the next file.
                    Err(_) => {}
                }
            }
        }

        if let Some(sequence) = action.ack() {
            self.send_ack(sequence, peer).await;
        }
    }

    async fn send_ack(&mut self, sequence: u32, peer: SocketAddr) {
        match self.socket.send_to(&wire::encode_ack(sequence), peer).await {
            Ok(_) => self.stats.acks_sent += 1,
            Err(e) => {
                self.stats.ack_failures += 1;
                tracing::warn!(sequence, peer = %peer, error = %e, "failed to send ack");
            }
        }
    }

    /// Write the unfinished transfer, if there is one.
    fn flush_partial(&mut self) -> Result<Option<usize>> {
        match self.session.take_partial() {
            Some(output) => {
                self.persist(&output, true)?;
                Ok(Some(output.len()))
            }
            None => Ok(None),
        }
    }

    fn persist(&mut self, bytes: &[u8], partial: bool) -> Result<()> {
        if bytes.is_empty() {
            tracing::info!("no data received, nothing to save");
            return Ok(());
        }

        match self.storage.write_file(&self.output_path, bytes) {
            Ok(()) => {
                self.stats.files_written += 1;
                if partial {
                    tracing::info!(
                        path = %self.output_path.display(),
                        bytes = bytes.len(),
                        "incomplete file saved"
                    );
                } else {
                    tracing::info!(
                        path = %self.output_path.display(),
                        bytes = bytes.len(),
                        "file saved"
                    );
                }
                Ok(())
            }
            Err(e) => {
                self.stats.write_failures += 1;
                tracing::error!(
                    path = %self.output_path.display(),
                    bytes = bytes.len(),
                    partial,
                    error = %format!("{e:#}"),
                    "failed to save file"
                );
                Err(e)
            }
        }
    }
}
