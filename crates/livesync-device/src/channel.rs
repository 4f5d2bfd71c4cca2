//! Debug channel to a running app
//!
//! A [`DebugChannel`] owns at most one debug socket for its (device, app)
//! pair. The socket is acquired lazily by [`DebugChannel::ensure_connected`]
//! and is used only to push `Page.reload` commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DebugChannel                           │
//! │                                                               │
//! │  ensure_connected() ──acquire──▶ DeviceCapabilities           │
//! │                                                               │
//! │  send_reload() ──frame──▶ write half ─────────▶ app runtime   │
//! │        ▲                                                      │
//! │        │ select! (write vs. socket failure)                   │
//! │        │                                                      │
//! │  watch<ConnectionState> ◀── listener task ◀── read half       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The listener only logs inbound data. On EOF it publishes
//! [`ConnectionState::Closed`]; on a read error it publishes
//! [`ConnectionState::Errored`] and, after the configured close grace period,
//! `Closed { had_error: true }`. A closed connection is dropped the next time
//! the channel is used.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use livesync_core::prelude::*;
use livesync_core::LocalToDeviceFile;

use crate::capabilities::DeviceCapabilities;
use crate::protocol::{encode_frame, next_reload_id, DebugCommand};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default bound on debug socket acquisition.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time an errored socket may stay open before it is considered closed.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Read buffer for the listener task.
const READ_BUFFER_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// State of one established debug socket, published by its listener task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket is open.
    Connected,
    /// The socket reported an error and has not closed yet.
    Errored,
    /// The socket is gone.
    Closed {
        /// Whether the close followed an error
        had_error: bool,
    },
}

impl ConnectionState {
    /// `true` once a write on this socket can no longer succeed
    pub fn is_failed(&self) -> bool {
        !matches!(self, ConnectionState::Connected)
    }
}

/// Timing knobs for a [`DebugChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Bound on [`DeviceCapabilities::acquire_debug_socket`]
    pub connect_timeout: Duration,
    /// How long an errored socket may linger before being treated as closed
    pub close_grace: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// An established socket: the write half plus the listener owning the read half.
struct Connection<S> {
    writer: WriteHalf<S>,
    state_rx: watch::Receiver<ConnectionState>,
    listener: JoinHandle<()>,
}

impl<S> Connection<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    fn attach(socket: S, device_id: String, close_grace: Duration) -> Self {
        let (reader, writer) = tokio::io::split(socket);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);

        let listener = tokio::spawn(run_listener(reader, state_tx, device_id, close_grace));

        Self {
            writer,
            state_rx,
            listener,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Write one frame. Settles exactly once: either the write finishes or the
    /// listener reports the socket failed, whichever comes first.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let mut state_rx = self.state_rx.clone();

        let state = *state_rx.borrow_and_update();
        if state.is_failed() {
            return Err(Error::transport(format!("socket is not writable ({state:?})")));
        }

        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(frame).await?;
            writer.flush().await
        };

        tokio::select! {
            result = write => {
                result.map_err(|e| Error::transport(format!("write failed: {e}")))
            }
            _ = state_rx.wait_for(ConnectionState::is_failed) => {
                Err(Error::transport("socket error received while writing"))
            }
        }
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Background task: owns the read half, logs traffic and publishes close/error.
async fn run_listener<R: AsyncRead + Unpin>(
    mut reader: R,
    state_tx: watch::Sender<ConnectionState>,
    device_id: String,
    close_grace: Duration,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                trace!("[{}] Socket closed, hadError is false.", device_id);
                state_tx.send_replace(ConnectionState::Closed { had_error: false });
                return;
            }
            Ok(n) => {
                trace!(
                    "[{}] Socket sent data: {}",
                    device_id,
                    String::from_utf8_lossy(&buf[..n])
                );
            }
            Err(e) => {
                trace!("[{}] Socket error received: {}", device_id, e);
                state_tx.send_replace(ConnectionState::Errored);

                // A failed read half never reports a close of its own.
                tokio::time::sleep(close_grace).await;
                trace!("[{}] Socket closed, hadError is true.", device_id);
                state_tx.send_replace(ConnectionState::Closed { had_error: true });
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DebugChannel
// ---------------------------------------------------------------------------

/// Lazily connected reload channel for one app on one device.
///
/// Not shared: one channel per device, driven sequentially by its owner.
pub struct DebugChannel<D: DeviceCapabilities> {
    device: Arc<D>,
    app_name: String,
    project_dir: PathBuf,
    settings: ChannelSettings,
    connection: Option<Connection<D::Socket>>,
}

impl<D: DeviceCapabilities> std::fmt::Debug for DebugChannel<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugChannel")
            .field("device", &self.device.id())
            .field("app_name", &self.app_name)
            .field("state", &self.connection.as_ref().map(|c| c.state()))
            .finish()
    }
}

impl<D: DeviceCapabilities> DebugChannel<D> {
    pub fn new(
        device: Arc<D>,
        app_name: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            device,
            app_name: app_name.into(),
            project_dir: project_dir.into(),
            settings,
            connection: None,
        }
    }

    /// `true` while a socket is established and has not closed.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| !matches!(c.state(), ConnectionState::Closed { .. }))
    }

    /// State of the current socket, `None` when there is none.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(Connection::state)
    }

    /// Make sure a debug socket to `app_id` is open.
    ///
    /// Returns immediately when already connected. Otherwise asks the device
    /// for a socket, starting the app if needed. Returns `false` when no socket
    /// could be obtained; that is an expected outcome, not an error.
    pub async fn ensure_connected(&mut self, app_id: &str) -> bool {
        self.discard_closed_connection();
        if self.connection.is_some() {
            return true;
        }

        let device_id = self.device.id().to_string();
        let acquire = self.device.acquire_debug_socket(
            app_id,
            &self.app_name,
            &self.project_dir,
            true,
        );

        let socket = match tokio::time::timeout(self.settings.connect_timeout, acquire).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(e)) => {
                trace!(
                    "[{}] Error while connecting to the debug socket. Error is: {}",
                    device_id,
                    e
                );
                return false;
            }
            Err(_) => {
                trace!(
                    "[{}] Timed out after {:?} connecting to the debug socket",
                    device_id,
                    self.settings.connect_timeout
                );
                return false;
            }
        };

        debug!("[{}] Debug socket established for {}", device_id, app_id);
        self.connection = Some(Connection::attach(
            socket,
            device_id,
            self.settings.close_grace,
        ));
        true
    }

    /// Tell the app to reload. Does nothing when `changed` is empty.
    ///
    /// On failure the connection is destroyed before the error is returned;
    /// the next [`ensure_connected`](Self::ensure_connected) reconnects.
    pub async fn send_reload(&mut self, changed: &[LocalToDeviceFile]) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }

        self.discard_closed_connection();
        let Some(connection) = self.connection.as_mut() else {
            return Err(Error::transport("no debug connection"));
        };

        let command = DebugCommand::PageReload {
            ignore_cache: false,
        };
        let id = next_reload_id();
        let frame = encode_frame(&command.build(id)?);

        debug!(
            "[{}] Sending {} #{} for {} file(s)",
            self.device.id(),
            command.description(),
            id,
            changed.len()
        );

        match connection.write_frame(&frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                trace!("[{}] Error while sending message: {}", self.device.id(), e);
                self.destroy().await;
                Err(e)
            }
        }
    }

    /// Drop the connection and ask the device to close its sockets.
    ///
    /// Sockets cannot be closed per app, so this closes every debug socket on
    /// the device; LiveSync of several apps on one device is not supported.
    pub async fn destroy(&mut self) {
        if let Some(connection) = self.connection.take() {
            drop(connection);

            if let Err(e) = self.device.destroy_all_sockets().await {
                trace!(
                    "[{}] Error while destroying device sockets: {}",
                    self.device.id(),
                    e
                );
            }
            debug!("[{}] Debug connection destroyed", self.device.id());
        }
    }

    fn discard_closed_connection(&mut self) {
        if let Some(ConnectionState::Closed { had_error }) = self.connection_state() {
            debug!(
                "[{}] Debug socket closed (had_error={}), will reconnect on demand",
                self.device.id(),
                had_error
            );
            self.connection = None;
        }
    }
}
