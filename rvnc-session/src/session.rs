//! The session controller: lifecycle, writer surface and teardown.
//!
//! A [`Session`] owns the transport, the reader task, the framebuffer and
//! the connection state. The lifecycle is explicit and strictly ordered:
//!
//! 1. [`Session::connect`] — open the transport, negotiate version and
//!    security, and read the authentication challenge if the server wants
//!    one. Returns whether a password is needed.
//! 2. [`Session::authenticate`] — only when it does.
//! 3. [`Session::initialize`] — ClientInit/ServerInit, allocate the
//!    framebuffer, then force the canonical pixel format and announce the
//!    encoding preferences. SetPixelFormat is always on the wire before
//!    any update request.
//! 4. [`Session::start_updates`] — spawn the reader task and request the
//!    first full-screen update.
//!
//! Input events go straight to the transport under a write mutex, so
//! concurrent writers never interleave message bytes. In view-only mode
//! (and after the connection is gone) the input writers are silent no-ops.
//! [`Session::disconnect`] is idempotent and guarantees the reader task,
//! transport and framebuffer are released before it returns.

use crate::config::Config;
use crate::errors::SessionError;
use crate::events::{ConnectionState, SessionEvent};
use crate::reader::{self, ReaderContext};
use crate::registry::DecoderRegistry;
use crate::{BoxedReader, BoxedWriter, FramebufferHandle, SharedOutput};
use rvnc_pixels::{ColorMap, Framebuffer, PixelFormat};
use rvnc_wire::auth;
use rvnc_wire::handshake::{self, ProtocolVersion, SecurityType};
use rvnc_wire::io::{RfbInStream, RfbOutStream};
use rvnc_wire::messages::{
    ClientCutText, ClientInit, FramebufferUpdateRequest, KeyEvent, PointerEvent, ServerInit,
    SetEncodings, SetPixelFormat,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A client session, from handshake to teardown.
pub struct Session {
    config: Config,
    version: ProtocolVersion,
    state: Arc<parking_lot::Mutex<ConnectionState>>,
    /// Read half; moved into the reader task by `start_updates`.
    input: Option<RfbInStream<BoxedReader>>,
    output: SharedOutput,
    framebuffer: Option<FramebufferHandle>,
    size: (u16, u16),
    challenge: Option<[u8; 16]>,
    events_tx: flume::Sender<SessionEvent>,
    events_rx: flume::Receiver<SessionEvent>,
    view_only: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
    full_refresh: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    reader_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Open a TCP transport to `host:(base_port + display)` and run the
    /// handshake up to (and including) reading the authentication
    /// challenge. Returns the session and whether a password is needed.
    pub async fn connect(config: Config) -> Result<(Self, bool), SessionError> {
        config.validate()?;
        let address = (config.host.clone(), config.port());
        tracing::info!("connecting to {}:{}", address.0, address.1);

        let stream = tokio::time::timeout(
            config.connect_timeout(),
            TcpStream::connect((address.0.as_str(), address.1)),
        )
        .await
        .map_err(|_| {
            SessionError::Network(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {}:{} timed out", address.0, address.1),
            ))
        })??;
        // Input events are tiny; send them without Nagle delays.
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Self::connect_stream(Box::new(read_half), Box::new(write_half), config).await
    }

    /// Run the handshake over an already-open bidirectional byte stream.
    ///
    /// This is the transport-agnostic entry point `connect` delegates to;
    /// anything that yields an `AsyncRead`/`AsyncWrite` pair works.
    pub async fn connect_stream(
        reader: BoxedReader,
        writer: BoxedWriter,
        config: Config,
    ) -> Result<(Self, bool), SessionError> {
        config.validate()?;
        let mut input = RfbInStream::new(reader);
        let mut output = RfbOutStream::new(writer);

        let version = handshake::negotiate_version(&mut input, &mut output).await?;
        let security = handshake::negotiate_security(&mut input, &mut output, version).await?;

        let (challenge, needs_password, state) = match security {
            SecurityType::None => {
                // 3.8 sends a SecurityResult even for None.
                if version == ProtocolVersion::V3_8 {
                    handshake::read_security_result(&mut input, version).await?;
                }
                (None, false, ConnectionState::Initializing)
            }
            SecurityType::VncAuth => {
                let challenge = handshake::read_challenge(&mut input).await?;
                (Some(challenge), true, ConnectionState::Authenticating)
            }
        };

        let (events_tx, events_rx) = flume::unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let view_only = config.view_only;

        Ok((
            Self {
                config,
                version,
                state: Arc::new(parking_lot::Mutex::new(state)),
                input: Some(input),
                output: Arc::new(tokio::sync::Mutex::new(output)),
                framebuffer: None,
                size: (0, 0),
                challenge,
                events_tx,
                events_rx,
                view_only: Arc::new(AtomicBool::new(view_only)),
                alive: Arc::new(AtomicBool::new(true)),
                lost: Arc::new(AtomicBool::new(false)),
                full_refresh: Arc::new(AtomicBool::new(false)),
                shutdown_tx,
                shutdown_rx,
                reader_task: None,
            },
            needs_password,
        ))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Framebuffer dimensions; `(0, 0)` before `initialize`.
    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    /// Receiver for host-facing events.
    pub fn events(&self) -> &flume::Receiver<SessionEvent> {
        &self.events_rx
    }

    /// Shared handle to the framebuffer, once `initialize` created it.
    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer.clone()
    }

    /// Answer the server's challenge. Auth failure tears the session down
    /// and surfaces as `AuthFailed` (with the server's reason under 3.8)
    /// or `AuthTooMany`.
    pub async fn authenticate(&mut self, password: &str) -> Result<(), SessionError> {
        let challenge = match (self.state(), self.challenge.take()) {
            (ConnectionState::Authenticating, Some(challenge)) => challenge,
            (state, _) => {
                return Err(SessionError::InvalidState(format!(
                    "authenticate called in state {state:?}"
                )))
            }
        };

        let response = auth::encrypt_challenge(password, &challenge);
        {
            let mut output = self.output.lock().await;
            handshake::send_auth_response(&mut output, &response).await?;
        }

        let input = self.input.as_mut().expect("input present before start_updates");
        match handshake::read_security_result(input, self.version).await {
            Ok(()) => {
                *self.state.lock() = ConnectionState::Initializing;
                Ok(())
            }
            Err(err) => {
                *self.state.lock() = ConnectionState::Disconnected;
                self.alive.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    /// Ask the host for a password and authenticate with it; a host that
    /// returns `None` aborts authentication cleanly.
    pub async fn authenticate_with<F>(&mut self, password_source: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> Option<String>,
    {
        match password_source() {
            Some(password) => self.authenticate(&password).await,
            None => {
                *self.state.lock() = ConnectionState::Disconnected;
                self.alive.store(false, Ordering::SeqCst);
                Err(SessionError::AuthAborted)
            }
        }
    }

    /// Exchange ClientInit/ServerInit, allocate the framebuffer, force the
    /// canonical pixel format and announce encodings. Exactly once per
    /// session.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if self.state() != ConnectionState::Initializing {
            return Err(SessionError::InvalidState(format!(
                "initialize called in state {:?}",
                self.state()
            )));
        }

        {
            let mut output = self.output.lock().await;
            ClientInit {
                shared: self.config.shared,
            }
            .write_to(&mut output);
            output.flush().await?;
        }

        let input = self.input.as_mut().expect("input present before start_updates");
        let server_init = ServerInit::read_from(input).await?;
        tracing::info!(
            "server \"{}\": {}x{}",
            server_init.name,
            server_init.width,
            server_init.height
        );

        self.size = (server_init.width, server_init.height);
        self.framebuffer = Some(Arc::new(tokio::sync::Mutex::new(Framebuffer::new(
            server_init.width,
            server_init.height,
            server_init.name,
        ))));

        // Force the canonical format before any update can be requested,
        // then declare what we can decode.
        let mut output = self.output.lock().await;
        SetPixelFormat {
            pixel_format: PixelFormat::canonical(),
        }
        .write_to(&mut output);
        SetEncodings {
            encodings: self.config.effective_encodings(),
        }
        .write_to(&mut output);
        output.flush().await?;
        drop(output);

        *self.state.lock() = ConnectionState::Connected;
        Ok(())
    }

    /// Spawn the reader task and request the first full-screen update.
    pub async fn start_updates(&mut self) -> Result<(), SessionError> {
        if self.state() != ConnectionState::Connected || self.reader_task.is_some() {
            return Err(SessionError::InvalidState(format!(
                "start_updates called in state {:?}",
                self.state()
            )));
        }
        let input = self.input.take().expect("input consumed only here");
        let framebuffer = self.framebuffer.clone().expect("framebuffer after initialize");

        let ctx = ReaderContext {
            input,
            output: self.output.clone(),
            framebuffer,
            events: self.events_tx.clone(),
            state: self.state.clone(),
            format: PixelFormat::canonical(),
            colors: ColorMap::new(),
            registry: DecoderRegistry::standard(),
            width: self.size.0,
            height: self.size.1,
            full_refresh: self.full_refresh.clone(),
            alive: self.alive.clone(),
            lost: self.lost.clone(),
        };
        self.reader_task = Some(tokio::spawn(reader::run(ctx, self.shutdown_rx.clone())));

        self.send_update_request(false).await
    }

    /// Ask the server for another update; `full` forces the next request
    /// to cover the whole screen non-incrementally.
    pub async fn request_screen_update(&self, full: bool) -> Result<(), SessionError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Ok(());
        }
        if full {
            self.full_refresh.store(true, Ordering::SeqCst);
        }
        self.send_update_request(!full).await
    }

    async fn send_update_request(&self, incremental: bool) -> Result<(), SessionError> {
        let (width, height) = self.size;
        let mut output = self.output.lock().await;
        FramebufferUpdateRequest {
            incremental,
            x: 0,
            y: 0,
            width,
            height,
        }
        .write_to(&mut output);
        output.flush().await?;
        Ok(())
    }

    /// True when input events would actually be sent.
    fn input_enabled(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.view_only.load(Ordering::SeqCst)
    }

    /// Send a pointer event; silent no-op in view-only mode or after the
    /// connection is gone.
    pub async fn write_pointer_event(
        &self,
        x: u16,
        y: u16,
        button_mask: u8,
    ) -> Result<(), SessionError> {
        if !self.input_enabled() {
            return Ok(());
        }
        let mut output = self.output.lock().await;
        PointerEvent { button_mask, x, y }.write_to(&mut output);
        output.flush().await?;
        Ok(())
    }

    /// Send a key press or release; same suppression rules as pointer
    /// events.
    pub async fn write_keyboard_event(&self, keysym: u32, down: bool) -> Result<(), SessionError> {
        if !self.input_enabled() {
            return Ok(());
        }
        let mut output = self.output.lock().await;
        KeyEvent { down, keysym }.write_to(&mut output);
        output.flush().await?;
        Ok(())
    }

    /// [`write_keyboard_event`](Self::write_keyboard_event) with a named
    /// key from the fixed keysym table.
    pub async fn write_key(&self, key: crate::keysyms::Key, down: bool) -> Result<(), SessionError> {
        self.write_keyboard_event(crate::keysyms::keysym(key), down).await
    }

    /// Send clipboard text to the server; same suppression rules as
    /// pointer events.
    pub async fn write_client_cut_text(&self, text: &str) -> Result<(), SessionError> {
        if !self.input_enabled() {
            return Ok(());
        }
        let mut output = self.output.lock().await;
        ClientCutText {
            text: text.to_string(),
        }
        .write_to(&mut output);
        output.flush().await?;
        Ok(())
    }

    /// Toggle view-only input suppression.
    pub fn set_input_mode(&self, view_only: bool) {
        self.view_only.store(view_only, Ordering::SeqCst);
    }

    /// Tear the session down: stop the reader task, close the transport
    /// and emit `ConnectionLost` (once, ever). Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Disconnected {
                *state = ConnectionState::Disconnecting;
            }
        }
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        // Closing the write half tells the server to drop the connection,
        // which also unblocks a reader stuck mid-message.
        {
            let mut output = self.output.lock().await;
            let _ = output.flush().await;
            let _ = output.get_mut().shutdown().await;
        }

        if let Some(task) = self.reader_task.take() {
            let _ = task.await;
        }
        self.input = None;

        *self.state.lock() = ConnectionState::Disconnected;
        if !self.lost.swap(true, Ordering::SeqCst) {
            let _ = self.events_tx.send(SessionEvent::ConnectionLost { reason: None });
        }
    }
}
