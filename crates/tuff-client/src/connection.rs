//! A client connection from handshake to disconnect.
//!
//! One reader task owns the inbound half of the stream and the
//! [`StateMachine`]. It decodes frames strictly in arrival order, dispatches
//! them, and applies the packets that change the connection itself:
//! compression, login success, keep-alive and disconnect.
//!
//! Any number of [`ConnectionHandle`]s can send concurrently; frames are
//! serialized behind one lock on the outbound half.

use std::fmt;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};
use tuff_mc::block::LegacyBlocks;
use tuff_mc::compression::Zlib;
use tuff_mc::crypt::Cfb8Cipher;
use tuff_mc::packets::play::max_chat_length;
use tuff_mc::packets::{
    ChatSend, ClientboundPacket, DecodeContext, EncryptionResponse, Handshake, LoginStart,
    NextState, ServerboundPacket, vanilla,
};
use tuff_mc::state::{DisconnectCause, SharedState};
use tuff_mc::transport::{FrameReader, FrameWriter};
use tuff_mc::{
    ConnectionState, Dispatcher, FrameCodec, ProtocolError, ProtocolVersion, RawPacket,
    ResolvedProtocol, Severity, StateMachine,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Characters the server kicks for in chat.
const ILLEGAL_CHAT_CHARS: [char; 3] = ['\u{a7}', '\n', '\r'];

/// Requests from handles that only the reader task can carry out.
enum Control {
    EncryptInbound {
        cipher: Cfb8Cipher,
        done: oneshot::Sender<()>,
    },
}

struct Shared {
    outbound: Mutex<FrameWriter<BoxWriter>>,
    protocol: ResolvedProtocol,
    state: SharedState,
    cancel: CancellationToken,
    cause: std::sync::Mutex<Option<DisconnectCause>>,
    control: mpsc::Sender<Control>,
}

impl Shared {
    async fn send(&self, packet: &ServerboundPacket) -> std::result::Result<(), ProtocolError> {
        if self.state.is_disconnected() || self.cancel.is_cancelled() {
            return Err(ProtocolError::Disconnected);
        }

        let raw = self.protocol.encode(self.state.load(), packet)?;
        let mut writer = self.outbound.lock().await;
        self.write(&mut writer, &raw).await?;
        trace!(kind = %packet.kind(), id = raw.id, "Sent packet");
        Ok(())
    }

    async fn write(
        &self,
        writer: &mut FrameWriter<BoxWriter>,
        raw: &RawPacket,
    ) -> std::result::Result<(), ProtocolError> {
        let result = writer.write_packet(raw).await;
        if let Err(ProtocolError::Io(e)) = &result {
            self.close(DisconnectCause::Io(e.to_string()));
        }
        result
    }

    /// Record why the connection ends and stop the reader. First cause wins.
    fn close(&self, cause: DisconnectCause) {
        {
            let mut slot = self.cause.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(cause);
            }
        }
        self.cancel.cancel();
    }

    fn cause(&self) -> Option<DisconnectCause> {
        self.cause
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cheap, cloneable access to a running connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    /// The negotiated protocol version.
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.shared.protocol.version()
    }

    /// Whether teardown has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled() || self.shared.state.is_disconnected()
    }

    /// Encode and send a packet in the current state.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedForVersion`] or
    /// [`ProtocolError::WrongState`] without touching the connection, or an
    /// I/O error, which also tears the connection down.
    pub async fn send(&self, packet: ServerboundPacket) -> Result<()> {
        Ok(self.shared.send(&packet).await?)
    }

    /// Send a chat message or command.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidChat`] for messages the server would
    /// kick for, or any error from [`ConnectionHandle::send`].
    pub async fn send_chat_message(&self, message: &str) -> Result<()> {
        validate_chat(message, self.version())?;
        self.send(ServerboundPacket::ChatSend(ChatSend::new(message)))
            .await
    }

    /// Send the encryption response and encrypt the stream from then on.
    ///
    /// Acquiring `shared_secret` and building `response` (RSA, session
    /// server) is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Disconnected`] if the reader task is gone,
    /// or an error from sending the response.
    pub async fn enable_encryption(
        &self,
        shared_secret: [u8; 16],
        response: EncryptionResponse,
    ) -> Result<()> {
        let raw = self.shared.protocol.encode(
            self.state(),
            &ServerboundPacket::EncryptionResponse(response),
        )?;

        // Inbound first: the server encrypts as soon as it has the response.
        let (done, installed) = oneshot::channel();
        self.shared
            .control
            .send(Control::EncryptInbound {
                cipher: Cfb8Cipher::from_shared_secret(&shared_secret),
                done,
            })
            .await
            .map_err(|_| ProtocolError::Disconnected)?;
        installed.await.map_err(|_| ProtocolError::Disconnected)?;

        let mut writer = self.shared.outbound.lock().await;
        self.shared.write(&mut writer, &raw).await?;
        writer.enable_encryption(Cfb8Cipher::from_shared_secret(&shared_secret));
        debug!("Encryption enabled");
        Ok(())
    }

    /// Tear the connection down. Safe to call any number of times.
    pub fn disconnect(&self) {
        self.shared.close(DisconnectCause::Local);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("version", &self.version())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Reject chat the server would kick for.
///
/// # Errors
///
/// Returns [`ClientError::InvalidChat`] for blank messages, messages with a
/// section sign or line break, and messages over the version's limit.
pub fn validate_chat(message: &str, version: ProtocolVersion) -> Result<()> {
    if message.trim().is_empty() {
        return Err(ClientError::InvalidChat("message is blank".into()));
    }
    if let Some(c) = message.chars().find(|c| ILLEGAL_CHAT_CHARS.contains(c)) {
        return Err(ClientError::InvalidChat(format!("illegal character {c:?}")));
    }
    let max = max_chat_length(version);
    if message.chars().count() > max {
        return Err(ClientError::InvalidChat(format!("longer than {max} characters")));
    }
    Ok(())
}

/// A running connection.
#[derive(Debug)]
pub struct Connection {
    handle: ConnectionHandle,
    task: JoinHandle<DisconnectCause>,
}

impl Connection {
    /// Dial the configured server and log in.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the TCP connection fails,
    /// or the login packets cannot be sent.
    pub async fn connect(
        config: &ClientConfig,
        version: ProtocolVersion,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let stream = TcpStream::connect(&config.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: config.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        Self::start(stream, config, version, dispatcher).await
    }

    /// Log in over an already connected stream.
    ///
    /// Sends the handshake and login start, then hands the stream to the
    /// reader task.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the packet tables do not
    /// resolve, or the login packets cannot be sent.
    pub async fn start<S>(
        stream: S,
        config: &ClientConfig,
        version: ProtocolVersion,
        dispatcher: Dispatcher,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (host, port) = config.host_port()?;
        let protocol = vanilla::registry().resolve(version)?;

        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FrameReader::new(Box::new(read_half) as BoxReader, FrameCodec::default());
        let writer = FrameWriter::new(Box::new(write_half) as BoxWriter, FrameCodec::default());

        let mut machine = StateMachine::new();
        let (control_tx, control_rx) = mpsc::channel(4);
        let shared = Arc::new(Shared {
            outbound: Mutex::new(writer),
            protocol,
            state: machine.shared(),
            cancel: CancellationToken::new(),
            cause: std::sync::Mutex::new(None),
            control: control_tx,
        });

        let handshake = Handshake::new(version.as_raw(), host, port, NextState::Login);
        shared.send(&ServerboundPacket::Handshake(handshake)).await?;
        // Committed only once the handshake is on the wire.
        machine.transition(NextState::Login.target())?;
        shared
            .send(&ServerboundPacket::LoginStart(LoginStart::new(
                config.username.as_str(),
            )))
            .await?;

        let task = ReaderTask {
            reader,
            machine,
            dispatcher,
            ctx: DecodeContext {
                version,
                blocks: Arc::new(LegacyBlocks),
                compressor: Arc::new(Zlib::default()),
            },
            shared: Arc::clone(&shared),
            control: control_rx,
            read_timeout: config.read_timeout,
        };
        let span = info_span!(
            "conn",
            addr = %config.addr,
            protocol = version.as_raw(),
            user = %config.username
        );
        let task = tokio::spawn(task.run().instrument(span));

        Ok(Self {
            handle: ConnectionHandle { shared },
            task,
        })
    }

    /// A handle for sending and inspecting the connection.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Wait for the connection to end and report why.
    pub async fn closed(self) -> DisconnectCause {
        match self.task.await {
            Ok(cause) => cause,
            Err(e) => DisconnectCause::Protocol(format!("reader task failed: {e}")),
        }
    }
}

enum Event {
    Cancelled,
    Control(Control),
    Read(std::result::Result<tuff_mc::error::Result<Option<RawPacket>>, Elapsed>),
}

struct ReaderTask {
    reader: FrameReader<BoxReader>,
    machine: StateMachine,
    dispatcher: Dispatcher,
    ctx: DecodeContext,
    shared: Arc<Shared>,
    control: mpsc::Receiver<Control>,
    read_timeout: Duration,
}

impl ReaderTask {
    async fn run(mut self) -> DisconnectCause {
        let cause = loop {
            let event = tokio::select! {
                biased;
                () = self.shared.cancel.cancelled() => Event::Cancelled,
                Some(control) = self.control.recv() => Event::Control(control),
                read = tokio::time::timeout(self.read_timeout, self.reader.read_packet()) => {
                    Event::Read(read)
                }
            };

            let raw = match event {
                Event::Cancelled => break self.shared.cause().unwrap_or(DisconnectCause::Local),
                Event::Control(control) => {
                    self.apply_control(control);
                    continue;
                }
                Event::Read(Err(_)) => break DisconnectCause::Timeout,
                Event::Read(Ok(Err(ProtocolError::Io(e)))) => {
                    break DisconnectCause::Io(e.to_string());
                }
                Event::Read(Ok(Err(e))) => break DisconnectCause::Protocol(e.to_string()),
                Event::Read(Ok(Ok(None))) => break DisconnectCause::Closed,
                Event::Read(Ok(Ok(Some(raw)))) => raw,
            };

            if let Some(cause) = self.handle_frame(&raw).await {
                break cause;
            }
        };

        self.teardown(cause).await
    }

    fn apply_control(&mut self, control: Control) {
        match control {
            Control::EncryptInbound { cipher, done } => {
                self.reader.enable_encryption(cipher);
                // The handle may have given up waiting; nothing to undo.
                let _ = done.send(());
            }
        }
    }

    async fn handle_frame(&mut self, raw: &RawPacket) -> Option<DisconnectCause> {
        let state = self.machine.current();
        if state == ConnectionState::Disconnected {
            return Some(self.shared.cause().unwrap_or(DisconnectCause::Local));
        }

        let packet = match self.shared.protocol.decode(state, raw, &self.ctx) {
            Ok(packet) => packet,
            Err(e) if e.severity() == Severity::Connection => {
                return Some(DisconnectCause::Protocol(e.to_string()));
            }
            Err(e @ ProtocolError::UnknownPacket { .. }) => {
                debug!(%state, id = raw.id, "Dropping packet: {e}");
                return None;
            }
            Err(e) => {
                warn!(%state, id = raw.id, "Dropping packet: {e}");
                return None;
            }
        };

        trace!(kind = %packet.kind(), id = raw.id, "Received packet");
        self.dispatcher.dispatch(state, &packet);
        self.apply(packet).await
    }

    /// React to packets that change the connection itself.
    async fn apply(&mut self, packet: ClientboundPacket) -> Option<DisconnectCause> {
        match packet {
            ClientboundPacket::SetCompression(set) => {
                self.reader.set_compression(set.threshold);
                self.shared
                    .outbound
                    .lock()
                    .await
                    .set_compression(set.threshold);
                debug!(threshold = set.threshold, "Compression threshold set");
                None
            }
            ClientboundPacket::LoginSuccess(success) => {
                if let Err(e) = self.machine.transition(ConnectionState::Play) {
                    return Some(DisconnectCause::Protocol(e.to_string()));
                }
                info!(username = %success.username, uuid = %success.uuid, "Logged in");
                None
            }
            ClientboundPacket::KeepAlive(keep_alive) => {
                match self
                    .shared
                    .send(&ServerboundPacket::KeepAlive(keep_alive))
                    .await
                {
                    Ok(()) => None,
                    Err(e) if e.severity() == Severity::Connection => {
                        Some(DisconnectCause::Io(e.to_string()))
                    }
                    Err(e) => {
                        warn!("Failed to answer keep-alive: {e}");
                        None
                    }
                }
            }
            ClientboundPacket::LoginDisconnect(kick) | ClientboundPacket::Disconnect(kick) => {
                Some(DisconnectCause::Kicked(kick.reason))
            }
            _ => None,
        }
    }

    async fn teardown(mut self, cause: DisconnectCause) -> DisconnectCause {
        self.shared.close(cause);
        let cause = self.shared.cause().unwrap_or(DisconnectCause::Local);

        if self.machine.disconnect() {
            info!(%cause, "Disconnected");
        }

        if let Err(e) = self.shared.outbound.lock().await.shutdown().await {
            trace!("Shutdown after disconnect: {e}");
        }
        self.control.close();
        cause
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use tokio::io::DuplexStream;
    use tuff_mc::buffer::{ByteReader, ByteWriter};
    use tuff_mc::packets::{
        Disconnect, EncryptionRequest, KeepAlive, LoginSuccess, PacketKind, SetCompression,
    };
    use uuid::Uuid;

    use super::*;

    type ServerReader = FrameReader<tokio::io::ReadHalf<DuplexStream>>;
    type ServerWriter = FrameWriter<tokio::io::WriteHalf<DuplexStream>>;

    const SECRET: [u8; 16] = [7; 16];

    fn config() -> ClientConfig {
        ClientConfig::new("localhost:25565").with_read_timeout(Duration::from_secs(5))
    }

    fn raw(id: i32, write: impl FnOnce(&mut ByteWriter)) -> RawPacket {
        let mut writer = ByteWriter::new();
        write(&mut writer);
        RawPacket::new(id, writer.into_inner().freeze())
    }

    /// Server side of a duplex pipe, past handshake and login start.
    async fn accept(server: DuplexStream) -> (ServerReader, ServerWriter) {
        let (read_half, write_half) = tokio::io::split(server);
        let mut reader = FrameReader::new(read_half, FrameCodec::default());
        let writer = FrameWriter::new(write_half, FrameCodec::default());

        let handshake = reader.read_packet().await.unwrap().unwrap();
        let handshake = Handshake::read(&mut ByteReader::new(handshake.payload)).unwrap();
        assert_eq!(handshake.protocol_version, 47);
        assert_eq!(handshake.next_state, NextState::Login);

        let login = reader.read_packet().await.unwrap().unwrap();
        assert_eq!(login.id, 0x00);
        let login = LoginStart::read(&mut ByteReader::new(login.payload)).unwrap();
        assert_eq!(login.name, "tuff");

        (reader, writer)
    }

    async fn send_login_success(writer: &mut ServerWriter) {
        let success = LoginSuccess::new(Uuid::new_v4(), "tuff");
        writer
            .write_packet(&raw(0x02, |w| success.write(w)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_keep_alive_and_unknown_packet() {
        let (client, server) = tokio::io::duplex(4096);
        let (ready_tx, ready_rx) = oneshot::channel();

        let fake = tokio::spawn(async move {
            let (mut reader, mut writer) = accept(server).await;

            writer
                .write_packet(&raw(0x03, |w| SetCompression::new(256).write(w)))
                .await
                .unwrap();
            writer.set_compression(256);
            reader.set_compression(256);

            send_login_success(&mut writer).await;
            writer
                .write_packet(&RawPacket::new(0x7F, Bytes::from_static(b"junk")))
                .await
                .unwrap();
            writer
                .write_packet(&raw(0x00, |w| KeepAlive::new(99).write_v1_8(w)))
                .await
                .unwrap();

            let reply = reader.read_packet().await.unwrap().unwrap();
            assert_eq!(reply.id, 0x00);
            let reply = KeepAlive::read_v1_8(&mut ByteReader::new(reply.payload)).unwrap();
            assert_eq!(reply.id, 99);
            ready_tx.send(()).unwrap();

            let chat = reader.read_packet().await.unwrap().unwrap();
            assert_eq!(chat.id, 0x01);
            let chat = ChatSend::read(&mut ByteReader::new(chat.payload)).unwrap();
            assert_eq!(chat.message, "hello");

            writer
                .write_packet(&raw(0x40, |w| Disconnect::new(r#"{"text":"bye"}"#).write(w)))
                .await
                .unwrap();
        });

        let keep_alives = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();
        let counter = Arc::clone(&keep_alives);
        dispatcher.on(PacketKind::KeepAlive, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let connection = Connection::start(client, &config(), ProtocolVersion::V1_8, dispatcher)
            .await
            .unwrap();
        let handle = connection.handle();

        ready_rx.await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Play);
        handle.send_chat_message("hello").await.unwrap();

        let cause = connection.closed().await;
        fake.await.unwrap();

        assert_eq!(cause, DisconnectCause::Kicked(r#"{"text":"bye"}"#.into()));
        assert_eq!(keep_alives.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(matches!(
            handle.send(ServerboundPacket::KeepAlive(KeepAlive::new(1))).await,
            Err(ClientError::Protocol(ProtocolError::Disconnected))
        ));
    }

    #[tokio::test]
    async fn test_read_timeout_disconnects() {
        let (client, server) = tokio::io::duplex(4096);
        let fake = tokio::spawn(async move {
            let (mut reader, _writer) = accept(server).await;
            // Hold the stream open until the client gives up.
            while let Ok(Some(_)) = reader.read_packet().await {}
        });

        let config = config().with_read_timeout(Duration::from_millis(50));
        let connection =
            Connection::start(client, &config, ProtocolVersion::V1_8, Dispatcher::new())
                .await
                .unwrap();

        assert_eq!(connection.closed().await, DisconnectCause::Timeout);
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (client, server) = tokio::io::duplex(4096);
        let fake = tokio::spawn(async move {
            let (mut reader, _writer) = accept(server).await;
            while let Ok(Some(_)) = reader.read_packet().await {}
        });

        let connection =
            Connection::start(client, &config(), ProtocolVersion::V1_8, Dispatcher::new())
                .await
                .unwrap();
        let handle = connection.handle();
        handle.disconnect();
        handle.disconnect();
        assert!(handle.is_closed());

        assert_eq!(connection.closed().await, DisconnectCause::Local);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        handle.disconnect();
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_close_ends_connection() {
        let (client, server) = tokio::io::duplex(4096);
        let fake = tokio::spawn(async move {
            let (_reader, mut writer) = accept(server).await;
            send_login_success(&mut writer).await;
        });

        let connection =
            Connection::start(client, &config(), ProtocolVersion::V1_8, Dispatcher::new())
                .await
                .unwrap();
        fake.await.unwrap();
        assert_eq!(connection.closed().await, DisconnectCause::Closed);
    }

    #[tokio::test]
    async fn test_encryption_handoff() {
        let (client, server) = tokio::io::duplex(4096);
        let fake = tokio::spawn(async move {
            let (mut reader, mut writer) = accept(server).await;

            let request = EncryptionRequest::new(
                Bytes::from_static(&[1, 2, 3]),
                Bytes::from_static(&[9, 9, 9, 9]),
            );
            writer
                .write_packet(&raw(0x01, |w| request.write(w)))
                .await
                .unwrap();

            let response = reader.read_packet().await.unwrap().unwrap();
            assert_eq!(response.id, 0x01);
            let response =
                EncryptionResponse::read(&mut ByteReader::new(response.payload)).unwrap();
            assert_eq!(&response.verify_token[..], &[9, 9, 9, 9]);

            reader.enable_encryption(Cfb8Cipher::from_shared_secret(&SECRET));
            writer.enable_encryption(Cfb8Cipher::from_shared_secret(&SECRET));

            send_login_success(&mut writer).await;
            writer
                .write_packet(&raw(0x00, |w| KeepAlive::new(5).write_v1_8(w)))
                .await
                .unwrap();
            let reply = reader.read_packet().await.unwrap().unwrap();
            assert_eq!(reply, raw(0x00, |w| KeepAlive::new(5).write_v1_8(w)));
        });

        let (request_tx, mut request_rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new();
        dispatcher.on(PacketKind::EncryptionRequest, move |packet| {
            if let ClientboundPacket::EncryptionRequest(request) = packet {
                request_tx.send(request.clone())?;
            }
            Ok(())
        });

        let connection = Connection::start(client, &config(), ProtocolVersion::V1_8, dispatcher)
            .await
            .unwrap();
        let handle = connection.handle();

        let request = request_rx.recv().await.unwrap();
        let response =
            EncryptionResponse::new(Bytes::from_static(&[0xAA; 16]), request.verify_token);
        handle.enable_encryption(SECRET, response).await.unwrap();

        fake.await.unwrap();
        assert_eq!(connection.closed().await, DisconnectCause::Closed);
    }

    #[test]
    fn test_chat_validation() {
        let v1_8 = ProtocolVersion::V1_8;
        assert!(validate_chat("/help", v1_8).is_ok());
        assert!(validate_chat("   ", v1_8).is_err());
        assert!(validate_chat("line\nbreak", v1_8).is_err());
        assert!(validate_chat("\u{a7}cred", v1_8).is_err());

        let long = "a".repeat(150);
        assert!(validate_chat(&long, v1_8).is_err());
        assert!(validate_chat(&long, ProtocolVersion::V1_12_2).is_ok());
    }
}
