//! Server list ping, used to discover the server's protocol version.
//!
//! handshake(status) -> status request -> status response -> ping -> pong

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;
use tuff_mc::block::LegacyBlocks;
use tuff_mc::compression::Zlib;
use tuff_mc::packets::handshake::PROBE_PROTOCOL;
use tuff_mc::packets::{
    ClientboundPacket, DecodeContext, Handshake, NextState, Ping, ServerboundPacket, StatusRequest,
    vanilla,
};
use tuff_mc::transport::{FrameReader, FrameWriter};
use tuff_mc::{FrameCodec, ProtocolVersion, ResolvedProtocol, StateMachine};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// The parts of the status JSON the client cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    pub version: StatusVersion,
    #[serde(default)]
    pub players: Option<StatusPlayers>,
    /// A chat component; a bare string on old servers.
    #[serde(default)]
    pub description: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusPlayers {
    pub max: i32,
    pub online: i32,
}

impl ServerStatus {
    /// Parse a status response body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Json`] if the JSON lacks a version.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The protocol version the server speaks.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::from_raw_lenient(self.version.protocol)
    }

    /// The plain text of the description, without formatting.
    #[must_use]
    pub fn description_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.description, &mut out);
        out
    }
}

fn collect_text(component: &serde_json::Value, out: &mut String) {
    match component {
        serde_json::Value::String(s) => out.push_str(s),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(serde_json::Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    collect_text(part, out);
                }
            }
        }
        serde_json::Value::Array(parts) => {
            for part in parts {
                collect_text(part, out);
            }
        }
        _ => {}
    }
}

/// Result of one probe.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    pub status: ServerStatus,
    /// Round trip of the ping.
    pub latency: Duration,
}

/// Probe the configured server.
///
/// # Errors
///
/// Returns an error if the connection fails, the exchange takes longer than
/// the read timeout, or the server answers with something unusable.
pub async fn probe(config: &ClientConfig) -> Result<StatusProbe> {
    let (host, port) = config.host_port()?;
    let exchange = async {
        let stream = TcpStream::connect(&config.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: config.addr.clone(),
                source,
            })?;
        probe_stream(stream, host, port).await
    };

    tokio::time::timeout(config.read_timeout, exchange)
        .await
        .map_err(|_| ClientError::Timeout)?
}

/// Run the status exchange over an already connected stream.
///
/// # Errors
///
/// Returns an error if the stream fails or the server misbehaves.
pub async fn probe_stream<S>(stream: S, host: &str, port: u16) -> Result<StatusProbe>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Status ids and layouts are the same in every version.
    let protocol = vanilla::registry().resolve(ProtocolVersion::latest())?;
    let ctx = DecodeContext {
        version: protocol.version(),
        blocks: Arc::new(LegacyBlocks),
        compressor: Arc::new(Zlib::default()),
    };

    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::new(read_half, FrameCodec::default());
    let mut writer = FrameWriter::new(write_half, FrameCodec::default());
    let mut machine = StateMachine::new();

    let handshake = Handshake::new(PROBE_PROTOCOL, host, port, NextState::Status);
    send(&protocol, &machine, &mut writer, ServerboundPacket::Handshake(handshake)).await?;
    machine.transition(NextState::Status.target())?;

    send(
        &protocol,
        &machine,
        &mut writer,
        ServerboundPacket::StatusRequest(StatusRequest),
    )
    .await?;
    let status = match receive(&protocol, &machine, &ctx, &mut reader).await? {
        ClientboundPacket::StatusResponse(response) => ServerStatus::parse(&response.json)?,
        other => return Err(unexpected(&other)),
    };
    debug!(
        version = %status.version.name,
        protocol = status.version.protocol,
        "Received status"
    );

    let payload = now_millis();
    let started = Instant::now();
    send(
        &protocol,
        &machine,
        &mut writer,
        ServerboundPacket::StatusPing(Ping::new(payload)),
    )
    .await?;
    let latency = match receive(&protocol, &machine, &ctx, &mut reader).await? {
        ClientboundPacket::StatusPong(pong) if pong.payload == payload => started.elapsed(),
        ClientboundPacket::StatusPong(pong) => {
            return Err(ClientError::Status(format!(
                "pong payload {} does not match ping {payload}",
                pong.payload
            )));
        }
        other => return Err(unexpected(&other)),
    };

    machine.disconnect();
    Ok(StatusProbe { status, latency })
}

async fn send<W: AsyncWrite + Unpin>(
    protocol: &ResolvedProtocol,
    machine: &StateMachine,
    writer: &mut FrameWriter<W>,
    packet: ServerboundPacket,
) -> Result<()> {
    let raw = protocol.encode(machine.current(), &packet)?;
    writer.write_packet(&raw).await?;
    Ok(())
}

async fn receive<R: AsyncRead + Unpin>(
    protocol: &ResolvedProtocol,
    machine: &StateMachine,
    ctx: &DecodeContext,
    reader: &mut FrameReader<R>,
) -> Result<ClientboundPacket> {
    let raw = reader
        .read_packet()
        .await?
        .ok_or_else(|| ClientError::Status("server closed the connection".into()))?;
    Ok(protocol.decode(machine.current(), &raw, ctx)?)
}

fn unexpected(packet: &ClientboundPacket) -> ClientError {
    ClientError::Status(format!("unexpected {}", packet.kind()))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tuff_mc::RawPacket;
    use tuff_mc::buffer::{ByteReader, ByteWriter};
    use tuff_mc::packets::{Pong, StatusResponse};

    use super::*;

    const JSON: &str = r#"{
        "version": {"name": "1.8.9", "protocol": 47},
        "players": {"max": 20, "online": 3},
        "description": {"text": "A ", "extra": [{"text": "server"}]}
    }"#;

    fn raw(id: i32, write: impl FnOnce(&mut ByteWriter)) -> RawPacket {
        let mut writer = ByteWriter::new();
        write(&mut writer);
        RawPacket::new(id, writer.into_inner().freeze())
    }

    #[tokio::test]
    async fn test_probe_stream() {
        let (client, server) = tokio::io::duplex(4096);

        let fake = tokio::spawn(async move {
            let (read_half, write_half) = tokio::io::split(server);
            let mut reader = FrameReader::new(read_half, FrameCodec::default());
            let mut writer = FrameWriter::new(write_half, FrameCodec::default());

            let handshake = reader.read_packet().await.unwrap().unwrap();
            let handshake = Handshake::read(&mut ByteReader::new(handshake.payload)).unwrap();
            assert_eq!(handshake.protocol_version, PROBE_PROTOCOL);
            assert_eq!(handshake.next_state, NextState::Status);

            let request = reader.read_packet().await.unwrap().unwrap();
            assert_eq!(request, RawPacket::new(0x00, Bytes::new()));
            writer
                .write_packet(&raw(0x00, |w| StatusResponse::new(JSON).write(w)))
                .await
                .unwrap();

            let ping = reader.read_packet().await.unwrap().unwrap();
            let ping = Ping::read(&mut ByteReader::new(ping.payload)).unwrap();
            writer
                .write_packet(&raw(0x01, |w| Pong::new(ping.payload).write(w)))
                .await
                .unwrap();
        });

        let probe = probe_stream(client, "localhost", 25565).await.unwrap();
        fake.await.unwrap();

        assert_eq!(probe.status.protocol_version(), ProtocolVersion::V1_8);
        assert_eq!(probe.status.players.unwrap().online, 3);
        assert_eq!(probe.status.description_text(), "A server");
    }

    #[tokio::test]
    async fn test_server_closes_early() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);
        assert!(probe_stream(client, "localhost", 25565).await.is_err());
    }

    #[test]
    fn test_legacy_string_description() {
        let status =
            ServerStatus::parse(r#"{"version":{"name":"1.7.10","protocol":5},"description":"Hi"}"#)
                .unwrap();
        assert_eq!(status.description_text(), "Hi");
        assert!(status.players.is_none());
        assert_eq!(status.protocol_version(), ProtocolVersion::V1_7_10);
    }

    #[test]
    fn test_missing_version_is_error() {
        assert!(matches!(
            ServerStatus::parse(r#"{"description":"Hi"}"#),
            Err(ClientError::Json(_))
        ));
    }
}
