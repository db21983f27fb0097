//! Tuff: headless Minecraft client for 1.7.10 - 1.12.2 servers.
//!
//! Probes the server for its protocol version, logs in offline and logs
//! what the server sends until it disconnects or Ctrl-C is pressed.

use tracing::{info, warn};
use tuff_client::status;
use tuff_client::{ClientConfig, Connection};
use tuff_mc::packets::ClientboundPacket;
use tuff_mc::{Dispatcher, PacketKind, ProtocolVersion};

/// Handlers that log the interesting parts of the session.
fn dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .on(PacketKind::JoinGame, |packet| {
            if let ClientboundPacket::JoinGame(join) = packet {
                info!(
                    entity_id = join.entity_id,
                    game_mode = join.game_mode,
                    dimension = join.dimension,
                    level_type = %join.level_type,
                    "Joined game"
                );
            }
            Ok(())
        })
        .on(PacketKind::ChatMessage, |packet| {
            if let ClientboundPacket::ChatMessage(chat) = packet {
                info!(position = ?chat.position, "Chat: {}", chat.json);
            }
            Ok(())
        })
        .on(PacketKind::ChunkData, |packet| {
            if let ClientboundPacket::ChunkData(data) = packet {
                let location = data.column.location;
                info!(
                    x = location.x,
                    z = location.z,
                    sections = data.column.chunk.section_count(),
                    full = data.full,
                    "Chunk"
                );
            }
            Ok(())
        })
        .on(PacketKind::ChunkBulk, |packet| {
            if let ClientboundPacket::ChunkBulk(bulk) = packet {
                let sections: usize = bulk.columns.iter().map(|c| c.chunk.section_count()).sum();
                info!(columns = bulk.columns.len(), sections, "Chunk bulk");
            }
            Ok(())
        })
        .on(PacketKind::EncryptionRequest, |_| {
            Err("server is in online mode; only offline-mode servers are supported".into())
        });
    dispatcher
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = ClientConfig::from_env()?;

    let version = match config.protocol {
        Some(version) if !config.status_only => version,
        _ => {
            let probe = status::probe(&config).await?;
            info!(
                addr = %config.addr,
                version = %probe.status.version.name,
                protocol = probe.status.version.protocol,
                latency = ?probe.latency,
                motd = %probe.status.description_text(),
                "Server status"
            );
            if config.status_only {
                return Ok(());
            }
            probe.status.protocol_version()
        }
    };

    if ProtocolVersion::from_raw(version.as_raw()).is_none() {
        warn!(%version, "No exact packet table; using the nearest older release");
    }

    let connection = Connection::connect(&config, version, dispatcher()).await?;
    let handle = connection.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.disconnect();
        }
    });

    let cause = connection.closed().await;
    info!(%cause, "Session ended");
    Ok(())
}
