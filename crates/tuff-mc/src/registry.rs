//! Versioned packet registry.
//!
//! Every packet kind owns a [`VersionTable`]: a sorted list of protocol
//! versions at which its id or layout changed. Looking up a version finds
//! the greatest breakpoint at or below it, so a table with entries at 47,
//! 107 and 340 answers 200 with the 107 entry. A breakpoint can also mark
//! the kind as removed.
//!
//! Resolving the tables for one version is done once per connection and
//! yields a [`ResolvedProtocol`]: plain hash maps from id to decoder and
//! from kind to encoder.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use tracing::debug;

use crate::buffer::{ByteReader, ByteWriter};
use crate::codec::RawPacket;
use crate::error::{ProtocolError, Result};
use crate::packets::{ClientboundPacket, DecodeContext, PacketKind, ServerboundPacket};
use crate::state::{ConnectionState, Direction};
use crate::version::ProtocolVersion;

/// Reads one clientbound payload.
pub type DecodeFn = fn(&mut ByteReader, &DecodeContext) -> Result<ClientboundPacket>;

/// Writes one serverbound payload.
pub type EncodeFn = fn(&ServerboundPacket, &mut ByteWriter) -> Result<()>;

/// Values keyed by the first protocol version they apply to.
#[derive(Debug, Clone)]
pub struct VersionTable<T> {
    entries: Vec<(ProtocolVersion, Option<T>)>,
}

impl<T> VersionTable<T> {
    /// An empty table; resolves to nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Use `value` from `version` on, until the next breakpoint.
    #[must_use]
    pub fn since(mut self, version: ProtocolVersion, value: T) -> Self {
        self.insert(version, Some(value));
        self
    }

    /// Nothing applies from `version` on, until the next breakpoint.
    #[must_use]
    pub fn removed_in(mut self, version: ProtocolVersion) -> Self {
        self.insert(version, None);
        self
    }

    fn insert(&mut self, version: ProtocolVersion, value: Option<T>) {
        match self.entries.binary_search_by(|(v, _)| v.cmp(&version)) {
            Ok(i) => self.entries[i].1 = value,
            Err(i) => self.entries.insert(i, (version, value)),
        }
    }

    /// The value at the greatest breakpoint not above `version`.
    ///
    /// `None` if `version` predates every breakpoint or falls in a removed
    /// range.
    #[must_use]
    pub fn resolve(&self, version: ProtocolVersion) -> Option<&T> {
        let idx = self.entries.partition_point(|(v, _)| *v <= version);
        self.entries.get(idx.checked_sub(1)?)?.1.as_ref()
    }

    /// Breakpoint versions, oldest first.
    pub fn breakpoints(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        self.entries.iter().map(|(v, _)| *v)
    }
}

impl<T> Default for VersionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A numeric id paired with the function handling that layout.
#[derive(Clone, Copy)]
pub struct Codec<F> {
    pub id: i32,
    pub func: F,
}

impl<F> Codec<F> {
    pub const fn new(id: i32, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> fmt::Debug for Codec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Codec(0x{:02X})", self.id)
    }
}

#[derive(Debug)]
struct Registration<F> {
    state: ConnectionState,
    kind: PacketKind,
    table: VersionTable<Codec<F>>,
}

/// Version tables for every known packet kind.
#[derive(Debug, Default)]
pub struct PacketRegistry {
    clientbound: Vec<Registration<DecodeFn>>,
    serverbound: Vec<Registration<EncodeFn>>,
}

impl PacketRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the decoders of a server-to-client packet.
    pub fn clientbound(
        &mut self,
        state: ConnectionState,
        kind: PacketKind,
        table: VersionTable<Codec<DecodeFn>>,
    ) -> &mut Self {
        self.clientbound.push(Registration { state, kind, table });
        self
    }

    /// Register the encoders of a client-to-server packet.
    pub fn serverbound(
        &mut self,
        state: ConnectionState,
        kind: PacketKind,
        table: VersionTable<Codec<EncodeFn>>,
    ) -> &mut Self {
        self.serverbound.push(Registration { state, kind, table });
        self
    }

    /// Build the lookup maps for one negotiated version.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::DuplicatePacketId`] if two kinds resolve to
    /// the same id in the same state and direction.
    pub fn resolve(&self, version: ProtocolVersion) -> Result<ResolvedProtocol> {
        let mut decoders: HashMap<(ConnectionState, i32), (PacketKind, DecodeFn)> = HashMap::new();
        for reg in &self.clientbound {
            let Some(codec) = reg.table.resolve(version) else {
                continue;
            };
            match decoders.entry((reg.state, codec.id)) {
                Entry::Occupied(existing) => {
                    return Err(ProtocolError::DuplicatePacketId {
                        state: reg.state,
                        direction: Direction::Clientbound,
                        id: codec.id,
                        first: existing.get().0,
                        second: reg.kind,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert((reg.kind, codec.func));
                }
            }
        }

        let mut encoders = HashMap::new();
        let mut serverbound_ids: HashMap<(ConnectionState, i32), PacketKind> = HashMap::new();
        for reg in &self.serverbound {
            let Some(codec) = reg.table.resolve(version) else {
                continue;
            };
            if let Some(first) = serverbound_ids.insert((reg.state, codec.id), reg.kind) {
                return Err(ProtocolError::DuplicatePacketId {
                    state: reg.state,
                    direction: Direction::Serverbound,
                    id: codec.id,
                    first,
                    second: reg.kind,
                });
            }
            encoders.insert(reg.kind, (reg.state, *codec));
        }

        debug!(
            %version,
            decoders = decoders.len(),
            encoders = encoders.len(),
            "Resolved packet tables"
        );

        Ok(ResolvedProtocol {
            version,
            decoders,
            encoders,
        })
    }
}

/// Packet tables resolved for one protocol version.
#[derive(Debug, Clone)]
pub struct ResolvedProtocol {
    version: ProtocolVersion,
    decoders: HashMap<(ConnectionState, i32), (PacketKind, DecodeFn)>,
    encoders: HashMap<PacketKind, (ConnectionState, Codec<EncodeFn>)>,
}

impl ResolvedProtocol {
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Kind decoded for `id` in `state`, if any.
    #[must_use]
    pub fn clientbound_kind(&self, state: ConnectionState, id: i32) -> Option<PacketKind> {
        self.decoders.get(&(state, id)).map(|(kind, _)| *kind)
    }

    /// State and id `kind` is sent with, if it can be sent at all.
    #[must_use]
    pub fn serverbound_id(&self, kind: PacketKind) -> Option<(ConnectionState, i32)> {
        self.encoders.get(&kind).map(|(state, codec)| (*state, codec.id))
    }

    /// Decode a frame received in `state`.
    ///
    /// The decoder must consume the whole payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownPacket`] if nothing is registered for
    /// the id, or a packet-level error if the payload does not parse.
    pub fn decode(
        &self,
        state: ConnectionState,
        packet: &RawPacket,
        ctx: &DecodeContext,
    ) -> Result<ClientboundPacket> {
        let (kind, decode) =
            self.decoders
                .get(&(state, packet.id))
                .ok_or(ProtocolError::UnknownPacket {
                    state,
                    direction: Direction::Clientbound,
                    id: packet.id,
                    version: self.version,
                })?;

        let mut reader = ByteReader::new(packet.payload.clone());
        let decoded = decode(&mut reader, ctx).map_err(|e| payload_error(*kind, e))?;
        if reader.has_remaining() {
            return Err(ProtocolError::malformed(format!(
                "{kind}: {} trailing bytes",
                reader.remaining()
            )));
        }

        Ok(decoded)
    }

    /// Encode a packet to be sent in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedForVersion`] if the packet has no
    /// encoder at this version, or [`ProtocolError::WrongState`] if it
    /// belongs to another state.
    pub fn encode(&self, state: ConnectionState, packet: &ServerboundPacket) -> Result<RawPacket> {
        let kind = packet.kind();
        let (expected, codec) =
            self.encoders
                .get(&kind)
                .ok_or(ProtocolError::UnsupportedForVersion {
                    kind,
                    version: self.version,
                })?;
        if *expected != state {
            return Err(ProtocolError::WrongState {
                kind,
                expected: *expected,
                actual: state,
            });
        }

        let mut writer = ByteWriter::new();
        (codec.func)(packet, &mut writer)?;
        Ok(RawPacket::new(codec.id, writer.into_inner().freeze()))
    }
}

/// Errors from inside a payload never reach past the packet.
fn payload_error(kind: PacketKind, err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::VarIntTooLong
        | ProtocolError::VarLongTooLong
        | ProtocolError::FrameCorrupt(_)
        | ProtocolError::Io(_) => ProtocolError::malformed(format!("{kind}: {err}")),
        other => other,
    }
}
