//! Handler registration and dispatch of decoded packets.
//!
//! Handlers are registered per [`PacketKind`] and run in registration
//! order. A handler that fails or panics is logged and skipped; the rest of
//! the chain still runs and the read loop never sees the failure.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{trace, warn};

use crate::packets::{ClientboundPacket, PacketKind};
use crate::state::ConnectionState;

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A packet handler.
pub type Handler = Box<dyn Fn(&ClientboundPacket) -> Result<(), HandlerError> + Send + Sync>;

/// What happened to one dispatched packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that returned `Ok`.
    pub succeeded: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchOutcome {
    /// Number of handlers invoked.
    #[must_use]
    pub const fn invoked(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Handler chains keyed by packet kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<PacketKind, Vec<Handler>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the chain for `kind`.
    pub fn on<F>(&mut self, kind: PacketKind, handler: F) -> &mut Self
    where
        F: Fn(&ClientboundPacket) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
        self
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: PacketKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Run the chain for `packet`.
    ///
    /// Nothing runs while `state` is [`ConnectionState::Disconnected`].
    pub fn dispatch(&self, state: ConnectionState, packet: &ClientboundPacket) -> DispatchOutcome {
        let kind = packet.kind();
        let mut outcome = DispatchOutcome::default();

        if state == ConnectionState::Disconnected {
            trace!(%kind, "Dropping packet on disconnected connection");
            return outcome;
        }

        let Some(chain) = self.handlers.get(&kind) else {
            trace!(%kind, "No handlers");
            return outcome;
        };

        for (index, handler) in chain.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(packet))) {
                Ok(Ok(())) => outcome.succeeded += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    warn!(%kind, handler = index, "Handler failed: {e}");
                }
                Err(panic) => {
                    outcome.failed += 1;
                    warn!(%kind, handler = index, "Handler panicked: {}", panic_message(&*panic));
                }
            }
        }

        outcome
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        counts.sort_unstable();
        f.debug_struct("Dispatcher").field("handlers", &counts).finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
