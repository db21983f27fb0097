//! Connection runtime for the tuff client.
//!
//! [`status::probe`] asks a server which protocol it speaks;
//! [`Connection`] logs in with that version and keeps the session alive
//! while decoded packets flow to a [`tuff_mc::Dispatcher`].

pub mod config;
pub mod connection;
pub mod error;
pub mod status;
pub mod utils;

pub use config::ClientConfig;
pub use connection::{Connection, ConnectionHandle};
pub use error::{ClientError, Result};
pub use status::{ServerStatus, StatusProbe};
