//! Client-side state-synchronization core for a Vibin remote-control UI.
//!
//! A native backend process owns the WebSocket session with the Vibin music
//! streamer and pushes typed state over four channels: `AppState`,
//! `VibinState`, `Position`, and `Error`. The [`Engine`] ingests those
//! pushes, keeps a small set of reactive containers consistent for the
//! renderer to subscribe to, applies the playhead-invalidation and
//! buffering-debounce policies, and maintains a durable record of the
//! last-used host across sessions.

pub mod backend;
pub mod config;
pub mod containers;
pub mod engine;
pub mod error;
pub mod host_store;
pub mod selectors;
pub mod state;

pub use backend::{Channel, VibinBackend};
pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, StorageError};
pub use host_store::HostStore;
pub use state::{
    AppError, AppState, ConnectionStatus, PlayheadPosition, Position, Screen, VibinHostDetails,
    VibinState,
};
