use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::state::{AppError, AppState, Position, VibinState};

/// Identity of one backend push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    AppState,
    VibinState,
    Position,
    Error,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The backend boundary as seen by the engine.
///
/// The backend owns the WebSocket session with the Vibin server, translates
/// its protocol, and pushes typed payloads over four named channels. Delivery
/// is at-least-once and ordered per channel; there is no cross-channel
/// ordering. Once the engine holds all four subscriptions it calls
/// [`on_ui_ready`](VibinBackend::on_ui_ready) exactly once, and only then may
/// the backend start emitting anything it expects the engine to see.
///
/// Reconnection and retry policy live entirely behind this trait; the engine
/// performs none of its own.
#[async_trait]
pub trait VibinBackend: Send {
    async fn subscribe_app_state(&mut self) -> Result<UnboundedReceiver<AppState>>;

    async fn subscribe_vibin_state(&mut self) -> Result<UnboundedReceiver<VibinState>>;

    async fn subscribe_position(&mut self) -> Result<UnboundedReceiver<Position>>;

    async fn subscribe_errors(&mut self) -> Result<UnboundedReceiver<AppError>>;

    /// One-shot "ready to receive" handshake, sent after every subscription
    /// is active.
    async fn on_ui_ready(&mut self) -> Result<()>;
}
