//! Values derived from the reactive containers.
//!
//! All but one are pure functions of the current container values; the
//! exception is [`BufferingMonitor`], which needs its own timer state to
//! keep inter-track buffering blips off the screen.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::{AppState, ConnectionStatus, PlayStatus, Power, VibinState};

pub fn is_system_power_on(state: &VibinState) -> bool {
    state.power == Some(Power::On)
}

pub fn is_streamer_power_on(state: &VibinState) -> bool {
    state.streamer_power == Some(Power::On)
}

pub fn is_connected(state: &AppState) -> bool {
    state.vibin_connection.state == ConnectionStatus::Connected
}

pub fn is_playing(state: &VibinState) -> bool {
    state
        .transport
        .as_ref()
        .map(|transport| transport.play_state == PlayStatus::Play)
        .unwrap_or(false)
}

/// Debounced "buffering audio" indicator.
///
/// The streamer passes through `buffering` for a moment on every track
/// change, which would flash a spinner at the user. Entering buffering is
/// therefore only surfaced once it has persisted for the full window;
/// leaving buffering clears the indicator instantly.
pub struct BufferingMonitor {
    value: watch::Sender<bool>,
    window: Duration,
    timer: Option<JoinHandle<()>>,
}

impl BufferingMonitor {
    pub fn new(window: Duration) -> Self {
        let (value, _) = watch::channel(false);
        Self {
            value,
            window,
            timer: None,
        }
    }

    /// Feed the monitor the latest domain state.
    ///
    /// At most one timer is ever pending: each call cancels the previous one
    /// before deciding what to schedule, so a blip that ends before the
    /// window elapses never fires.
    pub fn observe(&mut self, state: &VibinState) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        if state.is_buffering() {
            let value = self.value.clone();
            let window = self.window;
            self.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(window).await;
                value.send_replace(true);
            }));
        } else {
            self.value.send_replace(false);
        }
    }

    pub fn is_buffering(&self) -> bool {
        *self.value.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.value.subscribe()
    }
}

impl Drop for BufferingMonitor {
    fn drop(&mut self) {
        // A stale callback must never outlive the monitor.
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
