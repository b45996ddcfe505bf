use serde::{Deserialize, Serialize};

// ===============================================================================================
// Payload types pushed by the backend over the four message channels:
//
// AppState   - The backend's connection to the Vibin server (status + optional message).
// VibinState - Aggregate streamer state (power, transport, source, current track, etc).
// Position   - Current playhead position. Emitted frequently (likely once per second).
// Error      - Backend errors to be surfaced to the user.
//
// Field names and enum tags match the backend's JSON exactly; the serde renames below are
// load-bearing.
// ===============================================================================================

/// State of the backend's connection to the Vibin server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
}

/// Connection details carried inside every `AppState` push. `message` is only
/// present when the status was caused by an error (e.g. connection refused).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDetails {
    pub state: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall application state as reported by the backend. Overwritten
/// wholesale on every push; never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub vibin_connection: ConnectionDetails,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            vibin_connection: ConnectionDetails {
                state: ConnectionStatus::Disconnected,
                message: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

/// Transport play state as reported by the streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStatus {
    Buffering,
    Connecting,
    NoSignal,
    NotReady,
    Pause,
    Play,
    Ready,
    Stop,
}

/// Transport controls the streamer currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportAction {
    Next,
    Pause,
    Play,
    Previous,
    Repeat,
    Seek,
    Shuffle,
    Stop,
    TogglePlayback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatSetting {
    Off,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleSetting {
    Off,
    All,
}

/// Class tag identifying what kind of audio source is active. Playhead
/// invalidation compares these tags only, never the rest of [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceClass {
    #[serde(rename = "digital.coax")]
    DigitalCoax,
    #[serde(rename = "digital.toslink")]
    DigitalToslink,
    #[serde(rename = "digital.usb")]
    DigitalUsb,
    #[serde(rename = "stream.media")]
    StreamMedia,
    #[serde(rename = "stream.radio")]
    StreamRadio,
    #[serde(rename = "stream.service.airplay")]
    StreamServiceAirplay,
    #[serde(rename = "stream.service.cast")]
    StreamServiceCast,
    #[serde(rename = "stream.service.roon")]
    StreamServiceRoon,
    #[serde(rename = "stream.service.spotify")]
    StreamServiceSpotify,
    #[serde(rename = "stream.service.tidal")]
    StreamServiceTidal,
}

/// The streamer's active audio source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub default_name: String,
    pub class: SourceClass,
    pub nameable: bool,
    pub ui_selectable: bool,
    pub description: String,
    pub description_locale: String,
    pub preferred_order: i32,
}

/// The track currently loaded by the streamer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub art_url: String,
    /// Track duration in seconds.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amplifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<Power>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

/// What the streamer's front panel is showing. All fields optional; the
/// backend always includes `display` in a `VibinState` push, defaulting to
/// this struct's `Default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamerDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    pub play_state: PlayStatus,
    pub active_controls: Vec<TransportAction>,
    pub repeat: RepeatSetting,
    pub shuffle: ShuffleSetting,
}

/// Aggregate streamer state ("domain state"). Every top-level field except
/// `display` is absent until the backend has reported it. Replaced wholesale
/// on each push, but the prior value is inspected first to drive playhead
/// invalidation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VibinState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamer_power: Option<Power>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplifier: Option<Amplifier>,
    #[serde(default)]
    pub display: StreamerDisplay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_track: Option<ActiveTrack>,
}

impl VibinState {
    /// Class tag of the active source, if any.
    pub fn source_class(&self) -> Option<SourceClass> {
        self.source.as_ref().map(|source| source.class)
    }

    /// Whether the transport reports it is buffering audio right now.
    pub fn is_buffering(&self) -> bool {
        self.transport
            .as_ref()
            .map(|transport| transport.play_state == PlayStatus::Buffering)
            .unwrap_or(false)
    }
}

/// Playhead position push. Always a direct overwrite of the playhead
/// container, no policy attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Seconds into the current track.
    pub position: f64,
}

/// Locally-cached playhead position in seconds. `None` means no held reading
/// is trustworthy (connection changed, source changed, etc).
pub type PlayheadPosition = Option<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    WebSocket,
}

/// An error reported by the backend. Domain data rather than a local fault;
/// last one wins, no history kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppError {
    pub category: ErrorCategory,
    pub message: String,
}

/// Which screen the UI is showing. Owned by the renderer, not derived from
/// backend pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Main,
    Settings,
}

/// The durable record of the last-used Vibin host and whether the most
/// recent connection attempt to it succeeded. Survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibinHostDetails {
    pub host: String,
    pub have_connected: bool,
}
