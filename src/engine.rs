//! The state-synchronization engine.
//!
//! One [`Engine`] owns every reactive container, ingests the backend's four
//! push channels, and applies the invalidation rules that keep the playhead
//! and domain state honest. Handlers run to completion on a single task, so
//! each one can read prior state and then replace it without a race window.

use std::time::Duration;

use tokio::sync::watch;

use crate::backend::{Channel, VibinBackend};
use crate::config::Config;
use crate::containers::Container;
use crate::error::{EngineError, StorageError};
use crate::host_store::HostStore;
use crate::selectors::{self, BufferingMonitor};
use crate::state::{
    AppError, AppState, ConnectionStatus, PlayheadPosition, Position, Power, Screen,
    VibinHostDetails, VibinState,
};

pub struct Engine {
    app_state: Container<AppState>,
    vibin_state: Container<VibinState>,
    playhead: Container<PlayheadPosition>,
    last_error: Container<Option<AppError>>,
    screen: Container<Screen>,
    host_details: Container<VibinHostDetails>,
    store: HostStore,
    buffering: BufferingMonitor,
    initialized: bool,
}

impl Engine {
    /// Build an engine seeded from the durable host record.
    pub fn new(config: &Config, store: HostStore) -> Result<Self, EngineError> {
        let host_details = store.get_or_init()?;

        Ok(Self {
            app_state: Container::new(AppState::default()),
            vibin_state: Container::new(VibinState::default()),
            playhead: Container::new(None),
            last_error: Container::new(None),
            screen: Container::new(Screen::Main),
            host_details: Container::new(host_details),
            store,
            buffering: BufferingMonitor::new(Duration::from_millis(
                config.ui.buffering_debounce_ms,
            )),
            initialized: false,
        })
    }

    /// Subscribe to all four backend channels, perform the ready handshake,
    /// then process pushes until every channel closes.
    ///
    /// The handshake is sequenced strictly after the last subscription:
    /// anything the backend emits in response must land in an already-open
    /// channel, never in the gap between handshake and subscription.
    pub async fn run<B: VibinBackend>(&mut self, backend: &mut B) -> Result<(), EngineError> {
        let mut app_state_rx =
            backend
                .subscribe_app_state()
                .await
                .map_err(|source| EngineError::Subscription {
                    channel: Channel::AppState,
                    source,
                })?;
        let mut vibin_state_rx =
            backend
                .subscribe_vibin_state()
                .await
                .map_err(|source| EngineError::Subscription {
                    channel: Channel::VibinState,
                    source,
                })?;
        let mut position_rx =
            backend
                .subscribe_position()
                .await
                .map_err(|source| EngineError::Subscription {
                    channel: Channel::Position,
                    source,
                })?;
        let mut error_rx =
            backend
                .subscribe_errors()
                .await
                .map_err(|source| EngineError::Subscription {
                    channel: Channel::Error,
                    source,
                })?;

        backend.on_ui_ready().await.map_err(EngineError::Handshake)?;
        self.initialized = true;

        loop {
            tokio::select! {
                biased;

                Some(payload) = app_state_rx.recv() => self.handle_app_state(payload),
                Some(payload) = vibin_state_rx.recv() => self.handle_vibin_state(payload),
                Some(payload) = position_rx.recv() => self.handle_position(payload),
                Some(payload) = error_rx.recv() => self.handle_error(payload),
                else => break,
            }
        }

        Ok(())
    }

    // ── Channel handlers ─────────────────────────────────────────────

    /// Connection-state push: always invalidates the playhead, and maintains
    /// the durable connection history.
    fn handle_app_state(&mut self, next: AppState) {
        let status = next.vibin_connection.state;
        let errored = next.vibin_connection.message.is_some();

        self.app_state.set(next);
        // The source of truth for playback just changed state; any held
        // playhead reading is stale.
        self.playhead.set(None);

        if status == ConnectionStatus::Connected {
            self.record_have_connected(true);
        } else {
            // Never show stale domain data while not connected.
            let reset = VibinState::default();
            self.buffering.observe(&reset);
            self.vibin_state.set(reset);

            // A disconnect that carries a message was an error, not a clean
            // shutdown; record the failed attempt.
            if status == ConnectionStatus::Disconnected && errored {
                self.record_have_connected(false);
            }
        }
    }

    /// Domain-state push: decide playhead invalidation from the prior value,
    /// then replace wholesale.
    fn handle_vibin_state(&mut self, next: VibinState) {
        self.buffering.observe(&next);

        let mut invalidate = false;
        self.vibin_state.update(|prior| {
            invalidate = invalidates_playhead(prior, &next);
            next.clone()
        });

        if invalidate {
            self.playhead.set(None);
        }
    }

    fn handle_position(&mut self, position: Position) {
        self.playhead.set(Some(position.position));
    }

    fn handle_error(&mut self, error: AppError) {
        self.last_error.set(Some(error));
    }

    fn record_have_connected(&self, value: bool) {
        match self.store.set_have_connected(value) {
            Ok(Some(record)) => self.host_details.set(record),
            Ok(None) => {}
            // Keep the stale-but-valid cache; never invent a record.
            Err(e) => tracing::warn!("could not persist connection history: {e}"),
        }
    }

    // ── Reads and subscriptions ──────────────────────────────────────

    pub fn app_state(&self) -> AppState {
        self.app_state.get()
    }

    pub fn vibin_state(&self) -> VibinState {
        self.vibin_state.get()
    }

    pub fn playhead(&self) -> PlayheadPosition {
        self.playhead.get()
    }

    pub fn last_error(&self) -> Option<AppError> {
        self.last_error.get()
    }

    pub fn screen(&self) -> Screen {
        self.screen.get()
    }

    /// Cached view of the durable host record. Refreshed after every store
    /// write; stale (never invented) if a write failed.
    pub fn host_details(&self) -> VibinHostDetails {
        self.host_details.get()
    }

    pub fn subscribe_app_state(&self) -> watch::Receiver<AppState> {
        self.app_state.subscribe()
    }

    pub fn subscribe_vibin_state(&self) -> watch::Receiver<VibinState> {
        self.vibin_state.subscribe()
    }

    pub fn subscribe_playhead(&self) -> watch::Receiver<PlayheadPosition> {
        self.playhead.subscribe()
    }

    pub fn subscribe_last_error(&self) -> watch::Receiver<Option<AppError>> {
        self.last_error.subscribe()
    }

    pub fn subscribe_screen(&self) -> watch::Receiver<Screen> {
        self.screen.subscribe()
    }

    pub fn subscribe_host_details(&self) -> watch::Receiver<VibinHostDetails> {
        self.host_details.subscribe()
    }

    /// Debounced buffering indicator; see [`BufferingMonitor`].
    pub fn subscribe_buffering_audio(&self) -> watch::Receiver<bool> {
        self.buffering.subscribe()
    }

    // ── Derived selectors ────────────────────────────────────────────

    pub fn is_system_power_on(&self) -> bool {
        selectors::is_system_power_on(&self.vibin_state.get())
    }

    pub fn is_streamer_power_on(&self) -> bool {
        selectors::is_streamer_power_on(&self.vibin_state.get())
    }

    pub fn is_connected(&self) -> bool {
        selectors::is_connected(&self.app_state.get())
    }

    pub fn is_playing(&self) -> bool {
        selectors::is_playing(&self.vibin_state.get())
    }

    pub fn is_buffering_audio(&self) -> bool {
        self.buffering.is_buffering()
    }

    /// True once all four subscriptions are active and the ready handshake
    /// has been sent.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ── Renderer-driven mutations ────────────────────────────────────

    /// Navigate the UI. Screen state is renderer-owned; the engine only
    /// hosts the container.
    pub fn set_screen(&self, screen: Screen) {
        self.screen.set(screen);
    }

    /// Persist a new Vibin host and refresh the cached record. A silent
    /// no-op until the record has been initialized.
    pub fn set_host(&self, host: &str) -> Result<(), StorageError> {
        if let Some(record) = self.store.set_host(host)? {
            self.host_details.set(record);
        }
        Ok(())
    }
}

/// The two domain-state transitions that invalidate a held playhead reading:
/// the streamer powering on, and the active source class changing (including
/// to or from absent). Anything else, track metadata included, keeps it.
fn invalidates_playhead(prior: &VibinState, next: &VibinState) -> bool {
    let streamer_powered_on =
        prior.streamer_power == Some(Power::Off) && next.streamer_power == Some(Power::On);
    let source_changed = prior.source_class() != next.source_class();

    streamer_powered_on || source_changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        ActiveTrack, ConnectionDetails, ErrorCategory, PlayStatus, RepeatSetting, ShuffleSetting,
        Source, SourceClass, Transport,
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

    fn test_engine() -> (Engine, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = HostStore::open(dir.path().join("host.redb"), "vibin.local").unwrap();
        let engine = Engine::new(&Config::default(), store).unwrap();
        (engine, dir)
    }

    fn app_state(status: ConnectionStatus, message: Option<&str>) -> AppState {
        AppState {
            vibin_connection: ConnectionDetails {
                state: status,
                message: message.map(str::to_string),
            },
        }
    }

    fn source(class: SourceClass) -> Source {
        Source {
            id: "s1".to_string(),
            name: "Source".to_string(),
            default_name: "Source".to_string(),
            class,
            nameable: false,
            ui_selectable: true,
            description: String::new(),
            description_locale: String::new(),
            preferred_order: 1,
        }
    }

    fn track(title: &str) -> ActiveTrack {
        ActiveTrack {
            title: title.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            art_url: String::new(),
            duration: 240,
        }
    }

    fn playing_state() -> VibinState {
        VibinState {
            power: Some(Power::On),
            streamer_power: Some(Power::On),
            transport: Some(Transport {
                play_state: PlayStatus::Play,
                active_controls: vec![],
                repeat: RepeatSetting::Off,
                shuffle: ShuffleSetting::Off,
            }),
            source: Some(source(SourceClass::StreamMedia)),
            active_track: Some(track("One")),
            ..VibinState::default()
        }
    }

    // ── AppState policy ──────────────────────────────────────────────

    #[tokio::test]
    async fn every_app_state_push_invalidates_playhead() {
        let (mut engine, _dir) = test_engine();
        for status in [
            ConnectionStatus::Connected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Disconnecting,
        ] {
            engine.handle_position(Position { position: 42.0 });
            assert_eq!(engine.playhead(), Some(42.0));

            engine.handle_app_state(app_state(status, None));
            assert_eq!(engine.playhead(), None, "playhead survived {status:?}");
        }
    }

    #[tokio::test]
    async fn non_connected_push_resets_domain_state() {
        let (mut engine, _dir) = test_engine();
        for status in [
            ConnectionStatus::Connecting,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Disconnecting,
        ] {
            engine.handle_vibin_state(playing_state());
            engine.handle_app_state(app_state(status, None));
            assert_eq!(engine.vibin_state(), VibinState::default());
        }
    }

    #[tokio::test]
    async fn connected_push_keeps_domain_state() {
        let (mut engine, _dir) = test_engine();
        engine.handle_vibin_state(playing_state());
        engine.handle_app_state(app_state(ConnectionStatus::Connected, None));
        assert_eq!(engine.vibin_state(), playing_state());
    }

    #[tokio::test]
    async fn connection_history_follows_connection_outcomes() {
        let (mut engine, _dir) = test_engine();
        assert!(!engine.host_details().have_connected);

        engine.handle_app_state(app_state(ConnectionStatus::Connected, None));
        assert!(engine.host_details().have_connected);

        // Clean shutdown: history unchanged.
        engine.handle_app_state(app_state(ConnectionStatus::Disconnected, None));
        assert!(engine.host_details().have_connected);

        // Errored disconnect: recorded as a failed attempt.
        engine.handle_app_state(app_state(
            ConnectionStatus::Disconnected,
            Some("connection refused"),
        ));
        assert!(!engine.host_details().have_connected);
    }

    #[tokio::test]
    async fn errored_non_disconnected_push_does_not_touch_history() {
        let (mut engine, _dir) = test_engine();
        engine.handle_app_state(app_state(ConnectionStatus::Connected, None));

        engine.handle_app_state(app_state(ConnectionStatus::Connecting, Some("retrying")));
        assert!(engine.host_details().have_connected);
    }

    // ── VibinState policy ────────────────────────────────────────────

    #[tokio::test]
    async fn streamer_power_on_transition_invalidates_playhead() {
        let (mut engine, _dir) = test_engine();
        let mut off = playing_state();
        off.streamer_power = Some(Power::Off);
        engine.handle_vibin_state(off);

        engine.handle_position(Position { position: 10.5 });
        engine.handle_vibin_state(playing_state());
        assert_eq!(engine.playhead(), None);
    }

    #[tokio::test]
    async fn steady_streamer_power_keeps_playhead() {
        let (mut engine, _dir) = test_engine();
        engine.handle_vibin_state(playing_state());

        engine.handle_position(Position { position: 10.5 });
        engine.handle_vibin_state(playing_state());
        assert_eq!(engine.playhead(), Some(10.5));
    }

    #[tokio::test]
    async fn source_class_change_invalidates_playhead() {
        let (mut engine, _dir) = test_engine();
        let mut radio = playing_state();
        radio.source = Some(source(SourceClass::StreamRadio));
        engine.handle_vibin_state(radio);

        engine.handle_position(Position { position: 99.0 });
        engine.handle_vibin_state(playing_state()); // stream.media
        assert_eq!(engine.playhead(), None);
    }

    #[tokio::test]
    async fn source_appearing_or_disappearing_invalidates_playhead() {
        let (mut engine, _dir) = test_engine();
        let mut no_source = playing_state();
        no_source.source = None;
        engine.handle_vibin_state(no_source.clone());

        engine.handle_position(Position { position: 5.0 });
        engine.handle_vibin_state(playing_state());
        assert_eq!(engine.playhead(), None);

        engine.handle_position(Position { position: 6.0 });
        engine.handle_vibin_state(no_source);
        assert_eq!(engine.playhead(), None);
    }

    #[tokio::test]
    async fn track_metadata_change_keeps_playhead() {
        let (mut engine, _dir) = test_engine();
        engine.handle_vibin_state(playing_state());

        engine.handle_position(Position { position: 31.0 });
        let mut next = playing_state();
        next.active_track = Some(track("Two"));
        engine.handle_vibin_state(next.clone());

        assert_eq!(engine.playhead(), Some(31.0));
        assert_eq!(engine.vibin_state(), next);
    }

    // ── Overwrite-only channels ──────────────────────────────────────

    #[tokio::test]
    async fn position_and_error_are_pure_overwrites() {
        let (mut engine, _dir) = test_engine();

        engine.handle_position(Position { position: 1.0 });
        engine.handle_position(Position { position: 2.0 });
        assert_eq!(engine.playhead(), Some(2.0));

        engine.handle_error(AppError {
            category: ErrorCategory::WebSocket,
            message: "first".to_string(),
        });
        engine.handle_error(AppError {
            category: ErrorCategory::WebSocket,
            message: "second".to_string(),
        });
        assert_eq!(engine.last_error().unwrap().message, "second");
    }

    // ── Buffering debounce through the engine ────────────────────────

    #[tokio::test(start_paused = true)]
    async fn buffering_blip_between_tracks_is_suppressed() {
        let (mut engine, _dir) = test_engine();

        let mut buffering = playing_state();
        buffering.transport.as_mut().unwrap().play_state = PlayStatus::Buffering;
        engine.handle_vibin_state(buffering);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        engine.handle_vibin_state(playing_state());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!engine.is_buffering_audio());
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_buffering_is_reported() {
        let (mut engine, _dir) = test_engine();

        let mut buffering = playing_state();
        buffering.transport.as_mut().unwrap().play_state = PlayStatus::Buffering;
        engine.handle_vibin_state(buffering);

        tokio::time::sleep(Duration::from_millis(2001)).await;
        assert!(engine.is_buffering_audio());

        // Disconnecting resets domain state, which clears the indicator.
        engine.handle_app_state(app_state(ConnectionStatus::Disconnected, None));
        assert!(!engine.is_buffering_audio());
    }

    // ── Startup / ingestion loop ─────────────────────────────────────

    struct MockBackend {
        app_state_rx: Option<UnboundedReceiver<AppState>>,
        vibin_state_rx: Option<UnboundedReceiver<VibinState>>,
        position_rx: Option<UnboundedReceiver<Position>>,
        error_rx: Option<UnboundedReceiver<AppError>>,
        subscriptions_active: usize,
        handshake_sent: bool,
    }

    struct MockSenders {
        app_state: UnboundedSender<AppState>,
        vibin_state: UnboundedSender<VibinState>,
        position: UnboundedSender<Position>,
        error: UnboundedSender<AppError>,
    }

    impl MockBackend {
        fn new() -> (Self, MockSenders) {
            let (app_tx, app_rx) = mpsc::unbounded_channel();
            let (vibin_tx, vibin_rx) = mpsc::unbounded_channel();
            let (pos_tx, pos_rx) = mpsc::unbounded_channel();
            let (err_tx, err_rx) = mpsc::unbounded_channel();
            (
                Self {
                    app_state_rx: Some(app_rx),
                    vibin_state_rx: Some(vibin_rx),
                    position_rx: Some(pos_rx),
                    error_rx: Some(err_rx),
                    subscriptions_active: 0,
                    handshake_sent: false,
                },
                MockSenders {
                    app_state: app_tx,
                    vibin_state: vibin_tx,
                    position: pos_tx,
                    error: err_tx,
                },
            )
        }
    }

    #[async_trait]
    impl VibinBackend for MockBackend {
        async fn subscribe_app_state(&mut self) -> anyhow::Result<UnboundedReceiver<AppState>> {
            self.subscriptions_active += 1;
            self.app_state_rx.take().ok_or_else(|| anyhow!("refused"))
        }

        async fn subscribe_vibin_state(
            &mut self,
        ) -> anyhow::Result<UnboundedReceiver<VibinState>> {
            self.subscriptions_active += 1;
            self.vibin_state_rx.take().ok_or_else(|| anyhow!("refused"))
        }

        async fn subscribe_position(&mut self) -> anyhow::Result<UnboundedReceiver<Position>> {
            self.subscriptions_active += 1;
            self.position_rx.take().ok_or_else(|| anyhow!("refused"))
        }

        async fn subscribe_errors(&mut self) -> anyhow::Result<UnboundedReceiver<AppError>> {
            self.subscriptions_active += 1;
            self.error_rx.take().ok_or_else(|| anyhow!("refused"))
        }

        async fn on_ui_ready(&mut self) -> anyhow::Result<()> {
            // The ordering contract: never before every subscription is live.
            assert_eq!(self.subscriptions_active, 4);
            self.handshake_sent = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_processes_pushes_until_channels_close() {
        let (mut engine, _dir) = test_engine();
        let (mut backend, senders) = MockBackend::new();

        senders.app_state.send(app_state(ConnectionStatus::Connected, None)).unwrap();
        senders.vibin_state.send(playing_state()).unwrap();
        senders.position.send(Position { position: 12.0 }).unwrap();
        senders
            .error
            .send(AppError {
                category: ErrorCategory::WebSocket,
                message: "hiccup".to_string(),
            })
            .unwrap();
        drop(senders);

        engine.run(&mut backend).await.unwrap();

        assert!(backend.handshake_sent);
        assert!(engine.is_initialized());
        assert!(engine.is_connected());
        assert!(engine.is_playing());
        assert_eq!(engine.playhead(), Some(12.0));
        assert_eq!(engine.last_error().unwrap().message, "hiccup");
        assert!(engine.host_details().have_connected);
    }

    #[tokio::test]
    async fn failed_subscription_is_fatal() {
        let (mut engine, _dir) = test_engine();
        let (mut backend, _senders) = MockBackend::new();
        backend.vibin_state_rx = None; // second subscription will fail

        let err = engine.run(&mut backend).await.unwrap_err();
        match err {
            EngineError::Subscription { channel, .. } => {
                assert_eq!(channel, Channel::VibinState);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(!backend.handshake_sent);
        assert!(!engine.is_initialized());
    }
}
