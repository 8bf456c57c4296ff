//! The session context wiring connection, reconciler, input, countdown and renderer
//!
//! `ClientApp` is the single owner of all session state. Transport events,
//! key presses and timer firings all enter through `&mut self`, one at a
//! time, so each snapshot is fully processed before the next one is looked at.

use crate::config::ClientConfig;
use crate::connection::{
    CommandSink, ConnectionManager, ConnectionState, SessionInfo, Transport, TransportEvent,
};
use crate::dispatch::Dispatcher;
use crate::effects::{CountdownDisplay, EffectCountdown};
use crate::input::{InputController, Key};
use crate::reconciler::Reconciler;
use crate::rendering::{Frame, Overlay, Renderer};
use crate::timer::{Scheduler, Task};
use log::{debug, info, warn};
use serde_json::Value;
use shared::{events, ClientCommand, Envelope, LobbyUpdate, Phase, Snapshot};

pub struct ClientApp<T: Transport> {
    connection: ConnectionManager<T>,
    reconciler: Reconciler,
    countdown: EffectCountdown,
    input: InputController,
    renderer: Renderer,
    scheduler: Scheduler,
    dispatcher: Dispatcher<ClientApp<T>>,
    idle_size: (u32, u32),
}

impl<T: Transport> ClientApp<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        let mut dispatcher: Dispatcher<Self> = Dispatcher::new();
        dispatcher
            .on(events::GAME_STATE, Self::on_game_state)
            .on(events::LOBBY_UPDATE, Self::on_lobby_update)
            .on(events::GAME_STARTED, Self::on_game_started);

        Self {
            connection: ConnectionManager::new(transport, config.retry),
            reconciler: Reconciler::new(config.death_delay_ms),
            countdown: EffectCountdown::new(config.countdown_tick_ms, config.effect_total_secs),
            input: InputController::new(config.move_interval_ms),
            renderer: Renderer::new(config.cell_size),
            scheduler: Scheduler::new(),
            dispatcher,
            idle_size: (config.window_width, config.window_height),
        }
    }

    pub fn start(&mut self) {
        self.connection.connect(&mut self.scheduler);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn session(&self) -> &SessionInfo {
        self.connection.session()
    }

    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.reconciler.snapshot()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.reconciler.phase()
    }

    pub fn showing_game(&self) -> bool {
        self.reconciler.showing_game()
    }

    pub fn countdown(&self) -> Option<CountdownDisplay> {
        self.countdown.display()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn on_transport_event(&mut self, event: TransportEvent, now: u64) {
        if let Some(envelope) = self
            .connection
            .on_transport_event(event, now, &mut self.scheduler)
        {
            self.dispatch(envelope, now);
        }
    }

    pub fn on_key(&mut self, key: Key, now: u64) {
        match key {
            Key::Enter => {
                if !self.reconciler.showing_game() && self.connection.is_connected() {
                    info!("Requesting game start");
                    self.connection.send(ClientCommand::StartGame);
                }
            }
            Key::R => match self.connection.state() {
                ConnectionState::Disconnected | ConnectionState::ExhaustedRetries => {
                    self.connection.connect(&mut self.scheduler);
                }
                _ => {}
            },
            _ => {
                self.input.on_key_event(
                    key,
                    now,
                    self.reconciler.showing_game(),
                    &mut self.connection,
                );
            }
        }
    }

    /// Runs every timer due at `now`
    pub fn advance(&mut self, now: u64) {
        while let Some((handle, task)) = self.scheduler.pop_due(now) {
            debug!("Timer fired: {:?}", task);
            match task {
                Task::DeathRevert => self.reconciler.on_revert_due(handle),
                Task::CountdownTick => self.countdown.on_tick(handle, now, &mut self.scheduler),
                Task::Reconnect => self.connection.on_retry_due(handle),
            }
        }
    }

    pub fn frame(&self) -> Frame {
        let mut frame = match self.reconciler.snapshot() {
            Some(snapshot) => self.renderer.render(snapshot, self.connection.local_id()),
            None => Frame::blank(self.idle_size.0, self.idle_size.1),
        };
        let session = self.connection.session();
        self.renderer.render_overlay(
            &mut frame,
            &Overlay {
                connection: self.connection.state(),
                lobby: session.lobby.as_ref(),
                showing_game: self.reconciler.showing_game(),
                phase: self.reconciler.phase(),
                countdown: self.countdown.display(),
            },
        );
        frame
    }

    /// Cancels every timer and closes the transport
    pub fn shutdown(&mut self) {
        self.reconciler.teardown(&mut self.scheduler);
        self.countdown.teardown(&mut self.scheduler);
        self.connection.close(&mut self.scheduler);
        self.scheduler.clear();
    }

    fn dispatch(&mut self, envelope: Envelope, now: u64) {
        match self.dispatcher.handler(&envelope.event) {
            Some(handler) => {
                if let Err(e) = handler(self, envelope.data, now) {
                    warn!("Dropping malformed '{}': {}", envelope.event, e);
                }
            }
            None => debug!("Ignoring unknown event '{}'", envelope.event),
        }
    }

    fn on_game_state(&mut self, data: Value, now: u64) -> Result<(), serde_json::Error> {
        let snapshot: Snapshot = serde_json::from_value(data)?;
        if let Err(reason) = snapshot.validate() {
            warn!("Ignoring unusable snapshot: {}", reason);
            return Ok(());
        }

        self.reconciler.on_snapshot(
            snapshot,
            self.connection.local_id(),
            now,
            &mut self.scheduler,
        );
        self.countdown
            .set_effect(self.reconciler.active_effect(), now, &mut self.scheduler);
        Ok(())
    }

    fn on_lobby_update(&mut self, data: Value, _now: u64) -> Result<(), serde_json::Error> {
        let update: LobbyUpdate = serde_json::from_value(data)?;
        debug!("Lobby: {} player(s)", update.player_count);
        self.connection.set_lobby(update);
        Ok(())
    }

    fn on_game_started(&mut self, _data: Value, _now: u64) -> Result<(), serde_json::Error> {
        info!("Game started");
        Ok(())
    }
}

impl<T: Transport> Drop for ClientApp<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::RecordingTransport;
    use crate::connection::RetryPolicy;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig {
            retry: RetryPolicy {
                initial_delay_ms: 100,
                max_delay_ms: 400,
                max_attempts: 2,
                jitter: 0.0,
            },
            ..ClientConfig::default()
        }
    }

    fn connected_app() -> ClientApp<RecordingTransport> {
        let mut app = ClientApp::new(RecordingTransport::default(), &config());
        app.start();
        app.on_transport_event(TransportEvent::Connected { id: "me".into() }, 0);
        app
    }

    fn message(event: &str, data: Value) -> TransportEvent {
        TransportEvent::Message(json!({ "event": event, "data": data }).to_string())
    }

    fn game_state(phase: &str, alive: bool, effects: Value) -> Value {
        json!({
            "phase": phase,
            "players": [
                {"id": "me", "segments": [{"x": 1, "y": 1}], "alive": alive, "score": 4, "effects": effects},
                {"id": "bot", "segments": [{"x": 5, "y": 5}], "alive": true, "score": 1}
            ],
            "items": [{"x": 3, "y": 3, "kind": "minor"}],
            "width": 10,
            "height": 8
        })
    }

    #[test]
    fn test_snapshot_flows_to_view_state() {
        let mut app = connected_app();
        app.on_transport_event(
            message("gameState", game_state("playing", true, json!([{"kind": "slow", "expiresAt": 3000}]))),
            0,
        );
        assert_eq!(app.phase(), Some(Phase::Playing));
        assert!(app.showing_game());
        assert_eq!(app.countdown().map(|c| c.remaining_secs), Some(3));

        let frame = app.frame();
        assert_eq!((frame.width, frame.height), (200, 160));
        assert!(frame.texts().any(|t| t == "> You me: 4 (alive)"));
        assert!(frame.texts().any(|t| t == "Slowed down 3s"));
    }

    #[test]
    fn test_malformed_snapshot_keeps_last_good_one() {
        let mut app = connected_app();
        app.on_transport_event(message("gameState", game_state("playing", true, json!([]))), 0);
        let before = app.snapshot().cloned();

        app.on_transport_event(message("gameState", json!({"phase": "playing"})), 10);
        app.on_transport_event(
            message("gameState", json!({"phase": "playing", "players": [], "items": [], "width": 0, "height": 4})),
            20,
        );
        assert_eq!(app.snapshot().cloned(), before);
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let mut app = connected_app();
        app.on_transport_event(message("chat", json!({"text": "hi"})), 0);
        app.on_transport_event(message("gameStarted", json!({})), 0);
        assert_eq!(app.connection_state(), ConnectionState::Connected);
        assert!(app.snapshot().is_none());
    }

    #[test]
    fn test_lobby_update_reaches_session() {
        let mut app = connected_app();
        app.on_transport_event(
            message("lobbyUpdate", json!({"status": "waiting", "playerCount": 3, "players": ["a", "b", "c"]})),
            0,
        );
        let lobby = app.session().lobby.clone().unwrap();
        assert_eq!(lobby.count, 3);
        assert!(app.frame().texts().any(|t| t == "3 player(s) waiting"));
    }

    #[test]
    fn test_keys_send_moves_only_while_playing() {
        let mut app = connected_app();
        app.on_key(Key::Up, 0);
        assert!(app.transport().sent.is_empty());

        app.on_transport_event(message("gameState", game_state("playing", true, json!([]))), 0);
        app.on_key(Key::Up, 100);
        app.on_key(Key::Left, 120);
        app.on_key(Key::A, 160);
        assert_eq!(app.transport().sent.len(), 2);
        assert!(app.transport().sent[0].contains(r#""dy":-1"#));
        assert!(app.transport().sent[1].contains(r#""dx":-1"#));
    }

    #[test]
    fn test_enter_requests_start_from_lobby() {
        let mut app = connected_app();
        app.on_key(Key::Enter, 0);
        assert_eq!(app.transport().sent.len(), 1);
        assert!(app.transport().sent[0].contains("startGame"));

        app.on_transport_event(message("gameState", game_state("playing", true, json!([]))), 0);
        app.on_key(Key::Enter, 10);
        assert_eq!(app.transport().sent.len(), 1);
    }

    #[test]
    fn test_death_reverts_through_advance() {
        let mut app = connected_app();
        app.on_transport_event(message("gameState", game_state("playing", true, json!([]))), 0);
        app.on_transport_event(message("gameState", game_state("playing", false, json!([]))), 2000);
        app.advance(2999);
        assert!(app.showing_game());
        app.advance(3000);
        assert!(!app.showing_game());
    }

    #[test]
    fn test_exhausted_retries_then_manual_reconnect() {
        let mut app = ClientApp::new(RecordingTransport::default(), &config());
        app.start();
        let refused = || TransportEvent::ConnectError {
            reason: "refused".into(),
        };

        app.on_transport_event(refused(), 0);
        app.advance(100);
        assert_eq!(app.connection_state(), ConnectionState::Connecting { attempt: 2 });
        app.on_transport_event(refused(), 100);
        assert_eq!(app.connection_state(), ConnectionState::ExhaustedRetries);
        assert!(app.frame().texts().any(|t| t.contains("press R to retry")));

        app.on_key(Key::R, 500);
        assert_eq!(app.connection_state(), ConnectionState::Connecting { attempt: 1 });
        assert_eq!(app.transport().opened, 3);
    }

    #[test]
    fn test_disconnect_freezes_last_snapshot() {
        let mut app = connected_app();
        app.on_transport_event(message("gameState", game_state("playing", true, json!([]))), 0);
        app.on_transport_event(
            TransportEvent::Disconnected {
                reason: "reset".into(),
                by_client: false,
            },
            10,
        );
        assert!(!app.session().connected);
        assert_eq!(app.session().local_id, None);
        assert!(app.snapshot().is_some());
        assert_eq!(app.phase(), Some(Phase::Playing));
    }

    #[test]
    fn test_shutdown_cancels_timers_and_closes() {
        let mut app = connected_app();
        app.on_transport_event(
            message("gameState", game_state("playing", true, json!([{"kind": "boost", "expiresAt": 5000}]))),
            0,
        );
        app.on_transport_event(message("gameState", game_state("playing", false, json!([]))), 10);
        assert!(app.next_deadline().is_some());

        app.shutdown();
        assert!(app.next_deadline().is_none());
        assert_eq!(app.connection_state(), ConnectionState::Disconnected);
        assert!(app.transport().closed >= 1);
    }
}
