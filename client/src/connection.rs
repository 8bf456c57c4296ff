//! Session lifecycle: dialing, retrying and best-effort sends
//!
//! The manager never touches a socket itself. It drives a [`Transport`] with
//! open/send/close requests and reacts to the [`TransportEvent`]s the
//! transport reports back, which keeps the whole state machine testable
//! against a recording transport and a virtual clock.
//!
//! ```text
//! Disconnected --connect()--> Connecting --Connected{id}--> Connected
//!      ^                        |    ^                          |
//!      |                        |    '--- retry timer ---'      |
//!      '------ close() ---------+                               |
//!                               '--cap hit--> ExhaustedRetries  |
//!      ^--------------------- Disconnected{..} -----------------'
//! ```

use crate::timer::{Scheduler, Task, TimerHandle};
use log::{debug, info, warn};
use rand::Rng;
use serde_json::Value;
use shared::{
    ClientCommand, Envelope, LobbyUpdate, RECONNECT_ATTEMPTS, RECONNECT_DELAY_MAX_MS,
    RECONNECT_DELAY_MS, RECONNECT_JITTER,
};

/// Requests from the session to the socket worker
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Open,
    Send(String),
    Close,
}

/// What the socket worker observed
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket is open and the server greeted us with our id
    Connected { id: String },
    ConnectError { reason: String },
    Disconnected { reason: String, by_client: bool },
    Message(String),
}

pub trait Transport {
    fn open(&mut self);
    fn send(&mut self, frame: String);
    /// Must be safe to call when nothing is open
    fn close(&mut self);
}

/// Outbound path used by the input side
pub trait CommandSink {
    fn send(&mut self, command: ClientCommand);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Dial attempts per connect cycle, the first one included
    pub max_attempts: u32,
    /// Randomisation factor in 0.0..=1.0 applied to each delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: RECONNECT_DELAY_MS,
            max_delay_ms: RECONNECT_DELAY_MAX_MS,
            max_attempts: RECONNECT_ATTEMPTS,
            jitter: RECONNECT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure, before jitter
    pub fn base_delay(&self, attempt: u32) -> u64 {
        let shift = attempt.saturating_sub(1).min(32);
        self.initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms)
    }

    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> u64 {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = base as f64 * self.jitter.min(1.0);
        let offset = rng.gen_range(-spread..=spread);
        ((base as f64 + offset).max(0.0) as u64).min(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// `attempt` dials have been made in the current cycle
    Connecting { attempt: u32 },
    Connected,
    /// Terminal until the user asks for a new cycle
    ExhaustedRetries,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting { .. } => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::ExhaustedRetries => "Disconnected - press R to retry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyInfo {
    pub status: String,
    pub count: u32,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub local_id: Option<String>,
    pub connected: bool,
    pub lobby: Option<LobbyInfo>,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    policy: RetryPolicy,
    state: ConnectionState,
    session: SessionInfo,
    retry_timer: Option<TimerHandle>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            state: ConnectionState::Disconnected,
            session: SessionInfo::default(),
            retry_timer: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn local_id(&self) -> Option<&str> {
        self.session.local_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Starts a fresh connect cycle from `Disconnected` or `ExhaustedRetries`
    pub fn connect(&mut self, scheduler: &mut Scheduler) {
        match self.state {
            ConnectionState::Connecting { .. } | ConnectionState::Connected => {
                debug!("connect() ignored while {:?}", self.state);
            }
            ConnectionState::Disconnected | ConnectionState::ExhaustedRetries => {
                self.cancel_retry(scheduler);
                self.state = ConnectionState::Connecting { attempt: 1 };
                info!("Connecting to server (attempt 1/{})", self.policy.max_attempts);
                self.transport.open();
            }
        }
    }

    /// Applies a transport event; returns the decoded envelope for inbound messages
    pub fn on_transport_event(
        &mut self,
        event: TransportEvent,
        now: u64,
        scheduler: &mut Scheduler,
    ) -> Option<Envelope> {
        match event {
            TransportEvent::Connected { id } => {
                if !matches!(self.state, ConnectionState::Connecting { .. }) {
                    warn!("Ignoring stale connect for id {} while {:?}", id, self.state);
                    return None;
                }
                self.cancel_retry(scheduler);
                info!("Connected! Client ID: {}", id);
                self.state = ConnectionState::Connected;
                self.session.local_id = Some(id);
                self.session.connected = true;
                None
            }

            TransportEvent::ConnectError { reason } => {
                match self.state {
                    ConnectionState::Connecting { attempt } => {
                        self.on_attempt_failed(attempt, &reason, now, scheduler);
                    }
                    _ => debug!("Ignoring connect error while {:?}: {}", self.state, reason),
                }
                None
            }

            TransportEvent::Disconnected { reason, by_client } => {
                match self.state {
                    ConnectionState::Connected => {
                        warn!("Disconnected: {}", reason);
                        self.enter_disconnected();
                        if !by_client {
                            self.state = ConnectionState::Connecting { attempt: 0 };
                            self.schedule_retry(0, now, scheduler);
                        }
                    }
                    ConnectionState::Connecting { attempt } if attempt > 0 => {
                        self.on_attempt_failed(attempt, &reason, now, scheduler);
                    }
                    _ => debug!("Ignoring disconnect while {:?}: {}", self.state, reason),
                }
                None
            }

            TransportEvent::Message(text) => {
                if !self.is_connected() {
                    debug!("Dropping message received while {:?}", self.state);
                    return None;
                }
                match Envelope::decode(&text) {
                    Ok(envelope) => Some(envelope),
                    Err(e) => {
                        warn!("Dropping malformed message: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// Fired by the session when a reconnect timer comes due
    pub fn on_retry_due(&mut self, handle: TimerHandle) {
        if self.retry_timer != Some(handle) {
            debug!("Ignoring stale reconnect timer");
            return;
        }
        self.retry_timer = None;

        if let ConnectionState::Connecting { attempt } = self.state {
            let attempt = attempt + 1;
            self.state = ConnectionState::Connecting { attempt };
            info!(
                "Reconnecting (attempt {}/{})",
                attempt, self.policy.max_attempts
            );
            self.transport.open();
        }
    }

    /// Fire-and-forget emission; silently dropped unless connected
    pub fn emit(&mut self, event: &str, data: Value) {
        if !self.is_connected() {
            debug!("Not connected, dropping '{}'", event);
            return;
        }
        match Envelope::new(event, data).encode() {
            Ok(frame) => self.transport.send(frame),
            Err(e) => warn!("Failed to encode '{}': {}", event, e),
        }
    }

    pub fn set_lobby(&mut self, update: LobbyUpdate) {
        self.session.lobby = Some(LobbyInfo {
            status: update.status,
            count: update.player_count,
            names: update.players,
        });
    }

    /// Client-initiated teardown; no retry follows
    pub fn close(&mut self, scheduler: &mut Scheduler) {
        self.cancel_retry(scheduler);
        if self.state != ConnectionState::Disconnected {
            info!("Closing connection");
        }
        self.transport.close();
        self.enter_disconnected();
    }

    fn on_attempt_failed(
        &mut self,
        attempt: u32,
        reason: &str,
        now: u64,
        scheduler: &mut Scheduler,
    ) {
        if attempt >= self.policy.max_attempts {
            warn!(
                "Connection failed after {} attempts ({}), giving up",
                attempt, reason
            );
            self.cancel_retry(scheduler);
            self.state = ConnectionState::ExhaustedRetries;
            self.session.local_id = None;
            self.session.connected = false;
            return;
        }
        info!("Connection attempt {} failed: {}", attempt, reason);
        self.schedule_retry(attempt, now, scheduler);
    }

    fn schedule_retry(&mut self, failed_attempts: u32, now: u64, scheduler: &mut Scheduler) {
        self.cancel_retry(scheduler);
        let delay = self
            .policy
            .delay_for(failed_attempts.max(1), &mut rand::thread_rng());
        info!("Retrying in {}ms", delay);
        self.retry_timer = Some(scheduler.schedule_at(now + delay, Task::Reconnect));
    }

    fn cancel_retry(&mut self, scheduler: &mut Scheduler) {
        if let Some(handle) = self.retry_timer.take() {
            scheduler.cancel(handle);
        }
    }

    fn enter_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.session.local_id = None;
        self.session.connected = false;
    }
}

impl<T: Transport> CommandSink for ConnectionManager<T> {
    fn send(&mut self, command: ClientCommand) {
        let envelope = command.to_envelope();
        self.emit(&envelope.event, envelope.data);
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use shared::Direction;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub opened: u32,
        pub closed: u32,
        pub sent: Vec<String>,
    }

    impl Transport for RecordingTransport {
        fn open(&mut self) {
            self.opened += 1;
        }

        fn send(&mut self, frame: String) {
            self.sent.push(frame);
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            max_attempts: 3,
            jitter: 0.0,
        }
    }

    fn manager() -> (ConnectionManager<RecordingTransport>, Scheduler) {
        (
            ConnectionManager::new(RecordingTransport::default(), policy()),
            Scheduler::new(),
        )
    }

    fn connected() -> (ConnectionManager<RecordingTransport>, Scheduler) {
        let (mut conn, mut scheduler) = manager();
        conn.connect(&mut scheduler);
        conn.on_transport_event(
            TransportEvent::Connected { id: "me".into() },
            0,
            &mut scheduler,
        );
        (conn, scheduler)
    }

    fn fail(conn: &mut ConnectionManager<RecordingTransport>, now: u64, scheduler: &mut Scheduler) {
        conn.on_transport_event(
            TransportEvent::ConnectError {
                reason: "refused".into(),
            },
            now,
            scheduler,
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy();
        assert_eq!(policy.base_delay(1), 1000);
        assert_eq!(policy.base_delay(2), 2000);
        assert_eq!(policy.base_delay(3), 4000);
        assert_eq!(policy.base_delay(4), 5000);
        assert_eq!(policy.base_delay(60), 5000);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: 0.5,
            ..policy()
        };
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let delay = policy.delay_for(1, &mut rng);
            assert!((500..=1500).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_connect_assigns_local_id() {
        let (conn, _) = connected();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.local_id(), Some("me"));
        assert!(conn.session().connected);
        assert_eq!(conn.transport().opened, 1);
    }

    #[test]
    fn test_connected_event_outside_connecting_is_ignored() {
        let (mut conn, mut scheduler) = manager();
        conn.on_transport_event(
            TransportEvent::Connected { id: "ghost".into() },
            0,
            &mut scheduler,
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.local_id(), None);
    }

    #[test]
    fn test_failed_attempts_retry_then_exhaust() {
        let (mut conn, mut scheduler) = manager();
        conn.connect(&mut scheduler);

        fail(&mut conn, 0, &mut scheduler);
        assert_eq!(conn.state(), ConnectionState::Connecting { attempt: 1 });
        assert!(scheduler.pop_due(999).is_none());
        let (handle, task) = scheduler.pop_due(1000).unwrap();
        assert_eq!(task, Task::Reconnect);
        conn.on_retry_due(handle);
        assert_eq!(conn.state(), ConnectionState::Connecting { attempt: 2 });
        assert_eq!(conn.transport().opened, 2);

        fail(&mut conn, 1000, &mut scheduler);
        assert_eq!(scheduler.next_deadline(), Some(3000));
        let (handle, _) = scheduler.pop_due(3000).unwrap();
        conn.on_retry_due(handle);
        assert_eq!(conn.transport().opened, 3);

        fail(&mut conn, 3000, &mut scheduler);
        assert_eq!(conn.state(), ConnectionState::ExhaustedRetries);
        assert!(scheduler.is_empty());
        assert_eq!(conn.transport().opened, 3);
    }

    #[test]
    fn test_connect_restarts_after_exhaustion() {
        let (mut conn, mut scheduler) = manager();
        conn.connect(&mut scheduler);
        for attempt in 1..=3u64 {
            fail(&mut conn, attempt * 10_000, &mut scheduler);
            if let Some((handle, _)) = scheduler.pop_due(u64::MAX) {
                conn.on_retry_due(handle);
            }
        }
        assert_eq!(conn.state(), ConnectionState::ExhaustedRetries);

        conn.connect(&mut scheduler);
        assert_eq!(conn.state(), ConnectionState::Connecting { attempt: 1 });
        assert_eq!(conn.transport().opened, 4);
    }

    #[test]
    fn test_drop_clears_id_and_reconnects() {
        let (mut conn, mut scheduler) = connected();
        conn.on_transport_event(
            TransportEvent::Disconnected {
                reason: "reset".into(),
                by_client: false,
            },
            500,
            &mut scheduler,
        );
        assert_eq!(conn.local_id(), None);
        assert!(!conn.session().connected);
        assert_eq!(conn.state(), ConnectionState::Connecting { attempt: 0 });

        let (handle, _) = scheduler.pop_due(1500).unwrap();
        conn.on_retry_due(handle);
        assert_eq!(conn.state(), ConnectionState::Connecting { attempt: 1 });
        assert_eq!(conn.transport().opened, 2);

        conn.on_transport_event(
            TransportEvent::Connected { id: "me-again".into() },
            1600,
            &mut scheduler,
        );
        assert_eq!(conn.local_id(), Some("me-again"));
    }

    #[test]
    fn test_close_does_not_retry() {
        let (mut conn, mut scheduler) = connected();
        conn.close(&mut scheduler);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.transport().closed, 1);

        conn.on_transport_event(
            TransportEvent::Disconnected {
                reason: "closed".into(),
                by_client: true,
            },
            10,
            &mut scheduler,
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_close_cancels_pending_retry() {
        let (mut conn, mut scheduler) = manager();
        conn.connect(&mut scheduler);
        fail(&mut conn, 0, &mut scheduler);
        assert_eq!(scheduler.len(), 1);

        conn.close(&mut scheduler);
        assert!(scheduler.is_empty());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let (mut conn, mut scheduler) = manager();
        conn.send(ClientCommand::Move {
            direction: Direction::UP,
        });
        assert!(conn.transport().sent.is_empty());

        conn.connect(&mut scheduler);
        conn.on_transport_event(TransportEvent::Connected { id: "me".into() }, 0, &mut scheduler);
        assert!(conn.transport().sent.is_empty(), "nothing is replayed");

        conn.send(ClientCommand::StartGame);
        assert_eq!(conn.transport().sent.len(), 1);
        assert!(conn.transport().sent[0].contains("startGame"));
    }

    #[test]
    fn test_messages_are_decoded_only_when_connected() {
        let (mut conn, mut scheduler) = manager();
        let frame = r#"{"event":"gameStarted","data":{}}"#.to_string();
        assert!(conn
            .on_transport_event(TransportEvent::Message(frame.clone()), 0, &mut scheduler)
            .is_none());

        let (mut conn, mut scheduler) = connected();
        let envelope = conn
            .on_transport_event(TransportEvent::Message(frame), 0, &mut scheduler)
            .unwrap();
        assert_eq!(envelope.event, "gameStarted");

        assert!(conn
            .on_transport_event(TransportEvent::Message("not json".into()), 0, &mut scheduler)
            .is_none());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_lobby_update_is_recorded() {
        let (mut conn, _) = connected();
        conn.set_lobby(LobbyUpdate {
            status: "waiting".into(),
            player_count: 2,
            players: vec!["a".into(), "b".into()],
        });
        let lobby = conn.session().lobby.clone().unwrap();
        assert_eq!(lobby.count, 2);
        assert_eq!(lobby.names, vec!["a".to_string(), "b".to_string()]);
    }
}
