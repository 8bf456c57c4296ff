//! WebSocket transport worker
//!
//! The socket lives on its own thread with a current-thread tokio runtime.
//! The UI thread talks to it only through two unbounded channels: it sends
//! [`TransportCommand`]s and drains [`TransportEvent`]s once per frame, so
//! every piece of session state is still mutated from one thread.

use crate::connection::{Transport, TransportCommand, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{events, Envelope, SessionGreeting};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the transport worker; dropping it closes the socket and joins the thread
pub struct WsTransport {
    commands: Option<mpsc::UnboundedSender<TransportCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn spawn(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), Box<dyn std::error::Error>> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let url = url.to_string();

        let worker = thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || {
                runtime.block_on(run_worker(url, cmd_rx, event_tx));
                debug!("Transport worker stopped");
            })?;

        Ok((
            Self {
                commands: Some(cmd_tx),
                worker: Some(worker),
            },
            event_rx,
        ))
    }

    fn command(&self, command: TransportCommand) {
        let delivered = self
            .commands
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);
        if !delivered {
            warn!("Transport worker is not running");
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self) {
        self.command(TransportCommand::Open);
    }

    fn send(&mut self, frame: String) {
        self.command(TransportCommand::Send(frame));
    }

    fn close(&mut self) {
        self.command(TransportCommand::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        // Closing the command channel makes the worker shut the socket and return
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Transport worker panicked");
            }
        }
    }
}

enum Dial {
    Ready(Box<WsStream>, String),
    Failed(String),
    Cancelled,
    Shutdown,
}

enum SessionEnd {
    Dropped(String),
    ClosedByClient,
    Shutdown,
}

async fn run_worker(
    url: String,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            TransportCommand::Open => {}
            TransportCommand::Send(_) => {
                debug!("Socket not open, dropping outbound frame");
                continue;
            }
            TransportCommand::Close => continue,
        }

        info!("Dialing {}", url);
        let (ws, id) = match dial(&url, &mut commands).await {
            Dial::Ready(ws, id) => (ws, id),
            Dial::Failed(reason) => {
                if events.send(TransportEvent::ConnectError { reason }).is_err() {
                    return;
                }
                continue;
            }
            Dial::Cancelled => continue,
            Dial::Shutdown => return,
        };

        if events.send(TransportEvent::Connected { id }).is_err() {
            return;
        }

        let event = match run_session(*ws, &mut commands, &events).await {
            SessionEnd::Dropped(reason) => TransportEvent::Disconnected {
                reason,
                by_client: false,
            },
            SessionEnd::ClosedByClient => TransportEvent::Disconnected {
                reason: "closed by client".to_string(),
                by_client: true,
            },
            SessionEnd::Shutdown => return,
        };
        if events.send(event).is_err() {
            return;
        }
    }
}

async fn dial(url: &str, commands: &mut mpsc::UnboundedReceiver<TransportCommand>) -> Dial {
    let attempt = timeout(HANDSHAKE_TIMEOUT, async {
        let (mut ws, _) = connect_async(url).await.map_err(|e| e.to_string())?;
        let id = read_greeting(&mut ws).await?;
        Ok::<_, String>((ws, id))
    });
    tokio::pin!(attempt);

    loop {
        tokio::select! {
            result = &mut attempt => {
                return match result {
                    Ok(Ok((ws, id))) => Dial::Ready(Box::new(ws), id),
                    Ok(Err(reason)) => Dial::Failed(reason),
                    Err(_) => Dial::Failed("handshake timed out".to_string()),
                };
            }
            command = commands.recv() => match command {
                None => return Dial::Shutdown,
                Some(TransportCommand::Close) => return Dial::Cancelled,
                Some(other) => debug!("Ignoring {:?} while dialing", other),
            },
        }
    }
}

/// Waits for the `session` greeting that carries our id
async fn read_greeting(ws: &mut WsStream) -> Result<String, String> {
    while let Some(message) = ws.next().await {
        match message.map_err(|e| e.to_string())? {
            Message::Text(text) => {
                let envelope = Envelope::decode(&text).map_err(|e| e.to_string())?;
                if envelope.event != events::SESSION {
                    return Err(format!("expected session greeting, got '{}'", envelope.event));
                }
                let greeting: SessionGreeting =
                    serde_json::from_value(envelope.data).map_err(|e| e.to_string())?;
                return Ok(greeting.id);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err("connection closed during handshake".to_string())
}

async fn run_session(
    mut ws: WsStream,
    commands: &mut mpsc::UnboundedReceiver<TransportCommand>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd {
    loop {
        tokio::select! {
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::Message(text)).is_err() {
                        return SessionEnd::Shutdown;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                None => return SessionEnd::Dropped("connection lost".to_string()),
            },

            command = commands.recv() => match command {
                Some(TransportCommand::Send(frame)) => {
                    if let Err(e) = ws.send(Message::Text(frame)).await {
                        return SessionEnd::Dropped(e.to_string());
                    }
                }
                Some(TransportCommand::Close) => {
                    let _ = ws.close(None).await;
                    return SessionEnd::ClosedByClient;
                }
                Some(TransportCommand::Open) => debug!("Socket already open"),
                None => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}
