//! # Snake Client Library
//!
//! This library is the presentation side of the networked snake game. The
//! server owns every rule of the game; the client keeps a live session to it,
//! shows the latest authoritative snapshot, forwards throttled direction
//! input and surfaces the timed effect the local snake is under.
//!
//! ## Architecture Overview
//!
//! Data flows one way: transport → connection → reconciler → {renderer,
//! effect countdown}. Input flows the other way: key event → input
//! controller → connection → transport. Components exchange only the plain
//! data types from the `shared` crate.
//!
//! ### Snapshot Replacement
//! Every `gameState` message carries the complete board. The client never
//! patches or merges; it swaps the held snapshot and re-derives the phase,
//! the "showing game" flag and the active effect from it.
//!
//! ### Explicit Time
//! Nothing below the binary reads the clock. Timers (death revert,
//! countdown tick, reconnect backoff) are scheduled on a [`timer::Scheduler`]
//! and fired by [`app::ClientApp::advance`] with an explicit `now`, which
//! lets tests drive a virtual clock.
//!
//! ### Single Writer
//! [`app::ClientApp`] owns all session state. The socket runs on a worker
//! thread but only exchanges messages with the UI thread; all mutation
//! happens on the UI thread, one event at a time.
//!
//! ## Module Organization
//!
//! ### Connection (`connection`)
//! - Connect / retry / exhausted state machine
//! - Best-effort sends that are dropped while disconnected
//! - Session info: local id, lobby occupancy
//!
//! ### Reconciler (`reconciler`)
//! - Holds the latest snapshot
//! - Delayed return to the lobby view after the local snake dies
//! - Selects the local player's active effect
//!
//! ### Input (`input`)
//! - Arrow keys and WASD mapped to directions
//! - Minimum interval between accepted move commands
//!
//! ### Effects (`effects`)
//! - Ticking whole-second countdown and progress percentage
//!
//! ### Rendering (`rendering`, `raster`)
//! - Pure snapshot → display list, presented through macroquad
//! - Software rasteriser for pixel comparisons without a window
//!
//! ### Network (`network`)
//! - WebSocket worker thread speaking the JSON envelope protocol
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::app::ClientApp;
//! use client::config::ClientConfig;
//! use client::network::WsTransport;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let (transport, mut events) = WsTransport::spawn(&config.server_url)?;
//! let mut app = ClientApp::new(transport, &config);
//! app.start();
//!
//! loop {
//!     let now = shared::get_timestamp();
//!     while let Ok(event) = events.try_recv() {
//!         app.on_transport_event(event, now);
//!     }
//!     app.advance(now);
//!     let frame = app.frame();
//!     // hand `frame` to a window, or rasterise it
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod effects;
pub mod input;
pub mod network;
pub mod raster;
pub mod reconciler;
pub mod rendering;
pub mod timer;
