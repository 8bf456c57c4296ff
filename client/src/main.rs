use clap::Parser;
use client::app::ClientApp;
use client::config::ClientConfig;
use client::connection::RetryPolicy;
use client::input::Key;
use client::network::WsTransport;
use log::{error, info};
use macroquad::prelude::*;
use shared::get_timestamp;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket address of the game server
    #[arg(short = 's', long, default_value = shared::DEFAULT_SERVER_URL)]
    server: String,

    /// Delay before the first reconnect attempt
    #[arg(long, default_value_t = shared::RECONNECT_DELAY_MS)]
    reconnect_delay_ms: u64,

    /// Upper bound of the reconnect delay
    #[arg(long, default_value_t = shared::RECONNECT_DELAY_MAX_MS)]
    reconnect_delay_max_ms: u64,

    /// Dial attempts before giving up
    #[arg(long, default_value_t = shared::RECONNECT_ATTEMPTS)]
    reconnect_attempts: u32,

    /// Randomisation factor applied to each reconnect delay
    #[arg(long, default_value_t = shared::RECONNECT_JITTER)]
    reconnect_jitter: f64,

    /// Minimum gap between two move commands
    #[arg(long, default_value_t = shared::MOVE_INTERVAL_MS)]
    move_interval_ms: u64,

    /// How long the death frame stays up before returning to the lobby
    #[arg(long, default_value_t = shared::DEATH_REVERT_DELAY_MS)]
    death_delay_ms: u64,

    /// Effect countdown refresh period
    #[arg(long, default_value_t = shared::COUNTDOWN_TICK_MS)]
    countdown_tick_ms: u64,

    /// Duration the effect bar treats as full
    #[arg(long, default_value_t = shared::EFFECT_NOMINAL_SECS)]
    effect_total_secs: u64,

    /// Pixels per grid cell
    #[arg(short = 'c', long, default_value_t = shared::CELL_SIZE)]
    cell_size: u32,

    /// Window width before the first snapshot
    #[arg(short = 'w', long, default_value = "800")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: u32,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server_url: self.server,
            retry: RetryPolicy {
                initial_delay_ms: self.reconnect_delay_ms,
                max_delay_ms: self.reconnect_delay_max_ms.max(self.reconnect_delay_ms),
                max_attempts: self.reconnect_attempts.max(1),
                jitter: self.reconnect_jitter.clamp(0.0, 1.0),
            },
            move_interval_ms: self.move_interval_ms,
            death_delay_ms: self.death_delay_ms,
            countdown_tick_ms: self.countdown_tick_ms,
            effect_total_secs: self.effect_total_secs,
            cell_size: self.cell_size,
            window_width: self.width,
            window_height: self.height,
        }
    }
}

fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::W => Key::W,
        KeyCode::A => Key::A,
        KeyCode::S => Key::S,
        KeyCode::D => Key::D,
        KeyCode::Enter | KeyCode::KpEnter => Key::Enter,
        KeyCode::R => Key::R,
        _ => Key::Other,
    }
}

async fn run(config: ClientConfig) {
    let (transport, mut events) = match WsTransport::spawn(&config.server_url) {
        Ok(spawned) => spawned,
        Err(e) => {
            error!("Failed to start transport: {}", e);
            return;
        }
    };

    let mut app = ClientApp::new(transport, &config);
    app.start();

    let mut window_size = (config.window_width, config.window_height);

    loop {
        let now = get_timestamp();

        while let Ok(event) = events.try_recv() {
            app.on_transport_event(event, now);
        }

        if is_key_pressed(KeyCode::Escape) {
            info!("Exiting");
            break;
        }
        for code in get_keys_pressed() {
            app.on_key(map_key(code), now);
        }

        app.advance(now);

        let frame = app.frame();
        if frame.width > 0 && (frame.width, frame.height) != window_size {
            window_size = (frame.width, frame.height);
            request_new_screen_size(frame.width as f32, frame.height as f32);
        }
        frame.present();

        next_frame().await;
    }

    app.shutdown();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();

    info!("Starting client...");
    info!("Connecting to: {}", config.server_url);
    info!("Controls: arrows/WASD to steer, Enter to start, R to reconnect, Esc to quit");

    let conf = Conf {
        window_title: "Snake".to_string(),
        window_width: config.window_width as i32,
        window_height: config.window_height as i32,
        ..Default::default()
    };
    macroquad::Window::from_config(conf, run(config));

    Ok(())
}
