use color_eyre::{eyre::eyre, Result};
use padsession::backend::gilrs_backend::GilrsBackend;
use padsession::config::{Config, PollConfig};
use padsession::controller::{Button, SessionManager};
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Config::load_or_default()?;
    info!("Starting with configuration: {:?}", config);

    let mut manager = SessionManager::with_gilrs(config.manager.clone())
        .map_err(|e| eyre!("Failed to start session manager: {}", e))?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll.interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_count = None;
    info!("Entering poll loop ({} ms per frame)", config.poll.interval_ms);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_frame(&mut manager, &config.poll, &mut last_count)?;
            }
            res = &mut shutdown => {
                res?;
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    manager.quit();
    Ok(())
}

fn run_frame(
    manager: &mut SessionManager<GilrsBackend>,
    poll: &PollConfig,
    last_count: &mut Option<usize>,
) -> Result<()> {
    manager.update();

    let connected = manager.count();
    if *last_count != Some(connected) {
        info!("{} controller(s) connected", connected);
        *last_count = Some(connected);
    }

    for slot in 0..manager.max_slots() {
        let state = manager.get_state(slot)?;
        if !state.is_connected() {
            continue;
        }

        if poll.log_transitions {
            for button in state.just_pressed().iter() {
                info!("Slot {} ({}): {:?} pressed", slot, state.name(), button);
            }
        }

        // Guide reports battery, A gives a short rumble
        if state.is_just_pressed(Button::Guide) {
            match manager.get_session(slot)?.power_level() {
                Ok(level) => info!("Slot {} power level: {:?}", slot, level),
                Err(e) => warn!("Slot {} power query failed: {}", slot, e),
            }
        }
        if state.is_just_pressed(Button::A) {
            match manager.get_session(slot)?.do_vibration(0.5, 0.5, 150) {
                Ok(accepted) => debug!("Slot {} rumble accepted: {}", slot, accepted),
                Err(e) => warn!("Slot {} rumble failed: {}", slot, e),
            }
        }
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
