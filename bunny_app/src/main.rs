//! Entry point: logging, configuration, then the app

mod app;
mod keyboard_controller;

use lumen_engine::EngineConfig;

fn main() {
    env_logger::init();

    let config = EngineConfig::load_or_default("bunny_app.toml");
    log::info!("Starting {}", config.application_name);

    let mut app = match app::App::new(config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run() {
        log::error!("Fatal render error: {}", e);
        std::process::exit(1);
    }

    log::info!("Shutting down");
}
