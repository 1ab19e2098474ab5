//! Status server binary

use healthcheck::HttpProbe;
use status_server::{Config, Reactor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing is not initialized until the logging section is known
    let (config, config_path) = match Config::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    let log_level = config.logging.level.as_deref().unwrap_or("info");
    if config.logging.is_json() {
        common::logging::init_json(log_level);
    } else {
        common::logging::init(log_level);
    }

    tracing::info!("Status server starting");
    match &config_path {
        Some(path) => tracing::info!("Loaded configuration from: {}", path.display()),
        None => tracing::info!("No configuration file found, using defaults"),
    }

    let server_config = config.to_server_config();
    if server_config.targets.is_empty() {
        tracing::warn!("No targets configured");
    }

    let probe = HttpProbe::new(&server_config.probe)?;
    let mut reactor = match Reactor::bind(server_config, probe) {
        Ok(reactor) => reactor,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create listening socket");
            return Err(e.into());
        }
    };

    reactor.run()?;

    Ok(())
}
