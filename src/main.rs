//! # Field Node
//!
//! Runs the field node on the bench: the GPS receiver is read from the
//! configured serial port while sensors and radio are simulated.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load the TOML configuration (first argument, default
//!      `config/default.toml`)
//!    - Set up logging, optionally with a daily rolling log file
//!    - Open the GPS port and spawn the positioning task
//!
//! 2. **Join**
//!    - Validate the session identity and bring up the radio stack
//!    - Request the over-the-air join
//!
//! 3. **Dispatch**
//!    - Run the uplink dispatcher until the network disconnects or Ctrl+C
//!
//! # Examples
//!
//! ```bash
//! RUST_LOG=field_node=debug cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use field_node::actuator::LoggingIndicator;
use field_node::config::{Config, LoggingConfig};
use field_node::fix::fix_store;
use field_node::network::SimulatedNetwork;
use field_node::nmea::decoder::FixDecoder;
use field_node::nmea::framer::SentenceFramer;
use field_node::positioning::{run_positioning_task, GpsReceiver};
use field_node::sensors::simulated::bench_suite;
use field_node::sensors::SensorSampler;
use field_node::serial::GpsSerial;
use field_node::uplink::UplinkNode;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Rolling log file name prefix
const LOG_FILE_PREFIX: &str = "field-node.log";

/// Install the tracing subscriber
///
/// The returned guard flushes the file writer on drop and must live until
/// shutdown.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if config.dir.is_empty() {
        registry.init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("Field node v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    // Positioning
    let (fix_writer, fix_reader) = fix_store();
    let receiver = GpsReceiver::new(
        SentenceFramer::with_capacity(config.gps.buffer_capacity),
        FixDecoder::new(config.gps.verify_checksum),
        fix_writer,
    );
    let positioning = match GpsSerial::open(&config.gps) {
        Ok(serial) => {
            info!("GPS serial port opened at: {}", serial.device_path());
            Some(tokio::spawn(run_positioning_task(
                serial,
                receiver,
                config.gps.poll_interval(),
            )))
        }
        Err(e) => {
            warn!("GPS receiver unavailable ({}), uplinks will carry the fallback position", e);
            None
        }
    };

    // Sensors and radio
    let sampler = SensorSampler::new(bench_suite(), config.sensors.settle());
    let node = UplinkNode::join(
        SimulatedNetwork::default(),
        &config,
        sampler,
        fix_reader,
        Box::new(LoggingIndicator::new()),
    )
    .await
    .context("Failed to start the uplink")?;

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = node.run() => {
            let stats = result?;
            info!("Network disconnected after {} uplinks", stats.completed);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    if let Some(task) = positioning {
        task.abort();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/", "config/default.toml");
        let config = Config::load(path).unwrap();

        assert!(config.logging.dir.is_empty());
        assert_eq!(config.uplink.app_port, 15);
        assert!(field_node::uplink::validate_identity(&config.session).is_ok());
    }
}
