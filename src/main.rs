//! # Robofish
//!
//! Runs the robotic fish control core.
//!
//! Reads SBUS commands and IMU data (from serial ports or the built-in
//! simulator), runs the gait state machine and drives the body and tail servos.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with a non-blocking tracing subscriber
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Start the byte producers (serial pumps or simulator) feeding the rings
//!
//! 2. **Tasks**
//!    - SBUS poll, IMU poll, control tick and telemetry, each on its own interval
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C raises the shutdown flag
//!    - Every task leaves its loop; the control task parks the servos at rest
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! RUST_LOG=robofish=debug cargo run
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use robofish::config::{Config, SourceKind};
use robofish::gait::GaitController;
use robofish::imu::protocol::ImuSample;
use robofish::imu::setup::configure_output_rate;
use robofish::ring::{RingReader, RxRing};
use robofish::sbus::mapper::SbusCommandMapper;
use robofish::serial::port_trait::TokioSerialPort;
use robofish::serial::{open_port, pump_into_ring, PortSettings};
use robofish::servo::{LogOutput, ServoDriver};
use robofish::tasks::control::ControlLoop;
use robofish::tasks::imu::ImuPoller;
use robofish::tasks::link::LinkMonitor;
use robofish::tasks::sbus::SbusPoller;
use robofish::tasks::{self, Clock};
use robofish::telemetry::{self, TelemetryLogger};
use robofish::sim;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Robofish v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    info!("Configuration loaded from {}", config_path);

    let clock = Clock::start();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let sbus_ring = RxRing::shared(config.sbus.ring_capacity);
    let imu_ring = RxRing::shared(config.imu.ring_capacity);

    // Byte producers
    match config.source.kind {
        SourceKind::Simulated => {
            info!("Using simulated SBUS radio and IMU");
            handles.push(tokio::spawn(sim::run_radio(
                Arc::clone(&sbus_ring),
                shutdown_rx.clone(),
            )));
            handles.push(tokio::spawn(sim::run_imu(
                Arc::clone(&imu_ring),
                config.imu.output_rate_hz,
                shutdown_rx.clone(),
            )));
        }
        SourceKind::Serial => {
            let sbus_port = open_port(&PortSettings::sbus(&config.sbus.port, config.sbus.baud_rate))?;

            let mut imu_port = TokioSerialPort::new(open_port(&PortSettings::imu(
                &config.imu.port,
                config.imu.baud_rate,
            ))?);
            if config.imu.configure_on_start {
                configure_output_rate(&mut imu_port, config.imu.output_rate_hz).await?;
            }

            handles.push(spawn_pump("SBUS", sbus_port, Arc::clone(&sbus_ring), shutdown_rx.clone()));
            handles.push(spawn_pump(
                "IMU",
                imu_port.into_inner(),
                Arc::clone(&imu_ring),
                shutdown_rx.clone(),
            ));
        }
    }

    // Decode tasks
    let (frames_tx, frames_rx) = watch::channel(None);
    let (imu_tx, imu_rx) = watch::channel(ImuSample::default());

    handles.push(tokio::spawn(tasks::sbus::run(
        SbusPoller::new(RingReader::new(sbus_ring), config.sbus.frame_timeout),
        config.sbus.clone(),
        clock,
        frames_tx,
        shutdown_rx.clone(),
    )));
    handles.push(tokio::spawn(tasks::imu::run(
        ImuPoller::new(RingReader::new(imu_ring), config.imu.frame_timeout),
        config.imu.clone(),
        imu_tx,
        shutdown_rx.clone(),
    )));

    // Control
    let (status_tx, status_rx) = watch::channel(None);
    let control = ControlLoop::new(
        SbusCommandMapper::new(config.mapping.clone()),
        LinkMonitor::new(config.sbus.failsafe_timeout_ms),
        GaitController::new(config.gait.clone()),
        ServoDriver::new(LogOutput::default(), config.servo.clone()),
    );
    handles.push(tokio::spawn(tasks::control::run(
        control,
        config.gait.tick_ms,
        clock,
        frames_rx,
        status_tx,
        shutdown_rx.clone(),
    )));

    // Telemetry
    if config.telemetry.enabled {
        let logger = TelemetryLogger::new(&config.telemetry)?;
        handles.push(tokio::spawn(telemetry::run(
            logger,
            Duration::from_millis(config.telemetry.log_interval_ms),
            status_rx,
            imu_rx,
            shutdown_rx.clone(),
        )));
    }

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    shutdown_tx.send_replace(true);

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Spawn a receive pump that logs its own failure.
fn spawn_pump(
    name: &'static str,
    port: tokio_serial::SerialStream,
    ring: Arc<RxRing>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = pump_into_ring(name, port, ring, shutdown).await {
            error!("{} receive pump failed: {}", name, e);
        }
    })
}
