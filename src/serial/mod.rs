//! # Serial Communication Module
//!
//! Handles the serial links to the SBUS receiver and the IMU.
//!
//! This module handles:
//! - Opening ports with the framing each device needs (SBUS is 8E2, IMU is 8N1)
//! - Pumping received bytes into an [`RxRing`], standing in for circular DMA
//! - Write access for IMU setup commands ([`port_trait`])

pub mod port_trait;

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, RobofishError};
use crate::ring::RxRing;

/// Read chunk size for the receive pump
const READ_CHUNK: usize = 64;

/// Line settings for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub path: String,
    pub baud_rate: u32,
    pub parity: tokio_serial::Parity,
    pub stop_bits: tokio_serial::StopBits,
}

impl PortSettings {
    /// SBUS framing: even parity, two stop bits.
    #[must_use]
    pub fn sbus(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            parity: tokio_serial::Parity::Even,
            stop_bits: tokio_serial::StopBits::Two,
        }
    }

    /// IMU framing: no parity, one stop bit.
    #[must_use]
    pub fn imu(path: &str, baud_rate: u32) -> Self {
        Self {
            path: path.to_string(),
            baud_rate,
            parity: tokio_serial::Parity::None,
            stop_bits: tokio_serial::StopBits::One,
        }
    }
}

/// Open a serial port
///
/// # Arguments
///
/// * `settings` - Device path and line settings
///
/// # Returns
///
/// * `Result<SerialStream>` - Opened serial port
///
/// # Errors
///
/// Returns [`RobofishError::Serial`] if the device cannot be opened
pub fn open_port(settings: &PortSettings) -> Result<tokio_serial::SerialStream> {
    debug!("Opening serial port {} at {} baud", settings.path, settings.baud_rate);

    let port = tokio_serial::new(&settings.path, settings.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| RobofishError::Serial(format!("Failed to open {}: {}", settings.path, e)))?;

    info!("Opened serial port {}", settings.path);
    Ok(port)
}

/// Copy bytes from `reader` into `ring` until EOF or shutdown.
///
/// # Returns
///
/// * `Result<u64>` - Total bytes received
///
/// # Errors
///
/// Returns [`RobofishError::Serial`] on a read failure
pub async fn pump_into_ring<R>(
    name: &str,
    mut reader: R,
    ring: Arc<RxRing>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut total: u64 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                let n = read.map_err(|e| {
                    RobofishError::Serial(format!("Failed to read {}: {}", name, e))
                })?;
                if n == 0 {
                    warn!("{} receive stream closed", name);
                    break;
                }
                ring.push(&buf);
                total += n as u64;
                buf.clear();
            }

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("{} receive pump stopped after {} bytes", name, total);
    Ok(total)
}
