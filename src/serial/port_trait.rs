//! Trait abstraction for serial port writes, so command scripts can be tested
//! without hardware.

use async_trait::async_trait;
use std::io;

/// Trait for serial port output operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }

    /// Hands the stream back, e.g. to start the receive pump after setup.
    pub fn into_inner(self) -> tokio_serial::SerialStream {
        self.port
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Mock serial port that records every write with its (tokio) timestamp
    #[derive(Clone)]
    pub struct MockSerialPort {
        writes: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
        write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        flushes: Arc<Mutex<usize>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                writes: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                flushes: Arc::new(Mutex::new(0)),
            }
        }

        pub fn written(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().iter().map(|(_, d)| d.clone()).collect()
        }

        /// Gaps between consecutive writes
        pub fn gaps(&self) -> Vec<std::time::Duration> {
            let writes = self.writes.lock().unwrap();
            writes.windows(2).map(|w| w[1].0 - w[0].0).collect()
        }

        pub fn flush_count(&self) -> usize {
            *self.flushes.lock().unwrap()
        }

        pub fn fail_writes(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.writes.lock().unwrap().push((Instant::now(), data.to_vec()));
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }
}
