//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Duplex byte channel to the flight controller
///
/// Reads never block past their timeout: running out of time is reported as
/// "no data" (`None` or a short buffer), not as an error.
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read one byte, or `None` if nothing arrived within `timeout`
    async fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;

    /// Read up to `len` bytes, returning early with fewer once `timeout` elapses
    async fn read_bytes(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>>;
}

/// Adapter from any tokio byte stream (e.g. `tokio_serial::SerialStream`)
/// to [`SerialPortIO`]
pub struct TokioSerialPort<S> {
    stream: S,
}

impl<S> TokioSerialPort<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

fn end_of_stream() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "Serial stream closed")
}

#[async_trait]
impl<S> SerialPortIO for TokioSerialPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    async fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];

        match tokio::time::timeout(timeout, self.stream.read(&mut byte)).await {
            Ok(Ok(0)) => Err(end_of_stream()),
            Ok(Ok(_)) => Ok(Some(byte[0])),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn read_bytes(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match tokio::time::timeout_at(deadline, self.stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => return Err(end_of_stream()),
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => break,
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::clock::mocks::MockClock;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock serial port for testing
    ///
    /// Bytes come from `rx_data`. Each write pops the next queued reply (if
    /// any) into `rx_data`, which lets tests script request/response
    /// exchanges. When attached to a [`MockClock`], a read that runs out of
    /// data advances virtual time by its timeout, like a real port would
    /// block.
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub rx_data: Arc<Mutex<VecDeque<u8>>>,
        pub replies: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub flush_error: Arc<Mutex<Option<io::ErrorKind>>>,
        clock: Option<MockClock>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                rx_data: Arc::new(Mutex::new(VecDeque::new())),
                replies: Arc::new(Mutex::new(VecDeque::new())),
                write_error: Arc::new(Mutex::new(None)),
                flush_error: Arc::new(Mutex::new(None)),
                clock: None,
            }
        }

        pub fn with_clock(clock: MockClock) -> Self {
            Self {
                clock: Some(clock),
                ..Self::new()
            }
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn inject_rx_data(&self, data: &[u8]) {
            self.rx_data.lock().unwrap().extend(data.iter().copied());
        }

        /// Queue bytes to become readable after the next write
        pub fn queue_reply(&self, data: &[u8]) {
            self.replies.lock().unwrap().push_back(data.to_vec());
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn set_flush_error(&self, error: io::ErrorKind) {
            *self.flush_error.lock().unwrap() = Some(error);
        }

        fn wait(&self, timeout: Duration) {
            if let Some(clock) = &self.clock {
                clock.advance(timeout);
            }
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());

            if let Some(reply) = self.replies.lock().unwrap().pop_front() {
                self.inject_rx_data(&reply);
            }
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            if let Some(error) = *self.flush_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock flush error"));
            }
            Ok(())
        }

        async fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
            let byte = self.rx_data.lock().unwrap().pop_front();
            if byte.is_none() {
                self.wait(timeout);
            }
            Ok(byte)
        }

        async fn read_bytes(&mut self, len: usize, timeout: Duration) -> io::Result<Vec<u8>> {
            let data: Vec<u8> = {
                let mut rx = self.rx_data.lock().unwrap();
                let take = len.min(rx.len());
                rx.drain(..take).collect()
            };
            if data.len() < len {
                self.wait(timeout);
            }
            Ok(data)
        }
    }
}
