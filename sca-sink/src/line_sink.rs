//! Default sink backend: newline-framed JSON over a plain TCP connection to
//! an upstream collector, rate-limited per `max_eps` with the reconnect-once
//! then retry-once-then-drop policy described in §4.8.
//!
//! This generalizes the teacher's `KafkaProducer` connect-per-call style to
//! a connection that is kept open across sends and only re-established on
//! failure, which is what an arbitrary newline-JSON collector expects.

use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use sca_engine::{EventSink, ScaError};
use tracing::warn;

use crate::config::SinkConfig;

pub struct TcpLineSink {
    endpoint: String,
    timeout: Duration,
    min_interval: Duration,
    stream: Option<TcpStream>,
    last_sent: Option<Instant>,
}

impl TcpLineSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            min_interval: config.min_send_interval(),
            stream: None,
            last_sent: None,
        }
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.endpoint)?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    fn ensure_connected(&mut self) -> std::io::Result<()> {
        if self.stream.is_none() {
            self.stream = Some(self.connect()?);
        }
        Ok(())
    }

    fn throttle(&mut self) {
        if self.min_interval.is_zero() {
            return;
        }
        if let Some(last) = self.last_sent {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_sent = Some(Instant::now());
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let stream = self.stream.as_mut().expect("ensure_connected called first");
        writeln!(stream, "{line}")?;
        stream.flush()
    }
}

impl EventSink for TcpLineSink {
    fn send(&mut self, line: &str) -> Result<(), ScaError> {
        self.throttle();

        if self.ensure_connected().is_ok() && self.write_line(line).is_ok() {
            return Ok(());
        }

        // First attempt failed: drop the stream and reconnect once.
        warn!(endpoint = %self.endpoint, "sink write failed, reconnecting");
        self.stream = None;
        match self.ensure_connected().and_then(|_| self.write_line(line)) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stream = None;
                Err(ScaError::SinkUnavailable(format!("{}: {e}", self.endpoint)))
            }
        }
    }
}
