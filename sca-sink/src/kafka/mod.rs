//! Alternate sink backend: the raw Kafka wire protocol, preserved from an
//! earlier iteration of this codebase's sink and kept behind the `kafka`
//! feature as a genuine alternative to the default newline-JSON collector.

pub mod crc32;
pub mod protocol;

pub use protocol::{KafkaError, KafkaProducer, ProduceResponse};

use std::time::{Duration, Instant};

use sca_engine::{EventSink, ScaError};
use tracing::warn;

use crate::config::SinkConfig;

/// Adapts [`KafkaProducer`] (which opens a fresh connection per call) to the
/// engine's [`EventSink`] contract, adding the rate limiting and
/// retry-once-then-drop policy described in §4.8.
pub struct KafkaSink {
    producer: KafkaProducer,
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl KafkaSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            producer: KafkaProducer::from_config(config),
            min_interval: config.min_send_interval(),
            last_sent: None,
        }
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
}

impl EventSink for KafkaSink {
    fn send(&mut self, line: &str) -> Result<(), ScaError> {
        self.throttle();

        if self.producer.produce(line.as_bytes()).is_ok() {
            return Ok(());
        }

        warn!(broker = %self.producer.broker, "kafka produce failed, retrying once");
        self.producer
            .produce(line.as_bytes())
            .map(|_| ())
            .map_err(|e| ScaError::SinkUnavailable(format!("{}: {e}", self.producer.broker)))
    }
}
