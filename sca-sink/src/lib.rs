//! Outbound sink adapters for the SCA engine (C9, §4.8).
//!
//! The default backend is [`line_sink::TcpLineSink`], a newline-framed JSON
//! connection to an arbitrary collector. The `kafka` feature additionally
//! provides [`kafka::KafkaSink`], built on a raw Kafka wire-protocol
//! producer carried over from an earlier iteration of this sink.

pub mod config;
pub mod line_sink;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use config::SinkConfig;
pub use line_sink::TcpLineSink;

#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink protocol error: {0}")]
    Protocol(String),
}
