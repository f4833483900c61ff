use crate::error::ScaError;

/// The abstract outbound sink (C9). The engine never performs outbound I/O
/// itself; every emitted envelope is serialized to a newline-framed JSON
/// string and handed to an implementor of this trait.
///
/// Implementors are responsible for rate limiting (§4.8) and the
/// reconnect-once/retry-once policy on failure; the engine calls `send`
/// once per event and treats an `Err` as "dropped, already logged".
pub trait EventSink: Send {
    fn send(&mut self, line: &str) -> Result<(), ScaError>;
}

/// A no-op sink used in tests and dry-run scans; records emitted lines.
#[derive(Default)]
pub struct CollectingSink {
    pub lines: Vec<String>,
}

impl EventSink for CollectingSink {
    fn send(&mut self, line: &str) -> Result<(), ScaError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}
