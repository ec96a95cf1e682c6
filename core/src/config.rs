use std::time::Duration;

/// Control codes. Standard ASCII STX, ETX and ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub start: u8,
    pub end: u8,
    pub ack: u8,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: 0x02,
            end: 0x03,
            ack: 0x06,
        }
    }
}

/// Settings shared by both peers. `chunk_size` and `markers` must match on
/// each side of a connection, nothing negotiates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub chunk_size: usize,
    pub markers: Markers,
    /// Delay between liveness checks in the outer loops.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: crate::PORT,
            chunk_size: crate::CHUNK_SIZE,
            markers: Markers::default(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("marker code {0:#04x} is used more than once")]
    DuplicateMarker(u8),
    #[error("marker code 0x00 collides with slot padding")]
    ZeroMarker,
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::ZeroChunkSize);
        }
        let Markers { start, end, ack } = self.markers;
        if start == 0 || end == 0 || ack == 0 {
            return Err(Error::ZeroMarker);
        }
        if start == end || start == ack {
            return Err(Error::DuplicateMarker(start));
        }
        if end == ack {
            return Err(Error::DuplicateMarker(end));
        }
        Ok(())
    }
}
