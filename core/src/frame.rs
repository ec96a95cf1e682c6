//! Wire framing.
//!
//! A message is a START slot, the text split into chunks of at most
//! `chunk_size` bytes, and an END slot. The receiving side answers every END
//! with an ACKNOWLEDGE slot. A slot is `chunk_size` bytes long: the marker
//! code followed by zero padding.
//!
//! There is no length prefix. A unit is a marker only if it starts with a
//! marker code and the rest of the slot is zero padding, so text holding a
//! marker code is still read back as text unless it also holds a run of
//! `chunk_size - 1` NUL bytes after it.

use crate::config::{Config, Markers};
use bytes::{Buf, Bytes, BytesMut};
use std::iter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Start,
    End,
    Ack,
}

impl Markers {
    pub fn code(&self, marker: Marker) -> u8 {
        match marker {
            Marker::Start => self.start,
            Marker::End => self.end,
            Marker::Ack => self.ack,
        }
    }

    pub fn classify(&self, byte: u8) -> Option<Marker> {
        if byte == self.start {
            Some(Marker::Start)
        } else if byte == self.end {
            Some(Marker::End)
        } else if byte == self.ack {
            Some(Marker::Ack)
        } else {
            None
        }
    }
}

/// Outgoing wire unit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outbound<'a> {
    Marker(Marker),
    Chunk(&'a [u8]),
}

/// Incoming wire unit.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Inbound {
    Marker(Marker),
    Payload(Bytes),
}

#[derive(Debug, Clone, Copy)]
pub struct Framer {
    chunk_size: usize,
    markers: Markers,
}

impl Framer {
    pub fn new(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            markers: config.markers,
        }
    }

    pub fn slot(&self, marker: Marker) -> Bytes {
        let mut slot = BytesMut::zeroed(self.chunk_size);
        slot[0] = self.markers.code(marker);
        slot.freeze()
    }

    /// Units for one message, in the order they go on the wire.
    pub fn frame<'a>(&self, text: &'a [u8]) -> impl Iterator<Item = Outbound<'a>> + 'a {
        iter::once(Outbound::Marker(Marker::Start))
            .chain(text.chunks(self.chunk_size).map(Outbound::Chunk))
            .chain(iter::once(Outbound::Marker(Marker::End)))
    }

    /// Whether part of `text` would be read back as a marker slot.
    pub fn is_ambiguous(&self, text: &[u8]) -> bool {
        (0..text.len()).any(|at| {
            matches!(
                find_slot(&self.markers, self.chunk_size, text, at),
                Slot::Complete(_)
            )
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Slot {
    None,
    /// Marker code with zero padding so far, but not all of it buffered.
    Partial,
    Complete(Marker),
}

fn find_slot(markers: &Markers, chunk_size: usize, buf: &[u8], at: usize) -> Slot {
    let marker = match markers.classify(buf[at]) {
        Some(marker) => marker,
        None => return Slot::None,
    };
    let padding = &buf[at + 1..buf.len().min(at + chunk_size)];
    if padding.iter().any(|byte| *byte != 0) {
        Slot::None
    } else if buf.len() - at < chunk_size {
        Slot::Partial
    } else {
        Slot::Complete(marker)
    }
}

/// Splits buffered stream bytes back into units.
///
/// A marker slot is only consumed once all `chunk_size` bytes of it are
/// buffered. A payload run ends where a marker slot may begin or after
/// `chunk_size` bytes, whichever comes first, so reads that merge or split
/// units decode the same way as slot-aligned reads.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    chunk_size: usize,
    markers: Markers,
}

impl Decoder {
    pub fn new(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            markers: config.markers,
        }
    }

    pub fn decode(&self, buf: &mut BytesMut) -> Option<Inbound> {
        if buf.is_empty() {
            return None;
        }
        match self.slot(buf, 0) {
            Slot::Complete(marker) => {
                buf.advance(self.chunk_size);
                return Some(Inbound::Marker(marker));
            }
            Slot::Partial => return None,
            Slot::None => {}
        }
        let limit = buf.len().min(self.chunk_size);
        let end = (1..limit)
            .find(|at| self.slot(buf, *at) != Slot::None)
            .unwrap_or(limit);
        Some(Inbound::Payload(buf.split_to(end).freeze()))
    }

    fn slot(&self, buf: &[u8], at: usize) -> Slot {
        find_slot(&self.markers, self.chunk_size, buf, at)
    }
}
