//! Traits describing the collaborators the [`Bridge`](crate::bridge::Bridge) is wired to: a serial MIDI port on one
//! side and a USB-MIDI endpoint pair on the other.
//!
//! All operations are non-blocking. Sources report `None` when nothing is currently available, leaving it to the
//! caller to yield until more input arrives. Physical-layer concerns (baud rate, framing, endpoint buffering) belong to
//! the implementor.

use crate::packet::UsbMidiPacket;

/// Serial MIDI input.
pub trait ByteSource {
    /// Returns the next received byte, if one is available.
    fn read_byte(&mut self) -> Option<u8>;
}

/// Serial MIDI output.
pub trait ByteSink {
    /// Error type for transmit operations
    type Error;

    /// Returns how many more bytes [`write_byte`](Self::write_byte) can currently accept.
    fn available(&self) -> usize;

    /// Queues a single byte for transmission.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// USB-MIDI input (the host's OUT endpoint).
pub trait PacketSource {
    /// Returns the next received USB-MIDI Event Packet, if one is available.
    fn receive_packet(&mut self) -> Option<UsbMidiPacket>;
}

/// USB-MIDI output (the host's IN endpoint).
///
/// Implementors may buffer packets; nothing is guaranteed to reach the host until [`flush`](Self::flush) is called.
pub trait PacketSink {
    /// Error type for transmit operations
    type Error;

    /// Queues a USB-MIDI Event Packet for transmission.
    fn send_packet(&mut self, packet: UsbMidiPacket) -> Result<(), Self::Error>;

    /// Commits all queued packets.
    fn flush(&mut self) -> Result<(), Self::Error>;
}
