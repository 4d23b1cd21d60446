//! User-configurable settings.

use crate::packet::{CableNumber, MIDI_BAUD_RATE};

/// Determines whether the `0xF0` byte opening a System Exclusive message is carried in the first USB-MIDI Event Packet
/// of that message.
///
/// The USB-MIDI class definition places `0xF0` in the first packet, so that a host can reassemble the message
/// byte-for-byte. Some hosts instead expect packets to carry only the SysEx body and the closing `0xF7`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysexStart {
    /// `0xF0` is consumed by the parser; the first packet begins with the first data byte.
    #[default]
    Omitted,
    /// `0xF0` occupies the first data byte of the first packet.
    Included,
}

/// Settings shared by both directions of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// The virtual cable serial MIDI is exposed on. Packets arriving on any other cable are ignored.
    pub cable: CableNumber,
    /// See [`SysexStart`].
    pub sysex_start: SysexStart,
    /// Baud rate of the serial port. Anything other than [`MIDI_BAUD_RATE`] is only useful for bench testing against
    /// a USB-serial adapter.
    pub baud_rate: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cable: CableNumber::ZERO,
            sysex_start: SysexStart::default(),
            baud_rate: MIDI_BAUD_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        let config = BridgeConfig::default();
        assert_eq!(CableNumber::ZERO, config.cable);
        assert_eq!(SysexStart::Omitted, config.sysex_start);
        assert_eq!(31_250, config.baud_rate);
    }
}
