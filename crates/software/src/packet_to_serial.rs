//! Unpacks USB-MIDI Event Packets into the bytes transmitted over a serial MIDI port.

use crate::packet::{CableNumber, UsbMidiPacket};
use tinyvec::ArrayVec;

/// Converts USB-MIDI Event Packets into serial MIDI bytes.
///
/// Unlike [`SerialToPacket`](crate::serial_to_packet::SerialToPacket) this direction is stateless: each packet's Code
/// Index Number alone determines how many of its data bytes are sent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketToSerial {
    cable: CableNumber,
}

impl PacketToSerial {
    /// Constructs a [`PacketToSerial`] which accepts packets addressed to `cable`.
    pub fn new(cable: CableNumber) -> Self {
        Self { cable }
    }

    /// Returns the bytes to transmit for `packet`, in order.
    ///
    /// Packets addressed to other cables, and those with reserved Code Index Numbers, produce no bytes.
    pub fn decode(&self, packet: &UsbMidiPacket) -> ArrayVec<[u8; 3]> {
        let mut bytes = ArrayVec::new();
        if packet.cable() != self.cable {
            #[cfg(feature = "defmt")]
            defmt::debug!("Ignoring packet addressed to cable {}", u8::from(packet.cable()));
            return bytes;
        }
        bytes.extend_from_slice(packet.payload());
        bytes
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{
        configuration::{BridgeConfig, SysexStart},
        packet::CodeIndexNumber,
        serial_to_packet::SerialToPacket,
    };
    use std::vec::Vec;

    fn packet(code_index_number: CodeIndexNumber) -> UsbMidiPacket {
        UsbMidiPacket::new(CableNumber::ZERO, code_index_number, [0x91, 0x22, 0x33])
    }

    #[test]
    fn byte_count_follows_code_index_number() {
        let decoder = PacketToSerial::default();
        for nibble in 0x0..=0xF {
            let code_index_number = CodeIndexNumber::from_nibble(nibble);
            let expected: &[u8] = match nibble {
                0x0 | 0x1 => &[][..],
                0x5 | 0xF => &[0x91][..],
                0x2 | 0x6 | 0xC | 0xD => &[0x91, 0x22][..],
                _ => &[0x91, 0x22, 0x33][..],
            };
            assert_eq!(
                expected,
                decoder.decode(&packet(code_index_number)).as_slice(),
                "Unexpected bytes for Code Index Number {nibble:#X}"
            );
        }
    }

    #[test]
    fn reserved_code_index_numbers_emit_nothing() {
        let decoder = PacketToSerial::default();
        for code_index_number in [
            CodeIndexNumber::MiscellaneousFunction,
            CodeIndexNumber::CableEvent,
        ] {
            let packet = UsbMidiPacket::new(CableNumber::ZERO, code_index_number, [0xFF; 3]);
            assert!(decoder.decode(&packet).is_empty());
        }
    }

    #[test]
    fn foreign_cable_emits_nothing() {
        let decoder = PacketToSerial::new(CableNumber::ZERO);
        let packet = UsbMidiPacket::new(
            CableNumber::from_u8_lossy(1),
            CodeIndexNumber::NoteOn,
            [0x90, 0x40, 0x7F],
        );
        assert!(decoder.decode(&packet).is_empty());
    }

    #[test]
    fn configured_cable_is_accepted() {
        let cable = CableNumber::from_u8_lossy(5);
        let decoder = PacketToSerial::new(cable);
        let packet = UsbMidiPacket::new(cable, CodeIndexNumber::ProgramChange, [0xC2, 0x09, 0x00]);
        assert_eq!(&[0xC2, 0x09], decoder.decode(&packet).as_slice());
    }

    mod round_trip {
        use super::*;
        use wmidi::{Channel, ControlFunction, MidiMessage, Note, U7};

        fn round_trip(config: &BridgeConfig, bytes: &[u8]) -> Vec<u8> {
            let mut encoder = SerialToPacket::with_config(config);
            let decoder = PacketToSerial::new(config.cable);
            bytes
                .iter()
                .filter_map(|&byte| encoder.feed(byte))
                .flat_map(|packet| decoder.decode(&packet))
                .collect()
        }

        fn included() -> BridgeConfig {
            BridgeConfig {
                sysex_start: SysexStart::Included,
                ..Default::default()
            }
        }

        #[test]
        fn complete_messages() {
            let messages: [&[u8]; 9] = [
                &[0xF8],
                &[0xF6],
                &[0xC0, 0x05],
                &[0xD1, 0x40],
                &[0xF1, 0x12],
                &[0xF3, 0x01],
                &[0x90, 0x3C, 0x64],
                &[0xB2, 0x07, 0x7F],
                &[0xF2, 0x00, 0x08],
            ];
            for message in messages {
                assert_eq!(
                    message,
                    round_trip(&BridgeConfig::default(), message).as_slice(),
                    "Expected left but got right"
                );
            }
        }

        #[test]
        fn sysex_of_every_length_modulo_three() {
            let messages: [&[u8]; 5] = [
                &[0xF0, 0xF7],
                &[0xF0, 0x01, 0xF7],
                &[0xF0, 0x01, 0x02, 0xF7],
                &[0xF0, 0x01, 0x02, 0x03, 0xF7],
                &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7],
            ];
            for message in messages {
                assert_eq!(
                    message,
                    round_trip(&included(), message).as_slice(),
                    "Expected left but got right"
                );
                // without the start byte, everything after it survives
                assert_eq!(
                    &message[1..],
                    round_trip(&BridgeConfig::default(), message).as_slice(),
                    "Expected left but got right"
                );
            }
        }

        #[test]
        fn running_status_is_expanded() {
            assert_eq!(
                &[0x90, 0x3C, 0x64, 0x90, 0x3E, 0x64],
                round_trip(&BridgeConfig::default(), &[0x90, 0x3C, 0x64, 0x3E, 0x64]).as_slice()
            );
        }

        #[test]
        fn decoded_bytes_form_midi_messages() {
            let bytes = round_trip(&BridgeConfig::default(), &[0xB0, 0x05, 0x40, 0x91, 0x3C, 0x7F]);
            assert_eq!(
                Some(MidiMessage::ControlChange(
                    Channel::Ch1,
                    ControlFunction::PORTAMENTO_TIME,
                    U7::from_u8_lossy(0x40)
                )),
                MidiMessage::from_bytes(&bytes[..3]).ok()
            );
            assert_eq!(
                Some(MidiMessage::NoteOn(
                    Channel::Ch2,
                    Note::C4,
                    U7::from_u8_lossy(0x7F)
                )),
                MidiMessage::from_bytes(&bytes[3..]).ok()
            );
        }
    }
}
