//! The USB-MIDI Event Packet and the vocabulary needed to build one.
//!
//! Every USB-MIDI Event Packet is 32 bits long. The first byte is the Packet Header: the high nibble carries the
//! [`CableNumber`], the low nibble the [`CodeIndexNumber`]. The remaining three bytes carry MIDI data, of which only
//! as many as the Code Index Number implies are meaningful (see section 4 of the USB Device Class Definition for MIDI
//! Devices, release 1.0).

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use wmidi::MidiMessage;

/// Baud rate of the 5-pin DIN MIDI current loop (8 data bits, no parity, one stop bit).
pub const MIDI_BAUD_RATE: u32 = 31_250;

/// Number of bytes in a USB-MIDI Event Packet.
pub const EVENT_PACKET_SIZE: usize = 4;

/// Status byte which opens a System Exclusive message.
pub const SYSEX_START: u8 = 0xF0;

/// Status byte which closes a System Exclusive message (a.k.a. EOX).
pub const SYSEX_END: u8 = 0xF7;

/// The only System Common message which carries no data bytes.
pub const TUNE_REQUEST: u8 = 0xF6;

/// Identifies one of up to 16 virtual MIDI cables multiplexed over a single USB-MIDI interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CableNumber(u8);

impl CableNumber {
    /// Cable 0, the cable of a device exposing a single MIDI port.
    pub const ZERO: Self = Self(0);

    /// Largest valid cable number.
    pub const MAX: Self = Self(0x0F);

    /// Constructs a [`CableNumber`], returning `None` if the value does not fit in a nibble.
    pub const fn new(cable: u8) -> Option<Self> {
        if cable <= Self::MAX.0 {
            Some(Self(cable))
        } else {
            None
        }
    }

    /// Constructs a [`CableNumber`] from the low nibble of `cable`, discarding the rest.
    pub const fn from_u8_lossy(cable: u8) -> Self {
        Self(cable & 0x0F)
    }
}

impl From<CableNumber> for u8 {
    fn from(cable: CableNumber) -> Self {
        cable.0
    }
}

/// Classifies the payload of a USB-MIDI Event Packet.
///
/// Discriminants match the values transmitted in the low nibble of the Packet Header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CodeIndexNumber {
    /// Reserved for future extension.
    #[default]
    MiscellaneousFunction = 0x0,
    /// Reserved for future extension.
    CableEvent = 0x1,
    /// Two-byte System Common message, e.g., MTC Quarter Frame or Song Select.
    SystemCommonTwoBytes = 0x2,
    /// Three-byte System Common message, e.g., Song Position Pointer.
    SystemCommonThreeBytes = 0x3,
    /// SysEx starts or continues; all three data bytes are valid.
    SysExStartOrContinue = 0x4,
    /// Single-byte System Common message, or SysEx ends with the following single byte.
    SingleByteSystemCommonOrSysExEnd = 0x5,
    /// SysEx ends with the following two bytes.
    SysExEndsWithTwoBytes = 0x6,
    /// SysEx ends with the following three bytes.
    SysExEndsWithThreeBytes = 0x7,
    /// Note Off.
    NoteOff = 0x8,
    /// Note On.
    NoteOn = 0x9,
    /// Polyphonic Key Pressure (a.k.a. Aftertouch).
    PolyKeyPressure = 0xA,
    /// Control Change.
    ControlChange = 0xB,
    /// Program Change.
    ProgramChange = 0xC,
    /// Channel Pressure.
    ChannelPressure = 0xD,
    /// Pitch Bend Change.
    PitchBend = 0xE,
    /// A single byte, passed through without parsing; used for System Real-Time messages.
    SingleByte = 0xF,
}

impl CodeIndexNumber {
    /// Interprets the low nibble of `value`. Every nibble maps to a Code Index Number, so this never fails.
    pub fn from_nibble(value: u8) -> Self {
        Self::from_u8(value & 0x0F).unwrap_or_default()
    }

    /// Returns the Code Index Number of a Channel Voice or Channel Mode message with the given status byte.
    ///
    /// Returns `None` for anything that isn't a channel status byte (i.e., data bytes and system messages).
    pub fn for_channel_status(status: u8) -> Option<Self> {
        match status >> 4 {
            nibble @ 0x8..=0xE => Self::from_u8(nibble),
            _ => None,
        }
    }

    /// The number of MIDI bytes a packet with this Code Index Number carries.
    pub fn payload_len(self) -> usize {
        match self {
            Self::MiscellaneousFunction | Self::CableEvent => 0,
            Self::SingleByteSystemCommonOrSysExEnd | Self::SingleByte => 1,
            Self::SystemCommonTwoBytes
            | Self::SysExEndsWithTwoBytes
            | Self::ProgramChange
            | Self::ChannelPressure => 2,
            Self::SystemCommonThreeBytes
            | Self::SysExStartOrContinue
            | Self::SysExEndsWithThreeBytes
            | Self::NoteOff
            | Self::NoteOn
            | Self::PolyKeyPressure
            | Self::ControlChange
            | Self::PitchBend => 3,
        }
    }

    /// Code Index Number 0x5 is not included; it is only SysEx when its sole byte is [`SYSEX_END`].
    fn is_sysex_fragment(self) -> bool {
        matches!(
            self,
            Self::SysExStartOrContinue | Self::SysExEndsWithTwoBytes | Self::SysExEndsWithThreeBytes
        )
    }
}

/// A single USB-MIDI Event Packet.
///
/// Packets are immutable once constructed; bytes beyond [`payload_len`](CodeIndexNumber::payload_len) are kept as
/// given (normally zero) but carry no meaning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbMidiPacket {
    cable: CableNumber,
    code_index_number: CodeIndexNumber,
    data: [u8; 3],
}

impl UsbMidiPacket {
    /// Constructs a [`UsbMidiPacket`].
    pub const fn new(cable: CableNumber, code_index_number: CodeIndexNumber, data: [u8; 3]) -> Self {
        Self {
            cable,
            code_index_number,
            data,
        }
    }

    /// The virtual cable the packet travels on.
    pub fn cable(&self) -> CableNumber {
        self.cable
    }

    /// The Code Index Number classifying the packet's payload.
    pub fn code_index_number(&self) -> CodeIndexNumber {
        self.code_index_number
    }

    /// All three data bytes, including those the Code Index Number marks as unused.
    pub fn data(&self) -> [u8; 3] {
        self.data
    }

    /// The data bytes that are meaningful for this packet's Code Index Number.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.code_index_number.payload_len()]
    }

    /// The Packet Header: cable number in the high nibble, Code Index Number in the low nibble.
    pub fn header(&self) -> u8 {
        u8::from(self.cable) << 4 | self.code_index_number as u8
    }

    /// Serializes the packet as it travels over the wire.
    pub fn to_bytes(&self) -> [u8; EVENT_PACKET_SIZE] {
        let [data1, data2, data3] = self.data;
        [self.header(), data1, data2, data3]
    }

    /// Deserializes a packet received over the wire.
    pub fn from_bytes(bytes: [u8; EVENT_PACKET_SIZE]) -> Self {
        let [header, data1, data2, data3] = bytes;
        Self {
            cable: CableNumber::from_u8_lossy(header >> 4),
            code_index_number: CodeIndexNumber::from_nibble(header),
            data: [data1, data2, data3],
        }
    }

    /// Interprets the payload as a complete MIDI message.
    ///
    /// Returns `None` for SysEx fragments, reserved Code Index Numbers, and payloads which don't form a valid message.
    pub fn message(&self) -> Option<MidiMessage<'_>> {
        if self.code_index_number.is_sysex_fragment() || self.payload() == [SYSEX_END] {
            return None;
        }
        match self.payload() {
            [] => None,
            payload => MidiMessage::from_bytes(payload).ok(),
        }
    }
}

/// Splits data received over a USB bulk endpoint into USB-MIDI Event Packets.
///
/// A trailing fragment shorter than [`EVENT_PACKET_SIZE`] is dropped.
pub fn packets_from_bytes(data: &[u8]) -> impl Iterator<Item = UsbMidiPacket> + '_ {
    data.chunks(EVENT_PACKET_SIZE)
        .filter_map(|potential_packet| match <[u8; EVENT_PACKET_SIZE]>::try_from(potential_packet) {
            Ok(bytes) => Some(UsbMidiPacket::from_bytes(bytes)),
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::error!(
                    "USB-MIDI Event Packets must always be 32 bits long; dropping {} trailing bytes",
                    potential_packet.len()
                );
                None
            }
        })
}
