//! Reassembles MIDI messages from a serial byte stream and frames them as USB-MIDI Event Packets.
//!
//! Serial MIDI messages vary in length from one byte to an unbounded number of bytes (SysEx), may omit repeated status
//! bytes (running status), and may be interrupted at any point by single-byte System Real-Time messages. USB-MIDI Event
//! Packets, on the other hand, are always 32 bits long. [`SerialToPacket`] bridges the two with a small state machine
//! and a two-byte scratch buffer, emitting at most one packet per byte fed.
//!
//! Input is untrusted: bytes that don't fit the current state are discarded and the parser waits for the next status
//! byte to resynchronize. Nothing here ever fails.

use crate::{
    configuration::{BridgeConfig, SysexStart},
    packet::{CableNumber, CodeIndexNumber, SYSEX_END, SYSEX_START, TUNE_REQUEST, UsbMidiPacket},
};

/// Describes which part of a MIDI message the parser expects next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    /// Between messages. A data byte arriving here continues the running status, if any.
    #[default]
    Idle,
    /// The status byte of a message with one data byte has been received.
    AwaitingOneParam,
    /// The status byte of a message with two data bytes has been received.
    AwaitingTwoParamsFirst,
    /// The first of two data bytes has been buffered.
    AwaitingTwoParamsSecond,
    /// Within a SysEx message, with no bytes buffered.
    SysexByte0,
    /// Within a SysEx message, with one byte buffered.
    SysexByte1,
    /// Within a SysEx message, with two bytes buffered.
    SysexByte2,
}

impl ParserState {
    fn is_sysex(self) -> bool {
        matches!(self, Self::SysexByte0 | Self::SysexByte1 | Self::SysexByte2)
    }
}

/// The state to enter next, along with the packet completed by the transition (if any).
type Transition = (ParserState, Option<UsbMidiPacket>);

/// A System Real-Time message; any byte at or above this value.
fn is_realtime(byte: u8) -> bool {
    byte >= 0xF8
}

/// Returns the state which awaits the data bytes of a message with the given status.
fn awaiting(status: u8) -> ParserState {
    match status {
        // Program Change, Channel Pressure
        0xC0..=0xDF => ParserState::AwaitingOneParam,
        // MTC Quarter Frame, Song Select
        0xF1 | 0xF3 => ParserState::AwaitingOneParam,
        _ => ParserState::AwaitingTwoParamsFirst,
    }
}

/// Converts a serial MIDI byte stream into USB-MIDI Event Packets.
///
/// The partially received message is the combination of [`ParserState`], up to two buffered data bytes, and the status
/// byte the buffered bytes belong to. The status byte of a Channel Voice message is retained after the message completes
/// so that it may be reused (running status); System Common messages cancel running status.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialToPacket {
    state: ParserState,
    pending: [u8; 2],
    status: Option<u8>,
    cable: CableNumber,
    sysex_start: SysexStart,
}

impl Default for SerialToPacket {
    fn default() -> Self {
        Self::with_config(&BridgeConfig::default())
    }
}

impl SerialToPacket {
    /// Constructs a [`SerialToPacket`] which emits packets on `cable`, using the default [`SysexStart`].
    pub fn new(cable: CableNumber) -> Self {
        Self {
            state: ParserState::Idle,
            pending: [0; 2],
            status: None,
            cable,
            sysex_start: SysexStart::default(),
        }
    }

    /// Constructs a [`SerialToPacket`] from a [`BridgeConfig`].
    pub fn with_config(config: &BridgeConfig) -> Self {
        Self {
            sysex_start: config.sysex_start,
            ..Self::new(config.cable)
        }
    }

    /// Returns the current [`ParserState`].
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Returns the cached Channel Voice status byte, if any.
    pub fn running_status(&self) -> Option<u8> {
        self.status.filter(|&status| status < 0xF0)
    }

    /// Discards any partially received message along with the running status. Call on disconnect.
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.pending = [0; 2];
        self.status = None;
    }

    /// Consumes a single byte from the wire. Returns a packet if `byte` completed one.
    pub fn feed(&mut self, byte: u8) -> Option<UsbMidiPacket> {
        // real-time messages may appear anywhere, even between the bytes of another message, which they leave intact
        if is_realtime(byte) {
            return Some(self.packet(CodeIndexNumber::SingleByte, [byte, 0, 0]));
        }

        let (next, packet) = match byte {
            0xF0..=0xF7 => self.system_common(byte),
            0x80..=0xEF => self.channel_status(byte),
            _ => self.data(self.state, byte),
        };
        self.state = next;
        packet
    }

    fn packet(&self, code_index_number: CodeIndexNumber, data: [u8; 3]) -> UsbMidiPacket {
        UsbMidiPacket::new(self.cable, code_index_number, data)
    }

    fn abort_sysex(&self, byte: u8) {
        if self.state.is_sysex() {
            #[cfg(feature = "defmt")]
            defmt::warn!("SysEx interrupted by status byte {:#04x}; discarding buffered bytes", byte);
            #[cfg(not(feature = "defmt"))]
            let _ = byte;
        }
    }

    fn channel_status(&mut self, status: u8) -> Transition {
        self.abort_sysex(status);
        self.status = Some(status);
        (awaiting(status), None)
    }

    fn system_common(&mut self, status: u8) -> Transition {
        if status == SYSEX_END {
            return self.end_sysex();
        }

        self.abort_sysex(status);
        // System Common messages cancel running status
        self.status = None;
        match status {
            SYSEX_START => match self.sysex_start {
                SysexStart::Omitted => {
                    self.pending = [0; 2];
                    (ParserState::SysexByte0, None)
                }
                SysexStart::Included => {
                    self.pending[0] = SYSEX_START;
                    (ParserState::SysexByte1, None)
                }
            },
            0xF1..=0xF3 => {
                self.status = Some(status);
                (awaiting(status), None)
            }
            TUNE_REQUEST => (
                ParserState::Idle,
                Some(self.packet(
                    CodeIndexNumber::SingleByteSystemCommonOrSysExEnd,
                    [TUNE_REQUEST, 0, 0],
                )),
            ),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::info!("Ignoring undefined System Common status {:#04x}", status);
                (ParserState::Idle, None)
            }
        }
    }

    fn end_sysex(&mut self) -> Transition {
        self.status = None;
        let [first, second] = self.pending;
        let packet = match self.state {
            ParserState::SysexByte0 => self.packet(
                CodeIndexNumber::SingleByteSystemCommonOrSysExEnd,
                [SYSEX_END, 0, 0],
            ),
            ParserState::SysexByte1 => {
                self.packet(CodeIndexNumber::SysExEndsWithTwoBytes, [first, SYSEX_END, 0])
            }
            ParserState::SysexByte2 => self.packet(
                CodeIndexNumber::SysExEndsWithThreeBytes,
                [first, second, SYSEX_END],
            ),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Discarding SysEx end outside of SysEx");
                return (ParserState::Idle, None);
            }
        };
        (ParserState::Idle, Some(packet))
    }

    /// Handles a data byte as though the parser were in `state`.
    fn data(&mut self, state: ParserState, byte: u8) -> Transition {
        match state {
            ParserState::Idle => match self.status {
                // running status: the data byte begins another message of the same type
                Some(status) => self.data(awaiting(status), byte),
                None => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("Discarding data byte {:#04x} received without a status", byte);
                    (ParserState::Idle, None)
                }
            },
            ParserState::AwaitingOneParam => self.complete_one(byte),
            ParserState::AwaitingTwoParamsFirst => {
                self.pending[0] = byte;
                (ParserState::AwaitingTwoParamsSecond, None)
            }
            ParserState::AwaitingTwoParamsSecond => self.complete_two(byte),
            ParserState::SysexByte0 => {
                self.pending[0] = byte;
                (ParserState::SysexByte1, None)
            }
            ParserState::SysexByte1 => {
                self.pending[1] = byte;
                (ParserState::SysexByte2, None)
            }
            ParserState::SysexByte2 => {
                let [first, second] = self.pending;
                (
                    ParserState::SysexByte0,
                    Some(self.packet(CodeIndexNumber::SysExStartOrContinue, [first, second, byte])),
                )
            }
        }
    }

    fn complete_one(&mut self, byte: u8) -> Transition {
        let Some(status) = self.status else {
            return (ParserState::Idle, None);
        };
        let code_index_number = match CodeIndexNumber::for_channel_status(status) {
            Some(code_index_number) => code_index_number,
            None => {
                self.status = None;
                CodeIndexNumber::SystemCommonTwoBytes
            }
        };
        (
            ParserState::Idle,
            Some(self.packet(code_index_number, [status, byte, 0])),
        )
    }

    fn complete_two(&mut self, byte: u8) -> Transition {
        let Some(status) = self.status else {
            return (ParserState::Idle, None);
        };
        let data = [status, self.pending[0], byte];
        match CodeIndexNumber::for_channel_status(status) {
            Some(code_index_number) => (
                ParserState::AwaitingTwoParamsFirst,
                Some(self.packet(code_index_number, data)),
            ),
            None => {
                self.status = None;
                (
                    ParserState::Idle,
                    Some(self.packet(CodeIndexNumber::SystemCommonThreeBytes, data)),
                )
            }
        }
    }
}
