//! This crate contains architecture-agnostic logic for the DIN MIDI Bridge, a device which connects instruments with
//! a 5-pin DIN [MIDI](https://midi.org/midi-1-0) port to a computer over USB by translating between the serial MIDI
//! byte stream and [USB-MIDI](https://www.usb.org/sites/default/files/midi10.pdf) Event Packets.
//!
//! The two directions are independent:
//! - [`SerialToPacket`](serial_to_packet::SerialToPacket) reassembles messages from the serial byte stream, honoring
//!   running status, interleaved real-time bytes, and System Exclusive runs, and frames each as a packet.
//! - [`PacketToSerial`](packet_to_serial::PacketToSerial) unpacks each packet into the right number of serial bytes.
//!
//! [`Bridge`](bridge::Bridge) drives both against the collaborators described in [`transport`].

#![deny(missing_docs)]
#![no_std]

pub mod bridge;
pub mod configuration;
pub mod packet;
pub mod packet_to_serial;
pub mod serial_to_packet;
pub mod transport;
