//! Ties both translation directions to their collaborators.

use crate::{
    configuration::BridgeConfig,
    packet::UsbMidiPacket,
    packet_to_serial::PacketToSerial,
    serial_to_packet::SerialToPacket,
    transport::{ByteSink, ByteSource, PacketSink, PacketSource},
};

/// Owns the translation state for one serial MIDI port and the USB-MIDI cable it is exposed on.
///
/// The two directions share nothing but the cable number. The serial-to-USB direction keeps parser state; the
/// USB-to-serial direction holds at most one packet the serial sink had no room for. The `Bridge` is the sole owner of
/// both, so it must be driven from a single task; wrap it in a mutex if more than one context needs to reach it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bridge {
    serial_to_packet: SerialToPacket,
    packet_to_serial: PacketToSerial,
    undelivered: Option<UsbMidiPacket>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(&BridgeConfig::default())
    }
}

impl Bridge {
    /// Constructs a [`Bridge`].
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            serial_to_packet: SerialToPacket::with_config(config),
            packet_to_serial: PacketToSerial::new(config.cable),
            undelivered: None,
        }
    }

    /// Read-only access to the serial-to-USB parser.
    pub fn serial_to_packet(&self) -> &SerialToPacket {
        &self.serial_to_packet
    }

    /// Whether a packet is waiting for room in the serial sink. While it waits, no further packets are taken from the
    /// USB source.
    pub fn has_undelivered(&self) -> bool {
        self.undelivered.is_some()
    }

    /// Discards any partially received serial message. Call when the USB host disconnects.
    pub fn reset(&mut self) {
        self.serial_to_packet.reset();
    }

    /// Translates every byte currently available from `source`, flushing `sink` after each packet sent.
    ///
    /// Returns the number of packets sent. On error, bytes read before the failure have already been consumed.
    pub fn pump_serial<Source, Sink>(
        &mut self,
        source: &mut Source,
        sink: &mut Sink,
    ) -> Result<usize, Sink::Error>
    where
        Source: ByteSource + ?Sized,
        Sink: PacketSink + ?Sized,
    {
        let mut sent = 0;
        while let Some(byte) = source.read_byte() {
            if let Some(packet) = self.serial_to_packet.feed(byte) {
                sink.send_packet(packet)?;
                sink.flush()?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Translates every packet currently available from `source`.
    ///
    /// A packet is only written once `sink` has room for all of its bytes. Otherwise it is held back, along with
    /// everything still in `source`, until the next call. Returns the number of bytes written.
    pub fn pump_usb<Source, Sink>(
        &mut self,
        source: &mut Source,
        sink: &mut Sink,
    ) -> Result<usize, Sink::Error>
    where
        Source: PacketSource + ?Sized,
        Sink: ByteSink + ?Sized,
    {
        let mut written = 0;
        while let Some(packet) = self.undelivered.take().or_else(|| source.receive_packet()) {
            let bytes = self.packet_to_serial.decode(&packet);
            if sink.available() < bytes.len() {
                self.undelivered = Some(packet);
                break;
            }
            for byte in bytes {
                sink.write_byte(byte)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// A single iteration of the polling loop: drains serial input, then USB input.
    pub fn poll<Serial, Usb, Error>(&mut self, serial: &mut Serial, usb: &mut Usb) -> Result<(), Error>
    where
        Serial: ByteSource + ByteSink<Error = Error> + ?Sized,
        Usb: PacketSource + PacketSink<Error = Error> + ?Sized,
    {
        self.pump_serial(serial, usb)?;
        self.pump_usb(usb, serial)?;
        Ok(())
    }
}
