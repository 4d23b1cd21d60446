//! The polling loop which owns the [`Bridge`], plus the queues connecting it to the peripheral tasks.
//!
//! Peripheral tasks only move bytes and packets in and out of these queues. All MIDI translation happens in the single
//! [`bridge`] task, so the parser state never needs a lock.

use defmt::*;
use din_midi_bridge_lib::{
    bridge::Bridge,
    configuration::BridgeConfig,
    packet::UsbMidiPacket,
    transport::{ByteSink, ByteSource, PacketSink, PacketSource},
};
use embassy_futures::{
    select::{Either3, select3},
    yield_now,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use tinyvec::ArrayVec;

/// Largest number of USB-MIDI Event Packets sent in one transfer (a 64-byte full-speed bulk packet).
pub const TRANSFER_PACKET_CNT: usize = 16;

/// Packets committed together by a single [`PacketSink::flush`].
pub type Transfer = ArrayVec<[UsbMidiPacket; TRANSFER_PACKET_CNT]>;

const SERIAL_QUEUE_LEN: usize = 64;
const USB_QUEUE_LEN: usize = 16;
const TRANSFER_QUEUE_LEN: usize = 4;

/// Bytes received over serial MIDI, awaiting translation.
pub static SERIAL_IN: Channel<CriticalSectionRawMutex, u8, SERIAL_QUEUE_LEN> = Channel::new();
/// Translated bytes awaiting transmission over serial MIDI.
pub static SERIAL_OUT: Channel<CriticalSectionRawMutex, u8, SERIAL_QUEUE_LEN> = Channel::new();
/// Packets received from the USB host, awaiting translation.
pub static USB_IN: Channel<CriticalSectionRawMutex, UsbMidiPacket, USB_QUEUE_LEN> = Channel::new();
/// Translated packets awaiting transmission to the USB host.
pub static USB_OUT: Channel<CriticalSectionRawMutex, Transfer, TRANSFER_QUEUE_LEN> = Channel::new();

/// Raised when the USB host goes away, so that the partially received serial message can be discarded.
pub static USB_DISCONNECTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// An outbound queue had no room; the data was dropped.
#[derive(Debug, Format)]
pub struct QueueFull;

/// The serial side of the bridge, as seen through [`SERIAL_IN`] and [`SERIAL_OUT`].
struct SerialQueues;

impl ByteSource for SerialQueues {
    fn read_byte(&mut self) -> Option<u8> {
        SERIAL_IN.try_receive().ok()
    }
}

impl ByteSink for SerialQueues {
    type Error = QueueFull;

    fn available(&self) -> usize {
        SERIAL_OUT.free_capacity()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        SERIAL_OUT.try_send(byte).map_err(|_| QueueFull)
    }
}

/// The USB side of the bridge, as seen through [`USB_IN`] and [`USB_OUT`].
///
/// Sent packets are staged until flushed, at which point they are handed to the USB task as a single transfer.
#[derive(Default)]
struct UsbQueues {
    staged: Transfer,
}

impl PacketSource for UsbQueues {
    fn receive_packet(&mut self) -> Option<UsbMidiPacket> {
        USB_IN.try_receive().ok()
    }
}

impl PacketSink for UsbQueues {
    type Error = QueueFull;

    fn send_packet(&mut self, packet: UsbMidiPacket) -> Result<(), Self::Error> {
        match self.staged.try_push(packet) {
            None => Ok(()),
            Some(_) => Err(QueueFull),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let transfer = core::mem::take(&mut self.staged);
        USB_OUT.try_send(transfer).map_err(|_| QueueFull)
    }
}

/// Task responsible for all MIDI translation.
///
/// Each iteration drains whatever input is available in both directions, then sleeps until more arrives. While a packet
/// from the host is waiting for room in [`SERIAL_OUT`], the task waits on that queue instead of [`USB_IN`], leaving
/// [`USB_IN`] to fill up and back-pressure the host.
#[embassy_executor::task]
pub async fn bridge(config: BridgeConfig) -> ! {
    info!("Bridging serial MIDI with {}", config);
    let mut bridge = Bridge::new(&config);
    let mut serial = SerialQueues;
    let mut usb = UsbQueues::default();

    loop {
        if let Err(QueueFull) = bridge.poll(&mut serial, &mut usb) {
            warn!("USB transfer queue full; dropping MIDI data");
            // give the transmitting tasks a chance to catch up before polling again
            yield_now().await;
            continue;
        }

        let stalled = bridge.has_undelivered();
        let usb_ready = async move {
            if stalled {
                core::future::poll_fn(|cx| SERIAL_OUT.poll_ready_to_send(cx)).await
            } else {
                USB_IN.ready_to_receive().await
            }
        };

        match select3(
            SERIAL_IN.ready_to_receive(),
            usb_ready,
            USB_DISCONNECTED.wait(),
        )
        .await
        {
            Either3::First(_) | Either3::Second(_) => {}
            Either3::Third(_) => {
                info!("Discarding partial serial message after USB disconnect");
                bridge.reset();
            }
        }
    }
}
