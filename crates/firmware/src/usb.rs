//! Tasks moving USB-MIDI Event Packets between the USB host and the bridge.

use crate::bridge::{USB_DISCONNECTED, USB_IN, USB_OUT};
use defmt::{panic, *};
use din_midi_bridge_lib::packet::{EVENT_PACKET_SIZE, packets_from_bytes};
use embassy_stm32::{peripherals, usb};
use embassy_usb::{
    UsbDevice,
    class::midi::{Receiver, Sender},
    driver::EndpointError,
};

pub type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// Maximum packet size of the MIDI streaming endpoints.
pub const MAX_PACKET_SIZE: u16 = 64;

#[embassy_executor::task]
pub async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Task responsible for receiving packets from the host.
#[embassy_executor::task]
pub async fn usb_rx(mut receiver: Receiver<'static, UsbDriver>) -> ! {
    loop {
        receiver.wait_connection().await;
        info!("USB connected");
        let _ = receive(&mut receiver).await;
        info!("USB disconnected");
        USB_DISCONNECTED.signal(());
    }
}

/// Task responsible for sending packets to the host.
#[embassy_executor::task]
pub async fn usb_tx(mut sender: Sender<'static, UsbDriver>) -> ! {
    loop {
        sender.wait_connection().await;
        // anything queued while disconnected was translated for the previous session
        while USB_OUT.try_receive().is_ok() {}
        let _ = transmit(&mut sender).await;
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Helper function which splits data received over USB into packets and queues them for translation.
async fn receive(receiver: &mut Receiver<'static, UsbDriver>) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE as usize];
    loop {
        let n = receiver.read_packet(&mut buf).await?;
        for packet in packets_from_bytes(&buf[..n]) {
            debug!("USB >>> MIDI {} {}", packet, Debug2Format(&packet.message()));
            USB_IN.send(packet).await;
        }
    }
}

/// Helper function which writes each committed transfer as a single USB packet.
async fn transmit(sender: &mut Sender<'static, UsbDriver>) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE as usize];
    loop {
        let transfer = USB_OUT.receive().await;
        let mut len = 0;
        for packet in transfer.iter() {
            debug!("MIDI >>> USB {} {}", packet, Debug2Format(&packet.message()));
            buf[len..len + EVENT_PACKET_SIZE].copy_from_slice(&packet.to_bytes());
            len += EVENT_PACKET_SIZE;
        }
        sender.write_packet(&buf[..len]).await?;
    }
}
