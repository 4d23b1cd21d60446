//! Tasks moving bytes between the 5-pin DIN MIDI port and the bridge.

use crate::bridge::{SERIAL_IN, SERIAL_OUT};
use defmt::*;
use embassy_stm32::{
    mode::Async,
    usart::{RingBufferedUartRx, UartTx},
};

/// Task responsible for reading the MIDI IN port.
#[embassy_executor::task]
pub async fn serial_rx(mut rx: RingBufferedUartRx<'static>) -> ! {
    let mut buf = [0_u8; 16];
    loop {
        match rx.read(&mut buf).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    SERIAL_IN.send(byte).await;
                }
            }
            // framing, noise, and overrun errors cost us the affected bytes; the parser resynchronizes on the next
            // status byte
            Err(e) => warn!("Serial receive error: {}", e),
        }
    }
}

/// Task responsible for writing the MIDI OUT port.
///
/// Bytes already waiting are written together to keep the DMA busy.
#[embassy_executor::task]
pub async fn serial_tx(mut tx: UartTx<'static, Async>) -> ! {
    let mut buf = [0_u8; 16];
    loop {
        buf[0] = SERIAL_OUT.receive().await;
        let mut n = 1;
        while n < buf.len() {
            match SERIAL_OUT.try_receive() {
                Ok(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                Err(_) => break,
            }
        }

        if let Err(e) = tx.write(&buf[..n]).await {
            warn!("Serial transmit error: {}", e);
        }
    }
}
