//! DIN MIDI Bridge is [Embassy](https://embassy.dev)-based firmware for an adapter which connects instruments with a
//! 5-pin DIN MIDI port to a computer over USB. The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an F7-series STM32
//! microcontroller.
//!
//! MIDI IN is read from USART2 and presented to the host as a USB-MIDI device; packets sent by the host are written to
//! MIDI OUT. The translation itself lives in the architecture-agnostic `din_midi_bridge_lib` crate; this crate is
//! limited to wiring it to peripherals.

#![no_std]
#![no_main]

mod bridge;
mod serial;
mod usb;

use defmt::*;
use din_midi_bridge_lib::configuration::BridgeConfig;
use embassy_executor::Spawner;
use embassy_stm32::{
    Config, bind_interrupts, peripherals,
    time::Hertz,
    usart::{self, Uart},
};
use embassy_usb::{Builder, class::midi::MidiClass};
use static_cell::StaticCell;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => embassy_stm32::usb::InterruptHandler<peripherals::USB_OTG_FS>;
        USART2 => usart::InterruptHandler<peripherals::USART2>;
    }
);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing DIN MIDI Bridge");

    let bridge_config = BridgeConfig::default();

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: most peripheral clocks are derived from their bus clock, but the 48MHz clock used for USB OTG FS
            // is derived from main PLL VCO (PLLQ clock) or PLLSAI VCO (PLLSAI clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // MIDI is 8-N-1, which matches the USART defaults; only the baud rate needs changing
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = bridge_config.baud_rate;

    // per UM1974, USART2 is routed to PD5 (TX) and PD6 (RX) on connector CN9; per RM0410, DMA1 streams 6 and 5 serve
    // USART2 TX and RX respectively
    let uart = unwrap!(Uart::new(
        p.USART2,
        p.PD6,
        p.PD5,
        Irqs,
        p.DMA1_CH6,
        p.DMA1_CH5,
        uart_config,
    ));
    let (uart_tx, uart_rx) = uart.split();

    static SERIAL_RX_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
    let uart_rx = uart_rx.into_ring_buffered(SERIAL_RX_BUFFER.init([0; 64]));

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    // See docs on `vbus_detection` for details.
    config.vbus_detection = true;

    let driver = embassy_stm32::usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    // pid.codes reserves 0x0001 for testing; replace once a product ID has been allocated
    let product_id = 0x0001;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Pawpaw Works");
    config.product = Some("DIN MIDI Bridge");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    // one jack in each direction, exposed to the host as a single cable
    let class = MidiClass::new(&mut builder, 1, 1, usb::MAX_PACKET_SIZE);

    // Build the builder.
    let usb_device = builder.build();

    let (sender, receiver) = class.split();

    unwrap!(spawner.spawn(usb::usb_task(usb_device)));
    unwrap!(spawner.spawn(usb::usb_rx(receiver)));
    unwrap!(spawner.spawn(usb::usb_tx(sender)));
    unwrap!(spawner.spawn(serial::serial_rx(uart_rx)));
    unwrap!(spawner.spawn(serial::serial_tx(uart_tx)));
    unwrap!(spawner.spawn(bridge::bridge(bridge_config)));
}
