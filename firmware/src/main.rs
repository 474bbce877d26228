#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_halt as _;

use stm32f4_drivers::config::{self, USART2_RX_STREAM, USART2_TX_STREAM};
use stm32f4_drivers::dma::{self, DmaTransfer};
use stm32f4_drivers::usart::{self, Timeout, UsartPort};
use stm32f4_drivers::Result;

mod gpio;
mod mmio;
mod rcc;

use mmio::{Access, Device};

static GREETING: &[u8; 14] = b"Hello World!\r\n";

/// ~1 s of polling at 16 MHz, far longer than a 9600 baud frame.
const POLL_TIMEOUT: Timeout = Timeout::Polls(1_000_000);

fn configure(device: &Device) -> Result<()> {
    rcc::enable_usart2_clocks(device)?;
    gpio::configure_usart2_pins(device)?;

    usart::init(device, config::usart_config(), config::PERIPHERAL_CLOCK_HZ)?;
    dma::init(device, config::dma_config())?;

    Ok(())
}

fn usart2_data_register(device: &Device) -> u32 {
    device.usart(UsartPort::Usart2.index()).dr().address()
}

fn start_transmit(device: &Device) -> Result<()> {
    dma::clear_status(device, USART2_TX_STREAM)?;
    dma::configure_transfer(device, &DmaTransfer {
        stream: USART2_TX_STREAM,
        peripheral: usart2_data_register(device),
        memory: GREETING.as_ptr() as u32,
        length: GREETING.len() as u32,
    })
}

fn start_receive(device: &Device, buffer: &mut [u8]) -> Result<()> {
    dma::clear_status(device, USART2_RX_STREAM)?;
    dma::configure_transfer(device, &DmaTransfer {
        stream: USART2_RX_STREAM,
        peripheral: usart2_data_register(device),
        memory: buffer.as_mut_ptr() as u32,
        length: buffer.len() as u32,
    })
}

#[entry]
fn main() -> ! {
    let device = Device::new(unsafe { Access::new() });

    if configure(&device).is_err() {
        loop {}
    }

    defmt::info!("usart2 up at {} Hz peripheral clock", config::PERIPHERAL_CLOCK_HZ);

    // Polled first, so there's something on the wire even if DMA is broken.
    if usart::transmit(&device, UsartPort::Usart2, b"boot\r\n", POLL_TIMEOUT)
        .and_then(|_| usart::flush(&device, UsartPort::Usart2, POLL_TIMEOUT))
        .is_err()
    {
        defmt::warn!("polled transmit failed");
    }

    let rx_buffer = match cortex_m::singleton!(: [u8; 1] = [0; 1]) {
        Some(buffer) => buffer,
        None => loop {},
    };

    if start_transmit(&device).is_err() || start_receive(&device, &mut rx_buffer[..]).is_err() {
        loop {}
    }

    loop {
        match dma::transfer_status(&device, USART2_RX_STREAM) {
            Ok(status) if status.complete => {
                let c = unsafe { rx_buffer.as_ptr().read_volatile() };
                defmt::info!("rx {=u8:#x}", c);

                if start_receive(&device, &mut rx_buffer[..]).is_err() {
                    defmt::error!("rx re-arm failed");
                }
            },
            Ok(status) if status.error => {
                defmt::error!("rx transfer error {}", status);
                if start_receive(&device, &mut rx_buffer[..]).is_err() {
                    defmt::error!("rx re-arm failed");
                }
            },
            Ok(_) => {},
            Err(e) => {
                defmt::error!("dma status: {}", e);
            },
        }

        cortex_m::asm::nop();
    }
}
