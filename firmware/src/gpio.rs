//! USART2 pin muxing: PA2 (TX) and PA3 (RX) to AF7, push-pull, low speed,
//! pull-up.

use stm32f4_drivers::{raw, Result};

use crate::mmio::Device;

const GPIOA_BASE: u32 = 0x4002_0000;

const MODER: u32 = GPIOA_BASE + 0x00;
const OTYPER: u32 = GPIOA_BASE + 0x04;
const OSPEEDR: u32 = GPIOA_BASE + 0x08;
const PUPDR: u32 = GPIOA_BASE + 0x0c;
const AFRL: u32 = GPIOA_BASE + 0x20;

const MODE_ALTERNATE: u32 = 0b10;
const SPEED_LOW: u32 = 0b00;
const PULL_UP: u32 = 0b01;
const AF7: u32 = 7;

const USART2_PINS: [u32; 2] = [2, 3];

pub fn configure_usart2_pins(device: &Device) -> Result<()> {
    for pin in USART2_PINS {
        let two = pin * 2;
        let four = pin * 4;

        raw::register_modify(device, AFRL, 0xf << four, AF7 << four)?;
        raw::register_modify(device, OTYPER, 1 << pin, 0)?;
        raw::register_modify(device, OSPEEDR, 0b11 << two, SPEED_LOW << two)?;
        raw::register_modify(device, PUPDR, 0b11 << two, PULL_UP << two)?;
        raw::register_modify(device, MODER, 0b11 << two, MODE_ALTERNATE << two)?;
    }

    Ok(())
}
