//! Peripheral clock enables. Only the bits this board needs.

use stm32f4_drivers::{raw, Result};

use crate::mmio::Device;

const RCC_BASE: u32 = 0x4002_3800;

const AHB1ENR: u32 = RCC_BASE + 0x30;
const APB1ENR: u32 = RCC_BASE + 0x40;

const AHB1ENR_GPIOAEN: u32 = 1 << 0;
const AHB1ENR_DMA1EN: u32 = 1 << 21;
const APB1ENR_USART2EN: u32 = 1 << 17;

pub fn enable_usart2_clocks(device: &Device) -> Result<()> {
    raw::register_modify(device, AHB1ENR, 0, AHB1ENR_GPIOAEN | AHB1ENR_DMA1EN)?;
    raw::register_modify(device, APB1ENR, 0, APB1ENR_USART2EN)?;

    // Two peripheral clock cycles before the enabled blocks answer.
    let _ = raw::register_read(device, APB1ENR)?;

    Ok(())
}
