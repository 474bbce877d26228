#![no_std]

//! Register-level access to the STM32F401 USART and DMA peripherals.

pub mod device;
pub mod register;
