#![cfg_attr(not(any(test, feature = "sim")), no_std)]

//! Table-driven USART and DMA drivers for the STM32F401.
//!
//! Each driver takes a compiled-in configuration table, translates every
//! entry into register read-modify-writes through [`stm32f4_pac`], and
//! offers a transfer operation on top of the configured registers:
//! blocking polled transmit/receive for the USART, one-shot stream setup
//! for DMA.

#[macro_use]
mod log;
#[macro_use]
mod setting;

pub mod config;
pub mod dma;
mod error;
pub mod raw;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod usart;

pub use error::{Error, Result};
pub use setting::State;
pub use stm32f4_pac as pac;
