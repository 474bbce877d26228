//! Compiled-in configuration tables.
//!
//! One row per peripheral instance to set up. Edit the rows, not the
//! drivers, to change how the board comes up.

use crate::dma::{Channel, DataSize, Direction, DmaConfig, DmaStream, FifoThreshold};
use crate::usart::{BaudRate, Parity, StopBits, UsartConfig, UsartPort, WordLength};
use crate::State;

/// APB1 clock with the PLL left off: HSI straight through, no prescaling.
pub const PERIPHERAL_CLOCK_HZ: u32 = 16_000_000;

/// Stream carrying USART2 TX requests (DMA1 channel 4).
pub const USART2_TX_STREAM: DmaStream = DmaStream::Dma1Stream6;
/// Stream carrying USART2 RX requests (DMA1 channel 4).
pub const USART2_RX_STREAM: DmaStream = DmaStream::Dma1Stream5;

static USART_CONFIG: [UsartConfig; 1] = [
    UsartConfig {
        port: UsartPort::Usart2,
        word_length: WordLength::Bits8,
        stop_bits: StopBits::One,
        parity: Parity::Disabled,
        rx: State::Enabled,
        tx: State::Enabled,
        rx_dma: State::Enabled,
        tx_dma: State::Enabled,
        enable: State::Enabled,
        baud_rate: BaudRate::Bps9600,
    },
];

static DMA_CONFIG: [DmaConfig; 2] = [
    DmaConfig {
        stream: USART2_TX_STREAM,
        channel: Channel::Channel4,
        direction: Direction::MemoryToPeripheral,
        memory_size: DataSize::Bits8,
        peripheral_size: DataSize::Bits8,
        memory_increment: State::Enabled,
        peripheral_increment: State::Disabled,
        direct_mode: State::Enabled,
        fifo_threshold: FifoThreshold::Full,
    },
    DmaConfig {
        stream: USART2_RX_STREAM,
        channel: Channel::Channel4,
        direction: Direction::PeripheralToMemory,
        memory_size: DataSize::Bits8,
        peripheral_size: DataSize::Bits8,
        memory_increment: State::Enabled,
        peripheral_increment: State::Disabled,
        direct_mode: State::Enabled,
        fifo_threshold: FifoThreshold::Full,
    },
];

pub fn usart_config() -> &'static [UsartConfig] {
    &USART_CONFIG
}

pub fn dma_config() -> &'static [DmaConfig] {
    &DMA_CONFIG
}
