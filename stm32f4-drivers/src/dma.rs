//! Table-driven DMA stream setup and one-shot transfer configuration.
//!
//! `configure_transfer` arms a stream and returns straight away. Nothing
//! here waits for or reacts to the end of a transfer; callers that care
//! poll `transfer_status`.

use stm32f4_pac::device::{Device, DeviceAccess, RegisterAddress, DMA_STREAMS_COUNT};
use stm32f4_pac::register;

use crate::{Error, Result, State};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaStream {
    Dma1Stream0,
    Dma1Stream1,
    Dma1Stream2,
    Dma1Stream3,
    Dma1Stream4,
    Dma1Stream5,
    Dma1Stream6,
    Dma1Stream7,
    Dma2Stream0,
    Dma2Stream1,
    Dma2Stream2,
    Dma2Stream3,
    Dma2Stream4,
    Dma2Stream5,
    Dma2Stream6,
    Dma2Stream7,
}

impl DmaStream {
    pub const ALL: [DmaStream; DMA_STREAMS_COUNT] = [
        DmaStream::Dma1Stream0, DmaStream::Dma1Stream1, DmaStream::Dma1Stream2, DmaStream::Dma1Stream3,
        DmaStream::Dma1Stream4, DmaStream::Dma1Stream5, DmaStream::Dma1Stream6, DmaStream::Dma1Stream7,
        DmaStream::Dma2Stream0, DmaStream::Dma2Stream1, DmaStream::Dma2Stream2, DmaStream::Dma2Stream3,
        DmaStream::Dma2Stream4, DmaStream::Dma2Stream5, DmaStream::Dma2Stream6, DmaStream::Dma2Stream7,
    ];

    /// Register map index.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for DmaStream {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or(Error::InvalidInstance(index))
    }
}

setting! {
    /// Request line routed to the stream.
    Channel {
        Channel0,
        Channel1,
        Channel2,
        Channel3,
        Channel4,
        Channel5,
        Channel6,
        Channel7,
    }
}

setting! {
    Direction {
        PeripheralToMemory,
        MemoryToPeripheral,
        MemoryToMemory,
    }
}

setting! {
    DataSize {
        Bits8,
        Bits16,
        Bits32,
    }
}

setting! {
    FifoThreshold {
        Quarter,
        Half,
        ThreeQuarters,
        Full,
    }
}

/// One row of the DMA configuration table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaConfig {
    pub stream: DmaStream,
    pub channel: Channel,
    pub direction: Direction,
    pub memory_size: DataSize,
    pub peripheral_size: DataSize,
    pub memory_increment: State,
    pub peripheral_increment: State,
    /// Direct mode bypasses the FIFO; disabling it turns the FIFO on.
    pub direct_mode: State,
    pub fifo_threshold: FifoThreshold,
}

/// Parameters of a single transfer. Built by the caller per transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaTransfer {
    pub stream: DmaStream,
    /// Peripheral register address, e.g. a USART data register.
    pub peripheral: RegisterAddress,
    /// Memory buffer address.
    pub memory: u32,
    /// Number of data items, in units of the peripheral data size.
    pub length: u32,
}

/// Snapshot of a stream's LISR/HISR flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferStatus {
    pub complete: bool,
    pub half: bool,
    pub error: bool,
    pub direct_mode_error: bool,
    pub fifo_error: bool,
}

fn channel(value: Channel) -> register::ChannelSelect {
    use register::ChannelSelect::*;

    match value {
        Channel::Channel0 => Channel0,
        Channel::Channel1 => Channel1,
        Channel::Channel2 => Channel2,
        Channel::Channel3 => Channel3,
        Channel::Channel4 => Channel4,
        Channel::Channel5 => Channel5,
        Channel::Channel6 => Channel6,
        Channel::Channel7 => Channel7,
    }
}

fn direction(value: Direction) -> register::TransferDirection {
    match value {
        Direction::PeripheralToMemory => register::TransferDirection::PeripheralToMemory,
        Direction::MemoryToPeripheral => register::TransferDirection::MemoryToPeripheral,
        Direction::MemoryToMemory     => register::TransferDirection::MemoryToMemory,
    }
}

fn data_size(value: DataSize) -> register::DataSize {
    match value {
        DataSize::Bits8  => register::DataSize::Byte,
        DataSize::Bits16 => register::DataSize::HalfWord,
        DataSize::Bits32 => register::DataSize::Word,
    }
}

/// DMDIS is the inverse of "direct mode enabled".
fn direct_mode_disable(value: State) -> u8 {
    match value {
        State::Enabled  => 0,
        State::Disabled => 1,
    }
}

fn fifo_threshold(value: FifoThreshold) -> register::FifoThreshold {
    match value {
        FifoThreshold::Quarter       => register::FifoThreshold::Quarter,
        FifoThreshold::Half          => register::FifoThreshold::Half,
        FifoThreshold::ThreeQuarters => register::FifoThreshold::ThreeQuarters,
        FifoThreshold::Full          => register::FifoThreshold::Full,
    }
}

/// Apply every entry of `table`, in order. Streams not named in the table
/// are left alone. Leaves SxCR.EN as it was: a stream that is already
/// running ignores the new configuration.
pub fn init<A: DeviceAccess>(device: &Device<A>, table: &[DmaConfig]) -> Result<()> {
    for entry in table {
        init_stream(device, entry)?;
    }

    info!("dma: {} streams configured", table.len());

    Ok(())
}

fn init_stream<A: DeviceAccess>(device: &Device<A>, entry: &DmaConfig) -> Result<()> {
    let stream = device.stream(entry.stream.index());

    debug!("dma: {} {} {}", entry.stream, entry.channel, entry.direction);

    stream.cr().modify(|m| m
        .with_CHSEL(channel(entry.channel))
        .with_DIR(direction(entry.direction))
        .with_MSIZE(data_size(entry.memory_size))
        .with_PSIZE(data_size(entry.peripheral_size))
        .with_MINC(entry.memory_increment.bit())
        .with_PINC(entry.peripheral_increment.bit())
    )?;

    stream.fcr().modify(|m| m
        .with_DMDIS(direct_mode_disable(entry.direct_mode))
        .with_FTH(fifo_threshold(entry.fifo_threshold))
    )?;

    Ok(())
}

/// Load addresses and count into the stream, then set EN. Touches only
/// SxM0AR, SxPAR, SxNDTR and SxCR. The length must be 1..=65535: with
/// NDTR = 0 the stream would not start.
pub fn configure_transfer<A: DeviceAccess>(device: &Device<A>, transfer: &DmaTransfer) -> Result<()> {
    let length = match u16::try_from(transfer.length) {
        Ok(length) if length > 0 => length,
        _ => return Err(Error::TransferLength(transfer.length)),
    };
    let stream = device.stream(transfer.stream.index());

    trace!("dma: {} arm {=u32:#x} <-> {=u32:#x} x{}", transfer.stream, transfer.memory, transfer.peripheral, length);

    stream.m0ar().write(|w| w.with_M0A(transfer.memory))?;
    stream.par().write(|w| w.with_PA(transfer.peripheral))?;
    stream.ndtr().write(|w| w.with_NDT(length))?;
    stream.cr().modify(|m| m.with_EN(1))?;

    Ok(())
}

pub fn transfer_status<A: DeviceAccess>(device: &Device<A>, stream: DmaStream) -> Result<TransferStatus> {
    let stream = device.stream(stream.index());
    let n = stream.status_index();
    let isr = stream.isr().read()?;

    Ok(TransferStatus {
        complete: isr.transfer_complete(n),
        half: isr.half_transfer(n),
        error: isr.transfer_error(n),
        direct_mode_error: isr.direct_mode_error(n),
        fifo_error: isr.fifo_error(n),
    })
}

/// Clear every flag of `stream`. Required before re-arming a stream that
/// has completed.
pub fn clear_status<A: DeviceAccess>(device: &Device<A>, stream: DmaStream) -> Result<()> {
    let stream = device.stream(stream.index());
    let n = stream.status_index();
    stream.ifcr().write(|w| w.with_all(n))?;

    Ok(())
}
