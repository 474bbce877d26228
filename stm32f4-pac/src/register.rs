#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms)]

use core::fmt;

use modular_bitfield_msb::prelude::*;

///////////////////////////////////////////////////////////////////////
// USART

/// Status register (USART_SR) - 0x00
///
/// * TXE: Transmit data register empty. Set when the content of DR has
///   been transferred into the shift register. Cleared by a write to DR.
/// * TC: Transmission complete. Set when a frame containing data has been
///   shifted out and TXE is set.
/// * RXNE: Read data register not empty. Set when received data is ready
///   to be read from DR. Cleared by a read of DR.
/// * ORE, NF, FE, PE: overrun, noise, framing and parity errors.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SR {
    #[skip] __: B22,
    pub CTS: B1,
    pub LBD: B1,
    pub TXE: B1,
    pub TC: B1,
    pub RXNE: B1,
    pub IDLE: B1,
    pub ORE: B1,
    pub NF: B1,
    pub FE: B1,
    pub PE: B1,
}

impl Default for SR {
    fn default() -> Self {
        SR::from(0x0000_00c0)
    }
}

/// Data register (USART_DR) - 0x04
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct DR {
    #[skip] __: B23,
    pub DR: B9,
}

/// Baud rate register (USART_BRR) - 0x08
///
/// With OVER8 = 0 the divider is `USARTDIV = f_PCLK / baud`, expressed as a
/// 12-bit mantissa and a 4-bit fraction in sixteenths. The concatenation of
/// the two fields is the 16x oversampling divisor itself.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct BRR {
    #[skip] __: B16,
    pub DIV_Mantissa: B12,
    pub DIV_Fraction: B4,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=1]
pub enum WordLength {
    /// 1 start bit, 8 data bits, n stop bits
    DataBits8 = 0b0,
    /// 1 start bit, 9 data bits, n stop bits
    DataBits9 = 0b1,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=1]
pub enum ParitySelection {
    Even = 0b0,
    Odd = 0b1,
}

/// Control register 1 (USART_CR1) - 0x0c
///
/// * UE: USART enable. When cleared, the prescalers and outputs are
///   stopped at the end of the current byte transfer.
/// * M: Word length.
/// * PCE: Parity control enable. The computed parity is inserted at the
///   MSB position (9th bit if M=1, 8th bit if M=0).
/// * PS: Parity selection, effective when PCE is set.
/// * TE, RE: Transmitter and receiver enable.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct CR1 {
    #[skip] __: B16,
    pub OVER8: B1,
    #[skip] __: B1,
    pub UE: B1,
    pub M: WordLength,
    pub WAKE: B1,
    pub PCE: B1,
    pub PS: ParitySelection,
    pub PEIE: B1,
    pub TXEIE: B1,
    pub TCIE: B1,
    pub RXNEIE: B1,
    pub IDLEIE: B1,
    pub TE: B1,
    pub RE: B1,
    pub RWU: B1,
    pub SBK: B1,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=2]
pub enum StopBits {
    One = 0b00,
    Half = 0b01,
    Two = 0b10,
    OneAndHalf = 0b11,
}

/// Control register 2 (USART_CR2) - 0x10
///
/// * STOP: number of stop bits. The 0.5 and 1.5 settings are not available
///   on UART4/UART5 (not present on this part anyway).
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct CR2 {
    #[skip] __: B17,
    pub LINEN: B1,
    pub STOP: StopBits,
    pub CLKEN: B1,
    pub CPOL: B1,
    pub CPHA: B1,
    pub LBCL: B1,
    #[skip] __: B1,
    pub LBDIE: B1,
    pub LBDL: B1,
    #[skip] __: B1,
    pub ADD: B4,
}

/// Control register 3 (USART_CR3) - 0x14
///
/// * DMAT: DMA enable transmitter. A DMA request is raised whenever TXE is
///   set.
/// * DMAR: DMA enable receiver. A DMA request is raised whenever RXNE is
///   set.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct CR3 {
    #[skip] __: B20,
    pub ONEBIT: B1,
    pub CTSIE: B1,
    pub CTSE: B1,
    pub RTSE: B1,
    pub DMAT: B1,
    pub DMAR: B1,
    pub SCEN: B1,
    pub NACK: B1,
    pub HDSEL: B1,
    pub IRLP: B1,
    pub IREN: B1,
    pub EIE: B1,
}

///////////////////////////////////////////////////////////////////////
// DMA

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=3]
pub enum ChannelSelect {
    Channel0 = 0b000,
    Channel1 = 0b001,
    Channel2 = 0b010,
    Channel3 = 0b011,
    Channel4 = 0b100,
    Channel5 = 0b101,
    Channel6 = 0b110,
    Channel7 = 0b111,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=2]
pub enum DataSize {
    Byte = 0b00,
    HalfWord = 0b01,
    Word = 0b10,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=2]
pub enum TransferDirection {
    PeripheralToMemory = 0b00,
    MemoryToPeripheral = 0b01,
    /// Only DMA2 streams can perform memory-to-memory transfers.
    MemoryToMemory = 0b10,
}

/// Stream x configuration register (DMA_SxCR) - 0x10 + 0x18 * x
///
/// Every field except EN is write-protected while EN is set. Software
/// must clear EN and wait for it to read back zero before reconfiguring
/// the stream.
///
/// * CHSEL: channel (request line) selection.
/// * MSIZE, PSIZE: memory and peripheral data sizes. In direct mode MSIZE
///   is forced to PSIZE by hardware as soon as EN is set.
/// * MINC, PINC: memory and peripheral address increment after each
///   data transfer.
/// * DIR: data transfer direction.
/// * EN: stream enable. Cleared by hardware at the end of a transfer or on
///   a transfer error.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxCR {
    #[skip] __: B4,
    pub CHSEL: ChannelSelect,
    pub MBURST: B2,
    pub PBURST: B2,
    #[skip] __: B1,
    pub CT: B1,
    pub DBM: B1,
    pub PL: B2,
    pub PINCOS: B1,
    pub MSIZE: DataSize,
    pub PSIZE: DataSize,
    pub MINC: B1,
    pub PINC: B1,
    pub CIRC: B1,
    pub DIR: TransferDirection,
    pub PFCTRL: B1,
    pub TCIE: B1,
    pub HTIE: B1,
    pub TEIE: B1,
    pub DMEIE: B1,
    pub EN: B1,
}

/// Stream x number of data register (DMA_SxNDTR) - 0x14 + 0x18 * x
///
/// Number of data items (of PSIZE) still to be transferred. Writable
/// only while the stream is disabled.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxNDTR {
    #[skip] __: B16,
    pub NDT: B16,
}

/// Stream x peripheral address register (DMA_SxPAR) - 0x18 + 0x18 * x
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxPAR {
    pub PA: B32,
}

/// Stream x memory 0 address register (DMA_SxM0AR) - 0x1c + 0x18 * x
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxM0AR {
    pub M0A: B32,
}

/// Stream x memory 1 address register (DMA_SxM1AR) - 0x20 + 0x18 * x
///
/// Only used in double-buffer mode.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxM1AR {
    pub M1A: B32,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=2]
pub enum FifoThreshold {
    Quarter = 0b00,
    Half = 0b01,
    ThreeQuarters = 0b10,
    Full = 0b11,
}

/// Stream x FIFO control register (DMA_SxFCR) - 0x24 + 0x18 * x
///
/// * FS: FIFO status (read-only).
/// * DMDIS: Direct mode disable. 0 = direct mode, 1 = FIFO mode.
///   Forced to 1 by hardware for memory-to-memory transfers.
/// * FTH: FIFO threshold selection, only meaningful with DMDIS = 1.
///
#[bitfield(bits=32)]
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub struct SxFCR {
    #[skip] __: B24,
    pub FEIE: B1,
    #[skip] __: B1,
    pub FS: B3,
    pub DMDIS: B1,
    pub FTH: FifoThreshold,
}

impl Default for SxFCR {
    fn default() -> Self {
        SxFCR::from(0x0000_0021)
    }
}

/// Bit offsets of each stream's six-bit flag group within LISR/HISR and
/// LIFCR/HIFCR. Streams 0..3 live in the low registers, 4..7 in the high.
const STREAM_FLAG_SHIFT: [u32; 4] = [0, 6, 16, 22];

const FEIF: u32 = 1 << 0;
const DMEIF: u32 = 1 << 2;
const TEIF: u32 = 1 << 3;
const HTIF: u32 = 1 << 4;
const TCIF: u32 = 1 << 5;
const ALL_FLAGS: u32 = FEIF | DMEIF | TEIF | HTIF | TCIF;

/// Low/high interrupt status register (DMA_LISR/DMA_HISR) - 0x00/0x04
///
/// The flag groups are not evenly spaced, so this isn't expressed as a
/// bitfield struct.
///
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct InterruptStatus(u32);

impl InterruptStatus {
    fn flags(&self, index: usize) -> u32 {
        assert!(index < STREAM_FLAG_SHIFT.len());
        (self.0 >> STREAM_FLAG_SHIFT[index]) & ALL_FLAGS
    }

    pub fn transfer_complete(&self, index: usize) -> bool {
        self.flags(index) & TCIF != 0
    }

    pub fn half_transfer(&self, index: usize) -> bool {
        self.flags(index) & HTIF != 0
    }

    pub fn transfer_error(&self, index: usize) -> bool {
        self.flags(index) & TEIF != 0
    }

    pub fn direct_mode_error(&self, index: usize) -> bool {
        self.flags(index) & DMEIF != 0
    }

    pub fn fifo_error(&self, index: usize) -> bool {
        self.flags(index) & FEIF != 0
    }
}

impl From<u32> for InterruptStatus {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<InterruptStatus> for u32 {
    fn from(value: InterruptStatus) -> Self {
        value.0
    }
}

impl fmt::Debug for InterruptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ISR:[")?;
        for index in (0..STREAM_FLAG_SHIFT.len()).rev() {
            write!(f, " {:06b}", self.flags(index))?;
        }
        write!(f, " ]")
    }
}

/// Low/high interrupt flag clear register (DMA_LIFCR/DMA_HIFCR) - 0x08/0x0c
///
/// Write-only: writing 1 to a bit clears the matching flag in LISR/HISR,
/// writing 0 has no effect.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterruptFlagClear(u32);

impl InterruptFlagClear {
    /// Clear every flag of the stream at `index` within this register.
    pub fn with_all(self, index: usize) -> Self {
        assert!(index < STREAM_FLAG_SHIFT.len());
        Self(self.0 | (ALL_FLAGS << STREAM_FLAG_SHIFT[index]))
    }
}

impl From<u32> for InterruptFlagClear {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<InterruptFlagClear> for u32 {
    fn from(value: InterruptFlagClear) -> Self {
        value.0
    }
}
