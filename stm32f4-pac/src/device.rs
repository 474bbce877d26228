#![allow(non_snake_case)]

use core::marker::PhantomData;

use crate::register::*;

pub type RegisterAddress = u32;
pub type RegisterValue = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The access implementation refused the address (unmapped or misaligned).
    Fault(RegisterAddress),
}

pub type Result<T> = core::result::Result<T, Error>;

pub trait Bus {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue>;
    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()>;
}

pub struct Access<'a, D, T>
where D: Bus,
{
    device: &'a D,
    address: RegisterAddress,
    t: PhantomData<T>,
}

impl<'a, D, T> Access<'a, D, T>
where D: Bus,
{
    fn new(device: &'a D, address: RegisterAddress) -> Self {
        Self {
            device,
            address,
            t: PhantomData::default(),
        }
    }

    pub fn address(&self) -> RegisterAddress {
        self.address
    }
}

impl<D, T> Access<'_, D, T>
where D: Bus,
      T: From<RegisterValue>,
{
    pub fn read(&self) -> Result<T> {
        Ok(T::from(self.device.register_read(self.address)?))
    }
}

impl<D, T> Access<'_, D, T>
where D: Bus,
      T: From<RegisterValue> + Into<RegisterValue>,
{
    fn set_typed(&self, value: T) -> Result<()> {
        self.device.register_write(self.address, value.into())
    }

    /// Write the register starting from all-zeroes.
    pub fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = T::from(0);
        let new_value = f(value);
        self.set_typed(new_value)
    }

    /// Read-modify-write: bits the closure doesn't touch keep their current value.
    pub fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.read()?;
        let new_value = f(value);
        self.set_typed(new_value)
    }
}

///////////////////////////////////////////////////////////////////////
// USART

pub const USART_PORTS_COUNT: usize = 3;

pub struct Usart<'a, D>
where D: Bus,
{
    device: &'a D,
    index: usize,
}

impl<'a, D> Usart<'a, D>
where D: Bus,
{
    fn new(device: &'a D, index: usize) -> Self {
        assert!(index < USART_PORTS_COUNT);
        Self {
            device,
            index,
        }
    }

    fn access<T>(&self, offset: RegisterAddress) -> Access<'a, D, T> {
        Access::new(self.device, Addressing::usart(self.index, offset))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sr (&self) -> Access<'a, D, SR>  { self.access(0x00) }
    pub fn dr (&self) -> Access<'a, D, DR>  { self.access(0x04) }
    pub fn brr(&self) -> Access<'a, D, BRR> { self.access(0x08) }
    pub fn cr1(&self) -> Access<'a, D, CR1> { self.access(0x0c) }
    pub fn cr2(&self) -> Access<'a, D, CR2> { self.access(0x10) }
    pub fn cr3(&self) -> Access<'a, D, CR3> { self.access(0x14) }
}

pub struct Usarts<'a, D>
where D: Bus,
{
    device: &'a D,
    n: usize,
}

impl<'a, D> Usarts<'a, D>
where D: Bus,
{
    fn new(device: &'a D) -> Self {
        Self {
            device,
            n: 0,
        }
    }
}

impl<'a, D> Iterator for Usarts<'a, D>
where D: Bus,
{
    type Item = Usart<'a, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.n < USART_PORTS_COUNT {
            let result = Usart::new(self.device, self.n);
            self.n += 1;
            Some(result)
        } else {
            None
        }
    }
}

///////////////////////////////////////////////////////////////////////
// DMA stream

const DMA_CONTROLLERS_COUNT: usize = 2;
const STREAMS_PER_CONTROLLER: usize = 8;
pub const DMA_STREAMS_COUNT: usize = DMA_CONTROLLERS_COUNT * STREAMS_PER_CONTROLLER;

/// One DMA stream, numbered across both controllers: 0..8 are DMA1
/// streams 0..7, 8..16 are DMA2 streams 0..7.
pub struct Stream<'a, D>
where D: Bus,
{
    device: &'a D,
    index: usize,
}

impl<'a, D> Stream<'a, D>
where D: Bus,
{
    fn new(device: &'a D, index: usize) -> Self {
        assert!(index < DMA_STREAMS_COUNT);
        Self {
            device,
            index,
        }
    }

    fn access<T>(&self, offset: RegisterAddress) -> Access<'a, D, T> {
        Access::new(self.device, Addressing::stream(self.index, offset))
    }

    fn access_status<T>(&self, offset: RegisterAddress) -> Access<'a, D, T> {
        Access::new(self.device, Addressing::stream_status(self.index, offset))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Position of this stream's flag group within `isr()`/`ifcr()`.
    pub fn status_index(&self) -> usize {
        (self.index % STREAMS_PER_CONTROLLER) % 4
    }

    pub fn cr  (&self) -> Access<'a, D, SxCR>   { self.access(0x00) }
    pub fn ndtr(&self) -> Access<'a, D, SxNDTR> { self.access(0x04) }
    pub fn par (&self) -> Access<'a, D, SxPAR>  { self.access(0x08) }
    pub fn m0ar(&self) -> Access<'a, D, SxM0AR> { self.access(0x0c) }
    pub fn m1ar(&self) -> Access<'a, D, SxM1AR> { self.access(0x10) }
    pub fn fcr (&self) -> Access<'a, D, SxFCR>  { self.access(0x14) }

    /// LISR or HISR, whichever holds this stream's flags.
    pub fn isr (&self) -> Access<'a, D, InterruptStatus>    { self.access_status(0x00) }
    /// LIFCR or HIFCR, whichever clears this stream's flags.
    pub fn ifcr(&self) -> Access<'a, D, InterruptFlagClear> { self.access_status(0x08) }
}

pub struct Streams<'a, D>
where D: Bus,
{
    device: &'a D,
    n: usize,
}

impl<'a, D> Streams<'a, D>
where D: Bus,
{
    fn new(device: &'a D) -> Self {
        Self {
            device,
            n: 0,
        }
    }
}

impl<'a, D> Iterator for Streams<'a, D>
where D: Bus,
{
    type Item = Stream<'a, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.n < DMA_STREAMS_COUNT {
            let result = Stream::new(self.device, self.n);
            self.n += 1;
            Some(result)
        } else {
            None
        }
    }
}

///////////////////////////////////////////////////////////////////////
// Device

pub trait DeviceAccess {
    fn read(&self, address: RegisterAddress) -> Result<RegisterValue>;
    fn write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()>;
}

/// STM32F401 peripheral register space
///
/// Hands out typed handles for each USART port and DMA stream. The
/// `DeviceAccess` implementation decides what a register access means:
/// volatile memory-mapped I/O on the part, or a simulated register file
/// on the host.
///
pub struct Device<A>
where A: DeviceAccess
{
    access: A,
}

impl<A> Device<A>
where A: DeviceAccess
{
    pub fn new(access: A) -> Self {
        Self {
            access,
        }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn usarts(&self) -> Usarts<Self> {
        Usarts::new(self)
    }

    pub fn usart(&self, index: usize) -> Usart<Self> {
        Usart::new(self, index)
    }

    pub fn streams(&self) -> Streams<Self> {
        Streams::new(self)
    }

    pub fn stream(&self, index: usize) -> Stream<Self> {
        Stream::new(self, index)
    }
}

impl<A> Bus for Device<A>
where A: DeviceAccess {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue> {
        self.access.read(address)
    }

    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
        self.access.write(address, value)
    }
}

/// STM32F401 memory map addressing for the USART and DMA blocks
///
struct Addressing {}

impl Addressing {
    /// USART1, USART2, USART6
    const USART_BASE: [RegisterAddress; USART_PORTS_COUNT] = [0x4001_1000, 0x4000_4400, 0x4001_1400];

    /// DMA1, DMA2
    const DMA_BASE: [RegisterAddress; DMA_CONTROLLERS_COUNT] = [0x4002_6000, 0x4002_6400];

    fn usart(port: usize, offset: RegisterAddress) -> RegisterAddress {
        assert!(port < USART_PORTS_COUNT);
        assert!(offset < 0x1c);
        assert!(offset & 3 == 0);
        Self::USART_BASE[port] + offset
    }

    fn dma(controller: usize, offset: RegisterAddress) -> RegisterAddress {
        assert!(controller < DMA_CONTROLLERS_COUNT);
        assert!(offset < 0x400);
        Self::DMA_BASE[controller] + offset
    }

    /// Stream registers of the form 0x10 + 0x18 * stream + offset
    fn stream(stream: usize, offset: RegisterAddress) -> RegisterAddress {
        assert!(stream < DMA_STREAMS_COUNT);
        assert!(offset < 0x18);
        let n = (stream % STREAMS_PER_CONTROLLER) as RegisterAddress;
        Self::dma(stream / STREAMS_PER_CONTROLLER, 0x10 + 0x18 * n + offset)
    }

    /// Controller-wide flag registers: the low register (LISR/LIFCR) serves
    /// streams 0..3, the high one (HISR/HIFCR) at +4 serves streams 4..7.
    fn stream_status(stream: usize, offset: RegisterAddress) -> RegisterAddress {
        assert!(stream < DMA_STREAMS_COUNT);
        assert!(offset == 0x00 || offset == 0x08);
        let high = if stream % STREAMS_PER_CONTROLLER >= 4 { 0x04 } else { 0x00 };
        Self::dma(stream / STREAMS_PER_CONTROLLER, offset + high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressing_usart() {
        assert_eq!(Addressing::usart(0, 0x00), 0x4001_1000);
        assert_eq!(Addressing::usart(1, 0x04), 0x4000_4404);
        assert_eq!(Addressing::usart(1, 0x0c), 0x4000_440c);
        assert_eq!(Addressing::usart(2, 0x14), 0x4001_1414);
    }

    #[test]
    #[should_panic(expected="port < USART_PORTS_COUNT")]
    fn addressing_usart_bad_port() {
        let _ = Addressing::usart(3, 0x00);
    }

    #[test]
    #[should_panic(expected="offset < 0x1c")]
    fn addressing_usart_bad_offset() {
        let _ = Addressing::usart(0, 0x1c);
    }

    #[test]
    #[should_panic(expected="offset & 3 == 0")]
    fn addressing_usart_unaligned_offset() {
        let _ = Addressing::usart(0, 0x02);
    }

    #[test]
    fn addressing_stream() {
        assert_eq!(Addressing::stream(0, 0x00), 0x4002_6010);
        assert_eq!(Addressing::stream(5, 0x00), 0x4002_6088);
        assert_eq!(Addressing::stream(6, 0x00), 0x4002_60a0);
        assert_eq!(Addressing::stream(6, 0x14), 0x4002_60b4);
        assert_eq!(Addressing::stream(7, 0x14), 0x4002_60cc);
        assert_eq!(Addressing::stream(8, 0x00), 0x4002_6410);
        assert_eq!(Addressing::stream(15, 0x0c), 0x4002_64c4);
    }

    #[test]
    #[should_panic(expected="stream < DMA_STREAMS_COUNT")]
    fn addressing_stream_bad_stream() {
        let _ = Addressing::stream(16, 0x00);
    }

    #[test]
    #[should_panic(expected="offset < 0x18")]
    fn addressing_stream_bad_offset() {
        let _ = Addressing::stream(0, 0x18);
    }

    #[test]
    fn addressing_stream_status() {
        assert_eq!(Addressing::stream_status(0, 0x00), 0x4002_6000);
        assert_eq!(Addressing::stream_status(3, 0x08), 0x4002_6008);
        assert_eq!(Addressing::stream_status(4, 0x00), 0x4002_6004);
        assert_eq!(Addressing::stream_status(6, 0x08), 0x4002_600c);
        assert_eq!(Addressing::stream_status(13, 0x00), 0x4002_6404);
    }

    #[test]
    #[should_panic(expected="offset == 0x00 || offset == 0x08")]
    fn addressing_stream_status_bad_offset() {
        let _ = Addressing::stream_status(0, 0x04);
    }

    struct Nothing;

    impl DeviceAccess for Nothing {
        fn read(&self, address: RegisterAddress) -> Result<RegisterValue> {
            Err(Error::Fault(address))
        }

        fn write(&self, address: RegisterAddress, _value: RegisterValue) -> Result<()> {
            Err(Error::Fault(address))
        }
    }

    #[test]
    fn stream_status_index() {
        let device = Device::new(Nothing);
        let indices: [usize; DMA_STREAMS_COUNT] = [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3];
        for (stream, expected) in device.streams().zip(indices) {
            assert_eq!(stream.status_index(), expected);
        }
    }

    #[test]
    fn iterators_cover_every_instance() {
        let device = Device::new(Nothing);
        assert_eq!(device.usarts().count(), USART_PORTS_COUNT);
        assert_eq!(device.streams().count(), DMA_STREAMS_COUNT);
    }

    #[test]
    #[should_panic(expected="index < USART_PORTS_COUNT")]
    fn device_usart_bad_index() {
        let device = Device::new(Nothing);
        let _ = device.usart(USART_PORTS_COUNT);
    }

    #[test]
    #[should_panic(expected="index < DMA_STREAMS_COUNT")]
    fn device_stream_bad_index() {
        let device = Device::new(Nothing);
        let _ = device.stream(DMA_STREAMS_COUNT);
    }

    #[test]
    fn access_errors_propagate() {
        let device = Device::new(Nothing);
        let usart = device.usart(1);
        assert_eq!(usart.cr1().read().err(), Some(Error::Fault(0x4000_440c)));
        assert_eq!(usart.cr1().modify(|m| m.with_UE(1)).err(), Some(Error::Fault(0x4000_440c)));
    }
}
