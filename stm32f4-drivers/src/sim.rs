//! Simulated STM32F401 register space.
//!
//! Stands in for memory-mapped I/O on the host. Registers hold whatever
//! was last written (no hardware side effects), reads can be scripted per
//! address, and every access is logged so callers can check exactly which
//! registers a driver operation touched.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use stm32f4_pac::device::{DeviceAccess, Error, RegisterAddress, RegisterValue, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Read(RegisterAddress, RegisterValue),
    Write(RegisterAddress, RegisterValue),
}

#[derive(Copy, Clone, Debug)]
struct Region {
    name: &'static str,
    base: RegisterAddress,
    length: RegisterAddress,
}

impl Region {
    fn contains(&self, address: RegisterAddress) -> bool {
        address >= self.base && address - self.base < self.length
    }
}

const BLOCK_LENGTH: RegisterAddress = 0x400;

/// Peripheral blocks the drivers and firmware glue touch.
const STM32F401_REGIONS: [(&str, RegisterAddress); 7] = [
    ("USART2", 0x4000_4400),
    ("USART1", 0x4001_1000),
    ("USART6", 0x4001_1400),
    ("GPIOA",  0x4002_0000),
    ("RCC",    0x4002_3800),
    ("DMA1",   0x4002_6000),
    ("DMA2",   0x4002_6400),
];

const USART_SR_RESET: RegisterValue = 0x0000_00c0;
const DMA_SXFCR_RESET: RegisterValue = 0x0000_0021;

#[derive(Default)]
pub struct RegisterFile {
    regions: Vec<Region>,
    values: RefCell<BTreeMap<RegisterAddress, RegisterValue>>,
    scripted: RefCell<BTreeMap<RegisterAddress, VecDeque<RegisterValue>>>,
    log: RefCell<Vec<Transaction>>,
}

impl RegisterFile {
    /// An empty register space with no mapped regions.
    pub fn new() -> Self {
        Self::default()
    }

    /// USART, DMA, RCC and GPIOA blocks mapped, with the non-zero reset
    /// values the drivers depend on.
    pub fn stm32f401() -> Self {
        let mut file = Self::new();
        for (name, base) in STM32F401_REGIONS {
            file.map(name, base, BLOCK_LENGTH);
        }

        for base in [0x4001_1000, 0x4000_4400, 0x4001_1400] {
            file.set(base, USART_SR_RESET);
        }

        for base in [0x4002_6000, 0x4002_6400] {
            for stream in 0..8 {
                file.set(base + 0x24 + 0x18 * stream, DMA_SXFCR_RESET);
            }
        }

        file
    }

    pub fn map(&mut self, name: &'static str, base: RegisterAddress, length: RegisterAddress) {
        self.regions.push(Region { name, base, length });
    }

    /// Name of the mapped block containing `address`.
    pub fn region_name(&self, address: RegisterAddress) -> Option<&'static str> {
        self.regions.iter().find(|r| r.contains(address)).map(|r| r.name)
    }

    fn check(&self, address: RegisterAddress) -> Result<()> {
        if address & 3 != 0 || self.region_name(address).is_none() {
            Err(Error::Fault(address))
        } else {
            Ok(())
        }
    }

    /// Current value, without logging or consuming scripted reads.
    pub fn get(&self, address: RegisterAddress) -> RegisterValue {
        self.values.borrow().get(&address).copied().unwrap_or(0)
    }

    /// Overwrite a value, without logging.
    pub fn set(&self, address: RegisterAddress, value: RegisterValue) {
        self.values.borrow_mut().insert(address, value);
    }

    /// Queue values to be returned by the next reads of `address`, ahead of
    /// the stored value. Scripted reads don't change the stored value.
    pub fn script(&self, address: RegisterAddress, values: &[RegisterValue]) {
        self.scripted.borrow_mut().entry(address).or_default().extend(values);
    }

    /// Every stored register value, keyed by address.
    pub fn snapshot(&self) -> BTreeMap<RegisterAddress, RegisterValue> {
        self.values.borrow().clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.log.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(RegisterAddress, RegisterValue)> {
        self.log.borrow().iter().filter_map(|t| match *t {
            Transaction::Write(address, value) => Some((address, value)),
            Transaction::Read(..) => None,
        }).collect()
    }

    pub fn reads_of(&self, address: RegisterAddress) -> usize {
        self.log.borrow().iter().filter(|t| matches!(t, Transaction::Read(a, _) if *a == address)).count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl DeviceAccess for RegisterFile {
    fn read(&self, address: RegisterAddress) -> Result<RegisterValue> {
        self.check(address)?;
        let scripted = self.scripted.borrow_mut().get_mut(&address).and_then(|q| q.pop_front());
        let value = scripted.unwrap_or_else(|| self.get(address));
        self.log.borrow_mut().push(Transaction::Read(address, value));
        Ok(value)
    }

    fn write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
        self.check(address)?;
        self.set(address, value);
        self.log.borrow_mut().push(Transaction::Write(address, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_values() {
        let file = RegisterFile::stm32f401();
        assert_eq!(file.get(0x4000_4400), USART_SR_RESET);
        assert_eq!(file.get(0x4002_60b4), DMA_SXFCR_RESET);
        assert_eq!(file.get(0x4002_64cc), DMA_SXFCR_RESET);
        assert_eq!(file.get(0x4000_440c), 0);
    }

    #[test]
    fn unmapped_and_misaligned_accesses_fault() {
        let file = RegisterFile::stm32f401();
        assert_eq!(file.read(0x5000_0000), Err(Error::Fault(0x5000_0000)));
        assert_eq!(file.write(0x4000_4402, 1), Err(Error::Fault(0x4000_4402)));
        assert!(file.transactions().is_empty());
    }

    #[test]
    fn scripted_reads_come_first() {
        let file = RegisterFile::stm32f401();
        file.set(0x4000_4404, 0x55);
        file.script(0x4000_4404, &[0x01, 0x02]);
        assert_eq!(file.read(0x4000_4404), Ok(0x01));
        assert_eq!(file.read(0x4000_4404), Ok(0x02));
        assert_eq!(file.read(0x4000_4404), Ok(0x55));
        assert_eq!(file.reads_of(0x4000_4404), 3);
    }

    #[test]
    fn writes_are_logged_in_order() {
        let file = RegisterFile::stm32f401();
        file.write(0x4000_4408, 7).unwrap();
        file.read(0x4000_4408).unwrap();
        file.write(0x4000_440c, 9).unwrap();
        assert_eq!(file.writes(), vec![(0x4000_4408, 7), (0x4000_440c, 9)]);
        assert_eq!(file.transactions()[1], Transaction::Read(0x4000_4408, 7));
    }

    #[test]
    fn region_names() {
        let file = RegisterFile::stm32f401();
        assert_eq!(file.region_name(0x4002_60a0), Some("DMA1"));
        assert_eq!(file.region_name(0x4001_1414), Some("USART6"));
        assert_eq!(file.region_name(0x4001_1800), None);
    }
}
