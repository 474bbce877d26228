use core::fmt;

use stm32f4_pac::device;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Register access failed.
    Bus(device::Error),
    /// A status flag didn't come up within the poll budget.
    Timeout,
    /// Raw instance index at or past the number of instances.
    InvalidInstance(usize),
    /// Raw setting value at or past the number of valid values.
    InvalidSetting { setting: &'static str, value: u8 },
    /// The baud rate divisor doesn't fit BRR (or its mantissa is zero).
    BaudRate { peripheral_clock_hz: u32, baud_rate_hz: u32 },
    /// Item count of zero, or more than SxNDTR can count.
    TransferLength(u32),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<device::Error> for Error {
    fn from(e: device::Error) -> Self {
        Error::Bus(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(device::Error::Fault(address)) => write!(f, "bus fault at {address:#010x}"),
            Error::Timeout => write!(f, "timed out waiting for status flag"),
            Error::InvalidInstance(index) => write!(f, "no peripheral instance {index}"),
            Error::InvalidSetting { setting, value } => write!(f, "{value} is not a valid {setting}"),
            Error::BaudRate { peripheral_clock_hz, baud_rate_hz } => {
                write!(f, "{baud_rate_hz} baud unreachable from a {peripheral_clock_hz} Hz clock")
            },
            Error::TransferLength(length) => write!(f, "transfer of {length} items outside 1..=65535"),
        }
    }
}

#[cfg(any(test, feature = "sim"))]
impl std::error::Error for Error {}
