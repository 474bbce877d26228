use stm32f4_pac::device::{DeviceAccess, Error, RegisterAddress, RegisterValue, Result};

/// Volatile access to the peripheral address space. Register addresses
/// are absolute.
#[derive(Copy, Clone)]
pub struct Access {}

impl Access {
    /// # Safety
    ///
    /// Only one `Access` may drive the peripherals at a time.
    pub unsafe fn new() -> Self {
        Self {}
    }
}

impl DeviceAccess for Access {
    fn read(&self, address: RegisterAddress) -> Result<RegisterValue> {
        if address & 3 != 0 {
            return Err(Error::Fault(address));
        }

        unsafe {
            let p = address as *const u32;
            Ok(p.read_volatile())
        }
    }

    fn write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
        if address & 3 != 0 {
            return Err(Error::Fault(address));
        }

        unsafe {
            let p = address as *mut u32;
            p.write_volatile(value);
        }
        Ok(())
    }
}

pub type Device = stm32f4_pac::device::Device<Access>;
