//! Untyped access to any 32-bit register by absolute address.
//!
//! For blocks without a typed register map (RCC, GPIO) and for poking at
//! registers from tooling. No range or alignment checks beyond what the
//! `DeviceAccess` implementation does.

use stm32f4_pac::device::{Bus, Device, DeviceAccess, RegisterAddress, RegisterValue};

use crate::Result;

pub fn register_write<A: DeviceAccess>(device: &Device<A>, address: RegisterAddress, value: RegisterValue) -> Result<()> {
    trace!("raw: write {=u32:#x} <- {=u32:#x}", address, value);
    device.register_write(address, value)?;
    Ok(())
}

pub fn register_read<A: DeviceAccess>(device: &Device<A>, address: RegisterAddress) -> Result<RegisterValue> {
    let value = device.register_read(address)?;
    trace!("raw: read {=u32:#x} -> {=u32:#x}", address, value);
    Ok(value)
}

/// Read-modify-write: clear the bits in `clear`, then set those in `set`.
pub fn register_modify<A: DeviceAccess>(
    device: &Device<A>,
    address: RegisterAddress,
    clear: RegisterValue,
    set: RegisterValue,
) -> Result<()> {
    let value = register_read(device, address)?;
    register_write(device, address, (value & !clear) | set)
}
