//! Table-driven USART setup and blocking, polled transmit/receive.

use stm32f4_pac::device::{Bus, Device, DeviceAccess, Usart, USART_PORTS_COUNT};
use stm32f4_pac::register::{self, SR};

use crate::{Error, Result, State};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartPort {
    Usart1,
    Usart2,
    Usart6,
}

impl UsartPort {
    pub const ALL: [UsartPort; USART_PORTS_COUNT] = [UsartPort::Usart1, UsartPort::Usart2, UsartPort::Usart6];

    /// Register map index.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for UsartPort {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or(Error::InvalidInstance(index))
    }
}

setting! {
    WordLength {
        Bits8,
        Bits9,
    }
}

setting! {
    StopBits {
        One,
        Half,
        Two,
        OneAndHalf,
    }
}

setting! {
    Parity {
        Disabled,
        Even,
        Odd,
    }
}

setting! {
    BaudRate {
        Bps9600,
        Bps19200,
        Bps38400,
        Bps57600,
        Bps115200,
    }
}

impl BaudRate {
    pub fn hz(self) -> u32 {
        match self {
            BaudRate::Bps9600   =>   9_600,
            BaudRate::Bps19200  =>  19_200,
            BaudRate::Bps38400  =>  38_400,
            BaudRate::Bps57600  =>  57_600,
            BaudRate::Bps115200 => 115_200,
        }
    }
}

/// One row of the USART configuration table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsartConfig {
    pub port: UsartPort,
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub rx: State,
    pub tx: State,
    pub rx_dma: State,
    pub tx_dma: State,
    pub enable: State,
    pub baud_rate: BaudRate,
}

/// How long to poll a status flag before giving up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Spin until the flag comes up, however long that takes.
    Never,
    /// Fail with `Error::Timeout` after this many polls that saw the flag clear.
    Polls(u32),
}

fn word_length(value: WordLength) -> register::WordLength {
    match value {
        WordLength::Bits8 => register::WordLength::DataBits8,
        WordLength::Bits9 => register::WordLength::DataBits9,
    }
}

fn stop_bits(value: StopBits) -> register::StopBits {
    match value {
        StopBits::One        => register::StopBits::One,
        StopBits::Half       => register::StopBits::Half,
        StopBits::Two        => register::StopBits::Two,
        StopBits::OneAndHalf => register::StopBits::OneAndHalf,
    }
}

/// (PCE, PS)
fn parity(value: Parity) -> (u8, register::ParitySelection) {
    match value {
        Parity::Disabled => (0, register::ParitySelection::Even),
        Parity::Even     => (1, register::ParitySelection::Even),
        Parity::Odd      => (1, register::ParitySelection::Odd),
    }
}

/// 16x oversampling divisor for BRR, rounded to nearest. Zero for a zero
/// baud rate, which no BRR value can produce.
pub const fn baud_rate_divisor(peripheral_clock_hz: u32, baud_rate_hz: u32) -> u32 {
    if baud_rate_hz == 0 {
        return 0;
    }

    let clock = peripheral_clock_hz as u64;
    let baud = baud_rate_hz as u64;
    ((clock + baud / 2) / baud) as u32
}

const DIVISOR_MIN: u32 = 0x0010;
const DIVISOR_MAX: u32 = 0xffff;

fn checked_divisor(peripheral_clock_hz: u32, baud_rate_hz: u32) -> Result<u32> {
    let divisor = baud_rate_divisor(peripheral_clock_hz, baud_rate_hz);
    if (DIVISOR_MIN..=DIVISOR_MAX).contains(&divisor) {
        Ok(divisor)
    } else {
        warn!("usart: {} baud out of reach at {} Hz", baud_rate_hz, peripheral_clock_hz);
        Err(Error::BaudRate { peripheral_clock_hz, baud_rate_hz })
    }
}

/// Apply every entry of `table`, in order. Ports not named in the table
/// are left alone. BRR is computed for 16x oversampling; CR1.OVER8 is
/// left as found and must be clear.
pub fn init<A: DeviceAccess>(device: &Device<A>, table: &[UsartConfig], peripheral_clock_hz: u32) -> Result<()> {
    for entry in table {
        init_port(device, entry, peripheral_clock_hz)?;
    }

    info!("usart: {} ports configured", table.len());

    Ok(())
}

fn init_port<A: DeviceAccess>(device: &Device<A>, entry: &UsartConfig, peripheral_clock_hz: u32) -> Result<()> {
    let usart = device.usart(entry.port.index());
    let divisor = checked_divisor(peripheral_clock_hz, entry.baud_rate.hz())?;

    debug!("usart: {} divisor {}", entry.port, divisor);

    usart.brr().write(|w| w
        .with_DIV_Mantissa((divisor >> 4) as u16)
        .with_DIV_Fraction((divisor & 0xf) as u8)
    )?;

    usart.cr2().modify(|m| m
        .with_STOP(stop_bits(entry.stop_bits))
    )?;

    usart.cr3().modify(|m| m
        .with_DMAR(entry.rx_dma.bit())
        .with_DMAT(entry.tx_dma.bit())
    )?;

    // UE last, so the port comes up with its final framing.
    let (pce, ps) = parity(entry.parity);
    usart.cr1().modify(|m| m
        .with_M(word_length(entry.word_length))
        .with_PCE(pce)
        .with_PS(ps)
        .with_RE(entry.rx.bit())
        .with_TE(entry.tx.bit())
        .with_UE(entry.enable.bit())
    )?;

    Ok(())
}

fn wait_for<D, F>(usart: &Usart<D>, timeout: Timeout, ready: F) -> Result<()>
where
    D: Bus,
    F: Fn(&SR) -> bool,
{
    let mut polls: u32 = 0;
    loop {
        let sr = usart.sr().read()?;
        if ready(&sr) {
            return Ok(());
        }

        if let Timeout::Polls(limit) = timeout {
            polls += 1;
            if polls >= limit {
                warn!("usart: {} status flag timeout, SR={=u32:#x}", usart.index(), u32::from(sr));
                return Err(Error::Timeout);
            }
        }

        core::hint::spin_loop();
    }
}

/// Send `data` one byte at a time, waiting for TXE before each write to DR.
pub fn transmit<A: DeviceAccess>(device: &Device<A>, port: UsartPort, data: &[u8], timeout: Timeout) -> Result<()> {
    let usart = device.usart(port.index());
    for &c in data {
        wait_for(&usart, timeout, |sr| sr.TXE() != 0)?;
        usart.dr().write(|w| w.with_DR(c as u16))?;
    }

    Ok(())
}

/// Fill `buffer` one byte at a time, waiting for RXNE before each read of
/// DR. With 9-bit words the ninth bit is dropped.
pub fn receive<A: DeviceAccess>(device: &Device<A>, port: UsartPort, buffer: &mut [u8], timeout: Timeout) -> Result<()> {
    let usart = device.usart(port.index());
    for c in buffer.iter_mut() {
        wait_for(&usart, timeout, |sr| sr.RXNE() != 0)?;
        *c = usart.dr().read()?.DR() as u8;
    }

    Ok(())
}

/// Wait for the last frame written to leave the shift register.
pub fn flush<A: DeviceAccess>(device: &Device<A>, port: UsartPort, timeout: Timeout) -> Result<()> {
    let usart = device.usart(port.index());
    wait_for(&usart, timeout, |sr| sr.TC() != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RegisterFile, Transaction};

    const CLOCK_HZ: u32 = 16_000_000;

    const USART1_BASE: u32 = 0x4001_1000;
    const USART2_BASE: u32 = 0x4000_4400;
    const USART6_BASE: u32 = 0x4001_1400;

    const SR: u32 = 0x00;
    const DR: u32 = 0x04;
    const BRR: u32 = 0x08;
    const CR1: u32 = 0x0c;
    const CR2: u32 = 0x10;
    const CR3: u32 = 0x14;

    const RXNE: u32 = 1 << 5;

    fn usart2_8n1() -> UsartConfig {
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
        }
    }

    fn device() -> Device<RegisterFile> {
        Device::new(RegisterFile::stm32f401())
    }

    #[test]
    fn divisor_rounds_to_nearest() {
        assert_eq!(baud_rate_divisor(16_000_000, 9600), 1667);
        assert_eq!(baud_rate_divisor(16_000_000, 115_200), 139);
        assert_eq!(baud_rate_divisor(48_000_000, 57_600), 833);
        assert_eq!(baud_rate_divisor(u32::MAX, 9600), 447_392);
    }

    #[test]
    fn zero_baud_rate_is_out_of_reach() {
        assert_eq!(baud_rate_divisor(16_000_000, 0), 0);
        assert_eq!(
            checked_divisor(16_000_000, 0),
            Err(Error::BaudRate { peripheral_clock_hz: 16_000_000, baud_rate_hz: 0 })
        );
    }

    #[test]
    fn init_writes_expected_registers() {
        let device = device();
        init(&device, &[usart2_8n1()], CLOCK_HZ).unwrap();

        let file = device.access();
        assert_eq!(file.get(USART2_BASE + CR1), (1 << 13) | (1 << 3) | (1 << 2));
        assert_eq!(file.get(USART2_BASE + CR2), 0);
        assert_eq!(file.get(USART2_BASE + CR3), (1 << 7) | (1 << 6));
        assert_eq!(file.get(USART2_BASE + BRR), 1667);
    }

    #[test]
    fn init_stop_bits_mapping() {
        let expected: [u32; 4] = [0b00, 0b01, 0b10, 0b11];
        for (&value, bits) in StopBits::ALL.iter().zip(expected) {
            let device = device();
            let entry = UsartConfig { stop_bits: value, ..usart2_8n1() };
            init(&device, &[entry], CLOCK_HZ).unwrap();
            assert_eq!(device.access().get(USART2_BASE + CR2), bits << 12, "{value:?}");
        }
    }

    #[test]
    fn init_word_length_and_parity_mapping() {
        let cases: [(WordLength, Parity, u32); 4] = [
            (WordLength::Bits8, Parity::Disabled, 0),
            (WordLength::Bits9, Parity::Disabled, 1 << 12),
            (WordLength::Bits8, Parity::Even, 1 << 10),
            (WordLength::Bits9, Parity::Odd, (1 << 12) | (1 << 10) | (1 << 9)),
        ];
        for (word_length, parity, bits) in cases {
            let device = device();
            let entry = UsartConfig {
                word_length,
                parity,
                rx: State::Disabled,
                tx: State::Disabled,
                enable: State::Disabled,
                ..usart2_8n1()
            };
            init(&device, &[entry], CLOCK_HZ).unwrap();
            assert_eq!(device.access().get(USART2_BASE + CR1), bits, "{word_length:?} {parity:?}");
        }
    }

    #[test]
    fn init_enable_bits_mapping() {
        let device = device();
        let entry = UsartConfig {
            rx: State::Enabled,
            tx: State::Disabled,
            rx_dma: State::Disabled,
            tx_dma: State::Enabled,
            enable: State::Disabled,
            ..usart2_8n1()
        };
        init(&device, &[entry], CLOCK_HZ).unwrap();
        assert_eq!(device.access().get(USART2_BASE + CR1), 1 << 2);
        assert_eq!(device.access().get(USART2_BASE + CR3), 1 << 7);
    }

    #[test]
    fn init_every_baud_rate() {
        for &baud_rate in BaudRate::ALL {
            let device = device();
            let entry = UsartConfig { baud_rate, ..usart2_8n1() };
            init(&device, &[entry], CLOCK_HZ).unwrap();
            assert_eq!(
                device.access().get(USART2_BASE + BRR),
                baud_rate_divisor(CLOCK_HZ, baud_rate.hz())
            );
        }
    }

    #[test]
    fn init_preserves_unrelated_bits() {
        let device = device();
        let file = device.access();
        // RXNEIE and IDLEIE in CR1, CLKEN in CR2, EIE in CR3
        file.set(USART2_BASE + CR1, (1 << 5) | (1 << 4));
        file.set(USART2_BASE + CR2, 1 << 11);
        file.set(USART2_BASE + CR3, 1);

        init(&device, &[usart2_8n1()], CLOCK_HZ).unwrap();

        assert_eq!(file.get(USART2_BASE + CR1), (1 << 13) | (1 << 5) | (1 << 4) | (1 << 3) | (1 << 2));
        assert_eq!(file.get(USART2_BASE + CR2), 1 << 11);
        assert_eq!(file.get(USART2_BASE + CR3), (1 << 7) | (1 << 6) | 1);
    }

    #[test]
    fn init_leaves_unlisted_ports_alone() {
        let device = device();
        let file = device.access();
        for base in [USART1_BASE, USART6_BASE] {
            for offset in [BRR, CR1, CR2, CR3] {
                file.set(base + offset, 0xa5a5_0000 | offset);
            }
        }
        let before = file.snapshot();

        init(&device, &[usart2_8n1()], CLOCK_HZ).unwrap();

        let after = file.snapshot();
        for (address, value) in before {
            if address & !0x3ff != USART2_BASE {
                assert_eq!(after[&address], value, "{address:#x}");
            }
        }
        assert!(file.writes().iter().all(|&(address, _)| address & !0x3ff == USART2_BASE));
    }

    #[test]
    fn init_is_idempotent() {
        let device = device();
        let table = [
            usart2_8n1(),
            UsartConfig { port: UsartPort::Usart6, parity: Parity::Odd, baud_rate: BaudRate::Bps115200, ..usart2_8n1() },
        ];

        init(&device, &table, CLOCK_HZ).unwrap();
        let once = device.access().snapshot();
        init(&device, &table, CLOCK_HZ).unwrap();
        assert_eq!(device.access().snapshot(), once);
    }

    #[test]
    fn init_rejects_unreachable_baud_rate_before_writing() {
        let device = device();
        let result = init(&device, &[usart2_8n1()], 100_000);
        assert_eq!(result, Err(Error::BaudRate { peripheral_clock_hz: 100_000, baud_rate_hz: 9600 }));
        assert!(device.access().writes().is_empty());
    }

    #[test]
    fn transmit_writes_each_byte_in_order() {
        let device = device();
        transmit(&device, UsartPort::Usart2, b"OK", Timeout::Never).unwrap();

        let file = device.access();
        assert_eq!(file.writes(), vec![(USART2_BASE + DR, b'O' as u32), (USART2_BASE + DR, b'K' as u32)]);
        assert_eq!(file.reads_of(USART2_BASE + SR), 2);
    }

    #[test]
    fn transmit_waits_for_txe() {
        let device = device();
        let file = device.access();
        file.script(USART2_BASE + SR, &[0, 0, 0]);

        transmit(&device, UsartPort::Usart2, b"!", Timeout::Never).unwrap();

        assert_eq!(file.reads_of(USART2_BASE + SR), 4);
        assert_eq!(
            *file.transactions().last().unwrap(),
            Transaction::Write(USART2_BASE + DR, b'!' as u32)
        );
    }

    #[test]
    fn transmit_times_out_without_writing() {
        let device = device();
        let file = device.access();
        file.set(USART2_BASE + SR, 0);

        let result = transmit(&device, UsartPort::Usart2, b"OK", Timeout::Polls(5));

        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(file.reads_of(USART2_BASE + SR), 5);
        assert!(file.writes().is_empty());
    }

    #[test]
    fn receive_reads_after_rxne() {
        let device = device();
        let file = device.access();
        file.script(USART2_BASE + SR, &[0, RXNE, RXNE]);
        file.script(USART2_BASE + DR, &[b'h' as u32, b'i' as u32]);

        let mut buffer = [0u8; 2];
        receive(&device, UsartPort::Usart2, &mut buffer, Timeout::Polls(10)).unwrap();

        assert_eq!(&buffer, b"hi");
        assert_eq!(file.reads_of(USART2_BASE + SR), 3);
    }

    #[test]
    fn receive_times_out() {
        let device = device();
        let mut buffer = [0u8; 1];
        let result = receive(&device, UsartPort::Usart6, &mut buffer, Timeout::Polls(3));
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(device.access().reads_of(USART6_BASE + SR), 3);
        assert_eq!(device.access().reads_of(USART6_BASE + DR), 0);
    }

    #[test]
    fn flush_waits_for_tc() {
        let device = device();
        let file = device.access();
        file.script(USART1_BASE + SR, &[1 << 7, 1 << 7]);
        flush(&device, UsartPort::Usart1, Timeout::Never).unwrap();
        assert_eq!(file.reads_of(USART1_BASE + SR), 3);
    }

    #[test]
    fn port_from_index() {
        assert_eq!(UsartPort::try_from(1), Ok(UsartPort::Usart2));
        assert_eq!(UsartPort::try_from(3), Err(Error::InvalidInstance(3)));
    }

    #[test]
    fn settings_from_raw_values() {
        assert_eq!(StopBits::try_from(3), Ok(StopBits::OneAndHalf));
        assert_eq!(StopBits::try_from(4), Err(Error::InvalidSetting { setting: "StopBits", value: 4 }));
        assert_eq!(BaudRate::try_from(5), Err(Error::InvalidSetting { setting: "BaudRate", value: 5 }));
    }

    #[test]
    #[should_panic(expected="index < USART_PORTS_COUNT")]
    fn out_of_range_port_is_fatal() {
        let device = device();
        let _ = device.usart(USART_PORTS_COUNT);
    }
}
