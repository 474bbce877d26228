use clap::{Parser, Subcommand, Args, ArgEnum};
use console::style;

use stm32f4_drivers::config::{self, PERIPHERAL_CLOCK_HZ};
use stm32f4_drivers::dma::{self, DmaStream, DmaTransfer};
use stm32f4_drivers::sim::RegisterFile;
use stm32f4_drivers::usart::{self, baud_rate_divisor, Timeout, UsartPort};
use stm32f4_pac::device::Device;

use dump::{registers_dump_stream, registers_dump_usart, transactions_print, transfer_status_print};
use error::{Result, ToolError};

mod dump;
mod error;

/// Drives the USART and DMA drivers against a simulated STM32F401
/// register file and shows what they do to the registers.
#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    /// USART peripheral clock, in Hz.
    #[clap(long, default_value_t=PERIPHERAL_CLOCK_HZ)]
    pub clock: u32,

    /// Print every register access.
    #[clap(long)]
    pub trace: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum Port {
    Usart1,
    Usart2,
    Usart6,
}

impl From<Port> for UsartPort {
    fn from(port: Port) -> Self {
        match port {
            Port::Usart1 => UsartPort::Usart1,
            Port::Usart2 => UsartPort::Usart2,
            Port::Usart6 => UsartPort::Usart6,
        }
    }
}

#[derive(Args)]
pub(crate) struct TransmitArgs {
    #[clap(long, arg_enum, default_value="usart2")]
    port: Port,

    text: String,
}

#[derive(Args)]
pub(crate) struct ReceiveArgs {
    #[clap(long, arg_enum, default_value="usart2")]
    port: Port,

    /// Bytes the simulated line delivers.
    text: String,

    /// Bytes to wait for. More than were delivered runs into the timeout.
    #[clap(long)]
    count: Option<usize>,

    /// Status polls per byte before giving up.
    #[clap(long, default_value_t=1000)]
    polls: u32,
}

#[derive(Args)]
pub(crate) struct TransferArgs {
    /// 0..7 for DMA1 streams, 8..15 for DMA2 streams.
    stream: usize,

    #[clap(long, parse(try_from_str=parse_address), default_value="0x40004404")]
    peripheral: u32,

    #[clap(long, parse(try_from_str=parse_address), default_value="0x20000000")]
    memory: u32,

    #[clap(long)]
    length: u32,
}

#[derive(Args)]
pub(crate) struct DivisorArgs {
    baud: u32,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Apply the built-in USART and DMA tables.
    #[clap(name="init")]
    Init,

    #[clap(name="transmit")]
    Transmit(TransmitArgs),

    #[clap(name="receive")]
    Receive(ReceiveArgs),

    #[clap(name="transfer")]
    Transfer(TransferArgs),

    #[clap(name="divisor")]
    Divisor(DivisorArgs),
}

fn parse_address(s: &str) -> Result<u32> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let parsed = match digits {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ToolError::Address(s.to_string()))
}

type SimDevice = Device<RegisterFile>;

fn bring_up(device: &SimDevice, clock: u32) -> Result<()> {
    usart::init(device, config::usart_config(), clock)?;
    dma::init(device, config::dma_config())?;
    Ok(())
}

/// Status register value with TXE, TC and RXNE set.
const SR_RX_READY: u32 = 0x0000_00e0;

fn main() -> Result<()> {
    let args = Cli::parse();

    let device = Device::new(RegisterFile::stm32f401());

    match args.command {
        Commands::Init => {
            bring_up(&device, args.clock)?;

            for entry in config::usart_config() {
                registers_dump_usart(&device.usart(entry.port.index()))?;
            }
            for entry in config::dma_config() {
                registers_dump_stream(&device.stream(entry.stream.index()))?;
            }
        },
        Commands::Transmit(a) => {
            bring_up(&device, args.clock)?;
            device.access().clear_log();

            let port = UsartPort::from(a.port);
            usart::transmit(&device, port, a.text.as_bytes(), Timeout::Polls(1))?;
            usart::flush(&device, port, Timeout::Polls(1))?;

            let dr = device.usart(port.index()).dr().address();
            let sent: Vec<u8> = device.access().writes().iter()
                .filter(|(address, _)| *address == dr)
                .map(|(_, value)| *value as u8)
                .collect();
            println!("{} {} bytes: {:?}", style("sent").green(), sent.len(), String::from_utf8_lossy(&sent));
        },
        Commands::Receive(a) => {
            let count = a.count.unwrap_or(a.text.len());
            if count == 0 {
                return Err(ToolError::EmptyReceive);
            }

            bring_up(&device, args.clock)?;
            device.access().clear_log();

            let port = UsartPort::from(a.port);
            let usart = device.usart(port.index());
            let line: Vec<u32> = a.text.bytes().map(u32::from).collect();
            device.access().script(usart.dr().address(), &line);
            device.access().script(usart.sr().address(), &vec![SR_RX_READY; line.len()]);

            let mut buffer = vec![0u8; count];
            let result = usart::receive(&device, port, &mut buffer, Timeout::Polls(a.polls));
            if args.trace {
                transactions_print(device.access());
            }
            result?;

            println!("{} {} bytes: {:?}", style("received").green(), buffer.len(), String::from_utf8_lossy(&buffer));
            return Ok(());
        },
        Commands::Transfer(a) => {
            let stream = DmaStream::try_from(a.stream)?;

            bring_up(&device, args.clock)?;
            device.access().clear_log();

            let transfer = DmaTransfer {
                stream,
                peripheral: a.peripheral,
                memory: a.memory,
                length: a.length,
            };
            dma::configure_transfer(&device, &transfer)?;

            registers_dump_stream(&device.stream(stream.index()))?;
            transfer_status_print(stream.index(), &dma::transfer_status(&device, stream)?);
        },
        Commands::Divisor(a) => {
            let divisor = match a.baud {
                0 => 0,
                baud => baud_rate_divisor(args.clock, baud),
            };
            if !(0x10..=0xffff).contains(&divisor) {
                eprintln!("{} {} baud is out of reach at {} Hz", style("error:").red(), a.baud, args.clock);
                return Ok(());
            }
            let actual = args.clock as f64 / divisor as f64;
            let error = (actual - a.baud as f64) / a.baud as f64 * 100.0;
            println!("BRR {divisor:#06x} (mantissa {}, fraction {}/16)", divisor >> 4, divisor & 0xf);
            println!("actual {actual:.1} baud, {error:+.3}%");
        },
    }

    if args.trace {
        transactions_print(device.access());
    }

    Ok(())
}
