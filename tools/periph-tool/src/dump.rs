use console::{style, Color};

use stm32f4_drivers::dma::TransferStatus;
use stm32f4_drivers::sim::{RegisterFile, Transaction};
use stm32f4_drivers::Result;
use stm32f4_pac::device::{Bus, Stream, Usart};

pub fn registers_dump_usart<D: Bus>(usart: &Usart<D>) -> Result<()> {
    print!("USART {:1}", usart.index());
    println!("\t{:?}", usart.sr ().read()?);
    println!("\t{:?}", usart.brr().read()?);
    println!("\t{:?}", usart.cr1().read()?);
    println!("\t{:?}", usart.cr2().read()?);
    println!("\t{:?}", usart.cr3().read()?);

    Ok(())
}

pub fn registers_dump_stream<D: Bus>(stream: &Stream<D>) -> Result<()> {
    print!("STREAM {:2}", stream.index());
    println!("\t{:?}", stream.cr  ().read()?);
    println!("\t{:?}", stream.ndtr().read()?);
    println!("\t{:?}", stream.par ().read()?);
    println!("\t{:?}", stream.m0ar().read()?);
    println!("\t{:?}", stream.fcr ().read()?);
    println!("\t{:?}", stream.isr ().read()?);

    Ok(())
}

/// Every access the drivers made, oldest first.
pub fn transactions_print(file: &RegisterFile) {
    for t in file.transactions() {
        let (tag, address, value, arrow) = match t {
            Transaction::Read(address, value) => (style("R").dim(), address, value, "->"),
            Transaction::Write(address, value) => (style("W").yellow(), address, value, "<-"),
        };
        let region = file.region_name(address).unwrap_or("?");
        println!("{tag} {address:08x} {arrow} {value:08x}  {}", style(region).cyan());
    }
}

pub fn transfer_status_print(index: usize, s: &TransferStatus) {
    let color = |v| if v { Color::Red } else { Color::Green };
    let done = |v| if v { Color::Green } else { Color::White };

    eprintln!("STREAM {index:2} [{}][{}][{}][{}][{}]",
        style("TC").fg(done(s.complete)),
        style("HT").fg(done(s.half)),
        style("TE").fg(color(s.error)),
        style("DME").fg(color(s.direct_mode_error)),
        style("FE").fg(color(s.fifo_error)),
    );
}
