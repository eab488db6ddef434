//! Human-readable listing of a program image.

use std::io::{self, Write};

use thiserror::Error;

use crate::decoder::{DecodeError, Decoder};
use crate::image::ProgramImage;
use crate::op::Opcode;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Print the header summary, the public symbols and the code listing.
pub fn dump(image: &ProgramImage, out: &mut dyn Write) -> Result<(), DumpError> {
    writeln!(out, "String table size       : {}", image.string_table().len())?;
    writeln!(out, "Global area size        : {}", image.global_area_size())?;
    writeln!(out, "Number of public symbols: {}", image.public_symbols().len())?;
    writeln!(out, "Public symbols          :")?;
    for (i, symbol) in image.public_symbols().iter().enumerate() {
        let name = image.public_name(i).unwrap_or_default();
        writeln!(out, "   {:#010x}: {}", symbol.offset, String::from_utf8_lossy(name))?;
    }
    writeln!(out, "Code:")?;
    disassemble(image, out)
}

/// One line per instruction, ending with `<end>` at the stop opcode or the
/// end of the code.
pub fn disassemble(image: &ProgramImage, out: &mut dyn Write) -> Result<(), DumpError> {
    let mut decoder = Decoder::new(image);
    loop {
        write!(out, "{:#010x}:\t", decoder.offset())?;
        if decoder.is_at_end() {
            break;
        }
        let op = decoder.fetch_opcode()?;
        if op == Opcode::Stop {
            break;
        }
        write_instruction(&mut decoder, op, out)?;
        writeln!(out)?;
    }
    writeln!(out, "<end>")?;
    Ok(())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn write_instruction(
    decoder: &mut Decoder<'_>,
    op: Opcode,
    out: &mut dyn Write,
) -> Result<(), DumpError> {
    let name = op.mnemonic();
    match op {
        Opcode::Binop(bin) => write!(out, "{name}\t{}", bin.symbol())?,
        Opcode::Const => write!(out, "{name}\t{}", decoder.fetch_i32()?)?,
        Opcode::String => {
            let s = decoder.fetch_u32()?;
            write!(out, "{name}\t{}", lossy(decoder.fetch_str(s)?))?
        }
        Opcode::Sexp | Opcode::Tag => {
            let s = decoder.fetch_u32()?;
            let tag = lossy(decoder.fetch_str(s)?);
            write!(out, "{name}\t{tag} {}", decoder.fetch_u32()?)?
        }
        Opcode::Jmp | Opcode::CjmpZ | Opcode::CjmpNz => {
            write!(out, "{name}\t{:#010x}", decoder.fetch_u32()?)?
        }
        Opcode::Ld(mem) | Opcode::Lda(mem) | Opcode::St(mem) => {
            write!(out, "{name}\t{}({})", mem.letter(), decoder.fetch_u32()?)?
        }
        Opcode::Begin | Opcode::CBegin => {
            let args = decoder.fetch_u32()?;
            write!(out, "{name}\t{args} {}", decoder.fetch_u32()?)?
        }
        Opcode::Closure => {
            write!(out, "{name}\t{:#010x}", decoder.fetch_u32()?)?;
            let n = decoder.fetch_u32()?;
            for _ in 0..n {
                let (mem, index) = decoder.fetch_location()?;
                write!(out, " {}({index})", mem.letter())?;
            }
        }
        Opcode::Call => {
            let target = decoder.fetch_u32()?;
            write!(out, "{name}\t{target:#010x} {}", decoder.fetch_u32()?)?
        }
        Opcode::Fail => {
            let line = decoder.fetch_u32()?;
            write!(out, "{name}\t{line} {}", decoder.fetch_u32()?)?
        }
        Opcode::CallC | Opcode::Array | Opcode::Line => {
            write!(out, "{name}\t{}", decoder.fetch_u32()?)?
        }
        Opcode::Patt(p) => write!(out, "{name}\t{}", p.name())?,
        Opcode::Read | Opcode::Write | Opcode::Length | Opcode::Stringify => {
            write!(out, "CALL\t{name}")?
        }
        Opcode::Barray => write!(out, "CALL\t{name}\t{}", decoder.fetch_u32()?)?,
        Opcode::Sti
        | Opcode::Sta
        | Opcode::End
        | Opcode::Ret
        | Opcode::Drop
        | Opcode::Dup
        | Opcode::Swap
        | Opcode::Elem
        | Opcode::Stop => write!(out, "{name}")?,
    }
    Ok(())
}
