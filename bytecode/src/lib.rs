mod builder;
mod decoder;
mod disasm;
mod image;
mod op;

pub use builder::{BytecodeBuilder, ImageBuilder, Label};
pub use decoder::{DecodeError, Decoder};
pub use disasm::{DumpError, disassemble, dump};
pub use image::{LoadError, ProgramImage, PublicSymbol};
pub use op::{BinOp, Mem, Opcode, Pattern, group};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image_of(builder: &ImageBuilder, code: BytecodeBuilder) -> ProgramImage {
        ProgramImage::parse(&builder.finish(&code.into_bytes())).expect("valid image")
    }

    fn header(strings: i32, globals: i32, publics: i32) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [strings, globals, publics] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    // ── opcodes ────────────────────────────────────────────────────

    #[test]
    fn every_valid_opcode_byte_round_trips() {
        let mut valid = 0;
        for byte in 0..=u8::MAX {
            let Some(op) = Opcode::decode(byte) else { continue };
            valid += 1;
            if op == Opcode::Stop {
                assert_eq!(byte >> 4, group::STOP);
            } else {
                assert_eq!(op.encode(), byte, "{op:?}");
            }
        }
        // 13 binops, 12 misc, 3 × 4 locations, 11 control, 7 patterns,
        // 5 builtins, 16 stop encodings
        assert_eq!(valid, 13 + 12 + 12 + 11 + 7 + 5 + 16);
    }

    #[test]
    fn opcode_nibbles() {
        assert_eq!(Opcode::decode(0x01), Some(Opcode::Binop(BinOp::Add)));
        assert_eq!(Opcode::decode(0x0d), Some(Opcode::Binop(BinOp::Or)));
        assert_eq!(Opcode::decode(0x10), Some(Opcode::Const));
        assert_eq!(Opcode::decode(0x23), Some(Opcode::Ld(Mem::Capture)));
        assert_eq!(Opcode::decode(0x31), Some(Opcode::Lda(Mem::Local)));
        assert_eq!(Opcode::decode(0x42), Some(Opcode::St(Mem::Arg)));
        assert_eq!(Opcode::decode(0x56), Some(Opcode::Call));
        assert_eq!(Opcode::decode(0x66), Some(Opcode::Patt(Pattern::IsClosure)));
        assert_eq!(Opcode::decode(0x74), Some(Opcode::Barray));
        assert_eq!(Opcode::decode(0xf0), Some(Opcode::Stop));
        assert_eq!(Opcode::decode(0x00), None);
        assert_eq!(Opcode::decode(0x1c), None);
        assert_eq!(Opcode::decode(0x24), None);
        assert_eq!(Opcode::decode(0x80), None);
    }

    // ── decoder ────────────────────────────────────────────────────

    #[test]
    fn decoder_reads_little_endian_operands() {
        let mut b = BytecodeBuilder::new();
        b.const_(-7);
        b.begin(2, 3);
        let code = b.into_bytes();
        let mut d = Decoder::from_parts(&code, &[]);
        assert_eq!(d.fetch_opcode(), Ok(Opcode::Const));
        assert_eq!(d.fetch_i32(), Ok(-7));
        assert_eq!(d.fetch_opcode(), Ok(Opcode::Begin));
        assert_eq!(d.fetch_u32(), Ok(2));
        assert_eq!(d.fetch_u32(), Ok(3));
        assert!(d.is_at_end());
    }

    #[test]
    fn decoder_rejects_truncated_operand() {
        let code = [Opcode::Const.encode(), 1, 2];
        let mut d = Decoder::from_parts(&code, &[]);
        assert_eq!(d.fetch_opcode(), Ok(Opcode::Const));
        assert_eq!(d.fetch_i32(), Err(DecodeError::Truncated { offset: 1 }));
    }

    #[test]
    fn decoder_rejects_unknown_opcode() {
        let code = [0x1c];
        let mut d = Decoder::from_parts(&code, &[]);
        assert_eq!(
            d.fetch_opcode(),
            Err(DecodeError::InvalidOpcode { offset: 0, group: 1, op: 12 })
        );
    }

    #[test]
    fn decoder_rejects_bad_capture_kind() {
        let code = [7, 0, 0, 0, 0];
        let mut d = Decoder::from_parts(&code, &[]);
        assert_eq!(
            d.fetch_location(),
            Err(DecodeError::InvalidLocation { offset: 0, kind: 7 })
        );
    }

    #[test]
    fn decoder_strings_and_jumps() {
        let strings = b"ab\0cd\0";
        let code = [0u8; 4];
        let mut d = Decoder::from_parts(&code, strings);
        assert_eq!(d.fetch_str(3), Ok(&b"cd"[..]));
        assert_eq!(d.fetch_str(6), Err(DecodeError::StringOutOfRange { offset: 6 }));
        assert_eq!(d.jump(4), Ok(()));
        assert!(d.is_at_end());
        assert_eq!(d.jump(5), Err(DecodeError::JumpOutOfRange { target: 5 }));
    }

    // ── builder ────────────────────────────────────────────────────

    #[test]
    fn forward_labels_are_patched() {
        let mut b = BytecodeBuilder::new();
        let done = b.label();
        b.jmp(done);
        b.const_(1);
        b.bind(done);
        b.stop();
        let bytes = b.into_bytes();
        assert_eq!(&bytes[..5], &[Opcode::Jmp.encode(), 10, 0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn unbound_label_panics() {
        let mut b = BytecodeBuilder::new();
        let nowhere = b.label();
        b.cjmpz(nowhere);
        b.into_bytes();
    }

    #[test]
    fn image_builder_interns_strings() {
        let mut ib = ImageBuilder::new();
        let a = ib.string("cons");
        let b = ib.string("Nil");
        assert_eq!(ib.string("cons"), a);
        assert_eq!(b, 5);
    }

    // ── loader ─────────────────────────────────────────────────────

    #[test]
    fn loads_sections() {
        let mut ib = ImageBuilder::new();
        ib.globals(3).public("main", 0);
        let mut code = BytecodeBuilder::new();
        code.stop();
        let image = image_of(&ib, code);
        assert_eq!(image.global_area_size(), 3);
        assert_eq!(image.new_global_area().len(), 3);
        assert_eq!(image.string_table(), b"main\0");
        assert_eq!(image.public_symbols(), &[PublicSymbol { name: 0, offset: 0 }]);
        assert_eq!(image.public_name(0), Some(&b"main"[..]));
        assert_eq!(image.public_offset(0), Some(0));
        assert_eq!(image.code(), &[0xffu8]);
    }

    #[test]
    fn short_header_is_truncated() {
        let err = ProgramImage::parse(&[1, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Truncated { section: "header", needed: 12, available: 5 }
        ));
    }

    #[test]
    fn negative_header_field_is_rejected() {
        let err = ProgramImage::parse(&header(0, -1, 0)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::NegativeSize { field: "global area size", value: -1 }
        ));
    }

    #[test]
    fn short_string_table_is_truncated() {
        let mut bytes = header(10, 0, 0);
        bytes.extend_from_slice(b"abc");
        let err = ProgramImage::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Truncated { section: "string table", needed: 10, available: 3 }
        ));
    }

    #[test]
    fn symbol_outside_string_table_is_rejected() {
        let mut bytes = header(2, 0, 1);
        bytes.extend_from_slice(&100i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(b"a\0");
        let err = ProgramImage::parse(&bytes).unwrap_err();
        assert!(matches!(err, LoadError::BadSymbol { index: 0, offset: 100 }));
    }

    #[test]
    fn reads_image_from_file() {
        use std::io::Write;

        let mut ib = ImageBuilder::new();
        ib.globals(1);
        let mut code = BytecodeBuilder::new();
        code.const_(1);
        code.stop();
        let bytes = ib.finish(&code.into_bytes());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        let image = ProgramImage::read_file(file.path()).unwrap();
        assert_eq!(image.code().len(), 6);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            ProgramImage::read_file(&missing),
            Err(LoadError::Io { .. })
        ));
    }

    // ── disassembler ───────────────────────────────────────────────

    #[test]
    fn dump_lists_header_and_code() {
        let mut ib = ImageBuilder::new();
        ib.globals(1).public("main", 0);
        let cons = ib.string("cons");
        let mut b = BytecodeBuilder::new();
        let exit = b.label();
        b.begin(2, 0);
        b.const_(5);
        b.write();
        b.ld(Mem::Local, 1);
        b.sexp(cons, 2);
        b.binop(BinOp::Le);
        b.cjmpz(exit);
        b.bind(exit);
        b.end();
        b.stop();
        let image = image_of(&ib, b);

        let mut out = Vec::new();
        dump(&image, &mut out).unwrap();
        let expected = "\
String table size       : 10
Global area size        : 1
Number of public symbols: 1
Public symbols          :
   0x00000000: main
Code:
0x00000000:\tBEGIN\t2 0
0x00000009:\tCONST\t5
0x0000000e:\tCALL\tLwrite
0x0000000f:\tLD\tL(1)
0x00000014:\tSEXP\tcons 2
0x0000001d:\tBINOP\t<=
0x0000001e:\tCJMPz\t0x00000023
0x00000023:\tEND
0x00000024:\t<end>
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn disassembly_stops_at_end_of_code() {
        let mut b = BytecodeBuilder::new();
        let entry = b.label();
        b.bind(entry);
        b.closure(entry, &[(Mem::Arg, 0), (Mem::Capture, 1)]);
        let image = image_of(&ImageBuilder::new(), b);
        let mut out = Vec::new();
        disassemble(&image, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0x00000000:\tCLOSURE\t0x00000000 A(0) C(1)\n0x00000013:\t<end>\n"
        );
    }
}
