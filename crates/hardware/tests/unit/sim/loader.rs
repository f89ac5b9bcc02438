//! Program Loading Tests.
//!
//! Covers the JSON image format, ELF32 executables built byte by byte, address-space checks
//! and the byte order used for loaded words.

use std::io::Write;

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::NamedTempFile;

use mipsim_core::common::constants::{DATA_BASE, TEXT_BASE};
use mipsim_core::common::error::SimError;
use mipsim_core::config::Config;
use mipsim_core::sim::loader::{CodeSegment, DataSegment};
use mipsim_core::sim::simulator::Finish;
use mipsim_core::soc::memory::Memory;
use mipsim_core::{ProgramImage, Simulator};

use crate::common::asm::*;
use crate::common::harness::{TestContext, image};

fn temp_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents).expect("write temp file");
    file
}

// ══════════════════════════════════════════════════════════
// 1. JSON images
// ══════════════════════════════════════════════════════════

#[test]
fn json_image_loads_from_file() {
    let words = [addiu(T0, ZERO, 7), addu(T1, T0, T0)];
    let json = format!(
        r#"{{
            "text": {{ "address": {TEXT_BASE}, "words": [{}, {}] }},
            "data": {{ "address": {DATA_BASE}, "bytes": [1, 2, 3] }},
            "labels": {{ "main": {TEXT_BASE}, "table": {DATA_BASE} }}
        }}"#,
        words[0], words[1]
    );
    let file = temp_file(json.as_bytes());

    let image = ProgramImage::from_file(file.path()).expect("valid image");
    assert_eq!(image.entry, TEXT_BASE);
    assert_eq!(image.text.words, words);
    assert_eq!(image.data.bytes, [1, 2, 3]);
    assert_eq!(image.label("table"), Some(DATA_BASE));
    assert_eq!(image.label("missing"), None);

    let mut ctx = TestContext::new(&Config::default(), &image);
    assert_eq!(ctx.sim.labels()["main"], TEXT_BASE);
    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T1), 14);
}

#[test]
fn non_utf8_file_is_rejected() {
    let file = temp_file(&[0xFF, 0xFE, 0x00, 0x80]);
    assert!(matches!(
        ProgramImage::from_file(file.path()),
        Err(SimError::Program(_))
    ));
}

#[test]
fn malformed_json_is_rejected() {
    let file = temp_file(br#"{ "text": 5 }"#);
    assert!(matches!(ProgramImage::from_file(file.path()), Err(SimError::Json(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = ProgramImage::from_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(SimError::Io(_))));
}

#[test]
fn segments_below_user_space_are_rejected() {
    let mut image = image(&[nop()]);
    image.text = CodeSegment::new(0x1000, vec![nop()]);
    image.entry = 0x1000;
    assert!(matches!(
        Simulator::new(&Config::default(), &image),
        Err(SimError::Program(_))
    ));
}

#[test]
fn segment_may_end_at_the_top_of_memory() {
    let mut image = image(&[nop()]);
    image.data = DataSegment::new(0xFFFF_FFF8, (1..=8).collect());
    let sim = Simulator::new(&Config::default(), &image).expect("segment fits");

    let memory = &sim.cpu().system.memory;
    assert_eq!(memory.peek_word(0xFFFF_FFF8), 0x0403_0201);
    assert_eq!(memory.peek_word(0xFFFF_FFFC), 0x0807_0605);

    image.data = DataSegment::new(0xFFFF_FFF8, vec![0; 9]);
    assert!(matches!(
        Simulator::new(&Config::default(), &image),
        Err(SimError::Program(_))
    ));
}

// ══════════════════════════════════════════════════════════
// 2. ELF executables
// ══════════════════════════════════════════════════════════

const PT_LOAD: u32 = 1;
const EM_MIPS: u16 = 8;
const EM_386: u16 = 3;

struct Segment {
    address: u32,
    bytes: Vec<u8>,
    mem_size: u32,
    flags: u32,
}

/// Little-endian ELF32 executable with one program header per segment and no sections.
fn elf(machine: u16, entry: u32, segments: &[Segment]) -> Vec<u8> {
    const EHSIZE: u16 = 52;
    const PHENTSIZE: u16 = 32;
    let phnum = u16::try_from(segments.len()).expect("few segments");

    let mut out = Vec::new();
    out.extend_from_slice(b"\x7fELF");
    out.extend_from_slice(&[1, 1, 1, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&machine.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&u32::from(EHSIZE).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&EHSIZE.to_le_bytes());
    out.extend_from_slice(&PHENTSIZE.to_le_bytes());
    out.extend_from_slice(&phnum.to_le_bytes());
    out.extend_from_slice(&40u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    assert_eq!(out.len(), usize::from(EHSIZE));

    let mut offset = u32::from(EHSIZE) + u32::from(PHENTSIZE) * u32::from(phnum);
    for segment in segments {
        let file_size = u32::try_from(segment.bytes.len()).expect("small segment");
        for field in [
            PT_LOAD,
            offset,
            segment.address,
            segment.address,
            file_size,
            segment.mem_size,
            segment.flags,
            4,
        ] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        offset += file_size;
    }
    for segment in segments {
        out.extend_from_slice(&segment.bytes);
    }
    out
}

fn elf_program(machine: u16) -> Vec<u8> {
    let text = [lui(S0, 0x1001), lw(T0, 0, S0), lw(T1, 8, S0)];
    elf(
        machine,
        TEXT_BASE,
        &[
            Segment {
                address: TEXT_BASE,
                bytes: text.iter().flat_map(|w| w.to_le_bytes()).collect(),
                mem_size: 12,
                flags: 0b101,
            },
            Segment {
                address: DATA_BASE,
                bytes: 42u32.to_le_bytes().to_vec(),
                mem_size: 12,
                flags: 0b110,
            },
        ],
    )
}

#[test]
fn elf_segments_become_code_and_data() {
    let image = ProgramImage::from_elf(&elf_program(EM_MIPS)).expect("valid ELF");

    assert_eq!(image.entry, TEXT_BASE);
    assert_eq!(image.big_endian, Some(false));
    assert_eq!(image.text.address, TEXT_BASE);
    assert_eq!(image.text.words, [lui(S0, 0x1001), lw(T0, 0, S0), lw(T1, 8, S0)]);
    // The segment is zero-filled up to its memory size.
    assert_eq!(image.data, DataSegment::new(DATA_BASE, vec![42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
}

#[test]
fn elf_program_runs_from_file() {
    let file = temp_file(&elf_program(EM_MIPS));
    let image = ProgramImage::from_file(file.path()).expect("ELF detected");
    let mut ctx = TestContext::new(&Config::default(), &image);

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0), 42);
    assert_eq!(ctx.gpr(T1), 0);
}

#[rstest]
#[case::wrong_machine(elf_program(EM_386))]
#[case::truncated(elf_program(EM_MIPS)[..40].to_vec())]
fn invalid_elf_is_rejected(#[case] bytes: Vec<u8>) {
    assert!(matches!(ProgramImage::from_elf(&bytes), Err(SimError::Elf(_))));
    let file = temp_file(&bytes);
    assert!(matches!(ProgramImage::from_file(file.path()), Err(SimError::Elf(_))));
}

// ══════════════════════════════════════════════════════════
// 3. Byte order
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::little_endian(false, None, 0x7856_3412)]
#[case::big_endian(true, None, 0x1234_5678)]
#[case::image_overrides_config(false, Some(true), 0x1234_5678)]
fn words_follow_the_configured_byte_order(
    #[case] config_big_endian: bool,
    #[case] image_big_endian: Option<bool>,
    #[case] expected: u32,
) {
    let mut config = Config::default();
    config.memory.big_endian = config_big_endian;
    let mut image = image(&[lui(S0, 0x1001), lw(T0, 0, S0), lb(T1, 0, S0)]);
    image.data = DataSegment::new(DATA_BASE, vec![0x12, 0x34, 0x56, 0x78]);
    image.big_endian = image_big_endian;
    let mut ctx = TestContext::new(&config, &image);

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0), expected);
    // Bytes are addressed the same way in both orders.
    assert_eq!(ctx.gpr(T1), 0x12);
}
