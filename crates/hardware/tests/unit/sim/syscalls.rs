//! System Call Service Tests.
//!
//! Programs select a service through `$v0` and run it at WriteBack. Console output and
//! files live in the in-memory file system, so every test inspects them directly.

use pretty_assertions::assert_eq;
use rstest::rstest;

use mipsim_core::ProgramImage;
use mipsim_core::common::constants::DATA_BASE;
use mipsim_core::config::PipelineKind;
use mipsim_core::core::cpu::syscall::service;
use mipsim_core::isa::privileged::cause::InterruptCause;
use mipsim_core::sim::loader::DataSegment;
use mipsim_core::sim::simulator::Finish;
use mipsim_core::soc::fs::O_WRONLY;
use mipsim_core::soc::memory::Memory;

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

/// Image whose static data is `data` at `DATA_BASE`.
fn with_data(text: &[u32], data: &[u8]) -> ProgramImage {
    let mut image = image(text);
    image.data = DataSegment::new(DATA_BASE, data.to_vec());
    image
}

fn classic(image: &ProgramImage) -> TestContext {
    TestContext::new(&config(PipelineKind::Classic), image)
}

#[test]
fn console_printing_services() {
    let mut text = Vec::new();
    text.extend(la(A0, DATA_BASE));
    text.extend(call(service::PRINT_STRING));
    text.push(addiu(A0, ZERO, -7));
    text.extend(call(service::PRINT_INT));
    text.push(addiu(A0, ZERO, i32::from(b'A')));
    text.extend(call(service::PRINT_CHAR));
    text.extend(la(A0, 0xDEAD_BEEF));
    text.extend(call(service::PRINT_HEX));
    text.push(addiu(A0, ZERO, -1));
    text.extend(call(service::PRINT_UNSIGNED));
    text.extend(exit_with(0));
    let mut ctx = classic(&with_data(&text, b"hi \0"));

    assert_eq!(ctx.run_to_end(), Finish::Exit(0));
    assert_eq!(ctx.sim.console_output(), "hi -7A0xdeadbeef4294967295");
}

#[test]
fn console_reading_services() {
    let buffer = DATA_BASE + 16;
    let mut text = Vec::new();
    text.extend(call(service::READ_INT));
    text.push(addu(S0, V0, ZERO));
    text.extend(la(A0, buffer));
    text.push(addiu(A1, ZERO, 16));
    text.extend(call(service::READ_STRING));
    text.extend(call(service::READ_CHAR));
    text.push(addu(T0, V0, ZERO));
    text.extend(call(service::READ_CHAR));
    text.push(addu(T1, V0, ZERO));
    text.extend(la(A0, buffer));
    text.extend(call(service::PRINT_STRING));
    let mut ctx = classic(&image(&text));
    ctx.sim.push_console_input("  42\nhello\nZ");

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(S0), 42);
    assert_eq!(ctx.gpr(T0), u32::from(b'Z'));
    // End of input.
    assert_eq!(ctx.gpr(T1), u32::MAX);
    assert_eq!(ctx.sim.console_output(), "hello\n");
}

#[test]
fn read_string_truncates_to_buffer_length() {
    let buffer = DATA_BASE;
    let mut text = Vec::new();
    text.extend(la(A0, buffer));
    text.push(addiu(A1, ZERO, 4));
    text.extend(call(service::READ_STRING));
    let mut ctx = classic(&image(&text));
    ctx.sim.push_console_input("abcdef\n");

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    let memory = &ctx.sim.cpu().system.memory;
    let stored: Vec<u8> = (0..4).map(|i| memory.peek_byte(buffer + i)).collect();
    assert_eq!(stored, b"abc\0");
}

#[test]
fn file_services_write_then_read_back() {
    let name = DATA_BASE;
    let payload = DATA_BASE + 8;
    let buffer = DATA_BASE + 16;
    let mut text = Vec::new();
    // fd = open("out.txt", O_WRONLY)
    text.extend(la(A0, name));
    text.push(addiu(A1, ZERO, O_WRONLY as i32));
    text.extend(call(service::OPEN_FILE));
    text.push(addu(S0, V0, ZERO));
    // write(fd, payload, 2); close(fd)
    text.push(addu(A0, S0, ZERO));
    text.extend(la(A1, payload));
    text.push(addiu(A2, ZERO, 2));
    text.extend(call(service::WRITE_FILE));
    text.push(addu(T2, V0, ZERO));
    text.push(addu(A0, S0, ZERO));
    text.extend(call(service::CLOSE_FILE));
    // fd = open("out.txt", O_RDONLY); read(fd, buffer, 16)
    text.extend(la(A0, name));
    text.push(addiu(A1, ZERO, 0));
    text.extend(call(service::OPEN_FILE));
    text.push(addu(S1, V0, ZERO));
    text.push(addu(A0, S1, ZERO));
    text.extend(la(A1, buffer));
    text.push(addiu(A2, ZERO, 16));
    text.extend(call(service::READ_FILE));
    text.push(addu(T0, V0, ZERO));
    text.extend(exit_with(0));
    let mut ctx = classic(&with_data(&text, b"out.txt\0hi\0\0\0\0\0\0"));

    assert_eq!(ctx.run_to_end(), Finish::Exit(0));
    assert_eq!(ctx.gpr(S0), 3);
    assert_eq!(ctx.gpr(T2), 2);
    assert_eq!(ctx.gpr(S1), 4);
    assert_eq!(ctx.gpr(T0), 2);
    let files = &ctx.sim.cpu().system.files;
    assert_eq!(files.file("out.txt"), Some(&b"hi"[..]));
    assert!(files.handle(3).is_none());
    let memory = &ctx.sim.cpu().system.memory;
    assert_eq!([memory.peek_byte(buffer), memory.peek_byte(buffer + 1)], *b"hi");
}

#[test]
fn missing_file_and_closed_descriptor_report_failure() {
    let mut text = Vec::new();
    text.extend(la(A0, DATA_BASE));
    text.push(addiu(A1, ZERO, 0));
    text.extend(call(service::OPEN_FILE));
    text.push(addu(T0, V0, ZERO));
    text.push(addiu(A0, ZERO, 9));
    text.extend(la(A1, DATA_BASE));
    text.push(addiu(A2, ZERO, 1));
    text.extend(call(service::WRITE_FILE));
    text.push(addu(T1, V0, ZERO));
    let mut ctx = classic(&with_data(&text, b"nope\0"));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0) as i32, -1);
    assert_eq!(ctx.gpr(T1) as i32, -1);
}

#[test]
fn mounted_file_is_readable() {
    let buffer = DATA_BASE + 8;
    let mut text = Vec::new();
    text.extend(la(A0, DATA_BASE));
    text.push(addiu(A1, ZERO, 0));
    text.extend(call(service::OPEN_FILE));
    text.push(addu(A0, V0, ZERO));
    text.extend(la(A1, buffer));
    text.push(addiu(A2, ZERO, 3));
    text.extend(call(service::READ_FILE));
    text.push(addu(T0, V0, ZERO));
    text.extend(la(S0, buffer));
    text.push(lb(T1, 2, S0));
    let mut ctx = classic(&with_data(&text, b"in.txt\0"));
    ctx.sim.cpu_mut().system.files.mount("in.txt", b"xyz!".to_vec());

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0), 3);
    assert_eq!(ctx.gpr(T1), u32::from(b'z'));
}

#[test]
fn sbrk_hands_out_consecutive_blocks_after_static_data() {
    let mut text = Vec::new();
    text.push(addiu(A0, ZERO, 16));
    text.extend(call(service::SBRK));
    text.push(addu(T0, V0, ZERO));
    text.push(addiu(A0, ZERO, 8));
    text.extend(call(service::SBRK));
    text.push(addu(T1, V0, ZERO));
    let mut ctx = classic(&with_data(&text, &[1, 2, 3, 4, 5]));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert!(ctx.gpr(T0) >= DATA_BASE + 8, "{:#x}", ctx.gpr(T0));
    assert_eq!(ctx.gpr(T1) - ctx.gpr(T0), 16);
}

#[rstest]
#[case::exit(service::EXIT, Finish::Exit(0))]
#[case::exit_with_value(service::EXIT_WITH_VALUE, Finish::Exit(-4))]
fn exit_services(#[case] code: u32, #[case] expected: Finish) {
    let mut text = vec![addiu(A0, ZERO, -4)];
    text.extend(call(code));
    text.push(addiu(T0, ZERO, 1));
    let mut ctx = classic(&image(&text));

    assert_eq!(ctx.run_to_end(), expected);
    assert_eq!(ctx.gpr(T0), 0);
}

fn random_program(seed: i32, bound: i32) -> Vec<u32> {
    let mut text = vec![addiu(A1, ZERO, seed)];
    text.extend(call(service::SET_SEED));
    text.extend(call(service::RANDOM_INT));
    text.push(addu(T0, A0, ZERO));
    text.push(addiu(A1, ZERO, bound));
    text.extend(call(service::RANDOM_RANGE));
    text.push(addu(T1, A0, ZERO));
    text
}

#[test]
fn seeded_random_numbers_are_reproducible() {
    let run = |seed| {
        let mut ctx = classic(&image(&random_program(seed, 10)));
        assert_eq!(ctx.run_to_end(), Finish::Drained);
        (ctx.gpr(T0), ctx.gpr(T1))
    };

    let (word, bounded) = run(7);
    assert!(bounded < 10);
    assert_eq!(run(7), (word, bounded));
    assert_ne!(run(8).0, word);
}

#[rstest]
#[case::empty_range(random_program(1, 0))]
#[case::negative_range(random_program(1, -3))]
#[case::unknown_service(call(99).to_vec())]
fn invalid_requests_raise_syscall_exceptions(#[case] text: Vec<u32>) {
    let mut ctx = classic(&image(&text));

    match ctx.run_to_end() {
        Finish::Fatal { trap, .. } => assert_eq!(trap.cause, InterruptCause::Syscall),
        other => panic!("expected a syscall exception, got {other:?}"),
    }
}

#[test]
fn services_run_on_every_organisation() {
    let mut text = vec![addiu(A0, ZERO, 12)];
    text.extend(call(service::PRINT_INT));
    text.extend(exit_with(2));

    for kind in [PipelineKind::SingleCycle, PipelineKind::Classic, PipelineKind::MultiUnit] {
        let mut ctx = TestContext::new(&config(kind), &image(&text));
        assert_eq!(ctx.run_to_end(), Finish::Exit(2), "{kind:?}");
        assert_eq!(ctx.sim.console_output(), "12", "{kind:?}");
    }
}
