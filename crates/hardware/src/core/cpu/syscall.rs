//! System Call Services.
//!
//! This module implements the built-in handler behind `SYSCALL` when the kernel handler is not
//! used. The service is selected by `$v0`; arguments come from `$a0`-`$a2`. It provides:
//! 1. **Console:** printing and reading integers, strings and characters through the virtual
//!    descriptors 0, 1 and 2.
//! 2. **Files:** open, read, write and close on the in-memory file system.
//! 3. **Process:** heap allocation, exit and the random generator.
//!
//! Services run at WriteBack, when every older instruction has committed, so arguments are
//! read from the committed register file. Results are returned rather than written so the
//! instruction can release its locks in the same step.

use tracing::debug;

use super::Cpu;
use crate::common::error::Trap;
use crate::common::reg::RegId;
use crate::isa::privileged::cause::InterruptCause;
use crate::soc::fs::{STDIN, STDOUT};

/// Longest string printed by service 4.
const MAX_STRING_LEN: usize = 64 * 1024;

/// Longest line accepted by service 5.
const MAX_INT_LINE: usize = 32;

/// Longest buffer service 15 writes; larger requests fail with -1.
const MAX_WRITE_LEN: u32 = 1 << 20;

/// Service numbers selected by `$v0`.
pub mod service {
    /// Print `$a0` as a signed integer.
    pub const PRINT_INT: u32 = 1;
    /// Print the NUL-terminated string at `$a0`.
    pub const PRINT_STRING: u32 = 4;
    /// Read an integer line into `$v0`.
    pub const READ_INT: u32 = 5;
    /// Read at most `$a1 - 1` characters into the buffer at `$a0`.
    pub const READ_STRING: u32 = 8;
    /// Allocate `$a0` bytes of heap, address in `$v0`.
    pub const SBRK: u32 = 9;
    /// Terminate with code 0.
    pub const EXIT: u32 = 10;
    /// Print the low byte of `$a0`.
    pub const PRINT_CHAR: u32 = 11;
    /// Read one character into `$v0`.
    pub const READ_CHAR: u32 = 12;
    /// Open the file named at `$a0` with flags `$a1`, descriptor in `$v0`.
    pub const OPEN_FILE: u32 = 13;
    /// Read up to `$a2` bytes from descriptor `$a0` into `$a1`.
    pub const READ_FILE: u32 = 14;
    /// Write `$a2` bytes at `$a1` to descriptor `$a0`.
    pub const WRITE_FILE: u32 = 15;
    /// Close descriptor `$a0`.
    pub const CLOSE_FILE: u32 = 16;
    /// Terminate with code `$a0`.
    pub const EXIT_WITH_VALUE: u32 = 17;
    /// Print `$a0` as `0x` followed by eight hex digits.
    pub const PRINT_HEX: u32 = 34;
    /// Print `$a0` as an unsigned integer.
    pub const PRINT_UNSIGNED: u32 = 36;
    /// Reseed the generator with `$a1`.
    pub const SET_SEED: u32 = 40;
    /// Random word into `$a0`.
    pub const RANDOM_INT: u32 = 41;
    /// Random value in `[0, $a1)` into `$a0`.
    pub const RANDOM_RANGE: u32 = 42;
}

/// Register results of a service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyscallResult {
    /// New value of `$v0`, if the service returns one.
    pub v0: Option<u32>,
    /// New value of `$a0`, if the service returns one.
    pub a0: Option<u32>,
}

impl SyscallResult {
    const fn v0(value: u32) -> Self {
        Self {
            v0: Some(value),
            a0: None,
        }
    }

    const fn a0(value: u32) -> Self {
        Self {
            v0: None,
            a0: Some(value),
        }
    }
}

impl Cpu {
    /// Runs system call service `code`.
    ///
    /// # Arguments
    ///
    /// * `code` - Service number (the committed `$v0`).
    ///
    /// # Returns
    ///
    /// The registers to update, or a trap for unknown services, invalid arguments and
    /// address errors on the argument buffers.
    pub fn syscall(&mut self, code: u32) -> Result<SyscallResult, Trap> {
        let a0 = self.regs.get(RegId::A0);
        let a1 = self.regs.get(RegId::A1);
        let a2 = self.regs.get(RegId::A2);
        debug!(code, a0, a1, a2, "syscall");

        let result = match code {
            service::PRINT_INT => {
                self.print((a0 as i32).to_string().as_bytes());
                SyscallResult::default()
            }
            service::PRINT_STRING => {
                let text = self.read_c_string(a0, MAX_STRING_LEN)?;
                self.print(&text);
                SyscallResult::default()
            }
            service::READ_INT => {
                let line = self.read_console(MAX_INT_LINE, Some(b'\n'));
                let value = String::from_utf8_lossy(&line)
                    .trim()
                    .parse::<i32>()
                    .unwrap_or(0);
                SyscallResult::v0(value as u32)
            }
            service::READ_STRING => {
                self.read_string(a0, a1)?;
                SyscallResult::default()
            }
            service::SBRK => {
                let address = self.system.memory.allocate(a0, &mut self.journal);
                SyscallResult::v0(address)
            }
            service::EXIT => {
                self.system.request_exit(0, &mut self.journal);
                SyscallResult::default()
            }
            service::PRINT_CHAR => {
                self.print(&[a0 as u8]);
                SyscallResult::default()
            }
            service::READ_CHAR => {
                let value = self
                    .read_console(1, None)
                    .first()
                    .map_or(u32::MAX, |&b| u32::from(b));
                SyscallResult::v0(value)
            }
            service::OPEN_FILE => {
                let name = self.read_c_string(a0, MAX_STRING_LEN)?;
                let name = String::from_utf8_lossy(&name).into_owned();
                let fd = self.system.files.open(&name, a1, &mut self.journal);
                SyscallResult::v0(fd as u32)
            }
            service::READ_FILE => SyscallResult::v0(self.read_file(a0 as i32, a1, a2)? as u32),
            service::WRITE_FILE if a2 > MAX_WRITE_LEN => {
                debug!(len = a2, "write request too large");
                SyscallResult::v0(u32::MAX)
            }
            service::WRITE_FILE => {
                let mut bytes = Vec::with_capacity(a2 as usize);
                for i in 0..a2 {
                    bytes.push(self.read_byte(a1.wrapping_add(i))?);
                }
                let written = self
                    .system
                    .files
                    .write(a0 as i32, &bytes, &mut self.journal);
                SyscallResult::v0(written as u32)
            }
            service::CLOSE_FILE => {
                let _ = self.system.files.close(a0 as i32, &mut self.journal);
                SyscallResult::default()
            }
            service::EXIT_WITH_VALUE => {
                self.system.request_exit(a0 as i32, &mut self.journal);
                SyscallResult::default()
            }
            service::PRINT_HEX => {
                self.print(format!("0x{a0:08x}").as_bytes());
                SyscallResult::default()
            }
            service::PRINT_UNSIGNED => {
                self.print(a0.to_string().as_bytes());
                SyscallResult::default()
            }
            service::SET_SEED => {
                self.system.seed(u64::from(a1), &mut self.journal);
                SyscallResult::default()
            }
            service::RANDOM_INT => SyscallResult::a0(self.system.next_random(&mut self.journal)),
            service::RANDOM_RANGE => {
                if a1 as i32 <= 0 {
                    return Err(Trap::new(InterruptCause::Syscall));
                }
                SyscallResult::a0(self.system.next_random(&mut self.journal) % a1)
            }
            _ => return Err(Trap::new(InterruptCause::Syscall)),
        };
        Ok(result)
    }

    fn print(&mut self, bytes: &[u8]) {
        let _ = self.system.files.write(1, bytes, &mut self.journal);
    }

    fn read_console(&mut self, max: usize, stop: Option<u8>) -> Vec<u8> {
        self.system
            .files
            .read(0, max, stop, &mut self.journal)
            .unwrap_or_default()
    }

    /// Reads a line of at most `length - 1` characters and NUL-terminates it.
    fn read_string(&mut self, buffer: u32, length: u32) -> Result<(), Trap> {
        if length == 0 {
            return Ok(());
        }
        let line = self.read_console(length as usize - 1, Some(b'\n'));
        let mut address = buffer;
        for &b in &line {
            self.write_byte(address, b)?;
            address = address.wrapping_add(1);
        }
        self.write_byte(address, 0)
    }

    fn read_file(&mut self, fd: i32, buffer: u32, max: u32) -> Result<i32, Trap> {
        let Some(bytes) = self
            .system
            .files
            .read(fd, max as usize, None, &mut self.journal)
        else {
            return Ok(-1);
        };
        let mut address = buffer;
        for &b in &bytes {
            self.write_byte(address, b)?;
            address = address.wrapping_add(1);
        }
        Ok(i32::try_from(bytes.len()).unwrap_or(i32::MAX))
    }

    /// Console output written so far.
    pub fn console_output(&self) -> String {
        self.system.files.console_output()
    }

    /// Queues text for the console input descriptor.
    pub fn push_console_input(&mut self, text: &str) {
        debug!(len = text.len(), file = STDIN, "console input");
        self.system.files.push_input(text);
    }
}
