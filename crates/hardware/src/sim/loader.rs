//! Program Image Loading.
//!
//! This module turns the output of an external assembler into initial simulator state. It
//! performs:
//! 1. **Parsing:** reads a JSON image (`serde_json`) or a 32-bit MIPS ELF executable (`object`).
//! 2. **Placement:** copies code and data segments into main memory without journaling.
//! 3. **Fetch bounds:** registers each code segment so fetch stops at its end.
//! 4. **Initial state:** sets the entry point, the heap pointer and the byte order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use object::read::elf::ElfFile32;
use object::{Architecture, Endianness, Object, ObjectSegment, ObjectSymbol, SegmentFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::constants::{
    DATA_BASE, KERNEL_DATA_BASE, KERNEL_TEXT_BASE, LOWEST_VALID_ADDRESS, TEXT_BASE, WORD_SIZE,
};
use crate::common::error::{SimError, SimResult};
use crate::common::reg::RegId;
use crate::core::Cpu;

/// ELF executable flag of a program header.
const PF_X: u32 = 1;

/// Largest zero gap filled when two ELF segments of the same kind are merged.
const MAX_SEGMENT_GAP: u32 = 1 << 20;

/// Instruction words placed at `address`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSegment {
    /// Address of the first word.
    pub address: u32,
    /// Encoded instructions.
    #[serde(default)]
    pub words: Vec<u32>,
}

impl CodeSegment {
    /// Creates a segment.
    pub const fn new(address: u32, words: Vec<u32>) -> Self {
        Self { address, words }
    }

    fn end(&self) -> u64 {
        u64::from(self.address) + self.words.len() as u64 * u64::from(WORD_SIZE)
    }
}

/// Raw bytes placed at `address`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSegment {
    /// Address of the first byte.
    pub address: u32,
    /// Contents.
    #[serde(default)]
    pub bytes: Vec<u8>,
}

impl DataSegment {
    /// Creates a segment.
    pub const fn new(address: u32, bytes: Vec<u8>) -> Self {
        Self { address, bytes }
    }

    fn end(&self) -> u64 {
        u64::from(self.address) + self.bytes.len() as u64
    }
}

/// An assembled program.
///
/// # Examples
///
/// ```
/// use mipsim_core::ProgramImage;
///
/// let json = r#"{
///     "entry": 4194304,
///     "text": { "address": 4194304, "words": [604110853, 12] },
///     "labels": { "main": 4194304 }
/// }"#;
///
/// let image = ProgramImage::from_json(json).unwrap();
/// assert_eq!(image.text.words.len(), 2);
/// assert_eq!(image.labels["main"], image.entry);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Address of the first instruction executed.
    #[serde(default = "ProgramImage::default_entry")]
    pub entry: u32,
    /// User code.
    #[serde(default = "ProgramImage::default_text")]
    pub text: CodeSegment,
    /// User static data; the heap starts at the first free word after it.
    #[serde(default = "ProgramImage::default_data")]
    pub data: DataSegment,
    /// Kernel code, including the exception handler at `0x80000180`.
    #[serde(default = "ProgramImage::default_kernel_text")]
    pub kernel_text: CodeSegment,
    /// Kernel data.
    #[serde(default = "ProgramImage::default_kernel_data")]
    pub kernel_data: DataSegment,
    /// Symbol table.
    #[serde(default)]
    pub labels: BTreeMap<String, u32>,
    /// Byte order required by the program, if it has one.
    #[serde(default)]
    pub big_endian: Option<bool>,
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self {
            entry: Self::default_entry(),
            text: Self::default_text(),
            data: Self::default_data(),
            kernel_text: Self::default_kernel_text(),
            kernel_data: Self::default_kernel_data(),
            labels: BTreeMap::new(),
            big_endian: None,
        }
    }
}

impl ProgramImage {
    fn default_entry() -> u32 {
        TEXT_BASE
    }

    fn default_text() -> CodeSegment {
        CodeSegment::new(TEXT_BASE, Vec::new())
    }

    fn default_data() -> DataSegment {
        DataSegment::new(DATA_BASE, Vec::new())
    }

    fn default_kernel_text() -> CodeSegment {
        CodeSegment::new(KERNEL_TEXT_BASE, Vec::new())
    }

    fn default_kernel_data() -> DataSegment {
        DataSegment::new(KERNEL_DATA_BASE, Vec::new())
    }

    /// Image holding only user code at the text base.
    pub fn from_words(words: &[u32]) -> Self {
        Self {
            text: CodeSegment::new(TEXT_BASE, words.to_vec()),
            ..Self::default()
        }
    }

    /// Parses a JSON image.
    pub fn from_json(text: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a program file, detecting ELF by its magic number and JSON otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        debug!(path = %path.display(), len = bytes.len(), "loading program");
        if bytes.starts_with(b"\x7fELF") {
            Self::from_elf(&bytes)
        } else {
            let text = String::from_utf8(bytes)
                .map_err(|e| SimError::Program(format!("neither ELF nor UTF-8 JSON: {e}")))?;
            Self::from_json(&text)
        }
    }

    /// Extracts the loadable segments, entry point and symbols of a MIPS32 ELF executable.
    ///
    /// Executable segments become code; the others become data. Segments at or above
    /// `0x80000000` belong to the kernel.
    pub fn from_elf(bytes: &[u8]) -> SimResult<Self> {
        let file = ElfFile32::<Endianness>::parse(bytes).map_err(|e| SimError::Elf(e.to_string()))?;
        if file.architecture() != Architecture::Mips {
            return Err(SimError::Elf(format!(
                "expected a MIPS executable, found {:?}",
                file.architecture()
            )));
        }
        let big_endian = !file.is_little_endian();
        let entry = u32::try_from(file.entry())
            .map_err(|_| SimError::Elf("entry point beyond 32 bits".into()))?;

        let mut image = Self {
            entry,
            big_endian: Some(big_endian),
            ..Self::default()
        };
        let mut text: Option<DataSegment> = None;
        let mut kernel_text: Option<DataSegment> = None;
        let mut data: Option<DataSegment> = None;
        let mut kernel_data: Option<DataSegment> = None;

        for segment in file.segments() {
            let address = u32::try_from(segment.address())
                .map_err(|_| SimError::Elf("segment address beyond 32 bits".into()))?;
            let mut contents = segment
                .data()
                .map_err(|e| SimError::Elf(e.to_string()))?
                .to_vec();
            let size = usize::try_from(segment.size())
                .map_err(|_| SimError::Elf("segment too large".into()))?;
            if size > contents.len() {
                contents.resize(size, 0);
            }
            if contents.is_empty() {
                continue;
            }
            let executable =
                matches!(segment.flags(), SegmentFlags::Elf { p_flags } if p_flags & PF_X != 0);
            let kernel = address >= KERNEL_TEXT_BASE;
            let target = match (executable, kernel) {
                (true, false) => &mut text,
                (true, true) => &mut kernel_text,
                (false, false) => &mut data,
                (false, true) => &mut kernel_data,
            };
            debug!(
                address = format_args!("{address:#010x}"),
                len = contents.len(),
                executable,
                "ELF segment"
            );
            merge(target, address, contents)?;
        }

        if let Some(segment) = text {
            image.text = to_code(segment, big_endian);
        }
        if let Some(segment) = kernel_text {
            image.kernel_text = to_code(segment, big_endian);
        }
        if let Some(segment) = data {
            image.data = segment;
        }
        if let Some(segment) = kernel_data {
            image.kernel_data = segment;
        }

        for symbol in file.symbols() {
            if !symbol.is_definition() {
                continue;
            }
            let Ok(name) = symbol.name() else {
                continue;
            };
            let Ok(address) = u32::try_from(symbol.address()) else {
                continue;
            };
            if !name.is_empty() {
                let _ = image.labels.insert(name.to_owned(), address);
            }
        }
        Ok(image)
    }

    /// Copies the program into `cpu` and sets its initial registers.
    ///
    /// Loading is not journaled; the loaded state is the reset state of the simulation.
    ///
    /// # Errors
    ///
    /// `SimError::Program` if a segment lies below the lowest valid address or wraps around
    /// the address space.
    pub fn load_into(&self, cpu: &mut Cpu) -> SimResult<()> {
        for (name, address, end) in [
            ("text", self.text.address, self.text.end()),
            ("data", self.data.address, self.data.end()),
            ("kernel_text", self.kernel_text.address, self.kernel_text.end()),
            ("kernel_data", self.kernel_data.address, self.kernel_data.end()),
        ] {
            if end == u64::from(address) {
                continue;
            }
            if address < LOWEST_VALID_ADDRESS || end > 1 << 32 {
                return Err(SimError::Program(format!(
                    "{name} segment [{address:#010x}, {end:#x}) outside the address space"
                )));
            }
        }

        if let Some(big_endian) = self.big_endian {
            cpu.system.memory.set_big_endian(big_endian, &mut cpu.journal);
        }
        let big_endian = cpu.system.memory.is_big_endian();

        for code in [&self.text, &self.kernel_text] {
            if code.words.is_empty() {
                continue;
            }
            let bytes: Vec<u8> = code
                .words
                .iter()
                .flat_map(|w| if big_endian { w.to_be_bytes() } else { w.to_le_bytes() })
                .collect();
            cpu.system.memory.load(code.address, &bytes);
            let end = u32::try_from(code.end()).unwrap_or(u32::MAX);
            cpu.layout.add(code.address, end);
        }
        for data in [&self.data, &self.kernel_data] {
            if !data.bytes.is_empty() {
                cpu.system.memory.load(data.address, &data.bytes);
            }
        }
        if !self.data.bytes.is_empty() {
            let end = u32::try_from(self.data.end()).unwrap_or(u32::MAX);
            let heap = end.saturating_add(WORD_SIZE - 1) & !(WORD_SIZE - 1);
            cpu.system.memory.set_next_data_address(heap);
        }

        if !cpu.layout.contains(self.entry) {
            warn!(entry = format_args!("{:#010x}", self.entry), "entry point outside loaded code");
        }
        cpu.regs.set_default(RegId::PC, self.entry);
        Ok(())
    }

    /// Address of `label`.
    pub fn label(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }
}

/// Appends `bytes` at `address` to the segment collected so far, zero-filling a short gap.
fn merge(target: &mut Option<DataSegment>, address: u32, bytes: Vec<u8>) -> SimResult<()> {
    let Some(segment) = target else {
        *target = Some(DataSegment::new(address, bytes));
        return Ok(());
    };
    let end = segment.end();
    let start = u64::from(address);
    if start < end || start - end > u64::from(MAX_SEGMENT_GAP) {
        return Err(SimError::Elf(format!(
            "segment at {address:#010x} cannot be merged with the one at {:#010x}",
            segment.address
        )));
    }
    let gap = usize::try_from(start - end).unwrap_or(0);
    segment.bytes.resize(segment.bytes.len() + gap, 0);
    segment.bytes.extend_from_slice(&bytes);
    Ok(())
}

/// Reinterprets a code segment as instruction words in the file's byte order.
fn to_code(segment: DataSegment, big_endian: bool) -> CodeSegment {
    let words = segment
        .bytes
        .chunks(WORD_SIZE as usize)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            if big_endian {
                u32::from_be_bytes(word)
            } else {
                u32::from_le_bytes(word)
            }
        })
        .collect();
    CodeSegment::new(segment.address, words)
}
