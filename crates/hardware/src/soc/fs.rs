//! In-Memory File System.
//!
//! Backs the file and console system calls. It provides:
//! 1. **Files:** named byte vectors that live only for the lifetime of the simulation.
//! 2. **Descriptors:** open handles with a mode and a position; 0, 1 and 2 are the console.
//! 3. **Reversibility:** opens, closes, writes and read positions are journaled.
//!
//! Console input is appended by the host with `push_input` and is not journaled: undoing a
//! read rewinds the descriptor, so the same input is read again.

use std::collections::BTreeMap;

use crate::sim::changes::{ChangeRecord, Journal};

/// Name of the console input file.
pub const STDIN: &str = "<stdin>";
/// Name of the console output file.
pub const STDOUT: &str = "<stdout>";
/// Name of the console error file.
pub const STDERR: &str = "<stderr>";

/// Open flag: read only.
pub const O_RDONLY: u32 = 0;
/// Open flag: write, creating or truncating.
pub const O_WRONLY: u32 = 1;
/// Open flag: write, creating, appending.
pub const O_APPEND: u32 = 9;

/// Access mode of a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads only.
    Read,
    /// Writes at the descriptor position.
    Write,
    /// Writes at the end of the file.
    Append,
}

/// An open descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFile {
    /// File the descriptor refers to.
    pub name: String,
    /// Access mode.
    pub mode: OpenMode,
    /// Byte offset of the next read or write.
    pub position: usize,
}

/// Files and descriptors of one simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystem {
    files: BTreeMap<String, Vec<u8>>,
    handles: BTreeMap<i32, OpenFile>,
    next_descriptor: i32,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    /// Creates a file system holding only the console files.
    pub fn new() -> Self {
        let mut fs = Self {
            files: BTreeMap::new(),
            handles: BTreeMap::new(),
            next_descriptor: 3,
        };
        for (fd, name, mode) in [
            (0, STDIN, OpenMode::Read),
            (1, STDOUT, OpenMode::Append),
            (2, STDERR, OpenMode::Append),
        ] {
            let _ = fs.files.insert(name.to_owned(), Vec::new());
            let _ = fs.handles.insert(
                fd,
                OpenFile {
                    name: name.to_owned(),
                    mode,
                    position: 0,
                },
            );
        }
        fs
    }

    /// Adds or replaces a file before the simulation starts. Not journaled.
    pub fn mount(&mut self, name: &str, contents: Vec<u8>) {
        let _ = self.files.insert(name.to_owned(), contents);
    }

    /// Contents of a file.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Open descriptor state.
    pub fn handle(&self, descriptor: i32) -> Option<&OpenFile> {
        self.handles.get(&descriptor)
    }

    /// Appends console input. Not journaled.
    pub fn push_input(&mut self, text: &str) {
        self.files
            .entry(STDIN.to_owned())
            .or_default()
            .extend_from_slice(text.as_bytes());
    }

    /// Everything written to the console output so far.
    pub fn console_output(&self) -> String {
        String::from_utf8_lossy(self.file(STDOUT).unwrap_or_default()).into_owned()
    }

    /// Everything written to the console error stream so far.
    pub fn console_errors(&self) -> String {
        String::from_utf8_lossy(self.file(STDERR).unwrap_or_default()).into_owned()
    }

    /// Opens `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - File name.
    /// * `flags` - `O_RDONLY`, `O_WRONLY` or `O_APPEND`.
    /// * `journal` - Change journal of the current cycle.
    ///
    /// # Returns
    ///
    /// The new descriptor, or -1 if the file does not exist (read) or the flags are invalid.
    pub fn open(&mut self, name: &str, flags: u32, journal: &mut Journal) -> i32 {
        let mode = match flags {
            O_RDONLY => OpenMode::Read,
            O_WRONLY => OpenMode::Write,
            O_APPEND => OpenMode::Append,
            _ => return -1,
        };
        let previous = self.files.get(name).cloned();
        if mode == OpenMode::Read && previous.is_none() {
            return -1;
        }
        let descriptor = self.next_descriptor;
        journal.record(ChangeRecord::FileOpen {
            descriptor,
            name: name.to_owned(),
            previous,
        });
        match mode {
            OpenMode::Write => {
                let _ = self.files.insert(name.to_owned(), Vec::new());
            }
            OpenMode::Append => {
                let _ = self.files.entry(name.to_owned()).or_default();
            }
            OpenMode::Read => {}
        }
        let _ = self.handles.insert(
            descriptor,
            OpenFile {
                name: name.to_owned(),
                mode,
                position: 0,
            },
        );
        self.next_descriptor += 1;
        descriptor
    }

    /// Closes a descriptor, returning 0 or -1 if it was not open.
    pub fn close(&mut self, descriptor: i32, journal: &mut Journal) -> i32 {
        match self.handles.remove(&descriptor) {
            Some(handle) => {
                journal.record(ChangeRecord::FileClose { descriptor, handle });
                0
            }
            None => -1,
        }
    }

    /// Writes `bytes` through a descriptor.
    ///
    /// # Returns
    ///
    /// The number of bytes written, or -1 if the descriptor is not open for writing.
    pub fn write(&mut self, descriptor: i32, bytes: &[u8], journal: &mut Journal) -> i32 {
        let Some(handle) = self.handles.get_mut(&descriptor) else {
            return -1;
        };
        if handle.mode == OpenMode::Read {
            return -1;
        }
        let data = self.files.entry(handle.name.clone()).or_default();
        let old_len = data.len();
        let old_position = handle.position;
        let start = if handle.mode == OpenMode::Append {
            old_len
        } else {
            old_position.min(old_len)
        };
        let end = start + bytes.len();
        let overwritten = data[start..end.min(old_len)].to_vec();
        journal.record(ChangeRecord::FileWrite {
            descriptor,
            old_len,
            old_position,
            overwritten,
        });
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        handle.position = end;
        i32::try_from(bytes.len()).unwrap_or(i32::MAX)
    }

    /// Reads up to `max` bytes, stopping after `stop` if given.
    ///
    /// # Returns
    ///
    /// The bytes read (empty at end of file), or `None` if the descriptor is not readable.
    pub fn read(
        &mut self,
        descriptor: i32,
        max: usize,
        stop: Option<u8>,
        journal: &mut Journal,
    ) -> Option<Vec<u8>> {
        let handle = self.handles.get_mut(&descriptor)?;
        if handle.mode != OpenMode::Read {
            return None;
        }
        let data = self.files.get(&handle.name).map_or(&[][..], Vec::as_slice);
        let start = handle.position.min(data.len());
        let mut end = (start + max).min(data.len());
        if let Some(stop) = stop
            && let Some(i) = data[start..end].iter().position(|&b| b == stop)
        {
            end = start + i + 1;
        }
        if end > start {
            journal.record(ChangeRecord::FilePosition {
                descriptor,
                old: handle.position,
            });
            handle.position = end;
        }
        Some(data[start..end].to_vec())
    }

    pub(crate) fn restore_open(&mut self, descriptor: i32, name: &str, previous: Option<Vec<u8>>) {
        let _ = self.handles.remove(&descriptor);
        self.next_descriptor = descriptor;
        match previous {
            Some(contents) => {
                let _ = self.files.insert(name.to_owned(), contents);
            }
            None => {
                let _ = self.files.remove(name);
            }
        }
    }

    pub(crate) fn restore_close(&mut self, descriptor: i32, handle: OpenFile) {
        let _ = self.handles.insert(descriptor, handle);
    }

    pub(crate) fn restore_write(
        &mut self,
        descriptor: i32,
        old_len: usize,
        old_position: usize,
        overwritten: &[u8],
    ) {
        let Some(handle) = self.handles.get_mut(&descriptor) else {
            return;
        };
        handle.position = old_position;
        let start = if handle.mode == OpenMode::Append {
            old_len
        } else {
            old_position.min(old_len)
        };
        if let Some(data) = self.files.get_mut(&handle.name) {
            data.truncate(old_len);
            let end = (start + overwritten.len()).min(data.len());
            data[start..end].copy_from_slice(&overwritten[..end - start]);
        }
    }

    pub(crate) fn restore_position(&mut self, descriptor: i32, old: usize) {
        if let Some(handle) = self.handles.get_mut(&descriptor) {
            handle.position = old;
        }
    }
}
