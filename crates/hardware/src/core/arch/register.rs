//! Architectural register with lock ownership.
//!
//! A register carries its committed value, the value it is reset to and the ordered list of
//! in-flight instructions that will write it. The lock list is the structural hazard marker
//! consulted by decode: a register is safe to read from the register file only when no older
//! instruction still holds a lock on it.

use crate::common::reg::RegId;

/// Single architectural register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    id: RegId,
    value: u32,
    default: u32,
    modifiable: bool,
    locks: Vec<u64>,
}

impl Register {
    /// Creates a register holding `default`.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier of the register.
    /// * `default` - Value loaded on construction and on reset.
    /// * `modifiable` - Whether writes and locks take effect (`false` for `$zero`).
    pub const fn new(id: RegId, default: u32, modifiable: bool) -> Self {
        Self {
            id,
            value: default,
            default,
            modifiable,
            locks: Vec::new(),
        }
    }

    /// Identifier of this register.
    pub const fn id(&self) -> RegId {
        self.id
    }

    /// Committed value.
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Value restored by a reset.
    pub const fn default_value(&self) -> u32 {
        self.default
    }

    /// Whether writes and locks take effect.
    pub const fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    /// Owners currently holding a lock, in acquisition order.
    pub fn locks(&self) -> &[u64] {
        &self.locks
    }

    /// Returns `true` if any instruction holds a lock.
    pub fn is_locked(&self) -> bool {
        !self.locks.is_empty()
    }

    /// Returns `true` if `owner` holds at least one lock.
    pub fn is_locked_by(&self, owner: u64) -> bool {
        self.locks.contains(&owner)
    }

    /// Returns `true` if every lock is held by `owner`.
    pub fn is_locked_only_by(&self, owner: u64) -> bool {
        self.locks.iter().all(|&o| o == owner)
    }

    /// Returns `true` if an instruction older than `id` holds a lock.
    pub fn is_locked_before(&self, id: u64) -> bool {
        self.locks.iter().any(|&o| o < id)
    }

    /// Most recent locker older than `id`.
    ///
    /// Instruction ids grow monotonically, so the youngest older locker is the maximum owner
    /// below `id`. Its result is the one `id` must observe.
    pub fn last_locker_before(&self, id: u64) -> Option<u64> {
        self.locks.iter().copied().filter(|&o| o < id).max()
    }

    pub(crate) const fn set_raw(&mut self, value: u32) {
        if self.modifiable {
            self.value = value;
        }
    }

    pub(crate) const fn set_default_raw(&mut self, value: u32) {
        self.default = value;
    }

    pub(crate) fn push_lock(&mut self, owner: u64) {
        self.locks.push(owner);
    }

    /// Removes the first lock held by `owner`, returning its position in the list.
    pub(crate) fn remove_lock(&mut self, owner: u64) -> Option<usize> {
        let position = self.locks.iter().position(|&o| o == owner)?;
        let _ = self.locks.remove(position);
        Some(position)
    }

    pub(crate) fn insert_lock(&mut self, position: usize, owner: u64) {
        let position = position.min(self.locks.len());
        self.locks.insert(position, owner);
    }

    /// Drops the most recently appended lock if it belongs to `owner`.
    pub(crate) fn pop_lock(&mut self, owner: u64) {
        if let Some(pos) = self.locks.iter().rposition(|&o| o == owner) {
            let _ = self.locks.remove(pos);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.default;
        self.locks.clear();
    }
}
