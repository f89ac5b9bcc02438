//! Data Hazard Resolution and Forwarding.
//!
//! This module holds the results published by in-flight instructions during one cycle. It
//! provides:
//! 1. **Publication:** Execute and Memory publish `(register, value, producer)` records.
//! 2. **Lookup:** a consumer accepts a record only if it was produced by the most recent
//!    older instruction locking that register, so stale results are never bypassed.
//! 3. **Lifetime:** the unit is cleared at the start of every cycle.

use crate::common::reg::RegId;
use crate::core::pipeline::latches::Stage;

/// One forwarded result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Forward {
    /// Stage that published the value.
    pub stage: Stage,
    /// Destination register.
    pub register: RegId,
    /// Result value.
    pub value: u32,
    /// Sequence number of the producing instruction.
    pub producer: u64,
}

/// Bypass network of the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForwardingUnit {
    records: Vec<Forward>,
}

impl ForwardingUnit {
    /// Drops every record. Called at the start of each cycle.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Publishes a result, replacing an earlier record of the same producer and register.
    ///
    /// # Arguments
    ///
    /// * `stage` - Publishing stage (Execute or Memory).
    /// * `register` - Destination register.
    /// * `value` - Result value.
    /// * `producer` - Sequence number of the producing instruction.
    pub fn publish(&mut self, stage: Stage, register: RegId, value: u32, producer: u64) {
        let record = Forward {
            stage,
            register,
            value,
            producer,
        };
        match self
            .records
            .iter_mut()
            .find(|f| f.register == register && f.producer == producer)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Value of `register` produced by `producer` this cycle, if published.
    pub fn lookup(&self, register: RegId, producer: u64) -> Option<u32> {
        self.records
            .iter()
            .find(|f| f.register == register && f.producer == producer)
            .map(|f| f.value)
    }

    /// Records published this cycle, in publication order.
    pub fn records(&self) -> &[Forward] {
        &self.records
    }

    /// Returns `true` if nothing was published.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
