//! Time-deferred property writes.
//!
//! The engine owns no clock; the driver advances time explicitly through the
//! session, which drains this queue. One entry exists per (instance,
//! property) pair, created lazily by the first deferred write and reused
//! afterwards. Destroying an instance drops its pending entries.

use std::rc::Weak;

use crate::instance::{Instance, InstanceId, InstanceInner};
use crate::value::Value;

/// How a property write is deferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferMode {
    /// Every write resets the deadline; fires once writes pause for the
    /// given number of milliseconds.
    Debounce(u64),
    /// Trailing-edge window: the first write opens a window that fires at
    /// its end with the latest value written during it.
    Throttle(u64),
}

impl DeferMode {
    pub fn delay_ms(&self) -> u64 {
        match self {
            DeferMode::Debounce(ms) | DeferMode::Throttle(ms) => *ms,
        }
    }
}

struct TimerEntry {
    owner: Weak<InstanceInner>,
    owner_id: InstanceId,
    property: String,
    due_ms: u64,
    value: Value,
}

#[derive(Default)]
pub(crate) struct TimerQueue {
    entries: Vec<TimerEntry>,
}

impl TimerQueue {
    /// Record a deferred write, coalescing with the pending entry for the
    /// same property if one exists.
    pub(crate) fn schedule(
        &mut self,
        owner: &Instance,
        property: &str,
        mode: DeferMode,
        value: Value,
        now_ms: u64,
    ) {
        let owner_id = owner.id();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.owner_id == owner_id && e.property == property)
        {
            entry.value = value;
            if let DeferMode::Debounce(delay) = mode {
                entry.due_ms = now_ms + delay;
            }
            return;
        }
        log::trace!(
            target: "weft::defer",
            "schedule {:?} for {}.{}",
            mode,
            owner_id,
            property
        );
        self.entries.push(TimerEntry {
            owner: owner.downgrade(),
            owner_id,
            property: property.to_string(),
            due_ms: now_ms + mode.delay_ms(),
            value,
        });
    }

    /// Drop everything the instance still has pending.
    pub(crate) fn cancel_owner(&mut self, owner_id: InstanceId) {
        self.entries.retain(|e| e.owner_id != owner_id);
    }

    /// Remove and return the entries due at `now_ms`, oldest deadline first.
    /// Entries whose owner is gone are silently discarded.
    pub(crate) fn take_due(&mut self, now_ms: u64) -> Vec<(Instance, String, Value)> {
        let (mut due, keep): (Vec<TimerEntry>, Vec<TimerEntry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.due_ms <= now_ms);
        self.entries = keep;
        due.sort_by_key(|e| e.due_ms);
        due.into_iter()
            .filter_map(|e| {
                e.owner
                    .upgrade()
                    .map(|inner| (Instance::from_inner(inner), e.property, e.value))
            })
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline, if any.
    pub(crate) fn next_due(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.due_ms).min()
    }
}
