//! Thread-specific storage with per-key destructors.
//!
//! The host's thread-local facility hands out small integer slots with
//! plain get/set and no destructor support at all; this module supplies the
//! missing destructor engine.
//!
//! ## Design
//!
//! - **Key registry**: a process-wide fixed array of [`TSS_KEYS_MAX`] slots
//!   behind one lock. Each slot carries an in-use flag, an optional
//!   destructor, and a generation counter bumped on every create so a
//!   re-created key can never resurrect a stale value. Key creation and
//!   deletion are rare; the lock is off the hot path.
//! - **Per-thread values**: a thread-owned, lazily grown array of
//!   `(generation, value)` entries. `set`/`get` touch only this array —
//!   no registry access, no lock. A value of `0` means "never set".
//! - **Exit draining**: [`drain_current_thread`] runs up to
//!   [`TSS_DTOR_ITERATIONS`] passes. Each pass snapshots the registry,
//!   then for every live key with a destructor whose value in this thread
//!   is non-null, clears the value *before* invoking the destructor with
//!   the old value. If any destructor fired, another pass runs: a
//!   destructor may legitimately repopulate a different tracked key, and a
//!   single pass would leak that value. The bound caps pathological
//!   destructor chains.
//!
//! Values are re-read at drain time rather than snapshotted when the key is
//! registered; early snapshots go stale the moment user code calls `set`
//! again.

use std::cell::RefCell;

use log::{debug, trace};
use parking_lot::Mutex as HostMutex;

use crate::error::{Error, Result};

/// Capacity of the process-wide key table, matching the host's slot limit.
pub const TSS_KEYS_MAX: usize = 1088;

/// Upper bound on drain passes at thread exit, matching the standard's
/// required minimum number of guaranteed destructor iterations.
pub const TSS_DTOR_ITERATIONS: usize = 256;

/// Per-key destructor. Receives the (non-null) value the exiting thread
/// held; the slot already reads null by the time it runs.
pub type Destructor = fn(usize);

/// Handle to a thread-specific storage slot.
///
/// Carries the slot's generation so stale handles — kept across a
/// delete/create cycle that reused the index — read as never-set instead of
/// leaking the previous key's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TssKey {
    index: u32,
    generation: u32,
}

// ---------------------------------------------------------------------------
// Process-wide key registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct KeySlot {
    in_use: bool,
    destructor: Option<Destructor>,
    /// Bumped on every create; values stamped with an older generation are
    /// invisible to the new key.
    generation: u32,
}

const EMPTY_SLOT: KeySlot = KeySlot {
    in_use: false,
    destructor: None,
    generation: 0,
};

struct KeyRegistry {
    slots: [KeySlot; TSS_KEYS_MAX],
}

static REGISTRY: HostMutex<KeyRegistry> = HostMutex::new(KeyRegistry {
    slots: [EMPTY_SLOT; TSS_KEYS_MAX],
});

// ---------------------------------------------------------------------------
// Per-thread value storage
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Default)]
struct SlotValue {
    generation: u32,
    value: usize,
}

struct ThreadSlots {
    values: Vec<SlotValue>,
}

impl ThreadSlots {
    fn ensure(&mut self, index: usize) {
        if self.values.len() <= index {
            self.values.resize(index + 1, SlotValue::default());
        }
    }
}

thread_local! {
    static SLOTS: RefCell<ThreadSlots> = const {
        RefCell::new(ThreadSlots { values: Vec::new() })
    };
}

/// Clears and returns this thread's value for `key`, if it is non-null and
/// stamped with the key's generation. The clear happens before the caller
/// can invoke any destructor, so a destructor never observes (or
/// re-triggers on) the stale value.
fn take_value(key: TssKey) -> Option<usize> {
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        let entry = slots.values.get_mut(key.index as usize)?;
        if entry.generation != key.generation || entry.value == 0 {
            return None;
        }
        let value = entry.value;
        entry.value = 0;
        Some(value)
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Allocates a storage slot, optionally registering a destructor to run at
/// thread exit for threads holding a non-null value.
///
/// Fails with [`Error::SlotsExhausted`] when all slots are in use.
pub fn create_key(destructor: Option<Destructor>) -> Result<TssKey> {
    let mut registry = REGISTRY.lock();
    for (index, slot) in registry.slots.iter_mut().enumerate() {
        if !slot.in_use {
            slot.in_use = true;
            slot.destructor = destructor;
            slot.generation = slot.generation.wrapping_add(1);
            debug!(
                "tss: created key {index} (destructor: {})",
                destructor.is_some()
            );
            return Ok(TssKey {
                index: index as u32,
                generation: slot.generation,
            });
        }
    }
    Err(Error::SlotsExhausted(TSS_KEYS_MAX))
}

/// Frees a storage slot.
///
/// If the key has a destructor and the calling thread holds a non-null
/// value, the value is cleared and the destructor runs immediately — the
/// slot is about to become invalid, so exit draining can no longer consult
/// it. Values held by *other* threads are not destroyed.
pub fn delete_key(key: TssKey) -> Result<()> {
    let index = key.index as usize;
    if index >= TSS_KEYS_MAX {
        return Err(Error::Precondition("key index out of range"));
    }
    let destructor = {
        let mut registry = REGISTRY.lock();
        let slot = &mut registry.slots[index];
        if !slot.in_use || slot.generation != key.generation {
            return Err(Error::Precondition("key is not live"));
        }
        let destructor = slot.destructor;
        slot.in_use = false;
        slot.destructor = None;
        destructor
    };
    debug!("tss: deleted key {index}");
    // Run outside the registry lock: the destructor may create keys.
    if let Some(destructor) = destructor {
        if let Some(value) = take_value(key) {
            destructor(value);
        }
    }
    Ok(())
}

/// Stores `value` in the calling thread's slot for `key`.
///
/// Pure passthrough to the thread-owned array: no registry access, no
/// lock. A value of `0` reads as never-set.
pub fn set(key: TssKey, value: usize) -> Result<()> {
    let index = key.index as usize;
    if index >= TSS_KEYS_MAX {
        return Err(Error::Precondition("key index out of range"));
    }
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        slots.ensure(index);
        slots.values[index] = SlotValue {
            generation: key.generation,
            value,
        };
    });
    Ok(())
}

/// Reads the calling thread's value for `key`; `0` if never set (or set
/// under a previous incarnation of the slot).
#[must_use]
pub fn get(key: TssKey) -> usize {
    let index = key.index as usize;
    if index >= TSS_KEYS_MAX {
        return 0;
    }
    SLOTS.with(|slots| {
        let slots = slots.borrow();
        match slots.values.get(index) {
            Some(entry) if entry.generation == key.generation => entry.value,
            _ => 0,
        }
    })
}

/// Runs the exit-time destructor drain for the calling thread.
///
/// Invoked automatically by the thread lifecycle wrapper on every path out
/// of user code; threads not created through [`crate::thread::spawn`] may
/// call it manually before exiting. Whether the drain settles or hits the
/// iteration bound, the thread's slot array is released afterwards, so
/// destructor-less values do not outlive the drain either.
pub fn drain_current_thread() {
    let mut settled = false;
    for pass in 0..TSS_DTOR_ITERATIONS {
        // Snapshot the live destructor-bearing keys, then drop the lock
        // before running any user callback.
        let tracked: Vec<(TssKey, Destructor)> = {
            let registry = REGISTRY.lock();
            registry
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.in_use)
                .filter_map(|(index, slot)| {
                    slot.destructor.map(|destructor| {
                        (
                            TssKey {
                                index: index as u32,
                                generation: slot.generation,
                            },
                            destructor,
                        )
                    })
                })
                .collect()
        };

        let mut fired = 0usize;
        for (key, destructor) in tracked {
            if let Some(value) = take_value(key) {
                destructor(value);
                fired += 1;
            }
        }
        if fired == 0 {
            if pass > 0 {
                trace!("tss: drain settled after {pass} pass(es)");
            }
            settled = true;
            break;
        }
    }
    if !settled {
        trace!("tss: drain stopped at the {TSS_DTOR_ITERATIONS}-pass bound");
    }
    release_thread_slots();
}

fn release_thread_slots() {
    SLOTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        slots.values.clear();
        slots.values.shrink_to_fit();
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
