//! Retained memory that survives deep sleep.
//!
//! The firmware places one [`RetainedRegion`] in RTC memory. The region holds
//! two slots. Every commit goes to the older slot and is stamped with the next
//! sequence number and a digest of its contents, so a write interrupted by a
//! reset leaves the previous commit readable on the next wake.
//!
//! [`PersistentStore`] is the only way the rest of the crate touches the
//! region: it loads (or initializes) the newest valid state once per boot and
//! commits each logical update as a whole.

use core::sync::atomic::{compiler_fence, Ordering};

use log::*;

use crate::content::{DisplayItemSet, RawMessageBuffer};

/// Marks a slot that has been fully written at least once.
const SLOT_MAGIC: u32 = 0xE9A9_5EED;

/// Everything the node remembers between wakes.
#[repr(C)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetainedState {
    /// Ordinary wakes since the last forced redraw.
    pub wake_counter: u32,
    /// Last accepted payload, for change detection.
    pub message: RawMessageBuffer,
    /// Items parsed from `message`.
    pub items: DisplayItemSet,
}

impl RetainedState {
    pub const fn new() -> Self {
        Self {
            wake_counter: 0,
            message: RawMessageBuffer::empty(),
            items: DisplayItemSet::new(),
        }
    }

    /// djb2 over every field, with a zero byte between variable-length parts.
    fn digest(&self) -> u32 {
        let mut hash: u32 = 5381;
        let mut feed = |bytes: &[u8]| {
            for byte in bytes {
                hash = hash.wrapping_mul(33).wrapping_add(*byte as u32);
            }
            hash = hash.wrapping_mul(33);
        };

        feed(&self.wake_counter.to_le_bytes());
        feed(&(self.message.len() as u16).to_le_bytes());
        feed(self.message.as_bytes());
        feed(&[self.items.len() as u8]);
        for item in &self.items {
            feed(item.key().as_bytes());
            feed(item.value().as_bytes());
        }
        hash
    }
}

#[repr(C)]
struct Slot {
    magic: u32,
    sequence: u32,
    digest: u32,
    state: RetainedState,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            magic: 0,
            sequence: 0,
            digest: 0,
            state: RetainedState::new(),
        }
    }

    fn is_valid(&self) -> bool {
        self.magic == SLOT_MAGIC && self.digest == self.state.digest()
    }
}

/// The raw retained-memory layout. Place exactly one in RTC memory.
#[repr(C)]
pub struct RetainedRegion {
    slots: [Slot; 2],
}

impl RetainedRegion {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::empty(), Slot::empty()],
        }
    }

    /// Index of the valid slot with the newest sequence number.
    fn newest(&self) -> Option<usize> {
        match (self.slots[0].is_valid(), self.slots[1].is_valid()) {
            (true, true) => {
                let ahead = self.slots[1]
                    .sequence
                    .wrapping_sub(self.slots[0].sequence) as i32
                    > 0;
                Some(if ahead { 1 } else { 0 })
            }
            (true, false) => Some(0),
            (false, true) => Some(1),
            (false, false) => None,
        }
    }

    /// Copy of the newest valid commit, if there is one.
    pub fn load(&self) -> Option<RetainedState> {
        self.newest().map(|index| self.slots[index].state.clone())
    }

    /// Sequence number of the newest valid commit.
    pub fn sequence(&self) -> Option<u32> {
        self.newest().map(|index| self.slots[index].sequence)
    }

    /// Writes `state` into the older slot and returns its sequence number.
    pub fn commit(&mut self, state: &RetainedState) -> u32 {
        let (target, sequence) = match self.newest() {
            Some(index) => (1 - index, self.slots[index].sequence.wrapping_add(1)),
            None => (0, 1),
        };

        let slot = &mut self.slots[target];
        slot.magic = 0;
        compiler_fence(Ordering::SeqCst);
        slot.state = state.clone();
        slot.sequence = sequence;
        slot.digest = state.digest();
        // magic goes last: a slot is only valid once everything else landed
        compiler_fence(Ordering::SeqCst);
        slot.magic = SLOT_MAGIC;
        sequence
    }

    /// Drops every commit; the next open starts from an empty state.
    pub fn invalidate(&mut self) {
        for slot in &mut self.slots {
            slot.magic = 0;
        }
    }
}

impl Default for RetainedRegion {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned view of the retained state for one wake episode.
pub struct PersistentStore<'r> {
    region: &'r mut RetainedRegion,
    state: RetainedState,
}

impl<'r> PersistentStore<'r> {
    /// Loads the newest valid commit, initializing the region if there is none.
    pub fn open(region: &'r mut RetainedRegion) -> Self {
        match region.load() {
            Some(state) => {
                info!(
                    "Retained store loaded: wake_counter={}, message={} bytes, {} items",
                    state.wake_counter,
                    state.message.len(),
                    state.items.len()
                );
                Self { region, state }
            }
            None => {
                warn!("Retained store empty or corrupt, initializing");
                let state = RetainedState::new();
                region.commit(&state);
                Self { region, state }
            }
        }
    }

    pub fn state(&self) -> &RetainedState {
        &self.state
    }

    pub fn wake_counter(&self) -> u32 {
        self.state.wake_counter
    }

    pub fn message(&self) -> &RawMessageBuffer {
        &self.state.message
    }

    pub fn items(&self) -> &DisplayItemSet {
        &self.state.items
    }

    /// Counts one ordinary wake and commits it. Returns the new count.
    pub fn increment_wake_counter(&mut self) -> u32 {
        self.state.wake_counter = self.state.wake_counter.saturating_add(1);
        self.save();
        self.state.wake_counter
    }

    pub fn reset_wake_counter(&mut self) {
        self.state.wake_counter = 0;
        self.save();
    }

    /// Replaces the message and its parsed items in a single commit.
    pub fn replace_content(&mut self, message: RawMessageBuffer, items: DisplayItemSet) {
        self.state.message = message;
        self.state.items = items;
        self.save();
    }

    /// Commits the working copy to the region.
    pub fn save(&mut self) {
        let sequence = self.region.commit(&self.state);
        trace!("Retained store committed (sequence {})", sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::DisplayItem;

    fn sample_state() -> RetainedState {
        let mut items = DisplayItemSet::new();
        items.push(DisplayItem::new("Name:", "Shop"));
        items.push(DisplayItem::new("Temp:", "60"));
        RetainedState {
            wake_counter: 7,
            message: RawMessageBuffer::from_payload(b"Name:=Shop&Temp:=60"),
            items,
        }
    }

    #[test]
    fn test_fresh_region_is_initialized() {
        let mut region = RetainedRegion::new();
        assert!(region.load().is_none());

        let store = PersistentStore::open(&mut region);
        assert_eq!(store.wake_counter(), 0);
        assert!(store.message().is_empty());
        assert!(store.items().is_empty());
        drop(store);

        assert_eq!(region.load(), Some(RetainedState::new()));
    }

    #[test]
    fn test_commit_then_load() {
        let mut region = RetainedRegion::new();
        let state = sample_state();
        region.commit(&state);
        assert_eq!(region.load(), Some(state));
    }

    #[test]
    fn test_commits_alternate_slots() {
        let mut region = RetainedRegion::new();
        let mut state = sample_state();

        assert_eq!(region.commit(&state), 1);
        state.wake_counter = 8;
        assert_eq!(region.commit(&state), 2);
        state.wake_counter = 9;
        assert_eq!(region.commit(&state), 3);

        assert_eq!(region.sequence(), Some(3));
        assert_eq!(region.load().unwrap().wake_counter, 9);
        // sequence 3 went back to slot 0; sequence 2 survives in slot 1
        assert_eq!(region.slots[0].state.wake_counter, 9);
        assert_eq!(region.slots[1].state.wake_counter, 8);
    }

    #[test]
    fn test_torn_write_falls_back_to_previous_commit() {
        let mut region = RetainedRegion::new();
        let mut state = sample_state();
        region.commit(&state);
        state.wake_counter = 99;
        region.commit(&state);

        // corrupt the newest slot without touching its digest
        region.slots[1].state.wake_counter = 12345;

        let loaded = region.load().unwrap();
        assert_eq!(loaded.wake_counter, 7);
        assert_eq!(loaded.items.len(), 2);
    }

    #[test]
    fn test_missing_magic_falls_back() {
        let mut region = RetainedRegion::new();
        let mut state = sample_state();
        region.commit(&state);
        state.wake_counter = 1;
        region.commit(&state);
        region.slots[1].magic = 0;

        assert_eq!(region.load().unwrap().wake_counter, 7);
    }

    #[test]
    fn test_both_slots_corrupt_reinitializes() {
        let mut region = RetainedRegion::new();
        region.commit(&sample_state());
        region.commit(&sample_state());
        region.slots[0].digest ^= 1;
        region.slots[1].digest ^= 1;

        let store = PersistentStore::open(&mut region);
        assert_eq!(store.state(), &RetainedState::new());
    }

    #[test]
    fn test_sequence_wraps() {
        let mut region = RetainedRegion::new();
        let state = sample_state();
        region.commit(&state);
        region.slots[0].sequence = u32::MAX;
        region.slots[0].digest = region.slots[0].state.digest();

        let mut newer = state.clone();
        newer.wake_counter = 0;
        assert_eq!(region.commit(&newer), 0);
        assert_eq!(region.load().unwrap().wake_counter, 0);
    }

    #[test]
    fn test_invalidate() {
        let mut region = RetainedRegion::new();
        region.commit(&sample_state());
        region.invalidate();
        assert!(region.load().is_none());
    }

    #[test]
    fn test_store_updates_survive_reopen() {
        let mut region = RetainedRegion::new();
        {
            let mut store = PersistentStore::open(&mut region);
            assert_eq!(store.increment_wake_counter(), 1);
            assert_eq!(store.increment_wake_counter(), 2);
            let state = sample_state();
            store.replace_content(state.message, state.items);
        }

        let store = PersistentStore::open(&mut region);
        assert_eq!(store.wake_counter(), 2);
        assert_eq!(store.message().as_bytes(), b"Name:=Shop&Temp:=60");
        assert_eq!(store.items().headline().unwrap().value(), "Shop");
    }

    #[test]
    fn test_reset_wake_counter() {
        let mut region = RetainedRegion::new();
        region.commit(&sample_state());
        {
            let mut store = PersistentStore::open(&mut region);
            store.reset_wake_counter();
        }
        let state = region.load().unwrap();
        assert_eq!(state.wake_counter, 0);
        assert_eq!(state.items.len(), 2);
    }

    #[test]
    fn test_counter_saturates() {
        let mut region = RetainedRegion::new();
        let mut state = RetainedState::new();
        state.wake_counter = u32::MAX;
        region.commit(&state);

        let mut store = PersistentStore::open(&mut region);
        assert_eq!(store.increment_wake_counter(), u32::MAX);
    }
}
