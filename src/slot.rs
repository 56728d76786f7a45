//! Slot allocation for attaching per-feature state to long-lived objects.
//!
//! A [`SlotAllocator`] hands out small integer ids, lowest free first, with one use count
//! per id so that independent holders can share a feature's slot and release it
//! independently. Each participating object owns a [`DataSlotList`], a sparse array
//! indexed by slot id; the allocator is the process-wide synchronization point, while a
//! list relies on whatever discipline already guards its owning object.

use crate::LOCK_POISON;
use std::{
    any::Any,
    fmt::{self, Debug, Formatter},
    mem::take,
    sync::Mutex,
};

/// Identifier of one allocated slot within its allocator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// The integer value, usable as a plain index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Contents of one list entry. Dropping the box doubles as the entry's destructor.
pub type SlotData = Box<dyn Any + Send>;

/// Thread-safe registry of slot ids with per-id use counts.
///
/// Misuse, like freeing through a site that holds nothing or presenting an id the
/// allocator never issued, is a caller bug and panics.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    // Use count per id; zero marks a free id.
    table: Mutex<Vec<u32>>,
}

impl SlotAllocator {
    /// Creates an allocator with no ids issued.
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(Vec::new()),
        }
    }

    /// Ensures `registered` holds an allocated id and adds a holder to it.
    ///
    /// A feature passes in its registration site: on the first call, with `None` there, the
    /// lowest free id is claimed and stored in the site; later calls through the same site
    /// leave the id alone and raise its use count. Returns the id either way.
    #[allow(clippy::arithmetic_side_effects)] // counts move by 1 from known values
    pub fn alloc(&self, registered: &mut Option<SlotId>) -> SlotId {
        let mut table = self.table.lock().expect(LOCK_POISON);
        match *registered {
            Some(id) => {
                let count = table
                    .get_mut(id.0)
                    .filter(|count| **count > 0)
                    .expect("registration site names an id this allocator never issued");
                *count += 1;
                id
            }
            None => {
                let index = match table.iter().position(|&count| count == 0) {
                    Some(free) => {
                        *table.get_mut(free).expect("position() stays in bounds") = 1;
                        free
                    }
                    None => {
                        table.push(1);
                        table.len() - 1
                    }
                };
                let id = SlotId(index);
                *registered = Some(id);
                id
            }
        }
    }

    /// Removes a holder from the id at `registered`.
    ///
    /// The site keeps the id while other holders remain; removing the last holder clears
    /// the site and returns the id to the free pool. Once every id is back in the pool the
    /// whole allocator returns to its initial empty state, so the next allocation starts
    /// from the lowest value again.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn free(&self, registered: &mut Option<SlotId>) {
        let mut table = self.table.lock().expect(LOCK_POISON);
        let id = registered
            .take()
            .expect("freeing through a registration site that holds nothing");
        let count = table
            .get_mut(id.0)
            .filter(|count| **count > 0)
            .expect("registration site names an id this allocator never issued");
        *count -= 1;
        if *count > 0 {
            *registered = Some(id);
        } else if table.iter().all(|&count| count == 0) {
            table.clear();
        }
    }

    /// Whether the given id is currently issued to at least one holder.
    pub fn is_allocated(&self, id: SlotId) -> bool {
        let table = self.table.lock().expect(LOCK_POISON);
        table.get(id.0).is_some_and(|&count| count > 0)
    }

    /// Table size needed to index `id`, panicking if the id isn't currently issued.
    fn table_len_for(&self, id: SlotId) -> usize {
        let table = self.table.lock().expect(LOCK_POISON);
        assert!(
            table.get(id.0).is_some_and(|&count| count > 0),
            "slot id is not currently allocated"
        );
        table.len()
    }
}

/// Per-object sparse storage indexed by [`SlotId`].
///
/// Entries are boxes of any sendable type, with the box's drop glue acting as the slot's
/// destructor. The list itself never locks; it relies on the synchronization of whatever
/// object owns it. Storage only ever grows while the object lives.
#[derive(Default)]
pub struct DataSlotList {
    slots: Vec<Option<SlotData>>,
}

impl DataSlotList {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Stores `data` at `slot`, growing storage to the allocator's current table size if
    /// the id doesn't fit yet, and hands back whatever the slot held before.
    ///
    /// The previous box comes back alive: deciding when its destructor runs, and under
    /// which locks, is the caller's business, not this list's.
    pub fn set(&mut self, allocator: &SlotAllocator, slot: SlotId, data: SlotData) -> Option<SlotData> {
        let table_len = allocator.table_len_for(slot);
        if self.slots.len() < table_len {
            self.slots.resize_with(table_len, || None);
        }
        self.slots
            .get_mut(slot.index())
            .expect("list storage covers every issued id")
            .replace(data)
    }

    /// Borrows the data at `slot`, if any was stored there.
    pub fn get(&self, allocator: &SlotAllocator, slot: SlotId) -> Option<&(dyn Any + Send)> {
        debug_assert!(
            allocator.is_allocated(slot),
            "slot id is not currently allocated"
        );
        self.slots.get(slot.index()).and_then(|entry| entry.as_deref())
    }

    /// Runs every remaining destructor, in ascending slot order, and releases the storage.
    /// The owning object calls this once at teardown; dropping the list does the same.
    pub fn clear(&mut self) {
        // Front-to-back consumption keeps the ascending-id destructor order.
        for entry in take(&mut self.slots) {
            drop(entry);
        }
    }
}

impl Debug for DataSlotList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSlotList")
            .field("len", &self.slots.len())
            .field("occupied", &self.slots.iter().filter(|entry| entry.is_some()).count())
            .finish()
    }
}
