//! Slot allocation and the per-object data lists built on it.

use crate::{
    slot::{DataSlotList, SlotAllocator, SlotData, SlotId},
    tests::util::*,
};
use color_eyre::eyre::{ensure, eyre, ContextCompat};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
};

#[test]
fn lowest_free_id_wins() -> TestResult {
    testinit();
    let allocator = SlotAllocator::new();
    let mut sites: Vec<Option<SlotId>> = vec![None; 4];
    let ids: Vec<SlotId> = sites.iter_mut().map(|site| allocator.alloc(site)).collect();
    ensure_eq!(ids.iter().map(|id| id.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    allocator.free(&mut sites[1]);
    ensure_eq!(sites[1], None);
    ensure!(!allocator.is_allocated(ids[1]), "freed id still reads as allocated");

    // The gap gets refilled before the table grows.
    let mut site = None;
    ensure_eq!(allocator.alloc(&mut site).index(), 1);
    allocator.free(&mut site);

    for site in &mut sites {
        if site.is_some() {
            allocator.free(site);
        }
    }
    // With every id back in the pool the allocator starts over from the bottom.
    let mut site = None;
    ensure_eq!(allocator.alloc(&mut site).index(), 0);
    allocator.free(&mut site);
    Ok(())
}

#[test]
fn shared_sites_count_holders() -> TestResult {
    testinit();
    let allocator = SlotAllocator::new();
    let mut site = None;
    let id = allocator.alloc(&mut site);
    ensure_eq!(allocator.alloc(&mut site), id);
    ensure_eq!(allocator.alloc(&mut site), id);

    allocator.free(&mut site);
    allocator.free(&mut site);
    ensure_eq!(site, Some(id), "the site must keep its id while holders remain");
    ensure!(allocator.is_allocated(id), "the id went back to the pool too early");

    allocator.free(&mut site);
    ensure_eq!(site, None);
    ensure!(!allocator.is_allocated(id), "the last holder failed to release the id");
    Ok(())
}

struct DropTracker {
    drops: Arc<AtomicUsize>,
    tag: u32,
}
impl Drop for DropTracker {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn replacement_hands_the_old_data_back_alive() -> TestResult {
    testinit();
    let allocator = SlotAllocator::new();
    let mut site = None;
    let id = allocator.alloc(&mut site);

    let drops = Arc::new(AtomicUsize::new(0));
    let tracker = |tag| -> SlotData {
        Box::new(DropTracker { drops: Arc::clone(&drops), tag })
    };

    let mut list = DataSlotList::new();
    ensure!(list.set(&allocator, id, tracker(1)).is_none(), "a fresh slot had data in it");
    let old = list.set(&allocator, id, tracker(2));
    ensure_eq!(drops.load(Ordering::SeqCst), 0, "replacement ran a destructor on its own");

    let old = old.context("replacement did not hand back the previous data")?;
    ensure_eq!(old.downcast_ref::<DropTracker>().map(|t| t.tag), Some(1));
    drop(old);
    ensure_eq!(drops.load(Ordering::SeqCst), 1);

    let current = list.get(&allocator, id).and_then(|data| data.downcast_ref::<DropTracker>());
    ensure_eq!(current.map(|t| t.tag), Some(2));

    list.clear();
    ensure_eq!(drops.load(Ordering::SeqCst), 2);
    ensure!(list.get(&allocator, id).is_none(), "teardown left data behind");
    allocator.free(&mut site);
    Ok(())
}

struct OrderTracker {
    order: Arc<Mutex<Vec<u32>>>,
    tag: u32,
}
impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.order.lock().unwrap().push(self.tag);
    }
}

#[test]
fn teardown_runs_destructors_in_ascending_slot_order() -> TestResult {
    testinit();
    let allocator = SlotAllocator::new();
    let mut sites: Vec<Option<SlotId>> = vec![None; 3];
    let ids: Vec<SlotId> = sites.iter_mut().map(|site| allocator.alloc(site)).collect();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut list = DataSlotList::new();
    // Stored back to front; teardown order must not depend on storage order.
    for (&id, tag) in ids.iter().zip(0..ids.len() as u32).rev() {
        list.set(&allocator, id, Box::new(OrderTracker { order: Arc::clone(&order), tag }));
    }
    list.clear();
    ensure_eq!(*order.lock().unwrap(), vec![0, 1, 2]);

    for site in &mut sites {
        allocator.free(site);
    }
    Ok(())
}

#[test]
fn allocator_is_thread_safe() -> TestResult {
    testinit();
    let allocator = Arc::new(SlotAllocator::new());
    let mut workers = Vec::new();
    for _ in 0..4 {
        let allocator = Arc::clone(&allocator);
        workers.push(thread::spawn(move || {
            for _ in 0..128 {
                let mut first = None;
                let mut second = None;
                allocator.alloc(&mut first);
                allocator.alloc(&mut second);
                allocator.free(&mut second);
                allocator.free(&mut first);
            }
        }));
    }
    for worker in workers {
        worker.join().map_err(|_| eyre!("worker thread panicked"))?;
    }

    // Every id went back, so the table is empty and allocation starts over.
    let mut site = None;
    ensure_eq!(allocator.alloc(&mut site).index(), 0);
    allocator.free(&mut site);
    Ok(())
}
