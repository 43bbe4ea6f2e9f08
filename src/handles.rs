//! Handle tables for shared-reference deduplication.
//!
//! Within one marshal call, the write table detects when the same record
//! instance (by identity token) is encoded more than once, so shared object
//! graphs are represented once and referenced by a small handle thereafter.
//! The read table mirrors it during decode: instances register in encounter
//! order, and a handle resolves to the instance registered at that slot.

use crate::error::{GridportError, Result};
use crate::variant::Variant;

/// Identity-keyed chained hash set assigning stable slot indices.
///
/// Backed by three growable arrays: bucket heads (`spine`), per-slot chain
/// pointers (`next`), and per-slot identity tokens (`ids`). Slot storage and
/// the bucket spine grow independently; once occupancy reaches
/// `capacity * load_factor` the spine doubles and every stored token is
/// rehashed into it. Rehashing never changes a token's slot index: handles
/// handed out before a growth event stay valid after it.
#[derive(Debug)]
pub struct WriteHandleTable {
    spine: Vec<i32>,
    next: Vec<i32>,
    ids: Vec<u64>,
    size: usize,
    threshold: usize,
    load_factor: f32,
}

impl WriteHandleTable {
    /// Creates a table with the given initial capacity and load factor.
    pub fn new(initial_capacity: usize, load_factor: f32) -> Self {
        let cap = initial_capacity.max(1);
        Self {
            spine: vec![-1; cap],
            next: vec![0; cap],
            ids: vec![0; cap],
            size: 0,
            threshold: (cap as f32 * load_factor) as usize,
            load_factor,
        }
    }

    /// Number of identities assigned so far.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if no identity has been assigned yet.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Looks up an identity token. Returns the previously assigned slot on a
    /// match; otherwise assigns the token the next free slot and returns
    /// `None` ("not previously seen").
    pub fn lookup(&mut self, id: u64) -> Option<u32> {
        let idx = self.bucket(id);

        if self.size == 0 {
            self.assign(id, idx);
            return None;
        }

        let mut slot = self.spine[idx];
        while slot >= 0 {
            let s = slot as usize;
            if self.ids[s] == id {
                return Some(slot as u32);
            }
            slot = self.next[s];
        }

        self.assign(id, idx);
        None
    }

    fn bucket(&self, id: u64) -> usize {
        (id % self.spine.len() as u64) as usize
    }

    fn assign(&mut self, id: u64, mut idx: usize) {
        if self.size >= self.next.len() {
            self.grow_entries();
        }
        if self.size >= self.threshold {
            self.grow_spine();
            idx = self.bucket(id);
        }
        self.insert(id, self.size, idx);
        self.size += 1;
    }

    fn grow_entries(&mut self) {
        let new_len = (self.next.len() << 1) + 1;
        self.ids.resize(new_len, 0);
        self.next.resize(new_len, 0);
    }

    fn grow_spine(&mut self) {
        let new_len = (self.spine.len() << 1) + 1;
        self.threshold = (new_len as f32 * self.load_factor) as usize;
        self.spine = vec![-1; new_len];

        // Rehash every stored token into the enlarged spine. Slot indices
        // are preserved; only the bucket chains are rebuilt.
        for slot in 0..self.size {
            let id = self.ids[slot];
            let idx = self.bucket(id);
            self.insert(id, slot, idx);
        }
    }

    fn insert(&mut self, id: u64, slot: usize, idx: usize) {
        self.ids[slot] = id;
        self.next[slot] = self.spine[idx];
        self.spine[idx] = slot as i32;
    }
}

/// Sequential handle registry populated in decode order.
///
/// A slot is reserved when a user frame is encountered, before its body is
/// decoded, matching the write side, which assigns the handle before writing
/// the body, and filled once the instance is materialized.
#[derive(Debug, Default)]
pub struct ReadHandleTable {
    slots: Vec<Option<Variant>>,
}

impl ReadHandleTable {
    /// Creates an empty table with room for `cap` handles.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
        }
    }

    /// Reserves the next sequential slot and returns its index.
    pub fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    /// Fills a previously reserved slot with the materialized instance.
    pub fn fill(&mut self, slot: usize, value: Variant) -> Result<()> {
        match self.slots.get_mut(slot) {
            Some(entry) => {
                *entry = Some(value);
                Ok(())
            }
            None => Err(GridportError::Internal(format!(
                "fill of unreserved handle slot {slot}"
            ))),
        }
    }

    /// Resolves a handle index to the instance registered at that slot.
    ///
    /// An index with no registered instance (out of range, or reserved but
    /// not yet filled, as in a cyclic self-reference) is an `InvalidHandle`.
    pub fn get(&self, handle: i32) -> Result<Variant> {
        if handle < 0 {
            return Err(GridportError::InvalidHandle(handle));
        }
        match self.slots.get(handle as usize) {
            Some(Some(value)) => Ok(value.clone()),
            _ => Err(GridportError::InvalidHandle(handle)),
        }
    }
}
