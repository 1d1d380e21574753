//! Fixed-size chained hash table over dictionary entries.
//!
//! Every slot is materialized, empty or not, so the table can be written out
//! in full and its occupancy read straight off it. Lookups recompute the DJB2
//! slot of the token and scan only that chain.

use crate::dictionary::{Dictionary, DictionaryEntry};
use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};

pub const DJB2_SEED: u64 = 5381;

/// Load factor above which a build logs capacity pressure.
pub const PRESSURE_LOAD_FACTOR: f64 = 0.75;
pub const PRESSURE_CHAIN_LEN: usize = 8;

/// DJB2 (`h = h * 33 + c`) over the token's chars, reduced modulo `slots`.
/// Reducing at every step yields the same slot as reducing the unbounded
/// hash once at the end.
pub fn slot_for(token: &str, slots: usize) -> usize {
    let n = slots as u128;
    let mut h = u128::from(DJB2_SEED) % n;
    for c in token.chars() {
        h = (h * 33 + u128::from(u32::from(c))) % n;
    }
    h as usize
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Empty,
    Chain(Vec<DictionaryEntry>),
}

impl Slot {
    pub fn entries(&self) -> &[DictionaryEntry] {
        match self {
            Slot::Empty => &[],
            Slot::Chain(chain) => chain,
        }
    }

    pub fn is_empty(&self) -> bool { matches!(self, Slot::Empty) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub slots: usize,
    pub entries: usize,
    pub occupied_slots: usize,
    pub collisions: usize,
    pub longest_chain: usize,
    pub load_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTable {
    slots: Vec<Slot>,
    collisions: usize,
}

impl HashTable {
    pub fn with_slots(slots: usize) -> Result<Self> {
        if slots == 0 {
            return Err(IndexError::InvalidConfig("hash table needs at least one slot".into()));
        }
        Ok(Self { slots: vec![Slot::Empty; slots], collisions: 0 })
    }

    /// Place every dictionary entry, in dictionary order.
    pub fn build(dictionary: &Dictionary, slots: usize) -> Result<Self> {
        let mut table = Self::with_slots(slots)?;
        for entry in dictionary.entries() {
            table.insert(entry.clone());
        }
        let stats = table.stats();
        tracing::info!(
            slots = stats.slots,
            occupied = stats.occupied_slots,
            collisions = stats.collisions,
            longest_chain = stats.longest_chain,
            "hash table built"
        );
        if stats.load_factor > PRESSURE_LOAD_FACTOR || stats.longest_chain > PRESSURE_CHAIN_LEN {
            tracing::warn!(load_factor = stats.load_factor, longest_chain = stats.longest_chain, "hash table under capacity pressure; consider more slots");
        }
        Ok(table)
    }

    /// Rebuild from `(slot, entry)` records read back from disk. Entries stay
    /// in the slot the record names; nothing is rehashed.
    pub fn from_records<I>(slots: usize, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, DictionaryEntry)>,
    {
        let mut table = Self::with_slots(slots)?;
        for (slot, entry) in records {
            if slot >= slots {
                tracing::warn!(slot, token = %entry.token, "hash table record outside table; skipped");
                continue;
            }
            table.push(slot, entry);
        }
        Ok(table)
    }

    /// Chain `entry` into its slot. Returns true when the slot was already occupied.
    pub fn insert(&mut self, entry: DictionaryEntry) -> bool {
        let slot = slot_for(&entry.token, self.slots.len());
        self.push(slot, entry)
    }

    fn push(&mut self, slot: usize, entry: DictionaryEntry) -> bool {
        match &mut self.slots[slot] {
            Slot::Chain(chain) => {
                chain.push(entry);
                self.collisions += 1;
                true
            }
            empty => {
                *empty = Slot::Chain(vec![entry]);
                false
            }
        }
    }

    pub fn slot_of(&self, token: &str) -> usize { slot_for(token, self.slots.len()) }

    pub fn lookup(&self, token: &str) -> Option<&DictionaryEntry> {
        self.slots[self.slot_of(token)].entries().iter().find(|e| e.token == token)
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> { self.slots.get(index) }

    pub fn slots(&self) -> &[Slot] { &self.slots }

    pub fn num_slots(&self) -> usize { self.slots.len() }

    pub fn collisions(&self) -> usize { self.collisions }

    pub fn stats(&self) -> TableStats {
        let occupied_slots = self.slots.iter().filter(|s| !s.is_empty()).count();
        TableStats {
            slots: self.slots.len(),
            entries: self.slots.iter().map(|s| s.entries().len()).sum(),
            occupied_slots,
            collisions: self.collisions,
            longest_chain: self.slots.iter().map(|s| s.entries().len()).max().unwrap_or(0),
            load_factor: occupied_slots as f64 / self.slots.len() as f64,
        }
    }
}
