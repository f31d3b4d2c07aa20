//! Open-addressed, linear-probing hash table keyed by interned strings.
//!
//! Used for the string intern set, globals, class method tables and
//! instance field tables (§4.5). Every entry is one of three states:
//!
//! - empty: `key = None`, `value = Nil`
//! - tombstone: `key = None`, `value = Bool(true)`
//! - occupied: `key = Some(_)`, any value
//!
//! Every consumer except the intern set itself compares keys by pointer
//! identity, which is sound because strings are interned (I2); the intern
//! set uses [`Table::find_string`] to compare candidate bytes against
//! existing keys before a string object for them even exists.

use crate::object::{ObjString, ObjectRef};
use crate::value::Value;

const MAX_LOAD: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

#[derive(Clone)]
struct Entry {
    key: Option<ObjectRef>,
    value: Value,
}

impl Entry {
    fn empty() -> Self {
        Entry { key: None, value: Value::nil() }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && !self.value.is_nil()
    }
}

pub struct Table {
    entries: Vec<Entry>,
    /// Real (non-tombstone) entry count.
    count: usize,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Finds either the occupied slot matching `key` or, on miss, the first
    /// reusable slot (a tombstone if one was passed, else the terminating
    /// empty slot).
    fn find_entry(entries: &[Entry], capacity: usize, key: ObjectRef) -> usize {
        let hash = key.as_string().hash;
        let mut index = (hash as usize) % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                Some(k) if k == key => return index,
                None if entry.is_tombstone() => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                None => return tombstone.unwrap_or(index),
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries: Vec<Entry> = (0..new_capacity).map(|_| Entry::empty()).collect();
        let mut count = 0;
        for entry in self.entries.drain(..) {
            if let Some(key) = entry.key {
                let idx = Self::find_entry(&new_entries, new_capacity, key);
                new_entries[idx] = Entry { key: Some(key), value: entry.value };
                count += 1;
            }
        }
        self.entries = new_entries;
        self.count = count;
    }

    fn ensure_capacity(&mut self) {
        if self.entries.is_empty() {
            self.grow(INITIAL_CAPACITY);
            return;
        }
        if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.grow(self.capacity() * 2);
        }
    }

    /// Inserts or overwrites `key -> value`. Returns `true` if this created a
    /// brand new key.
    pub fn set(&mut self, key: ObjectRef, value: Value) -> bool {
        self.ensure_capacity();
        let capacity = self.capacity();
        let idx = Self::find_entry(&self.entries, capacity, key);
        let is_new = self.entries[idx].key.is_none();
        if is_new && !self.entries[idx].is_tombstone() {
            self.count += 1;
        }
        self.entries[idx] = Entry { key: Some(key), value };
        is_new
    }

    pub fn get(&self, key: ObjectRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = Self::find_entry(&self.entries, self.capacity(), key);
        self.entries[idx].key.map(|_| self.entries[idx].value)
    }

    pub fn contains(&self, key: ObjectRef) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, leaving a tombstone so later probe chains through this
    /// slot still find entries placed after it.
    pub fn delete(&mut self, key: ObjectRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let idx = Self::find_entry(&self.entries, self.capacity(), key);
        if self.entries[idx].key.is_none() {
            return false;
        }
        self.entries[idx] = Entry { key: None, value: Value::bool(true) };
        self.count -= 1;
        true
    }

    /// Copies every entry of `other` into `self` (`OP_INHERIT`).
    pub fn add_all(&mut self, other: &Table) {
        for entry in &other.entries {
            if let Some(key) = entry.key {
                self.set(key, entry.value);
            }
        }
    }

    /// Iterates occupied entries, for GC root marking.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectRef, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    /// Intern-set lookup: the only place keys are compared by content
    /// instead of identity, since at this point no `ObjString` for `bytes`
    /// may yet exist.
    pub fn find_string(&self, bytes: &[u8], hash: u32) -> Option<ObjectRef> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if !entry.is_tombstone() => return None,
                Some(key) => {
                    let s: &ObjString = key.as_string();
                    if s.hash == hash && s.as_bytes() == bytes {
                        return Some(key);
                    }
                }
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }

    /// Removes intern-set entries whose key is unmarked (GC sweep phase 3).
    pub fn remove_white(&mut self) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                if !key.is_marked() {
                    *entry = Entry { key: None, value: Value::bool(true) };
                    self.count -= 1;
                }
            }
        }
    }
}
