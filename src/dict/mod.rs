//! # Incrementally Rehashed Dictionary
//!
//! [`Dict`] is a chained hash map that never stops the world to grow.
//! Resizing allocates a second bucket array and migrates one bucket at a
//! time, a step piggybacked on each mutating operation, so a table with
//! millions of entries keeps its worst-case pause bounded.
//!
//! ## Two-Table Structure
//!
//! ```text
//!            not rehashing                  rehashing
//!   +-------------------------+   +-------------------------+
//!   | T0: buckets (2^n)       |   | T0: source, drained     |
//!   | T1: empty               |   |     [0..rehash_idx) are |
//!   | rehash_idx: None        |   |     already empty       |
//!   +-------------------------+   | T1: target (2^m)        |
//!                                 | rehash_idx: Some(i)     |
//!                                 +-------------------------+
//! ```
//!
//! While rehashing, lookups probe T0 then T1; inserts go to T1 only (so T0
//! strictly drains); deletes check both. When T0 empties, T1 is installed
//! as T0 and the rehash ends.
//!
//! ## Rehash Duty Cycle
//!
//! - Every mutating operation advances one bucket ([`Dict::rehash`] with
//!   `n = 1`), skipping at most `10 * n` empty buckets per step.
//! - [`Dict::rehash_for`] migrates in 100-bucket batches against a wall
//!   clock budget, for callers with idle time to donate.
//! - A live safe iterator pauses the duty cycle entirely, so bucket chains
//!   are never migrated out from under a traversal.
//!
//! ## Growth and Shrink Policy
//!
//! Growth fires before an insert when the load factor reaches 1, or at
//! [`crate::config::DICT_FORCE_RESIZE_RATIO`] even when resizing has been
//! disabled (a severely overloaded table must be allowed to recover).
//! Shrinking is explicit via [`Dict::resize_to_minimal`]. Table sizes are
//! always powers of two, so bucket selection is a mask.
//!
//! ## Hooks
//!
//! Hashing and key equality live on a [`DictType`] capability object owned
//! by the dictionary. Key/value duplication and destruction are the
//! language's `Clone` and `Drop`. [`BytesDictType`] and
//! [`CaseInsensitiveBytesDictType`] cover byte-string keys, capturing the
//! process-wide hash seed at construction time.
//!
//! ## Traversal
//!
//! Three options, in order of preference for long-running work:
//!
//! 1. [`Dict::scan`]: stateless cursor traversal that tolerates resizes
//!    between calls; every key present for the whole scan is visited at
//!    least once (some may repeat across a resize).
//! 2. [`Dict::iter`]: shared-borrow iteration; captures a structural
//!    fingerprint and asserts on drop that the dictionary was not mutated.
//! 3. [`Dict::iter_safe`]: exclusive-borrow iteration that may delete the
//!    current entry; pauses rehashing while alive.
//!
//! The scan cursor walks bucket indices in reverse-binary-increment order
//! (add one at the masked width, carrying from the high bit downward).
//! That ordering is what makes the coverage guarantee survive a resize:
//! a bucket's expansion set in a larger table shares the cursor's suffix
//! bits, so already-visited buckets are never revisited by a grow, and a
//! shrink folds pending buckets together rather than skipping them.

pub mod hash;

use std::ptr::NonNull;
use std::time::{Duration, Instant};

use eyre::{bail, ensure, Result};
use rand::Rng;
use tracing::debug;

use crate::config::{
    DICT_FORCE_RESIZE_RATIO, DICT_INITIAL_SIZE, DICT_MAX_SIZE, DICT_SHRINK_RATIO,
    REHASH_BATCH_BUCKETS, REHASH_EMPTY_VISITS_PER_STEP,
};

/// Capability object supplying hashing and key equality for a [`Dict`].
///
/// Implementors carry their own state (seeds, collation tables, arena
/// handles), which is what the C design passed around as "private data".
pub trait DictType<K> {
    fn hash(&self, key: &K) -> u32;
    fn key_eq(&self, a: &K, b: &K) -> bool;
}

/// Byte-string keys hashed with the seeded default hash.
///
/// The seed is captured from [`hash::hash_seed`] at construction, so a
/// dictionary stays internally consistent even if the global seed changes
/// later in the process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct BytesDictType {
    seed: u32,
}

impl BytesDictType {
    pub fn new() -> Self {
        Self {
            seed: hash::hash_seed(),
        }
    }

    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for BytesDictType {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: AsRef<[u8]>> DictType<K> for BytesDictType {
    fn hash(&self, key: &K) -> u32 {
        hash::bytes_hash(self.seed, key.as_ref())
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a.as_ref() == b.as_ref()
    }
}

/// ASCII-case-insensitive byte-string keys.
#[derive(Debug, Clone, Copy)]
pub struct CaseInsensitiveBytesDictType {
    seed: u32,
}

impl CaseInsensitiveBytesDictType {
    pub fn new() -> Self {
        Self {
            seed: hash::hash_seed(),
        }
    }
}

impl Default for CaseInsensitiveBytesDictType {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: AsRef<[u8]>> DictType<K> for CaseInsensitiveBytesDictType {
    fn hash(&self, key: &K) -> u32 {
        hash::bytes_hash_nocase(self.seed, key.as_ref())
    }

    fn key_eq(&self, a: &K, b: &K) -> bool {
        a.as_ref().eq_ignore_ascii_case(b.as_ref())
    }
}

struct Entry<K, V> {
    key: K,
    val: V,
    next: Link<K, V>,
}

type Link<K, V> = Option<Box<Entry<K, V>>>;

/// One bucket array. An empty `buckets` vec means "not allocated".
struct Table<K, V> {
    buckets: Vec<Link<K, V>>,
    used: usize,
}

impl<K, V> Table<K, V> {
    fn unallocated() -> Self {
        Self {
            buckets: Vec::new(),
            used: 0,
        }
    }

    fn with_size(size: usize) -> Self {
        let mut buckets = Vec::with_capacity(size);
        buckets.resize_with(size, || None);
        Self { buckets, used: 0 }
    }

    #[inline]
    fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket mask; only meaningful when the table is allocated.
    #[inline]
    fn mask(&self) -> usize {
        self.buckets.len() - 1
    }
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self::unallocated()
    }
}

impl<K, V> Drop for Table<K, V> {
    fn drop(&mut self) {
        // Unlink chains iteratively; dropping a long chain through the
        // nested Box fields would recurse once per entry.
        for slot in &mut self.buckets {
            let mut cur = slot.take();
            while let Some(mut entry) = cur {
                cur = entry.next.take();
            }
        }
    }
}

/// Smallest valid table size covering `size`.
fn next_power(size: usize) -> usize {
    if size >= DICT_MAX_SIZE {
        DICT_MAX_SIZE
    } else {
        size.max(DICT_INITIAL_SIZE).next_power_of_two()
    }
}

/// Chained hash map with incremental rehashing.
pub struct Dict<K, V, T: DictType<K>> {
    ops: T,
    tables: [Table<K, V>; 2],
    /// `Some(bucket)` while migrating T0 into T1.
    rehash_idx: Option<usize>,
    /// Live safe iterators; rehash steps are suppressed while nonzero.
    pause: usize,
    resize_enabled: bool,
}

impl<K, V, T: DictType<K> + Default> Dict<K, V, T> {
    pub fn new() -> Self {
        Self::with_type(T::default())
    }
}

impl<K, V, T: DictType<K> + Default> Default for Dict<K, V, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, T: DictType<K>> Dict<K, V, T> {
    /// Creates an empty dictionary driven by `ops`. No buckets are
    /// allocated until the first insert.
    pub fn with_type(ops: T) -> Self {
        Self {
            ops,
            tables: [Table::unallocated(), Table::unallocated()],
            rehash_idx: None,
            pause: 0,
            resize_enabled: true,
        }
    }

    /// Number of live entries across both tables.
    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bucket slots across both tables.
    pub fn slots(&self) -> usize {
        self.tables[0].size() + self.tables[1].size()
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Allows automatic growth at load factor 1 (the default).
    pub fn enable_resize(&mut self) {
        self.resize_enabled = true;
    }

    /// Suppresses automatic growth except under
    /// [`DICT_FORCE_RESIZE_RATIO`]. Used while a memory snapshot is being
    /// taken and page duplication must be minimized.
    pub fn disable_resize(&mut self) {
        self.resize_enabled = false;
    }

    /// Pre-sizes the table to at least `size` buckets, starting an
    /// incremental rehash when the dictionary already has entries.
    pub fn expand(&mut self, size: usize) -> Result<()> {
        ensure!(
            !self.is_rehashing(),
            "cannot expand while a rehash is in progress"
        );
        ensure!(
            self.tables[0].used <= size,
            "cannot resize below the current population: {} entries",
            self.tables[0].used
        );
        let realsize = next_power(size);
        if realsize == self.tables[0].size() {
            bail!("already sized for {} buckets", realsize);
        }

        let fresh = Table::with_size(realsize);
        if self.tables[0].size() == 0 {
            // First allocation: install directly, nothing to migrate.
            self.tables[0] = fresh;
        } else {
            debug!(
                from = self.tables[0].size(),
                to = realsize,
                used = self.tables[0].used,
                "starting incremental rehash"
            );
            self.tables[1] = fresh;
            self.rehash_idx = Some(0);
        }
        Ok(())
    }

    /// Shrinks the table when it is under 1/10th full, rehashing down to
    /// the smallest power of two that fits the population. Returns whether
    /// a shrink was started.
    pub fn resize_to_minimal(&mut self) -> Result<bool> {
        ensure!(self.resize_enabled, "resizing is disabled");
        ensure!(!self.is_rehashing(), "rehash in progress");
        let used = self.tables[0].used;
        let size = self.tables[0].size();
        if size <= DICT_INITIAL_SIZE || used >= size / DICT_SHRINK_RATIO {
            return Ok(false);
        }
        self.expand(used.max(DICT_INITIAL_SIZE))?;
        Ok(true)
    }

    /// Migrates up to `n` buckets from T0 to T1, visiting at most
    /// `10 * n` empty buckets. Returns `true` while more remains.
    pub fn rehash(&mut self, n: usize) -> bool {
        if !self.is_rehashing() {
            return false;
        }
        let mut empty_visits = n * REHASH_EMPTY_VISITS_PER_STEP;
        let mut remaining = n;
        let mut idx = self.rehash_idx.expect("checked rehashing above");

        while remaining > 0 && self.tables[0].used != 0 {
            remaining -= 1;
            // T0 keeps a populated bucket at or past rehash_idx while any
            // entry remains, so this walk cannot run off the end.
            while self.tables[0].buckets[idx].is_none() {
                debug_assert!(idx + 1 < self.tables[0].size());
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return true;
                }
            }

            let mut entry = self.tables[0].buckets[idx].take();
            while let Some(mut e) = entry {
                entry = e.next.take();
                let h = self.ops.hash(&e.key) as usize;
                let dest = h & self.tables[1].mask();
                e.next = self.tables[1].buckets[dest].take();
                self.tables[1].buckets[dest] = Some(e);
                self.tables[0].used -= 1;
                self.tables[1].used += 1;
            }
            idx += 1;
        }
        self.rehash_idx = Some(idx);

        if self.tables[0].used == 0 {
            self.tables[0] = std::mem::take(&mut self.tables[1]);
            self.rehash_idx = None;
            debug!(size = self.tables[0].size(), "incremental rehash complete");
            return false;
        }
        true
    }

    /// Donates up to `budget` wall-clock time to rehashing, in 100-bucket
    /// batches. Returns the number of batches performed. Safe to call at
    /// any time; partial progress is the normal steady state.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        let start = Instant::now();
        let mut batches = 0;
        while self.rehash(REHASH_BATCH_BUCKETS) {
            batches += 1;
            if start.elapsed() >= budget {
                break;
            }
        }
        batches
    }

    /// The single-bucket step mutators piggyback on; a no-op while a safe
    /// iterator is alive.
    fn rehash_step(&mut self) {
        if self.pause == 0 {
            self.rehash(1);
        }
    }

    /// Inserts a new key. Fails when the key is already present (the
    /// entry is left untouched).
    pub fn add(&mut self, key: K, val: V) -> Result<()> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        ensure!(self.get_entry(&key).is_none(), "key already exists");
        self.insert_new(key, val)
    }

    /// Inserts or updates. Returns `true` when the key was new.
    pub fn replace(&mut self, key: K, val: V) -> Result<bool> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        if let Some(slot) = self.find_mut(&key) {
            // The previous value is dropped here, after the new one is in
            // place, mirroring the swap-then-destroy update order.
            *slot = val;
            return Ok(false);
        }
        self.insert_new(key, val)?;
        Ok(true)
    }

    fn insert_new(&mut self, key: K, val: V) -> Result<()> {
        self.grow_if_needed()?;
        let h = self.ops.hash(&key) as usize;
        // During a rehash all new entries land in the target table, so the
        // source table only ever drains.
        let t = usize::from(self.is_rehashing());
        let table = &mut self.tables[t];
        let idx = h & table.mask();
        let next = table.buckets[idx].take();
        table.buckets[idx] = Some(Box::new(Entry { key, val, next }));
        table.used += 1;
        Ok(())
    }

    fn grow_if_needed(&mut self) -> Result<()> {
        if self.is_rehashing() {
            return Ok(());
        }
        if self.tables[0].size() == 0 {
            return self.expand(DICT_INITIAL_SIZE);
        }
        let used = self.tables[0].used;
        let size = self.tables[0].size();
        if used >= size && (self.resize_enabled || used / size >= DICT_FORCE_RESIZE_RATIO) {
            return self.expand(used.saturating_mul(2));
        }
        Ok(())
    }

    /// Borrowing lookup.
    pub fn find(&self, key: &K) -> Option<&V> {
        self.get_entry(key).map(|(_, v)| v)
    }

    /// Lookup yielding both the stored key and the value.
    pub fn get_entry(&self, key: &K) -> Option<(&K, &V)> {
        if self.len() == 0 {
            return None;
        }
        let h = self.ops.hash(key) as usize;
        for t in 0..2 {
            let table = &self.tables[t];
            if table.size() > 0 {
                let mut cur = table.buckets[h & table.mask()].as_deref();
                while let Some(e) = cur {
                    if self.ops.key_eq(key, &e.key) {
                        return Some((&e.key, &e.val));
                    }
                    cur = e.next.as_deref();
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Mutable lookup.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.len() == 0 {
            return None;
        }
        let ops = &self.ops;
        let rehashing = self.rehash_idx.is_some();
        let h = ops.hash(key) as usize;
        for table in &mut self.tables {
            if table.size() > 0 {
                let idx = h & table.mask();
                let mut cur = table.buckets[idx].as_deref_mut();
                while let Some(e) = cur {
                    if ops.key_eq(key, &e.key) {
                        return Some(&mut e.val);
                    }
                    cur = e.next.as_deref_mut();
                }
            }
            if !rehashing {
                break;
            }
        }
        None
    }

    /// Unlinks `key` and returns the owned pair, or `None` when absent.
    /// Because ownership is returned, the caller decides whether anything
    /// is dropped.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        if self.len() == 0 {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let ops = &self.ops;
        let rehashing = self.rehash_idx.is_some();
        let h = ops.hash(key) as usize;
        for table in &mut self.tables {
            if table.size() > 0 {
                let idx = h & table.mask();
                let mut link = &mut table.buckets[idx];
                while link.is_some() {
                    // The is_some guards above make these unwraps infallible.
                    if ops.key_eq(key, &link.as_ref().unwrap().key) {
                        let mut entry = link.take().unwrap();
                        *link = entry.next.take();
                        table.used -= 1;
                        return Some((entry.key, entry.val));
                    }
                    link = &mut link.as_mut().unwrap().next;
                }
            }
            if !rehashing {
                break;
            }
        }
        None
    }

    /// Drops every entry and both bucket arrays; hooks and settings are
    /// retained.
    pub fn clear(&mut self) {
        self.tables = [Table::unallocated(), Table::unallocated()];
        self.rehash_idx = None;
    }

    /// Uniformly-ish random entry: a random non-empty bucket, then a random
    /// position in its chain. `None` iff empty.
    pub fn random_entry(&self) -> Option<(&K, &V)> {
        if self.len() == 0 {
            return None;
        }
        let mut rng = rand::thread_rng();
        let head = if let Some(rehash_idx) = self.rehash_idx {
            let (s0, s1) = (self.tables[0].size(), self.tables[1].size());
            loop {
                // Buckets below rehash_idx in T0 are already drained.
                let slot = rehash_idx + rng.gen_range(0..s0 + s1 - rehash_idx);
                let head = if slot >= s0 {
                    self.tables[1].buckets[slot - s0].as_deref()
                } else {
                    self.tables[0].buckets[slot].as_deref()
                };
                if head.is_some() {
                    break head;
                }
            }
        } else {
            loop {
                let slot = rng.gen_range(0..self.tables[0].size());
                let head = self.tables[0].buckets[slot].as_deref();
                if head.is_some() {
                    break head;
                }
            }
        };

        let mut chain_len = 0;
        let mut cur = head;
        while let Some(e) = cur {
            chain_len += 1;
            cur = e.next.as_deref();
        }
        let mut pick = rng.gen_range(0..chain_len);
        let mut cur = head;
        while pick > 0 {
            cur = cur.and_then(|e| e.next.as_deref());
            pick -= 1;
        }
        cur.map(|e| (&e.key, &e.val))
    }

    /// Collects up to `count` entries by walking a few random runs of
    /// buckets. Faster and better distributed than calling
    /// [`Dict::random_entry`] in a loop, but with no uniqueness guarantee.
    /// Intended for approximate sampling (evictions, statistics).
    pub fn some_entries(&self, count: usize) -> Vec<(&K, &V)> {
        let count = count.min(self.len());
        let mut out = Vec::with_capacity(count);
        if count == 0 {
            return out;
        }
        let mut rng = rand::thread_rng();

        let tables = if self.is_rehashing() { 2 } else { 1 };
        let mut maxsizemask = self.tables[0].mask();
        if tables == 2 && self.tables[1].size() > self.tables[0].size() {
            maxsizemask = self.tables[1].mask();
        }

        let mut i = rng.gen_range(0..=maxsizemask);
        let mut empty_run = 0usize;
        let mut max_steps = count * 10;
        while out.len() < count && max_steps > 0 {
            max_steps -= 1;
            for t in 0..tables {
                if tables == 2 && t == 0 {
                    if let Some(rehash_idx) = self.rehash_idx {
                        if i < rehash_idx {
                            // Drained prefix of T0; when the index is also
                            // outside T1 (shrinking), jump it forward.
                            if i >= self.tables[1].size() {
                                i = rehash_idx;
                            }
                            continue;
                        }
                    }
                }
                if i >= self.tables[t].size() {
                    continue;
                }
                match self.tables[t].buckets[i].as_deref() {
                    None => {
                        empty_run += 1;
                        if empty_run >= 5 && empty_run > count {
                            i = rng.gen_range(0..=maxsizemask);
                            empty_run = 0;
                        }
                    }
                    Some(mut entry) => {
                        empty_run = 0;
                        loop {
                            out.push((&entry.key, &entry.val));
                            if out.len() == count {
                                return out;
                            }
                            match entry.next.as_deref() {
                                Some(next) => entry = next,
                                None => break,
                            }
                        }
                    }
                }
            }
            i = (i + 1) & maxsizemask;
        }
        out
    }

    /// One step of a stateless, resize-tolerant traversal. Start with
    /// cursor `0`; keep feeding the returned cursor back in; `0` returned
    /// means the scan is complete. Every key present in the dictionary for
    /// the entire scan is emitted at least once; keys may repeat when the
    /// table resizes between calls.
    pub fn scan<F>(&self, cursor: u64, mut f: F) -> u64
    where
        F: FnMut(&K, &V),
    {
        if self.len() == 0 {
            return 0;
        }
        let mut v = cursor;
        let m0;

        if !self.is_rehashing() {
            let t0 = &self.tables[0];
            m0 = t0.mask() as u64;
            Self::scan_bucket(&t0.buckets[(v & m0) as usize], &mut f);
        } else {
            // Visit the small table's bucket, then every bucket of the
            // large table that expands it.
            let (small, large) = if self.tables[0].size() > self.tables[1].size() {
                (&self.tables[1], &self.tables[0])
            } else {
                (&self.tables[0], &self.tables[1])
            };
            m0 = small.mask() as u64;
            let m1 = large.mask() as u64;
            Self::scan_bucket(&small.buckets[(v & m0) as usize], &mut f);
            loop {
                Self::scan_bucket(&large.buckets[(v & m1) as usize], &mut f);
                // Increment only the bits above the small mask.
                v = ((v | m0).wrapping_add(1) & !m0) | (v & m0);
                if v & (m0 ^ m1) == 0 {
                    break;
                }
            }
        }

        // Reverse-binary increment of the masked cursor: the high bit is
        // the one that ticks fastest, which is what keeps already-visited
        // buckets visited across table resizes.
        v |= !m0;
        v = v.reverse_bits();
        v = v.wrapping_add(1);
        v.reverse_bits()
    }

    fn scan_bucket<F>(head: &Link<K, V>, f: &mut F)
    where
        F: FnMut(&K, &V),
    {
        let mut cur = head.as_deref();
        while let Some(e) = cur {
            f(&e.key, &e.val);
            cur = e.next.as_deref();
        }
    }

    /// Structural fingerprint: bucket array addresses, sizes, and
    /// populations of both tables, mixed. Any mutation that could perturb
    /// an in-flight traversal changes it.
    pub fn fingerprint(&self) -> u64 {
        hash::mix_fingerprint([
            self.tables[0].buckets.as_ptr() as u64,
            self.tables[0].size() as u64,
            self.tables[0].used as u64,
            self.tables[1].buckets.as_ptr() as u64,
            self.tables[1].size() as u64,
            self.tables[1].used as u64,
        ])
    }

    /// Read-only iterator over every entry (T0 first, then T1 while
    /// rehashing). Captures a fingerprint on first use and asserts on drop
    /// that the structure was not mutated underneath it.
    pub fn iter(&self) -> Iter<'_, K, V, T> {
        Iter {
            dict: self,
            table: 0,
            bucket: 0,
            cur: None,
            fingerprint: None,
        }
    }

    /// Iterator that permits deleting the entry it last yielded, for
    /// evict-while-walking loops. While one is alive the rehash duty cycle
    /// is suspended, so chains are not migrated mid-traversal.
    pub fn iter_safe(&mut self) -> SafeIter<'_, K, V, T> {
        SafeIter {
            dict: self,
            table: 0,
            bucket: 0,
            cur: None,
            nxt: None,
            cur_table: 0,
            cur_bucket: 0,
            started: false,
        }
    }

    /// Structural self-check used by the test suite after mutations.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        for (i, table) in self.tables.iter().enumerate() {
            let mut counted = 0;
            for slot in &table.buckets {
                let mut cur = slot.as_deref();
                while let Some(e) = cur {
                    counted += 1;
                    cur = e.next.as_deref();
                }
            }
            assert_eq!(
                counted, table.used,
                "table {} used counter out of sync",
                i
            );
        }
        match self.rehash_idx {
            None => {
                assert_eq!(self.tables[1].size(), 0, "T1 allocated outside rehash");
                assert_eq!(self.tables[1].used, 0, "T1 populated outside rehash");
            }
            Some(idx) => {
                for (b, slot) in self.tables[0].buckets.iter().enumerate().take(idx) {
                    assert!(slot.is_none(), "bucket {} below rehash_idx not drained", b);
                }
            }
        }
        // Cross-table duplicate check is quadratic; only run it for small
        // populations.
        if self.is_rehashing() && self.len() <= 512 {
            for slot in &self.tables[0].buckets {
                let mut cur = slot.as_deref();
                while let Some(e) = cur {
                    for other_slot in &self.tables[1].buckets {
                        let mut other = other_slot.as_deref();
                        while let Some(o) = other {
                            assert!(
                                !self.ops.key_eq(&e.key, &o.key),
                                "key present in both tables"
                            );
                            other = o.next.as_deref();
                        }
                    }
                    cur = e.next.as_deref();
                }
            }
        }
    }
}

/// Read-only iterator; see [`Dict::iter`].
pub struct Iter<'a, K, V, T: DictType<K>> {
    dict: &'a Dict<K, V, T>,
    table: usize,
    bucket: usize,
    cur: Option<&'a Entry<K, V>>,
    fingerprint: Option<u64>,
}

impl<'a, K, V, T: DictType<K>> Iterator for Iter<'a, K, V, T> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.fingerprint.is_none() {
            self.fingerprint = Some(self.dict.fingerprint());
        }
        loop {
            if let Some(entry) = self.cur {
                self.cur = entry.next.as_deref();
                return Some((&entry.key, &entry.val));
            }
            let size = self.dict.tables[self.table].size();
            if self.bucket >= size {
                if self.table == 0 && self.dict.is_rehashing() {
                    self.table = 1;
                    self.bucket = 0;
                    continue;
                }
                return None;
            }
            let b = self.bucket;
            self.bucket += 1;
            self.cur = self.dict.tables[self.table].buckets[b].as_deref();
        }
    }
}

impl<K, V, T: DictType<K>> Drop for Iter<'_, K, V, T> {
    fn drop(&mut self) {
        if let Some(fp) = self.fingerprint {
            assert_eq!(
                fp,
                self.dict.fingerprint(),
                "dictionary mutated during unsafe iteration"
            );
        }
    }
}

/// Deletion-capable iterator; see [`Dict::iter_safe`].
pub struct SafeIter<'a, K, V, T: DictType<K>> {
    dict: &'a mut Dict<K, V, T>,
    /// Scan position: next bucket to examine.
    table: usize,
    bucket: usize,
    /// Entry yielded by the last `next` call, if not removed since.
    cur: Option<NonNull<Entry<K, V>>>,
    /// Its successor, captured at yield time so removing `cur` cannot
    /// orphan the walk.
    nxt: Option<NonNull<Entry<K, V>>>,
    /// Where `cur` lives, for unlinking.
    cur_table: usize,
    cur_bucket: usize,
    started: bool,
}

impl<K, V, T: DictType<K>> SafeIter<'_, K, V, T> {
    /// Yields the next entry; the references lend until the next call.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&K, &V)> {
        if !self.started {
            self.started = true;
            self.dict.pause += 1;
        }
        let candidate = match self.nxt.take() {
            Some(n) => Some(n),
            None => self.advance_bucket(),
        };
        self.cur = candidate;
        let cur = candidate?;
        // Entries are heap-stable boxes and this iterator holds the only
        // path to the dictionary, so the captured pointers stay valid.
        unsafe {
            self.nxt = (*cur.as_ptr()).next.as_deref().map(NonNull::from);
            Some((&(*cur.as_ptr()).key, &(*cur.as_ptr()).val))
        }
    }

    fn advance_bucket(&mut self) -> Option<NonNull<Entry<K, V>>> {
        loop {
            let size = self.dict.tables[self.table].size();
            while self.bucket < size {
                let b = self.bucket;
                self.bucket += 1;
                if let Some(e) = self.dict.tables[self.table].buckets[b].as_deref() {
                    self.cur_table = self.table;
                    self.cur_bucket = b;
                    return Some(NonNull::from(e));
                }
            }
            if self.table == 0 && self.dict.is_rehashing() {
                self.table = 1;
                self.bucket = 0;
            } else {
                return None;
            }
        }
    }

    /// Unlinks the entry yielded by the last [`SafeIter::next`] and
    /// returns the owned pair. The walk continues unaffected.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let cur = self.cur.take()?;
        let table = &mut self.dict.tables[self.cur_table];
        let mut link = &mut table.buckets[self.cur_bucket];
        while link.is_some() {
            let found = {
                let e = link.as_deref().unwrap();
                std::ptr::eq(e as *const Entry<K, V>, cur.as_ptr() as *const Entry<K, V>)
            };
            if found {
                let mut entry = link.take().unwrap();
                *link = entry.next.take();
                table.used -= 1;
                return Some((entry.key, entry.val));
            }
            link = &mut link.as_mut().unwrap().next;
        }
        unreachable!("current entry vanished from its bucket");
    }
}

impl<K, V, T: DictType<K>> Drop for SafeIter<'_, K, V, T> {
    fn drop(&mut self) {
        if self.started {
            self.dict.pause -= 1;
        }
    }
}
