//! # Packed Dual-Ended List
//!
//! [`PackedList`] stores a sequence of small strings and integers in one
//! contiguous heap blob. Instead of a node per element it pays a 1-11 byte
//! header per entry, which makes short lists dramatically smaller and keeps
//! traversal cache-friendly. Pushes and pops work on both ends; arbitrary
//! insertion and deletion work anywhere at O(n) memmove cost.
//!
//! ## Blob Layout
//!
//! ```text
//! +-------------+-------------+---------+--------+--------+------+------+
//! | total_bytes | tail_offset | count   | entry1 | entry2 | ...  | 0xFF |
//! | u32 LE      | u32 LE      | u16 LE  |        |        |      | end  |
//! +-------------+-------------+---------+--------+--------+------+------+
//! ```
//!
//! - `total_bytes` mirrors the allocation size, so the blob can be resized
//!   or copied without a traversal.
//! - `tail_offset` points at the first byte of the last entry (or at the
//!   terminator when empty), making tail pushes and backward iteration O(1)
//!   to start.
//! - `count` holds the entry count, saturating at `0xFFFF`; once saturated,
//!   [`PackedList::len`] walks the blob.
//!
//! Entry headers are documented in [`entry`]: a `prevlen` field (the byte
//! length of the preceding entry, 1 or 5 bytes) and a `typelen` field that
//! encodes the payload kind inline. Decimal strings are coerced to the
//! narrowest integer encoding on insert.
//!
//! ## Positions Are Offsets
//!
//! Every navigation method deals in byte offsets into the blob. The blob
//! reallocates on mutation, so offsets — like the raw pointers they replace —
//! are only meaningful until the next mutation; mutating methods return the
//! follow-up offset where iteration should continue.
//!
//! ## Insertion
//!
//! Inserting before offset `p` with an encoded size of `req` bytes:
//!
//! ```text
//! 1. prevlen of the new entry = length of p's predecessor (tail when
//!    appending)
//! 2. nextdiff = growth of p's own prevlen field now that it must hold
//!    `req` (+4, 0, or -4 bytes)
//! 3. resize blob to total + req + nextdiff, shift [p, end) right by req
//! 4. rewrite p's prevlen, fix tail_offset (skipping the nextdiff part when
//!    p is itself the tail)
//! 5. cascade while prevlen widths keep changing (see below)
//! 6. write the entry; bump count
//! ```
//!
//! ## Cascade Update
//!
//! Growing an entry can push its successor's length to 254+, which widens
//! the successor's own prevlen field, which can push *its* successor over,
//! and so on. The fix-up walks forward, growing each affected prevlen field.
//! It is deliberately asymmetric: a 5-byte prevlen field that now only needs
//! 1 byte is left wide and overwritten in place, so alternating inserts and
//! deletes at the 254-byte boundary cannot make the chain flap between
//! layouts.
//!
//! ## Deletion
//!
//! Deleting `[p, q)` records the deleted head's prevlen, rewrites `q`'s
//! prevlen to name its new predecessor (moving `q` left by `nextdiff` when
//! the field width changes), shifts the tail left, shrinks the blob, and
//! cascades from the join point when a width changed.

mod entry;
#[cfg(test)]
mod tests;

use tracing::trace;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{PACKED_COUNT_SATURATED, PACKED_END, PACKED_HEADER_SIZE};
use crate::zerocopy_accessors;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct PackedHeader {
    total_bytes: U32,
    tail_offset: U32,
    count: U16,
}

impl PackedHeader {
    zerocopy_accessors! {
        total_bytes: u32,
        tail_offset: u32,
        count: u16,
    }
}

const _: () = assert!(size_of::<PackedHeader>() == PACKED_HEADER_SIZE);

/// One decoded element: either borrowed payload bytes or a coerced integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedValue<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

/// Which end [`PackedList::push`] works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

/// Contiguous packed sequence of strings and integers.
#[derive(Clone)]
pub struct PackedList {
    blob: Vec<u8>,
}

impl PackedList {
    /// Creates an empty list: header plus terminator.
    pub fn new() -> Self {
        let mut blob = vec![0u8; PACKED_HEADER_SIZE + 1];
        blob[PACKED_HEADER_SIZE] = PACKED_END;
        let mut list = Self { blob };
        let header = list.header_mut();
        header.set_total_bytes(PACKED_HEADER_SIZE as u32 + 1);
        header.set_tail_offset(PACKED_HEADER_SIZE as u32);
        header.set_count(0);
        list
    }

    /// Entry count; O(1) until the counter saturates, then a walk.
    pub fn len(&self) -> usize {
        let count = self.header().count();
        if count < PACKED_COUNT_SATURATED {
            count as usize
        } else {
            self.walk_count()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_end(self.head_offset())
    }

    /// Size of the blob in bytes.
    #[inline]
    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }

    /// The serialized form; byte-compatible with the persisted layout.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Offset of the first entry position (the terminator when empty).
    #[inline]
    pub fn head_offset(&self) -> usize {
        PACKED_HEADER_SIZE
    }

    /// Offset of the terminator byte; pushing here appends.
    #[inline]
    pub fn end_offset(&self) -> usize {
        self.total() - 1
    }

    /// True when `at` addresses the terminator rather than an entry.
    #[inline]
    pub fn is_end(&self, at: usize) -> bool {
        self.blob[at] == PACKED_END
    }

    /// Pushes `s` onto the chosen end.
    pub fn push(&mut self, end: End, s: &[u8]) {
        let at = match end {
            End::Head => self.head_offset(),
            End::Tail => self.end_offset(),
        };
        self.insert(at, s);
    }

    /// Offset of the entry at `index`; negative indices count from the tail
    /// (`-1` is the last entry). `None` when out of range.
    pub fn index(&self, index: isize) -> Option<usize> {
        if index < 0 {
            let mut remaining = (-index - 1) as usize;
            let mut p = self.tail();
            if self.is_end(p) {
                return None;
            }
            let (_, mut prevlen) = entry::decode_prevlen(&self.blob[p..]);
            while prevlen > 0 && remaining > 0 {
                remaining -= 1;
                p -= prevlen;
                prevlen = entry::decode_prevlen(&self.blob[p..]).1;
            }
            if remaining > 0 {
                None
            } else {
                Some(p)
            }
        } else {
            let mut remaining = index as usize;
            let mut p = self.head_offset();
            while !self.is_end(p) && remaining > 0 {
                remaining -= 1;
                p += self.raw_entry_len(p);
            }
            if self.is_end(p) || remaining > 0 {
                None
            } else {
                Some(p)
            }
        }
    }

    /// Offset of the entry after `at`, `None` at the tail or terminator.
    pub fn next(&self, at: usize) -> Option<usize> {
        if self.is_end(at) {
            return None;
        }
        let next = at + self.raw_entry_len(at);
        if self.is_end(next) {
            None
        } else {
            Some(next)
        }
    }

    /// Offset of the entry before `at`. Passing the terminator offset
    /// yields the tail, so backward iteration can start from the end.
    pub fn prev(&self, at: usize) -> Option<usize> {
        if self.is_end(at) {
            let tail = self.tail();
            if self.is_end(tail) {
                None
            } else {
                Some(tail)
            }
        } else if at == self.head_offset() {
            None
        } else {
            let (_, prevlen) = entry::decode_prevlen(&self.blob[at..]);
            debug_assert!(prevlen > 0);
            Some(at - prevlen)
        }
    }

    /// Decodes the entry at `at`; `None` at the terminator.
    pub fn get(&self, at: usize) -> Option<PackedValue<'_>> {
        if self.is_end(at) {
            return None;
        }
        let info = entry::entry_info(&self.blob, at);
        let payload = at + info.header_size();
        if info.is_str() {
            Some(PackedValue::Bytes(&self.blob[payload..payload + info.len]))
        } else {
            Some(PackedValue::Int(entry::load_int(
                &self.blob[payload..],
                info.encoding,
            )))
        }
    }

    /// Compares the entry at `at` against `s`. String entries compare by
    /// bytes; integer entries compare numerically, so `"01024"` matches a
    /// stored 1024 regardless of which width either side would encode to.
    pub fn entry_eq(&self, at: usize, s: &[u8]) -> bool {
        match self.get(at) {
            None => false,
            Some(PackedValue::Bytes(bytes)) => bytes == s,
            Some(PackedValue::Int(v)) => entry::parse_int_lenient(s) == Some(v),
        }
    }

    /// Linear search from `at`, comparing every `skip + 1`th entry.
    pub fn find(&self, at: usize, target: &[u8], skip: usize) -> Option<usize> {
        let mut p = at;
        let mut skip_left = 0usize;
        // The integer form of `target` is computed at most once.
        let mut parsed: Option<Option<i64>> = None;
        while !self.is_end(p) {
            let info = entry::entry_info(&self.blob, p);
            let payload = p + info.header_size();
            if skip_left == 0 {
                if info.is_str() {
                    if info.len == target.len()
                        && &self.blob[payload..payload + info.len] == target
                    {
                        return Some(p);
                    }
                } else {
                    let want =
                        *parsed.get_or_insert_with(|| entry::parse_int_lenient(target));
                    if let Some(want) = want {
                        if entry::load_int(&self.blob[payload..], info.encoding) == want {
                            return Some(p);
                        }
                    }
                }
                skip_left = skip;
            } else {
                skip_left -= 1;
            }
            p = payload + info.len;
        }
        None
    }

    /// Inserts `s` before the entry at `at` (append when `at` is the
    /// terminator offset). All previously derived offsets are invalidated.
    pub fn insert(&mut self, at: usize, s: &[u8]) {
        let curlen = self.total();
        let at_end = self.is_end(at);

        // Length of the entry that will precede the new one.
        let prevlen = if !at_end {
            entry::decode_prevlen(&self.blob[at..]).1
        } else {
            let tail = self.tail();
            if self.is_end(tail) {
                0
            } else {
                self.raw_entry_len(tail)
            }
        };

        let coerced = entry::try_int_encoding(s);
        let (encoding, payload_len) = match coerced {
            Some((_, enc)) => (enc, entry::int_size(enc)),
            None => (entry::STR_6BIT, s.len()),
        };
        let reqlen = entry::prevlen_encoded_size(prevlen)
            + entry::typelen_size(encoding, s.len())
            + payload_len;

        // Change in the successor's prevlen field width once it has to
        // describe the new entry.
        let nextdiff: isize = if at_end {
            0
        } else {
            entry::prevlen_encoded_size(reqlen) as isize
                - entry::prevlen_size(self.blob[at]) as isize
        };

        let new_total = (curlen as isize + reqlen as isize + nextdiff) as usize;

        if !at_end {
            let src = (at as isize - nextdiff) as usize;
            let copy_len = curlen - 1 - src;
            let dst = at + reqlen;
            if new_total >= curlen {
                self.resize(new_total);
                self.blob.copy_within(src..src + copy_len, dst);
            } else {
                // nextdiff shrank the blob; move before truncating.
                self.blob.copy_within(src..src + copy_len, dst);
                self.resize(new_total);
            }

            entry::encode_prevlen(&mut self.blob[dst..], reqlen);

            let shifted_tail = self.tail() + reqlen;
            self.set_tail(shifted_tail);
            // The nextdiff bytes sit inside the shifted successor; they only
            // move the tail when that successor is not itself the tail.
            let successor = entry::entry_info(&self.blob, dst);
            if dst + successor.raw_len() != self.end_offset() {
                self.set_tail((shifted_tail as isize + nextdiff) as usize);
            }
        } else {
            self.resize(new_total);
            self.set_tail(at);
        }

        if nextdiff != 0 {
            self.cascade_update(at + reqlen);
        }

        let mut w = at;
        w += entry::encode_prevlen(&mut self.blob[w..], prevlen);
        w += entry::write_typelen(&mut self.blob[w..], encoding, s.len());
        match coerced {
            Some((value, enc)) => entry::store_int(&mut self.blob[w..], value, enc),
            None => self.blob[w..w + s.len()].copy_from_slice(s),
        }
        self.bump_count();
    }

    /// Deletes the entry at `at`; returns the offset of its successor (the
    /// terminator offset when the tail was deleted), valid in the mutated
    /// blob.
    pub fn delete(&mut self, at: usize) -> usize {
        self.delete_entries(at, 1);
        at
    }

    /// Deletes up to `num` entries starting at `index`; returns how many
    /// were removed.
    pub fn delete_range(&mut self, index: isize, num: usize) -> usize {
        match self.index(index) {
            None => 0,
            Some(at) => self.delete_entries(at, num),
        }
    }

    fn delete_entries(&mut self, at: usize, num: usize) -> usize {
        if self.is_end(at) || num == 0 {
            return 0;
        }
        let curlen = self.total();
        let first = entry::entry_info(&self.blob, at);

        let mut p = at;
        let mut deleted = 0usize;
        for _ in 0..num {
            if self.is_end(p) {
                break;
            }
            p += self.raw_entry_len(p);
            deleted += 1;
        }
        let totlen = p - at;
        if totlen == 0 {
            return 0;
        }

        let mut nextdiff: isize = 0;
        if !self.is_end(p) {
            // The survivor's prevlen must now describe the entry before the
            // deleted range; its field may need to widen or narrow.
            nextdiff = entry::prevlen_encoded_size(first.prevlen) as isize
                - entry::prevlen_size(self.blob[p]) as isize;
            let survivor = (p as isize - nextdiff) as usize;
            entry::encode_prevlen(&mut self.blob[survivor..], first.prevlen);

            self.set_tail(self.tail() - totlen);
            let tail_entry = entry::entry_info(&self.blob, survivor);
            if survivor + tail_entry.raw_len() != curlen - 1 {
                self.set_tail((self.tail() as isize + nextdiff) as usize);
            }

            let copy_len = curlen - 1 - survivor;
            self.blob.copy_within(survivor..survivor + copy_len, at);
        } else {
            // Whole tail removed; the entry before the range becomes the
            // tail (the header offset itself when nothing is left).
            self.set_tail(at - first.prevlen);
        }

        let new_total = (curlen as isize - totlen as isize + nextdiff) as usize;
        self.resize(new_total);
        self.drop_count(deleted);

        if nextdiff != 0 {
            self.cascade_update(at);
        }
        deleted
    }

    /// Walks forward from `at`, widening every prevlen field that can no
    /// longer hold its predecessor's length. Fields are grown eagerly but
    /// never narrowed: a wide field holding a small value is rewritten in
    /// place, which keeps repeated insert/delete at the width boundary from
    /// oscillating.
    fn cascade_update(&mut self, mut at: usize) {
        while !self.is_end(at) {
            let cur = entry::entry_info(&self.blob, at);
            let rawlen = cur.raw_len();
            let rawlensize = entry::prevlen_encoded_size(rawlen);

            if self.is_end(at + rawlen) {
                break;
            }
            let next = entry::entry_info(&self.blob, at + rawlen);
            if next.prevlen == rawlen {
                break;
            }

            if next.prevlen_size < rawlensize {
                let curlen = self.total();
                let extra = rawlensize - next.prevlen_size;
                let successor = at + rawlen;
                trace!(at = successor, extra, "cascade widening prevlen field");

                self.resize(curlen + extra);
                if self.tail() != successor {
                    self.set_tail(self.tail() + extra);
                }
                let src = successor + next.prevlen_size;
                let copy_len = curlen - 1 - src;
                self.blob
                    .copy_within(src..src + copy_len, successor + rawlensize);
                entry::encode_prevlen(&mut self.blob[successor..], rawlen);

                at = successor;
            } else {
                if next.prevlen_size > rawlensize {
                    entry::encode_prevlen_force_large(&mut self.blob[at + rawlen..], rawlen);
                } else {
                    entry::encode_prevlen(&mut self.blob[at + rawlen..], rawlen);
                }
                // The successor's own size did not change, so nothing
                // further down can be affected.
                break;
            }
        }
    }

    fn header(&self) -> &PackedHeader {
        PackedHeader::ref_from_bytes(&self.blob[..PACKED_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self) -> &mut PackedHeader {
        PackedHeader::mut_from_bytes(&mut self.blob[..PACKED_HEADER_SIZE]).unwrap()
    }

    #[inline]
    fn total(&self) -> usize {
        self.header().total_bytes() as usize
    }

    #[inline]
    fn tail(&self) -> usize {
        self.header().tail_offset() as usize
    }

    fn set_tail(&mut self, at: usize) {
        self.header_mut().set_tail_offset(at as u32);
    }

    /// Grows or shrinks the blob, keeping `total_bytes` and the terminator
    /// in sync.
    fn resize(&mut self, len: usize) {
        self.blob.resize(len, 0);
        self.header_mut().set_total_bytes(len as u32);
        self.blob[len - 1] = PACKED_END;
    }

    fn raw_entry_len(&self, at: usize) -> usize {
        entry::entry_info(&self.blob, at).raw_len()
    }

    fn walk_count(&self) -> usize {
        let mut count = 0;
        let mut p = self.head_offset();
        while !self.is_end(p) {
            p += self.raw_entry_len(p);
            count += 1;
        }
        count
    }

    fn bump_count(&mut self) {
        let count = self.header().count();
        if count < PACKED_COUNT_SATURATED {
            self.header_mut().set_count(count + 1);
        }
    }

    fn drop_count(&mut self, deleted: usize) {
        let count = self.header().count();
        if count < PACKED_COUNT_SATURATED {
            self.header_mut().set_count(count - deleted as u16);
        } else {
            // Saturated counter: recount so the header again reflects
            // min(true count, saturation).
            let true_count = self.walk_count();
            let clamped = true_count.min(PACKED_COUNT_SATURATED as usize);
            self.header_mut().set_count(clamped as u16);
        }
    }

    /// Structural self-check used by the test suite after mutations.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert_eq!(self.total(), self.blob.len(), "total_bytes out of sync");
        assert_eq!(
            self.blob[self.blob.len() - 1],
            PACKED_END,
            "missing terminator"
        );

        let mut p = self.head_offset();
        let mut prev_raw_len = 0usize;
        let mut last_entry = None;
        let mut count = 0usize;
        while !self.is_end(p) {
            let info = entry::entry_info(&self.blob, p);
            assert_eq!(
                info.prevlen, prev_raw_len,
                "prevlen chain broken at offset {}",
                p
            );
            prev_raw_len = info.raw_len();
            last_entry = Some(p);
            p += info.raw_len();
            count += 1;
        }
        assert_eq!(p, self.end_offset(), "entries do not fill the blob");
        assert_eq!(
            self.tail(),
            last_entry.unwrap_or(self.head_offset()),
            "tail_offset does not point at the last entry"
        );
        assert_eq!(
            self.header().count() as usize,
            count.min(PACKED_COUNT_SATURATED as usize),
            "count does not reflect the entry walk"
        );
    }
}

impl Default for PackedList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PackedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        let mut p = self.head_offset();
        while let Some(value) = self.get(p) {
            list.entry(&value);
            p += self.raw_entry_len(p);
        }
        list.finish()
    }
}
