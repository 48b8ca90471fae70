//! # Sorted Integer Set
//!
//! A duplicate-free set of signed 64-bit integers stored as one contiguous
//! blob, kept strictly ascending so membership is a binary search and the
//! whole structure is a single allocation. Elements are stored at the
//! narrowest width that fits every member, upgrading in place when a wider
//! value arrives.
//!
//! ## Blob Layout
//!
//! ```text
//! Offset  Size       Field      Description
//! ------  ---------  ---------  --------------------------------------
//! 0       4          encoding   element width in bytes: 2, 4, or 8 (LE)
//! 4       4          length     element count (LE)
//! 8       length*w   elements   little-endian two's complement, ascending
//! ```
//!
//! This layout is a serialization surface: surrounding components persist
//! the blob verbatim, so it must not change.
//!
//! ## Width Upgrades
//!
//! Adding a value wider than the current encoding rewrites the element area
//! from the highest index down, so every read happens before the write that
//! would clobber it. The trigger value is by construction either the new
//! minimum or the new maximum, so it lands at one end without a search.
//! Removals never narrow the encoding.

use eyre::{bail, ensure, Result};
use rand::Rng;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::INTSET_HEADER_SIZE;
use crate::zerocopy_accessors;

/// Element width of an [`IntSet`] blob. Ordered by width so upgrades are a
/// plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    W16 = 2,
    W32 = 4,
    W64 = 8,
}

impl Width {
    /// Narrowest width that can represent `value`.
    pub fn for_value(value: i64) -> Width {
        if value >= i16::MIN as i64 && value <= i16::MAX as i64 {
            Width::W16
        } else if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
            Width::W32
        } else {
            Width::W64
        }
    }

    fn from_raw(raw: u32) -> Result<Width> {
        match raw {
            2 => Ok(Width::W16),
            4 => Ok(Width::W32),
            8 => Ok(Width::W64),
            other => bail!("invalid intset encoding: {}", other),
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct IntSetHeader {
    encoding: U32,
    length: U32,
}

impl IntSetHeader {
    zerocopy_accessors! {
        encoding: u32,
        length: u32,
    }
}

const _: () = assert!(size_of::<IntSetHeader>() == INTSET_HEADER_SIZE);

/// Contiguous sorted set of `i64` values with adaptive element width.
#[derive(Clone)]
pub struct IntSet {
    blob: Vec<u8>,
}

impl IntSet {
    /// Creates an empty set at the narrowest width.
    pub fn new() -> Self {
        let mut blob = vec![0u8; INTSET_HEADER_SIZE];
        let header = IntSetHeader::mut_from_bytes(&mut blob).unwrap();
        header.set_encoding(Width::W16.bytes() as u32);
        Self { blob }
    }

    /// Validates and adopts a persisted blob.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        ensure!(
            blob.len() >= INTSET_HEADER_SIZE,
            "intset blob too small: {} bytes",
            blob.len()
        );
        let header = IntSetHeader::ref_from_bytes(&blob[..INTSET_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read intset header: {:?}", e))?;
        let width = Width::from_raw(header.encoding())?;
        let length = header.length() as usize;
        ensure!(
            blob.len() == INTSET_HEADER_SIZE + length * width.bytes(),
            "intset blob size mismatch: {} bytes for {} elements of width {}",
            blob.len(),
            length,
            width.bytes()
        );
        let set = Self {
            blob: blob.to_vec(),
        };
        for i in 1..length {
            ensure!(
                set.element(i - 1, width) < set.element(i, width),
                "intset elements not strictly ascending at index {}",
                i
            );
        }
        Ok(set)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.header().length() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the backing blob in bytes.
    #[inline]
    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Current element width.
    pub fn width(&self) -> Width {
        // The encoding field only ever holds values this module wrote.
        Width::from_raw(self.header().encoding()).expect("corrupt intset encoding")
    }

    /// Inserts `value`. Returns `false` (without mutating) when already
    /// present.
    pub fn add(&mut self, value: i64) -> bool {
        let width = Width::for_value(value);
        if width > self.width() {
            self.upgrade_and_add(value, width);
            return true;
        }
        match self.search(value) {
            Ok(_) => false,
            Err(pos) => {
                let w = self.width().bytes();
                let len = self.len();
                self.blob.resize(self.blob.len() + w, 0);
                if pos < len {
                    let start = INTSET_HEADER_SIZE + pos * w;
                    let end = INTSET_HEADER_SIZE + len * w;
                    self.blob.copy_within(start..end, start + w);
                }
                self.store_element_at(pos, value, self.width());
                self.header_mut().set_length(len as u32 + 1);
                true
            }
        }
    }

    /// Removes `value`. Returns `false` when absent. The element width is
    /// never narrowed by a removal.
    pub fn remove(&mut self, value: i64) -> bool {
        if Width::for_value(value) > self.width() {
            return false;
        }
        match self.search(value) {
            Err(_) => false,
            Ok(pos) => {
                let w = self.width().bytes();
                let len = self.len();
                if pos + 1 < len {
                    let start = INTSET_HEADER_SIZE + (pos + 1) * w;
                    let end = INTSET_HEADER_SIZE + len * w;
                    self.blob.copy_within(start..end, start - w);
                }
                self.blob.truncate(self.blob.len() - w);
                self.header_mut().set_length(len as u32 - 1);
                true
            }
        }
    }

    /// Membership test; O(log n), with an O(1) reject for values wider than
    /// the current encoding.
    pub fn find(&self, value: i64) -> bool {
        Width::for_value(value) <= self.width() && self.search(value).is_ok()
    }

    /// Uniformly random member, or `None` for an empty set.
    pub fn random(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        let pos = rand::thread_rng().gen_range(0..self.len());
        Some(self.element(pos, self.width()))
    }

    /// Element at `pos`, or `None` past the end.
    pub fn get(&self, pos: usize) -> Option<i64> {
        if pos < self.len() {
            Some(self.element(pos, self.width()))
        } else {
            None
        }
    }

    /// Iterates members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        let width = self.width();
        (0..self.len()).map(move |i| self.element(i, width))
    }

    fn header(&self) -> &IntSetHeader {
        IntSetHeader::ref_from_bytes(&self.blob[..INTSET_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self) -> &mut IntSetHeader {
        IntSetHeader::mut_from_bytes(&mut self.blob[..INTSET_HEADER_SIZE]).unwrap()
    }

    /// Sign-extending load of the element at `pos` under `width`.
    fn element(&self, pos: usize, width: Width) -> i64 {
        let off = INTSET_HEADER_SIZE + pos * width.bytes();
        let bytes = &self.blob[off..off + width.bytes()];
        match width {
            Width::W16 => i16::from_le_bytes(bytes.try_into().unwrap()) as i64,
            Width::W32 => i32::from_le_bytes(bytes.try_into().unwrap()) as i64,
            Width::W64 => i64::from_le_bytes(bytes.try_into().unwrap()),
        }
    }

    /// Truncating store under `width`. The caller guarantees `value` fits.
    fn store_element_at(&mut self, pos: usize, value: i64, width: Width) {
        let off = INTSET_HEADER_SIZE + pos * width.bytes();
        match width {
            Width::W16 => {
                self.blob[off..off + 2].copy_from_slice(&(value as i16).to_le_bytes());
            }
            Width::W32 => {
                self.blob[off..off + 4].copy_from_slice(&(value as i32).to_le_bytes());
            }
            Width::W64 => {
                self.blob[off..off + 8].copy_from_slice(&value.to_le_bytes());
            }
        }
    }

    /// Binary search over the element area: `Ok(pos)` when present,
    /// `Err(insertion_point)` otherwise.
    fn search(&self, value: i64) -> std::result::Result<usize, usize> {
        let len = self.len();
        if len == 0 {
            return Err(0);
        }
        let width = self.width();
        // Out-of-range probes are common when callers test before adding.
        if value > self.element(len - 1, width) {
            return Err(len);
        }
        if value < self.element(0, width) {
            return Err(0);
        }
        let (mut lo, mut hi) = (0usize, len - 1);
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let cur = self.element(mid, width);
            if cur == value {
                return Ok(mid);
            } else if cur < value {
                lo = mid + 1;
            } else {
                // cur > value; mid == 0 cannot happen here because value is
                // >= the first element.
                hi = mid - 1;
            }
        }
        Err(lo)
    }

    /// Rewrites every element at `new_width` (highest index first, so reads
    /// stay ahead of writes) and places `value` at the correct end.
    fn upgrade_and_add(&mut self, value: i64, new_width: Width) {
        let old_width = self.width();
        let len = self.len();
        // A value needing a wider encoding is outside the stored range, so
        // it becomes the new minimum (negative) or maximum (positive).
        let prepend = usize::from(value < 0);

        self.blob
            .resize(INTSET_HEADER_SIZE + (len + 1) * new_width.bytes(), 0);
        self.header_mut().set_encoding(new_width.bytes() as u32);

        for i in (0..len).rev() {
            let v = self.element(i, old_width);
            self.store_element_at(i + prepend, v, new_width);
        }
        if prepend == 1 {
            self.store_element_at(0, value, new_width);
        } else {
            self.store_element_at(len, value, new_width);
        }
        self.header_mut().set_length(len as u32 + 1);
    }

    /// Structural self-check used by the test suite after mutations.
    #[cfg(test)]
    fn check_invariants(&self) {
        let width = self.width();
        assert_eq!(
            self.blob.len(),
            INTSET_HEADER_SIZE + self.len() * width.bytes(),
            "blob size out of sync with header"
        );
        let mut prev: Option<i64> = None;
        for i in 0..self.len() {
            let v = self.element(i, width);
            assert!(
                Width::for_value(v) <= width,
                "element {} wider than the encoding",
                v
            );
            if let Some(p) = prev {
                assert!(p < v, "elements not strictly ascending: {} then {}", p, v);
            }
            prev = Some(v);
        }
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IntSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
