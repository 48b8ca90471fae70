//! # cellar - Compact In-Memory Containers for a Key/Value Store
//!
//! cellar is the data-structure core that a key/value database sits on: a
//! small family of containers tuned for memory density and cache locality
//! rather than pointer generality. This implementation prioritizes:
//!
//! - **Byte-exact layouts**: the packed list and integer set blobs are
//!   serialization surfaces, reproduced bit-for-bit
//! - **Bounded pauses**: the dictionary grows by migrating one bucket per
//!   operation, never stopping the world
//! - **Single allocation per container**: packed containers trade O(n)
//!   reallocation for zero per-element pointer overhead
//!
//! ## Quick Start
//!
//! ```
//! use cellar::{Dict, BytesDictType, PackedList, End, IntSet};
//!
//! let mut dict: Dict<Vec<u8>, u64, BytesDictType> = Dict::new();
//! dict.add(b"visits".to_vec(), 1)?;
//!
//! let mut list = PackedList::new();
//! list.push(End::Tail, b"1024"); // stored as a 2-byte integer
//!
//! let mut set = IntSet::new();
//! set.add(42);
//! # Ok::<(), eyre::Report>(())
//! ```
//!
//! ## Architecture
//!
//! The containers are mutually independent leaves; a database layers its
//! object model on top:
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │        Key/Value Object Layer (caller)     │
//! ├─────────┬──────────┬───────────┬──────────┤
//! │  dict   │ packed-  │  intset   │   list   │
//! │ (hash   │  list    │ (sorted   │ (linked  │
//! │  map)   │ (packed  │  int set) │  nodes)  │
//! │         │  seq)    │           │          │
//! ├─────────┴──────────┴───────────┴──────────┤
//! │   bytebuf (dynamic byte strings)           │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`bytebuf`]: growable NUL-terminated byte buffer with spare-capacity
//!   accounting and a shell-style tokenizer
//! - [`list`]: doubly linked list with O(1) splice and cursor-based removal
//! - [`intset`]: sorted duplicate-free integer blob with adaptive element
//!   width
//! - [`packedlist`]: dual-ended packed sequence with per-entry variable
//!   headers and integer coercion
//! - [`dict`]: chained hash map with incremental rehashing, cursor scan,
//!   and random sampling
//! - [`config`]: centralized tunables and wire-format constants
//!
//! ## Concurrency Model
//!
//! Everything here is single-threaded cooperative: no locks, no yielding,
//! every operation completes before the next begins. Containers are `Send`
//! where their contents allow it, but concurrent mutation requires external
//! synchronization. The only process-wide state is the hash seed
//! ([`set_hash_seed`]), set once at startup.

#[macro_use]
mod macros;

pub mod bytebuf;
pub mod config;
pub mod dict;
pub mod intset;
pub mod list;
pub mod packedlist;

pub use bytebuf::ByteBuf;
pub use dict::hash::{hash_seed, set_hash_seed};
pub use dict::{BytesDictType, CaseInsensitiveBytesDictType, Dict, DictType};
pub use intset::{IntSet, Width};
pub use list::{CursorMut, List};
pub use packedlist::{End, PackedList, PackedValue};
