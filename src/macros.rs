//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in cellar.
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! little-endian wrapper types (U16, U32).
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{U16, U32};
//!
//! #[repr(C)]
//! struct Header {
//!     total_bytes: U32,
//!     count: U16,
//! }
//!
//! impl Header {
//!     zerocopy_accessors! {
//!         total_bytes: u32,
//!         count: u16,
//!     }
//! }
//!
//! // Generates:
//! // pub fn total_bytes(&self) -> u32 { self.total_bytes.get() }
//! // pub fn set_total_bytes(&mut self, val: u32) { self.total_bytes = U32::new(val); }
//! // pub fn count(&self) -> u16 { self.count.get() }
//! // pub fn set_count(&mut self, val: u16) { self.count = U16::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u16) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u16 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u16) {
                self.$field = ::zerocopy::little_endian::U16::new(val);
            }
        }
    };
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
