//! # Configuration Module
//!
//! This module centralizes all configuration constants for cellar. Constants
//! are grouped by their functional area and interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The packed-list markers, the dictionary sizing ratios, and the byte-buffer
//! preallocation cap are all values that more than one module has an opinion
//! about. Scattering them invites mismatch bugs (a terminator constant in one
//! file and a decoder table in another). Co-locating them with compile-time
//! checks prevents such issues.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
