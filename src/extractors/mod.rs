// src/extractors/mod.rs
//! Turning scanned node text into history signals

pub mod address;
pub mod classifier;

pub use address::{derive_icon_reference, icon_domain, is_valid_address};
pub use classifier::{DedupState, EventClassifier};
