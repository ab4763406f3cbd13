//! Storage layer (local JSON files).

pub mod json;

pub use json::JsonStore;
