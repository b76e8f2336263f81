#![doc = "kb-sync-core: core logic library for kb-sync."]

//! Everything that decides what happens to a knowledge base document lives
//! here: mapping repository paths to canonical document names, reading front
//! matter, and the full and incremental reconciliation runs. Remote systems
//! are reached only through the traits in [`contract`]; the HTTP clients are
//! in the `kb-sync` crate.

pub mod config;
pub mod contract;
pub mod front_matter;
pub mod metadata;
pub mod normalize;
pub mod preprocess;
pub mod synchronise;
