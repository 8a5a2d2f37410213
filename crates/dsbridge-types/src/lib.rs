//! Wire and event types shared by the bridge crates.
//!
//! Nothing in here talks to storage or the network; the relay crate owns
//! behaviour, this crate owns shapes.

pub mod events;
pub mod models;
