//! Queue module - sequential generation drive and out-of-band retry

pub mod controller;

pub use controller::{QueueController, QueueEvent};
