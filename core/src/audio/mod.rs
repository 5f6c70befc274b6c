// Local audio helpers for the announcement pipeline

pub mod duration;

pub use duration::probe_duration;

// Shared audio utilities
pub mod utils;
