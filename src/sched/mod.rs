//! Thread selection policy.

pub mod rr;

pub use rr::RoundRobinScheduler;
