//! Whole-system tests against the simulated core.

mod helpers;
mod scenarios;
