//! Command-line interface for the gitpulse binary.

pub mod args;
