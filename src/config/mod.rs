//! Configuration module
//!
//! Handles CLI argument parsing and conversion into engine options.

pub mod cli;
