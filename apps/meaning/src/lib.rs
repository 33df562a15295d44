//! # meaning
//!
//! Command-line front end for `meaning-core`: a catalog of demo schemas,
//! config loading and the command implementations behind the `meaning`
//! binary.

pub mod catalog;
pub mod cli;
pub mod config;
