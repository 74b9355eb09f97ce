//! # agglo
//!
//! Library half of the `agglo` binary: CLI definitions, command
//! implementations and the configuration file.

pub mod cli;
pub mod config;
