//! CLI module for cadence - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the scheduler,
//! managing items and previewing recurrences.

pub mod commands;

pub use commands::Cli;
