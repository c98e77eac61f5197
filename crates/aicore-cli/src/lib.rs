//! aicore CLI library
//!
//! Exposes the command implementations for testing.

pub mod commands;
pub mod exit;
pub mod output;
