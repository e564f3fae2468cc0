//! Small shared helpers.

pub mod config;
