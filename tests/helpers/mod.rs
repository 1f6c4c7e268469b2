//! Test helpers module
//!
//! This module provides utilities for driving the API in integration tests:
//! an in-memory application harness and generated request payloads.

#![allow(dead_code)]

pub mod test_app;
pub mod test_data;

pub use test_app::*;
pub use test_data::*;
