//! Unit tests for the export engine and format writers.
//!
//! These tests run the real engine against temporary directories and read
//! the artifacts back to verify layout, coordinate handling, and the
//! partial-failure / cancellation behavior of batch exports.

mod json_tests;
mod roundtrip_tests;
