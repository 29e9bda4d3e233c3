//! coinsheet library
//!
//! This module exposes the pipeline pieces for use by the binary and integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod market;
pub mod table;
pub mod workbook;
