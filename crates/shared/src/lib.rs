//! Shared utilities and common types for the Parting Gift backend.
//!
//! This crate provides functionality used across the other crates:
//! - Address and recipient validation
//! - Lenient parsing of requested release times

pub mod schedule;
pub mod validation;
