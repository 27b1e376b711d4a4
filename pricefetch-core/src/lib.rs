//! pricefetch core: loads daily commodity prices into a GnuCash book.
//!
//! This crate contains everything except the terminal:
//! - Layered configuration (defaults, INI file, command line) and prompting
//! - Commodity and price domain types
//! - Quote providers (Yahoo Finance)
//! - The GnuCash book store and the CSV sink
//! - The run pipeline tying them together

pub mod config;
pub mod data;
pub mod domain;
pub mod pipeline;
pub mod sink;
pub mod store;
