//! Larkspur Core - Shared types library.
//!
//! This crate provides the domain types shared by the storefront and its
//! integration tests:
//! - `storefront` - Public-facing e-commerce site
//! - `integration-tests` - End-to-end tests against a mocked commerce API
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. The remote commerce API owns every record; these types are the
//! storefront's transient copies of them.
//!
//! # Modules
//!
//! - [`types`] - IDs, money, emails, addresses and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
