//! Bazaar Core - Shared types library.
//!
//! This crate provides the domain types used across Bazaar components:
//! - `storefront` - Gateway clients and client-side state synchronization
//! - `integration-tests` - End-to-end tests against a fake Gateway
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. Cart and wishlist aggregates (totals, counts) live here
//! so they can be computed from any snapshot without touching the network.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, quantities, carts, wishlists, products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
