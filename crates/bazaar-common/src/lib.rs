//! Bazaar Common - Shared types for the multi-tenant marketplace core
//!
//! This crate provides the primitives every bounded context builds on:
//! - Entity identifiers (tenants, listings, orders, ...)
//! - The caller-facing error taxonomy and a swappable message catalog
//! - A versioned platform configuration behind an injected accessor
//! - A clock abstraction so time-dependent rules stay testable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          BAZAAR CORE                             │
//! │                                                                  │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────────┐ │
//! │  │   access     │   │   billing    │◄──│       catalog         │ │
//! │  │ rate limiter │   │ subscription │   │ unification, listings │ │
//! │  └──────────────┘   │     gate     │   └───────────▲───────────┘ │
//! │                     └──────▲───────┘               │             │
//! │                            │       ┌───────────────┴───────────┐ │
//! │                            └───────│          ledger           │ │
//! │                                    │ stock, orders, checkout   │ │
//! │                                    └───────────────────────────┘ │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │ common: ids | errors | messages | config | clock           │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod messages;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigSource, PlatformConfig, SharedConfig};
pub use error::*;
pub use ids::*;
pub use messages::{EnglishCatalog, Locale, MessageCatalog, SpanishCatalog};
