//! Site-agent backend abstraction
//!
//! This crate defines the contracts the site agent expects from a
//! provider plugin, enabling the agent to manage compute resources
//! across providers through a single interface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   Site Agent                     │
//! │        (order processing, reconciliation)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │             site-agent-backend                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait Backend   (lifecycle hooks)        │   │
//! │  │  trait Client    (generic resources)      │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │    nscale     │
//! │    plugin     │
//! └───────────────┘
//! ```
//!
//! A plugin implements [`Client`] against the provider's REST API and
//! [`Backend`] on top of it. The agent drives the hooks on its own
//! schedule and owns all retry and concurrency decisions.

pub mod backend;
pub mod client;
pub mod error;
pub mod structures;

// Re-exports
pub use backend::{Backend, TOTAL_ACCOUNT_USAGE, UsageReport};
pub use client::{Client, ClientUsage};
pub use error::{BackendError, Result};
pub use structures::{
    Association, BackendComponent, BackendResourceInfo, ClientResource, ComponentMap, Resource,
    ResourceLimits,
};
