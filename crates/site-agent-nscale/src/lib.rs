//! Nscale provider plugin for the site agent
//!
//! This crate implements the [`site_agent_backend`] contracts against
//! the Nscale cloud platform, enabling the agent to provision and
//! account for compute instances and Kubernetes-style clusters.
//!
//! # Features
//!
//! - Compute instance management (create, resize, start/stop, delete)
//! - Compute cluster management (create, delete)
//! - Usage reporting based on live allocation
//! - Optional user/group management through the Nscale identity API
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use site_agent_backend::Backend;
//! use site_agent_nscale::NscaleBackend;
//!
//! let backend = NscaleBackend::new(
//!     &json!({
//!         "api_url": "https://compute.nks.example.com",
//!         "organization_id": "org-1",
//!         "project_id": "proj-1",
//!         "service_token": "secret",
//!     }),
//!     components,
//! )?;
//!
//! if !backend.ping(false).await? {
//!     panic!("Nscale is unreachable");
//! }
//! ```

pub mod api;
pub mod backend;
pub mod client;
pub mod error;
pub mod settings;

// Re-exports
pub use backend::NscaleBackend;
pub use client::NscaleClient;
pub use error::{NscaleError, Result};
pub use settings::{NscaleSettings, ResourceType};
