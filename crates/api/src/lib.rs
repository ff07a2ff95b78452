//! ClassHQ API Library
//!
//! Request-time tenancy for the ClassHQ platform: hostname-to-tenant
//! resolution, custom domain verification, plan-based feature gating, and
//! the per-request tenant context injected ahead of every downstream
//! handler.

pub mod certs;
pub mod config;
pub mod error;
pub mod routes;
pub mod routing;
pub mod state;
pub mod store;
pub mod tenancy;
pub mod verify;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routing::{ResolutionCache, ResolvedTenant, TenantResolver};
pub use state::AppState;
pub use store::{DomainStore, PgDomainStore};
pub use tenancy::TenantContext;
pub use verify::DomainVerifier;
