//! Host-based tenant resolution
//!
//! Maps incoming Host headers to tenants:
//! - Platform subdomains: school-a.classhq.com -> tenant lookup by subdomain
//! - Custom domains: portal.school-a.org -> domain record lookup
//!
//! Resolution reads the Domain Store through a bounded-TTL cache; it never
//! writes domain state.

mod cache;
mod resolver;

pub use cache::{CacheStats, CachedResolution, ResolutionCache};
pub use resolver::{
    normalize_host, ResolveError, ResolvedTenant, TenantResolver, RESERVED_SUBDOMAINS,
};
