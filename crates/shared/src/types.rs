//! Common tenancy types used across ClassHQ

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Tenant ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Domain ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub Uuid);

impl DomainId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DomainId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for DomainId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Plans
// =============================================================================

/// Subscription plan tier.
///
/// Tiers are ordered: `Free < Standard < Premium`. Capability sets derived
/// from a tier are supersets of every lower tier's set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Standard,
    Premium,
}

impl Default for PlanTier {
    fn default() -> Self {
        Self::Free
    }
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = ();

    /// Unknown plan strings parse to `Free`: a corrupt or legacy plan value
    /// must never grant more access than the lowest tier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(PlanTier::Standard),
            "premium" => Ok(PlanTier::Premium),
            _ => Ok(PlanTier::Free),
        }
    }
}

// =============================================================================
// Tenants
// =============================================================================

/// Per-tenant settings (locale, branding, notification toggles)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub locale: String,
    pub branding_color: Option<String>,
    pub notifications_enabled: bool,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            branding_color: None,
            notifications_enabled: true,
        }
    }
}

/// A school (tenant) in the multi-tenant platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// The platform-issued subdomain label (e.g. "school-a" for
    /// school-a.classhq.com)
    pub subdomain: String,
    pub plan: PlanTier,
    pub active: bool,
    pub settings: TenantSettings,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Domains
// =============================================================================

/// How a hostname is bound to its tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    /// The platform-issued subdomain (e.g. school-a.classhq.com)
    Primary,
    /// A customer-owned custom domain (e.g. portal.school-a.org)
    Custom,
}

impl DomainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for DomainKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(DomainKind::Primary),
            _ => Ok(DomainKind::Custom),
        }
    }
}

/// Ownership verification state of a domain.
///
/// The only monotonic transition on the request path is pending -> verified;
/// `Failed` is assigned out-of-band after repeated unsuccessful checks and
/// remains retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    #[default]
    Pending,
    Verified,
    Failed,
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for VerificationState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(VerificationState::Verified),
            "failed" => Ok(VerificationState::Failed),
            _ => Ok(VerificationState::Pending),
        }
    }
}

/// TLS certificate serving state. Advisory only: a domain can be verified
/// (ownership proven) while its certificate is still provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslStatus {
    #[default]
    Inactive,
    Provisioning,
    Active,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
        }
    }
}

impl FromStr for SslStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(SslStatus::Provisioning),
            "active" => Ok(SslStatus::Active),
            _ => Ok(SslStatus::Inactive),
        }
    }
}

/// Certificate status details alongside the coarse state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SslState {
    pub status: SslStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub provisioned_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// A hostname bound to exactly one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub tenant_id: TenantId,
    /// Normalized hostname (lowercase, no port); globally unique
    pub hostname: String,
    pub kind: DomainKind,
    pub verification: VerificationState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub verification_token: String,
    pub verification_attempts: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_verification_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    pub ssl: SslState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Domain {
    /// Whether this domain is allowed to route requests to its tenant.
    ///
    /// Primary subdomains are platform-issued and route immediately; custom
    /// domains route only once ownership has been verified. SSL status is
    /// deliberately not consulted here.
    pub fn routable(&self) -> bool {
        match self.kind {
            DomainKind::Primary => true,
            DomainKind::Custom => self.verification == VerificationState::Verified,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tier_ordering() {
        assert!(PlanTier::Free < PlanTier::Standard);
        assert!(PlanTier::Standard < PlanTier::Premium);
    }

    #[test]
    fn test_plan_tier_parse_fails_closed() {
        // Unknown plan strings must never resolve above the lowest tier
        assert_eq!("premium".parse::<PlanTier>().unwrap(), PlanTier::Premium);
        assert_eq!("standard".parse::<PlanTier>().unwrap(), PlanTier::Standard);
        assert_eq!("free".parse::<PlanTier>().unwrap(), PlanTier::Free);
        assert_eq!("platinum".parse::<PlanTier>().unwrap(), PlanTier::Free);
        assert_eq!("".parse::<PlanTier>().unwrap(), PlanTier::Free);
    }

    #[test]
    fn test_verification_state_roundtrip() {
        for state in [
            VerificationState::Pending,
            VerificationState::Verified,
            VerificationState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<VerificationState>().unwrap(), state);
        }
    }

    #[test]
    fn test_routable() {
        let now = OffsetDateTime::now_utc();
        let mut domain = Domain {
            id: DomainId::new(),
            tenant_id: TenantId::new(),
            hostname: "portal.school-a.org".to_string(),
            kind: DomainKind::Custom,
            verification: VerificationState::Pending,
            verification_token: String::new(),
            verification_attempts: 0,
            last_verification_at: None,
            verified_at: None,
            ssl: SslState::default(),
            created_at: now,
            updated_at: now,
        };

        // Unverified custom domains never route
        assert!(!domain.routable());
        domain.verification = VerificationState::Failed;
        assert!(!domain.routable());

        // Verified custom domains route even while SSL is provisioning
        domain.verification = VerificationState::Verified;
        assert_eq!(domain.ssl.status, SslStatus::Inactive);
        assert!(domain.routable());

        // Primary subdomains route regardless of verification bookkeeping
        domain.kind = DomainKind::Primary;
        domain.verification = VerificationState::Pending;
        assert!(domain.routable());
    }
}
