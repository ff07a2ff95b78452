//! Capability tokens and their minimum plan tiers

use classhq_shared::PlanTier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An opaque capability token gating access to a product feature.
///
/// Every token belongs to exactly one minimum plan tier; a tenant on a given
/// tier holds the union of that tier's tokens with all lower tiers' tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // Free
    Gradebook,
    RosterManagement,
    ParentPortal,

    // Standard
    AttendanceTracking,
    AdvancedGrading,
    BulkExport,
    CustomDomain,

    // Premium
    CustomBranding,
    ApiAccess,
    Sso,
    Webhooks,
    PrioritySupport,
}

impl Capability {
    /// Every capability in the fixed table, in tier order
    pub const ALL: &'static [Capability] = &[
        Capability::Gradebook,
        Capability::RosterManagement,
        Capability::ParentPortal,
        Capability::AttendanceTracking,
        Capability::AdvancedGrading,
        Capability::BulkExport,
        Capability::CustomDomain,
        Capability::CustomBranding,
        Capability::ApiAccess,
        Capability::Sso,
        Capability::Webhooks,
        Capability::PrioritySupport,
    ];

    /// The lowest plan tier that grants this capability
    pub fn min_tier(&self) -> PlanTier {
        match self {
            Capability::Gradebook | Capability::RosterManagement | Capability::ParentPortal => {
                PlanTier::Free
            }
            Capability::AttendanceTracking
            | Capability::AdvancedGrading
            | Capability::BulkExport
            | Capability::CustomDomain => PlanTier::Standard,
            Capability::CustomBranding
            | Capability::ApiAccess
            | Capability::Sso
            | Capability::Webhooks
            | Capability::PrioritySupport => PlanTier::Premium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Gradebook => "gradebook",
            Capability::RosterManagement => "roster_management",
            Capability::ParentPortal => "parent_portal",
            Capability::AttendanceTracking => "attendance_tracking",
            Capability::AdvancedGrading => "advanced_grading",
            Capability::BulkExport => "bulk_export",
            Capability::CustomDomain => "custom_domain",
            Capability::CustomBranding => "custom_branding",
            Capability::ApiAccess => "api_access",
            Capability::Sso => "sso",
            Capability::Webhooks => "webhooks",
            Capability::PrioritySupport => "priority_support",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a capability token string is not in the fixed table
#[derive(Debug, Error)]
#[error("Unknown capability token: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}
