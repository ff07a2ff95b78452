//! Plan-derived capability sets

use crate::capability::Capability;
use classhq_shared::PlanTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of capability tokens a plan entitles a tenant to.
///
/// Not persisted; computed on demand as a pure function of the plan.
/// Serializes as a list of token strings (e.g. in the
/// `x-tenant-features` header and the context debug endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<Capability>);

impl FeatureSet {
    /// Compute the feature set for a plan: the union of all tokens whose
    /// minimum tier is at or below the plan. Deterministic; higher tiers
    /// always yield supersets of lower tiers.
    pub fn for_plan(plan: PlanTier) -> Self {
        Self(
            Capability::ALL
                .iter()
                .filter(|c| c.min_tier() <= plan)
                .copied()
                .collect(),
        )
    }

    /// The empty set: what an unresolved tenant is entitled to.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_superset(&self, other: &FeatureSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Token strings in stable order, for header propagation and logging
    pub fn tokens(&self) -> Vec<&'static str> {
        self.0.iter().map(|c| c.as_str()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_supersets() {
        let free = FeatureSet::for_plan(PlanTier::Free);
        let standard = FeatureSet::for_plan(PlanTier::Standard);
        let premium = FeatureSet::for_plan(PlanTier::Premium);

        assert!(standard.is_superset(&free));
        assert!(premium.is_superset(&standard));
        assert!(premium.is_superset(&free));

        assert!(free.len() < standard.len());
        assert!(standard.len() < premium.len());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            FeatureSet::for_plan(PlanTier::Standard),
            FeatureSet::for_plan(PlanTier::Standard)
        );
    }

    #[test]
    fn test_standard_plan_gating() {
        // A standard-plan school tracks attendance but cannot rebrand
        let standard = FeatureSet::for_plan(PlanTier::Standard);
        assert!(standard.is_enabled(Capability::AttendanceTracking));
        assert!(standard.is_enabled(Capability::AdvancedGrading));
        assert!(standard.is_enabled(Capability::CustomDomain));
        assert!(!standard.is_enabled(Capability::CustomBranding));
        assert!(!standard.is_enabled(Capability::ApiAccess));
    }

    #[test]
    fn test_free_plan_gating() {
        let free = FeatureSet::for_plan(PlanTier::Free);
        assert!(free.is_enabled(Capability::Gradebook));
        assert!(!free.is_enabled(Capability::AttendanceTracking));
        assert!(!free.is_enabled(Capability::CustomDomain));
    }

    #[test]
    fn test_premium_has_everything() {
        let premium = FeatureSet::for_plan(PlanTier::Premium);
        for cap in Capability::ALL {
            assert!(premium.is_enabled(*cap), "premium missing {}", cap);
        }
    }

    #[test]
    fn test_empty_set_grants_nothing() {
        let empty = FeatureSet::empty();
        assert!(empty.is_empty());
        for cap in Capability::ALL {
            assert!(!empty.is_enabled(*cap));
        }
    }

    #[test]
    fn test_serializes_as_token_list() {
        let free = FeatureSet::for_plan(PlanTier::Free);
        let json = serde_json::to_value(&free).unwrap();
        let tokens: Vec<String> = serde_json::from_value(json).unwrap();
        assert!(tokens.contains(&"gradebook".to_string()));
        assert!(!tokens.contains(&"api_access".to_string()));
    }
}
