//! Entitlements
//!
//! Answers the question: "Which product features does this tenant's plan
//! entitle it to use right now?"
//!
//! ## Design Principles
//!
//! 1. **Single Source of Truth**: `FeatureSet::for_plan()` is THE function
//!    that determines feature access
//! 2. **Deterministic**: Same plan always produces the same set
//! 3. **Monotonic**: each tier's set is a superset of every lower tier's set
//! 4. **Fail closed**: an unresolved tenant gets `FeatureSet::empty()`
//!
//! Denial is not an error raised here: `is_enabled` returns a boolean the
//! caller must branch on to produce an access-control rejection.

mod capability;
mod feature_set;

pub use capability::{Capability, UnknownCapability};
pub use feature_set::FeatureSet;
