//! Custom domain ownership verification
//!
//! Admins prove ownership of a custom domain by publishing a TXT challenge
//! and pointing a CNAME at the platform edge. Verification runs out-of-band
//! (admin-triggered or from the worker's sweep) and never blocks request
//! resolution; the resolver only reads its settled state.

mod dns;
mod verifier;

pub use dns::{probe_challenge, txt_record_name, txt_record_value, DnsCheckOutcome};
pub use verifier::{
    generate_verification_token, DnsChallenge, DnsRecordSpec, DomainVerifier, VerificationReport,
    VerifyError,
};
