//! Live DNS checks for domain ownership challenges

use std::collections::HashSet;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;

/// Prefix for the ownership TXT record
const TXT_RECORD_PREFIX: &str = "_classhq-verification";

/// Name of the TXT record an admin must publish for a hostname
pub fn txt_record_name(hostname: &str) -> String {
    format!("{}.{}", TXT_RECORD_PREFIX, hostname)
}

/// Expected value of the ownership TXT record
pub fn txt_record_value(token: &str) -> String {
    format!("classhq-verify={}", token)
}

/// Result of probing a domain's challenge records
#[derive(Debug, Clone, Copy)]
pub struct DnsCheckOutcome {
    /// CNAME (or ALIAS, detected via A-record overlap) points at the edge
    pub cname_valid: bool,
    /// Ownership TXT record is published with the expected token
    pub txt_valid: bool,
}

impl DnsCheckOutcome {
    pub fn passed(&self) -> bool {
        self.cname_valid && self.txt_valid
    }
}

/// Probe live DNS for a domain's challenge records.
///
/// Root domains often cannot publish a real CNAME; ALIAS/ANAME setups are
/// accepted when the domain's A records overlap the target's A records.
pub async fn probe_challenge(hostname: &str, cname_target: &str, token: &str) -> DnsCheckOutcome {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), ResolverOpts::default());

    let cname_valid = match resolver.lookup(hostname, RecordType::CNAME).await {
        Ok(response) => response.iter().any(|record| {
            record.as_cname().is_some_and(|cname| {
                let cname = cname.to_string();
                cname.trim_end_matches('.').eq_ignore_ascii_case(cname_target)
            })
        }),
        Err(_) => false,
    };

    let routing_valid = if cname_valid {
        true
    } else {
        let hostname_ips = lookup_a_records(&resolver, hostname).await;
        if hostname_ips.is_empty() {
            false
        } else {
            let target_ips = lookup_a_records(&resolver, cname_target).await;
            !hostname_ips.is_disjoint(&target_ips)
        }
    };

    let expected = txt_record_value(token);
    let txt_name = txt_record_name(hostname);
    let txt_valid = match resolver.lookup(txt_name.as_str(), RecordType::TXT).await {
        Ok(response) => response.iter().any(|record| {
            record.as_txt().is_some_and(|txt| {
                txt.txt_data()
                    .iter()
                    .any(|data| String::from_utf8_lossy(data) == expected)
            })
        }),
        Err(_) => false,
    };

    DnsCheckOutcome {
        cname_valid: routing_valid,
        txt_valid,
    }
}

async fn lookup_a_records(resolver: &TokioAsyncResolver, name: &str) -> HashSet<String> {
    match resolver.lookup(name, RecordType::A).await {
        Ok(response) => response
            .iter()
            .filter_map(|record| record.as_a().map(|a| a.to_string()))
            .collect(),
        Err(_) => HashSet::new(),
    }
}
