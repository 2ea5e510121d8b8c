//! IOC fallback: local classification and scoring without external feeds.

use std::net::IpAddr;

use warden_core::FallbackError;

use super::classify::{self, SUSPICIOUS_TLDS};
use super::types::*;
use crate::seed::round_to;

/// Name reported in `sources` for locally derived verdicts.
pub const LOCAL_SOURCE: &str = "local-heuristics";

/// Heuristic score at or above which an indicator is called suspicious.
const SUSPICIOUS_THRESHOLD: f64 = 0.6;

fn base_score(kind: IndicatorType) -> f64 {
    match kind {
        IndicatorType::Url => 0.5,
        IndicatorType::Md5 | IndicatorType::Sha1 | IndicatorType::Sha256 => 0.5,
        IndicatorType::Domain => 0.4,
        IndicatorType::Ipv4 | IndicatorType::Ipv6 => 0.3,
        IndicatorType::Email => 0.2,
        IndicatorType::Unknown => 0.0,
    }
}

fn has_suspicious_tld(host: &str) -> bool {
    classify::tld(host).is_some_and(|t| SUSPICIOUS_TLDS.contains(&t))
}

/// Score an indicator and collect the tags explaining the score.
fn assess(normalized: &str, kind: IndicatorType, defanged: bool) -> (f64, Vec<String>) {
    let mut tags = vec![kind.as_str().to_string()];
    if defanged {
        tags.push("defanged".into());
    }
    if kind == IndicatorType::Unknown {
        return (0.0, tags);
    }

    let mut score = base_score(kind);
    match kind {
        IndicatorType::Ipv4 | IndicatorType::Ipv6 => {
            if let Ok(ip) = normalized.parse::<IpAddr>() {
                if classify::is_internal_ip(&ip) {
                    tags.push("internal".into());
                    return (0.0, tags);
                }
            }
        }
        IndicatorType::Url => {
            if let Some(host) = classify::url_host(normalized) {
                match host.parse::<IpAddr>() {
                    Ok(ip) if classify::is_internal_ip(&ip) => {
                        tags.push("internal".into());
                        return (0.0, tags);
                    }
                    Ok(_) => {
                        tags.push("ip-host".into());
                        score += 0.2;
                    }
                    Err(_) if has_suspicious_tld(host) => {
                        tags.push("suspicious-tld".into());
                        score += 0.2;
                    }
                    Err(_) => {}
                }
            }
        }
        IndicatorType::Domain => {
            if has_suspicious_tld(normalized) {
                tags.push("suspicious-tld".into());
                score += 0.2;
            }
        }
        IndicatorType::Email => {
            if let Some((_, domain)) = normalized.rsplit_once('@') {
                if has_suspicious_tld(domain) {
                    tags.push("suspicious-tld".into());
                    score += 0.2;
                }
            }
        }
        _ => {}
    }

    // Analysts defang what they consider live
    if defanged {
        score += 0.1;
    }
    (round_to(score.min(1.0), 2), tags)
}

pub fn process_indicator(
    req: &ProcessIndicatorRequest,
) -> Result<ProcessIndicatorResponse, FallbackError> {
    let normalized = classify::normalize(&req.value);
    let (_, defanged) = classify::refang(req.value.trim());
    let indicator_type = req
        .indicator_type
        .unwrap_or_else(|| classify::classify(&normalized));
    let (threat_score, tags) = assess(&normalized, indicator_type, defanged);

    Ok(ProcessIndicatorResponse {
        indicator: req.value.clone(),
        indicator_type,
        normalized,
        threat_score,
        tags,
    })
}

/// Without threat feeds the only confident verdict is that an internal
/// address is benign. Everything else is unknown or merely suspicious.
pub fn enrich_indicator(
    req: &EnrichIndicatorRequest,
) -> Result<EnrichIndicatorResponse, FallbackError> {
    let normalized = classify::normalize(&req.indicator);
    let (_, defanged) = classify::refang(req.indicator.trim());
    let (score, tags) = assess(&normalized, req.indicator_type, defanged);

    let (reputation, confidence) = if tags.iter().any(|t| t == "internal") {
        (Reputation::Benign, 0.9)
    } else if score >= SUSPICIOUS_THRESHOLD {
        (Reputation::Suspicious, 0.3)
    } else {
        (Reputation::Unknown, 0.0)
    };

    Ok(EnrichIndicatorResponse {
        indicator: req.indicator.clone(),
        reputation,
        confidence,
        sources: vec![LOCAL_SOURCE.to_string()],
    })
}

pub fn extract_indicators(
    req: &ExtractIndicatorsRequest,
) -> Result<ExtractIndicatorsResponse, FallbackError> {
    Ok(ExtractIndicatorsResponse {
        indicators: classify::extract(&req.text),
    })
}
