//! CVE fallback: CVSS arithmetic and keyword heuristics.

use warden_core::FallbackError;

use super::cvss::{self, Severity};
use super::types::*;
use crate::seed::round_to;

/// Keyword rules for descriptions without a vector, strongest first.
const KEYWORD_RULES: &[(&str, f64, Exploitability)] = &[
    ("remote code execution", 9.8, Exploitability::High),
    ("arbitrary code", 9.0, Exploitability::High),
    ("command injection", 9.0, Exploitability::High),
    ("deserialization", 8.8, Exploitability::High),
    ("authentication bypass", 8.6, Exploitability::High),
    ("sql injection", 8.2, Exploitability::High),
    ("privilege escalation", 7.8, Exploitability::Medium),
    ("path traversal", 7.5, Exploitability::High),
    ("server-side request forgery", 7.2, Exploitability::Medium),
    ("cross-site scripting", 6.1, Exploitability::Medium),
    ("denial of service", 5.3, Exploitability::Medium),
    ("open redirect", 4.7, Exploitability::Medium),
    ("information disclosure", 4.3, Exploitability::Low),
];

/// Score used when nothing in the request indicates severity.
const UNKNOWN_SCORE: f64 = 5.0;

pub fn analyze_cve(req: &AnalyzeCveRequest) -> Result<AnalyzeCveResponse, FallbackError> {
    let (score, exploitability, basis) = match &req.cvss_vector {
        Some(vector) => {
            let scored = cvss::score_vector(vector).map_err(FallbackError::InvalidRequest)?;
            (
                scored.base,
                Exploitability::from_subscore(scored.exploitability),
                "CVSS vector".to_string(),
            )
        }
        None => {
            let description = req.description.as_deref().unwrap_or("").to_lowercase();
            KEYWORD_RULES
                .iter()
                .find(|(keyword, _, _)| description.contains(keyword))
                .map(|(keyword, score, exploitability)| {
                    (*score, *exploitability, format!("keyword '{}'", keyword))
                })
                .unwrap_or((UNKNOWN_SCORE, Exploitability::Medium, "no indicators".to_string()))
        }
    };

    let severity = Severity::from_score(score);
    Ok(AnalyzeCveResponse {
        cve_id: req.cve_id.clone(),
        severity,
        score,
        exploitability,
        summary: format!(
            "Heuristic assessment of {}: {} severity from {}",
            req.cve_id,
            severity.as_str(),
            basis
        ),
    })
}

pub fn score_vector(req: &ScoreVectorRequest) -> Result<ScoreVectorResponse, FallbackError> {
    let scored = cvss::score_vector(&req.vector).map_err(FallbackError::InvalidRequest)?;
    Ok(ScoreVectorResponse {
        base_score: scored.base,
        severity: scored.severity,
        impact: scored.impact,
        exploitability: scored.exploitability,
    })
}

pub fn prioritize(req: &PrioritizeRequest) -> Result<PrioritizeResponse, FallbackError> {
    let weight = req.asset_criticality.weight();
    let mut ranked: Vec<RankedCve> = req
        .cves
        .iter()
        .map(|cve| {
            let risk = round_to((cve.score * weight).min(10.0), 1);
            RankedCve {
                cve_id: cve.cve_id.clone(),
                priority: Priority::from_risk(risk),
                risk_score: risk,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then_with(|| a.cve_id.cmp(&b.cve_id))
    });
    Ok(PrioritizeResponse { ranked })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(description: Option<&str>, vector: Option<&str>) -> AnalyzeCveResponse {
        analyze_cve(&AnalyzeCveRequest {
            cve_id: "CVE-2021-44228".into(),
            description: description.map(String::from),
            cvss_vector: vector.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_vector_wins_over_keywords() {
        let out = analyze(
            Some("Denial of service in parser"),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H"),
        );
        assert_eq!(out.score, 10.0);
        assert_eq!(out.severity, Severity::Critical);
        assert_eq!(out.exploitability, Exploitability::High);
        assert!(out.summary.contains("CVSS vector"));
    }

    #[test]
    fn test_keyword_heuristics() {
        let out = analyze(Some("JNDI lookup allows Remote Code Execution"), None);
        assert_eq!(out.score, 9.8);
        assert_eq!(out.severity, Severity::Critical);

        let out = analyze(Some("Reflected cross-site scripting in search"), None);
        assert_eq!(out.severity, Severity::Medium);

        let out = analyze(None, None);
        assert_eq!(out.score, UNKNOWN_SCORE);
        assert!(out.summary.contains("no indicators"));
    }

    #[test]
    fn test_prioritize_orders_by_risk() {
        let out = prioritize(&PrioritizeRequest {
            cves: vec![
                ScoredCve {
                    cve_id: "CVE-2023-0001".into(),
                    score: 5.0,
                },
                ScoredCve {
                    cve_id: "CVE-2023-0002".into(),
                    score: 9.8,
                },
                ScoredCve {
                    cve_id: "CVE-2023-0003".into(),
                    score: 9.0,
                },
            ],
            asset_criticality: AssetCriticality::Critical,
        })
        .unwrap();

        let ids: Vec<_> = out.ranked.iter().map(|r| r.cve_id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2023-0002", "CVE-2023-0003", "CVE-2023-0001"]);
        // Capped at 10 for critical assets
        assert_eq!(out.ranked[0].risk_score, 10.0);
        assert_eq!(out.ranked[1].risk_score, 10.0);
        assert_eq!(out.ranked[2].risk_score, 6.3);
        assert_eq!(out.ranked[2].priority, Priority::Medium);
    }
}
