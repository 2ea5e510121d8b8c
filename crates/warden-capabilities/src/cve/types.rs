//! CVE request and response shapes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_core::operation::check_range;
use warden_core::Validate;

use super::cvss::{self, Severity};

static CVE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CVE-\d{4}-\d{4,}$").expect("valid regex"));

/// Whether `id` has the `CVE-YYYY-NNNN` shape (four or more sequence digits).
pub fn is_valid_cve_id(id: &str) -> bool {
    CVE_ID.is_match(id)
}

fn check_cve_id(id: &str) -> Result<(), String> {
    if is_valid_cve_id(id) {
        Ok(())
    } else {
        Err(format!("'{}' is not a CVE identifier", id))
    }
}

/// Exploitability rating derived from the CVSS exploitability sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exploitability {
    Low,
    Medium,
    High,
}

impl Exploitability {
    pub fn from_subscore(subscore: f64) -> Self {
        if subscore >= 3.0 {
            Exploitability::High
        } else if subscore >= 1.5 {
            Exploitability::Medium
        } else {
            Exploitability::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCriticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl AssetCriticality {
    pub fn weight(&self) -> f64 {
        match self {
            AssetCriticality::Low => 0.5,
            AssetCriticality::Medium => 0.75,
            AssetCriticality::High => 1.0,
            AssetCriticality::Critical => 1.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn from_risk(risk: f64) -> Self {
        if risk >= 9.0 {
            Priority::Critical
        } else if risk >= 7.0 {
            Priority::High
        } else if risk >= 4.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCveRequest {
    pub cve_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss_vector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCveResponse {
    pub cve_id: String,
    pub severity: Severity,
    pub score: f64,
    pub exploitability: Exploitability,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreVectorRequest {
    pub vector: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreVectorResponse {
    pub base_score: f64,
    pub severity: Severity,
    pub impact: f64,
    pub exploitability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCve {
    pub cve_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeRequest {
    pub cves: Vec<ScoredCve>,
    #[serde(default)]
    pub asset_criticality: AssetCriticality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCve {
    pub cve_id: String,
    pub priority: Priority,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizeResponse {
    pub ranked: Vec<RankedCve>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum CveRequest {
    #[serde(rename = "analyzeCve")]
    AnalyzeCve(AnalyzeCveRequest),
    #[serde(rename = "scoreVector")]
    ScoreVector(ScoreVectorRequest),
    #[serde(rename = "prioritize")]
    Prioritize(PrioritizeRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum CveResponse {
    #[serde(rename = "analyzeCve")]
    AnalyzeCve(AnalyzeCveResponse),
    #[serde(rename = "scoreVector")]
    ScoreVector(ScoreVectorResponse),
    #[serde(rename = "prioritize")]
    Prioritize(PrioritizeResponse),
}

impl Validate for CveRequest {
    fn validate(&self) -> Result<(), String> {
        match self {
            CveRequest::AnalyzeCve(r) => {
                check_cve_id(&r.cve_id)?;
                match &r.cvss_vector {
                    Some(vector) => cvss::parse_vector(vector).map(|_| ()),
                    None => Ok(()),
                }
            }
            CveRequest::ScoreVector(r) => cvss::parse_vector(&r.vector).map(|_| ()),
            CveRequest::Prioritize(r) => r.cves.iter().try_for_each(|c| {
                check_cve_id(&c.cve_id)?;
                check_range("score", c.score, 0.0, 10.0)
            }),
        }
    }
}

impl Validate for CveResponse {
    fn validate(&self) -> Result<(), String> {
        match self {
            CveResponse::AnalyzeCve(r) => check_range("score", r.score, 0.0, 10.0),
            CveResponse::ScoreVector(r) => {
                check_range("baseScore", r.base_score, 0.0, 10.0)?;
                check_range("impact", r.impact, 0.0, 10.0)?;
                check_range("exploitability", r.exploitability, 0.0, 10.0)
            }
            CveResponse::Prioritize(r) => r
                .ranked
                .iter()
                .try_for_each(|c| check_range("riskScore", c.risk_score, 0.0, 10.0)),
        }
    }
}
