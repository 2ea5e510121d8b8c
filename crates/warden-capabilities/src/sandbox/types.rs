//! Sandbox request and response shapes.

use serde::{Deserialize, Serialize};
use warden_core::operation::{check_not_blank, check_range};
use warden_core::Validate;

/// Highest value a sandbox score may take.
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Unknown,
    Clean,
    Suspicious,
    Malicious,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSampleRequest {
    pub file_name: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSampleResponse {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetReportRequest {
    pub submission_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetReportResponse {
    pub submission_id: String,
    pub verdict: Verdict,
    pub score: f64,
    #[serde(default)]
    pub behaviors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBehaviorRequest {
    pub api_calls: Vec<String>,
}

/// One ATT&CK technique matched by an observed API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechniqueHit {
    pub id: String,
    pub name: String,
    pub api_call: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBehaviorResponse {
    pub verdict: Verdict,
    pub score: f64,
    pub techniques: Vec<TechniqueHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum SandboxRequest {
    #[serde(rename = "submitSample")]
    SubmitSample(SubmitSampleRequest),
    #[serde(rename = "getReport")]
    GetReport(GetReportRequest),
    #[serde(rename = "analyzeBehavior")]
    AnalyzeBehavior(AnalyzeBehaviorRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum SandboxResponse {
    #[serde(rename = "submitSample")]
    SubmitSample(SubmitSampleResponse),
    #[serde(rename = "getReport")]
    GetReport(GetReportResponse),
    #[serde(rename = "analyzeBehavior")]
    AnalyzeBehavior(AnalyzeBehaviorResponse),
}

fn check_sha256(value: &str) -> Result<(), String> {
    if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err("sha256 must be 64 hex digits".to_string())
    }
}

impl Validate for SandboxRequest {
    fn validate(&self) -> Result<(), String> {
        match self {
            SandboxRequest::SubmitSample(r) => {
                check_not_blank("fileName", &r.file_name)?;
                check_sha256(&r.sha256)?;
                if r.size_bytes == 0 {
                    return Err("sizeBytes must be positive".to_string());
                }
                Ok(())
            }
            SandboxRequest::GetReport(r) => check_not_blank("submissionId", &r.submission_id),
            SandboxRequest::AnalyzeBehavior(_) => Ok(()),
        }
    }
}

impl Validate for SandboxResponse {
    fn validate(&self) -> Result<(), String> {
        match self {
            SandboxResponse::SubmitSample(r) => check_not_blank("submissionId", &r.submission_id),
            SandboxResponse::GetReport(r) => check_range("score", r.score, 0.0, MAX_SCORE),
            SandboxResponse::AnalyzeBehavior(r) => check_range("score", r.score, 0.0, MAX_SCORE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_validation() {
        let submit = |sha256: &str, size_bytes| {
            SandboxRequest::SubmitSample(SubmitSampleRequest {
                file_name: "invoice.exe".into(),
                sha256: sha256.into(),
                size_bytes,
            })
            .validate()
        };
        let digest = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert!(submit(digest, 1024).is_ok());
        assert!(submit(digest, 0).is_err());
        assert!(submit("abc", 1024).unwrap_err().contains("sha256"));
    }

    #[test]
    fn test_score_bounds() {
        let report = |score| {
            SandboxResponse::GetReport(GetReportResponse {
                submission_id: "s1".into(),
                verdict: Verdict::Unknown,
                score,
                behaviors: vec![],
            })
            .validate()
        };
        assert!(report(0.0).is_ok());
        assert!(report(100.0).is_ok());
        assert!(report(100.5).is_err());
        assert!(report(-1.0).is_err());
    }
}
