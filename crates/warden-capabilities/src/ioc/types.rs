//! IOC request and response shapes.

use serde::{Deserialize, Serialize};
use warden_core::operation::{check_not_blank, check_unit_interval};
use warden_core::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorType {
    Ipv4,
    Ipv6,
    Domain,
    Url,
    Email,
    Md5,
    Sha1,
    Sha256,
    Unknown,
}

impl IndicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::Ipv4 => "ipv4",
            IndicatorType::Ipv6 => "ipv6",
            IndicatorType::Domain => "domain",
            IndicatorType::Url => "url",
            IndicatorType::Email => "email",
            IndicatorType::Md5 => "md5",
            IndicatorType::Sha1 => "sha1",
            IndicatorType::Sha256 => "sha256",
            IndicatorType::Unknown => "unknown",
        }
    }

    pub fn is_hash(&self) -> bool {
        matches!(self, IndicatorType::Md5 | IndicatorType::Sha1 | IndicatorType::Sha256)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reputation {
    Benign,
    Unknown,
    Suspicious,
    Malicious,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIndicatorRequest {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_type: Option<IndicatorType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIndicatorResponse {
    pub indicator: String,
    pub indicator_type: IndicatorType,
    pub normalized: String,
    pub threat_score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichIndicatorRequest {
    pub indicator: String,
    pub indicator_type: IndicatorType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichIndicatorResponse {
    pub indicator: String,
    pub reputation: Reputation,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractIndicatorsRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIndicator {
    pub value: String,
    pub indicator_type: IndicatorType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractIndicatorsResponse {
    pub indicators: Vec<ExtractedIndicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum IocRequest {
    #[serde(rename = "processIndicator")]
    ProcessIndicator(ProcessIndicatorRequest),
    #[serde(rename = "enrichIndicator")]
    EnrichIndicator(EnrichIndicatorRequest),
    #[serde(rename = "extractIndicators")]
    ExtractIndicators(ExtractIndicatorsRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload")]
pub enum IocResponse {
    #[serde(rename = "processIndicator")]
    ProcessIndicator(ProcessIndicatorResponse),
    #[serde(rename = "enrichIndicator")]
    EnrichIndicator(EnrichIndicatorResponse),
    #[serde(rename = "extractIndicators")]
    ExtractIndicators(ExtractIndicatorsResponse),
}

impl Validate for IocRequest {
    fn validate(&self) -> Result<(), String> {
        match self {
            IocRequest::ProcessIndicator(r) => check_not_blank("value", &r.value),
            IocRequest::EnrichIndicator(r) => check_not_blank("indicator", &r.indicator),
            IocRequest::ExtractIndicators(_) => Ok(()),
        }
    }
}

impl Validate for IocResponse {
    fn validate(&self) -> Result<(), String> {
        match self {
            IocResponse::ProcessIndicator(r) => check_unit_interval("threatScore", r.threat_score),
            IocResponse::EnrichIndicator(r) => check_unit_interval("confidence", r.confidence),
            IocResponse::ExtractIndicators(r) => r
                .indicators
                .iter()
                .try_for_each(|i| check_not_blank("indicators.value", &i.value)),
        }
    }
}
