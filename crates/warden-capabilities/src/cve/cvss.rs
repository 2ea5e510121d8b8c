//! CVSS v3.x base score calculation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Qualitative severity rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score <= 0.0 {
            Severity::None
        } else if score < 4.0 {
            Severity::Low
        } else if score < 7.0 {
            Severity::Medium
        } else if score < 9.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Unchanged,
    Changed,
}

/// Parsed base metrics, stored as their numeric weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseMetrics {
    attack_vector: f64,
    attack_complexity: f64,
    privileges_required: f64,
    user_interaction: f64,
    scope: Scope,
    confidentiality: f64,
    integrity: f64,
    availability: f64,
}

/// Score breakdown for one vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseScore {
    pub base: f64,
    pub impact: f64,
    pub exploitability: f64,
    pub severity: Severity,
}

const METRICS: [&str; 8] = ["AV", "AC", "PR", "UI", "S", "C", "I", "A"];

/// Parse a vector such as `CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H`.
///
/// The `CVSS:3.x` prefix is optional. Every base metric must appear
/// exactly once.
pub fn parse_vector(vector: &str) -> Result<BaseMetrics, String> {
    let mut parts = vector.trim().split('/').peekable();
    if let Some(prefix) = parts.peek() {
        if let Some(version) = prefix.strip_prefix("CVSS:") {
            if version != "3.0" && version != "3.1" {
                return Err(format!("unsupported CVSS version {}", version));
            }
            parts.next();
        }
    }

    let mut values: HashMap<&str, &str> = HashMap::new();
    for part in parts {
        let (key, value) = part
            .split_once(':')
            .ok_or_else(|| format!("malformed metric '{}'", part))?;
        if !METRICS.contains(&key) {
            // Temporal and environmental metrics do not affect the base score
            continue;
        }
        if values.insert(key, value).is_some() {
            return Err(format!("metric {} given twice", key));
        }
    }

    let get = |key: &str| {
        values
            .get(key)
            .copied()
            .ok_or_else(|| format!("missing metric {}", key))
    };
    let invalid = |key: &str, value: &str| format!("invalid value {}:{}", key, value);

    let scope = match get("S")? {
        "U" => Scope::Unchanged,
        "C" => Scope::Changed,
        v => return Err(invalid("S", v)),
    };
    let attack_vector = match get("AV")? {
        "N" => 0.85,
        "A" => 0.62,
        "L" => 0.55,
        "P" => 0.2,
        v => return Err(invalid("AV", v)),
    };
    let attack_complexity = match get("AC")? {
        "L" => 0.77,
        "H" => 0.44,
        v => return Err(invalid("AC", v)),
    };
    let privileges_required = match (get("PR")?, scope) {
        ("N", _) => 0.85,
        ("L", Scope::Unchanged) => 0.62,
        ("L", Scope::Changed) => 0.68,
        ("H", Scope::Unchanged) => 0.27,
        ("H", Scope::Changed) => 0.5,
        (v, _) => return Err(invalid("PR", v)),
    };
    let user_interaction = match get("UI")? {
        "N" => 0.85,
        "R" => 0.62,
        v => return Err(invalid("UI", v)),
    };
    let cia = |key: &str| -> Result<f64, String> {
        match get(key)? {
            "H" => Ok(0.56),
            "L" => Ok(0.22),
            "N" => Ok(0.0),
            v => Err(invalid(key, v)),
        }
    };

    Ok(BaseMetrics {
        attack_vector,
        attack_complexity,
        privileges_required,
        user_interaction,
        scope,
        confidentiality: cia("C")?,
        integrity: cia("I")?,
        availability: cia("A")?,
    })
}

impl BaseMetrics {
    pub fn score(&self) -> BaseScore {
        let iss = 1.0
            - (1.0 - self.confidentiality) * (1.0 - self.integrity) * (1.0 - self.availability);
        let impact = match self.scope {
            Scope::Unchanged => 6.42 * iss,
            Scope::Changed => 7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15),
        };
        let exploitability = 8.22
            * self.attack_vector
            * self.attack_complexity
            * self.privileges_required
            * self.user_interaction;

        let base = if impact <= 0.0 {
            0.0
        } else {
            match self.scope {
                Scope::Unchanged => round_up((impact + exploitability).min(10.0)),
                Scope::Changed => round_up((1.08 * (impact + exploitability)).min(10.0)),
            }
        };

        BaseScore {
            base,
            impact: (impact.max(0.0) * 10.0).round() / 10.0,
            exploitability: (exploitability * 10.0).round() / 10.0,
            severity: Severity::from_score(base),
        }
    }
}

/// CVSS v3.1 `Roundup`: smallest one-decimal number not below `value`,
/// computed on integers to avoid floating point artefacts.
fn round_up(value: f64) -> f64 {
    let int_input = (value * 100_000.0).round() as i64;
    if int_input % 10_000 == 0 {
        int_input as f64 / 100_000.0
    } else {
        ((int_input / 10_000) + 1) as f64 / 10.0
    }
}

/// Score a vector string.
pub fn score_vector(vector: &str) -> Result<BaseScore, String> {
    parse_vector(vector).map(|m| m.score())
}
