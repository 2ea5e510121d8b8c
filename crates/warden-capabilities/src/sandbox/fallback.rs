//! Sandbox fallback.
//!
//! There is no detonation environment in process, so submissions are
//! acknowledged with a deterministic id and reports stay `unknown`.
//! Behaviour analysis works from the API calls the caller already has.

use std::collections::HashSet;

use warden_core::FallbackError;

use super::types::*;
use crate::seed::RequestSeed;

/// API call (without `A`/`W` suffix) to ATT&CK technique and weight.
const TECHNIQUE_TABLE: &[TechniqueRow] = &[
    ("CreateRemoteThread", "T1055", "Process Injection", 30.0),
    ("WriteProcessMemory", "T1055", "Process Injection", 30.0),
    ("VirtualAllocEx", "T1055", "Process Injection", 30.0),
    ("NtUnmapViewOfSection", "T1055.012", "Process Hollowing", 35.0),
    ("MiniDumpWriteDump", "T1003.001", "LSASS Memory", 40.0),
    ("CryptEncrypt", "T1486", "Data Encrypted for Impact", 25.0),
    ("SetWindowsHookEx", "T1056.001", "Keylogging", 25.0),
    ("GetAsyncKeyState", "T1056.001", "Keylogging", 25.0),
    ("RegSetValueEx", "T1547.001", "Registry Run Keys / Startup Folder", 20.0),
    ("CreateService", "T1543.003", "Windows Service", 20.0),
    ("AdjustTokenPrivileges", "T1134", "Access Token Manipulation", 15.0),
    ("URLDownloadToFile", "T1105", "Ingress Tool Transfer", 20.0),
    ("InternetOpenUrl", "T1071.001", "Web Protocols", 10.0),
    ("IsDebuggerPresent", "T1622", "Debugger Evasion", 10.0),
    ("CheckRemoteDebuggerPresent", "T1622", "Debugger Evasion", 10.0),
    ("ShellExecute", "T1106", "Native API", 5.0),
    ("WinExec", "T1106", "Native API", 5.0),
    ("CreateProcess", "T1106", "Native API", 5.0),
];

const MALICIOUS_SCORE: f64 = 70.0;
const SUSPICIOUS_SCORE: f64 = 30.0;

/// Base turnaround quoted for a submission, plus a per-megabyte surcharge.
const BASE_ESTIMATE_SECONDS: u64 = 60;
const SECONDS_PER_MEGABYTE: u64 = 5;
const MAX_ESTIMATE_SECONDS: u64 = 600;

type TechniqueRow = (&'static str, &'static str, &'static str, f64);

/// Find the table row for an API call, retrying without an `A`/`W`
/// (ANSI/wide) suffix. Matching ignores case.
fn lookup(call: &str) -> Option<&'static TechniqueRow> {
    let call = call.trim();
    let find = |name: &str| {
        TECHNIQUE_TABLE
            .iter()
            .find(|(known, _, _, _)| known.eq_ignore_ascii_case(name))
    };
    find(call).or_else(|| {
        call.strip_suffix(['A', 'W', 'a', 'w'])
            .filter(|stem| !stem.is_empty())
            .and_then(find)
    })
}

pub fn submit_sample(req: &SubmitSampleRequest) -> Result<SubmitSampleResponse, FallbackError> {
    let megabytes = req.size_bytes / (1024 * 1024);
    Ok(SubmitSampleResponse {
        submission_id: RequestSeed::of("submitSample", req).fallback_id(),
        status: SubmissionStatus::Queued,
        estimated_seconds: (BASE_ESTIMATE_SECONDS + megabytes * SECONDS_PER_MEGABYTE)
            .min(MAX_ESTIMATE_SECONDS),
    })
}

pub fn get_report(req: &GetReportRequest) -> Result<GetReportResponse, FallbackError> {
    Ok(GetReportResponse {
        submission_id: req.submission_id.clone(),
        verdict: Verdict::Unknown,
        score: 0.0,
        behaviors: Vec::new(),
    })
}

pub fn analyze_behavior(
    req: &AnalyzeBehaviorRequest,
) -> Result<AnalyzeBehaviorResponse, FallbackError> {
    let mut seen = HashSet::new();
    let mut techniques = Vec::new();
    let mut score = 0.0_f64;

    for call in &req.api_calls {
        let Some((api, id, name, weight)) = lookup(call) else {
            continue;
        };
        // Each technique counts once however many calls evidence it
        if seen.insert(*id) {
            score += *weight;
            techniques.push(TechniqueHit {
                id: id.to_string(),
                name: name.to_string(),
                api_call: api.to_string(),
            });
        }
    }

    let score = score.min(MAX_SCORE);
    let verdict = if techniques.is_empty() {
        Verdict::Unknown
    } else if score >= MALICIOUS_SCORE {
        Verdict::Malicious
    } else if score >= SUSPICIOUS_SCORE {
        Verdict::Suspicious
    } else {
        Verdict::Clean
    };

    Ok(AnalyzeBehaviorResponse {
        verdict,
        score,
        techniques,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(calls: &[&str]) -> AnalyzeBehaviorResponse {
        analyze_behavior(&AnalyzeBehaviorRequest {
            api_calls: calls.iter().map(|c| c.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_submission_id_is_deterministic() {
        let req = SubmitSampleRequest {
            file_name: "invoice.exe".into(),
            sha256: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".into(),
            size_bytes: 3 * 1024 * 1024,
        };
        let a = submit_sample(&req).unwrap();
        let b = submit_sample(&req).unwrap();
        assert_eq!(a.submission_id, b.submission_id);
        assert!(a.submission_id.starts_with("fb-"));
        assert_eq!(a.status, SubmissionStatus::Queued);
        assert_eq!(a.estimated_seconds, 75);
    }

    #[test]
    fn test_report_is_never_fabricated() {
        let out = get_report(&GetReportRequest {
            submission_id: "fb-0011223344556677".into(),
        })
        .unwrap();
        assert_eq!(out.verdict, Verdict::Unknown);
        assert_eq!(out.score, 0.0);
        assert!(out.behaviors.is_empty());
    }

    #[test]
    fn test_injection_chain_is_malicious() {
        let out = analyze(&[
            "OpenProcess",
            "VirtualAllocEx",
            "WriteProcessMemory",
            "CreateRemoteThread",
            "MiniDumpWriteDump",
        ]);
        // Injection counts once, plus credential dumping
        assert_eq!(out.score, 70.0);
        assert_eq!(out.verdict, Verdict::Malicious);
        let ids: Vec<_> = out.techniques.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T1055", "T1003.001"]);
    }

    #[test]
    fn test_suffixes_and_case() {
        let out = analyze(&["RegSetValueExW", "urldownloadtofilea"]);
        assert_eq!(out.score, 40.0);
        assert_eq!(out.verdict, Verdict::Suspicious);
        assert_eq!(out.techniques[0].api_call, "RegSetValueEx");
    }

    #[test]
    fn test_benign_and_empty() {
        assert_eq!(analyze(&["CreateProcessW"]).verdict, Verdict::Clean);
        assert_eq!(analyze(&["ReadFile", "CloseHandle"]).verdict, Verdict::Unknown);
        assert_eq!(analyze(&[]).score, 0.0);
    }

    #[test]
    fn test_score_is_capped() {
        let calls: Vec<&str> = TECHNIQUE_TABLE.iter().map(|(api, _, _, _)| *api).collect();
        assert_eq!(analyze(&calls).score, MAX_SCORE);
    }
}
