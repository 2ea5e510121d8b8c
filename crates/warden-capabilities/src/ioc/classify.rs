//! Indicator refanging, classification and extraction.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ExtractedIndicator, IndicatorType};

static DEFANG_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\.\]|\(\.\)|\{\.\}|\[dot\]").expect("valid regex"));
static DEFANG_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[@\]|\[at\]").expect("valid regex"));
static DEFANG_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhxxp(s?)").expect("valid regex"));

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s"'<>()\[\]]+"#).expect("valid regex")
});
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@(?:[a-z0-9-]+\.)+[a-z]{2,63}\b").expect("valid regex")
});
static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid regex"));
static SHA256: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-f0-9]{64}\b").expect("valid regex"));
static SHA1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b[a-f0-9]{40}\b").expect("valid regex"));
static MD5: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b[a-f0-9]{32}\b").expect("valid regex"));
static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\b")
        .expect("valid regex")
});

/// File extensions that look like top-level domains in free text.
const FILE_EXTENSIONS: &[&str] = &[
    "exe", "dll", "pdf", "doc", "docx", "xls", "xlsx", "txt", "png", "jpg", "gif", "bat", "vbs",
    "lnk", "tmp", "log", "dat", "bin",
];

/// Top-level domains frequently abused for throwaway infrastructure.
pub const SUSPICIOUS_TLDS: &[&str] = &["xyz", "top", "tk", "zip", "click", "gq", "ml", "cf"];

/// Undo common defanging (`hxxp`, `[.]`, `[@]`). Returns the text and
/// whether anything changed.
pub fn refang(input: &str) -> (String, bool) {
    let dotted = DEFANG_DOT.replace_all(input, ".");
    let at = DEFANG_AT.replace_all(&dotted, "@");
    let scheme = DEFANG_SCHEME.replace_all(&at, "http$1");
    let out = scheme.into_owned();
    let changed = out != input;
    (out, changed)
}

/// Canonical form of an indicator: refanged, trimmed, lowercased except
/// for URL paths.
pub fn normalize(value: &str) -> String {
    let (refanged, _) = refang(value.trim());
    match refanged.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.find('/') {
                Some(idx) => rest.split_at(idx),
                None => (rest, ""),
            };
            format!("{}://{}{}", scheme.to_lowercase(), host.to_lowercase(), path)
        }
        None => refanged.to_lowercase(),
    }
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Classify an already normalized indicator.
pub fn classify(normalized: &str) -> IndicatorType {
    if URL.find(normalized).is_some_and(|m| m.start() == 0 && m.end() == normalized.len()) {
        return IndicatorType::Url;
    }
    if normalized.parse::<Ipv4Addr>().is_ok() {
        return IndicatorType::Ipv4;
    }
    if normalized.parse::<Ipv6Addr>().is_ok() {
        return IndicatorType::Ipv6;
    }
    if is_hex_of_len(normalized, 64) {
        return IndicatorType::Sha256;
    }
    if is_hex_of_len(normalized, 40) {
        return IndicatorType::Sha1;
    }
    if is_hex_of_len(normalized, 32) {
        return IndicatorType::Md5;
    }
    let whole = |re: &Regex| {
        re.find(normalized)
            .is_some_and(|m| m.start() == 0 && m.end() == normalized.len())
    };
    if whole(&EMAIL) {
        return IndicatorType::Email;
    }
    if whole(&DOMAIN) {
        return IndicatorType::Domain;
    }
    IndicatorType::Unknown
}

/// Loopback, private, link-local and unspecified addresses.
pub fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Host part of a URL, without port or credentials.
pub fn url_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    if let Some(bracketed) = host.strip_prefix('[') {
        return bracketed.split(']').next();
    }
    host.split(':').next().filter(|h| !h.is_empty())
}

/// Top-level domain of a host name.
pub fn tld(host: &str) -> Option<&str> {
    host.rsplit('.').next().filter(|t| !t.is_empty() && *t != host)
}

/// Pull every recognisable indicator out of free text, in order of first
/// appearance per type. URLs and e-mail addresses are removed before
/// looking for bare domains so their hosts are not reported twice.
pub fn extract(text: &str) -> Vec<ExtractedIndicator> {
    let (mut remaining, _) = refang(text);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let mut take = |re: &Regex,
                    kind: IndicatorType,
                    remaining: &mut String,
                    accept: &dyn Fn(&str) -> bool| {
        let mut spans = Vec::new();
        for m in re.find_iter(remaining) {
            let value = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            if !accept(value) {
                continue;
            }
            spans.push(m.range());
            let normalized = normalize(value);
            if seen.insert((kind, normalized.clone())) {
                out.push(ExtractedIndicator {
                    value: normalized,
                    indicator_type: kind,
                });
            }
        }
        for range in spans.into_iter().rev() {
            remaining.replace_range(range, " ");
        }
    };

    take(&URL, IndicatorType::Url, &mut remaining, &|_| true);
    take(&EMAIL, IndicatorType::Email, &mut remaining, &|_| true);
    take(&SHA256, IndicatorType::Sha256, &mut remaining, &|_| true);
    take(&SHA1, IndicatorType::Sha1, &mut remaining, &|_| true);
    take(&MD5, IndicatorType::Md5, &mut remaining, &|_| true);
    take(&IPV4, IndicatorType::Ipv4, &mut remaining, &|v| {
        v.parse::<Ipv4Addr>().is_ok()
    });
    take(&DOMAIN, IndicatorType::Domain, &mut remaining, &|v| {
        tld(v).is_some_and(|t| !FILE_EXTENSIONS.contains(&t.to_lowercase().as_str()))
    });

    out
}
