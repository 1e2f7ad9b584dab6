//! Normalization primitives shared across the pipeline
//!
//! Domains are compared only in normalized form (lowercase, scheme and
//! `www.` stripped). Company names are compared after Unicode folding and
//! legal-suffix stripping so "Acme Holdings LLC" and "acme holdings"
//! score as the same entity.

use unicode_normalization::UnicodeNormalization;

/// Legal-entity suffixes stripped from the tail of company names before
/// similarity scoring
const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "corp", "corporation", "llc", "llp", "lp", "ltd", "limited", "plc",
    "co", "company", "gmbh", "ag", "kg", "sa", "sarl", "srl", "spa", "bv", "nv", "oy", "ab",
    "as", "aps", "pty", "pte", "kk", "kft", "sro", "doo",
];

/// Normalize a domain string for grouping and comparison
///
/// Lowercases, strips the URL scheme, any leading `www.` labels, and any
/// path/query/fragment/port suffix. Idempotent:
/// `normalize_domain(normalize_domain(x)) == normalize_domain(x)`.
pub fn normalize_domain(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut s = lower.as_str();

    if let Some(idx) = s.find("://") {
        s = &s[idx + 3..];
    }
    if let Some(idx) = s.find(['/', '?', '#']) {
        s = &s[..idx];
    }
    if let Some(idx) = s.rfind(':') {
        s = &s[..idx];
    }

    s = s.trim_matches('.');
    while let Some(rest) = s.strip_prefix("www.") {
        s = rest.trim_start_matches('.');
    }
    s.trim_matches('.').to_string()
}

/// Normalize a company name for similarity scoring
///
/// NFKC fold, lowercase, apostrophes dropped ("Joe's" and "joes" are the
/// same name), remaining non-alphanumerics collapsed to single spaces,
/// then trailing legal-entity suffixes removed (unless the whole name is
/// one).
pub fn normalize_company_name(raw: &str) -> String {
    let folded = raw.nfkc().collect::<String>().to_lowercase();
    let spaced: String = folded
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();
    while tokens.len() > 1 {
        match tokens.last() {
            Some(last) if LEGAL_SUFFIXES.contains(last) => {
                tokens.pop();
            }
            _ => break,
        }
    }
    tokens.join(" ")
}

/// Lowercased alphanumeric tokens of a company name, suffixes stripped
pub fn name_tokens(raw: &str) -> Vec<String> {
    normalize_company_name(raw)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Similarity of two company names on a 0-100 scale
///
/// Jaro-Winkler over the normalized forms; 0 when either side normalizes
/// to nothing.
pub fn name_similarity(a: &str, b: &str) -> u8 {
    let na = normalize_company_name(a);
    let nb = normalize_company_name(b);
    if na.is_empty() || nb.is_empty() {
        return 0;
    }
    (strsim::jaro_winkler(&na, &nb) * 100.0).round() as u8
}

/// Reduce a phone number to its digits
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Whether two phone numbers denote the same line
///
/// Compares digit forms, tolerating a leading US country code. Numbers
/// shorter than 7 digits never match.
pub fn phones_match(a: &str, b: &str) -> bool {
    fn canonical(raw: &str) -> String {
        let digits = normalize_phone(raw);
        if digits.len() == 11 && digits.starts_with('1') {
            digits[1..].to_string()
        } else {
            digits
        }
    }

    let ca = canonical(a);
    let cb = canonical(b);
    ca.len() >= 7 && ca == cb
}
