//! Homepage fetch and content extraction
//!
//! Tries HTTPS first and falls back to plain HTTP. Extraction is regex
//! scanning over the raw body: page titles and `og:site_name` for company
//! names, `tel:`/`mailto:` links plus textual patterns for contact
//! information. No HTML rendering.

use crate::normalize::normalize_phone;
use crate::validation::{ContentFetcher, PageContent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;
use webmatch_common::{Error, Result};

const USER_AGENT: &str = "webmatch/0.1 (company-site verification)";

/// Bodies are clamped before extraction; anything useful sits near the top
const MAX_BODY_BYTES: usize = 512 * 1024;

const MAX_NAME_CANDIDATES: usize = 8;
const MAX_PHONES: usize = 16;
const MAX_EMAILS: usize = 16;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));

static SITE_NAME_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property\s*=\s*["']og:site_name["'][^>]*>"#).expect("static regex")
});

static CONTENT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)content\s*=\s*["']([^"']*)["']"#).expect("static regex"));

static TEL_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']tel:([^"']+)["']"#).expect("static regex"));

static PHONE_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[\s.\-]?)?\(?\d{3}\)?[\s.\-]\d{3}[\s.\-]\d{4}").expect("static regex")
});

static MAILTO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']mailto:([^"'?]+)"#).expect("static regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9][A-Za-z0-9._%+\-]*@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
        .expect("static regex")
});

/// Live homepage prober
pub struct PageProbe {
    client: reqwest::Client,
}

impl PageProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client })
    }

    async fn fetch_page(&self, url: &str, timeout: Duration) -> Option<String> {
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("fetch {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("fetch {} returned {}", url, response.status());
            return None;
        }

        match response.text().await {
            Ok(body) => Some(clamp_body(body)),
            Err(e) => {
                debug!("read body of {} failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ContentFetcher for PageProbe {
    async fn fetch(&self, domain: &str, timeout: Duration) -> PageContent {
        for scheme in ["https", "http"] {
            let url = format!("{}://{}/", scheme, domain);
            if let Some(body) = self.fetch_page(&url, timeout).await {
                return extract_content(&body);
            }
        }

        debug!("{} unreachable over https and http", domain);
        PageContent::default()
    }
}

fn clamp_body(mut body: String) -> String {
    if body.len() > MAX_BODY_BYTES {
        let mut end = MAX_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

/// Pull name candidates and contact information out of a raw HTML body
pub(crate) fn extract_content(body: &str) -> PageContent {
    PageContent {
        reachable: true,
        name_candidates: extract_name_candidates(body),
        phones: extract_phones(body),
        emails: extract_emails(body),
    }
}

fn extract_name_candidates(body: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(title) = TITLE_RE.captures(body).and_then(|c| c.get(1)) {
        let title = decode_entities(title.as_str());
        for part in split_title(&title) {
            push_unique(&mut candidates, part);
        }
    }

    if let Some(tag) = SITE_NAME_TAG_RE.find(body) {
        if let Some(content) = CONTENT_ATTR_RE.captures(tag.as_str()).and_then(|c| c.get(1)) {
            push_unique(&mut candidates, decode_entities(content.as_str()));
        }
    }

    candidates.truncate(MAX_NAME_CANDIDATES);
    candidates
}

/// Titles routinely carry taglines and locality after a separator; every
/// segment is a candidate
fn split_title(title: &str) -> Vec<String> {
    title
        .split(['|', '–', '—'])
        .flat_map(|part| part.split(" - "))
        .map(str::trim)
        .filter(|part| !part.is_empty() && part.len() <= 120)
        .map(str::to_string)
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    let seen = list.iter().any(|have| have.eq_ignore_ascii_case(&value));
    if !value.is_empty() && !seen {
        list.push(value);
    }
}

fn extract_phones(body: &str) -> Vec<String> {
    let mut phones = Vec::new();

    for capture in TEL_HREF_RE.captures_iter(body) {
        if let Some(raw) = capture.get(1) {
            add_phone(&mut phones, raw.as_str());
        }
    }
    for found in PHONE_TEXT_RE.find_iter(body) {
        add_phone(&mut phones, found.as_str());
    }

    phones.truncate(MAX_PHONES);
    phones
}

fn add_phone(list: &mut Vec<String>, raw: &str) {
    let digits = normalize_phone(raw);
    if (7..=15).contains(&digits.len()) && !list.contains(&digits) {
        list.push(digits);
    }
}

fn extract_emails(body: &str) -> Vec<String> {
    let mut emails = Vec::new();

    for capture in MAILTO_RE.captures_iter(body) {
        if let Some(raw) = capture.get(1) {
            add_email(&mut emails, raw.as_str());
        }
    }
    for found in EMAIL_RE.find_iter(body) {
        add_email(&mut emails, found.as_str());
    }

    emails.truncate(MAX_EMAILS);
    emails
}

fn add_email(list: &mut Vec<String>, raw: &str) {
    let email = raw.trim().to_lowercase();
    // Asset references (logo@2x.png) match the textual pattern too
    let looks_like_asset = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"]
        .iter()
        .any(|ext| email.ends_with(ext));
    if !email.is_empty() && !looks_like_asset && !list.contains(&email) {
        list.push(email);
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
