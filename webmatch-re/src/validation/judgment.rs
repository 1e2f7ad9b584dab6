//! Probabilistic judgment collaborator
//!
//! Sends the record, candidate domain and extracted page evidence to an LLM
//! and receives a confidence estimate with a rationale. The collaborator is
//! non-deterministic and rate-limited, so the engine must keep functioning
//! when it is unavailable. The same client also turns free-text context
//! into web search queries for the query-generation source.

use crate::types::{CompanyRecord, ValidationSignal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const MAX_QUERIES: usize = 3;

/// Confidence estimate returned by the judgment collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentEstimate {
    /// Probability (0-100) that the domain is the company's own site
    pub confidence: u8,
    /// Free-text explanation of the decisive evidence
    pub rationale: String,
}

#[derive(Debug, Error)]
pub enum JudgmentError {
    /// Transport failure, auth rejection or quota exhaustion
    #[error("judgment unavailable: {0}")]
    Unavailable(String),

    /// Collaborator answered with something unusable
    #[error("judgment response unusable: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for JudgmentError {
    fn from(err: reqwest::Error) -> Self {
        JudgmentError::Unavailable(err.to_string())
    }
}

/// Probabilistic scorer contract consumed by the consensus engine
#[async_trait::async_trait]
pub trait JudgmentScorer: Send + Sync {
    /// Estimate whether `domain` belongs to the company in `record`
    ///
    /// # Errors
    /// `JudgmentError` when the collaborator cannot answer; the engine
    /// degrades to automated-only confidence in that case.
    async fn assess(
        &self,
        record: &CompanyRecord,
        domain: &str,
        signal: &ValidationSignal,
    ) -> Result<JudgmentEstimate, JudgmentError>;
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

// ============================================================================
// Client
// ============================================================================

/// LLM-backed judgment client
#[derive(Debug, Clone)]
pub struct JudgmentClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl JudgmentClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, JudgmentError> {
        if api_key.trim().is_empty() {
            return Err(JudgmentError::Unavailable("empty API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JudgmentError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Turn a record's free-text context into web search queries
    ///
    /// Used by the free-text query-generation source; at most three
    /// queries come back.
    pub async fn generate_queries(
        &self,
        record: &CompanyRecord,
    ) -> Result<Vec<String>, JudgmentError> {
        let raw = self.send_prompt(build_query_prompt(record)).await?;
        parse_queries(&raw)
    }

    async fn send_prompt(&self, prompt: String) -> Result<String, JudgmentError> {
        let request_body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            // Deterministic decoding and forced-JSON output
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        debug!("judgment request to {}", url.replace(&self.api_key, "***"));

        let response = self.client.post(&url).json(&request_body).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("judgment API error: {} - {}", status, response_text);
            return Err(JudgmentError::Unavailable(format!("HTTP {}", status)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| JudgmentError::Parse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| JudgmentError::Parse("no candidates in response".to_string()))
    }
}

#[async_trait::async_trait]
impl JudgmentScorer for JudgmentClient {
    async fn assess(
        &self,
        record: &CompanyRecord,
        domain: &str,
        signal: &ValidationSignal,
    ) -> Result<JudgmentEstimate, JudgmentError> {
        let raw = self
            .send_prompt(build_assessment_prompt(record, domain, signal))
            .await?;
        parse_assessment(&raw)
    }
}

// ============================================================================
// Prompts
// ============================================================================

const ASSESSMENT_PROMPT: &str = r#"You judge whether a website belongs to a specific company.

You are given a company record and evidence extracted from the candidate website's homepage. Weigh name agreement, locality, phone and email evidence, and industry fit. Penalize directories, marketplaces and unrelated businesses.

RESPONSE FORMAT - respond ONLY with valid JSON:
{
  "confidence": <integer 0-100, probability this is the company's own website>,
  "rationale": "one or two sentences naming the decisive evidence"
}"#;

const QUERY_PROMPT: &str = r#"You write web search queries that find a company's own website.

Given a company record, produce up to three short queries a person would type to find the company's official site. Prefer distinctive tokens from the name and context; avoid generic words alone.

RESPONSE FORMAT - respond ONLY with valid JSON:
{"queries": ["...", "..."]}"#;

fn build_assessment_prompt(
    record: &CompanyRecord,
    domain: &str,
    signal: &ValidationSignal,
) -> String {
    let mut prompt = format!("{}\n\nCOMPANY RECORD:\n- name: {}\n", ASSESSMENT_PROMPT, record.name);
    if let Some(city) = &record.city {
        prompt.push_str(&format!("- city: {}\n", city));
    }
    if let Some(phone) = &record.phone {
        prompt.push_str(&format!("- phone: {}\n", phone));
    }
    if let Some(context) = &record.context {
        prompt.push_str(&format!("- context: {}\n", context));
    }

    prompt.push_str(&format!("\nCANDIDATE DOMAIN: {}\n", domain));
    prompt.push_str(&format!(
        "\nPAGE EVIDENCE:\n- reachable: {}\n- names found: {}\n- phones found: {}\n- emails found: {}\n- name similarity (0-100): {}\n- phone match: {}\n",
        signal.reachable,
        join_or_none(&signal.name_candidates),
        join_or_none(&signal.phones),
        join_or_none(&signal.emails),
        signal.name_similarity,
        signal.phone_match,
    ));

    prompt.push_str("\nRespond with valid JSON only. No markdown, no text outside the JSON.");
    prompt
}

fn build_query_prompt(record: &CompanyRecord) -> String {
    let mut prompt = format!("{}\n\nCOMPANY RECORD:\n- name: {}\n", QUERY_PROMPT, record.name);
    if let Some(city) = &record.city {
        prompt.push_str(&format!("- city: {}\n", city));
    }
    if let Some(context) = &record.context {
        prompt.push_str(&format!("- context: {}\n", context));
    }
    prompt.push_str("\nRespond with valid JSON only. No markdown, no text outside the JSON.");
    prompt
}

fn join_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join("; ")
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAssessment {
    confidence: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawQueries {
    #[serde(default)]
    queries: Vec<String>,
}

/// Slice out the JSON object even when the model wraps it in fences or prose
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then(|| &raw[start..=end])
}

fn parse_assessment(raw: &str) -> Result<JudgmentEstimate, JudgmentError> {
    let json = extract_json(raw)
        .ok_or_else(|| JudgmentError::Parse(format!("no JSON object in: {}", raw.trim())))?;
    let parsed: RawAssessment =
        serde_json::from_str(json).map_err(|e| JudgmentError::Parse(e.to_string()))?;

    // Accepts the instructed 0-100 integer and a bare 0-1 probability
    let value = parsed.confidence;
    let scaled = if value > 0.0 && value <= 1.0 && value.fract() != 0.0 {
        value * 100.0
    } else {
        value
    };

    Ok(JudgmentEstimate {
        confidence: scaled.round().clamp(0.0, 100.0) as u8,
        rationale: parsed.rationale,
    })
}

fn parse_queries(raw: &str) -> Result<Vec<String>, JudgmentError> {
    let json = extract_json(raw)
        .ok_or_else(|| JudgmentError::Parse(format!("no JSON object in: {}", raw.trim())))?;
    let parsed: RawQueries =
        serde_json::from_str(json).map_err(|e| JudgmentError::Parse(e.to_string()))?;

    let queries: Vec<String> = parsed
        .queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_QUERIES)
        .collect();

    if queries.is_empty() {
        return Err(JudgmentError::Parse("no usable queries".to_string()));
    }
    Ok(queries)
}

// ============================================================================
// Tests
// ============================================================================
