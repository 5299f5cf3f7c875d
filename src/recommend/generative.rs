//! Recommender that delegates the choice to a generative language model.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::GenerativeConfig;
use crate::recommend::{round2, Ranking, RecommendError, Recommendation, Recommender};
use crate::semantic::CatalogCache;

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("matcher request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("matcher returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("matcher returned no text")]
    EmptyResponse,

    #[error("could not parse matcher answer: {0}")]
    Parse(String),
}

/// What the matcher is shown of each candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSummary {
    pub id: u64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Match {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: u64,
    /// 0-100
    #[serde(default)]
    pub relevance: f32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MatchOutcome {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub matches: Vec<Match>,
    /// Why nothing matched
    #[serde(default)]
    pub reason: Option<String>,
}

fn id_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(id) => Ok(id),
        Id::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub trait GenerativeMatcher: Send + Sync {
    fn name(&self) -> &str;

    fn match_candidates(
        &self,
        query: &str,
        candidates: &[CandidateSummary],
    ) -> Result<MatchOutcome, MatcherError>;
}

/// Build the matcher prompt. Descriptions are cut to `description_chars`.
pub fn build_prompt(query: &str, candidates: &[CandidateSummary], description_chars: usize) -> String {
    let list = candidates
        .iter()
        .map(|c| {
            let description: String = c.description.chars().take(description_chars).collect();
            format!("[{}] {}: {}", c.id, c.name, description)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You recommend MCP (Model Context Protocol) connectors.
Find the connectors that best fit the user's request.

## User request
"{query}"

## Available connectors
{list}

## Instructions
1. Work out what the user is trying to do.
2. Choose at most 5 connectors that fit the request.
3. If none fit, say so honestly.
4. Answer with JSON only, in the format below. Write reasons in the language of the request.

## Answer format
When there are matches:
{{"found": true, "matches": [{{"id": 123, "name": "connector name", "reason": "why it fits", "relevance": 85}}]}}

When nothing fits:
{{"found": false, "reason": "no connector in the list offers this"}}

JSON answer:"#
    )
}

/// Parse the model's answer, tolerating markdown code fences.
pub fn parse_answer(text: &str) -> Result<MatchOutcome, MatcherError> {
    let json = text.replace("```json", "").replace("```", "");
    let json = json.trim();
    if json.is_empty() {
        return Err(MatcherError::EmptyResponse);
    }
    serde_json::from_str(json).map_err(|e| MatcherError::Parse(e.to_string()))
}

/// Matcher backed by the Gemini `generateContent` API.
pub struct GeminiMatcher {
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    description_chars: usize,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

impl GeminiMatcher {
    pub fn new(config: &GenerativeConfig) -> Result<Self, MatcherError> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => return Err(MatcherError::MissingApiKey(config.api_key_env.clone())),
        };

        Ok(Self {
            base_url: config.base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            description_chars: config.description_chars,
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn generate(&self, prompt: &str) -> Result<String, MatcherError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        log::debug!("POST {url}");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let resp = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(MatcherError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(resp.json::<GenerateResponse>()?.text())
    }
}

impl GenerativeMatcher for GeminiMatcher {
    fn name(&self) -> &str {
        &self.model
    }

    fn match_candidates(
        &self,
        query: &str,
        candidates: &[CandidateSummary],
    ) -> Result<MatchOutcome, MatcherError> {
        let prompt = build_prompt(query, candidates, self.description_chars);
        parse_answer(&self.generate(&prompt)?)
    }
}

pub struct GenerativeRecommender {
    cache: Arc<CatalogCache>,
    matcher: Arc<dyn GenerativeMatcher>,
    top_k: usize,
}

impl GenerativeRecommender {
    pub fn new(cache: Arc<CatalogCache>, matcher: Arc<dyn GenerativeMatcher>, top_k: usize) -> Self {
        Self {
            cache,
            matcher,
            top_k,
        }
    }
}

impl Recommender for GenerativeRecommender {
    fn name(&self) -> &'static str {
        "generative"
    }

    fn recommend(&self, query: &str) -> Result<Ranking, RecommendError> {
        let snapshot = self
            .cache
            .get()
            .filter(|s| !s.is_empty())
            .ok_or(RecommendError::NotInitialized)?;

        let summaries: Vec<CandidateSummary> = snapshot
            .mcps
            .iter()
            .map(|m| CandidateSummary {
                id: m.item.id,
                name: m.item.name.clone(),
                description: m.item.description.clone(),
            })
            .collect();

        log::debug!(
            "matcher={} candidates={}",
            self.matcher.name(),
            summaries.len()
        );
        let outcome = self.matcher.match_candidates(query, &summaries)?;
        if !outcome.found {
            return Ok(Ranking {
                recommendations: vec![],
                no_match_reason: outcome.reason,
            });
        }

        let by_id: HashMap<u64, _> = snapshot.mcps.iter().map(|m| (m.item.id, m)).collect();
        let catalog = self.cache.catalog();
        let mut seen = HashSet::new();

        let recommendations: Vec<Recommendation> = outcome
            .matches
            .into_iter()
            .filter_map(|m| {
                let Some(mcp) = by_id.get(&m.id) else {
                    log::warn!("matcher returned unknown id={}", m.id);
                    return None;
                };
                if !seen.insert(m.id) {
                    return None;
                }
                Some(Recommendation {
                    item: mcp.item.clone(),
                    similarity: round2((m.relevance / 100.0).clamp(0.0, 1.0)),
                    url: catalog.page_url(m.id),
                    reason: Some(m.reason).filter(|r| !r.is_empty()),
                })
            })
            .take(self.top_k)
            .collect();

        let no_match_reason = if recommendations.is_empty() {
            outcome.reason
        } else {
            None
        };

        Ok(Ranking {
            recommendations,
            no_match_reason,
        })
    }
}
