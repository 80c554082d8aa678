//! LLM client for keyword-centric review analysis.
//!
//! Talks to the Gemini generateContent REST API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// System prompt steering the model toward the structured keyword analysis.
/// Kept in the storefront's language; the reviews it analyzes are too.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"[지시사항]
당신은 사용자가 입력한 키워드를 중심으로 제품 리뷰를 분석하고 요약하는 전문 분석가입니다.
사용자가 제공한 리뷰 데이터를 기반으로, 입력된 키워드 목록에 대해 다음 정보를 추출하여 반드시 아래 제시된 JSON 형식으로 출력합니다.

1. **제품명 (product_name)**: 리뷰 내용을 기반으로 제품명을 추론하여 기입합니다.
2. **종합 감정 요약 (overall_sentiment_summary)**: 전체 리뷰 내용을 기반으로 한 제품에 대한 종합적인 감정 분석 결과를 한 문장으로 요약합니다.
3. **키워드별 분석 (keywords_analysis)**: 입력된 각 키워드에 대해 다음 세부 정보를 제공합니다.
    a. **키워드 (keyword)**: 분석 대상 키워드 이름.
    b. **긍정 언급 개수 (positive_count)**: 해당 키워드와 관련된 긍정적인 리뷰 문장 또는 언급의 개수를 **정수(Number)**로 계산합니다.
    c. **부정 언급 개수 (negative_count)**: 해당 키워드와 관련된 부정적인 리뷰 문장 또는 언급의 개수를 **정수(Number)**로 계산합니다.
    d. **긍정 요약 (positive_summary)**: 긍정적인 평가 내용을 1~2문장으로 요약합니다.
    e. **부정 요약 (negative_summary)**: 부정적인 평가 내용을 1~2문장으로 요약합니다.

[제약사항]
* 키워드에 대한 직접적인 언급이 부족하거나 관련 내용이 없다면, 해당 요약 섹션에 '해당 키워드에 대한 구체적인 언급이 부족합니다.'라고 명시합니다.
* 반드시 입력받은 키워드 목록에 대해서만 분석을 수행하며, 모든 출력은 JSON 형식이어야 합니다.
* 긍정/부정 개수(count)는 반드시 정수(Number)로 제공해야 하며, 요약 내용 뒤에 추가 정보를 붙이지 않습니다.

[출력 형식]
{
  "product_name": "제품명",
  "overall_sentiment_summary": "한 문장 요약",
  "keywords_analysis": [
    {
      "keyword": "키워드",
      "positive_count": 0,
      "negative_count": 0,
      "positive_summary": "1~2문장 요약",
      "negative_summary": "1~2문장 요약"
    }
  ]
}
"#;

/// Configuration for the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether LLM analysis is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API endpoint base.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model to use for analysis.
    #[serde(default = "default_model")]
    pub model: String,
    /// Temperature for generation (0.0 - 1.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens in the response.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Custom analysis prompt (replaces the default system instruction).
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            analysis_prompt: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl LlmConfig {
    /// Get the analysis prompt, using custom or default.
    pub fn get_analysis_prompt(&self) -> &str {
        self.analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM analysis is disabled")]
    Disabled,

    #[error("API key not set (expected in environment variable {0})")]
    MissingApiKey(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Gemini generateContent request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: ContentBlock,
    contents: Vec<ContentBlock>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini generateContent response format (the parts we read).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// LLM client for review analysis.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Analyze concatenated review text against the given keywords.
    /// Returns the model's raw text response; callers deal with JSON
    /// normalization.
    pub async fn analyze(&self, keywords: &[String], review_text: &str) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let api_key = std::env::var(&self.config.api_key_env)
            .map_err(|_| LlmError::MissingApiKey(self.config.api_key_env.clone()))?;

        let prompt = format!(
            "keywords: {}\nreview data: {}",
            keywords.join(", "),
            review_text
        );
        debug!(
            "Requesting analysis: {} keywords, {} chars of review text",
            keywords.len(),
            review_text.len()
        );

        let request = GenerateRequest {
            system_instruction: ContentBlock {
                role: None,
                parts: vec![TextPart {
                    text: self.config.get_analysis_prompt().to_string(),
                }],
            },
            contents: vec![ContentBlock {
                role: Some("user".to_string()),
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, api_key
        );
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::Parse("empty model response".to_string()));
        }
        Ok(text)
    }
}

/// Strip a Markdown code fence wrapper, if present.
///
/// Models frequently wrap the requested JSON in ```json ... ``` despite the
/// instructions.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Language tag after the opening fence, e.g. ```json
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("일반 텍스트 응답"), "일반 텍스트 응답");
    }

    #[test]
    fn default_config_points_at_gemini() {
        let config = LlmConfig::default();
        assert!(config.endpoint.contains("generativelanguage"));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(config.enabled);
    }
}
