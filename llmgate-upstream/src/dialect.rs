//! Wire dialects, one per provider family.
//!
//! All providers share the chat-completion request/response shape. A
//! dialect decides how the resolved request is put on the wire (which
//! generation parameters are sent, how the credential is presented) and
//! parses the common response variants.

use llmgate_core::{CompletionRequest, ProviderFamily};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Map, Value, json};

use crate::error::HttpError;

/// Longest provider error message kept verbatim.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Parsed upstream answer, without timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCompletion {
    /// Completion text.
    pub text: String,
    /// Prompt tokens (0 when unreported).
    pub tokens_in: u64,
    /// Completion tokens (0 when unreported).
    pub tokens_out: u64,
    /// Model reported by the upstream, or the requested one.
    pub model: String,
}

// ============================================================================
// Dialect Trait
// ============================================================================

/// How one provider family maps a request onto the wire.
pub trait WireDialect: Send + Sync + std::fmt::Debug {
    /// The family this dialect serves.
    fn family(&self) -> ProviderFamily;

    /// Builds the JSON request body.
    fn body(&self, request: &CompletionRequest) -> Value {
        let mut body = base_body(request);
        body.insert("temperature".to_string(), json!(request.temperature));
        body.insert("max_tokens".to_string(), json!(request.max_tokens));
        Value::Object(body)
    }

    /// Builds the auth headers for `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is not a valid header value.
    fn auth_headers(&self, credential: &str) -> Result<HeaderMap, HttpError> {
        bearer(credential)
    }

    /// Parses a 2xx response body.
    ///
    /// # Errors
    ///
    /// Returns a description of what was missing if the body holds no
    /// completion text.
    fn parse(&self, body: &Value, requested_model: &str) -> Result<ParsedCompletion, String> {
        parse_completion(body, requested_model)
    }
}

// ============================================================================
// Dialects
// ============================================================================

/// OpenAI-compatible endpoint with bearer auth.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDialect;

impl WireDialect for OpenAiDialect {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAi
    }
}

/// Reasoning models: no `temperature`, and `max_completion_tokens` in
/// place of `max_tokens`, which these models reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningDialect;

impl WireDialect for ReasoningDialect {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Reasoning
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut body = base_body(request);
        body.insert(
            "max_completion_tokens".to_string(),
            json!(request.max_tokens),
        );
        Value::Object(body)
    }
}

/// Self-hosted endpoint; sends an auth header only when a credential is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDialect;

impl WireDialect for LocalDialect {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Local
    }

    fn auth_headers(&self, credential: &str) -> Result<HeaderMap, HttpError> {
        if credential.is_empty() {
            return Ok(HeaderMap::new());
        }
        bearer(credential)
    }
}

static OPENAI: OpenAiDialect = OpenAiDialect;
static REASONING: ReasoningDialect = ReasoningDialect;
static LOCAL: LocalDialect = LocalDialect;

/// Returns the dialect for a provider family.
pub fn dialect_for(family: ProviderFamily) -> &'static dyn WireDialect {
    match family {
        ProviderFamily::OpenAi => &OPENAI,
        ProviderFamily::Reasoning => &REASONING,
        ProviderFamily::Local => &LOCAL,
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn base_body(request: &CompletionRequest) -> Map<String, Value> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": request.system_prompt}));
    }
    messages.push(json!({"role": "user", "content": request.message}));

    let mut body = Map::new();
    body.insert("model".to_string(), json!(request.model));
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert("stream".to_string(), Value::Bool(false));
    body
}

fn bearer(credential: &str) -> Result<HeaderMap, HttpError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {credential}"))
        .map_err(|_| HttpError::InvalidHeader(header::AUTHORIZATION.to_string()))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value);
    Ok(headers)
}

/// Extracts completion text, token counts and model from a response body.
///
/// Accepted shapes, in order: `choices[0].message.content`,
/// `choices[0].text`, then flat `text`, `content` or `response`. A
/// `content` array of `{type, text}` blocks is concatenated.
///
/// # Errors
///
/// Returns a description if none of the shapes is present.
pub fn parse_completion(body: &Value, requested_model: &str) -> Result<ParsedCompletion, String> {
    let first_choice = body.pointer("/choices/0");
    let text = first_choice
        .and_then(|c| c.pointer("/message/content"))
        .and_then(text_of)
        .or_else(|| first_choice.and_then(|c| c.get("text")).and_then(text_of))
        .or_else(|| body.get("text").and_then(text_of))
        .or_else(|| body.get("content").and_then(text_of))
        .or_else(|| body.get("response").and_then(text_of))
        .ok_or_else(|| "response body contains no completion text".to_string())?;

    let usage = body.get("usage");
    let count = |primary: &str, secondary: &str| {
        usage
            .and_then(|u| u.get(primary).or_else(|| u.get(secondary)))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(requested_model)
        .to_string();

    Ok(ParsedCompletion {
        text,
        tokens_in: count("prompt_tokens", "input_tokens"),
        tokens_out: count("completion_tokens", "output_tokens"),
        model,
    })
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.concat())
            }
        }
        _ => None,
    }
}

/// Extracts the provider-reported error message from an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}`,
/// `{"message": ..}` and `{"detail": ..}`; otherwise falls back to the
/// (truncated) raw text.
pub fn error_message(body: &str, status: u16) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error").filter(|e| e.is_string()))
            .or_else(|| v.get("message"))
            .or_else(|| v.get("detail"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => format!("upstream returned HTTP {status}"),
        None => truncate(body.trim(), MAX_ERROR_MESSAGE_LEN),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m1".to_string(),
            system_prompt: "be brief".to_string(),
            message: "ping".to_string(),
            temperature: 0.5,
            max_tokens: 64,
        }
    }

    #[test]
    fn test_openai_body_sends_generation_params() {
        let body = OpenAiDialect.body(&request());
        assert_eq!(body["model"], "m1");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "ping");
    }

    #[test]
    fn test_reasoning_body_omits_max_tokens() {
        let body = ReasoningDialect.body(&request());
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["max_completion_tokens"], 64);
    }

    #[test]
    fn test_empty_system_prompt_omitted() {
        let mut req = request();
        req.system_prompt.clear();
        let body = OpenAiDialect.body(&req);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_local_without_credential_sends_no_auth() {
        assert!(LocalDialect.auth_headers("").unwrap().is_empty());
        let headers = LocalDialect.auth_headers("k").unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer k");
        assert!(OpenAiDialect.auth_headers("sk").unwrap().contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_credential_with_newline_rejected() {
        assert!(OpenAiDialect.auth_headers("sk\nX: y").is_err());
    }

    #[test]
    fn test_parse_openai_shape() {
        let body = json!({
            "model": "gpt-x",
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 2}
        });
        let parsed = parse_completion(&body, "m1").unwrap();
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.tokens_in, 7);
        assert_eq!(parsed.tokens_out, 2);
        assert_eq!(parsed.model, "gpt-x");
    }

    #[test]
    fn test_parse_flat_text_shape() {
        let parsed = parse_completion(&json!({"text": "pong"}), "m1").unwrap();
        assert_eq!(parsed.text, "pong");
        assert_eq!(parsed.tokens_in, 0);
        assert_eq!(parsed.model, "m1");
    }

    #[test]
    fn test_parse_content_blocks_and_input_tokens() {
        let body = json!({
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}],
            "usage": {"input_tokens": 3, "output_tokens": 4}
        });
        let parsed = parse_completion(&body, "m1").unwrap();
        assert_eq!(parsed.text, "ab");
        assert_eq!((parsed.tokens_in, parsed.tokens_out), (3, 4));
    }

    #[test]
    fn test_parse_missing_text_is_error() {
        assert!(parse_completion(&json!({"choices": []}), "m1").is_err());
        assert!(parse_completion(&json!({"id": "x"}), "m1").is_err());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Invalid key"}}"#, 401),
            "Invalid key"
        );
        assert_eq!(error_message(r#"{"error":"nope"}"#, 400), "nope");
        assert_eq!(error_message(r#"{"detail":"slow down"}"#, 429), "slow down");
        assert_eq!(error_message("", 502), "upstream returned HTTP 502");
        assert_eq!(error_message("gateway exploded", 502), "gateway exploded");
        assert!(error_message(&"x".repeat(2_000), 500).len() < 600);
    }
}
