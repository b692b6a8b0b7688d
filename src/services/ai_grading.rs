use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::AiSettings;

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced teacher grading handwritten exam answers.
The student's answer was transcribed by OCR and may contain recognition errors.

Grading rules:
1. Compare the student's answer with the answer key by meaning, not by matching keywords.
2. Award partial credit when an answer is partly correct or incomplete.
3. Ignore spelling mistakes and garbled characters that are likely caused by OCR.
4. Never award more than the maximum marks for the question.

Respond with exactly one JSON object and no other text:
{
  "marks": <number>,
  "feedback": "<one or two sentences addressed to the student>",
  "confidence": <number from 0 to 100>
}
"#;

const INSIGHTS_SYSTEM_PROMPT: &str = r#"You are an education data analyst helping a school understand exam results.
Read the analytics data and respond with exactly one JSON object and no other text:
{
  "summary": "<short overview of overall performance>",
  "insights": ["<observation>", "..."],
  "recommendations": ["<actionable recommendation for teachers>", "..."]
}
"#;

pub(crate) const DEFAULT_FEEDBACK: &str = "No feedback provided";
pub(crate) const DEFAULT_CONFIDENCE: f64 = 70.0;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub(crate) enum AiGradingError {
    #[error("AI grading is not configured: {0} is not set")]
    NotConfigured(&'static str),
    #[error("AI request failed: {0}")]
    Transport(String),
    #[error("AI service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("AI response could not be parsed: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub(crate) struct QuestionGradeRequest {
    pub(crate) question_number: i32,
    pub(crate) question_text: String,
    pub(crate) student_answer: String,
    pub(crate) answer_key: String,
    pub(crate) max_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct QuestionGrade {
    pub(crate) marks: f64,
    pub(crate) feedback: String,
    pub(crate) confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Insights {
    #[serde(default)]
    pub(crate) summary: String,
    #[serde(default)]
    pub(crate) insights: Vec<String>,
    #[serde(default)]
    pub(crate) recommendations: Vec<String>,
}

#[async_trait]
pub(crate) trait QuestionGrader: Send + Sync {
    async fn grade_one(
        &self,
        request: &QuestionGradeRequest,
    ) -> Result<QuestionGrade, AiGradingError>;

    async fn summarize(&self, analytics: &Value) -> Result<Insights, AiGradingError>;
}

/// Chat-completions client for the Groq OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub(crate) struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GroqClient {
    pub(crate) fn from_settings(settings: &AiSettings) -> Result<Self, AiGradingError> {
        if !settings.is_configured() {
            return Err(AiGradingError::NotConfigured("GROQ_API_KEY"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .map_err(|err| AiGradingError::Transport(format!("failed to build client: {err}")))?;

        Ok(Self {
            client,
            api_key: settings.groq_api_key.clone(),
            base_url: settings.groq_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries.max(1),
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AiGradingError> {
        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AiGradingError::Transport(err.to_string()))?;

        let status = response.status();
        let body =
            response.text().await.map_err(|err| AiGradingError::Transport(err.to_string()))?;

        if status != StatusCode::OK {
            return Err(AiGradingError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        message_content(&body)
    }

    /// Calls the endpoint until `parse` accepts a response. Transport errors,
    /// non-200 responses and unparseable content all count as failed attempts;
    /// the last error is returned once attempts run out.
    async fn complete_with_retries<T: Send>(
        &self,
        kind: &'static str,
        system: &str,
        user: &str,
        parse: impl Fn(&str) -> Result<T, AiGradingError> + Send + Sync,
    ) -> Result<T, AiGradingError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            let started = Instant::now();
            let outcome = match self.complete(system, user).await {
                Ok(content) => parse(&content),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(value) => {
                    metrics::counter!("ai_requests_total", "kind" => kind, "status" => "ok")
                        .increment(1);
                    tracing::debug!(
                        kind,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "AI request succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    metrics::counter!("ai_requests_total", "kind" => kind, "status" => "error")
                        .increment(1);
                    tracing::warn!(
                        kind,
                        attempt,
                        max_attempts = self.max_retries,
                        error = %err,
                        "AI request attempt failed"
                    );
                    last_error = Some(err);
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_base_delay * attempt).await;
            }
        }

        Err(last_error.unwrap_or_else(|| AiGradingError::Transport("no attempt was made".into())))
    }
}

#[async_trait]
impl QuestionGrader for GroqClient {
    async fn grade_one(
        &self,
        request: &QuestionGradeRequest,
    ) -> Result<QuestionGrade, AiGradingError> {
        let user_prompt = grading_prompt(request);
        let max_marks = request.max_marks;
        self.complete_with_retries("grade", GRADING_SYSTEM_PROMPT, &user_prompt, |content| {
            parse_grade(content, max_marks)
        })
        .await
    }

    async fn summarize(&self, analytics: &Value) -> Result<Insights, AiGradingError> {
        let data = serde_json::to_string_pretty(analytics)
            .map_err(|err| AiGradingError::InvalidResponse(err.to_string()))?;
        let user_prompt = format!("Analytics data:\n{data}\n\nProduce the insights JSON now.");
        self.complete_with_retries("insights", INSIGHTS_SYSTEM_PROMPT, &user_prompt, parse_insights)
            .await
    }
}

fn grading_prompt(request: &QuestionGradeRequest) -> String {
    format!(
        "Question {number}: {question}\nMaximum marks: {max}\n\nAnswer key:\n{key}\n\n\
         Student answer (OCR transcription):\n{answer}\n\n\
         Grade the student answer and reply with the JSON object described in the instructions. \
         \"marks\" must be between 0 and {max}.",
        number = request.question_number,
        question = request.question_text.trim(),
        max = request.max_marks,
        key = request.answer_key.trim(),
        answer = if request.student_answer.trim().is_empty() {
            "(no answer found)"
        } else {
            request.student_answer.trim()
        },
    )
}

fn message_content(body: &str) -> Result<String, AiGradingError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| AiGradingError::InvalidResponse(format!("response is not JSON: {err}")))?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AiGradingError::InvalidResponse("missing message content".to_string()))
}

/// First balanced `{...}` in `text`, ignoring braces inside JSON strings.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_payload(content: &str) -> Result<Value, AiGradingError> {
    let object = extract_json_object(content).ok_or_else(|| {
        AiGradingError::InvalidResponse("no JSON object in model output".to_string())
    })?;
    serde_json::from_str(object)
        .map_err(|err| AiGradingError::InvalidResponse(format!("malformed JSON object: {err}")))
}

fn number_field(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    let number = match field {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Marks are clamped to `[0, max_marks]` whatever the model returned.
pub(crate) fn parse_grade(content: &str, max_marks: f64) -> Result<QuestionGrade, AiGradingError> {
    let payload = json_payload(content)?;

    let marks = number_field(&payload, "marks")
        .ok_or_else(|| AiGradingError::InvalidResponse("missing numeric marks".to_string()))?;
    let marks = marks.clamp(0.0, max_marks.max(0.0));

    let feedback = payload
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_FEEDBACK)
        .to_string();

    let confidence =
        number_field(&payload, "confidence").unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 100.0);

    Ok(QuestionGrade { marks, feedback, confidence })
}

pub(crate) fn parse_insights(content: &str) -> Result<Insights, AiGradingError> {
    let payload = json_payload(content)?;
    let insights: Insights = serde_json::from_value(payload)
        .map_err(|err| AiGradingError::InvalidResponse(format!("unexpected insights shape: {err}")))?;
    if insights.summary.trim().is_empty() {
        return Err(AiGradingError::InvalidResponse("insights summary is empty".to_string()));
    }
    Ok(insights)
}
