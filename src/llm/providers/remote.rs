use crate::config::LlmConfig;
use crate::llm::{GenerationOutcome, GenerationRequest, LlmError, QueryGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// OpenAI-compatible chat-completions generator.
pub struct RemoteGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct PromptRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl RemoteGenerator {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self, LlmError> {
        let api_url = config.api_url.clone().ok_or_else(|| {
            LlmError::ConfigError("API URL is required for remote LLM provider".to_string())
        })?;

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError("API key is required for remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
        })
    }

    fn prepare_prompt(&self, request: &GenerationRequest) -> String {
        let mut prompt = String::from(
            r#"### Instructions:
Your task is to convert a question into a SQL query, given a database schema.
Adhere to these rules:
- **Deliberately go through the question and database schema word by word** to appropriately answer the question
- **Use Table Aliases** to prevent ambiguity. For example, `SELECT table1.col1, table2.col1 FROM table1 JOIN table2 ON table1.id = table2.id`.
- When creating a ratio, always cast the numerator as float
"#,
        );
        if !request.instructions.trim().is_empty() {
            prompt.push_str(&format!("\n{}\n", request.instructions.trim()));
        }
        prompt.push_str(&format!(
            r#"
### Input:
Generate a SQL query that answers the question `{}`.
This query will run on a database whose schema is represented in this string:
{}
"#,
            request.question, request.schema
        ));
        if !request.prev_invalid_sql.trim().is_empty() {
            prompt.push_str(&format!(
                "\nA previous attempt was rejected. Do not repeat its mistake.\nInvalid query:\n{}\nError message:\n{}\n",
                request.prev_invalid_sql, request.prev_error_msg
            ));
        }
        prompt.push_str(&format!(
            r#"
### Response:
Based on your instructions, here is the SQL query I have generated to answer the question `{}`:
```sql
"#,
            request.question
        ));
        prompt
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<(String, String), LlmError> {
        let prompt = self.prepare_prompt(request);

        let body = PromptRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: 0.1,
            max_tokens: 2000,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = prompt_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?;

        let sql = extract_sql(&content);
        if sql.trim().is_empty() {
            return Err(LlmError::ResponseError(
                "Failed to extract SQL from response".to_string(),
            ));
        }
        Ok((sql, content))
    }
}

/// Pulls the SQL statement out of a model response, preferring a fenced
/// ```sql block, then any fenced block, then the raw text.
fn extract_sql(content: &str) -> String {
    if let Some(start) = content.find("```sql") {
        if let Some(end) = content[start + 6..].find("```") {
            return content[start + 6..start + 6 + end].trim().to_string();
        }
        // Opening fence with no closing fence: the prompt itself ends with
        // one, so everything after it is the query.
        return content[start + 6..].trim().to_string();
    }
    if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim().to_string();
        }
    }
    content.trim().to_string()
}

#[async_trait]
impl QueryGenerator for RemoteGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let started = Instant::now();
        debug!("Requesting query for question: {}", request.question);

        match self.complete(request).await {
            Ok((query, rationale)) => GenerationOutcome {
                query,
                rationale,
                error: String::new(),
                latency_seconds: started.elapsed().as_secs_f64(),
            },
            Err(e) => {
                error!("Generation failed for question '{}': {}", request.question, e);
                GenerationOutcome {
                    query: String::new(),
                    rationale: String::new(),
                    error: format!("GENERATION ERROR: {}", e),
                    latency_seconds: started.elapsed().as_secs_f64(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::extract_sql;

    #[test]
    fn extracts_fenced_sql() {
        let content = "Here you go:\n```sql\nSELECT 1;\n```\nDone.";
        assert_eq!(extract_sql(content), "SELECT 1;");
    }

    #[test]
    fn extracts_unterminated_fence() {
        assert_eq!(extract_sql("```sql\nSELECT 2"), "SELECT 2");
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(extract_sql("SELECT 3"), "SELECT 3");
    }
}
