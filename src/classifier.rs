// 🧠 Semantic Intent Classifier Adapter
// Wraps one call to an external LLM: fixed Portuguese instruction in,
// strict JSON out. Every way the call can go wrong ends up as a typed
// `ClassifierError`; nothing here retries.

use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClassifierConfig;
use crate::intent::{
    Action, EntityType, Period, RawIntent, StructuredIntent, TransactionDirection,
    VocabularyError,
};

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_LLM_OUTPUT_LOG_CHARS: usize = 8_000;

// ============================================================================
// LLM TRANSPORT
// ============================================================================

/// LLM request payload
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Anything that can turn a prompt into completion text
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// Scripted client for tests and offline runs; remembers every request
pub struct MockLlmClient {
    response: Result<String, LlmError>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn replying(response: impl Into<String>) -> Self {
        MockLlmClient {
            response: Ok(response.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        MockLlmClient {
            response: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.response.clone()
    }
}

#[cfg(feature = "http")]
pub use http::HttpLlmClient;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use serde::{Deserialize, Serialize};
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

    /// OpenAI-compatible chat completions client
    pub struct HttpLlmClient {
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
    }

    impl HttpLlmClient {
        pub fn new(config: &ClassifierConfig) -> Result<Self, LlmError> {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| LlmError::Http(e.to_string()))?;

            Ok(HttpLlmClient {
                client,
                endpoint: config.endpoint.clone(),
                api_key: config.api_key.clone(),
            })
        }
    }

    #[derive(Debug, Serialize)]
    struct ChatMessage {
        role: String,
        content: String,
    }

    #[derive(Debug, Serialize)]
    struct ChatRequest {
        model: String,
        messages: Vec<ChatMessage>,
        temperature: f32,
    }

    #[derive(Debug, Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Debug, Deserialize)]
    struct ChatChoice {
        message: ChatMessageResponse,
    }

    #[derive(Debug, Deserialize)]
    struct ChatMessageResponse {
        #[serde(default)]
        content: Option<String>,
    }

    #[async_trait]
    impl LlmClient for HttpLlmClient {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Some(key) = &self.api_key {
                let value = format!("Bearer {}", key);
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&value).map_err(|e| LlmError::Http(e.to_string()))?,
                );
            }

            let body = ChatRequest {
                model: request.model,
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt,
                }],
                temperature: request.temperature,
            };

            let response = self
                .client
                .post(&self.endpoint)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::Response(format!("HTTP {}: {}", status, text)));
            }

            let text = response
                .text()
                .await
                .map_err(|e| LlmError::Http(e.to_string()))?;
            let parsed: ChatResponse =
                serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content.unwrap_or_default())
                .ok_or_else(|| LlmError::Response("Missing choices".to_string()))
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier call failed: {0}")]
    Transport(#[from] LlmError),

    #[error("classifier returned an empty response")]
    Empty,

    #[error("classifier response is not valid JSON: {0}")]
    Malformed(String),

    #[error("classifier response outside vocabulary: {0}")]
    Vocabulary(#[from] VocabularyError),
}

pub struct IntentClassifier<C: LlmClient> {
    client: C,
    model: String,
    temperature: f32,
    known_categories: Vec<String>,
}

impl<C: LlmClient> IntentClassifier<C> {
    pub fn new(client: C, config: &ClassifierConfig) -> Self {
        IntentClassifier {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            known_categories: config.known_categories.clone(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The fixed instruction with the message embedded
    pub fn build_prompt(&self, message: &str) -> String {
        build_prompt(message, &self.known_categories)
    }

    /// One classifier round trip, returning the JSON object as received
    pub async fn classify_raw(&self, message: &str) -> Result<RawIntent, ClassifierError> {
        let prompt = self.build_prompt(message);
        info!(
            model = %self.model,
            temperature = self.temperature,
            message_len = message.len(),
            "classifier request prepared"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(prompt = %truncate_for_log(&prompt, MAX_PROMPT_LOG_CHARS), "classifier prompt");
        }

        let output = self
            .client
            .complete(LlmRequest {
                prompt,
                model: self.model.clone(),
                temperature: self.temperature,
            })
            .await?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "classifier raw output"
            );
        }

        parse_response(&output)
    }

    /// Classify and validate into a typed intent
    pub async fn classify(&self, message: &str) -> Result<StructuredIntent, ClassifierError> {
        let raw = self.classify_raw(message).await?;
        Ok(raw.into_intent(message)?)
    }
}

/// Strip fences, then parse the JSON object
pub fn parse_response(output: &str) -> Result<RawIntent, ClassifierError> {
    let body = strip_code_fence(output);
    if body.is_empty() {
        return Err(ClassifierError::Empty);
    }

    serde_json::from_str::<RawIntent>(body).map_err(|e| ClassifierError::Malformed(e.to_string()))
}

/// Remove a surrounding ```json … ``` (or bare ```) wrapper
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if body
        .get(..7)
        .map_or(false, |head| head.eq_ignore_ascii_case("```json"))
    {
        body = &body[7..];
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Render the instruction template for `message`
pub fn build_prompt(message: &str, known_categories: &[String]) -> String {
    let entity_types = [EntityType::Transaction, EntityType::Task]
        .iter()
        .map(|v| format!("\"{}\"", v.code()))
        .collect::<Vec<_>>()
        .join(" | ");
    let actions = [Action::Insert, Action::Edit, Action::Query, Action::Remove]
        .iter()
        .map(|v| format!("\"{}\"", v.code()))
        .collect::<Vec<_>>()
        .join(" | ");
    let directions = [TransactionDirection::Inflow, TransactionDirection::Outflow]
        .iter()
        .map(|v| format!("\"{}\"", v.code()))
        .collect::<Vec<_>>()
        .join(" | ");
    let periods = [Period::Today, Period::Yesterday, Period::Week, Period::Month]
        .iter()
        .map(|v| format!("\"{}\"", v.code()))
        .collect::<Vec<_>>()
        .join(" | ");

    let mut prompt = String::new();
    prompt.push_str(
        "Você é Lume, uma assistente financeira inteligente. Analise a frase e retorne APENAS um JSON válido (sem crases) no formato:\n\n",
    );
    prompt.push_str("{\n");
    let _ = writeln!(prompt, "  \"tipo\": {},", entity_types);
    let _ = writeln!(prompt, "  \"acao\": {},", actions);
    prompt.push_str("  \"descricao\": \"string\",\n");
    prompt.push_str("  \"valor\": number | null,\n");
    prompt.push_str("  \"data\": \"YYYY-MM-DD\" | null,\n");
    prompt.push_str("  \"hora\": \"HH:mm\" | null,\n");
    let _ = writeln!(prompt, "  \"tipoTransacao\": {} | null,", directions);
    prompt.push_str("  \"categoria\": \"string\" | null,\n");
    let _ = writeln!(prompt, "  \"periodo\": {} | null", periods);
    prompt.push_str("}\n\n");

    prompt.push_str("REGRAS:\n");
    prompt.push_str("- Se a frase indicar RESUMO/EXTRATO/CONSULTA (ex.: \"gastos do mês\", \"quanto gastei esta semana\", \"resumo de hoje\"): acao=\"consultar\".\n");
    prompt.push_str("- Detecte o PERÍODO:\n");
    prompt.push_str("  - \"hoje\", \"diário\", \"do dia\" ⇒ periodo=\"hoje\"\n");
    prompt.push_str("  - \"ontem\" ⇒ periodo=\"ontem\"\n");
    prompt.push_str("  - \"semana\", \"semanal\", \"desta semana\", \"da semana passada\" ⇒ periodo=\"semana\"\n");
    prompt.push_str("  - \"mês\", \"mensal\", \"deste mês\", \"mês passado\" ⇒ periodo=\"mes\"\n");
    prompt.push_str("- Se a mensagem tiver uma data explícita como \"18/12\", \"18/12/2025\" ou \"18 de dezembro\", preencha \"data\" no formato \"YYYY-MM-DD\" em vez de usar apenas \"periodo\".\n");
    prompt.push_str("- Nunca retorne \"null\" como string. Use null literal quando não tiver valor/hora/data.\n");
    prompt.push_str("- Se indicar gasto/compra/pagamento ⇒ tipoTransacao=\"SAIDA\".\n");
    prompt.push_str("- Se indicar recebimento/salário/venda ⇒ tipoTransacao=\"ENTRADA\".\n");
    prompt.push_str("- Se for tarefa, ignore valor/tipoTransacao/categoria/periodo (retorne como null nesses campos).\n");
    if known_categories.is_empty() {
        prompt.push_str("- Categorize transações com uma categoria curta quando possível.\n");
    } else {
        let _ = writeln!(
            prompt,
            "- Categorize transações com uma das categorias conhecidas quando possível: {}.",
            known_categories.join(", ")
        );
    }

    let _ = write!(prompt, "\nMensagem: \"{}\"\n", message);
    prompt
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(client: MockLlmClient) -> IntentClassifier<MockLlmClient> {
        IntentClassifier::new(client, &ClassifierConfig::default())
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```JSON {\"a\":1} ```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n```"), "");
    }

    #[test]
    fn test_parse_response_errors() {
        assert!(matches!(parse_response("   "), Err(ClassifierError::Empty)));
        assert!(matches!(parse_response("```json\n```"), Err(ClassifierError::Empty)));
        assert!(matches!(
            parse_response("Claro! Aqui está."),
            Err(ClassifierError::Malformed(_))
        ));
        assert!(matches!(
            parse_response("[1, 2, 3]"),
            Err(ClassifierError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_embeds_message_and_vocabulary() {
        let prompt = build_prompt("gastei 50 no mercado", &["Mercado".to_string()]);

        assert!(prompt.contains("Mensagem: \"gastei 50 no mercado\""));
        assert!(prompt.contains("\"transacao\" | \"tarefa\""));
        assert!(prompt.contains("\"inserir\" | \"editar\" | \"consultar\" | \"remover\""));
        assert!(prompt.contains("\"ENTRADA\" | \"SAIDA\""));
        assert!(prompt.contains("\"hoje\" | \"ontem\" | \"semana\" | \"mes\""));
        assert!(prompt.contains("tipoTransacao=\"SAIDA\""));
        assert!(prompt.contains("categorias conhecidas quando possível: Mercado."));
    }

    #[tokio::test]
    async fn test_classify_fenced_response() {
        let client = MockLlmClient::replying(
            "```json\n{\"tipo\":\"transacao\",\"acao\":\"inserir\",\"descricao\":\"mercado\",\"valor\":50,\"data\":null,\"hora\":\"null\",\"tipoTransacao\":\"SAIDA\",\"categoria\":\"Mercado\",\"periodo\":null}\n```",
        );
        let classifier = classifier(client);

        let intent = classifier.classify("gastei 50 no mercado").await.unwrap();

        assert_eq!(intent.entity_type, EntityType::Transaction);
        assert_eq!(intent.transaction_direction, Some(TransactionDirection::Outflow));
        assert_eq!(intent.time, None);

        let requests = classifier.client().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert!(requests[0].prompt.contains("gastei 50 no mercado"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_typed() {
        let classifier = classifier(MockLlmClient::failing(LlmError::Http(
            "connection refused".to_string(),
        )));

        let err = classifier.classify("oi").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Transport(LlmError::Http(_))));
    }

    #[tokio::test]
    async fn test_vocabulary_failure_is_typed() {
        let classifier = classifier(MockLlmClient::replying(
            r#"{"tipo":"lembrete","acao":"inserir"}"#,
        ));

        let err = classifier.classify("oi").await.unwrap_err();
        assert!(matches!(err, ClassifierError::Vocabulary(_)));
    }

    #[cfg(feature = "http")]
    mod http_client {
        use super::*;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn config(server: &MockServer) -> ClassifierConfig {
            ClassifierConfig {
                endpoint: format!("{}/v1/chat/completions", server.uri()),
                api_key: Some("sk-test".to_string()),
                timeout_secs: 5,
                ..ClassifierConfig::default()
            }
        }

        fn request() -> LlmRequest {
            LlmRequest {
                prompt: "olá".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
            }
        }

        #[tokio::test]
        async fn test_http_client_returns_first_choice() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("authorization", "Bearer sk-test"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "{\"tipo\":\"tarefa\"}"}}]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let client = HttpLlmClient::new(&config(&server)).unwrap();
            let output = client.complete(request()).await.unwrap();

            assert_eq!(output, "{\"tipo\":\"tarefa\"}");
        }

        #[tokio::test]
        async fn test_http_client_maps_error_status() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
                .mount(&server)
                .await;

            let client = HttpLlmClient::new(&config(&server)).unwrap();
            let err = client.complete(request()).await.unwrap_err();

            match err {
                LlmError::Response(text) => {
                    assert!(text.contains("429"));
                    assert!(text.contains("rate limited"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_http_client_rejects_non_json_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .mount(&server)
                .await;

            let client = HttpLlmClient::new(&config(&server)).unwrap();
            let err = client.complete(request()).await.unwrap_err();

            assert!(matches!(err, LlmError::Serialization(_)));
        }
    }
}
