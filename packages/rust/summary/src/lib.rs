//! Contract summary generation.
//!
//! Sends the plain text of an assembled contract to an OpenAI-compatible
//! chat completion endpoint and returns a short French summary laid out as
//! `POINTS CLÉS` / `CONFLITS` bullet lists. Every failure is reported as a
//! [`MergeWarning::SummaryUnavailable`] by [`generate_summary`]; a contract
//! is never lost because its summary could not be produced.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use clausier_shared::{ClausierError, MergeWarning, Result, SummaryConfig, resolve_api_key};

/// User-Agent string for summary requests.
const USER_AGENT: &str = concat!("Clausier/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "Tu es un assistant juridique. Produis des synthèses structurées, \
claires et factuelles en français. Utilise uniquement du texte brut, sans formatting markdown.";

const USER_PROMPT: &str = "Analyse le contrat suivant et produis une synthèse structurée en texte brut avec :

POINTS CLÉS
• [Liste des éléments essentiels du contrat]
• [Un point par ligne avec des puces simples]

CONFLITS
• [0 à 3 points sur d'éventuelles contradictions entre clauses]
• [Ou indiquer \"Aucun conflit de clause détecté\" si tu n'en trouves pas]

Utilise uniquement des caractères simples (•) pour les listes, pas de markdown.

Texte:
";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Chat completion client bound to one endpoint, model and key.
pub struct Summarizer {
    client: Client,
    config: SummaryConfig,
    api_key: String,
}

impl Summarizer {
    pub fn new(config: &SummaryConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClausierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build a summarizer with the key read from the configured environment
    /// variable.
    pub fn from_env(config: &SummaryConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Self::new(config, api_key)
    }

    /// Summarize `contract_text`. An empty answer is an error.
    #[instrument(skip_all, fields(model = %self.config.model, chars = contract_text.chars().count()))]
    pub async fn summarize(&self, contract_text: &str) -> Result<String> {
        let user_prompt = format!("{USER_PROMPT}{contract_text}");
        let request = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
        };

        debug!(endpoint = %self.config.endpoint, "requesting summary");
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClausierError::Network(format!("summary request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(ClausierError::Network(format!("HTTP {status}: {excerpt}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClausierError::Summary(format!("invalid completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ClausierError::Summary("completion returned no text".into()));
        }

        info!(chars = content.chars().count(), "summary generated");
        Ok(content)
    }
}

/// Summarize `contract_text`, turning any failure into a
/// [`MergeWarning::SummaryUnavailable`].
pub async fn generate_summary(
    config: &SummaryConfig,
    contract_text: &str,
) -> std::result::Result<String, MergeWarning> {
    let unavailable = |e: ClausierError| MergeWarning::SummaryUnavailable {
        reason: e.to_string(),
    };
    let summarizer = Summarizer::from_env(config).map_err(unavailable)?;
    summarizer.summarize(contract_text).await.map_err(unavailable)
}
