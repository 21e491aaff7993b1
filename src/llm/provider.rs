//! Provider registry: one [`ProviderProfile`] per supported LLM vendor.
//!
//! DESIGN
//! ======
//! Vendors differ in only four ways that matter to us: endpoint, how the
//! key is attached, the request body shape and where the generated text
//! lives in the response. Each profile captures those as data, so request
//! building and response parsing dispatch on `RequestShape` /
//! `ExtractionPath` instead of on the provider id. Adding a vendor means
//! adding a profile here and nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// PROVIDER ID
// =============================================================================

/// Every provider id the configuration surface accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// No network; the gateway always uses the deterministic generator.
    #[default]
    Mock,
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
    OpenRouter,
    HuggingFace,
    Cohere,
    Together,
    Mistral,
    /// Any OpenAI-compatible endpoint. Requires an explicit endpoint.
    Custom,
}

impl ProviderId {
    pub const ALL: [ProviderId; 11] = [
        ProviderId::Mock,
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Gemini,
        ProviderId::Groq,
        ProviderId::OpenRouter,
        ProviderId::HuggingFace,
        ProviderId::Cohere,
        ProviderId::Together,
        ProviderId::Mistral,
        ProviderId::Custom,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
            Self::HuggingFace => "huggingface",
            Self::Cohere => "cohere",
            Self::Together => "together",
            Self::Mistral => "mistral",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| format!("unknown AI provider: {raw}"))
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// How the API key reaches the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// Vendor-specific header carrying the raw key.
    HeaderKey { header: &'static str },
    /// `?key=<key>` appended to the endpoint URL.
    QueryKey,
    /// No credentials (mock only).
    None,
}

/// Request body layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `{ model, messages: [{role, content}], max_tokens, temperature }`
    ChatMessages,
    /// `{ model, prompt, max_tokens, temperature }`
    CompletionPrompt,
    /// `{ contents: [{parts: [{text}]}], generationConfig: {...} }`
    GenerateContents,
}

/// Location of the generated text in a successful response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    /// `choices[0].message.content`
    ChoicesMessage,
    /// `candidates[0].content.parts[0].text`
    CandidateParts,
    /// `content[0].text`
    ContentBlocks,
    /// `generations[0].text`
    Generations,
    /// `[0].generated_text`
    GeneratedText,
}

impl ExtractionPath {
    /// JSON pointer for [`serde_json::Value::pointer`].
    #[must_use]
    pub fn pointer(self) -> &'static str {
        match self {
            Self::ChoicesMessage => "/choices/0/message/content",
            Self::CandidateParts => "/candidates/0/content/parts/0/text",
            Self::ContentBlocks => "/content/0/text",
            Self::Generations => "/generations/0/text",
            Self::GeneratedText => "/0/generated_text",
        }
    }
}

/// Static description of one provider's HTTP contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: ProviderId,
    /// May contain `{model}`. Empty for providers that need an explicit endpoint.
    pub endpoint_template: &'static str,
    pub auth: AuthStyle,
    /// Fixed headers sent on every request (e.g. API version pins).
    pub extra_headers: &'static [(&'static str, &'static str)],
    pub request_shape: RequestShape,
    pub extraction: ExtractionPath,
    pub default_model: &'static str,
}

impl ProviderProfile {
    #[must_use]
    pub fn requires_api_key(&self) -> bool {
        self.auth != AuthStyle::None
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

const fn openai_compatible(id: ProviderId, endpoint: &'static str, model: &'static str) -> ProviderProfile {
    ProviderProfile {
        id,
        endpoint_template: endpoint,
        auth: AuthStyle::Bearer,
        extra_headers: &[],
        request_shape: RequestShape::ChatMessages,
        extraction: ExtractionPath::ChoicesMessage,
        default_model: model,
    }
}

static MOCK: ProviderProfile = ProviderProfile {
    id: ProviderId::Mock,
    endpoint_template: "",
    auth: AuthStyle::None,
    extra_headers: &[],
    request_shape: RequestShape::ChatMessages,
    extraction: ExtractionPath::ChoicesMessage,
    default_model: "mock",
};

static OPENAI: ProviderProfile =
    openai_compatible(ProviderId::OpenAi, "https://api.openai.com/v1/chat/completions", "gpt-4o-mini");

static ANTHROPIC: ProviderProfile = ProviderProfile {
    id: ProviderId::Anthropic,
    endpoint_template: "https://api.anthropic.com/v1/messages",
    auth: AuthStyle::HeaderKey { header: "x-api-key" },
    extra_headers: &[("anthropic-version", "2023-06-01")],
    request_shape: RequestShape::ChatMessages,
    extraction: ExtractionPath::ContentBlocks,
    default_model: "claude-3-5-haiku-latest",
};

static GEMINI: ProviderProfile = ProviderProfile {
    id: ProviderId::Gemini,
    endpoint_template: "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent",
    auth: AuthStyle::QueryKey,
    extra_headers: &[],
    request_shape: RequestShape::GenerateContents,
    extraction: ExtractionPath::CandidateParts,
    default_model: "gemini-1.5-flash",
};

static GROQ: ProviderProfile = openai_compatible(
    ProviderId::Groq,
    "https://api.groq.com/openai/v1/chat/completions",
    "llama-3.1-8b-instant",
);

static OPENROUTER: ProviderProfile = openai_compatible(
    ProviderId::OpenRouter,
    "https://openrouter.ai/api/v1/chat/completions",
    "meta-llama/llama-3.1-8b-instruct:free",
);

static HUGGINGFACE: ProviderProfile = ProviderProfile {
    id: ProviderId::HuggingFace,
    endpoint_template: "https://api-inference.huggingface.co/models/{model}",
    auth: AuthStyle::Bearer,
    extra_headers: &[],
    request_shape: RequestShape::CompletionPrompt,
    extraction: ExtractionPath::GeneratedText,
    default_model: "mistralai/Mistral-7B-Instruct-v0.2",
};

static COHERE: ProviderProfile = ProviderProfile {
    id: ProviderId::Cohere,
    endpoint_template: "https://api.cohere.ai/v1/generate",
    auth: AuthStyle::Bearer,
    extra_headers: &[],
    request_shape: RequestShape::CompletionPrompt,
    extraction: ExtractionPath::Generations,
    default_model: "command",
};

static TOGETHER: ProviderProfile = openai_compatible(
    ProviderId::Together,
    "https://api.together.xyz/v1/chat/completions",
    "meta-llama/Llama-3-8b-chat-hf",
);

static MISTRAL: ProviderProfile =
    openai_compatible(ProviderId::Mistral, "https://api.mistral.ai/v1/chat/completions", "mistral-small-latest");

static CUSTOM: ProviderProfile = openai_compatible(ProviderId::Custom, "", "default");

/// Resolve a provider id to its profile. Total over [`ProviderId`].
#[must_use]
pub fn profile(id: ProviderId) -> &'static ProviderProfile {
    match id {
        ProviderId::Mock => &MOCK,
        ProviderId::OpenAi => &OPENAI,
        ProviderId::Anthropic => &ANTHROPIC,
        ProviderId::Gemini => &GEMINI,
        ProviderId::Groq => &GROQ,
        ProviderId::OpenRouter => &OPENROUTER,
        ProviderId::HuggingFace => &HUGGINGFACE,
        ProviderId::Cohere => &COHERE,
        ProviderId::Together => &TOGETHER,
        ProviderId::Mistral => &MISTRAL,
        ProviderId::Custom => &CUSTOM,
    }
}

/// All registered profiles, in [`ProviderId::ALL`] order.
#[must_use]
pub fn registry() -> [&'static ProviderProfile; 11] {
    ProviderId::ALL.map(profile)
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;
