//! Backend model providers the chat agent can route to.
//!
//! The backend owns the actual LLM clients; the client only picks one by id.

use std::fmt;

/// Provider ids understood by the chat backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    OpenAI,
    Groq,
    Anthropic,
    Mistral,
    Ollama,
}

impl ModelKind {
    /// Returns all model kinds.
    pub fn all() -> &'static [ModelKind] {
        &[
            ModelKind::OpenAI,
            ModelKind::Groq,
            ModelKind::Anthropic,
            ModelKind::Mistral,
            ModelKind::Ollama,
        ]
    }

    /// Returns the id sent as `model` on the wire and stored in config.
    pub fn id(&self) -> &'static str {
        match self {
            ModelKind::OpenAI => "openai",
            ModelKind::Groq => "groq",
            ModelKind::Anthropic => "anthropic",
            ModelKind::Mistral => "mistral",
            ModelKind::Ollama => "ollama",
        }
    }

    /// Returns the `ModelKind` for a given id string.
    pub fn from_id(id: &str) -> Option<ModelKind> {
        match id.trim().to_lowercase().as_str() {
            "openai" => Some(ModelKind::OpenAI),
            "groq" => Some(ModelKind::Groq),
            "anthropic" => Some(ModelKind::Anthropic),
            "mistral" => Some(ModelKind::Mistral),
            "ollama" => Some(ModelKind::Ollama),
            _ => None,
        }
    }

    /// Returns the human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::OpenAI => "OpenAI",
            ModelKind::Groq => "Groq",
            ModelKind::Anthropic => "Anthropic",
            ModelKind::Mistral => "Mistral",
            ModelKind::Ollama => "Ollama",
        }
    }

    /// Model the backend runs for this provider.
    pub fn backend_model(&self) -> &'static str {
        match self {
            ModelKind::OpenAI => "gpt-4.1",
            ModelKind::Groq => "llama-3.3-70b-versatile",
            ModelKind::Anthropic => "claude-sonnet-4-5-20250929",
            ModelKind::Mistral => "mistral-7b-instant",
            ModelKind::Ollama => "gpt-oss:120b",
        }
    }

    /// Comma-separated list of valid ids, for error messages.
    pub fn valid_ids() -> String {
        Self::all()
            .iter()
            .map(ModelKind::id)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
