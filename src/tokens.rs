//! Token counting for LLM context budgets.
//!
//! Uses tiktoken-rs BPE encodings, with a character heuristic when an
//! encoding cannot be loaded.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// o200k_base: GPT-4o family
    #[default]
    O200kBase,
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    Cl100kBase,
    /// p50k_base: Codex, text-davinci-002/003
    P50kBase,
    /// p50k_edit: edit models
    P50kEdit,
    /// r50k_base: GPT-3 (aka gpt2)
    R50kBase,
}

impl Encoding {
    /// All encodings, default first.
    pub fn all() -> &'static [Encoding] {
        &[
            Encoding::O200kBase,
            Encoding::Cl100kBase,
            Encoding::P50kBase,
            Encoding::P50kEdit,
            Encoding::R50kBase,
        ]
    }

    /// Resolve a configured encoding or model name.
    ///
    /// Unrecognized names fall back to the default encoding.
    pub fn resolve(name: &str) -> Encoding {
        match name.parse() {
            Ok(encoding) => encoding,
            Err(err) => {
                warn!(%err, fallback = %Encoding::default(), "using fallback token encoding");
                Encoding::default()
            }
        }
    }

    /// Canonical tiktoken name.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::O200kBase => "o200k_base",
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::P50kBase => "p50k_base",
            Encoding::P50kEdit => "p50k_edit",
            Encoding::R50kBase => "r50k_base",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }

    fn load(self) -> Option<CoreBPE> {
        let loaded = match self {
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::P50kBase => tiktoken_rs::p50k_base(),
            Encoding::P50kEdit => tiktoken_rs::p50k_edit(),
            Encoding::R50kBase => tiktoken_rs::r50k_base(),
        };
        match loaded {
            Ok(bpe) => Some(bpe),
            Err(err) => {
                warn!(encoding = self.name(), error = %err, "tokenizer unavailable, estimating");
                None
            }
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if let Some(encoding) = Encoding::all().iter().find(|e| e.name() == wanted) {
            return Ok(*encoding);
        }
        match wanted.as_str() {
            "o200k" | "gpt-4o" | "gpt-4o-mini" | "o1" | "o3" => Ok(Encoding::O200kBase),
            "cl100k" | "gpt-4" | "gpt-4-turbo" | "gpt-3.5-turbo" => Ok(Encoding::Cl100kBase),
            "p50k" | "text-davinci-003" | "code-davinci-002" => Ok(Encoding::P50kBase),
            "text-davinci-edit-001" => Ok(Encoding::P50kEdit),
            "r50k" | "gpt2" | "davinci" => Ok(Encoding::R50kBase),
            _ => Err(format!("unknown tokenizer model: {}", s)),
        }
    }
}

// One lazily loaded tokenizer per encoding, indexed by `Encoding::slot`.
static TOKENIZERS: [OnceLock<Option<CoreBPE>>; 5] = [
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
];

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    TOKENIZERS[encoding.slot()]
        .get_or_init(|| encoding.load())
        .as_ref()
}

/// Estimate used when a tokenizer cannot be loaded: 4 bytes per token.
fn fallback_count(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Count tokens in text using the default encoding (o200k_base).
///
/// Never fails; falls back to a heuristic if the encoding is unavailable.
///
/// # Examples
///
/// ```
/// use cmdc::tokens::count_tokens;
///
/// assert!(count_tokens("Hello, world!") > 0);
/// assert_eq!(count_tokens(""), 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

/// Count tokens in text using the specified encoding.
pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    if text.is_empty() {
        return 0;
    }
    match tokenizer(encoding) {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => fallback_count(text),
    }
}

/// Count tokens keyed by a configured model or encoding name.
///
/// ```
/// use cmdc::tokens::count_tokens_for_model;
///
/// assert!(count_tokens_for_model("Test text", "invalid_encoding") > 0);
/// ```
pub fn count_tokens_for_model(text: &str, model: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::resolve(model))
}

/// Reusable token counter bound to one encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    encoding: Encoding,
}

impl TokenCounter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    /// Counter for a configured model name, falling back to the default.
    pub fn for_model(model: &str) -> Self {
        Self::new(Encoding::resolve(model))
    }

    pub fn count(&self, text: &str) -> usize {
        count_tokens_with_encoding(text, self.encoding)
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}
