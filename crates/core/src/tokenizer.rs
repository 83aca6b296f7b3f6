//! Tokenizer registry: named tokenizers with lazy, idempotent construction.
//!
//! Built around a `Tokenizer` trait extended with byte offsets (needed by
//! the chunker's `tokens` strategy) and a process-wide registry with
//! `register`/`unregister`/`has`/`create`/`resolve` operations.

use crate::error::{IndexError, Result};
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

pub struct TokenOffset {
    pub start: usize,
    pub end: usize,
}

pub struct Encoded {
    pub tokens: Vec<u32>,
    pub count: usize,
    pub offsets: Option<Vec<TokenOffset>>,
}

pub trait Tokenizer: Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> Option<&str> {
        None
    }
    fn count(&self, text: &str) -> usize;
    /// Default encode derives one token per byte-offset word boundary; real
    /// tokenizers override this with their own encoding.
    fn encode(&self, text: &str) -> Encoded {
        Encoded { tokens: Vec::new(), count: self.count(text), offsets: None }
    }
    fn max_tokens(&self) -> Option<usize> {
        None
    }
}

/// Splits on unicode-letter runs, unicode-digit runs, or single non-whitespace
/// characters, reporting byte offsets for each token — the `tokens` chunking
/// strategy relies on these offsets when the tokenizer doesn't expose its own.
pub struct BasicTokenizer;

impl Tokenizer for BasicTokenizer {
    fn id(&self) -> &str {
        "basic"
    }

    fn count(&self, text: &str) -> usize {
        self.encode(text).count
    }

    fn encode(&self, text: &str) -> Encoded {
        let mut offsets = Vec::new();
        let bytes = text.as_bytes();
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut ci = 0;
        while ci < chars.len() {
            let (start, c) = chars[ci];
            if c.is_whitespace() {
                ci += 1;
                continue;
            }
            let class_word = c.is_alphabetic();
            let class_digit = c.is_numeric();
            let mut end_ci = ci + 1;
            if class_word {
                while end_ci < chars.len() && chars[end_ci].1.is_alphabetic() {
                    end_ci += 1;
                }
            } else if class_digit {
                while end_ci < chars.len() && chars[end_ci].1.is_numeric() {
                    end_ci += 1;
                }
            }
            let end = if end_ci < chars.len() { chars[end_ci].0 } else { bytes.len() };
            offsets.push(TokenOffset { start, end });
            ci = end_ci;
        }
        let count = offsets.len();
        Encoded { tokens: Vec::new(), count, offsets: Some(offsets) }
    }
}

#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    fn try_new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| IndexError::TokenizerUnavailable {
            id: "tiktoken".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn id(&self) -> &str {
        "tiktoken"
    }

    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn encode(&self, text: &str) -> Encoded {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let count = tokens.len();
        Encoded { tokens, count, offsets: None }
    }
}

type Factory = Box<dyn Fn() -> Result<Arc<dyn Tokenizer>> + Send + Sync>;

/// Process-wide registry. `register`/`create`/`resolve` are idempotent and
/// thread-safe; built-ins are lazily installed on first use of the global
/// instance via [`registry`].
pub struct TokenizerRegistry {
    factories: DashMap<String, Factory>,
    instances: DashMap<String, Arc<dyn Tokenizer>>,
}

impl TokenizerRegistry {
    pub fn new() -> Self {
        let registry = Self { factories: DashMap::new(), instances: DashMap::new() };
        registry.register("basic", || Ok(Arc::new(BasicTokenizer) as Arc<dyn Tokenizer>));
        #[cfg(feature = "tiktoken")]
        registry.register("tiktoken", || {
            TiktokenTokenizer::try_new().map(|t| Arc::new(t) as Arc<dyn Tokenizer>)
        });
        registry
    }

    pub fn register(&self, id: &str, factory: impl Fn() -> Result<Arc<dyn Tokenizer>> + Send + Sync + 'static) {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn unregister(&self, id: &str) {
        self.factories.remove(id);
        self.instances.remove(id);
    }

    pub fn has(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Constructs (or returns the cached instance of) the tokenizer named `id`.
    pub fn create(&self, id: &str) -> Result<Arc<dyn Tokenizer>> {
        if let Some(existing) = self.instances.get(id) {
            return Ok(existing.clone());
        }
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| IndexError::TokenizerUnavailable { id: id.to_string(), reason: "not registered".to_string() })?;
        let instance = factory()?;
        self.instances.insert(id.to_string(), instance.clone());
        Ok(instance)
    }

    /// Create-or-auto-register: known backend names not yet registered are
    /// registered on demand, then created. Unknown ids fail immediately.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Tokenizer>> {
        if !self.has(id) {
            return Err(IndexError::TokenizerUnavailable {
                id: id.to_string(),
                reason: "unknown tokenizer id".to_string(),
            });
        }
        self.create(id)
    }
}

impl Default for TokenizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<TokenizerRegistry> = OnceLock::new();

pub fn registry() -> &'static TokenizerRegistry {
    GLOBAL_REGISTRY.get_or_init(TokenizerRegistry::new)
}
