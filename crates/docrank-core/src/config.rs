//! Layered configuration and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_LEXICAL__THRESHOLD_RATIO`).
//! Typed [`Settings`] carry the tuning constants of every pipeline stage.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Loads the config files found in `dir`; missing files are skipped.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    /// Builds a config from an explicit figment, mainly for tests.
    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the typed settings; absent keys take defaults.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolves a configured path against the directory the config was loaded from.
    pub fn resolve(&self, p: &str) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub lexical: LexicalSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub finance: FinanceSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be greater than 0".into()));
        }
        if c.min_length >= c.max_chars {
            return Err(Error::InvalidConfig(format!(
                "chunking.min_length ({}) must be less than chunking.max_chars ({})",
                c.min_length, c.max_chars
            )));
        }
        if self.lexical.threshold_ratio <= 0.0 {
            return Err(Error::InvalidConfig("lexical.threshold_ratio must be positive".into()));
        }
        if self.finance.max_images == 0 {
            return Err(Error::InvalidConfig("finance.max_images must be greater than 0".into()));
        }
        if self.retrieval.faq_top_k == 0 || self.retrieval.insurance_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval top_k values must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Input and output locations, relative to the config directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub questions: String,
    pub faq_source: String,
    pub insurance_dir: String,
    pub finance_dir: String,
    pub finance_rewrites: Option<String>,
    pub judge_responses: Option<String>,
    pub output: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            questions: "data/questions.json".to_string(),
            faq_source: "data/faq/pid_map_content.json".to_string(),
            insurance_dir: "data/insurance".to_string(),
            finance_dir: "data/finance/pages".to_string(),
            finance_rewrites: None,
            judge_responses: None,
            output: "data/pred/answers.json".to_string(),
        }
    }
}

/// Header chunking and length splitting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunks whose content has fewer characters are dropped.
    pub min_length: usize,
    /// Target upper bound for split chunks, in characters.
    pub max_chars: usize,
    /// Header lines end at least this far left of the majority right edge.
    pub header_margin: f32,
    /// A first line shorter than this fraction of the majority height is a running header.
    pub running_header_ratio: f32,
    pub sentence_terminals: Vec<char>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_chars: 512,
            header_margin: 30.0,
            running_header_ratio: 0.90,
            sentence_terminals: vec!['。'],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalSettings {
    /// Fraction of the rank-2 score a candidate must exceed to be shortlisted.
    pub threshold_ratio: f32,
}

impl Default for LexicalSettings {
    fn default() -> Self { Self { threshold_ratio: 0.30 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub passage_prefix: String,
    pub query_prefix: String,
    pub max_len: usize,
    pub model_dir: Option<String>,
    pub cache_path: Option<String>,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            passage_prefix: "passage:".to_string(),
            query_prefix: "query: ".to_string(),
            max_len: 512,
            model_dir: None,
            cache_path: None,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub faq_top_k: usize,
    pub insurance_top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { faq_top_k: 1, insurance_top_k: 1 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceSettings {
    /// Upper bound on page images sent to the judge.
    pub max_images: usize,
    pub image_dir: String,
    pub image_extension: String,
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            max_images: 12,
            image_dir: "data/finance/images".to_string(),
            image_extension: "jpg".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.chunking.min_length, 8);
        assert_eq!(settings.chunking.max_chars, 512);
        assert!((settings.lexical.threshold_ratio - 0.30).abs() < f32::EPSILON);
        assert_eq!(settings.finance.max_images, 12);
        assert_eq!(settings.embedding.passage_prefix, "passage:");
        assert_eq!(settings.embedding.query_prefix, "query: ");
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let figment = Figment::new().merge(Toml::string(
            "[chunking]\nmax_chars = 256\n[lexical]\nthreshold_ratio = 0.5\n",
        ));
        let config = Config::from_figment(figment, Path::new("/tmp"));
        let settings = config.settings().expect("settings");
        assert_eq!(settings.chunking.max_chars, 256);
        assert_eq!(settings.chunking.min_length, 8, "untouched keys keep defaults");
        assert!((settings.lexical.threshold_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut settings = Settings::default();
        settings.chunking.min_length = 600;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string("[finance]\nmax_images = 0\n"));
        let config = Config::from_figment(figment, Path::new("/tmp"));
        assert!(config.settings().is_err());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/docrank");
        assert_eq!(resolve_with_base(base, "data/q.json"), PathBuf::from("/srv/docrank/data/q.json"));
        assert_eq!(resolve_with_base(base, "/abs/q.json"), PathBuf::from("/abs/q.json"));
    }
}
