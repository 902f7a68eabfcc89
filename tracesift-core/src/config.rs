use crate::ai_provider::{api_key_env_var, ProviderOptions};
use crate::error::TriageError;
use crate::filter::TruncationPolicy;
use crate::prompts::PromptTemplate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-5.2";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONTEXT: usize = 40;
pub const DEFAULT_MAX_FILTERED_LINES: usize = 20_000;
pub const DEFAULT_CHUNK_SIZE: usize = 20_000;
pub const DEFAULT_MAX_PARALLEL_CHUNKS: usize = 1;

const PROJECT_CONFIG_FILE: &str = ".tracesift.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub defaults: DefaultConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub openai: Option<ProviderSettings>,
    pub openrouter: Option<ProviderSettings>,
    pub claude: Option<ProviderSettings>,
    pub anthropic: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub timeout: Option<u64>,
    pub temperature: Option<f32>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Fills every unset field from `other`.
    fn fill_from(&mut self, other: &ProviderSettings) {
        fill(&mut self.model, &other.model);
        fill(&mut self.timeout, &other.timeout);
        fill(&mut self.temperature, &other.temperature);
        fill(&mut self.api_key, &other.api_key);
        fill(&mut self.base_url, &other.base_url);
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, default: &Option<T>) {
    if slot.is_none() {
        *slot = default.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub provider: Option<String>,
    pub context: Option<usize>,
    pub max_filtered_lines: Option<usize>,
    pub chunk_size: Option<usize>,
    pub truncation: Option<TruncationPolicy>,
    pub max_parallel_chunks: Option<usize>,
}

impl Config {
    /// Built-in settings: every provider present with the stock model.
    pub fn builtin() -> Self {
        let stock = |model: &str| {
            Some(ProviderSettings {
                model: Some(model.to_string()),
                timeout: Some(DEFAULT_TIMEOUT_SECS),
                temperature: Some(DEFAULT_TEMPERATURE),
                api_key: None,
                base_url: None,
            })
        };
        Self {
            providers: ProviderConfig {
                openai: stock(DEFAULT_MODEL),
                openrouter: stock("openai/gpt-5.2"),
                claude: stock("claude-sonnet-4-5"),
                anthropic: None,
            },
            defaults: DefaultConfig {
                provider: Some(DEFAULT_PROVIDER.to_string()),
                context: Some(DEFAULT_CONTEXT),
                max_filtered_lines: Some(DEFAULT_MAX_FILTERED_LINES),
                chunk_size: Some(DEFAULT_CHUNK_SIZE),
                truncation: Some(TruncationPolicy::Head),
                max_parallel_chunks: Some(DEFAULT_MAX_PARALLEL_CHUNKS),
            },
        }
    }

    /// Loads the first config file found, falling back to built-in settings.
    ///
    /// A file that fails to parse is reported and ignored.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::get_config_path() {
            match Self::load_from_path(&config_path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring config file {}: {:#}", config_path.display(), e),
            }
        }
        Ok(Self::builtin())
    }

    /// Loads `path` strictly; missing keys are filled from the built-in settings.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.merge_with_defaults(&Self::builtin());
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Priority: `flag` > environment variable > config file > None.
    pub fn get_api_key(&self, provider: &str, flag: Option<&str>) -> Option<String> {
        let from_env = env::var(api_key_env_var(provider)).ok();
        let from_file = self.get_provider_settings(provider).and_then(|p| p.api_key.clone());
        resolve_api_key(flag.map(str::to_string), from_env, from_file)
    }

    pub fn get_provider_settings(&self, provider: &str) -> Option<&ProviderSettings> {
        match provider.to_lowercase().as_str() {
            "openai" => self.providers.openai.as_ref(),
            "openrouter" => self.providers.openrouter.as_ref(),
            "claude" | "anthropic" => self
                .providers
                .claude
                .as_ref()
                .or(self.providers.anthropic.as_ref()),
            _ => None,
        }
    }

    pub fn get_default_provider(&self) -> String {
        self.defaults
            .provider
            .as_deref()
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string()
    }

    /// Provider options from the file, with `model`/`temperature` overrides on top.
    pub fn provider_options(
        &self,
        provider: &str,
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> ProviderOptions {
        let settings = self.get_provider_settings(provider);
        let mut options = ProviderOptions::default();
        if let Some(settings) = settings {
            if let Some(ref m) = settings.model {
                options.model = m.clone();
            }
            if let Some(t) = settings.temperature {
                options.temperature = t;
            }
            if let Some(timeout) = settings.timeout {
                options.timeout_secs = timeout;
            }
            options.base_url = settings.base_url.clone();
        }
        if let Some(m) = model {
            options.model = m.to_string();
        }
        if let Some(t) = temperature {
            options.temperature = t;
        }
        options
    }

    fn get_config_path() -> Option<PathBuf> {
        if let Ok(current_dir) = env::current_dir() {
            let project_config = current_dir.join(PROJECT_CONFIG_FILE);
            if project_config.exists() {
                return Some(project_config);
            }
        }

        if let Some(config_dir) = user_config_path() {
            if config_dir.exists() {
                return Some(config_dir);
            }
        }

        None
    }

    fn merge_with_defaults(&mut self, defaults: &Config) {
        // [providers.anthropic] is another name for [providers.claude]
        if let Some(alias) = self.providers.anthropic.take() {
            match self.providers.claude.as_mut() {
                Some(claude) => claude.fill_from(&alias),
                None => self.providers.claude = Some(alias),
            }
        }

        for (mine, theirs) in [
            (&mut self.providers.openai, &defaults.providers.openai),
            (&mut self.providers.openrouter, &defaults.providers.openrouter),
            (&mut self.providers.claude, &defaults.providers.claude),
        ] {
            match (mine.as_mut(), theirs) {
                (Some(settings), Some(stock)) => settings.fill_from(stock),
                (None, _) => *mine = theirs.clone(),
                _ => {}
            }
        }

        let d = &mut self.defaults;
        fill(&mut d.provider, &defaults.defaults.provider);
        fill(&mut d.context, &defaults.defaults.context);
        fill(&mut d.max_filtered_lines, &defaults.defaults.max_filtered_lines);
        fill(&mut d.chunk_size, &defaults.defaults.chunk_size);
        fill(&mut d.truncation, &defaults.defaults.truncation);
        fill(&mut d.max_parallel_chunks, &defaults.defaults.max_parallel_chunks);
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("tracesift").join("config.toml"))
}

/// Picks the first present, non-blank key: flag, then environment, then file.
fn resolve_api_key(
    flag: Option<String>,
    from_env: Option<String>,
    from_file: Option<String>,
) -> Option<String> {
    [flag, from_env, from_file]
        .into_iter()
        .flatten()
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}

/// Splits a comma-separated service list, trimming entries and dropping
/// empty ones. Order and duplicates are preserved.
pub fn parse_target_services(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings for one triage run. Build with [`TriageConfig::builder`].
#[derive(Debug, Clone)]
pub struct TriageConfig {
    target_services: Vec<String>,
    context_lines: usize,
    max_filtered_lines: usize,
    truncation: TruncationPolicy,
    chunk_size: usize,
    provider: String,
    provider_options: ProviderOptions,
    analysis_template: PromptTemplate,
    synthesis_template: PromptTemplate,
    max_parallel_chunks: usize,
}

impl TriageConfig {
    pub fn builder<I, S>(target_services: I) -> TriageConfigBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TriageConfigBuilder::new(target_services)
    }

    pub fn target_services(&self) -> &[String] {
        &self.target_services
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    pub fn max_filtered_lines(&self) -> usize {
        self.max_filtered_lines
    }

    pub fn truncation(&self) -> TruncationPolicy {
        self.truncation
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn provider_options(&self) -> &ProviderOptions {
        &self.provider_options
    }

    pub fn model(&self) -> &str {
        &self.provider_options.model
    }

    pub fn temperature(&self) -> f32 {
        self.provider_options.temperature
    }

    pub fn analysis_template(&self) -> &PromptTemplate {
        &self.analysis_template
    }

    pub fn synthesis_template(&self) -> &PromptTemplate {
        &self.synthesis_template
    }

    pub fn max_parallel_chunks(&self) -> usize {
        self.max_parallel_chunks
    }

    /// Target services joined for display, or `(none)`.
    pub fn target_services_display(&self) -> String {
        if self.target_services.is_empty() {
            "(none)".to_string()
        } else {
            self.target_services.join(", ")
        }
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if self.target_services.iter().all(|s| s.trim().is_empty()) {
            return Err(TriageError::configuration(
                "at least one target service is required",
            ));
        }
        let t = self.provider_options.temperature;
        if !(0.0..=1.0).contains(&t) {
            return Err(TriageError::configuration(format!(
                "temperature must be between 0 and 1, got {}",
                t
            )));
        }
        if self.max_filtered_lines == 0 {
            return Err(TriageError::configuration(
                "max filtered lines must be a positive integer",
            ));
        }
        if self.max_parallel_chunks == 0 {
            return Err(TriageError::configuration(
                "max parallel chunks must be at least 1",
            ));
        }
        if self.provider_options.model.trim().is_empty() {
            return Err(TriageError::configuration("model must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TriageConfigBuilder {
    config: TriageConfig,
}

impl TriageConfigBuilder {
    fn new<I, S>(target_services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            config: TriageConfig {
                target_services: target_services.into_iter().map(Into::into).collect(),
                context_lines: DEFAULT_CONTEXT,
                max_filtered_lines: DEFAULT_MAX_FILTERED_LINES,
                truncation: TruncationPolicy::default(),
                chunk_size: DEFAULT_CHUNK_SIZE,
                provider: DEFAULT_PROVIDER.to_string(),
                provider_options: ProviderOptions::default(),
                analysis_template: PromptTemplate::default_analysis(),
                synthesis_template: PromptTemplate::default_synthesis(),
                max_parallel_chunks: DEFAULT_MAX_PARALLEL_CHUNKS,
            },
        }
    }

    /// Seeds the numeric knobs from the `[defaults]` section of a config file.
    pub fn file_defaults(mut self, defaults: &DefaultConfig) -> Self {
        let c = &mut self.config;
        if let Some(v) = defaults.context {
            c.context_lines = v;
        }
        if let Some(v) = defaults.max_filtered_lines {
            c.max_filtered_lines = v;
        }
        if let Some(v) = defaults.chunk_size {
            c.chunk_size = v;
        }
        if let Some(v) = defaults.truncation {
            c.truncation = v;
        }
        if let Some(v) = defaults.max_parallel_chunks {
            c.max_parallel_chunks = v;
        }
        if let Some(ref v) = defaults.provider {
            c.provider = v.clone();
        }
        self
    }

    pub fn context_lines(mut self, radius: usize) -> Self {
        self.config.context_lines = radius;
        self
    }

    pub fn max_filtered_lines(mut self, max: usize) -> Self {
        self.config.max_filtered_lines = max;
        self
    }

    pub fn truncation(mut self, policy: TruncationPolicy) -> Self {
        self.config.truncation = policy;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into();
        self
    }

    pub fn provider_options(mut self, options: ProviderOptions) -> Self {
        self.config.provider_options = options;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.provider_options.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.provider_options.temperature = temperature;
        self
    }

    pub fn analysis_template(mut self, template: PromptTemplate) -> Self {
        self.config.analysis_template = template;
        self
    }

    pub fn synthesis_template(mut self, template: PromptTemplate) -> Self {
        self.config.synthesis_template = template;
        self
    }

    pub fn max_parallel_chunks(mut self, n: usize) -> Self {
        self.config.max_parallel_chunks = n;
        self
    }

    pub fn build(self) -> Result<TriageConfig, TriageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
