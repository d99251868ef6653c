//! Model capability table and local cost estimation

use serde::{Deserialize, Serialize};

/// Characters per estimated token
const CHARS_PER_TOKEN: f64 = 4.0;

/// Static metadata for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Identifier sent to the API (e.g. "gpt-4")
    pub id: String,
    /// Display name (e.g. "GPT-4")
    pub name: String,
    /// One-line description for model pickers
    #[serde(default)]
    pub description: String,
    /// Dollars per 1000 tokens
    pub cost_per_1k: f64,
    /// Ceiling for requested response tokens
    pub max_tokens: u32,
    /// Whether the model accepts function definitions
    #[serde(default)]
    pub supports_functions: bool,
}

impl ModelSpec {
    /// Create a spec without a description
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::completion::catalog::ModelSpec;
    ///
    /// let spec = ModelSpec::new("local", "Local", 0.0, 2048);
    /// assert_eq!(spec.max_tokens, 2048);
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>, cost_per_1k: f64, max_tokens: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            cost_per_1k,
            max_tokens,
            supports_functions: false,
        }
    }

    /// Builder-style description setter
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn with_functions(mut self) -> Self {
        self.supports_functions = true;
        self
    }
}

/// The built-in capability table
pub fn builtin_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("gpt-3.5-turbo", "GPT-3.5 Turbo", 0.0015, 4096)
            .with_description("Fast and efficient for most tasks")
            .with_functions(),
        ModelSpec::new("gpt-4", "GPT-4", 0.03, 8192)
            .with_description("Most capable model for complex tasks")
            .with_functions(),
        ModelSpec::new("gpt-4-turbo", "GPT-4 Turbo", 0.01, 128_000)
            .with_description("Latest GPT-4 with improved speed")
            .with_functions(),
    ]
}

/// Rough token count: one token per four characters
pub fn estimate_tokens(text: &str) -> f64 {
    text.chars().count() as f64 / CHARS_PER_TOKEN
}

/// Capability table plus the default model
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
    default_model: String,
}

impl ModelCatalog {
    /// Build a catalog; table order is kept for display
    pub fn new(models: Vec<ModelSpec>, default_model: impl Into<String>) -> Self {
        Self {
            models,
            default_model: default_model.into(),
        }
    }

    /// Built-in table with `gpt-3.5-turbo` as the default
    pub fn builtin() -> Self {
        Self::new(builtin_models(), "gpt-3.5-turbo")
    }

    /// Catalog described by configuration
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.model_table(), config.chat.default_model.clone())
    }

    /// Every known model in table order
    pub fn available_models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Look up a model by id
    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Whether `id` is in the table
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Id of the default model
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Spec of the default model, if it is in the table
    pub fn default_spec(&self) -> Option<&ModelSpec> {
        self.get(&self.default_model)
    }

    /// Approximate cost of sending `text` to `model`
    ///
    /// Uses [`estimate_tokens`]; unknown models cost 0.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::completion::catalog::ModelCatalog;
    ///
    /// let catalog = ModelCatalog::builtin();
    /// let cost = catalog.estimate_cost("abcd", "gpt-4");
    /// assert!((cost - 0.03 / 1000.0).abs() < 1e-12);
    /// ```
    pub fn estimate_cost(&self, text: &str, model: &str) -> f64 {
        match self.get(model) {
            Some(spec) => estimate_tokens(text) / 1000.0 * spec.cost_per_1k,
            None => 0.0,
        }
    }
}
