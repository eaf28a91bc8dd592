// src/catalog.rs — Model catalog fetched from the backend

use std::collections::BTreeMap;

use crate::backend::types::{ModelEntry, ProviderModels};

/// Display-name prefixes dropped in the compact model label.
const SHORT_NAME_PREFIXES: &[&str] = &["Gemini ", "Llama ", "DeepSeek "];

/// One selectable model, flattened out of its provider group.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub provider_key: String,
    pub provider_name: String,
    pub provider_icon: String,
    pub key: String,
    pub name: String,
    pub description: String,
}

impl std::fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.provider_icon, self.name, self.key)?;
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    providers: BTreeMap<String, ProviderModels>,
}

impl ModelCatalog {
    pub fn new(providers: BTreeMap<String, ProviderModels>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.values().all(|p| p.models.is_empty())
    }

    pub fn providers(&self) -> &BTreeMap<String, ProviderModels> {
        &self.providers
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Look a model up by key across all providers.
    pub fn find(&self, key: &str) -> Option<(&ProviderModels, &ModelEntry)> {
        self.providers
            .values()
            .find_map(|p| p.models.get(key).map(|m| (p, m)))
    }

    /// All models in provider order, then key order.
    pub fn choices(&self) -> Vec<ModelChoice> {
        self.providers
            .iter()
            .flat_map(|(provider_key, provider)| {
                provider.models.iter().map(move |(key, model)| ModelChoice {
                    provider_key: provider_key.clone(),
                    provider_name: provider.display_name.clone(),
                    provider_icon: model
                        .icon
                        .clone()
                        .unwrap_or_else(|| provider.icon.clone()),
                    key: key.clone(),
                    name: model.name.clone(),
                    description: model.description.clone(),
                })
            })
            .collect()
    }

    /// Compact label for the selected model; falls back to the key when the
    /// catalog does not know it.
    pub fn label_for(&self, key: &str) -> String {
        match self.find(key) {
            Some((_, model)) => short_name(&model.name),
            None => key.to_string(),
        }
    }
}

pub fn short_name(name: &str) -> String {
    SHORT_NAME_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
        .to_string()
}

/// Text listing grouped by provider, marking the selected model.
pub fn render_catalog(catalog: &ModelCatalog, selected: &str) -> String {
    let mut out = String::new();
    for provider in catalog.providers.values() {
        if provider.models.is_empty() {
            continue;
        }
        out.push_str(&format!("{} {}\n", provider.icon, provider.display_name));
        for (key, model) in &provider.models {
            let marker = if key == selected { "●" } else { " " };
            out.push_str(&format!("  {marker} {:<28} {}", key, model.name));
            if !model.description.is_empty() {
                out.push_str(&format!(" - {}", model.description));
            }
            out.push('\n');
        }
    }
    if out.is_empty() {
        out.push_str("No models available.\n");
    }
    out
}
