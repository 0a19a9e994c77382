use crate::{api::Backend, categories::CategorySet, config::Config, error::ValidationError};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct FormSettings {
    pub confidence_threshold: u32,
    pub categories: CategorySet,
    pub classification_prompt: String,
    pub source: &'static str,
}

impl FormSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ValidationError> {
        Ok(Self {
            confidence_threshold: cfg.defaults.confidence_threshold,
            categories: CategorySet::from_labels(&cfg.defaults.categories)?,
            classification_prompt: cfg.defaults.classification_prompt.clone(),
            source: "config",
        })
    }
}

/// Ask the backend for its defaults, falling back to the config when it is
/// unreachable. Missing fields in the response also fall back per field.
pub async fn load_settings<B: Backend + ?Sized>(
    cfg: &Config,
    backend: &B,
) -> Result<FormSettings, ValidationError> {
    let fallback = FormSettings::from_config(cfg)?;
    match backend.settings().await {
        Ok(remote) => {
            let categories = remote
                .categories
                .and_then(|c| CategorySet::from_labels(c).ok())
                .unwrap_or_else(|| fallback.categories.clone());
            info!("settings loaded from backend");
            Ok(FormSettings {
                confidence_threshold: remote
                    .confidence_threshold
                    .filter(|t| *t <= 100)
                    .unwrap_or(fallback.confidence_threshold),
                categories,
                classification_prompt: remote
                    .classification_prompt
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or(fallback.classification_prompt),
                source: "backend",
            })
        }
        Err(err) => {
            warn!("could not load settings from backend, using config defaults: {err}");
            Ok(fallback)
        }
    }
}
