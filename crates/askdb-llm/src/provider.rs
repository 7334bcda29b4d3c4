// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;
use url::Url;

use crate::{ApiError, ApiErrorKind, Client};

pub const DEFAULT_HOSTED_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Hosted,
    Local,
}

impl ProviderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Local => "local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hosted" => Some(Self::Hosted),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Backend descriptor supplied by the caller. The config may be
/// re-resolved before every question if settings change in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn hosted(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            kind: ProviderKind::Hosted,
            api_key: api_key.to_owned(),
            base_url: None,
            model: model.to_owned(),
            timeout,
        }
    }

    pub fn local(model: &str, base_url: Option<&str>, timeout: Duration) -> Self {
        Self {
            kind: ProviderKind::Local,
            api_key: String::new(),
            base_url: base_url.map(str::to_owned),
            model: model.to_owned(),
            timeout,
        }
    }

    /// Whether every field the kind requires is populated. A non-ready
    /// config must be rejected before any dispatch.
    pub fn is_ready(&self) -> bool {
        match self.kind {
            ProviderKind::Hosted => {
                !self.api_key.trim().is_empty() && !self.model.trim().is_empty()
            }
            ProviderKind::Local => !self.model.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    MissingCredential,
    MissingModel,
    InvalidCredential(String),
    Unreachable(String),
}

impl ProviderError {
    pub fn message(&self) -> String {
        match self {
            Self::MissingCredential => {
                "api key is required for the hosted provider; set [llm].api_key".to_owned()
            }
            Self::MissingModel => {
                "model name is required for the local provider; set [llm].model".to_owned()
            }
            Self::InvalidCredential(detail) => format!("api key was rejected: {detail}"),
            Self::Unreachable(detail) => format!("provider is unreachable: {detail}"),
        }
    }

    /// Transient failures may be retried by the caller; the resolver
    /// never retries on its own.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ProviderError {}

/// Resolve a config into a usable client. Hosted configs are probed with
/// a model listing so a bad credential surfaces here instead of on the
/// first question; local configs are constructed without any probe.
pub fn resolve(config: &ProviderConfig) -> Result<Client, ProviderError> {
    match config.kind {
        ProviderKind::Hosted => resolve_hosted(config),
        ProviderKind::Local => resolve_local(config),
    }
}

fn resolve_hosted(config: &ProviderConfig) -> Result<Client, ProviderError> {
    if config.api_key.trim().is_empty() {
        return Err(ProviderError::MissingCredential);
    }

    let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_HOSTED_BASE_URL);
    let client = Client::with_api_key(base_url, &config.model, &config.api_key, config.timeout)
        .map_err(|error| ProviderError::Unreachable(error.to_string()))?;

    match client.list_models() {
        Ok(_) => Ok(client),
        Err(error) => match error.downcast_ref::<ApiError>() {
            Some(api) => match api.kind {
                ApiErrorKind::Status(401) | ApiErrorKind::Status(403) => {
                    Err(ProviderError::InvalidCredential(api.to_string()))
                }
                _ => Err(ProviderError::Unreachable(api.to_string())),
            },
            None => Err(ProviderError::Unreachable(error.to_string())),
        },
    }
}

fn resolve_local(config: &ProviderConfig) -> Result<Client, ProviderError> {
    if config.model.trim().is_empty() {
        return Err(ProviderError::MissingModel);
    }

    // Ordered construction strategies: the explicit base URL first, then
    // the default construction without one. A rejected strategy falls
    // through silently.
    if let Some(base_url) = config.base_url.as_deref()
        && Url::parse(base_url).is_ok()
        && let Ok(client) = Client::new(base_url, &config.model, config.timeout)
    {
        return Ok(client);
    }

    Client::new(DEFAULT_LOCAL_BASE_URL, &config.model, config.timeout)
        .map_err(|error| ProviderError::Unreachable(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_LOCAL_BASE_URL, ProviderConfig, ProviderError, ProviderKind, resolve,
    };
    use std::time::Duration;

    fn timeout() -> Duration {
        Duration::from_millis(100)
    }

    #[test]
    fn provider_kind_round_trips() {
        for kind in [ProviderKind::Hosted, ProviderKind::Local] {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("cloud"), None);
    }

    #[test]
    fn hosted_config_readiness_requires_credential() {
        let ready = ProviderConfig::hosted("sk-test", "gpt-4o-mini", timeout());
        assert!(ready.is_ready());

        let missing_key = ProviderConfig::hosted("", "gpt-4o-mini", timeout());
        assert!(!missing_key.is_ready());
    }

    #[test]
    fn local_config_readiness_requires_model_only() {
        let ready = ProviderConfig::local("qwen3", None, timeout());
        assert!(ready.is_ready());

        let missing_model = ProviderConfig::local("  ", None, timeout());
        assert!(!missing_model.is_ready());
    }

    #[test]
    fn hosted_resolve_with_empty_credential_fails_fast_without_probe() {
        // the base URL is unreachable; a probe attempt would classify as
        // Unreachable, so MissingCredential proves nothing was contacted
        let config = ProviderConfig {
            base_url: Some("http://127.0.0.1:1/v1".to_owned()),
            ..ProviderConfig::hosted("", "gpt-4o-mini", timeout())
        };
        assert!(matches!(
            resolve(&config),
            Err(ProviderError::MissingCredential)
        ));
    }

    #[test]
    fn local_resolve_without_model_fails_fast() {
        let config = ProviderConfig::local("", None, timeout());
        assert!(matches!(resolve(&config), Err(ProviderError::MissingModel)));
    }

    #[test]
    fn local_resolve_uses_explicit_base_url_when_valid() {
        let config = ProviderConfig::local("qwen3", Some("http://127.0.0.1:9999/v1"), timeout());
        let client = resolve(&config).expect("local resolution should succeed");
        assert_eq!(client.base_url(), "http://127.0.0.1:9999/v1");
    }

    #[test]
    fn local_resolve_falls_back_to_default_when_base_url_is_rejected() {
        let config = ProviderConfig::local("qwen3", Some("not a url at all"), timeout());
        let client = resolve(&config).expect("fallback construction should succeed");
        assert_eq!(client.base_url(), DEFAULT_LOCAL_BASE_URL);
    }

    #[test]
    fn local_resolve_never_probes_the_network() {
        // an unreachable default endpoint must not fail resolution
        let config = ProviderConfig::local("qwen3", None, timeout());
        assert!(resolve(&config).is_ok());
    }

    #[test]
    fn unreachable_is_the_only_transient_class() {
        assert!(ProviderError::Unreachable("x".to_owned()).is_transient());
        assert!(!ProviderError::MissingCredential.is_transient());
        assert!(!ProviderError::InvalidCredential("x".to_owned()).is_transient());
    }
}
