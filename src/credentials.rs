//! Credential lookup: provider identifier → API key, endpoint and model.
//!
//! The extraction pipeline only ever reads credentials through
//! [`CredentialStore`]. Three stores ship with the crate:
//!
//! | Store | Source | Typical use |
//! |-------|--------|-------------|
//! | [`MemoryCredentialStore`] | in-process map | tests, embedding hosts |
//! | [`EnvCredentialStore`]    | `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`, … | CI, shell use |
//! | [`FileCredentialStore`]   | JSON settings file | the `finstat` CLI |

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provider used when nothing else has been selected.
pub const DEFAULT_ACTIVE_PROVIDER: &str = "gemini";

/// Everything needed to build a model handle for one provider.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl ProviderCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Read-only credential lookup.
///
/// Implementations return `None` when the provider has no usable API key;
/// a record with a blank key counts as absent.
pub trait CredentialStore: Send + Sync {
    fn get_credentials(&self, provider: &str) -> Option<ProviderCredentials>;
}

fn provider_key(provider: &str) -> String {
    provider.trim().to_lowercase()
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Credentials held in a map, keyed by lower-cased provider id.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: BTreeMap<String, ProviderCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: &str, credentials: ProviderCredentials) -> Self {
        self.insert(provider, credentials);
        self
    }

    pub fn insert(&mut self, provider: &str, credentials: ProviderCredentials) {
        self.entries.insert(provider_key(provider), credentials);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_credentials(&self, provider: &str) -> Option<ProviderCredentials> {
        self.entries
            .get(&provider_key(provider))
            .filter(|c| c.has_key())
            .cloned()
    }
}

// ── Environment ──────────────────────────────────────────────────────────

/// Reads `{PROVIDER}_API_KEY`, `{PROVIDER}_BASE_URL` and `{PROVIDER}_MODEL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn get_credentials(&self, provider: &str) -> Option<ProviderCredentials> {
        let prefix = provider.trim().to_uppercase();
        let var = |suffix: &str| {
            std::env::var(format!("{prefix}_{suffix}"))
                .ok()
                .filter(|v| !v.trim().is_empty())
        };
        let credentials = ProviderCredentials {
            api_key: var("API_KEY")?,
            base_url: var("BASE_URL"),
            model_name: var("MODEL"),
        };
        debug!("Using {prefix}_API_KEY from environment");
        Some(credentials)
    }
}

// ── JSON settings file ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_provider: Option<String>,
    #[serde(default)]
    providers: BTreeMap<String, ProviderCredentials>,
}

/// Credentials persisted in a JSON settings file.
///
/// Saving a key also makes its provider the active one, so a freshly
/// configured provider is picked up without further flags.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    settings: SettingsFile,
}

impl FileCredentialStore {
    /// Load the settings file, or start empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref().to_path_buf();
        let settings = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                ExtractError::InvalidConfig(format!(
                    "credentials file '{}' is not valid JSON: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsFile::default(),
            Err(e) => {
                return Err(ExtractError::InvalidConfig(format!(
                    "cannot read credentials file '{}': {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The provider selected most recently, or [`DEFAULT_ACTIVE_PROVIDER`].
    pub fn active_provider(&self) -> &str {
        self.settings
            .active_provider
            .as_deref()
            .unwrap_or(DEFAULT_ACTIVE_PROVIDER)
    }

    pub fn set_active_provider(&mut self, provider: &str) {
        self.settings.active_provider = Some(provider_key(provider));
    }

    /// Store (or replace) a provider's credentials and mark it active.
    pub fn save_credentials(&mut self, provider: &str, credentials: ProviderCredentials) {
        self.settings
            .providers
            .insert(provider_key(provider), credentials);
        self.set_active_provider(provider);
    }

    /// Write the settings back to disk atomically (temp file + rename).
    pub fn persist(&self) -> Result<(), ExtractError> {
        let write_err = |source| ExtractError::OutputWriteFailed {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)
            .map_err(|e| ExtractError::Internal(format!("serialise credentials: {e}")))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_credentials(&self, provider: &str) -> Option<ProviderCredentials> {
        self.settings
            .providers
            .get(&provider_key(provider))
            .filter(|c| c.has_key())
            .cloned()
    }
}
