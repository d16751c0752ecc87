//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file.
//! Neither keys nor passphrases are ever written here.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::crypto::{
    KeyDerivationParams, KeyPolicy, PassphraseProfile, DEFAULT_PEPPER, DEFAULT_SILENT_ITERATIONS,
};
use crate::error::{Result, VaultError};

/// Which key policy the installation uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyKind {
    /// Key from the owner id and a pepper; no user action required
    #[default]
    Silent,
    /// Key from a user passphrase; lost passphrase means lost data
    Passphrase,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Key policy for new sessions
    pub policy: PolicyKind,
    /// Per-installation pepper for the silent policy (defaults to the built-in one)
    pub pepper: Option<String>,
    /// PBKDF2 rounds for the silent policy
    pub silent_iterations: u32,
    /// Remember the passphrase in the OS keychain (explicit opt-in)
    pub remember_passphrase: bool,
    /// Argon2id parameters for new passphrase profiles
    pub kdf: KeyDerivationParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            policy: PolicyKind::Silent,
            pepper: None,
            silent_iterations: DEFAULT_SILENT_ITERATIONS,
            remember_passphrase: false,
            kdf: KeyDerivationParams::default(),
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective silent-policy pepper
    pub fn effective_pepper(&self) -> &str {
        self.pepper.as_deref().unwrap_or(DEFAULT_PEPPER)
    }

    /// Build the key policy these settings select
    ///
    /// The passphrase policy needs the account's persisted profile.
    pub fn key_policy(&self, profile: Option<PassphraseProfile>) -> Result<KeyPolicy> {
        match self.policy {
            PolicyKind::Silent => Ok(KeyPolicy::Silent {
                pepper: self.effective_pepper().to_string(),
                iterations: self.silent_iterations,
            }),
            PolicyKind::Passphrase => profile.map(KeyPolicy::Passphrase).ok_or_else(|| {
                VaultError::InvalidInput(
                    "Passphrase policy selected but no passphrase profile was provided".to_string(),
                )
            }),
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Create a settings manager in the default config directory
    pub fn new() -> Result<Self> {
        let dir = Self::default_dir()?;
        std::fs::create_dir_all(&dir)?;
        Self::with_dir(&dir)
    }

    /// Create a settings manager for a specific directory
    ///
    /// A missing file means defaults. A file that exists but cannot be read
    /// is an error, since falling back would silently switch key policy.
    pub fn with_dir(storage_dir: &Path) -> Result<Self> {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file)?;

        Ok(Self {
            settings_file,
            settings,
        })
    }

    /// Get the default config directory
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "account-vault", "account-vault")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                VaultError::StorageError("Could not determine config directory".to_string())
            })
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            warn!("Settings file {:?} is invalid: {}", path, e);
            VaultError::SerializationError(e)
        })?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Get mutable settings
    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        self.settings = settings;
        self.save().await
    }

    /// Switch key policy and save
    pub async fn set_policy(&mut self, policy: PolicyKind) -> Result<()> {
        self.settings.policy = policy;
        self.save().await
    }

    /// Opt in or out of remembering the passphrase, and save
    pub async fn set_remember_passphrase(&mut self, remember: bool) -> Result<()> {
        self.settings.remember_passphrase = remember;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = Settings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file)
                .await
                .map_err(|e| VaultError::StorageError(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::with_dir(temp_dir.path()).unwrap();

        let settings = manager.get();
        assert_eq!(settings.policy, PolicyKind::Silent);
        assert!(!settings.remember_passphrase);
        assert_eq!(settings.effective_pepper(), DEFAULT_PEPPER);
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = SettingsManager::with_dir(temp_dir.path()).unwrap();
            manager.get_mut().pepper = Some("install-7f3a".to_string());
            manager.set_policy(PolicyKind::Passphrase).await.unwrap();
            manager.set_remember_passphrase(true).await.unwrap();
        }

        {
            let manager = SettingsManager::with_dir(temp_dir.path()).unwrap();
            assert_eq!(manager.get().policy, PolicyKind::Passphrase);
            assert!(manager.get().remember_passphrase);
            assert_eq!(manager.get().effective_pepper(), "install-7f3a");
        }
    }

    #[tokio::test]
    async fn test_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::with_dir(temp_dir.path()).unwrap();
        manager.set_policy(PolicyKind::Passphrase).await.unwrap();

        manager.reset().await.unwrap();
        assert_eq!(manager.get(), &Settings::default());
        assert!(!temp_dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("settings.json"),
            r#"{"policy":"passphrase","pepper":"install-7f3a""#,
        )
        .unwrap();

        let result = SettingsManager::with_dir(temp_dir.path());
        assert!(matches!(result, Err(VaultError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_unknown_policy_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("settings.json"), r#"{"policy":"quiet"}"#).unwrap();

        assert!(SettingsManager::with_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"policy":"passphrase"}"#).unwrap();
        assert_eq!(settings.policy, PolicyKind::Passphrase);
        assert_eq!(settings.silent_iterations, DEFAULT_SILENT_ITERATIONS);
    }

    #[test]
    fn test_key_policy_selection() {
        let mut settings = Settings::new();
        settings.pepper = Some("install-pepper".to_string());

        let policy = settings.key_policy(None).unwrap();
        assert_eq!(policy, KeyPolicy::silent_with_pepper("install-pepper"));

        settings.policy = PolicyKind::Passphrase;
        assert!(matches!(settings.key_policy(None), Err(VaultError::InvalidInput(_))));

        let profile = PassphraseProfile::generate("u1", crate::crypto::fast_params());
        assert!(settings.key_policy(Some(profile)).unwrap().requires_passphrase());
    }
}
