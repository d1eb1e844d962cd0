// Encrypted on-disk token storage for the CLI
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto;
use crate::error::Result;
use crate::gmail::auth::OAuthToken;

const TOKEN_FILE: &str = "token.enc";
const KEY_FILE: &str = "encryption.key";

pub struct TokenStore {
    dir: PathBuf,
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store inside the user config directory
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::config::config_dir()?))
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    /// Existing key, or a fresh one written on first use
    fn key(&self) -> Result<String> {
        let path = self.key_path();
        if path.exists() {
            return Ok(fs::read_to_string(&path)?.trim().to_string());
        }

        fs::create_dir_all(&self.dir)?;
        let key = crypto::generate_key();
        fs::write(&path, &key)?;
        restrict_permissions(&path)?;
        tracing::info!("Generated new encryption key at {}", path.display());
        Ok(key)
    }

    pub fn load(&self) -> Result<Option<OAuthToken>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }

        let encrypted = fs::read_to_string(&path)?;
        let json = crypto::decrypt(&encrypted, &self.key()?)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save(&self, token: &OAuthToken) -> Result<()> {
        let key = self.key()?;
        let json = serde_json::to_string(token)?;
        let path = self.token_path();
        fs::write(&path, crypto::encrypt(&json, &key)?)?;
        restrict_permissions(&path)?;
        tracing::debug!("Saved credentials to {}", path.display());
        Ok(())
    }

    /// Remove the stored token; the key file is kept for the next login.
    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn token() -> OAuthToken {
        OAuthToken {
            access_token: "ya29.access".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: None,
            scope: Some("gmail.readonly".to_string()),
        }
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        assert_eq!(store.load().unwrap(), None);

        store.save(&token()).unwrap();
        assert_eq!(store.load().unwrap(), Some(token()));

        let raw = fs::read_to_string(dir.path().join(TOKEN_FILE)).unwrap();
        assert!(!raw.contains("ya29.access"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(dir.path().join(KEY_FILE).exists());
    }

    #[test]
    fn test_foreign_key_cannot_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.save(&token()).unwrap();

        fs::write(dir.path().join(KEY_FILE), crypto::generate_key()).unwrap();
        assert!(matches!(store.load(), Err(AppError::Crypto(_))));
    }
}
