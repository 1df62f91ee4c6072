//! API key storage.
//!
//! The Gemini key is read from `GEMINI_API_KEY` first, then from the OS
//! keyring under the `studyroom` service.

use serde::Serialize;

use crate::error::{Result, TutorError};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const API_KEY_ENTRY: &str = "gemini_api_key";

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::Result;

    const SERVICE: &str = "studyroom";

    pub fn get(key: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<()> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Where the API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Env,
    Keyring,
}

/// Pick the environment value if set, otherwise ask `stored`.
pub fn resolve_with<F>(env: Option<String>, stored: F) -> Result<(String, KeySource)>
where
    F: FnOnce() -> Result<Option<String>>,
{
    if let Some(key) = env.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
        return Ok((key, KeySource::Env));
    }
    match stored()? {
        Some(key) if !key.trim().is_empty() => Ok((key.trim().to_string(), KeySource::Keyring)),
        _ => Err(TutorError::MissingApiKey.into()),
    }
}

/// Resolve the Gemini API key from the environment or the keyring.
pub fn api_key() -> Result<(String, KeySource)> {
    resolve_with(std::env::var(API_KEY_ENV).ok(), || {
        keyring_store::get(API_KEY_ENTRY)
    })
}

pub fn store_api_key(key: &str) -> Result<()> {
    keyring_store::set(API_KEY_ENTRY, key.trim())
}

pub fn clear_api_key() -> Result<()> {
    keyring_store::delete(API_KEY_ENTRY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn env_wins_over_keyring() {
        let (key, source) = resolve_with(Some(" env-key ".into()), || {
            panic!("keyring must not be consulted")
        })
        .unwrap();
        assert_eq!(key, "env-key");
        assert_eq!(source, KeySource::Env);
    }

    #[test]
    fn blank_env_falls_back_to_keyring() {
        let (key, source) =
            resolve_with(Some("".into()), || Ok(Some("stored".into()))).unwrap();
        assert_eq!(key, "stored");
        assert_eq!(source, KeySource::Keyring);
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        let err = resolve_with(None, || Ok(None)).unwrap_err();
        assert!(matches!(err, CoreError::Tutor(TutorError::MissingApiKey)));
    }
}
