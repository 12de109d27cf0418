//! Static credential resolution for the report store.
//!
//! Resolution order:
//!
//! 1. `NPM_CI_AWS_ACCESS_KEY` + `NPM_CI_AWS_SECRET_ACCESS_KEY` from the environment.
//! 2. The credentials profile (`NPM_CI_AWS_CREDENTIALS_PROFILE`, else the
//!    configured `profile`) in the shared credentials file
//!    (`AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`).
//! 3. No static credentials. The store client then falls back to its own
//!    instance-metadata chain.

use std::path::PathBuf;

use super::{CacheError, CacheResult};
use crate::config::{CacheConfig, Environment};

/// Default location of the shared credentials file.
pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.aws/credentials";

/// An access key pair, optionally with a session token.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolves static credentials for the store.
///
/// Returns `Ok(None)` when neither the environment nor the credentials file
/// provides any. A profile that exists but lacks a key is a configuration error.
pub fn resolve(config: &CacheConfig, env: &Environment) -> CacheResult<Option<StaticCredentials>> {
    match (&env.access_key_id, &env.secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => {
            tracing::debug!("Using store credentials from the environment");
            return Ok(Some(StaticCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: None,
            }));
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::debug!("Ignoring incomplete store key pair in the environment");
        }
        (None, None) => {}
    }

    let profile = env
        .credentials_profile
        .as_deref()
        .unwrap_or(&config.profile);
    let path = credentials_file(env);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No shared credentials file at {}", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(CacheError::Config(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            )));
        }
    };

    let Some(entries) = profile_section(&content, profile) else {
        tracing::debug!("Profile '{}' not found in {}", profile, path.display());
        return Ok(None);
    };

    let lookup = |name: &str| {
        entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    };

    let access_key_id = lookup("aws_access_key_id").ok_or_else(|| {
        CacheError::Config(format!("profile '{}' has no aws_access_key_id", profile))
    })?;
    let secret_access_key = lookup("aws_secret_access_key").ok_or_else(|| {
        CacheError::Config(format!("profile '{}' has no aws_secret_access_key", profile))
    })?;

    tracing::debug!("Using store credentials from profile '{}'", profile);
    Ok(Some(StaticCredentials {
        access_key_id,
        secret_access_key,
        session_token: lookup("aws_session_token"),
    }))
}

fn credentials_file(env: &Environment) -> PathBuf {
    match &env.shared_credentials_file {
        Some(path) => path.clone(),
        None => PathBuf::from(shellexpand::tilde(DEFAULT_CREDENTIALS_FILE).as_ref()),
    }
}

/// Returns the key/value pairs of `[profile]` in an INI-style credentials file.
///
/// `[profile name]` headers are accepted as well. Lines starting with `#` or
/// `;` are comments.
fn profile_section<'a>(content: &'a str, profile: &str) -> Option<Vec<(&'a str, &'a str)>> {
    let mut found = false;
    let mut in_section = false;
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header.strip_prefix("profile ").unwrap_or(header).trim();
            in_section = name == profile;
            found |= in_section;
            continue;
        }

        if in_section && let Some((key, value)) = line.split_once('=') {
            entries.push((key.trim(), value.trim()));
        }
    }

    found.then_some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CREDENTIALS: &str = r#"
# shared credentials
[default]
aws_access_key_id = DEFAULTKEY
aws_secret_access_key = defaultsecret

[cache-aws]
aws_access_key_id=CACHEKEY
aws_secret_access_key=cachesecret
aws_session_token = token123

[profile broken]
aws_access_key_id = ONLYKEY
"#;

    fn env_with_file(dir: &TempDir) -> Environment {
        let path = dir.path().join("credentials");
        std::fs::write(&path, CREDENTIALS).unwrap();
        Environment {
            shared_credentials_file: Some(path),
            ..Default::default()
        }
    }

    #[test]
    fn test_environment_keys_win() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            access_key_id: Some("ENVKEY".to_string()),
            secret_access_key: Some("envsecret".to_string()),
            ..env_with_file(&temp_dir)
        };

        let creds = resolve(&CacheConfig::default(), &env).unwrap().unwrap();
        assert_eq!(creds.access_key_id, "ENVKEY");
        assert_eq!(creds.secret_access_key, "envsecret");
        assert_eq!(creds.session_token, None);
    }

    #[test]
    fn test_configured_profile() {
        let temp_dir = TempDir::new().unwrap();
        let env = env_with_file(&temp_dir);

        let creds = resolve(&CacheConfig::default(), &env).unwrap().unwrap();
        assert_eq!(creds.access_key_id, "CACHEKEY");
        assert_eq!(creds.secret_access_key, "cachesecret");
        assert_eq!(creds.session_token.as_deref(), Some("token123"));
    }

    #[test]
    fn test_environment_profile_overrides_config() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            credentials_profile: Some("default".to_string()),
            ..env_with_file(&temp_dir)
        };

        let creds = resolve(&CacheConfig::default(), &env).unwrap().unwrap();
        assert_eq!(creds.access_key_id, "DEFAULTKEY");
    }

    #[test]
    fn test_incomplete_env_pair_falls_back_to_profile() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            access_key_id: Some("ENVKEY".to_string()),
            ..env_with_file(&temp_dir)
        };

        let creds = resolve(&CacheConfig::default(), &env).unwrap().unwrap();
        assert_eq!(creds.access_key_id, "CACHEKEY");
    }

    #[test]
    fn test_unknown_profile_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            credentials_profile: Some("nope".to_string()),
            ..env_with_file(&temp_dir)
        };
        assert!(resolve(&CacheConfig::default(), &env).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            shared_credentials_file: Some(temp_dir.path().join("absent")),
            ..Default::default()
        };
        assert!(resolve(&CacheConfig::default(), &env).unwrap().is_none());
    }

    #[test]
    fn test_profile_without_secret_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let env = Environment {
            credentials_profile: Some("broken".to_string()),
            ..env_with_file(&temp_dir)
        };
        let result = resolve(&CacheConfig::default(), &env);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = StaticCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "supersecret".to_string(),
            session_token: Some("sessiontoken".to_string()),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("AKIA"));
        assert!(!printed.contains("supersecret"));
        assert!(!printed.contains("sessiontoken"));
    }
}
