//! Treasury credential loading
//!
//! The treasury secret is accepted in two formats: a Solana CLI keypair
//! file (JSON array of bytes) referenced by path, or an inline secret that
//! is either a JSON array or a base58-encoded secret key.

use std::path::Path;

use solana_sdk::signature::Keypair;
use tracing::debug;

use crate::config::TreasuryConfig;
use crate::error::{Error, Result};

/// Load the treasury keypair from configuration.
///
/// Prefers `keypair_path` when set; otherwise falls back to the inline
/// `secret`. Fails if neither is configured.
pub fn load_treasury_keypair(config: &TreasuryConfig) -> Result<Keypair> {
    if let Some(path) = &config.keypair_path {
        return load_keypair_file(Path::new(path));
    }

    if let Some(secret) = &config.secret {
        return parse_secret(secret);
    }

    Err(Error::MissingEnvVar(
        "MINING__TREASURY__SECRET (or treasury.keypair_path)".to_string(),
    ))
}

/// Load a Solana CLI keypair file (JSON array of 64 bytes)
fn load_keypair_file(path: &Path) -> Result<Keypair> {
    debug!("Loading treasury keypair from: {:?}", path);

    // Validate permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::InsecureKeypair(format!(
                    "Keypair {} has insecure permissions {:o}. Run 'chmod 600 {}'",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidKeypair(format!("Failed to read {}: {}", path.display(), e)))?;

    keypair_from_json_array(&content)
}

/// Parse an inline secret: JSON array of bytes, or base58 string
fn parse_secret(secret: &str) -> Result<Keypair> {
    let trimmed = secret.trim();

    if trimmed.starts_with('[') {
        return keypair_from_json_array(trimmed);
    }

    let bytes = bs58::decode(trimmed)
        .into_vec()
        .map_err(|e| Error::InvalidKeypair(format!("Invalid base58 secret: {}", e)))?;

    Keypair::from_bytes(&bytes)
        .map_err(|e| Error::InvalidKeypair(format!("Invalid secret key bytes: {}", e)))
}

fn keypair_from_json_array(content: &str) -> Result<Keypair> {
    let bytes: Vec<u8> = serde_json::from_str(content)
        .map_err(|e| Error::InvalidKeypair(format!("Failed to parse keypair JSON: {}", e)))?;

    Keypair::from_bytes(&bytes)
        .map_err(|e| Error::InvalidKeypair(format!("Invalid keypair bytes: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::Signer;

    fn config_with_secret(secret: &str) -> TreasuryConfig {
        TreasuryConfig {
            keypair_path: None,
            secret: Some(secret.to_string()),
        }
    }

    #[test]
    fn test_json_array_secret() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();

        let loaded = load_treasury_keypair(&config_with_secret(&json)).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_base58_secret() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();

        let loaded = load_treasury_keypair(&config_with_secret(&encoded)).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_both_formats_agree() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();

        let from_json = load_treasury_keypair(&config_with_secret(&json)).unwrap();
        let from_b58 = load_treasury_keypair(&config_with_secret(&encoded)).unwrap();
        assert_eq!(from_json.pubkey(), from_b58.pubkey());
    }

    #[test]
    fn test_garbage_secret_fails() {
        let result = load_treasury_keypair(&config_with_secret("not a key at all!!"));
        assert!(matches!(result, Err(Error::InvalidKeypair(_))));
    }

    #[test]
    fn test_short_json_array_fails() {
        let result = load_treasury_keypair(&config_with_secret("[1, 2, 3]"));
        assert!(matches!(result, Err(Error::InvalidKeypair(_))));
    }

    #[test]
    fn test_unconfigured_treasury_fails() {
        let config = TreasuryConfig {
            keypair_path: None,
            secret: None,
        };
        assert!(matches!(
            load_treasury_keypair(&config),
            Err(Error::MissingEnvVar(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_keypair_file_with_secure_permissions() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let keypair = Keypair::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treasury.json");

        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "{}",
            serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        let config = TreasuryConfig {
            keypair_path: Some(path.display().to_string()),
            secret: None,
        };
        let loaded = load_treasury_keypair(&config).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[cfg(unix)]
    #[test]
    fn test_keypair_file_with_open_permissions_fails() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let keypair = Keypair::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treasury.json");

        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "{}",
            serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = TreasuryConfig {
            keypair_path: Some(path.display().to_string()),
            secret: None,
        };
        assert!(matches!(
            load_treasury_keypair(&config),
            Err(Error::InsecureKeypair(_))
        ));
    }
}
