use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PostrefsConfig {
    pub database: Option<String>,
    pub site_url: Option<String>,
    pub port: Option<u16>,
    pub nonce_secret: Option<String>,
}

impl PostrefsConfig {
    pub fn site_url(&self) -> &str {
        self.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Configured secret, or one derived from the database path
    pub fn nonce_secret(&self, db_path: &Path) -> String {
        match &self.nonce_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!("No nonce_secret configured, deriving one from the database path");
                blake3::hash(db_path.to_string_lossy().as_bytes()).to_hex().to_string()
            }
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("postrefs.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".postrefs").join("postrefs.db")
}

/// Fresh random-enough secret for a new config
pub fn generate_secret() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PostrefsConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: PostrefsConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &PostrefsConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".postrefs/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PostrefsConfig::default();
        assert_eq!(config.site_url(), DEFAULT_SITE_URL);
        assert_eq!(config.port(), 8080);
        assert_eq!(
            default_database_path_in(Path::new("/srv")),
            PathBuf::from("/srv/.postrefs/postrefs.db")
        );
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postrefs.toml");
        let config = PostrefsConfig {
            database: Some("data/site.db".into()),
            site_url: Some("https://example.test".into()),
            port: Some(9000),
            nonce_secret: Some("abc".into()),
        };

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &PostrefsConfig::default(), true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(PostrefsConfig::default()));
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_nonce_secret_fallback_is_stable() {
        let config = PostrefsConfig::default();
        let db = Path::new("/tmp/a.db");
        assert_eq!(config.nonce_secret(db), config.nonce_secret(db));
        assert_ne!(generate_secret(), "");
    }

    #[test]
    fn test_gitignore_entry_added_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();
        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target\n.postrefs/\n");
    }
}
