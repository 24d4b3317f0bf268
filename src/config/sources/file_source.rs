//! Async file-based config source.
//!
//! [`FileSource`] reads the file via Tokio and picks the format from its
//! extension (`.json`, plus `.yaml`/`.yml`/`.toml` behind features).

use std::path::PathBuf;

use async_trait::async_trait;

use super::{extension_of, parse_validate_hash};
use crate::config::model::Config;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::WaypostError;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_content(&self) -> Result<String, WaypostError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WaypostError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                WaypostError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), WaypostError> {
        let content = self.read_content().await?;
        let location = self.location();
        parse_validate_hash(extension_of(&location), &content, &location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_reported() {
        let source = FileSource::new(PathBuf::from("/nonexistent/waypost.json"));
        assert!(matches!(
            source.load().await,
            Err(WaypostError::ConfigFileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn loads_valid_file() {
        let path = std::env::temp_dir().join(format!("waypost-test-{}.json", std::process::id()));
        tokio::fs::write(
            &path,
            r#"{"listen": "127.0.0.1:8080", "routes": [{"path": "/", "forwardUrl": "http://localhost:9000", "allowedMethods": ["GET"]}]}"#,
        )
        .await
        .unwrap();

        let source = FileSource::new(path.clone());
        let (config, _) = source.load().await.unwrap();
        assert_eq!(config.routes[0].forward_url, "http://localhost:9000");

        let _ = tokio::fs::remove_file(&path).await;
    }
}
