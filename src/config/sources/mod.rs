//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! [`file_source`] reads a local file and [`url_source`] fetches the
//! configuration over HTTP(S). Both funnel the raw text through
//! [`parse_validate_hash`], which picks the format from the extension,
//! validates the result, and computes a SHA-256 version hash.

pub mod file_source;
pub mod url_source;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::WaypostError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, WaypostError> {
    match ext {
        "json" => serde_json::from_str(content).map_err(|e| WaypostError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| WaypostError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| WaypostError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(WaypostError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Parse, validate, and hash raw config text.
///
/// Shared by every config source so they all enforce the same rules.
pub fn parse_validate_hash(
    ext: &str,
    content: &str,
    source_label: &str,
) -> Result<(Config, ConfigVersion), WaypostError> {
    let config = parse_config_str(ext, content, source_label)?;

    if let Err(errors) = validate(&config) {
        return Err(WaypostError::ConfigValidation { errors });
    }

    let hash = sha256_hex(content.as_bytes());
    Ok((config, ConfigVersion::Hash(hash)))
}

/// Extension of a path or URL, ignoring any query string. Defaults to
/// `json` when none is present.
#[must_use]
pub fn extension_of(location: &str) -> &str {
    let without_query = location.split(['?', '#']).next().unwrap_or(location);
    let file_name = without_query.rsplit('/').next().unwrap_or(without_query);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "json",
    }
}
