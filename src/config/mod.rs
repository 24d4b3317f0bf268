//! Configuration loading and validation.
//!
//! Defines the [`ConfigSource`] trait for pluggable config origins (a
//! local file or an HTTP URL) and the [`ConfigVersion`] hash reported by
//! `/health`. Submodules provide the data model, validation logic, and
//! the concrete sources.

pub mod model;
pub mod sources;
pub mod validation;

use async_trait::async_trait;

use crate::error::WaypostError;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// First eight characters of the hash, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human-readable location (path or URL) used in error messages.
    fn location(&self) -> String;

    /// Fetch, parse, and validate the configuration.
    async fn load(&self) -> Result<(Config, ConfigVersion), WaypostError>;
}
