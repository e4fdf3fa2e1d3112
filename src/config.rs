//! Client Configuration
//!
//! Options that shape the client core. Loaded from a JSON file or built
//! in code; the CLI overlays its flags on top.
//!
//! ```json
//! { "readdir_chunk_size": 1024, "word_size": "w8", "include_stat_in_readdir": true }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ec::WordSize;
use crate::error::{Error, Result};

/// Entries requested per ReadDir RPC unless configured otherwise.
pub const DEFAULT_READDIR_CHUNK_SIZE: usize = 1024;

/// Client core options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Maximum entries fetched by one ReadDir RPC
    pub readdir_chunk_size: usize,
    /// Galois field word size for Reed-Solomon coding
    pub word_size: WordSize,
    /// Ask the metadata server for attributes along with names
    pub include_stat_in_readdir: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            readdir_chunk_size: DEFAULT_READDIR_CHUNK_SIZE,
            word_size: WordSize::default(),
            include_stat_in_readdir: true,
        }
    }
}

impl ClientOptions {
    pub fn validate(&self) -> Result<()> {
        if self.readdir_chunk_size == 0 {
            return Err(Error::Config(
                "readdir_chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate options from a JSON file. Missing fields keep
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&raw)?;
        options.validate()?;
        debug!(path = %path.display(), ?options, "Loaded client options");
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.readdir_chunk_size, 1024);
        assert_eq!(options.word_size, WordSize::W8);
        assert!(options.include_stat_in_readdir);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let options: ClientOptions =
            serde_json::from_str(r#"{ "readdir_chunk_size": 16, "word_size": "w16" }"#).unwrap();
        assert_eq!(options.readdir_chunk_size, 16);
        assert_eq!(options.word_size, WordSize::W16);
        assert!(options.include_stat_in_readdir);
    }

    #[test]
    fn test_from_json_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "readdir_chunk_size": 0 }}"#).unwrap();
        assert_matches!(ClientOptions::from_json_file(file.path()), Err(Error::Config(_)));

        assert_matches!(
            ClientOptions::from_json_file("/nonexistent/xtfs.json"),
            Err(Error::Io(_))
        );
    }
}
