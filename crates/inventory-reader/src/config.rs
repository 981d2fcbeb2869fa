//! Reader configuration.

use std::path::PathBuf;

/// Rows decoded per Arrow record batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Directory for local copies of materialized files. `None` uses the
    /// system temporary directory.
    pub tmp_dir: Option<PathBuf>,

    /// Rows per decoded record batch
    pub batch_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            tmp_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ReaderConfig::default();
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.tmp_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_config_tmp_dir_override() {
        let config = ReaderConfig {
            tmp_dir: Some(PathBuf::from("/var/tmp/inventory")),
            ..Default::default()
        };
        assert_eq!(config.tmp_dir(), PathBuf::from("/var/tmp/inventory"));
    }
}
