//! Project directory discovery.
//!
//! Lists the immediate subdirectories of each base directory and keeps the
//! ones that carry a metadata document.

use crate::models::ProjectDirectory;
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for project discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Base directories, scanned in order.
    pub base_dirs: Vec<PathBuf>,
    /// File name that marks a directory as a project.
    pub metadata_file: String,
    /// Folder names to restrict to. `None` processes every project.
    pub only: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_dirs: vec![PathBuf::from("stablecoin"), PathBuf::from("cex")],
            metadata_file: "data.yml".to_string(),
            only: None,
        }
    }
}

impl From<&crate::config::GeneralConfig> for ScanConfig {
    fn from(config: &crate::config::GeneralConfig) -> Self {
        Self {
            base_dirs: config.base_dirs.iter().map(PathBuf::from).collect(),
            metadata_file: config.metadata_file.clone(),
            only: None,
        }
    }
}

/// Project discovery over a set of base directories.
pub struct ProjectScanner {
    config: ScanConfig,
}

impl ProjectScanner {
    /// Create a new project scanner.
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Find every project directory, base directories in order, names sorted within each.
    pub fn scan(&self) -> Vec<ProjectDirectory> {
        let mut projects = Vec::new();

        for base in &self.config.base_dirs {
            if !base.is_dir() {
                warn!("Base directory not found: {}", base.display());
                continue;
            }

            let walker = WalkDir::new(base)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!("Cannot read entry under {}: {}", base.display(), e);
                        continue;
                    }
                };

                let name = entry.file_name().to_string_lossy().to_string();
                if !self.is_selected(&name) {
                    continue;
                }

                let path = entry.path().to_path_buf();
                if !path.is_dir() {
                    continue;
                }

                if !path.join(&self.config.metadata_file).is_file() {
                    debug!(
                        "Skipping {}: no {}",
                        path.display(),
                        self.config.metadata_file
                    );
                    continue;
                }

                projects.push(ProjectDirectory::new(name, path));
            }
        }

        projects
    }

    /// Check a folder name against the allow-list.
    fn is_selected(&self, name: &str) -> bool {
        match &self.config.only {
            Some(only) => only.iter().any(|n| n == name),
            None => true,
        }
    }
}
