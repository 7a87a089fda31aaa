//! Export discovery
//!
//! Walks a data root, classifies every file by its basename and loads the
//! JSON documents of a category. Classification is purely lexical; parse
//! failures never abort a scan, they are reported as skipped files.

use crate::error::ComputeError;
use crate::types::{SignalCategory, SkipReason, SkippedFile};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default bound on directory nesting below the root
pub const DEFAULT_MAX_DEPTH: usize = 32;

const HEART_RATE_MARKERS: [&str; 5] = ["heartrate", "heart-rate", "heart_rate", "heart rate", "hr"];

/// Classify a lowercased basename.
///
/// Precedence is sleep, steps, heart rate. Use [`SignalCategory::matches`]
/// when a file should count for every category it satisfies.
pub fn classify(name: &str) -> SignalCategory {
    [
        SignalCategory::Sleep,
        SignalCategory::Steps,
        SignalCategory::HeartRate,
    ]
    .into_iter()
    .find(|category| category.matches(name))
    .unwrap_or(SignalCategory::Unknown)
}

impl SignalCategory {
    /// Whether a lowercased basename belongs to this category.
    ///
    /// The bare `hr` marker is broad and will also match names such as
    /// `three.json`.
    pub fn matches(&self, name: &str) -> bool {
        if !name.ends_with(".json") {
            return false;
        }
        let sleep = name.contains("sleep");
        match self {
            SignalCategory::Sleep => sleep,
            SignalCategory::Steps => !sleep && name.contains("step"),
            SignalCategory::HeartRate => {
                !sleep && HEART_RATE_MARKERS.iter().any(|m| name.contains(m))
            }
            SignalCategory::Unknown => {
                !SignalCategory::Sleep.matches(name)
                    && !SignalCategory::Steps.matches(name)
                    && !SignalCategory::HeartRate.matches(name)
            }
        }
    }
}

/// Traversal limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Maximum directory nesting below the root (root itself is depth 0)
    pub max_depth: usize,
    /// Descend into symlinked directories (loops back to an ancestor are cut)
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            follow_symlinks: true,
        }
    }
}

/// A file discovered under the data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub path: PathBuf,
    /// Lowercased basename used for classification
    pub name: String,
}

impl ExportFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self { path, name }
    }

    /// Basename as it appears on disk
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn category(&self) -> SignalCategory {
        classify(&self.name)
    }

    /// Read and parse the file. Never cached.
    pub fn read_json(&self) -> Result<Value, SkipReason> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| SkipReason::InvalidJson(e.to_string()))
    }
}

/// A parsed document and the file it came from
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub file: ExportFile,
    pub value: Value,
}

/// Documents of one category, plus the files that failed to load
#[derive(Debug, Clone, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<LoadedDocument>,
    pub skipped: Vec<SkippedFile>,
}

/// Every file found by one scan, in traversal order
#[derive(Debug, Clone)]
pub struct ExportSet {
    pub root: PathBuf,
    pub files: Vec<ExportFile>,
}

impl ExportSet {
    pub fn of_category(&self, category: SignalCategory) -> impl Iterator<Item = &ExportFile> {
        self.files.iter().filter(move |f| category.matches(&f.name))
    }

    pub fn count(&self, category: SignalCategory) -> usize {
        self.of_category(category).count()
    }

    /// Path of a file relative to the scanned root
    pub fn relative_name(&self, file: &ExportFile) -> String {
        file.path
            .strip_prefix(&self.root)
            .unwrap_or(&file.path)
            .display()
            .to_string()
    }

    /// Parse every file of a category, keeping traversal order
    pub fn load(&self, category: SignalCategory) -> LoadedDocuments {
        let mut loaded = LoadedDocuments::default();
        for file in self.of_category(category) {
            match file.read_json() {
                Ok(value) => loaded.documents.push(LoadedDocument {
                    file: file.clone(),
                    value,
                }),
                Err(reason) => {
                    tracing::debug!(
                        file = %file.path.display(),
                        category = category.as_str(),
                        ?reason,
                        "skipping export file"
                    );
                    loaded.skipped.push(SkippedFile {
                        file: self.relative_name(file),
                        reason,
                    });
                }
            }
        }
        loaded
    }
}

/// Recursive directory scanner rooted at the export folder
#[derive(Debug, Clone)]
pub struct ExportScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl ExportScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, ScanOptions::default())
    }

    pub fn with_options(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Enumerate every file below the root.
    ///
    /// Pre-order depth-first walk with entries visited in name order. Only a
    /// missing or unreadable root is an error; unreadable sub-directories and
    /// symlink loops are logged and skipped.
    pub fn scan(&self) -> Result<ExportSet, ComputeError> {
        if !self.root.is_dir() {
            return Err(ComputeError::MissingRoot(self.root.clone()));
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.options.max_depth.saturating_add(1))
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(ComputeError::Io(e.into())),
                Err(e) => {
                    if let Some(ancestor) = e.loop_ancestor() {
                        tracing::warn!(
                            path = ?e.path(),
                            ancestor = %ancestor.display(),
                            "symlink loop, not descending"
                        );
                    } else {
                        tracing::warn!(path = ?e.path(), error = %e, "cannot read export entry");
                    }
                    continue;
                }
            };

            let file_type = entry.file_type();
            // Unfollowed links still count when they point at a file.
            let is_file =
                file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
            if is_file {
                files.push(ExportFile::new(entry.into_path()));
            }
        }

        Ok(ExportSet {
            root: self.root.clone(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_categories() {
        assert_eq!(classify("sleep-2025-08-13.json"), SignalCategory::Sleep);
        assert_eq!(classify("steps-2025-08-13.json"), SignalCategory::Steps);
        assert_eq!(classify("heart_rate-2025-08-13.json"), SignalCategory::HeartRate);
        assert_eq!(classify("heart rate 2025.json"), SignalCategory::HeartRate);
        assert_eq!(classify("resting_hr.json"), SignalCategory::HeartRate);
        assert_eq!(classify("calories-2025-08-13.json"), SignalCategory::Unknown);
        assert_eq!(classify("steps-2025-08-13.csv"), SignalCategory::Unknown);
    }

    #[test]
    fn test_sleep_excludes_other_categories() {
        let name = "sleep_heartrate_steps.json";
        assert!(SignalCategory::Sleep.matches(name));
        assert!(!SignalCategory::Steps.matches(name));
        assert!(!SignalCategory::HeartRate.matches(name));
    }

    #[test]
    fn test_hr_marker_is_broad() {
        // "three" contains "hr"; the heuristic accepts it.
        assert!(SignalCategory::HeartRate.matches("three.json"));
        assert!(SignalCategory::HeartRate.matches("shrimp_steps.json"));
        assert!(SignalCategory::Steps.matches("shrimp_steps.json"));
        assert_eq!(classify("shrimp_steps.json"), SignalCategory::Steps);
    }

    #[test]
    fn test_unknown_matches_only_unclassified() {
        assert!(SignalCategory::Unknown.matches("calories.json"));
        assert!(!SignalCategory::Unknown.matches("steps.json"));
        assert!(!SignalCategory::Unknown.matches("notes.txt"));
    }

    #[test]
    fn test_export_file_lowercases_name() {
        let file = ExportFile::new(PathBuf::from("/data/Fitbit/Steps-2025.JSON"));
        assert_eq!(file.name, "steps-2025.json");
        assert_eq!(file.display_name(), "Steps-2025.JSON");
        assert_eq!(file.category(), SignalCategory::Steps);
    }

    #[test]
    fn test_missing_root() {
        let scanner = ExportScanner::new("/definitely/not/a/real/export/root");
        let err = scanner.scan().unwrap_err();
        assert!(matches!(err, ComputeError::MissingRoot(_)));
    }
}
