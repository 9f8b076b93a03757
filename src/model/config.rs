use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub drafts: DraftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Tested against the final segment of every file
    #[serde(default = "default_note_file_regex")]
    pub note_file_regex: String,
    /// A folder is only scanned when its own name matches
    #[serde(default = "default_folder_scan_regex")]
    pub folder_scan_regex: String,
    /// A directory holding an entry with a matching name is a project
    #[serde(default = "default_project_marker_regex")]
    pub project_marker_regex: String,
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,
    /// Directory expansions allowed to run at the same time
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            note_file_regex: default_note_file_regex(),
            folder_scan_regex: default_folder_scan_regex(),
            project_marker_regex: default_project_marker_regex(),
            max_recursion_depth: default_max_recursion_depth(),
            scan_concurrency: default_scan_concurrency(),
        }
    }
}

fn default_note_file_regex() -> String {
    ".*".to_string()
}

fn default_folder_scan_regex() -> String {
    "^.*$".to_string()
}

fn default_project_marker_regex() -> String {
    r"^\.vscode$".to_string()
}

fn default_max_recursion_depth() -> usize {
    15
}

fn default_scan_concurrency() -> usize {
    20
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftConfig {
    /// Where new drafts go. Defaults to `drafts/` in the data directory.
    #[serde(default)]
    pub folder: Option<String>,
}

/// Which pattern failed to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    NoteFile,
    FolderScan,
    ProjectMarker,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::NoteFile => write!(f, "note_file_regex"),
            PatternKind::FolderScan => write!(f, "folder_scan_regex"),
            PatternKind::ProjectMarker => write!(f, "project_marker_regex"),
        }
    }
}

/// Compiled form of [`ScanConfig`].
#[derive(Debug, Clone)]
pub struct ScanRules {
    pub note_file: Regex,
    pub folder_scan: Regex,
    pub project_marker: Regex,
    pub max_recursion_depth: usize,
    pub max_concurrency: usize,
}

impl ScanRules {
    pub fn compile(config: &ScanConfig) -> Result<Self, (PatternKind, regex::Error)> {
        Ok(ScanRules {
            note_file: pattern(&config.note_file_regex)
                .map_err(|e| (PatternKind::NoteFile, e))?,
            folder_scan: pattern(&config.folder_scan_regex)
                .map_err(|e| (PatternKind::FolderScan, e))?,
            project_marker: pattern(&config.project_marker_regex)
                .map_err(|e| (PatternKind::ProjectMarker, e))?,
            max_recursion_depth: config.max_recursion_depth,
            max_concurrency: config.scan_concurrency,
        })
    }

    pub fn is_note_name(&self, name: &str) -> bool {
        self.note_file.is_match(name)
    }

    pub fn is_project_marker(&self, name: &str) -> bool {
        self.project_marker.is_match(name)
    }

    pub fn should_scan_folder(&self, name: &str) -> bool {
        self.folder_scan.is_match(name)
    }
}

impl Default for ScanRules {
    fn default() -> Self {
        // The built-in patterns are known to compile
        match ScanRules::compile(&ScanConfig::default()) {
            Ok(rules) => rules,
            Err((kind, e)) => panic!("default {} is invalid: {}", kind, e),
        }
    }
}

/// Patterns are case-insensitive and `.` also matches newlines.
fn pattern(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scan.note_file_regex, ".*");
        assert_eq!(config.scan.folder_scan_regex, "^.*$");
        assert_eq!(config.scan.project_marker_regex, r"^\.vscode$");
        assert_eq!(config.scan.max_recursion_depth, 15);
        assert_eq!(config.scan.scan_concurrency, 20);
        assert!(config.drafts.folder.is_none());
    }

    #[test]
    fn partial_scan_table_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[scan]
note_file_regex = '.*note.*\.(md|txt)$'
max_recursion_depth = 3
"#,
        )
        .unwrap();
        assert_eq!(config.scan.max_recursion_depth, 3);
        assert_eq!(config.scan.scan_concurrency, 20);
        let rules = ScanRules::compile(&config.scan).unwrap();
        assert!(rules.is_note_name("my-NOTE.md"));
        assert!(!rules.is_note_name("readme.md"));
    }

    #[test]
    fn default_marker_matches_only_the_literal() {
        let rules = ScanRules::default();
        assert!(rules.is_project_marker(".vscode"));
        assert!(rules.is_project_marker(".VSCode"));
        assert!(!rules.is_project_marker("xvscode"));
        assert!(!rules.is_project_marker(".vscode.bak"));
    }

    #[test]
    fn invalid_pattern_reports_which_one() {
        let config = ScanConfig {
            folder_scan_regex: "(".into(),
            ..Default::default()
        };
        let (kind, _) = ScanRules::compile(&config).unwrap_err();
        assert_eq!(kind, PatternKind::FolderScan);
    }
}
