use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the ignore file at the root is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IgnoreMode {
    /// Parse the ignore file and apply gitignore matching. **Default.**
    Gitignore,
    /// Parse the ignore file but exclude nothing.
    ParseOnly,
    /// Do not read the ignore file at all.
    Off,
}

impl Default for IgnoreMode {
    fn default() -> Self {
        Self::Gitignore
    }
}

impl std::fmt::Display for IgnoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gitignore => write!(f, "gitignore"),
            Self::ParseOnly => write!(f, "parse-only"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for IgnoreMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gitignore" => Ok(Self::Gitignore),
            "parse-only" | "parse_only" => Ok(Self::ParseOnly),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown ignore mode: {other}")),
        }
    }
}

/// What the change watcher compares between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChangeDetection {
    /// Tree shape only: names and nesting. **Default.**
    Structure,
    /// Tree shape plus every file's size and modification time.
    Content,
}

impl Default for ChangeDetection {
    fn default() -> Self {
        Self::Structure
    }
}

impl std::fmt::Display for ChangeDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structure => write!(f, "structure"),
            Self::Content => write!(f, "content"),
        }
    }
}

impl std::str::FromStr for ChangeDetection {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structure" => Ok(Self::Structure),
            "content" => Ok(Self::Content),
            other => Err(format!("unknown change detection mode: {other}")),
        }
    }
}

/// Configuration for a [`FileSystemSession`](crate::FileSystemSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Watcher polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Name of the ignore-pattern file looked up at the root.
    pub ignore_file: String,
    pub ignore_mode: IgnoreMode,
    pub change_detection: ChangeDetection,
    /// Starting a watch cancels every existing watch first.
    pub exclusive_watcher: bool,
    /// Reported for files whose host metadata carries no content type.
    pub default_content_type: String,
    /// Maximum directory nesting walked by tree/stat/search traversals.
    pub max_depth: usize,
    /// Key under which the granted root is persisted.
    pub project_id: Option<String>,
    /// SQLite file for the root registry and the move journal.
    pub state_path: Option<PathBuf>,
}

impl SessionConfig {
    /// Create a config builder with defaults.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            poll_interval_ms: 1000,
            ignore_file: ".gitignore".to_string(),
            ignore_mode: IgnoreMode::default(),
            change_detection: ChangeDetection::default(),
            exclusive_watcher: true,
            default_content_type: "text/plain".to_string(),
            max_depth: 256,
            project_id: None,
            state_path: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    poll_interval_ms: u64,
    ignore_file: String,
    ignore_mode: IgnoreMode,
    change_detection: ChangeDetection,
    exclusive_watcher: bool,
    default_content_type: String,
    max_depth: usize,
    project_id: Option<String>,
    state_path: Option<PathBuf>,
}

impl SessionConfigBuilder {
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(10);
        self
    }

    pub fn ignore_file(mut self, name: impl Into<String>) -> Self {
        self.ignore_file = name.into();
        self
    }

    pub fn ignore_mode(mut self, mode: IgnoreMode) -> Self {
        self.ignore_mode = mode;
        self
    }

    pub fn change_detection(mut self, mode: ChangeDetection) -> Self {
        self.change_detection = mode;
        self
    }

    pub fn exclusive_watcher(mut self, yes: bool) -> Self {
        self.exclusive_watcher = yes;
        self
    }

    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    pub fn state_path(mut self, path: impl AsRef<Path>) -> Self {
        self.state_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> SessionConfig {
        SessionConfig {
            poll_interval_ms: self.poll_interval_ms,
            ignore_file: self.ignore_file,
            ignore_mode: self.ignore_mode,
            change_detection: self.change_detection,
            exclusive_watcher: self.exclusive_watcher,
            default_content_type: self.default_content_type,
            max_depth: self.max_depth,
            project_id: self.project_id,
            state_path: self.state_path,
        }
    }
}
