//! Gitignore-style exclusion for the tree, stats and search walks.
//!
//! Supported syntax: `*`, `?`, `[abc]`/`[a-z]`/`[!x]` within one segment,
//! `**` across segments, `!` negation, trailing `/` for directories only,
//! and anchoring when the pattern contains a `/` (a leading one included).
//! The last matching rule wins. A path inside an ignored directory is
//! ignored no matter what later rules say.

use tracing::debug;

use crate::config::IgnoreMode;
use crate::error::{HandleFsError, Result};
use crate::handle::DirHandle;

#[derive(Debug, Clone)]
struct IgnoreRule {
    segments: Vec<String>,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl IgnoreRule {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix('\\').unwrap_or(line)),
        };
        let (dir_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let anchored = rest.contains('/');
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return None;
        }

        Some(Self {
            segments: rest.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect(),
            negated,
            dir_only,
            anchored,
        })
    }

    fn matches(&self, path: &[&str], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.anchored {
            let pattern: Vec<&str> = self.segments.iter().map(String::as_str).collect();
            return match_segments(&pattern, path);
        }
        match (self.segments.first(), path.last()) {
            (Some(pattern), Some(name)) => glob_segment(pattern, name),
            _ => false,
        }
    }
}

/// The parsed ignore file.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<String>,
    rules: Vec<IgnoreRule>,
}

impl IgnoreFilter {
    /// A filter that excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse ignore-file content. With [`IgnoreMode::ParseOnly`] the raw
    /// patterns are kept but nothing is ever excluded.
    pub fn parse(content: &str, mode: IgnoreMode) -> Self {
        let patterns: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        let rules = match mode {
            IgnoreMode::Gitignore => patterns.iter().filter_map(|p| IgnoreRule::parse(p)).collect(),
            IgnoreMode::ParseOnly | IgnoreMode::Off => Vec::new(),
        };
        Self { patterns, rules }
    }

    /// Read `file_name` from the root. A missing file yields an empty filter.
    pub async fn load(root: &DirHandle, file_name: &str, mode: IgnoreMode) -> Result<Self> {
        if mode == IgnoreMode::Off {
            return Ok(Self::empty());
        }
        let file = match root.get_file(file_name, false).await {
            Ok(file) => file,
            Err(HandleFsError::NotFound { .. }) | Err(HandleFsError::NotAFile { .. }) => {
                debug!(file = file_name, "no ignore file at root");
                return Ok(Self::empty());
            }
            Err(e) => return Err(e),
        };
        let content = file.read().await?;
        let filter = Self::parse(&String::from_utf8_lossy(&content), mode);
        debug!(file = file_name, patterns = filter.patterns.len(), %mode, "ignore file loaded");
        Ok(filter)
    }

    /// Raw pattern lines, in file order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when this filter can never exclude anything.
    pub fn is_noop(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` (relative, `/`-joined) is excluded.
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return false;
        }
        (1..segments.len()).any(|len| self.evaluate(&segments[..len], true))
            || self.evaluate(&segments, is_dir)
    }

    fn evaluate(&self, path: &[&str], is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(path, is_dir) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

/// Match pattern segments against path segments; `**` spans any number.
fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", [])) => !path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((first, rest)) => match path.split_first() {
            Some((name, tail)) => glob_segment(first, name) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Match one path segment against a glob segment (`*`, `?`, `[...]`, `\x`).
fn glob_segment(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi, ni));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ni += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(&p, pi, n[ni]) {
                        if matched {
                            pi = next;
                            ni += 1;
                            continue;
                        }
                    } else if n[ni] == '[' {
                        pi += 1;
                        ni += 1;
                        continue;
                    }
                }
                '\\' if pi + 1 < p.len() => {
                    if p[pi + 1] == n[ni] {
                        pi += 2;
                        ni += 1;
                        continue;
                    }
                }
                c => {
                    if c == n[ni] {
                        pi += 1;
                        ni += 1;
                        continue;
                    }
                }
            }
        }
        match star {
            Some((sp, sn)) => {
                pi = sp + 1;
                ni = sn + 1;
                star = Some((sp, sn + 1));
            }
            None => return false,
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Evaluate a `[...]` class at `start`. Returns (matched, index after `]`),
/// or `None` if the class is unterminated.
fn match_class(p: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(p.get(i), Some('!') | Some('^'));
    if negate {
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    while i < p.len() {
        if p[i] == ']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;
        if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            if p[i] <= c && c <= p[i + 2] {
                matched = true;
            }
            i += 3;
        } else {
            if p[i] == c {
                matched = true;
            }
            i += 1;
        }
    }
    None
}
