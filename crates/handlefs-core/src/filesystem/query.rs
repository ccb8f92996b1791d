//! Filters and rankings over a cached [`StatsMap`].

use serde::{Deserialize, Serialize};

use crate::filesystem::{base_name, FileStat, StatsMap};

/// Criteria for narrowing a stat map. Unset fields match everything and
/// bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFilter {
    /// Compared case-insensitively with the text after the final `.`.
    pub extension: Option<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub modified_after: Option<u64>,
    pub modified_before: Option<u64>,
}

impl StatsFilter {
    pub fn matches(&self, path: &str, stat: &FileStat) -> bool {
        if let Some(ext) = &self.extension {
            let want = ext.trim_start_matches('.');
            let have = match base_name(path).rsplit_once('.') {
                Some((_, have)) => have,
                None => return false,
            };
            if !have.eq_ignore_ascii_case(want) {
                return false;
            }
        }
        self.min_size.map_or(true, |min| stat.size >= min)
            && self.max_size.map_or(true, |max| stat.size <= max)
            && self.modified_after.map_or(true, |t| stat.last_modified >= t)
            && self.modified_before.map_or(true, |t| stat.last_modified <= t)
    }

    pub fn apply(&self, stats: &StatsMap) -> StatsMap {
        stats
            .iter()
            .filter(|(path, stat)| self.matches(path, stat))
            .map(|(path, stat)| (path.clone(), stat.clone()))
            .collect()
    }
}

fn visible(stats: &StatsMap) -> Vec<(&String, &FileStat)> {
    stats
        .iter()
        .filter(|(path, _)| !base_name(path).starts_with('.'))
        .collect()
}

/// The `limit` most recently modified files, newest first.
pub fn recent_files(stats: &StatsMap, limit: usize) -> Vec<(String, FileStat)> {
    let mut files = visible(stats);
    files.sort_by(|a, b| b.1.last_modified.cmp(&a.1.last_modified).then_with(|| a.0.cmp(b.0)));
    files
        .into_iter()
        .take(limit)
        .map(|(p, s)| (p.clone(), s.clone()))
        .collect()
}

/// The `limit` largest files, biggest first.
pub fn largest_files(stats: &StatsMap, limit: usize) -> Vec<(String, FileStat)> {
    let mut files = visible(stats);
    files.sort_by(|a, b| b.1.size.cmp(&a.1.size).then_with(|| a.0.cmp(b.0)));
    files
        .into_iter()
        .take(limit)
        .map(|(p, s)| (p.clone(), s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(size: u64, last_modified: u64) -> FileStat {
        FileStat {
            size,
            last_modified,
            content_type: "text/plain".into(),
        }
    }

    fn sample() -> StatsMap {
        let mut m = StatsMap::new();
        m.insert("a/one.TXT".into(), stat(10, 300));
        m.insert("b.md".into(), stat(500, 100));
        m.insert("c.txt".into(), stat(500, 200));
        m.insert(".env".into(), stat(9000, 999));
        m.insert("README".into(), stat(1, 50));
        m
    }

    #[test]
    fn filter_by_extension_and_bounds() {
        let stats = sample();
        let f = StatsFilter {
            extension: Some(".txt".into()),
            ..Default::default()
        };
        let hits: Vec<String> = f.apply(&stats).into_keys().collect();
        assert_eq!(hits, vec!["a/one.TXT", "c.txt"]);

        let f = StatsFilter {
            min_size: Some(10),
            max_size: Some(500),
            modified_before: Some(200),
            ..Default::default()
        };
        let hits: Vec<String> = f.apply(&stats).into_keys().collect();
        assert_eq!(hits, vec!["b.md", "c.txt"]);
    }

    #[test]
    fn rankings_skip_dotfiles_and_break_ties_by_path() {
        let stats = sample();
        let recent: Vec<String> = recent_files(&stats, 2).into_iter().map(|(p, _)| p).collect();
        assert_eq!(recent, vec!["a/one.TXT", "c.txt"]);

        let largest: Vec<String> = largest_files(&stats, 3).into_iter().map(|(p, _)| p).collect();
        assert_eq!(largest, vec!["b.md", "c.txt", "a/one.TXT"]);
    }
}
