//! RTSP path templates per vendor
//!
//! Built-in families plus an optional external file:
//!
//! ```text
//! # Hikvision
//! /Streaming/Channels/101,/Streaming/Channels/102
//! # Some Vendor
//! /live.sdp
//! ```
//!
//! File sections override the built-in list for the vendors they name. Lines
//! before the first header land in Generic.

mod builtin;
mod cache;

pub use cache::{cache_key, PatternCache};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::camera_brand::{canonical_or_raw, GENERIC};
use crate::error::Result;

/// (main path, optional sub path)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternEntry {
    pub main: String,
    pub sub: Option<String>,
}

impl PatternEntry {
    pub fn new(main: impl Into<String>, sub: Option<&str>) -> Self {
        Self {
            main: main.into(),
            sub: sub.map(str::to_string),
        }
    }
}

fn push_unique(out: &mut Vec<PatternEntry>, seen: &mut HashSet<PatternEntry>, list: Option<&Vec<PatternEntry>>) {
    for entry in list.into_iter().flatten() {
        if seen.insert(entry.clone()) {
            out.push(entry.clone());
        }
    }
}

/// Parse the `# Vendor` / `main,sub` format
pub fn parse_pattern_file(contents: &str) -> HashMap<String, Vec<PatternEntry>> {
    let mut sections: HashMap<String, Vec<PatternEntry>> = HashMap::new();
    let mut current = GENERIC.to_string();

    for line in contents.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            // "# Vendor" opens a section, "#..." without the space is a comment
            if let Some(header) = comment.strip_prefix(' ') {
                let header = header.trim();
                if !header.is_empty() {
                    current = canonical_or_raw(header);
                }
            }
            continue;
        }

        let (main, sub) = match line.split_once(',') {
            Some((m, s)) => (m.trim(), Some(s.trim()).filter(|s| !s.is_empty())),
            None => (line, None),
        };
        if main.is_empty() {
            continue;
        }
        sections
            .entry(current.clone())
            .or_default()
            .push(PatternEntry::new(main, sub));
    }
    sections
}

/// Read-only template table, built once at start-up
#[derive(Debug, Clone)]
pub struct PatternManager {
    builtin: HashMap<String, Vec<PatternEntry>>,
    file: HashMap<String, Vec<PatternEntry>>,
}

impl Default for PatternManager {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternManager {
    /// Built-in families only
    pub fn builtin() -> Self {
        Self {
            builtin: builtin::builtin_patterns()
                .into_iter()
                .map(|(vendor, list)| (vendor.to_string(), list))
                .collect(),
            file: HashMap::new(),
        }
    }

    /// Built-ins plus external file contents
    pub fn with_file_contents(contents: &str) -> Self {
        Self {
            file: parse_pattern_file(contents),
            ..Self::builtin()
        }
    }

    /// Built-ins plus `path` when it exists
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no external pattern file");
            return Ok(Self::builtin());
        }
        let contents = std::fs::read_to_string(path)?;
        let manager = Self::with_file_contents(&contents);
        tracing::info!(
            path = %path.display(),
            vendors = manager.file.len(),
            "loaded RTSP patterns from file"
        );
        Ok(manager)
    }

    /// Effective ordered, de-duplicated list for `vendor`
    ///
    /// `mac_confirmed` (vendor came from the OUI table) merges built-in and
    /// file lists; otherwise a file section replaces the built-in one. An
    /// unknown vendor gets the Generic list.
    pub fn patterns_for(&self, vendor: &str, mac_confirmed: bool) -> Vec<PatternEntry> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        if mac_confirmed {
            push_unique(&mut out, &mut seen, self.builtin.get(vendor));
            push_unique(&mut out, &mut seen, self.file.get(vendor));
        } else if let Some(list) = self.file.get(vendor) {
            push_unique(&mut out, &mut seen, Some(list));
        } else {
            push_unique(&mut out, &mut seen, self.builtin.get(vendor));
        }

        if out.is_empty() {
            return self.generic();
        }
        out
    }

    /// Universal fallback list (file section wins when present)
    pub fn generic(&self) -> Vec<PatternEntry> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let list = self.file.get(GENERIC).or_else(|| self.builtin.get(GENERIC));
        push_unique(&mut out, &mut seen, list);
        out
    }

    pub fn vendors(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self
            .builtin
            .keys()
            .chain(self.file.keys())
            .map(String::as_str)
            .collect();
        v.sort_unstable();
        v.dedup();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "\
/orphan,/orphan2

# Hikvision DS series
/custom/101,/custom/102
/custom/101,/custom/102
#ignored comment
# Acme Cameras
/acme/live.sdp
/acme/hd,
";

    #[test]
    fn test_parse_pattern_file() {
        let sections = parse_pattern_file(FILE);
        assert_eq!(sections[GENERIC], vec![PatternEntry::new("/orphan", Some("/orphan2"))]);
        assert_eq!(sections["Hikvision"].len(), 2);
        assert_eq!(
            sections["Acme Cameras"],
            vec![
                PatternEntry::new("/acme/live.sdp", None),
                PatternEntry::new("/acme/hd", None),
            ]
        );
    }

    #[test]
    fn test_file_overrides_builtin() {
        let pm = PatternManager::with_file_contents(FILE);
        let hik = pm.patterns_for("Hikvision", false);
        assert_eq!(hik, vec![PatternEntry::new("/custom/101", Some("/custom/102"))]);

        // Dahua is not in the file
        let dahua = pm.patterns_for("Dahua", false);
        assert_eq!(dahua[0].main, "/cam/realmonitor?channel=1&subtype=0");
    }

    #[test]
    fn test_mac_confirmed_merges_lists() {
        let pm = PatternManager::with_file_contents(FILE);
        let hik = pm.patterns_for("Hikvision", true);
        assert_eq!(hik[0].main, "/Streaming/Channels/101");
        assert_eq!(hik.last().unwrap().main, "/custom/101");
        let unique: HashSet<_> = hik.iter().collect();
        assert_eq!(unique.len(), hik.len());
    }

    #[test]
    fn test_unknown_vendor_gets_generic() {
        let pm = PatternManager::builtin();
        assert_eq!(pm.patterns_for("Nobody", false), pm.generic());
        assert_eq!(pm.generic()[0], PatternEntry::new("/live/main", Some("/live/sub")));
    }

    #[test]
    fn test_missing_file_is_fine() {
        let pm = PatternManager::load(Path::new("/nonexistent/rtsp-urls.txt")).unwrap();
        assert!(pm.vendors().contains(&"Hikvision"));
    }
}
