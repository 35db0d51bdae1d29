use std::path::Path;

use regex::RegexSet;

/// Directory and filename fragments the engine never walks into, mirroring
/// common OS/app metadata stores a media dedup pass has no business
/// touching.
const DEFAULT_EXCLUDE_DIR_NAMES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "@eaDir",
    "#recycle",
    "#snapshot",
    "System Volume Information",
    "$RECYCLE.BIN",
    ".Trash",
    ".Trashes",
    ".Spotlight-V100",
    ".fseventsd",
    "node_modules",
];

const DEFAULT_EXCLUDE_FILE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Compiled set of default excludes plus any caller-supplied glob-style
/// patterns, applied against each path component during the walk.
pub struct ExcludeSet {
    dir_names: Vec<String>,
    file_names: Vec<String>,
    extra: RegexSet,
}

impl ExcludeSet {
    pub fn new(extra_globs: &[String]) -> Self {
        let patterns: Vec<String> = extra_globs.iter().map(|g| glob_to_regex(g)).collect();
        let extra = RegexSet::new(&patterns).unwrap_or_else(|_| RegexSet::empty());
        Self {
            dir_names: DEFAULT_EXCLUDE_DIR_NAMES.iter().map(|s| s.to_string()).collect(),
            file_names: DEFAULT_EXCLUDE_FILE_NAMES.iter().map(|s| s.to_string()).collect(),
            extra,
        }
    }

    pub fn excludes_dir(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.dir_names.iter().any(|d| d == name) || self.matches_extra(path)
    }

    pub fn excludes_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.file_names.iter().any(|f| f == name) || self.matches_extra(path)
    }

    fn matches_extra(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.extra.is_match(&text)
    }
}

/// Translates a small, practical subset of shell globs (`*`, `?`) into a
/// regex; callers needing the full glob grammar should pre-compile their
/// own patterns instead.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_excludes_catch_well_known_dirs() {
        let set = ExcludeSet::new(&[]);
        assert!(set.excludes_dir(&PathBuf::from("/lib/.git")));
        assert!(set.excludes_dir(&PathBuf::from("/lib/@eaDir")));
        assert!(!set.excludes_dir(&PathBuf::from("/lib/Photos")));
    }

    #[test]
    fn default_excludes_catch_well_known_files() {
        let set = ExcludeSet::new(&[]);
        assert!(set.excludes_file(&PathBuf::from("/lib/.DS_Store")));
        assert!(!set.excludes_file(&PathBuf::from("/lib/photo.jpg")));
    }

    #[test]
    fn extra_glob_excludes_match() {
        let set = ExcludeSet::new(&["*.tmp".to_string()]);
        assert!(set.excludes_file(&PathBuf::from("/lib/render.tmp")));
    }
}
