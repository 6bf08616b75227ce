//! Suffix-based admission of files into a synchronization run.

/// Decides whether a discovered file participates in synchronization.
///
/// Both suffixes are optional and may be combined; the exclude rule is applied
/// first, so `includes = ".js"` with `excludes = ".min.js"` keeps `app.js` but
/// drops `app.min.js`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    includes: Option<String>,
    excludes: Option<String>,
}

impl PathFilter {
    /// Build a filter. Empty suffixes count as "not configured".
    pub fn new(includes: Option<String>, excludes: Option<String>) -> Self {
        Self {
            includes: includes.filter(|s| !s.is_empty()),
            excludes: excludes.filter(|s| !s.is_empty()),
        }
    }

    /// Filter admitting every non-empty path.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn includes_suffix(&self) -> Option<&str> {
        self.includes.as_deref()
    }

    pub fn excludes_suffix(&self) -> Option<&str> {
        self.excludes.as_deref()
    }

    /// Returns true when `relative_path` takes part in the run.
    pub fn includes(&self, relative_path: &str) -> bool {
        if relative_path.is_empty() {
            return false;
        }
        if let Some(excludes) = &self.excludes {
            if relative_path.ends_with(excludes.as_str()) {
                return false;
            }
        }
        if let Some(includes) = &self.includes {
            if !relative_path.ends_with(includes.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rules_admits_everything_but_empty() {
        let filter = PathFilter::all();
        assert!(filter.includes("a.txt"));
        assert!(filter.includes("dir/b"));
        assert!(!filter.includes(""));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = PathFilter::new(Some(".js".into()), Some(".min.js".into()));
        assert!(filter.includes("lib/app.js"));
        assert!(!filter.includes("a.min.js"));
        assert!(!filter.includes("style.css"));
    }

    #[test]
    fn test_include_only() {
        let filter = PathFilter::new(Some(".html".into()), None);
        assert!(filter.includes("index.html"));
        assert!(!filter.includes("index.htm"));
    }

    #[test]
    fn test_exclude_only() {
        let filter = PathFilter::new(None, Some(".bak".into()));
        assert!(filter.includes("notes.txt"));
        assert!(!filter.includes("notes.txt.bak"));
    }

    #[test]
    fn test_empty_suffixes_are_ignored() {
        let filter = PathFilter::new(Some(String::new()), Some(String::new()));
        assert_eq!(filter, PathFilter::all());
        assert!(filter.includes("anything"));
    }
}
