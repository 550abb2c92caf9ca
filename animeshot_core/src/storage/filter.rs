//! File name filtering using glob patterns
//!
//! Include and exclude patterns are compiled once into a GlobSet and matched
//! against the file name as listed by the store.

use crate::error::{Result, ValidationError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Compiled set of glob patterns
#[derive(Debug, Clone)]
struct PatternMatcher {
    globset: GlobSet,
}

impl PatternMatcher {
    fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| ValidationError::invalid_pattern(pattern, e))?;
            builder.add(glob);
        }

        let globset = builder
            .build()
            .map_err(|e| ValidationError::invalid_pattern(&patterns.join(", "), e))?;

        Ok(Self { globset })
    }

    fn matches(&self, name: &str) -> bool {
        self.globset.is_match(Path::new(name))
    }
}

/// Include/exclude filter over file names
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include_matcher: Option<PatternMatcher>,
    /// Overrides includes
    exclude_matcher: Option<PatternMatcher>,
}

impl FileFilter {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self> {
        let include_matcher = if include_patterns.is_empty() {
            None
        } else {
            Some(PatternMatcher::new(include_patterns)?)
        };

        let exclude_matcher = if exclude_patterns.is_empty() {
            None
        } else {
            Some(PatternMatcher::new(exclude_patterns)?)
        };

        Ok(Self {
            include_matcher,
            exclude_matcher,
        })
    }

    /// Check if a file should be processed
    ///
    /// Rules:
    /// 1. Name matches an exclude pattern -> false
    /// 2. No include patterns -> true
    /// 3. Otherwise the name must match an include pattern
    pub fn should_include(&self, name: &str) -> bool {
        if let Some(ref exclude) = self.exclude_matcher
            && exclude.matches(name)
        {
            return false;
        }

        match self.include_matcher {
            Some(ref include) => include.matches(name),
            None => true,
        }
    }

    pub fn has_patterns(&self) -> bool {
        self.include_matcher.is_some() || self.exclude_matcher.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert!(!filter.has_patterns());
        assert!(filter.should_include("Screenshot_2024.png"));
    }

    #[test]
    fn test_include_only() {
        let filter = FileFilter::new(&patterns(&["*.png", "Screenshot_*"]), &[]).unwrap();

        assert!(filter.should_include("frame.png"));
        assert!(filter.should_include("Screenshot_01.jpg"));
        assert!(!filter.should_include("frame.jpg"));
    }

    #[test]
    fn test_exclude_overrides_include() {
        let filter = FileFilter::new(&patterns(&["*.jpg"]), &patterns(&["*_thumb.jpg"])).unwrap();

        assert!(filter.should_include("scene.jpg"));
        assert!(!filter.should_include("scene_thumb.jpg"));
    }

    #[test]
    fn test_exclude_only() {
        let filter = FileFilter::new(&[], &patterns(&["*.gif"])).unwrap();

        assert!(filter.should_include("scene.jpg"));
        assert!(!filter.should_include("loop.gif"));
    }

    #[test]
    fn test_invalid_pattern_is_validation_error() {
        let err = FileFilter::new(&patterns(&["[unclosed"]), &[]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
