//! Build artifact selection.
//!
//! A build tree may hold several candidate images (one per toolchain). The
//! candidates are matched against an ordered list of predicates; the first
//! predicate that accepts any candidate decides.

use std::path::{Path, PathBuf};

use crate::error::StampError;

type Predicate = Box<dyn Fn(&str) -> bool>;

/// Ordered predicates over candidate paths. First match wins.
pub struct Strategy {
    predicates: Vec<Predicate>,
}

impl Strategy {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    pub fn then(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Prefers paths containing each substring, in the given order.
    pub fn preferring<S: AsRef<str>>(substrings: &[S]) -> Self {
        substrings.iter().fold(Self::new(), |strategy, s| {
            let needle = s.as_ref().to_string();
            strategy.then(move |path| path.contains(&needle))
        })
    }

    /// Picks one of `candidates`, falling back to the first one.
    pub fn choose<'a>(&self, candidates: &'a [PathBuf]) -> Option<&'a PathBuf> {
        self.predicates
            .iter()
            .find_map(|predicate| {
                candidates
                    .iter()
                    .find(|c| predicate(c.to_string_lossy().replace('\\', "/").as_str()))
            })
            .or_else(|| candidates.first())
    }
}

impl Default for Strategy {
    /// The plain target build first, then GCC builds, then Clang builds.
    fn default() -> Self {
        Self::new()
            .then(|p| p.contains("cmake-build-s32k148/") && !p.contains("-gcc") && !p.contains("-clang"))
            .then(|p| p.contains("gcc"))
            .then(|p| p.contains("clang"))
    }
}

/// Resolves `pattern` to a single object file.
///
/// An existing path is returned unchanged. Otherwise the pattern is globbed
/// and `strategy` picks among the matches.
pub fn select_artifact(pattern: &str, strategy: &Strategy) -> Result<PathBuf, StampError> {
    let path = Path::new(pattern);
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let no_artifact = || StampError::NoArtifact {
        pattern: pattern.to_string(),
    };
    let mut candidates: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|_| no_artifact())?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();

    let chosen = strategy.choose(&candidates).ok_or_else(no_artifact)?.clone();
    if candidates.len() > 1 {
        tracing::warn!(
            "multiple artifacts match {}: {:?}; using {}",
            pattern,
            candidates,
            chosen.display()
        );
    }
    Ok(chosen)
}
