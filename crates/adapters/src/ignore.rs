//! Ignore matcher adapter.

use semantic_code_ports::{IgnoreMatchInput, IgnorePort};

/// Ignore matcher with deterministic normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreMatcher;

impl IgnoreMatcher {
    /// Build a default ignore matcher.
    pub const fn new() -> Self {
        Self
    }
}

impl IgnorePort for IgnoreMatcher {
    fn is_ignored(&self, input: &IgnoreMatchInput) -> bool {
        let normalized_path = normalize_path(input.relative_path.as_ref());
        let path_segments = split_segments(&normalized_path);
        if path_segments.is_empty() {
            return false;
        }

        // Any path component starting with `.` is always ignored, regardless
        // of the pattern list (dotfiles, `.git/`, `.context/`, etc.).
        if path_segments.iter().any(|segment| segment.starts_with('.')) {
            return true;
        }

        let patterns = normalize_patterns(&input.ignore_patterns);
        if patterns.is_empty() {
            return false;
        }

        for pattern in patterns {
            let pattern_segments = split_segments(&pattern);
            if pattern_segments.is_empty() {
                continue;
            }
            if matches_segments(&path_segments, &pattern_segments) {
                return true;
            }
            // A `*` in a path glob (pattern containing `/`) spans arbitrary
            // characters, including further `/` separators, so also try a
            // single glob match against the fully joined path.
            if pattern.contains('*')
                && pattern_segments.len() > 1
                && glob_match(&pattern, &normalized_path)
            {
                return true;
            }
        }
        false
    }
}

fn normalize_patterns(patterns: &[Box<str>]) -> Vec<String> {
    let mut normalized = patterns
        .iter()
        .filter_map(|pattern| {
            let trimmed = pattern.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(normalize_path(trimmed))
        })
        .collect::<Vec<_>>();
    normalized.sort();
    normalized.dedup();
    normalized
}

fn normalize_path(input: &str) -> String {
    let trimmed = input.trim();
    let replaced = trimmed.replace('\\', "/");
    let collapsed = collapse_forward_slashes(&replaced);
    let collapsed = collapsed.trim_start_matches("./");
    collapsed.trim_matches('/').to_owned()
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

fn matches_segments(path: &[&str], pattern: &[&str]) -> bool {
    if pattern.len() > path.len() {
        return false;
    }
    for window in path.windows(pattern.len()) {
        if window
            .iter()
            .zip(pattern.iter())
            .all(|(segment, glob)| glob_match(glob, segment))
        {
            return true;
        }
    }
    false
}

/// Simple glob match: `*` matches any sequence of characters (including
/// none), anchored against the full text. No other wildcard is supported.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut match_from = 0usize;

    while ti < text.len() {
        let literal_match = pattern.get(pi).is_some_and(|&p| p == text[ti]);
        if pattern.get(pi) == Some(&'*') {
            star = Some(pi);
            match_from = ti;
            pi += 1;
        } else if literal_match {
            pi += 1;
            ti += 1;
        } else if let Some(star_pi) = star {
            pi = star_pi + 1;
            match_from += 1;
            ti = match_from;
        } else {
            return false;
        }
    }
    while pattern.get(pi) == Some(&'*') {
        pi += 1;
    }
    pi == pattern.len()
}

fn collapse_forward_slashes(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_was_slash = false;

    for ch in input.chars() {
        if ch == '/' {
            if previous_was_slash {
                continue;
            }
            previous_was_slash = true;
        } else {
            previous_was_slash = false;
        }
        output.push(ch);
    }

    output
}
