//! Glob and FQCN pattern matching used to exempt files, classes, and
//! symbols from an audit.
//!
//! Patterns follow glob rules over forward-slash paths: `*` stays inside one
//! segment, `**` crosses any depth (a `/` right after it is optional), `?`
//! is a single non-`/` character, and a leading `/` anchors the match to the
//! start of the normalized path. A dotted pattern without slashes is
//! additionally compiled in FQCN shorthand, where `..*` means any subpackage
//! and `.*` a single package segment.

use regex::Regex;

/// A compiled set of whitelist patterns. Matching is case-sensitive and
/// invariant under `\`/`/` and leading-slash differences in the query.
#[derive(Debug, Default)]
pub struct WhitelistMatcher {
    patterns: Vec<Regex>,
}

impl WhitelistMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let dotted = pattern.contains('.') && !pattern.contains('/');
            // In a dotted pattern segments are delimited by dots, so `*`
            // must not cross them; in a path pattern only `/` delimits.
            let segment_class = if dotted { "[^/.]" } else { "[^/]" };
            if let Ok(regex) = Regex::new(&compile_pattern(pattern, segment_class)) {
                compiled.push(regex);
            }
            if dotted {
                // FQCN shorthand: also match the slash-normalized form.
                let slashed = fqcn_to_slash_pattern(pattern);
                if let Ok(regex) = Regex::new(&compile_pattern(&slashed, "[^/]")) {
                    compiled.push(regex);
                }
            }
        }
        Self { patterns: compiled }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Test a file path. Backslashes and a missing leading slash in the
    /// query are normalized away before matching.
    pub fn matches_path(&self, path: &str) -> bool {
        if path.trim().is_empty() || self.patterns.is_empty() {
            return false;
        }
        let normalized = normalize_path(path);
        self.patterns.iter().any(|p| p.is_match(&normalized))
    }

    /// Test a fully qualified class name or `Class#member` symbol in both
    /// its dotted and slash-normalized forms.
    pub fn matches_fqcn_or_symbol(&self, value: &str) -> bool {
        if value.trim().is_empty() {
            return false;
        }
        self.matches_path(value) || self.matches_path(&value.replace('.', "/"))
    }
}

/// Normalize to the internal forward-slash, leading-`/` form.
pub fn normalize_path(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    if slashed.starts_with('/') {
        slashed
    } else {
        format!("/{}", slashed)
    }
}

/// Rewrite an FQCN shorthand pattern into its slash form:
/// `a.b..*` -> `a/b/**`, `a.b.*` -> `a/b/*`, `a.b.C` -> `a/b/C`.
fn fqcn_to_slash_pattern(pattern: &str) -> String {
    pattern
        .replace("..*", "/**")
        .replace(".*", "/*")
        .replace('.', "/")
}

/// Compile one glob pattern into an anchored regex over normalized paths.
/// `segment_class` is the regex class a single `*` or `?` may consume.
fn compile_pattern(pattern: &str, segment_class: &str) -> String {
    let (anchored, body) = match pattern.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };

    let mut regex = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                i += 2;
                if i < chars.len() && chars[i] == '/' {
                    // `**/` spans zero or more whole segments, so the
                    // following slash is effectively optional.
                    regex.push_str("(?:.*/)?");
                    i += 1;
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => {
                regex.push_str(segment_class);
                regex.push('*');
                i += 1;
            }
            '?' => {
                regex.push_str(segment_class);
                i += 1;
            }
            c => {
                regex.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    if anchored {
        format!("^/{}$", regex)
    } else {
        format!("^(?:.*/)?{}$", regex)
    }
}
