//! Wildcard URL rules.
//!
//! List entries are user-supplied patterns where `*` matches any run of
//! characters (including none) and every other character is literal, so a
//! `.` in a hostname never means "any character". Matching is anchored:
//! entries are expected to carry leading/trailing `*` where substring
//! behavior is wanted (e.g. `*.example.com/*`).

use regex::Regex;

/// A compiled matcher for one list entry.
///
/// Compilation is total: a pattern the regex engine rejects degrades to a
/// plain substring matcher instead of failing. Immutable once built; the
/// whole [`RuleSet`] is recompiled when the source list changes.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// `*`-expanded pattern, anchored at both ends.
    Wildcard(Regex),
    /// Fallback when compilation fails: substring test on the raw pattern.
    Literal(String),
}

impl Rule {
    /// Compile a wildcard pattern into a matcher. Never fails.
    pub fn compile(pattern: &str) -> Self {
        let expanded = regex::escape(pattern).replace("\\*", ".*");
        let matcher = match Regex::new(&format!("^{expanded}$")) {
            Ok(re) => Matcher::Wildcard(re),
            Err(_) => Matcher::Literal(pattern.to_string()),
        };
        Rule {
            pattern: pattern.to_string(),
            matcher,
        }
    }

    /// The original pattern string this rule was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Full match of `url` against the expanded pattern.
    pub fn matches(&self, url: &str) -> bool {
        match &self.matcher {
            Matcher::Wildcard(re) => re.is_match(url),
            Matcher::Literal(lit) => url.contains(lit.as_str()),
        }
    }
}

/// An ordered collection of rules forming the blacklist or whitelist.
///
/// Order is irrelevant for matching (match = any rule matches). Rebuilt
/// wholesale whenever the underlying string list changes; there is no
/// partial-update API.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile every pattern in `patterns` into a fresh rule set.
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RuleSet {
            rules: patterns
                .into_iter()
                .map(|p| Rule::compile(p.as_ref()))
                .collect(),
        }
    }

    /// True iff any member rule matches `url`.
    ///
    /// Linear scan; lists are small and user-maintained.
    pub fn contains_match(&self, url: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(url))
    }

    /// The source patterns, in list order.
    pub fn patterns(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.pattern.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
