/// Explicit pattern-type prefixes, in the order the input editor cycles
/// through them. A bare token is a fuzzy pattern.
pub const PATTERN_PREFIXES: [&str; 2] = ["@*", "@!"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternKind {
    Fuzzy,
    Exact,
    InverseExact,
}

impl PatternKind {
    /// Whether filtering by a longer literal of this kind always yields a
    /// subset of the shorter literal's matches. Inverse patterns widen as
    /// they grow, so they cannot be served from a cached superset.
    pub fn incrementally_composable(self) -> bool {
        !matches!(self, Self::InverseExact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pattern {
    pub kind: PatternKind,
    pub literal: String,
}

impl Pattern {
    pub fn new(kind: PatternKind, literal: &str) -> Self {
        Self {
            kind,
            literal: literal.to_string(),
        }
    }

    /// Peels the explicit type prefix off a raw token.
    pub fn build(token: &str) -> Self {
        if let Some(literal) = token.strip_prefix("@*") {
            return Self::new(PatternKind::Exact, literal);
        }
        if let Some(literal) = token.strip_prefix("@!") {
            return Self::new(PatternKind::InverseExact, literal);
        }
        Self::new(PatternKind::Fuzzy, token)
    }

    /// True when every entry matching `self` also matches `other`: same kind
    /// and `other`'s literal occurs inside this one.
    pub fn refines(&self, other: &Pattern) -> bool {
        self.kind == other.kind && self.literal.contains(&other.literal)
    }
}

/// Splits a raw query into patterns. Tokens separate on spaces; `\` escapes
/// the next character, so `\ ` is a hard space inside one token and `\\` is a
/// literal backslash. Escapes resolve in a single left-to-right pass: `\\ `
/// is a backslash followed by a separator, while `\\\ ` is a backslash
/// followed by a hard space. Empty tokens from repeated separators are
/// dropped.
pub fn parse_patterns(raw: &str) -> Vec<Pattern> {
    // Common case: no separator and no escape means a single pattern.
    if !raw.contains(' ') && !raw.contains('\\') {
        if raw.is_empty() {
            return Vec::new();
        }
        return vec![Pattern::build(raw)];
    }

    let mut tokens: Vec<String> = vec![String::new()];
    let mut chars = raw.trim_start().chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().unwrap_or('\\');
                if let Some(token) = tokens.last_mut() {
                    token.push(escaped);
                }
            }
            ' ' => tokens.push(String::new()),
            _ => {
                if let Some(token) = tokens.last_mut() {
                    token.push(c);
                }
            }
        }
    }

    tokens
        .iter()
        .filter(|token| !token.is_empty())
        .map(|token| Pattern::build(token))
        .collect()
}
