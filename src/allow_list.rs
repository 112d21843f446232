//! Source codec allow-list: source stream types listed here are always copied.

/// Characters separating allow-list entries.
pub const ALLOW_LIST_DELIMITERS: [char; 4] = [' ', ',', '|', ';'];

/// Leading character that switches the allow-list off.
pub const DISABLED_SENTINEL: char = '-';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCodecList {
    tokens: Vec<String>,
}

impl SourceCodecList {
    /// Returns `None` for an empty list or one starting with the disabled sentinel.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.starts_with(DISABLED_SENTINEL) {
            return None;
        }
        let tokens = raw
            .split(ALLOW_LIST_DELIMITERS)
            .filter(|token| !token.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Some(Self { tokens })
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, candidate: &str) -> bool {
        contains_token(&self.tokens, candidate)
    }
}

/// Membership over pre-split, lowercase tokens.
pub fn contains_token(tokens: &[String], candidate: &str) -> bool {
    tokens.iter().any(|t| t.eq_ignore_ascii_case(candidate))
}
