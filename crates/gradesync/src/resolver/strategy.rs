/// A rule deciding whether an observed name stands for a declared one.
pub trait MatchStrategy: Send + Sync {
    /// Short label used in logs and ambiguity reports.
    fn name(&self) -> &'static str;

    fn matches(&self, observed: &str, wanted: &str) -> bool;
}

/// Byte-for-byte equality.
pub struct ExactMatch;

impl MatchStrategy for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, observed: &str, wanted: &str) -> bool {
        observed == wanted
    }
}

/// The observed name starts with the wanted one. The gradebook sometimes
/// decorates names (weights, icons, suffixes) when it renders the tree.
pub struct PrefixMatch;

impl MatchStrategy for PrefixMatch {
    fn name(&self) -> &'static str {
        "prefix"
    }

    fn matches(&self, observed: &str, wanted: &str) -> bool {
        !wanted.is_empty() && observed.starts_with(wanted)
    }
}

/// Case-insensitive substring match. Not part of the default chain.
pub struct ContainsMatch;

impl MatchStrategy for ContainsMatch {
    fn name(&self) -> &'static str {
        "contains"
    }

    fn matches(&self, observed: &str, wanted: &str) -> bool {
        !wanted.is_empty() && observed.to_lowercase().contains(&wanted.to_lowercase())
    }
}
