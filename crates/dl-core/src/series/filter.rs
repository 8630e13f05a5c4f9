use dl_common::CompositeKey;
use regex::Regex;
use std::collections::BTreeMap;

/// Selects keys of a series array or series stats.
///
/// A key passes when every named index column holds the expected value and,
/// if a pattern is set, at least one key part matches it.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    parts: BTreeMap<String, String>,
    pattern: Option<Regex>,
}

impl KeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column` to equal `value`.
    pub fn with_part(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.insert(column.into(), value.into());
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Filter matching exactly `key`.
    pub fn exact(index_keys: &[String], key: &CompositeKey) -> Self {
        index_keys
            .iter()
            .zip(key.parts())
            .fold(Self::new(), |filter, (column, value)| {
                filter.with_part(column.clone(), value.clone())
            })
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.pattern.is_none()
    }

    /// Whether `key`, laid out as `index_keys`, passes the filter.
    ///
    /// A constraint on a column that is not an index column never matches.
    pub fn matches(&self, index_keys: &[String], key: &CompositeKey) -> bool {
        let parts_match = self.parts.iter().all(|(column, expected)| {
            index_keys
                .iter()
                .position(|c| c == column)
                .and_then(|i| key.get(i))
                .is_some_and(|value| value == expected)
        });
        parts_match
            && self
                .pattern
                .as_ref()
                .map_or(true, |re| key.parts().iter().any(|part| re.is_match(part)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> Vec<String> {
        vec!["hostname".into(), "ifDescr".into()]
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = KeyFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&index(), &CompositeKey::new(["a", "b"])));
    }

    #[test]
    fn parts_must_all_match() {
        let filter = KeyFilter::new()
            .with_part("hostname", "srv1")
            .with_part("ifDescr", "eth0");
        assert!(filter.matches(&index(), &CompositeKey::new(["srv1", "eth0"])));
        assert!(!filter.matches(&index(), &CompositeKey::new(["srv1", "eth1"])));
        let unknown = KeyFilter::new().with_part("vlan", "1");
        assert!(!unknown.matches(&index(), &CompositeKey::new(["srv1", "eth0"])));
    }

    #[test]
    fn pattern_matches_any_part() {
        let filter = KeyFilter::new().with_pattern(Regex::new("^eth").unwrap());
        assert!(filter.matches(&index(), &CompositeKey::new(["srv1", "eth0"])));
        assert!(!filter.matches(&index(), &CompositeKey::new(["srv1", "lo"])));
    }

    #[test]
    fn exact_filter_selects_one_key() {
        let key = CompositeKey::new(["srv1", "eth0"]);
        let filter = KeyFilter::exact(&index(), &key);
        assert!(filter.matches(&index(), &key));
        assert!(!filter.matches(&index(), &CompositeKey::new(["srv2", "eth0"])));
    }
}
