//! Exchange-specific token identifiers
//!
//! xExchange lists tokens by their on-chain identifiers (`WEGLD-bd4d79`)
//! rather than tickers, so every configured pair traded there needs an entry
//! in the mapping table keyed by `BASE-QUOTE`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::PairKey;

/// Token identifiers of one pair on xExchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XExchangeTokensPair {
    pub base: String,
    pub quote: String,
}

/// Lookup table from `BASE-QUOTE` to xExchange token identifiers
///
/// Keys are case-insensitive: the config loader folds table keys to lower
/// case, so both sides are stored and looked up in upper case.
#[derive(Debug, Clone, Default)]
pub struct TokenIdsMappings {
    inner: HashMap<String, XExchangeTokensPair>,
}

impl TokenIdsMappings {
    pub fn new(inner: HashMap<String, XExchangeTokensPair>) -> Self {
        let inner = inner
            .into_iter()
            .map(|(key, pair)| (key.trim().to_uppercase(), pair))
            .collect();
        Self { inner }
    }

    pub fn get(&self, pair: &PairKey) -> Option<&XExchangeTokensPair> {
        self.inner.get(&Self::key(&pair.base, &pair.quote))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &XExchangeTokensPair)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn key(base: &str, quote: &str) -> String {
        format!("{}-{}", base, quote).to_uppercase()
    }
}

impl From<HashMap<String, XExchangeTokensPair>> for TokenIdsMappings {
    fn from(inner: HashMap<String, XExchangeTokensPair>) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_pair() {
        let mut map = HashMap::new();
        map.insert(
            "EGLD-USDC".to_string(),
            XExchangeTokensPair {
                base: "WEGLD-bd4d79".into(),
                quote: "USDC-c76f1f".into(),
            },
        );
        let mappings = TokenIdsMappings::from(map);

        let ids = mappings.get(&PairKey::new("EGLD", "USDC")).unwrap();
        assert_eq!(ids.base, "WEGLD-bd4d79");
        assert!(mappings.get(&PairKey::new("USDC", "EGLD")).is_none());
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn test_lookup_ignores_key_case() {
        let mut map = HashMap::new();
        map.insert(
            "egld-usdc".to_string(),
            XExchangeTokensPair {
                base: "WEGLD-bd4d79".into(),
                quote: "USDC-c76f1f".into(),
            },
        );
        let mappings = TokenIdsMappings::new(map);

        assert!(mappings.get(&PairKey::new("EGLD", "USDC")).is_some());
        assert!(mappings.get(&PairKey::new("egld", "Usdc")).is_some());
        assert_eq!(mappings.iter().next().unwrap().0, "EGLD-USDC");
    }
}
