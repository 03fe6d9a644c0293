//! Canonical filter state and the request snapshots derived from it.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Identifiers and Enums
// ============================================================================

/// Identifier of a catalog category.
///
/// Stored as a string because persisted selections are JSON string arrays
/// (`["5","9"]`); numeric JSON ids are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for CategoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => CategoryId(s),
            Raw::Number(n) => CategoryId(n.to_string()),
        })
    }
}

/// Listing sort order, serialized as the server's `sort` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "name")]
    NameAsc,
    #[serde(rename = "-name")]
    NameDesc,
    #[serde(rename = "price")]
    PriceAsc,
    #[serde(rename = "-price")]
    PriceDesc,
    #[serde(rename = "newest")]
    Newest,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::PriceAsc,
        SortKey::PriceDesc,
        SortKey::Newest,
    ];

    pub fn as_param(self) -> &'static str {
        match self {
            SortKey::NameAsc => "name",
            SortKey::NameDesc => "-name",
            SortKey::PriceAsc => "price",
            SortKey::PriceDesc => "-price",
            SortKey::Newest => "newest",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::NameAsc => "Name A-Z",
            SortKey::NameDesc => "Name Z-A",
            SortKey::PriceAsc => "Price low-high",
            SortKey::PriceDesc => "Price high-low",
            SortKey::Newest => "Newest",
        }
    }

    /// Next key in display order, wrapping around.
    pub fn next(self) -> SortKey {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// What the listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Products,
    Categories,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Products => "products",
            ItemType::Categories => "categories",
        }
    }

    /// Singular and plural nouns for count labels.
    pub fn nouns(self) -> (&'static str, &'static str) {
        match self {
            ItemType::Products => ("product", "products"),
            ItemType::Categories => ("category", "categories"),
        }
    }
}

// ============================================================================
// Filter State and Request Snapshot
// ============================================================================

/// Canonical filter state owned by the controller.
///
/// The category selection is delegated to the selection store and joined in
/// when a [`FilterQuery`] is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub sort_key: SortKey,
    pub item_type: ItemType,
}

impl FilterState {
    pub fn new(item_type: ItemType, sort_key: SortKey) -> Self {
        Self {
            search_term: String::new(),
            sort_key,
            item_type,
        }
    }

    /// Snapshot the state into request parameters.
    ///
    /// Category browsing always lists the full catalog, so the selection is
    /// dropped for [`ItemType::Categories`].
    pub fn to_query(&self, selected: &[CategoryId]) -> FilterQuery {
        let categories = match self.item_type {
            ItemType::Products => selected.to_vec(),
            ItemType::Categories => Vec::new(),
        };
        FilterQuery {
            search: self.search_term.clone(),
            sort: self.sort_key,
            categories,
            items_only: true,
        }
    }
}

/// Parameters of one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub search: String,
    pub sort: SortKey,
    pub categories: Vec<CategoryId>,
    pub items_only: bool,
}

impl FilterQuery {
    /// Query pairs in wire order; `category` is absent when empty.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", self.search.clone()),
            ("sort", self.sort.as_param().to_string()),
        ];
        if !self.categories.is_empty() {
            params.push(("category", join_ids(&self.categories)));
        }
        if self.items_only {
            params.push(("items_only", "true".to_string()));
        }
        params
    }
}

/// Comma-join category ids for a query parameter.
pub fn join_ids(ids: &[CategoryId]) -> String {
    ids.iter()
        .map(CategoryId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Sequencing
// ============================================================================

/// Issues monotonically increasing sequence numbers for primary requests.
///
/// A resolution is applied only when its number is the highest ever issued.
#[derive(Debug, Default)]
pub struct Sequencer {
    last_issued: u64,
}

impl Sequencer {
    pub fn issue(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    pub fn is_current(&self, sequence: u64) -> bool {
        sequence == self.last_issued
    }
}

/// Lifecycle of the primary listing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    Requesting { sequence: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ids(raw: &[&str]) -> Vec<CategoryId> {
        raw.iter().map(|s| CategoryId::from(*s)).collect()
    }

    #[test]
    fn test_products_query_includes_categories() {
        let mut state = FilterState::new(ItemType::Products, SortKey::NameAsc);
        state.search_term = "boots".to_string();
        let query = state.to_query(&ids(&["3", "7"]));
        assert_eq!(
            query.params(),
            vec![
                ("search", "boots".to_string()),
                ("sort", "name".to_string()),
                ("category", "3,7".to_string()),
                ("items_only", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_categories_query_never_carries_category_param() {
        let state = FilterState::new(ItemType::Categories, SortKey::Newest);
        let query = state.to_query(&ids(&["3", "7"]));
        assert!(query.categories.is_empty());
        assert!(query.params().iter().all(|(k, _)| *k != "category"));
    }

    #[test]
    fn test_category_id_accepts_numbers_and_strings() {
        let parsed: Vec<CategoryId> = serde_json::from_str(r#"["5", 9]"#).unwrap();
        assert_eq!(parsed, ids(&["5", "9"]));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"["5","9"]"#);
    }

    #[test]
    fn test_sort_key_cycles_through_all() {
        let mut key = SortKey::NameAsc;
        for _ in 0..SortKey::ALL.len() {
            key = key.next();
        }
        assert_eq!(key, SortKey::NameAsc);
    }

    #[test]
    fn test_sort_key_serde_matches_param() {
        for key in SortKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_param()));
        }
    }

    proptest! {
        #[test]
        fn prop_only_highest_sequence_is_current(n in 1usize..50, order in any::<u64>()) {
            let mut sequencer = Sequencer::default();
            let mut issued: Vec<u64> = (0..n).map(|_| sequencer.issue()).collect();

            // Arbitrary arrival order
            let len = issued.len();
            issued.rotate_left((order as usize) % len);

            let applied: Vec<u64> = issued
                .into_iter()
                .filter(|seq| sequencer.is_current(*seq))
                .collect();
            prop_assert_eq!(applied, vec![n as u64]);
        }
    }
}
