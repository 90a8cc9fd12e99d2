use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Supplier,
    Price,
    Logistics,
    Document,
    Agent,
}

/// One searchable entry in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub kind: ResultKind,
    pub title: String,
    pub subtitle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SearchHit {
    pub(crate) fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    pub(crate) fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(serde_json::Value::as_bool)
    }
}

/// Inclusive bounds, as ISO 8601 strings so ordering is lexicographic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Active constraints; an empty list means "no constraint on that axis".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub kinds: Vec<ResultKind>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

/// Shallow merge into [`SearchFilters`]: set fields replace, unset fields
/// keep the current value.
#[derive(Debug, Clone, Default)]
pub struct FilterPatch {
    pub kinds: Option<Vec<ResultKind>>,
    pub regions: Option<Vec<String>>,
    pub industries: Option<Vec<String>>,
    pub verified: Option<Option<bool>>,
    pub date_range: Option<Option<DateRange>>,
}

impl FilterPatch {
    pub fn apply(self, filters: &mut SearchFilters) {
        if let Some(kinds) = self.kinds {
            filters.kinds = kinds;
        }
        if let Some(regions) = self.regions {
            filters.regions = regions;
        }
        if let Some(industries) = self.industries {
            filters.industries = industries;
        }
        if let Some(verified) = self.verified {
            filters.verified = verified;
        }
        if let Some(date_range) = self.date_range {
            filters.date_range = date_range;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Relevance,
    Date,
    Name,
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort_by: SortBy::Relevance,
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsPatch {
    pub limit: Option<usize>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl OptionsPatch {
    pub fn apply(self, options: &mut SearchOptions) {
        if let Some(limit) = self.limit {
            options.limit = limit.max(1);
        }
        if let Some(sort_by) = self.sort_by {
            options.sort_by = sort_by;
        }
        if let Some(sort_order) = self.sort_order {
            options.sort_order = sort_order;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn filter_patch_merges_shallowly() {
        let mut filters = SearchFilters {
            regions: vec!["Kenya".to_string()],
            verified: Some(true),
            ..SearchFilters::default()
        };

        FilterPatch {
            regions: Some(vec!["Uganda".to_string()]),
            ..FilterPatch::default()
        }
        .apply(&mut filters);

        assert_eq!(filters.regions, vec!["Uganda".to_string()]);
        assert_eq!(filters.verified, Some(true));

        FilterPatch {
            verified: Some(None),
            ..FilterPatch::default()
        }
        .apply(&mut filters);
        assert_eq!(filters.verified, None);
    }

    #[test]
    fn options_patch_keeps_unset_fields_and_rejects_zero_limit() {
        let mut options = SearchOptions::default();
        OptionsPatch {
            limit: Some(0),
            sort_by: Some(SortBy::Name),
            ..OptionsPatch::default()
        }
        .apply(&mut options);

        assert_eq!(options.limit, 1);
        assert_eq!(options.sort_by, SortBy::Name);
        assert_eq!(options.sort_order, SortOrder::Desc);
    }
}
