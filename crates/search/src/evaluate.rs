use crate::error::{Result, SearchError};
use crate::types::{SearchFilters, SearchHit, SearchOptions, SortBy, SortOrder};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The requested page.
    pub hits: Vec<SearchHit>,
    /// Matches before pagination.
    pub total: usize,
}

impl Evaluation {
    pub(crate) fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
        }
    }
}

/// Runs one search pass over the catalog: substring match, filter
/// conjunction, sort, then the `[offset, offset + limit)` slice.
///
/// An empty or whitespace query matches nothing.
pub fn evaluate(
    catalog: &[SearchHit],
    query: &str,
    filters: &SearchFilters,
    options: &SearchOptions,
) -> Result<Evaluation> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Evaluation::empty());
    }

    if let Some(range) = &filters.date_range {
        if range.start.trim().is_empty() || range.end.trim().is_empty() || range.start > range.end {
            return Err(SearchError::InvalidDateRange {
                start: range.start.clone(),
                end: range.end.clone(),
            });
        }
    }

    let mut matched: Vec<&SearchHit> = catalog
        .iter()
        .filter(|hit| matches_query(hit, &query) && matches_filters(hit, filters))
        .collect();

    matched.sort_by(|a, b| {
        let ordering = match options.sort_by {
            SortBy::Relevance | SortBy::Score => compare_scores(a, b),
            SortBy::Name => a.title.cmp(&b.title),
            SortBy::Date => compare_dates(a, b),
        };
        match options.sort_order {
            SortOrder::Asc => ordering.reverse(),
            SortOrder::Desc => ordering,
        }
    });

    let total = matched.len();
    let start = options.offset.min(total);
    let end = options.offset.saturating_add(options.limit).min(total);
    let hits = matched[start..end].iter().map(|hit| (*hit).clone()).collect();

    Ok(Evaluation { hits, total })
}

fn matches_query(hit: &SearchHit, query: &str) -> bool {
    hit.title.to_lowercase().contains(query)
        || hit.subtitle.to_lowercase().contains(query)
        || hit
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(query))
}

fn matches_filters(hit: &SearchHit, filters: &SearchFilters) -> bool {
    if !filters.kinds.is_empty() && !filters.kinds.contains(&hit.kind) {
        return false;
    }
    if !filters.regions.is_empty() {
        let Some(region) = hit.metadata_str("region") else {
            return false;
        };
        if !filters.regions.iter().any(|r| r == region) {
            return false;
        }
    }
    if !filters.industries.is_empty() {
        let Some(industry) = hit.metadata_str("industry") else {
            return false;
        };
        if !filters.industries.iter().any(|i| i == industry) {
            return false;
        }
    }
    if let Some(wanted) = filters.verified {
        if hit.metadata_bool("verified") != Some(wanted) {
            return false;
        }
    }
    if let Some(range) = &filters.date_range {
        let Some(date) = hit.metadata_str("date") else {
            return false;
        };
        if date < range.start.as_str() || date > range.end.as_str() {
            return false;
        }
    }
    true
}

fn compare_scores(a: &SearchHit, b: &SearchHit) -> Ordering {
    // Descending score; ties break lexicographically so results are stable.
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.title.cmp(&b.title))
}

fn compare_dates(a: &SearchHit, b: &SearchHit) -> Ordering {
    // Newest first; entries without a date sink to the end.
    let a_date = a.metadata_str("date");
    let b_date = b.metadata_str("date");
    match (a_date, b_date) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
