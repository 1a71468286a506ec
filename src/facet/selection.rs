//! The combined facet/keyword selection: the single description of "what
//! counts as a match" for one request.

use std::collections::BTreeSet;

use super::keyword;

/// A fully parsed facet state: the set of selected tag ids plus the
/// normalized keyword tokens.
///
/// Both the aggregation engine and the search service consume the same
/// selection, and the SQL renderer in the store mirrors [`matches`] clause
/// for clause, so counts and result pages are always computed against the
/// same predicate.
///
/// [`matches`]: FacetSelection::matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelection {
    tags: BTreeSet<i64>,
    tokens: Vec<String>,
}

impl FacetSelection {
    /// Builds a selection from raw `filters[]` values and an optional raw
    /// keyword. Non-numeric and non-positive filter values are discarded
    /// without error; duplicates collapse into the set.
    pub fn from_raw<I, S>(filters: I, keyword_raw: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = filters
            .into_iter()
            .filter_map(|f| f.as_ref().trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .collect();
        let tokens = keyword_raw
            .map(|k| keyword::tokenize(&keyword::normalize(k)))
            .unwrap_or_default();
        Self { tags, tokens }
    }

    /// Selected tag ids in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = i64> + '_ {
        self.tags.iter().copied()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_keyword(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Returns this selection with `tag` added. Re-selecting an already
    /// selected tag yields an identical selection.
    pub fn with_tag(&self, tag: i64) -> Self {
        let mut next = self.clone();
        next.tags.insert(tag);
        next
    }

    /// Returns the keyword-only part of the selection. Tag inclusion during
    /// aggregation is decided against this universe: whether a tag appears
    /// in the facet list at all ignores the currently selected tags.
    pub fn keyword_only(&self) -> Self {
        Self {
            tags: BTreeSet::new(),
            tokens: self.tokens.clone(),
        }
    }

    /// The canonical predicate: every selected tag must be attached to the
    /// mesh (intersection across tags), and when a keyword is present at
    /// least one token must occur as a substring of the normalized title or
    /// description.
    pub fn matches(&self, mesh_tags: &[i64], title_norm: &str, description_norm: &str) -> bool {
        if !self.tags.iter().all(|t| mesh_tags.contains(t)) {
            return false;
        }
        if self.tokens.is_empty() {
            return true;
        }
        self.tokens
            .iter()
            .any(|tok| title_norm.contains(tok.as_str()) || description_norm.contains(tok.as_str()))
    }
}

// ============================================================================
// Tests
// ============================================================================
