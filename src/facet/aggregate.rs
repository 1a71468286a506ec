//! Occurrence aggregation: the category→tag tree with per-tag counts.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::facet::selection::FacetSelection;
use crate::store::{CatalogStore, CategoryFacets, TagFacet};

/// Upper bound on concurrent per-tag count queries.
const FANOUT_CONCURRENCY: usize = 8;
/// Overall deadline for one aggregation pass.
const FANOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the facet tree with occurrence counts for `selection`.
///
/// Tag inclusion honors the keyword filter only, so the alternatives of an
/// already selected tag stay visible; each occurrence count then applies
/// the full selection plus that tag. Any store error, as well as the
/// overall timeout, degrades to an empty tree so search itself keeps
/// working without facets.
pub async fn aggregate_facets(
    store: &dyn CatalogStore,
    selection: &FacetSelection,
) -> Vec<CategoryFacets> {
    match tokio::time::timeout(FANOUT_TIMEOUT, try_aggregate(store, selection)).await {
        Ok(Ok(tree)) => tree,
        Ok(Err(e)) => {
            tracing::warn!("Facet aggregation failed, serving an empty tree: {}", e);
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                "Facet aggregation exceeded {}s, serving an empty tree",
                FANOUT_TIMEOUT.as_secs()
            );
            Vec::new()
        }
    }
}

async fn try_aggregate(
    store: &dyn CatalogStore,
    selection: &FacetSelection,
) -> Result<Vec<CategoryFacets>> {
    let tree = store.facet_tags(&selection.keyword_only()).await?;

    let counts: Vec<_> = tree
        .iter()
        .flat_map(|entry| entry.tags.iter())
        .map(|tag| {
            let narrowed = selection.with_tag(tag.id);
            let tag_id = tag.id;
            async move {
                let count = store.count_meshes(&narrowed).await?;
                Ok::<_, anyhow::Error>((tag_id, count))
            }
        })
        .collect();

    let occurrences: HashMap<i64, i64> = stream::iter(counts)
        .buffer_unordered(FANOUT_CONCURRENCY)
        .try_collect()
        .await?;

    Ok(tree
        .into_iter()
        .map(|entry| CategoryFacets {
            category: entry.category,
            tags: entry
                .tags
                .into_iter()
                .map(|tag| {
                    let occurrences = occurrences.get(&tag.id).copied().unwrap_or(0);
                    TagFacet { tag, occurrences }
                })
                .collect(),
        })
        .collect())
}
