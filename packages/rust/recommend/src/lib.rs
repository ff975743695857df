//! Catalog-based resource recommendation.
//!
//! Entries are ranked by shared-tag count, then priority, then catalog order,
//! which is a total order: identical input always gives identical output.
//! When no entry shares a tag, the catalog's fallback entry is returned alone.

mod catalog;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, instrument};

use recap_shared::{ActionItem, KnowledgeBaseEntry, RankedResource, Recommendation};

pub use catalog::{CatalogSpec, EntrySpec, KnowledgeBase, builtin_catalog_toml};

/// Maximum resources per recommendation.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Number of tags two sets share.
pub fn tag_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}

/// Recommend resources for one action item.
///
/// `action_index` is the item's position in its meeting's action list.
pub fn recommend(item: &ActionItem, action_index: usize, kb: &KnowledgeBase) -> Recommendation {
    let mut candidates: Vec<(usize, &KnowledgeBaseEntry, usize)> = kb
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| (i, entry, tag_overlap(&item.tags, &entry.tags)))
        .filter(|(_, _, overlap)| *overlap > 0)
        .collect();

    candidates.sort_by(|a, b| rank_order(a, b));
    candidates.truncate(MAX_RECOMMENDATIONS);

    let resources: Vec<RankedResource> = if candidates.is_empty() {
        vec![RankedResource {
            rank: 1,
            entry: kb.fallback().clone(),
            overlap: 0,
            score: 0.0,
            fallback: true,
        }]
    } else {
        candidates
            .into_iter()
            .enumerate()
            .map(|(pos, (_, entry, overlap))| RankedResource {
                rank: pos + 1,
                entry: entry.clone(),
                overlap,
                score: overlap as f64 * entry.priority,
                fallback: false,
            })
            .collect()
    };

    debug!(
        sequence = item.source_sequence,
        resources = resources.len(),
        fallback = resources[0].fallback,
        "recommendation built"
    );

    Recommendation {
        meeting_id: item.meeting_id.clone(),
        action_index,
        source_sequence: item.source_sequence,
        resources,
    }
}

/// Recommend resources for every action item, preserving order.
#[instrument(skip_all, fields(items = items.len()))]
pub fn recommend_all(items: &[ActionItem], kb: &KnowledgeBase) -> Vec<Recommendation> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| recommend(item, i, kb))
        .collect()
}

/// Overlap descending, priority descending, catalog index ascending.
fn rank_order(
    a: &(usize, &KnowledgeBaseEntry, usize),
    b: &(usize, &KnowledgeBaseEntry, usize),
) -> Ordering {
    b.2.cmp(&a.2)
        .then_with(|| b.1.priority.total_cmp(&a.1.priority))
        .then_with(|| a.0.cmp(&b.0))
}
