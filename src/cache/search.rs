use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::cluster::ClusterId;

use super::TreeCache;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub id: ClusterId,
    pub score: i64,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl TreeCache {
    /// Cached clusters whose `offset-cardinality` label fuzzily matches
    /// `query`, best first. Only active nodes are searched unless
    /// `include_hidden` is set.
    pub fn search(&self, query: &str, include_hidden: bool) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut hits = self
            .nodes
            .values()
            .filter(|node| include_hidden || node.active)
            .filter_map(|node| {
                fuzzy_match_score(&matcher, &node.id().to_string(), query)
                    .map(|score| SearchHit { id: node.id(), score })
            })
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FixtureEngine;

    #[test]
    fn exact_label_ranks_first_and_hidden_nodes_are_optional() {
        let engine = FixtureEngine::new(3);
        let mut cache = TreeCache::new();
        cache.sync_names(&engine, engine.root_id(), 3).unwrap();
        for depth in 0..=3 {
            for id in engine.ids_at_depth(depth) {
                cache.get_mut(id).unwrap().active = true;
            }
        }

        let target = ClusterId::new(4, 2);
        let hits = cache.search("4-2", true);
        assert_eq!(hits.first().map(|hit| hit.id), Some(target));

        cache.get_mut(target).unwrap().active = false;
        assert!(cache.search("4-2", false).iter().all(|hit| hit.id != target));
        assert!(cache.search("   ", true).is_empty());
    }
}
