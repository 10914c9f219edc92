use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Entry, Match};
use crate::pattern::Pattern;

/// Everything one filter pass produces: all matches in corpus order plus the
/// ranked, size-bounded ordering of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub matches: Vec<Match>,
    pub ranked: Vec<Match>,
}

/// Recomputes matches for a pattern list over a candidate pool.
pub type Refilter = Box<dyn Fn(&[Pattern], &[Arc<Entry>]) -> FilterResult + Send>;

/// Canonical, containment-comparable form of a pattern list. Duplicates and
/// patterns implied by a longer pattern of the same kind are dropped; the
/// rest is kept sorted so equal queries hash equally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    patterns: Vec<Pattern>,
}

impl QueryKey {
    pub fn new(input: &[Pattern]) -> Self {
        let mut distinct: Vec<&Pattern> = Vec::new();
        for pattern in input {
            if !distinct.contains(&pattern) {
                distinct.push(pattern);
            }
        }

        let mut patterns: Vec<Pattern> = distinct
            .iter()
            .filter(|pattern| {
                !distinct
                    .iter()
                    .any(|other| *other != **pattern && other.refines(pattern))
            })
            .map(|pattern| (*pattern).clone())
            .collect();
        patterns.sort();

        Self { patterns }
    }

    /// True when filtering by `self` is guaranteed to narrow a result
    /// computed for `other`: every pattern here extends one of `other`'s,
    /// and none of `other`'s patterns was dropped on the way. Reflexive,
    /// transitive, and antisymmetric over canonical keys.
    pub fn refines(&self, other: &QueryKey) -> bool {
        other
            .patterns
            .iter()
            .all(|theirs| self.patterns.iter().any(|ours| ours.refines(theirs)))
            && self
                .patterns
                .iter()
                .all(|ours| other.patterns.iter().any(|theirs| ours.refines(theirs)))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

struct Hit {
    result: Arc<FilterResult>,
    pool: Vec<Arc<Entry>>,
    stamp: u64,
}

/// Memoizes filter results by query key and serves a refined query by
/// narrowing the tightest previously matched pool instead of rescanning the
/// whole corpus.
pub struct Cache {
    entries: Vec<Arc<Entry>>,
    refilter: Refilter,
    hits: HashMap<QueryKey, Hit>,
    stamp: u64,
}

impl Cache {
    pub fn new(entries: Vec<Arc<Entry>>, refilter: Refilter) -> Self {
        Self {
            entries,
            refilter,
            hits: HashMap::new(),
            stamp: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn filter(&mut self, patterns: &[Pattern]) -> Arc<FilterResult> {
        if patterns
            .iter()
            .any(|pattern| !pattern.kind.incrementally_composable())
        {
            // Non-composable patterns widen as they grow; no cached pool is
            // a safe superset, and their results are not reusable either.
            return Arc::new((self.refilter)(patterns, &self.entries));
        }

        let key = QueryKey::new(patterns);

        if let Some(hit) = self.hits.get(&key) {
            return hit.result.clone();
        }

        let result = match self.find_tightest(&key) {
            Some(pool) => Arc::new((self.refilter)(patterns, &pool)),
            None => Arc::new((self.refilter)(patterns, &self.entries)),
        };
        self.store(key, result.clone());
        result
    }

    /// The usable hit with the fewest candidate entries; ties go to the most
    /// recently stored hit.
    fn find_tightest(&self, key: &QueryKey) -> Option<Vec<Arc<Entry>>> {
        self.hits
            .iter()
            .filter(|(stored, _)| key.refines(stored))
            .min_by(|(_, a), (_, b)| {
                a.pool
                    .len()
                    .cmp(&b.pool.len())
                    .then(b.stamp.cmp(&a.stamp))
            })
            .map(|(_, hit)| hit.pool.clone())
    }

    fn store(&mut self, key: QueryKey, result: Arc<FilterResult>) {
        let pool = result.matches.iter().map(|m| m.entry.clone()).collect();
        self.stamp += 1;
        self.hits.insert(
            key,
            Hit {
                result,
                pool,
                stamp: self.stamp,
            },
        );
    }
}
