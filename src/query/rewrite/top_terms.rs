//! Rewrites keeping only the most competitive terms.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;

use crate::error::Result;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::index::terms::TermsEnum;
use crate::query::multi_term::MultiTermQuery;
use crate::query::rewrite::{TermCollector, collect_terms, register_state, term_query};
use crate::query::{BooleanQuery, ConstantScoreQuery, Query};
use crate::search::term_context::TermContext;

/// How each kept term scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopTermsMode {
    /// A full term query, boosted by the term's boost.
    Scoring,
    /// The term's boost only.
    BoostOnly,
}

/// Queue entry; the greatest entry is the least competitive one.
#[derive(Debug, Clone)]
struct QueuedTerm {
    boost: f32,
    term: String,
}

impl Ord for QueuedTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        // lower boost first out; among equal boosts the later term goes first
        other
            .boost
            .total_cmp(&self.boost)
            .then_with(|| self.term.cmp(&other.term))
    }
}

impl PartialOrd for QueuedTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTerm {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTerm {}

struct TopTermsCollector {
    num_leaves: usize,
    max_size: usize,
    queue: BinaryHeap<QueuedTerm>,
    visited: AHashMap<String, TermContext>,
}

impl TopTermsCollector {
    fn is_full(&self) -> bool {
        self.queue.len() >= self.max_size
    }

    /// Tell the enumerator what a new term has to beat.
    fn publish_bottom(&self, terms_enum: &mut dyn TermsEnum) {
        if !self.is_full() {
            return;
        }
        if let Some(bottom) = self.queue.peek() {
            let attributes = terms_enum.attributes_mut();
            attributes.max_non_competitive_boost = bottom.boost;
            attributes.competitive_term = Some(bottom.term.clone());
        }
    }
}

impl TermCollector for TopTermsCollector {
    fn set_next_enum(&mut self, _leaf: &LeafReaderContext, terms_enum: &mut dyn TermsEnum) {
        self.publish_bottom(terms_enum);
    }

    fn collect(
        &mut self,
        leaf: &LeafReaderContext,
        terms_enum: &mut dyn TermsEnum,
        term: &str,
    ) -> Result<bool> {
        let boost = terms_enum.attributes().boost;
        if self.is_full() {
            if let Some(bottom) = self.queue.peek() {
                if boost < bottom.boost || (boost == bottom.boost && term > bottom.term.as_str()) {
                    return Ok(true);
                }
            }
        }

        if let Some(context) = self.visited.get_mut(term) {
            debug_assert!(
                self.queue.iter().any(|queued| queued.term == term && queued.boost == boost),
                "boost of {term} differs between segments"
            );
            register_state(context, leaf, terms_enum);
            return Ok(true);
        }

        let mut context = TermContext::new(self.num_leaves);
        register_state(&mut context, leaf, terms_enum);
        self.visited.insert(term.to_string(), context);
        self.queue.push(QueuedTerm {
            boost,
            term: term.to_string(),
        });
        if self.queue.len() > self.max_size {
            if let Some(evicted) = self.queue.pop() {
                self.visited.remove(&evicted.term);
            }
        }
        self.publish_bottom(terms_enum);
        Ok(true)
    }
}

pub(crate) fn rewrite(
    reader: &IndexReader,
    query: &dyn MultiTermQuery,
    size: usize,
    mode: TopTermsMode,
) -> Result<Box<dyn Query>> {
    let max_size = size.min(BooleanQuery::max_clause_count());
    let mut result = BooleanQuery::with_disable_coord(true);
    if max_size == 0 {
        return Ok(Box::new(result));
    }

    let mut collector = TopTermsCollector {
        num_leaves: reader.leaves().len(),
        max_size,
        queue: BinaryHeap::with_capacity(max_size + 1),
        visited: AHashMap::new(),
    };
    collect_terms(reader, query, &mut collector)?;

    let mut kept = collector.queue.into_vec();
    kept.sort_by(|a, b| a.term.cmp(&b.term));
    let mut visited = collector.visited;
    for queued in kept {
        let Some(context) = visited.remove(&queued.term) else {
            continue;
        };
        let boost = query.boost() * queued.boost;
        let clause: Box<dyn Query> = match mode {
            TopTermsMode::Scoring => {
                Box::new(term_query(query.term_field(), queued.term, context, boost))
            }
            TopTermsMode::BoostOnly => {
                let term = term_query(query.term_field(), queued.term, context, 1.0);
                Box::new(ConstantScoreQuery::from_query(Box::new(term)).with_boost(boost))
            }
        };
        result.add_should(clause)?;
    }
    Ok(Box::new(result))
}
