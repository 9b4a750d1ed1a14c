//! Boolean query implementation for combining multiple queries.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::query::{Query, Weight, boost_suffix};
use crate::search::bucket::BucketScorer;
use crate::search::conjunction::ConjunctionScorer;
use crate::search::disjunction::DisjunctionSumScorer;
use crate::search::req_excl::ReqExclScorer;
use crate::search::req_opt::{OptionalMode, ReqOptSumScorer};
use crate::search::scorer::{BulkScorer, DefaultBulkScorer, ScaledScorer, Scorer};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;
use crate::util::bits::Bits;

/// Default limit on the number of clauses of one boolean query.
pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

static MAX_CLAUSE_COUNT: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_CLAUSE_COUNT);

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

impl fmt::Display for Occur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occur::Must => write!(f, "+"),
            Occur::Should => Ok(()),
            Occur::MustNot => write!(f, "-"),
        }
    }
}

/// A clause in a boolean query.
#[derive(Debug, Clone)]
pub struct BooleanClause {
    /// The query for this clause.
    pub query: Box<dyn Query>,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(query: Box<dyn Query>, occur: Occur) -> Self {
        BooleanClause { query, occur }
    }

    /// Create a MUST clause.
    pub fn must(query: Box<dyn Query>) -> Self {
        BooleanClause::new(query, Occur::Must)
    }

    /// Create a SHOULD clause.
    pub fn should(query: Box<dyn Query>) -> Self {
        BooleanClause::new(query, Occur::Should)
    }

    /// Create a MUST_NOT clause.
    pub fn must_not(query: Box<dyn Query>) -> Self {
        BooleanClause::new(query, Occur::MustNot)
    }

    pub fn is_required(&self) -> bool {
        self.occur == Occur::Must
    }

    pub fn is_prohibited(&self) -> bool {
        self.occur == Occur::MustNot
    }
}

/// A boolean query that combines multiple queries with boolean logic.
///
/// Documents must match every MUST clause, no MUST_NOT clause, and at least
/// `minimum_should_match` SHOULD clauses (at least one when there are no
/// MUST clauses). Scores are summed over matching clauses and scaled by the
/// similarity's coordination factor unless coordination is disabled.
#[derive(Debug, Clone)]
pub struct BooleanQuery {
    clauses: Vec<BooleanClause>,
    boost: f32,
    minimum_should_match: usize,
    disable_coord: bool,
}

impl BooleanQuery {
    /// Create a new empty boolean query.
    pub fn new() -> Self {
        Self::with_disable_coord(false)
    }

    /// Create an empty boolean query, optionally without coordination.
    pub fn with_disable_coord(disable_coord: bool) -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            boost: 1.0,
            minimum_should_match: 0,
            disable_coord,
        }
    }

    /// Process-wide limit on clauses per query.
    pub fn max_clause_count() -> usize {
        MAX_CLAUSE_COUNT.load(Ordering::Relaxed)
    }

    /// Change the process-wide clause limit.
    pub fn set_max_clause_count(max_clause_count: usize) -> Result<()> {
        if max_clause_count == 0 {
            return Err(HastaError::invalid_argument("maxClauseCount must be >= 1"));
        }
        MAX_CLAUSE_COUNT.store(max_clause_count, Ordering::Relaxed);
        Ok(())
    }

    /// Add a clause; fails once the query holds the maximum number of clauses.
    pub fn add_clause(&mut self, clause: BooleanClause) -> Result<()> {
        let max_clause_count = Self::max_clause_count();
        if self.clauses.len() >= max_clause_count {
            debug!(target: "hasta::query", max_clause_count, "too many boolean clauses");
            return Err(HastaError::too_many_clauses(max_clause_count));
        }
        self.clauses.push(clause);
        Ok(())
    }

    /// Add `query` with the given occurrence.
    pub fn add(&mut self, query: Box<dyn Query>, occur: Occur) -> Result<()> {
        self.add_clause(BooleanClause::new(query, occur))
    }

    /// Add a MUST clause.
    pub fn add_must(&mut self, query: Box<dyn Query>) -> Result<()> {
        self.add_clause(BooleanClause::must(query))
    }

    /// Add a SHOULD clause.
    pub fn add_should(&mut self, query: Box<dyn Query>) -> Result<()> {
        self.add_clause(BooleanClause::should(query))
    }

    /// Add a MUST_NOT clause.
    pub fn add_must_not(&mut self, query: Box<dyn Query>) -> Result<()> {
        self.add_clause(BooleanClause::must_not(query))
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Set the minimum number of should clauses that must match.
    pub fn with_minimum_should_match(mut self, minimum: usize) -> Self {
        self.minimum_should_match = minimum;
        self
    }

    pub fn set_minimum_should_match(&mut self, minimum: usize) {
        self.minimum_should_match = minimum;
    }

    /// Get the clauses.
    pub fn clauses(&self) -> &[BooleanClause] {
        &self.clauses
    }

    /// Get the minimum should match value.
    pub fn minimum_should_match(&self) -> usize {
        self.minimum_should_match
    }

    pub fn is_coord_disabled(&self) -> bool {
        self.disable_coord
    }

    /// Check if this query has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl Query for BooleanQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        let mut weights = Vec::with_capacity(self.clauses.len());
        let mut occurs = Vec::with_capacity(self.clauses.len());
        let mut max_coord = 0;
        for clause in &self.clauses {
            weights.push(clause.query.create_weight(searcher)?);
            occurs.push(clause.occur);
            if !clause.is_prohibited() {
                max_coord += 1;
            }
        }
        Ok(Box::new(BooleanWeight {
            similarity: Arc::clone(searcher.similarity()),
            weights,
            occurs,
            boost: self.boost,
            max_coord,
            disable_coord: self.disable_coord,
            minimum_should_match: self.minimum_should_match,
        }))
    }

    fn rewrite(&self, reader: &IndexReader) -> Result<Option<Box<dyn Query>>> {
        if self.minimum_should_match == 0 && self.clauses.len() == 1 {
            let clause = &self.clauses[0];
            if !clause.is_prohibited() {
                let mut query = match clause.query.rewrite(reader)? {
                    Some(rewritten) => rewritten,
                    None => clause.query.clone_box(),
                };
                if self.boost != 1.0 {
                    query.set_boost(query.boost() * self.boost);
                }
                return Ok(Some(query));
            }
        }

        let mut rewritten: Option<BooleanQuery> = None;
        for (i, clause) in self.clauses.iter().enumerate() {
            if let Some(query) = clause.query.rewrite(reader)? {
                let copy = rewritten.get_or_insert_with(|| self.clone());
                copy.clauses[i] = BooleanClause::new(query, clause.occur);
            }
        }
        Ok(rewritten.map(|query| Box::new(query) as Box<dyn Query>))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let need_parens = self.boost != 1.0 || self.minimum_should_match > 0;
        let mut out = String::new();
        if need_parens {
            out.push('(');
        }
        let parts: Vec<String> = self
            .clauses
            .iter()
            .map(|clause| {
                let inner = clause.query.description();
                if clause.query.as_any().is::<BooleanQuery>() {
                    format!("{}({inner})", clause.occur)
                } else {
                    format!("{}{inner}", clause.occur)
                }
            })
            .collect();
        out.push_str(&parts.join(" "));
        if need_parens {
            out.push(')');
        }
        if self.minimum_should_match > 0 {
            out.push_str(&format!("~{}", self.minimum_should_match));
        }
        out.push_str(&boost_suffix(self.boost));
        out
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        for clause in self.clauses.iter().filter(|clause| !clause.is_prohibited()) {
            clause.query.extract_terms(terms);
        }
    }
}

/// Weight of a [`BooleanQuery`]; assembles the per-segment scorer tree.
#[derive(Debug)]
pub struct BooleanWeight {
    similarity: Arc<dyn Similarity>,
    weights: Vec<Box<dyn Weight>>,
    occurs: Vec<Occur>,
    boost: f32,
    max_coord: usize,
    disable_coord: bool,
    minimum_should_match: usize,
}

impl BooleanWeight {
    /// Coordination factor for `overlap` matching clauses.
    pub fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if self.disable_coord || max_overlap == 1 {
            1.0
        } else {
            self.similarity.coord(overlap, max_overlap)
        }
    }

    fn coord_table(&self) -> Vec<f32> {
        (0..=self.max_coord)
            .map(|overlap| self.coord(overlap, self.max_coord))
            .collect()
    }

    fn without_required(
        &self,
        mut optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        coord: Vec<f32>,
    ) -> Result<Box<dyn Scorer>> {
        let min_optional = self.minimum_should_match.max(1);
        let matcher: Box<dyn Scorer> = if optional.len() == 1 {
            let only = optional.remove(0);
            ScaledScorer::wrap(only, coord[1])
        } else if optional.len() > min_optional {
            Box::new(DisjunctionSumScorer::with_minimum_matchers(
                optional,
                coord,
                min_optional,
            )?)
        } else {
            let factor = coord[optional.len()];
            Box::new(ConjunctionScorer::new(optional, factor))
        };
        exclude(matcher, prohibited)
    }

    fn with_required(
        &self,
        mut required: Vec<Box<dyn Scorer>>,
        mut optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        coord: Vec<f32>,
    ) -> Result<Box<dyn Scorer>> {
        let minimum = self.minimum_should_match;
        if optional.len() == minimum {
            // every optional clause is required too
            required.append(&mut optional);
            let factor = coord[required.len()];
            let all: Box<dyn Scorer> = if required.len() == 1 {
                ScaledScorer::wrap(required.remove(0), factor)
            } else {
                Box::new(ConjunctionScorer::new(required, factor))
            };
            return exclude(all, prohibited);
        }

        let required_clauses = required.len();
        let req: Box<dyn Scorer> = if required.len() == 1 {
            required.remove(0)
        } else {
            Box::new(ConjunctionScorer::new(required, 1.0))
        };
        let opt_is_single = optional.len() == 1;
        let opt: Box<dyn Scorer> = if opt_is_single {
            optional.remove(0)
        } else {
            let ones = vec![1.0; optional.len() + 1];
            Box::new(DisjunctionSumScorer::with_minimum_matchers(
                optional,
                ones,
                minimum.max(1),
            )?)
        };

        if minimum > 0 {
            let both = ReqOptSumScorer::new(
                req,
                opt,
                coord,
                required_clauses,
                opt_is_single,
                OptionalMode::Required,
            );
            exclude(Box::new(both), prohibited)
        } else {
            let req = exclude(req, prohibited)?;
            Ok(Box::new(ReqOptSumScorer::new(
                req,
                opt,
                coord,
                required_clauses,
                opt_is_single,
                OptionalMode::Scoring,
            )))
        }
    }
}

/// Remove documents matched by any of `prohibited` from `matcher`.
fn exclude(
    matcher: Box<dyn Scorer>,
    mut prohibited: Vec<Box<dyn Scorer>>,
) -> Result<Box<dyn Scorer>> {
    match prohibited.len() {
        0 => Ok(matcher),
        1 => Ok(Box::new(ReqExclScorer::new(matcher, prohibited.remove(0)))),
        n => {
            let excluded = DisjunctionSumScorer::new(prohibited, vec![1.0; n + 1])?;
            Ok(Box::new(ReqExclScorer::new(matcher, Box::new(excluded))))
        }
    }
}

impl Weight for BooleanWeight {
    fn value_for_normalization(&self) -> f32 {
        let sum: f32 = self
            .weights
            .iter()
            .zip(&self.occurs)
            .filter(|(_, occur)| **occur != Occur::MustNot)
            .map(|(weight, _)| weight.value_for_normalization())
            .sum();
        sum * self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32, top_level_boost: f32) {
        let top_level_boost = top_level_boost * self.boost;
        for weight in &mut self.weights {
            weight.normalize(norm, top_level_boost);
        }
    }

    fn scorer(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        let mut prohibited = Vec::new();

        for (weight, occur) in self.weights.iter().zip(&self.occurs) {
            match (weight.scorer(context, accept_docs.clone())?, occur) {
                (None, Occur::Must) => return Ok(None),
                (None, _) => {}
                (Some(scorer), Occur::Must) => required.push(scorer),
                (Some(scorer), Occur::Should) => optional.push(scorer),
                (Some(scorer), Occur::MustNot) => prohibited.push(scorer),
            }
        }

        if required.is_empty() && optional.is_empty() {
            return Ok(None);
        }
        if optional.len() < self.minimum_should_match {
            return Ok(None);
        }

        let coord = self.coord_table();
        let scorer = if required.is_empty() {
            self.without_required(optional, prohibited, coord)?
        } else {
            self.with_required(required, optional, prohibited, coord)?
        };
        Ok(Some(scorer))
    }

    /// True for queries without required clauses whose optional clauses do
    /// not all have to match; those can be scored window by window.
    fn scores_docs_out_of_order(&self) -> bool {
        if self.minimum_should_match > 1 || self.occurs.contains(&Occur::Must) {
            return false;
        }
        let optional = self
            .occurs
            .iter()
            .filter(|occur| **occur == Occur::Should)
            .count();
        optional != self.minimum_should_match
    }

    fn bulk_scorer(
        &self,
        context: &LeafReaderContext,
        score_docs_in_order: bool,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn BulkScorer>>> {
        if score_docs_in_order || !self.scores_docs_out_of_order() {
            return Ok(self
                .scorer(context, accept_docs)?
                .map(|scorer| Box::new(DefaultBulkScorer::new(scorer)) as Box<dyn BulkScorer>));
        }

        let mut optional = Vec::new();
        let mut prohibited = Vec::new();
        for (weight, occur) in self.weights.iter().zip(&self.occurs) {
            let Some(scorer) = weight.scorer(context, accept_docs.clone())? else {
                continue;
            };
            if *occur == Occur::MustNot {
                prohibited.push(scorer);
            } else {
                optional.push(scorer);
            }
        }
        if optional.is_empty() {
            return Ok(None);
        }
        let scorer = BucketScorer::new(
            optional,
            prohibited,
            self.coord_table(),
            self.minimum_should_match,
        )?;
        Ok(Some(Box::new(scorer)))
    }
}

/// Builder for creating boolean queries.
#[derive(Debug, Default)]
pub struct BooleanQueryBuilder {
    clauses: Vec<BooleanClause>,
    boost: f32,
    minimum_should_match: usize,
    disable_coord: bool,
}

impl BooleanQueryBuilder {
    /// Create a new boolean query builder.
    pub fn new() -> Self {
        BooleanQueryBuilder {
            boost: 1.0,
            ..Default::default()
        }
    }

    /// Add a MUST clause.
    pub fn must(mut self, query: Box<dyn Query>) -> Self {
        self.clauses.push(BooleanClause::must(query));
        self
    }

    /// Add a SHOULD clause.
    pub fn should(mut self, query: Box<dyn Query>) -> Self {
        self.clauses.push(BooleanClause::should(query));
        self
    }

    /// Add a MUST_NOT clause.
    pub fn must_not(mut self, query: Box<dyn Query>) -> Self {
        self.clauses.push(BooleanClause::must_not(query));
        self
    }

    /// Set the boost factor.
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Set the minimum should match.
    pub fn minimum_should_match(mut self, minimum: usize) -> Self {
        self.minimum_should_match = minimum;
        self
    }

    /// Turn coordination off.
    pub fn disable_coord(mut self) -> Self {
        self.disable_coord = true;
        self
    }

    /// Build the boolean query, enforcing the clause limit.
    pub fn build(self) -> Result<BooleanQuery> {
        let mut query = BooleanQuery::with_disable_coord(self.disable_coord)
            .with_boost(self.boost)
            .with_minimum_should_match(self.minimum_should_match);
        for clause in self.clauses {
            query.add_clause(clause)?;
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::LeafReader;
    use crate::query::TermQuery;
    use crate::search::collector::TopScoreDocCollector;
    use crate::search::phrase::test_support::segment;
    use crate::search::similarity::TfIdfSimilarity;

    fn term(text: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(Term::new("f", text)))
    }

    fn searcher() -> IndexSearcher {
        let segments: Vec<Arc<dyn LeafReader>> = vec![segment(&[
            "a b c", // 0
            "a b",   // 1
            "a c",   // 2
            "b c",   // 3
            "a",     // 4
            "d",     // 5
        ])];
        IndexSearcher::with_similarity(Arc::new(IndexReader::new(segments)), Arc::new(TfIdfSimilarity))
    }

    fn matching(searcher: &IndexSearcher, query: &dyn Query) -> Vec<i32> {
        let mut docs: Vec<i32> = searcher
            .search(query, 100)
            .unwrap()
            .score_docs
            .iter()
            .map(|hit| hit.doc)
            .collect();
        docs.sort_unstable();
        docs
    }

    #[test]
    fn test_boolean_query_description() {
        let query = BooleanQueryBuilder::new()
            .must(term("a"))
            .should(term("b"))
            .must_not(term("c"))
            .build()
            .unwrap();
        assert_eq!(query.description(), "+f:a f:b -f:c");

        let mut outer = BooleanQuery::new().with_boost(2.0).with_minimum_should_match(1);
        outer.add_should(Box::new(query)).unwrap();
        outer.add_should(term("d")).unwrap();
        assert_eq!(outer.description(), "((+f:a f:b -f:c) f:d)~1^2.0");
    }

    #[test]
    fn test_must_clauses_intersect() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().must(term("a")).must(term("b")).build().unwrap();
        assert_eq!(matching(&searcher, &query), vec![0, 1]);
    }

    #[test]
    fn test_should_clauses_union() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().should(term("c")).should(term("d")).build().unwrap();
        assert_eq!(matching(&searcher, &query), vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_must_not_excludes() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().must(term("a")).must_not(term("c")).build().unwrap();
        assert_eq!(matching(&searcher, &query), vec![1, 4]);
    }

    #[test]
    fn test_only_prohibited_matches_nothing() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().must_not(term("a")).build().unwrap();
        assert!(matching(&searcher, &query).is_empty());
    }

    #[test]
    fn test_minimum_should_match() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new()
            .should(term("a"))
            .should(term("b"))
            .should(term("c"))
            .minimum_should_match(2)
            .build()
            .unwrap();
        assert_eq!(matching(&searcher, &query), vec![0, 1, 2, 3]);

        let query = BooleanQueryBuilder::new()
            .must(term("a"))
            .should(term("b"))
            .should(term("c"))
            .minimum_should_match(1)
            .build()
            .unwrap();
        assert_eq!(matching(&searcher, &query), vec![0, 1, 2]);
    }

    #[test]
    fn test_too_few_optional_clauses_for_minimum() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new()
            .should(term("a"))
            .should(term("zzz"))
            .minimum_should_match(2)
            .build()
            .unwrap();
        assert!(matching(&searcher, &query).is_empty());
    }

    #[test]
    fn test_optional_clauses_boost_required_matches() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().must(term("a")).should(term("b")).build().unwrap();
        let top = searcher.search(&query, 10).unwrap();
        assert_eq!(top.total_hits, 4);
        // docs matching both clauses rank above docs matching only "a"
        let leading: Vec<i32> = top.score_docs[..2].iter().map(|hit| hit.doc).collect();
        assert!(leading.contains(&0) && leading.contains(&1));
    }

    #[test]
    fn test_coord_rewards_overlap() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new().should(term("b")).should(term("c")).build().unwrap();
        let weight = searcher.create_normalized_weight(&query).unwrap();
        let mut scorer = weight.scorer(&searcher.reader().leaves()[0], None).unwrap().unwrap();
        let mut scores = Vec::new();
        while scorer.next_doc() != crate::search::doc_id_set::NO_MORE_DOCS {
            scores.push((scorer.doc_id(), scorer.freq(), scorer.score()));
        }
        let both = scores.iter().find(|(doc, _, _)| *doc == 0).unwrap();
        assert_eq!(both.1, 2);

        let disabled = BooleanQueryBuilder::new()
            .should(term("b"))
            .should(term("c"))
            .disable_coord()
            .build()
            .unwrap();
        let top_coord = searcher.search(&query, 10).unwrap();
        let top_plain = searcher.search(&disabled, 10).unwrap();
        let score_of = |top: &crate::search::collector::TopDocs, doc: i32| {
            top.score_docs.iter().find(|hit| hit.doc == doc).map(|hit| hit.score).unwrap()
        };
        // a single matching clause is halved by coord(1, 2)
        assert!(score_of(&top_coord, 1) < score_of(&top_plain, 1));
    }

    #[test]
    fn test_out_of_order_shapes() {
        let searcher = searcher();
        let out_of_order = |query: BooleanQuery| {
            searcher
                .create_normalized_weight(&query)
                .unwrap()
                .scores_docs_out_of_order()
        };
        let should = BooleanQueryBuilder::new().should(term("a")).should(term("b"));
        assert!(out_of_order(should.must_not(term("c")).build().unwrap()));

        let with_required = BooleanQueryBuilder::new().must(term("a")).should(term("b"));
        assert!(!out_of_order(with_required.build().unwrap()));

        let all_optional_required = BooleanQueryBuilder::new()
            .should(term("a"))
            .should(term("b"))
            .minimum_should_match(2);
        assert!(!out_of_order(all_optional_required.build().unwrap()));
    }

    #[test]
    fn test_out_of_order_scoring_matches_in_order() {
        let searcher = searcher();
        let query = BooleanQueryBuilder::new()
            .should(term("a"))
            .should(term("b"))
            .should(term("d"))
            .must_not(term("c"))
            .build()
            .unwrap();

        let bucketed = searcher.search(&query, 10).unwrap();
        let mut collector = TopScoreDocCollector::create(10, true).unwrap();
        searcher.search_with_collector(&query, &mut collector).unwrap();
        let in_order = collector.top_docs();

        assert_eq!(bucketed.total_hits, 3);
        assert_eq!(bucketed.total_hits, in_order.total_hits);
        for (a, b) in bucketed.score_docs.iter().zip(&in_order.score_docs) {
            assert_eq!(a.doc, b.doc);
            assert!((a.score - b.score).abs() < 1e-6);
        }
        let mut docs: Vec<i32> = bucketed.score_docs.iter().map(|hit| hit.doc).collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![1, 4, 5]);
    }

    #[test]
    fn test_single_clause_rewrites_to_clause() {
        let searcher = searcher();
        let mut query = BooleanQuery::new().with_boost(3.0);
        query.add_must(Box::new(TermQuery::new(Term::new("f", "a")).with_boost(2.0))).unwrap();
        let rewritten = searcher.rewrite(&query).unwrap();
        assert!(rewritten.as_any().is::<TermQuery>());
        assert_eq!(rewritten.boost(), 6.0);

        let mut prohibited = BooleanQuery::new();
        prohibited.add_must_not(term("a")).unwrap();
        assert!(prohibited.rewrite(searcher.reader()).unwrap().is_none());
    }

    #[test]
    fn test_too_many_clauses() {
        let limit = BooleanQuery::max_clause_count();
        let mut query = BooleanQuery::new();
        for i in 0..limit {
            query.add_should(term(&format!("t{i}"))).unwrap();
        }
        let err = query.add_should(term("overflow")).unwrap_err();
        assert!(matches!(err, HastaError::TooManyClauses { max_clause_count } if max_clause_count == limit));
    }

    #[test]
    fn test_extract_terms_skips_prohibited() {
        let query = BooleanQueryBuilder::new().must(term("a")).must_not(term("b")).build().unwrap();
        let mut terms = BTreeSet::new();
        query.extract_terms(&mut terms);
        assert_eq!(terms.len(), 1);
        assert!(terms.contains(&Term::new("f", "a")));
    }
}
