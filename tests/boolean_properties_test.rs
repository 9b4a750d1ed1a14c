//! Property tests: boolean queries agree with set algebra over the
//! documents' tokens, across segment boundaries.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use hasta::index::memory::{MemoryDocument, MemorySegmentBuilder};
use hasta::index::reader::{IndexReader, LeafReader};
use hasta::prelude::*;
use hasta::search::collector::TopScoreDocCollector;

const ALPHABET: &[&str] = &["a", "b", "c", "d", "e"];

/// Per document, the indices of the alphabet tokens it contains.
fn documents() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0..ALPHABET.len(), 1..4), 1..60)
}

fn build(docs: &[Vec<usize>], segment_size: usize) -> IndexSearcher {
    let segments: Vec<Arc<dyn LeafReader>> = docs
        .chunks(segment_size)
        .map(|chunk| {
            let mut builder = MemorySegmentBuilder::new();
            for tokens in chunk {
                let text: Vec<&str> = tokens.iter().map(|&t| ALPHABET[t]).collect();
                builder.add_document(MemoryDocument::new().field("f", &text.join(" ")));
            }
            builder.build() as Arc<dyn LeafReader>
        })
        .collect();
    IndexSearcher::new(Arc::new(IndexReader::new(segments)))
}

fn containing(docs: &[Vec<usize>], token: usize) -> BTreeSet<DocId> {
    docs.iter()
        .enumerate()
        .filter(|(_, tokens)| tokens.contains(&token))
        .map(|(doc, _)| doc as DocId)
        .collect()
}

fn term(token: usize) -> Box<dyn Query> {
    Box::new(TermQuery::new(Term::new("f", ALPHABET[token])))
}

fn hits(searcher: &IndexSearcher, query: &dyn Query) -> BTreeSet<DocId> {
    let top = searcher.search(query, 1000).unwrap();
    assert_eq!(top.total_hits as usize, top.score_docs.len());
    top.score_docs.iter().map(|hit| hit.doc).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_conjunction_is_intersection(
        docs in documents(),
        segment_size in 1usize..20,
        x in 0..ALPHABET.len(),
        y in 0..ALPHABET.len(),
        z in 0..ALPHABET.len(),
    ) {
        let searcher = build(&docs, segment_size);
        let mut query = BooleanQuery::new();
        for token in [x, y, z] {
            query.add_must(term(token)).unwrap();
        }
        let expected: BTreeSet<DocId> = containing(&docs, x)
            .intersection(&containing(&docs, y))
            .copied()
            .collect::<BTreeSet<_>>()
            .intersection(&containing(&docs, z))
            .copied()
            .collect();
        prop_assert_eq!(hits(&searcher, &query), expected);
    }

    #[test]
    fn test_disjunction_is_union(
        docs in documents(),
        segment_size in 1usize..20,
        tokens in prop::collection::btree_set(0..ALPHABET.len(), 2..5),
    ) {
        let searcher = build(&docs, segment_size);
        let mut query = BooleanQuery::new();
        let mut expected = BTreeSet::new();
        for &token in &tokens {
            query.add_should(term(token)).unwrap();
            expected.extend(containing(&docs, token));
        }
        prop_assert_eq!(hits(&searcher, &query), expected);
    }

    #[test]
    fn test_exclusion_is_difference(
        docs in documents(),
        segment_size in 1usize..20,
        required in 0..ALPHABET.len(),
        optional in 0..ALPHABET.len(),
        prohibited in 0..ALPHABET.len(),
    ) {
        let searcher = build(&docs, segment_size);
        let mut query = BooleanQuery::new();
        query.add_must(term(required)).unwrap();
        query.add_should(term(optional)).unwrap();
        query.add_must_not(term(prohibited)).unwrap();
        let expected: BTreeSet<DocId> = containing(&docs, required)
            .difference(&containing(&docs, prohibited))
            .copied()
            .collect();
        prop_assert_eq!(hits(&searcher, &query), expected);
    }

    #[test]
    fn test_minimum_should_match_counts_clauses(
        docs in documents(),
        segment_size in 1usize..20,
        minimum in 1usize..4,
    ) {
        let searcher = build(&docs, segment_size);
        let mut query = BooleanQuery::new();
        for token in 0..4 {
            query.add_should(term(token)).unwrap();
        }
        query.set_minimum_should_match(minimum);
        let expected: BTreeSet<DocId> = docs
            .iter()
            .enumerate()
            .filter(|(_, tokens)| {
                let distinct: BTreeSet<usize> = tokens.iter().copied().filter(|&t| t < 4).collect();
                distinct.len() >= minimum
            })
            .map(|(doc, _)| doc as DocId)
            .collect();
        prop_assert_eq!(hits(&searcher, &query), expected);
    }

    #[test]
    fn test_out_of_order_collection_finds_same_hits(
        docs in documents(),
        segment_size in 1usize..20,
    ) {
        let searcher = build(&docs, segment_size);
        let mut query = BooleanQuery::new();
        query.add_should(term(0)).unwrap();
        query.add_should(term(1)).unwrap();

        let mut in_order = TopScoreDocCollector::create(1000, true).unwrap();
        searcher.search_with_collector(&query, &mut in_order).unwrap();
        let mut out_of_order = TopScoreDocCollector::create(1000, false).unwrap();
        searcher.search_with_collector(&query, &mut out_of_order).unwrap();

        let a: BTreeSet<DocId> = in_order.top_docs().score_docs.iter().map(|hit| hit.doc).collect();
        let b: BTreeSet<DocId> = out_of_order.top_docs().score_docs.iter().map(|hit| hit.doc).collect();
        prop_assert_eq!(a, b);
    }
}
