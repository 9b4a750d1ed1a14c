//! Integration tests for BooleanQuery over multi-segment indexes.

use std::sync::Arc;

use hasta::index::memory::{MemoryDocument, MemorySegmentBuilder};
use hasta::index::reader::{IndexReader, LeafReader};
use hasta::prelude::*;
use hasta::search::similarity::TfIdfSimilarity;

fn tags_segment(docs: &[&str]) -> Arc<dyn LeafReader> {
    let mut builder = MemorySegmentBuilder::new();
    for tags in docs {
        builder.add_document(MemoryDocument::new().field("tags", tags));
    }
    builder.build()
}

/// Two segments; top-level doc ids are 0..=2 and 3..=5.
fn searcher() -> IndexSearcher {
    let segments = vec![
        tags_segment(&["python beginner", "javascript web", "python recipes"]),
        tags_segment(&["python web", "rust systems", "javascript python"]),
    ];
    IndexSearcher::new(Arc::new(IndexReader::new(segments)))
}

fn term(text: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(Term::new("tags", text)))
}

fn docs(top: &TopDocs) -> Vec<DocId> {
    let mut docs: Vec<DocId> = top.score_docs.iter().map(|hit| hit.doc).collect();
    docs.sort_unstable();
    docs
}

#[test]
fn test_boolean_query_must_not() -> Result<()> {
    let searcher = searcher();

    let mut query = BooleanQuery::new();
    query.add_must(term("python"))?;
    query.add_must_not(term("javascript"))?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 3, "Should exclude the JavaScript documents");
    assert_eq!(docs(&top), vec![0, 2, 3]);

    // Multiple MUST_NOT clauses
    let mut query = BooleanQuery::new();
    query.add_must(term("python"))?;
    query.add_must_not(term("javascript"))?;
    query.add_must_not(term("web"))?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(docs(&top), vec![0, 2]);

    // A query of prohibited clauses only matches nothing
    let mut query = BooleanQuery::new();
    query.add_must_not(term("javascript"))?;
    assert_eq!(searcher.count(&query)?, 0);

    Ok(())
}

#[test]
fn test_boolean_query_must_across_segments() -> Result<()> {
    let searcher = searcher();
    let query = BooleanQueryBuilder::new()
        .must(term("python"))
        .must(term("web"))
        .build()?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(docs(&top), vec![3]);

    let query = BooleanQueryBuilder::new()
        .must(term("javascript"))
        .must(term("python"))
        .build()?;
    assert_eq!(docs(&searcher.search(&query, 10)?), vec![5]);
    Ok(())
}

#[test]
fn test_should_clauses_rank_by_overlap() -> Result<()> {
    let reader = Arc::new(IndexReader::new(vec![tags_segment(&[
        "python web",
        "python",
        "web",
        "rust",
    ])]));
    let searcher = IndexSearcher::with_similarity(reader, Arc::new(TfIdfSimilarity));

    let mut query = BooleanQuery::new();
    query.add_should(term("python"))?;
    query.add_should(term("web"))?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 3);
    assert_eq!(top.score_docs[0].doc, 0, "both terms beat one term");
    assert!(top.score_docs[0].score > top.score_docs[1].score);
    Ok(())
}

#[test]
fn test_minimum_should_match() -> Result<()> {
    let searcher = searcher();
    let query = BooleanQueryBuilder::new()
        .should(term("python"))
        .should(term("web"))
        .should(term("javascript"))
        .minimum_should_match(2)
        .build()?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(docs(&top), vec![1, 3, 5]);
    Ok(())
}

#[test]
fn test_required_with_optional_boosts_score() -> Result<()> {
    let searcher = searcher();
    let mut query = BooleanQuery::new();
    query.add_must(term("python"))?;
    query.add_should(term("web"))?;
    let top = searcher.search(&query, 10)?;
    assert_eq!(top.total_hits, 4);
    assert_eq!(top.score_docs[0].doc, 3);
    Ok(())
}

#[test]
fn test_nested_boolean() -> Result<()> {
    let searcher = searcher();
    let mut inner = BooleanQuery::new();
    inner.add_should(term("recipes"))?;
    inner.add_should(term("systems"))?;

    let mut outer = BooleanQuery::new();
    outer.add_must(Box::new(inner))?;
    outer.add_must_not(term("rust"))?;
    assert_eq!(docs(&searcher.search(&outer, 10)?), vec![2]);
    Ok(())
}

#[test]
fn test_concurrent_search_matches_sequential() -> Result<()> {
    let searcher = searcher();
    let mut query = BooleanQuery::new();
    query.add_should(term("python"))?;
    query.add_should(term("javascript"))?;

    let sequential = searcher.search(&query, 10)?;
    let concurrent = searcher.search_concurrent(&query, 10)?;
    assert_eq!(sequential.total_hits, concurrent.total_hits);
    assert_eq!(docs(&sequential), docs(&concurrent));
    Ok(())
}
