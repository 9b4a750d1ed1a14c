//! Integration tests for multi-term queries and their rewrite methods.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use hasta::index::memory::{MemoryDocument, MemorySegmentBuilder};
use hasta::index::reader::{IndexReader, LeafReader};
use hasta::prelude::*;

const WORDS: &[&str] = &[
    "apple", "apply", "applet", "apricot", "banana", "band", "bandana", "cherry", "chart",
    "charter", "date", "data",
];

fn segment(docs: &[&str]) -> Arc<dyn LeafReader> {
    let mut builder = MemorySegmentBuilder::new();
    for text in docs {
        builder.add_document(MemoryDocument::new().field("word", text));
    }
    builder.build()
}

/// Three segments mixing the words; plenty of filler so the auto rewrite's
/// document cutoff stays out of the way unless a test sets it.
fn searcher() -> IndexSearcher {
    let mut first: Vec<&str> = WORDS[..6].to_vec();
    first.push("apple banana");
    let second: Vec<&str> = WORDS[6..].to_vec();
    let mut third = vec!["apricot cherry", "data date"];
    third.extend(std::iter::repeat_n("filler", 40));
    IndexSearcher::new(Arc::new(IndexReader::new(vec![
        segment(&first),
        segment(&second),
        segment(&third),
    ])))
}

const METHODS: &[RewriteMethod] = &[
    RewriteMethod::ScoringBoolean,
    RewriteMethod::ConstantScoreBoolean,
    RewriteMethod::ConstantScoreFilter,
    RewriteMethod::ConstantScoreAuto {
        term_count_cutoff: 350,
        doc_count_percent: 100.0,
    },
    RewriteMethod::ConstantScoreAuto {
        term_count_cutoff: 1,
        doc_count_percent: 100.0,
    },
    RewriteMethod::TopTermsScoringBoolean { size: 50 },
    RewriteMethod::TopTermsBoostOnlyBoolean { size: 50 },
    RewriteMethod::DocTermOrds,
];

fn matching(searcher: &IndexSearcher, query: &dyn Query) -> Result<BTreeSet<DocId>> {
    let top = searcher.search(query, 1000)?;
    Ok(top.score_docs.iter().map(|hit| hit.doc).collect())
}

fn assert_all_methods_agree<Q>(searcher: &IndexSearcher, make: impl Fn(RewriteMethod) -> Q)
where
    Q: MultiTermQuery + 'static,
{
    let expected = matching(searcher, &make(RewriteMethod::ConstantScoreFilter)).unwrap();
    assert!(!expected.is_empty());
    for method in METHODS {
        let found = matching(searcher, &make(*method)).unwrap();
        assert_eq!(found, expected, "rewrite method {method:?} disagrees");
    }
}

#[test]
fn test_prefix_all_methods_agree() {
    let searcher = searcher();
    assert_all_methods_agree(&searcher, |method| {
        PrefixQuery::new(Term::new("word", "app")).with_rewrite_method(method)
    });
    let query = PrefixQuery::new(Term::new("word", "app"));
    assert_eq!(matching(&searcher, &query).unwrap(), BTreeSet::from([0, 1, 2, 6]));
}

#[test]
fn test_wildcard_and_regexp_agree() -> Result<()> {
    let searcher = searcher();
    assert_all_methods_agree(&searcher, |method| {
        WildcardQuery::new(Term::new("word", "ban?a*"))
            .unwrap()
            .with_rewrite_method(method)
    });
    assert_all_methods_agree(&searcher, |method| {
        RegexpQuery::new(Term::new("word", "cha?r.*"))
            .unwrap()
            .with_rewrite_method(method)
    });

    let wildcard = WildcardQuery::new(Term::new("word", "da?a"))?;
    let regexp = RegexpQuery::new(Term::new("word", "da[a-z]a"))?;
    assert_eq!(matching(&searcher, &wildcard)?, matching(&searcher, &regexp)?);
    Ok(())
}

#[test]
fn test_range_all_methods_agree() {
    let searcher = searcher();
    assert_all_methods_agree(&searcher, |method| {
        TermRangeQuery::new(
            "word",
            Bound::Included("band".to_string()),
            Bound::Excluded("chart".to_string()),
        )
        .with_rewrite_method(method)
    });
}

#[test]
fn test_fuzzy_all_methods_agree() {
    let searcher = searcher();
    assert_all_methods_agree(&searcher, |method| {
        FuzzyQuery::new(Term::new("word", "aple")).with_rewrite_method(method)
    });
}

#[test]
fn test_constant_score_methods_score_the_boost() -> Result<()> {
    let searcher = searcher();
    for method in METHODS.iter().filter(|method| method.is_constant_score()) {
        let query = PrefixQuery::new(Term::new("word", "ap"))
            .with_boost(3.0)
            .with_rewrite_method(*method);
        let top = searcher.search(&query, 100)?;
        let first = top.score_docs[0].score;
        assert!(
            top.score_docs.iter().all(|hit| hit.score == first),
            "{method:?} produced varying scores"
        );
    }
    Ok(())
}

#[test]
fn test_scoring_boolean_scores_per_term() -> Result<()> {
    let searcher = searcher();
    let query = PrefixQuery::new(Term::new("word", "ap"))
        .with_rewrite_method(RewriteMethod::ScoringBoolean);
    let top = searcher.search(&query, 100)?;
    let scores: BTreeSet<u32> = top.score_docs.iter().map(|hit| hit.score.to_bits()).collect();
    assert!(scores.len() > 1, "per-term scores should differ");
    Ok(())
}

#[test]
fn test_top_terms_limits_expansion() -> Result<()> {
    let searcher = searcher();
    let all = FuzzyQuery::new(Term::new("word", "chart"))
        .with_rewrite_method(RewriteMethod::TopTermsScoringBoolean { size: 50 });
    let one = FuzzyQuery::new(Term::new("word", "chart")).max_expansions(1);

    let all_docs = matching(&searcher, &all)?;
    let one_docs = matching(&searcher, &one)?;
    assert!(all_docs.len() > one_docs.len());
    // the exact match is the most competitive term
    assert_eq!(one_docs, BTreeSet::from([9]));
    Ok(())
}

#[test]
fn test_rewritten_form_depends_on_method() -> Result<()> {
    let searcher = searcher();
    let query = PrefixQuery::new(Term::new("word", "ap"));

    // a handful of docs is already more than 0.1% of a small index
    let auto = searcher.rewrite(&query)?;
    let wrapped = auto.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
    assert!(wrapped.filter().is_some());

    let generous = query.clone().with_rewrite_method(RewriteMethod::ConstantScoreAuto {
        term_count_cutoff: 350,
        doc_count_percent: 100.0,
    });
    let rewritten = searcher.rewrite(&generous)?;
    let wrapped = rewritten.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
    let clauses = wrapped.query().unwrap().as_any().downcast_ref::<BooleanQuery>().unwrap();
    assert_eq!(clauses.clauses().len(), 4);
    Ok(())
}

#[test]
fn test_scoring_boolean_overflow_is_recoverable() -> Result<()> {
    let words: Vec<String> = (0..=BooleanQuery::max_clause_count())
        .map(|i| format!("term{i:05}"))
        .collect();
    let docs: Vec<&str> = words.iter().map(String::as_str).collect();
    let searcher = IndexSearcher::new(Arc::new(IndexReader::new(vec![segment(&docs)])));

    let scoring = PrefixQuery::new(Term::new("word", "term"))
        .with_rewrite_method(RewriteMethod::ScoringBoolean);
    assert!(matches!(
        searcher.search(&scoring, 10),
        Err(HastaError::TooManyClauses { .. })
    ));

    // the same query rewritten to a filter has no clause limit
    let filtered = scoring.with_rewrite_method(RewriteMethod::ConstantScoreFilter);
    assert_eq!(searcher.count(&filtered)?, docs.len() as i64);

    let auto = PrefixQuery::new(Term::new("word", "term"));
    assert_eq!(searcher.count(&auto)?, docs.len() as i64);
    Ok(())
}
