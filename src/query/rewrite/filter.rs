//! Filter-based rewrites: no clause limit, no per-term scores.

use std::sync::Arc;

use crate::error::Result;
use crate::index::DocId;
use crate::index::doc_values::SortedSetDocValues;
use crate::index::postings::PostingsFlags;
use crate::index::reader::LeafReaderContext;
use crate::index::terms::{Terms, TermsEnum};
use crate::query::filter::Filter;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{ConstantScoreQuery, Query};
use crate::search::doc_id_set::{
    BitDocIdSet, DocIdSet, DocIdSetIterator, MatchingDocIdSetIterator, NO_MORE_DOCS,
};
use crate::util::bits::{Bits, FixedBitSet};

/// Accepts every document containing at least one term of the wrapped query.
#[derive(Debug)]
pub struct MultiTermQueryWrapperFilter {
    query: Box<dyn MultiTermQuery>,
}

impl MultiTermQueryWrapperFilter {
    pub fn new(query: Box<dyn MultiTermQuery>) -> Self {
        MultiTermQueryWrapperFilter { query }
    }

    pub fn query(&self) -> &dyn MultiTermQuery {
        self.query.as_ref()
    }
}

impl Filter for MultiTermQueryWrapperFilter {
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>> {
        let Some(terms) = context.reader.terms(self.query.term_field())? else {
            return Ok(None);
        };
        let mut terms_enum = self.query.terms_enum(terms.as_ref())?;
        if terms_enum.next()?.is_none() {
            return Ok(None);
        }

        let mut bits = FixedBitSet::new(context.reader.max_doc().max(0) as usize);
        loop {
            let mut postings = terms_enum.postings(accept_docs.clone(), PostingsFlags::DocsOnly)?;
            let mut doc = postings.next_doc();
            while doc != NO_MORE_DOCS {
                bits.set(doc as usize);
                doc = postings.next_doc();
            }
            if terms_enum.next()?.is_none() {
                break;
            }
        }
        Ok(Some(Arc::new(BitDocIdSet::new(bits))))
    }

    fn description(&self) -> String {
        self.query.description()
    }
}

/// Rewrite to a constant-score query over [`MultiTermQueryWrapperFilter`].
pub(crate) fn constant_score_filter(query: &dyn MultiTermQuery) -> Box<dyn Query> {
    let filter = MultiTermQueryWrapperFilter::new(query.clone_multi_term());
    Box::new(ConstantScoreQuery::from_filter(Arc::new(filter)).with_boost(query.boost()))
}

/// Rewrite to a constant-score query over [`DocTermOrdsFilter`].
pub(crate) fn doc_term_ords(query: &dyn MultiTermQuery) -> Box<dyn Query> {
    let filter = DocTermOrdsFilter::new(query.clone_multi_term());
    Box::new(ConstantScoreQuery::from_filter(Arc::new(filter)).with_boost(query.boost()))
}

/// Accepts every document whose per-document term ordinals include an
/// ordinal accepted by the wrapped query.
///
/// The query's term enumeration runs over the field's ordinal dictionary
/// instead of the postings dictionary.
#[derive(Debug)]
pub struct DocTermOrdsFilter {
    query: Box<dyn MultiTermQuery>,
}

impl DocTermOrdsFilter {
    pub fn new(query: Box<dyn MultiTermQuery>) -> Self {
        DocTermOrdsFilter { query }
    }

    pub fn query(&self) -> &dyn MultiTermQuery {
        self.query.as_ref()
    }
}

impl Filter for DocTermOrdsFilter {
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>> {
        let Some(values) = context.reader.sorted_set_doc_values(self.query.term_field())? else {
            return Ok(None);
        };
        let value_count = values.value_count().max(0) as usize;
        let dictionary = OrdTerms {
            values: Arc::clone(&values),
        };
        let mut terms_enum = self.query.terms_enum(&dictionary)?;

        let mut ords = FixedBitSet::new(value_count);
        let mut any = false;
        while terms_enum.next()?.is_some() {
            if let Some(ord) = terms_enum.ord() {
                ords.set(ord as usize);
                any = true;
            }
        }
        if !any {
            return Ok(None);
        }
        Ok(Some(Arc::new(OrdsDocIdSet {
            max_doc: context.reader.max_doc(),
            values,
            ords: Arc::new(ords),
            accept_docs,
        })))
    }

    fn description(&self) -> String {
        self.query.description()
    }
}

/// Presents a field's ordinal dictionary as [`Terms`].
#[derive(Debug)]
struct OrdTerms {
    values: Arc<dyn SortedSetDocValues>,
}

impl Terms for OrdTerms {
    fn iterator(&self) -> Result<Box<dyn TermsEnum>> {
        self.values.terms_enum()
    }

    fn size(&self) -> i64 {
        self.values.value_count()
    }

    fn doc_count(&self) -> i32 {
        -1
    }

    fn sum_doc_freq(&self) -> i64 {
        -1
    }

    fn sum_total_term_freq(&self) -> i64 {
        -1
    }
}

#[derive(Debug)]
struct OrdsDocIdSet {
    max_doc: DocId,
    values: Arc<dyn SortedSetDocValues>,
    ords: Arc<FixedBitSet>,
    accept_docs: Option<Arc<dyn Bits>>,
}

impl DocIdSet for OrdsDocIdSet {
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>> {
        let values = Arc::clone(&self.values);
        let ords = Arc::clone(&self.ords);
        let accept = self.accept_docs.clone();
        Some(Box::new(MatchingDocIdSetIterator::new(
            self.max_doc,
            move |doc| {
                accept.as_ref().is_none_or(|bits| bits.get(doc as usize))
                    && values.ords(doc).iter().any(|&ord| ords.get(ord as usize))
            },
        )))
    }
}
