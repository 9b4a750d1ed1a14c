//! Single-term query.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::Term;
use crate::index::postings::PostingsFlags;
use crate::index::reader::LeafReaderContext;
use crate::query::{Query, Weight, boost_suffix};
use crate::search::scorer::{Scorer, TermScorer};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::{SimWeight, Similarity};
use crate::search::term_context::TermContext;
use crate::util::bits::Bits;

/// Matches documents containing a term.
///
/// A query built by a rewrite may carry the [`TermContext`] it was collected
/// with, which spares the per-segment dictionary lookups.
#[derive(Debug, Clone)]
pub struct TermQuery {
    term: Term,
    boost: f32,
    context: Option<Arc<TermContext>>,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new(term: Term) -> Self {
        TermQuery {
            term,
            boost: 1.0,
            context: None,
        }
    }

    /// Create a term query with pre-collected per-segment states.
    pub fn with_context(term: Term, context: TermContext) -> Self {
        TermQuery {
            term,
            boost: 1.0,
            context: Some(Arc::new(context)),
        }
    }

    /// Set the boost, builder style.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    /// The pre-collected context, if any.
    pub fn term_context(&self) -> Option<&TermContext> {
        self.context.as_deref()
    }
}

impl Query for TermQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        let num_leaves = searcher.reader().leaves().len();
        let context = match &self.context {
            Some(context) if context.num_leaves() == num_leaves => Arc::clone(context),
            _ => Arc::new(TermContext::build(searcher.reader(), &self.term)?),
        };
        Ok(Box::new(TermWeight::new(
            searcher,
            self.term.clone(),
            self.boost,
            context,
        )?))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!("{}{}", self.term, boost_suffix(self.boost))
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        terms.insert(self.term.clone());
    }

    fn field(&self) -> Option<&str> {
        Some(self.term.field())
    }
}

/// Weight of a [`TermQuery`].
pub struct TermWeight {
    term: Term,
    similarity: Arc<dyn Similarity>,
    sim_weight: SimWeight,
    context: Arc<TermContext>,
}

impl TermWeight {
    fn new(
        searcher: &IndexSearcher,
        term: Term,
        boost: f32,
        context: Arc<TermContext>,
    ) -> Result<Self> {
        let similarity = Arc::clone(searcher.similarity());
        let collection = searcher.collection_statistics(term.field())?;
        let stats = searcher.term_statistics(&term, &context);
        let sim_weight = similarity.compute_weight(boost, &collection, &[stats]);
        Ok(TermWeight {
            term,
            similarity,
            sim_weight,
            context,
        })
    }
}

impl fmt::Debug for TermWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermWeight")
            .field("term", &self.term)
            .field("sim_weight", &self.sim_weight)
            .finish()
    }
}

impl Weight for TermWeight {
    fn value_for_normalization(&self) -> f32 {
        self.similarity.value_for_normalization(&self.sim_weight)
    }

    fn normalize(&mut self, norm: f32, top_level_boost: f32) {
        self.similarity
            .normalize(&mut self.sim_weight, norm, top_level_boost);
    }

    fn scorer(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let Some(state) = self.context.get(context.ord) else {
            return Ok(None);
        };
        let Some(terms) = context.reader.terms(self.term.field())? else {
            return Ok(None);
        };
        let mut terms_enum = terms.iterator()?;
        terms_enum.seek_exact_state(self.term.text(), state)?;
        let postings = terms_enum.postings(accept_docs, PostingsFlags::Freqs)?;
        let doc_scorer = self.similarity.sim_scorer(&self.sim_weight, context)?;
        Ok(Some(Box::new(TermScorer::new(postings, doc_scorer))))
    }
}
