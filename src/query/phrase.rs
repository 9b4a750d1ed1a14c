//! Phrase query: terms at fixed relative positions, optionally sloppy.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::postings::PostingsFlags;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::query::{BooleanQuery, Query, TermQuery, Weight, boost_suffix};
use crate::search::phrase::PostingsAndFreq;
use crate::search::phrase::exact::ExactPhraseScorer;
use crate::search::phrase::sloppy::SloppyPhraseScorer;
use crate::search::scorer::Scorer;
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::{SimWeight, Similarity};
use crate::search::term_context::TermContext;
use crate::util::bits::Bits;

/// Matches documents containing a sequence of terms.
///
/// Each term carries its position within the phrase. With a slop of zero
/// the terms must occur exactly at those relative positions; a positive
/// slop allows them to be that many moves apart (or out of order), and
/// closer matches score higher.
#[derive(Debug, Clone, Default)]
pub struct PhraseQuery {
    field: Option<String>,
    terms: Vec<Term>,
    positions: Vec<i32>,
    max_position: i32,
    slop: i32,
    boost: f32,
}

impl PhraseQuery {
    /// Create an empty phrase query.
    pub fn new() -> Self {
        PhraseQuery {
            boost: 1.0,
            ..Default::default()
        }
    }

    /// Build a phrase of `words` at consecutive positions in `field`.
    pub fn from_words(field: &str, words: &[&str]) -> Self {
        let mut query = Self::new();
        for word in words {
            // every term shares the field, so this cannot fail
            let _ = query.add(Term::new(field, *word));
        }
        query
    }

    /// Append `term` one position after the last term.
    pub fn add(&mut self, term: Term) -> Result<()> {
        let position = self.positions.last().map_or(0, |last| last + 1);
        self.add_at(term, position)
    }

    /// Add `term` at an explicit `position` within the phrase.
    pub fn add_at(&mut self, term: Term, position: i32) -> Result<()> {
        match &self.field {
            Some(field) if field != term.field() => {
                return Err(HastaError::invalid_argument(format!(
                    "All phrase terms must be in the same field: {term}"
                )));
            }
            Some(_) => {}
            None => self.field = Some(term.field().to_string()),
        }
        self.terms.push(term);
        self.positions.push(position);
        self.max_position = self.max_position.max(position);
        Ok(())
    }

    /// Set the slop, builder style.
    pub fn with_slop(mut self, slop: i32) -> Self {
        self.slop = slop;
        self
    }

    pub fn set_slop(&mut self, slop: i32) {
        self.slop = slop;
    }

    pub fn slop(&self) -> i32 {
        self.slop
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn positions(&self) -> &[i32] {
        &self.positions
    }
}

impl Query for PhraseQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        Ok(Box::new(PhraseWeight::new(searcher, self)?))
    }

    fn rewrite(&self, _reader: &IndexReader) -> Result<Option<Box<dyn Query>>> {
        match self.terms.len() {
            0 => Ok(Some(Box::new(BooleanQuery::new().with_boost(self.boost)))),
            1 => {
                let query = TermQuery::new(self.terms[0].clone()).with_boost(self.boost);
                Ok(Some(Box::new(query)))
            }
            _ => Ok(None),
        }
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let mut slots: Vec<Option<String>> = vec![None; self.max_position.max(0) as usize + 1];
        for (term, &position) in self.terms.iter().zip(&self.positions) {
            let Some(slot) = slots.get_mut(position.max(0) as usize) else {
                continue;
            };
            match slot {
                Some(text) => {
                    text.push('|');
                    text.push_str(term.text());
                }
                None => *slot = Some(term.text().to_string()),
            }
        }
        let body: Vec<String> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| "?".to_string()))
            .collect();

        let mut out = String::new();
        if let Some(field) = &self.field {
            out.push_str(field);
            out.push(':');
        }
        out.push('"');
        if !self.terms.is_empty() {
            out.push_str(&body.join(" "));
        }
        out.push('"');
        if self.slop != 0 {
            out.push_str(&format!("~{}", self.slop));
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
        terms.extend(self.terms.iter().cloned());
    }

    fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

/// Weight of a [`PhraseQuery`]; statistics of all its terms feed one
/// similarity weight.
pub struct PhraseWeight {
    field: String,
    terms: Vec<Term>,
    positions: Vec<i32>,
    slop: i32,
    similarity: Arc<dyn Similarity>,
    sim_weight: SimWeight,
    states: Vec<TermContext>,
}

impl PhraseWeight {
    fn new(searcher: &IndexSearcher, query: &PhraseQuery) -> Result<Self> {
        let field = query
            .field
            .clone()
            .ok_or_else(|| HastaError::query("phrase query without terms cannot be weighted"))?;
        let similarity = Arc::clone(searcher.similarity());
        let mut states = Vec::with_capacity(query.terms.len());
        let mut stats = Vec::with_capacity(query.terms.len());
        for term in &query.terms {
            let context = TermContext::build(searcher.reader(), term)?;
            stats.push(searcher.term_statistics(term, &context));
            states.push(context);
        }
        let collection = searcher.collection_statistics(&field)?;
        let sim_weight = similarity.compute_weight(query.boost, &collection, &stats);
        Ok(PhraseWeight {
            field,
            terms: query.terms.clone(),
            positions: query.positions.clone(),
            slop: query.slop,
            similarity,
            sim_weight,
            states,
        })
    }
}

impl fmt::Debug for PhraseWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhraseWeight")
            .field("terms", &self.terms)
            .field("positions", &self.positions)
            .field("slop", &self.slop)
            .field("sim_weight", &self.sim_weight)
            .finish()
    }
}

impl Weight for PhraseWeight {
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
        let Some(terms) = context.reader.terms(&self.field)? else {
            return Ok(None);
        };

        let mut postings = Vec::with_capacity(self.terms.len());
        for ((term, &position), states) in self.terms.iter().zip(&self.positions).zip(&self.states) {
            let Some(state) = states.get(context.ord) else {
                return Ok(None);
            };
            if !terms.has_positions() {
                return Err(HastaError::illegal_state(format!(
                    "field \"{}\" was indexed without position data; cannot run PhraseQuery (term={})",
                    self.field,
                    term.text()
                )));
            }
            let mut terms_enum = terms.iterator()?;
            terms_enum.seek_exact_state(term.text(), state)?;
            let docs = terms_enum.postings(accept_docs.clone(), PostingsFlags::Positions)?;
            postings.push(PostingsAndFreq::new(
                docs,
                state.doc_freq,
                position,
                term.clone(),
            ));
        }

        let doc_scorer = self.similarity.sim_scorer(&self.sim_weight, context)?;
        if self.slop == 0 {
            postings.sort_by(PostingsAndFreq::rarest_first);
            let scorer = ExactPhraseScorer::new(postings, doc_scorer);
            if scorer.has_no_docs() {
                return Ok(None);
            }
            Ok(Some(Box::new(scorer)))
        } else {
            Ok(Some(Box::new(SloppyPhraseScorer::new(
                postings,
                self.slop,
                doc_scorer,
            ))))
        }
    }
}
