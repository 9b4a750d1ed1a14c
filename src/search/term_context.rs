//! Per-segment term states with index-wide statistics.

use crate::error::Result;
use crate::index::Term;
use crate::index::reader::IndexReader;
use crate::index::terms::TermState;

/// Term states of one term for every leaf of one top-level reader, plus the
/// aggregated document frequency and total term frequency.
///
/// Each leaf ordinal is registered at most once. The aggregated total term
/// frequency becomes `-1` permanently as soon as one leaf reports it unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct TermContext {
    states: Vec<Option<TermState>>,
    doc_freq: i32,
    total_term_freq: i64,
}

impl TermContext {
    /// An empty context for a reader with `num_leaves` leaves.
    pub fn new(num_leaves: usize) -> Self {
        TermContext {
            states: vec![None; num_leaves],
            doc_freq: 0,
            total_term_freq: 0,
        }
    }

    /// A context holding a single registered state.
    pub fn with_state(num_leaves: usize, state: TermState, ord: usize) -> Self {
        let mut context = Self::new(num_leaves);
        let (doc_freq, total_term_freq) = (state.doc_freq, state.total_term_freq);
        context.register(state, ord, doc_freq, total_term_freq);
        context
    }

    /// Look `term` up in every leaf of `reader`.
    pub fn build(reader: &IndexReader, term: &Term) -> Result<Self> {
        let mut context = Self::new(reader.leaves().len());
        for leaf in reader.leaves() {
            let Some(terms) = leaf.reader.terms(term.field())? else {
                continue;
            };
            let mut terms_enum = terms.iterator()?;
            if terms_enum.seek_exact(term.text())? {
                let state = terms_enum.term_state();
                context.register(
                    state,
                    leaf.ord,
                    terms_enum.doc_freq(),
                    terms_enum.total_term_freq(),
                );
            }
        }
        Ok(context)
    }

    /// Record the state of leaf `ord` and fold its statistics into the totals.
    pub fn register(&mut self, state: TermState, ord: usize, doc_freq: i32, total_term_freq: i64) {
        debug_assert!(ord < self.states.len(), "leaf ord {ord} out of range");
        debug_assert!(
            self.states[ord].is_none(),
            "state for leaf ord {ord} registered twice"
        );
        self.states[ord] = Some(state);
        self.doc_freq += doc_freq;
        if self.total_term_freq >= 0 && total_term_freq >= 0 {
            self.total_term_freq += total_term_freq;
        } else {
            self.total_term_freq = -1;
        }
    }

    /// State registered for leaf `ord`.
    pub fn get(&self, ord: usize) -> Option<&TermState> {
        self.states.get(ord).and_then(|state| state.as_ref())
    }

    /// Forget all states and statistics.
    pub fn clear(&mut self) {
        self.states.iter_mut().for_each(|state| *state = None);
        self.doc_freq = 0;
        self.total_term_freq = 0;
    }

    /// Number of leaves this context was built for.
    pub fn num_leaves(&self) -> usize {
        self.states.len()
    }

    /// Aggregated document frequency.
    pub fn doc_freq(&self) -> i32 {
        self.doc_freq
    }

    /// Aggregated total term frequency, or -1 if any leaf did not know it.
    pub fn total_term_freq(&self) -> i64 {
        self.total_term_freq
    }
}
