//! Exact phrase matching with chunked position counting.
//!
//! Positions of a candidate document are scanned in windows of [`CHUNK`]
//! positions. The rarest term stamps every position it occupies; each middle
//! term extends only chains that all earlier terms reached; the last term
//! counts completed chains. Counters are invalidated by bumping a generation
//! stamp instead of clearing them.

use crate::index::DocId;
use crate::index::postings::PostingsEnum;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::phrase::PostingsAndFreq;
use crate::search::scorer::Scorer;
use crate::search::similarity::SimScorer;

/// Positions per counting window.
pub const CHUNK: i32 = 4096;

/// Terms at most this many times more frequent than the rarest are aligned
/// with `next_doc` instead of `advance`.
const ADVANCE_RATIO: i32 = 5;

/// `next_doc` calls tried before falling back to `advance`.
const MAX_SCAN: u32 = 50;

struct ChunkState {
    postings: Box<dyn PostingsEnum>,
    offset: i32,
    use_advance: bool,
    pos_upto: i32,
    pos_limit: i32,
    pos: i32,
    last_pos: i32,
}

impl ChunkState {
    /// Read the next adjusted position; false once the doc has none left.
    fn next_pos(&mut self) -> bool {
        if self.pos_upto == self.pos_limit {
            return false;
        }
        self.pos_upto += 1;
        self.pos = self.offset + self.postings.next_position();
        true
    }

    /// Bring this cursor to `doc` or beyond.
    fn align(&mut self, doc: DocId) -> DocId {
        let mut doc2 = self.postings.doc_id();
        if self.use_advance {
            if doc2 < doc {
                doc2 = self.postings.advance(doc);
            }
        } else {
            let mut iterations = 0;
            while doc2 < doc {
                iterations += 1;
                if iterations == MAX_SCAN {
                    doc2 = self.postings.advance(doc);
                    break;
                }
                doc2 = self.postings.next_doc();
            }
        }
        doc2
    }
}

/// Scores documents containing the phrase's terms at exactly consecutive
/// (offset-adjusted) positions.
pub struct ExactPhraseScorer {
    chunk_states: Vec<ChunkState>,
    counts: Vec<i32>,
    gens: Vec<u32>,
    chunk_gen: u32,
    doc: DocId,
    freq: i32,
    doc_scorer: Box<dyn SimScorer>,
    cost: i64,
    no_docs: bool,
}

impl ExactPhraseScorer {
    /// `postings` must hold at least two terms, rarest first.
    pub fn new(postings: Vec<PostingsAndFreq>, doc_scorer: Box<dyn SimScorer>) -> Self {
        debug_assert!(postings.len() >= 2, "a phrase needs at least two terms");
        let lead_doc_freq = postings[0].doc_freq;
        let cost = postings[0].postings.cost();
        let mut no_docs = false;
        let mut chunk_states = Vec::with_capacity(postings.len());

        for (i, entry) in postings.into_iter().enumerate() {
            let mut state = ChunkState {
                postings: entry.postings,
                offset: -entry.position,
                use_advance: i64::from(entry.doc_freq)
                    > i64::from(ADVANCE_RATIO) * i64::from(lead_doc_freq),
                pos_upto: 0,
                pos_limit: 0,
                pos: 0,
                last_pos: -1,
            };
            if i > 0 && !no_docs && state.postings.next_doc() == NO_MORE_DOCS {
                no_docs = true;
            }
            chunk_states.push(state);
        }

        ExactPhraseScorer {
            chunk_states,
            counts: vec![0; CHUNK as usize],
            gens: vec![0; CHUNK as usize],
            chunk_gen: 0,
            doc: -1,
            freq: 0,
            doc_scorer,
            cost,
            no_docs,
        }
    }

    /// Whether some term has no documents at all, so nothing can match.
    pub fn has_no_docs(&self) -> bool {
        self.no_docs
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.doc
    }

    /// From a lead candidate, find the next doc containing the phrase.
    fn do_next(&mut self, mut doc: DocId) -> DocId {
        loop {
            if doc == NO_MORE_DOCS {
                return self.exhaust();
            }

            let mut overshoot = None;
            for state in self.chunk_states.iter_mut().skip(1) {
                let doc2 = state.align(doc);
                if doc2 > doc {
                    overshoot = Some(doc2);
                    break;
                }
            }

            match overshoot {
                Some(NO_MORE_DOCS) => return self.exhaust(),
                Some(doc2) => {
                    doc = self.chunk_states[0].postings.advance(doc2);
                }
                None => {
                    self.doc = doc;
                    self.freq = self.phrase_freq();
                    if self.freq != 0 {
                        return doc;
                    }
                    doc = self.chunk_states[0].postings.next_doc();
                }
            }
        }
    }

    fn next_gen(&mut self) {
        self.chunk_gen = self.chunk_gen.wrapping_add(1);
        if self.chunk_gen == 0 {
            self.gens.fill(0);
            self.chunk_gen = 1;
        }
    }

    fn phrase_freq(&mut self) -> i32 {
        let mut freq = 0;
        for state in &mut self.chunk_states {
            state.pos_limit = state.postings.freq();
            state.pos = state.offset + state.postings.next_position();
            state.pos_upto = 1;
            state.last_pos = -1;
        }

        let end_minus1 = self.chunk_states.len() - 1;
        let mut chunk_start = 0;
        let mut chunk_end = CHUNK;
        let mut end = false;

        while !end {
            self.next_gen();
            let chunk_gen = self.chunk_gen;

            // first term stamps every position it covers
            {
                let state = &mut self.chunk_states[0];
                while state.pos < chunk_end {
                    if state.pos > state.last_pos {
                        state.last_pos = state.pos;
                        let index = (state.pos - chunk_start) as usize;
                        self.counts[index] = 1;
                        debug_assert!(self.gens[index] != chunk_gen);
                        self.gens[index] = chunk_gen;
                    }
                    if !state.next_pos() {
                        end = true;
                        break;
                    }
                }
            }

            // middle terms extend viable chains only
            let mut any = true;
            for t in 1..end_minus1 {
                let state = &mut self.chunk_states[t];
                any = false;
                while state.pos < chunk_end {
                    if state.pos > state.last_pos {
                        state.last_pos = state.pos;
                        let index = state.pos - chunk_start;
                        if index >= 0 {
                            let index = index as usize;
                            if self.gens[index] == chunk_gen && self.counts[index] == t as i32 {
                                self.counts[index] += 1;
                                any = true;
                            }
                        }
                    }
                    if !state.next_pos() {
                        end = true;
                        break;
                    }
                }
                if !any {
                    break;
                }
            }

            if any {
                // last term completes chains
                let state = &mut self.chunk_states[end_minus1];
                while state.pos < chunk_end {
                    if state.pos > state.last_pos {
                        state.last_pos = state.pos;
                        let index = state.pos - chunk_start;
                        if index >= 0 {
                            let index = index as usize;
                            if self.gens[index] == chunk_gen
                                && self.counts[index] == end_minus1 as i32
                            {
                                freq += 1;
                            }
                        }
                    }
                    if !state.next_pos() {
                        end = true;
                        break;
                    }
                }
            }

            chunk_start += CHUNK;
            chunk_end += CHUNK;
        }

        freq
    }
}

impl DocIdSetIterator for ExactPhraseScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.no_docs {
            return self.exhaust();
        }
        let doc = self.chunk_states[0].postings.next_doc();
        self.do_next(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.no_docs {
            return self.exhaust();
        }
        let doc = self.chunk_states[0].postings.advance(target);
        self.do_next(doc)
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

impl Scorer for ExactPhraseScorer {
    fn score(&self) -> f32 {
        self.doc_scorer.score(self.doc, self.freq as f32)
    }

    fn freq(&self) -> i32 {
        self.freq
    }
}
