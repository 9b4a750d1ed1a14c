//! Sloppy phrase matching.
//!
//! A document matches when the phrase's terms can be found within `slop`
//! position moves of their phrase order. Every minimal window is counted and
//! weighted by [`SimScorer::compute_slop_factor`], so closer matches score
//! higher.
//!
//! Terms that occur more than once in the phrase form repeat groups; cursors
//! of the same group are never allowed to sit on the same text position.

use std::cmp::Ordering;

use crate::index::DocId;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::phrase::{PhrasePositions, PostingsAndFreq};
use crate::search::scorer::Scorer;
use crate::search::similarity::SimScorer;

/// Min-heap of phrase cursor indices by (position, offset, ord).
#[derive(Debug, Default)]
struct PhraseQueue {
    heap: Vec<usize>,
}

impl PhraseQueue {
    fn compare(pps: &[PhrasePositions], a: usize, b: usize) -> Ordering {
        let (p1, p2) = (&pps[a], &pps[b]);
        p1.position
            .cmp(&p2.position)
            .then(p1.offset.cmp(&p2.offset))
            .then(p1.ord.cmp(&p2.ord))
    }

    fn clear(&mut self) {
        self.heap.clear();
    }

    fn top(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    fn push(&mut self, pps: &[PhrasePositions], pp: usize) {
        self.heap.push(pp);
        let mut i = self.heap.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if Self::compare(pps, self.heap[i], self.heap[parent]) == Ordering::Less {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn pop(&mut self, pps: &[PhrasePositions]) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.sift_down(pps, 0);
        Some(top)
    }

    fn sift_down(&mut self, pps: &[PhrasePositions], mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len
                && Self::compare(pps, self.heap[right], self.heap[left]) == Ordering::Less
            {
                smallest = right;
            }
            if Self::compare(pps, self.heap[smallest], self.heap[i]) == Ordering::Less {
                self.heap.swap(i, smallest);
                i = smallest;
            } else {
                break;
            }
        }
    }

    /// Restore heap order after cursors inside the queue have moved.
    fn rebuild(&mut self, pps: &[PhrasePositions]) {
        for i in (0..self.heap.len() / 2).rev() {
            self.sift_down(pps, i);
        }
    }
}

/// Scores documents where the phrase occurs within `slop` position moves.
pub struct SloppyPhraseScorer {
    pps: Vec<PhrasePositions>,
    /// Cursor advanced least recently; the doc loop is cyclic over `pps`.
    min: usize,
    max: usize,
    doc: DocId,
    slop: i32,
    queue: PhraseQueue,
    /// Largest position of any cursor in the current window.
    end: i32,
    checked_rpts: bool,
    has_rpts: bool,
    rpt_groups: Vec<Vec<usize>>,
    sloppy_freq: f32,
    num_matches: i32,
    doc_scorer: Box<dyn SimScorer>,
    cost: i64,
}

impl SloppyPhraseScorer {
    /// `postings` are taken in phrase order; at least two are expected.
    pub fn new(postings: Vec<PostingsAndFreq>, slop: i32, doc_scorer: Box<dyn SimScorer>) -> Self {
        debug_assert!(postings.len() >= 2, "a phrase needs at least two terms");
        let pps: Vec<PhrasePositions> = postings
            .into_iter()
            .enumerate()
            .map(|(ord, entry)| PhrasePositions::new(entry.postings, entry.position, ord, entry.term))
            .collect();
        let cost = pps.iter().map(PhrasePositions::cost).min().unwrap_or(0);
        let max = pps.len().saturating_sub(1);

        SloppyPhraseScorer {
            pps,
            min: 0,
            max,
            doc: -1,
            slop,
            queue: PhraseQueue::default(),
            end: i32::MIN,
            checked_rpts: false,
            has_rpts: false,
            rpt_groups: Vec::new(),
            sloppy_freq: 0.0,
            num_matches: 0,
            doc_scorer,
            cost,
        }
    }

    /// Sum of slop factors over all matches in the current doc.
    pub fn sloppy_freq(&self) -> f32 {
        self.sloppy_freq
    }

    fn advance_min(&mut self, target: DocId) -> bool {
        if !self.pps[self.min].skip_to(target) {
            self.doc = NO_MORE_DOCS;
            return false;
        }
        let n = self.pps.len();
        self.min = (self.min + 1) % n;
        self.max = (self.max + 1) % n;
        true
    }

    /// Move a cursor to its next position, tracking the window end.
    fn advance_pp(&mut self, pp: usize) -> bool {
        if !self.pps[pp].next_position() {
            return false;
        }
        if self.pps[pp].position > self.end {
            self.end = self.pps[pp].position;
        }
        true
    }

    fn phrase_freq(&mut self) -> f32 {
        self.num_matches = 0;
        if !self.init_phrase_positions() {
            return 0.0;
        }

        let mut freq = 0.0;
        let Some(mut pp) = self.queue.pop(&self.pps) else {
            return 0.0;
        };
        let mut match_length = self.end - self.pps[pp].position;
        let mut next = self.next_position();

        while self.advance_pp(pp) {
            if self.has_rpts && !self.advance_rpts(pp) {
                break;
            }
            if self.pps[pp].position > next {
                // current window is as small as it gets
                if match_length <= self.slop {
                    freq += self.doc_scorer.compute_slop_factor(match_length);
                    self.num_matches += 1;
                }
                self.queue.push(&self.pps, pp);
                let Some(top) = self.queue.pop(&self.pps) else {
                    break;
                };
                pp = top;
                next = self.next_position();
                match_length = self.end - self.pps[pp].position;
            } else {
                match_length = match_length.min(self.end - self.pps[pp].position);
            }
        }

        if match_length <= self.slop {
            freq += self.doc_scorer.compute_slop_factor(match_length);
            self.num_matches += 1;
        }
        freq
    }

    fn next_position(&self) -> i32 {
        self.queue
            .top()
            .map_or(i32::MAX, |top| self.pps[top].position)
    }

    fn init_phrase_positions(&mut self) -> bool {
        self.end = i32::MIN;
        if !self.checked_rpts {
            return self.init_first_time();
        }
        for pp in &mut self.pps {
            pp.first_position();
        }
        if self.has_rpts && !self.advance_repeat_groups() {
            return false;
        }
        self.fill_queue();
        true
    }

    fn init_first_time(&mut self) -> bool {
        self.checked_rpts = true;
        for pp in &mut self.pps {
            pp.first_position();
        }
        self.gather_rpt_groups();
        self.has_rpts = !self.rpt_groups.is_empty();
        if self.has_rpts && !self.advance_repeat_groups() {
            return false;
        }
        self.fill_queue();
        true
    }

    /// Group cursors of the same term at different phrase offsets.
    fn gather_rpt_groups(&mut self) {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..self.pps.len() {
            if self.pps[i].rpt_group.is_some() {
                continue;
            }
            for j in (i + 1)..self.pps.len() {
                if self.pps[j].rpt_group.is_some()
                    || self.pps[j].offset == self.pps[i].offset
                    || self.pps[j].term != self.pps[i].term
                {
                    continue;
                }
                let group = match self.pps[i].rpt_group {
                    Some(group) => group,
                    None => {
                        groups.push(vec![i]);
                        self.pps[i].rpt_group = Some(groups.len() - 1);
                        groups.len() - 1
                    }
                };
                self.pps[j].rpt_group = Some(group);
                groups[group].push(j);
            }
        }

        for group in &mut groups {
            group.sort_by_key(|&pp| self.pps[pp].offset);
            for (ind, &pp) in group.iter().enumerate() {
                self.pps[pp].rpt_ind = ind;
            }
        }
        self.rpt_groups = groups;
    }

    /// Spread each repeat group over distinct positions: member `j` of a
    /// group skips its first `j` occurrences.
    fn advance_repeat_groups(&mut self) -> bool {
        for group in &self.rpt_groups {
            for (j, &pp) in group.iter().enumerate().skip(1) {
                for _ in 0..j {
                    if !self.pps[pp].next_position() {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn fill_queue(&mut self) {
        self.queue.clear();
        for pp in 0..self.pps.len() {
            if self.pps[pp].position > self.end {
                self.end = self.pps[pp].position;
            }
            self.queue.push(&self.pps, pp);
        }
    }

    /// A group member colliding with `pp` on the same text position.
    fn collide(&self, pp: usize) -> Option<usize> {
        let group = self.pps[pp].rpt_group?;
        let text_position = self.pps[pp].text_position();
        self.rpt_groups[group]
            .iter()
            .copied()
            .find(|&other| other != pp && self.pps[other].text_position() == text_position)
    }

    fn lesser(&self, a: usize, b: usize) -> usize {
        let (pa, pb) = (&self.pps[a], &self.pps[b]);
        if pa.position < pb.position || (pa.position == pb.position && pa.offset < pb.offset) {
            a
        } else {
            b
        }
    }

    /// Resolve collisions after `pp` moved; false once a cursor runs out of
    /// positions.
    fn advance_rpts(&mut self, pp: usize) -> bool {
        if self.pps[pp].rpt_group.is_none() {
            return true;
        }
        let mut queued_moved = false;
        let mut current = pp;
        while let Some(other) = self.collide(current) {
            current = self.lesser(current, other);
            if !self.advance_pp(current) {
                return false;
            }
            if current != pp {
                queued_moved = true;
            }
        }
        if queued_moved {
            self.queue.rebuild(&self.pps);
        }
        true
    }
}

impl DocIdSetIterator for SloppyPhraseScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let target = self.doc.saturating_add(1);
        self.advance(target)
    }

    fn advance(&mut self, mut target: DocId) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        loop {
            if !self.advance_min(target) {
                return NO_MORE_DOCS;
            }
            while self.pps[self.min].doc < self.pps[self.max].doc {
                let max_doc = self.pps[self.max].doc;
                if !self.advance_min(max_doc) {
                    return NO_MORE_DOCS;
                }
            }
            self.doc = self.pps[self.max].doc;
            self.sloppy_freq = self.phrase_freq();
            if self.sloppy_freq != 0.0 {
                return self.doc;
            }
            target = self.doc.saturating_add(1);
        }
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

impl Scorer for SloppyPhraseScorer {
    fn score(&self) -> f32 {
        self.doc_scorer.score(self.doc, self.sloppy_freq)
    }

    /// Number of matching windows in the current doc.
    fn freq(&self) -> i32 {
        self.num_matches
    }
}
