//! Queue model: "what comes next" resolution and shuffle bookkeeping.
//!
//! Pure data plus index arithmetic. No backend, no persistence; the session
//! snapshots it after every mutation.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::{Direction, TrackId};

/// Ordered track sequence, cursor, priority ("play next") list and shuffle flag.
#[derive(Debug, Clone)]
pub struct QueueModel {
    sequence: Vec<TrackId>,
    cursor: usize,
    priority: VecDeque<TrackId>,
    shuffled: bool,
    rng: SmallRng,
}

/// Serializable form of the queue. Also the queue's observable view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSnapshot {
    pub sequence: Vec<TrackId>,
    pub cursor: usize,
    pub priority: Vec<TrackId>,
    pub shuffled: bool,
}

impl Default for QueueModel {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueModel {
    /// Empty queue with an OS-seeded shuffle source.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    /// Empty queue with a deterministic shuffle source.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            sequence: Vec::new(),
            cursor: 0,
            priority: VecDeque::new(),
            shuffled: false,
            rng,
        }
    }

    /// Move to the next track in `direction` and return it.
    ///
    /// Forward advances drain the priority list first, one track at a time,
    /// without moving the cursor. Otherwise the cursor wraps at both ends.
    /// Returns `None` when there is nothing to play.
    pub fn advance(&mut self, direction: Direction) -> Option<TrackId> {
        if direction == Direction::Forward {
            if let Some(track) = self.priority.pop_front() {
                return Some(track);
            }
        }

        let len = self.sequence.len();
        if len == 0 {
            return None;
        }

        let cursor = self.cursor.min(len - 1);
        self.cursor = match direction {
            Direction::Forward => (cursor + 1) % len,
            Direction::Backward if cursor == 0 => len - 1,
            Direction::Backward => cursor - 1,
        };
        Some(self.sequence[self.cursor])
    }

    /// True when a forward advance would not have to wrap.
    pub fn has_upcoming(&self) -> bool {
        !self.priority.is_empty()
            || (!self.sequence.is_empty() && self.cursor + 1 < self.sequence.len())
    }

    /// Toggle shuffle around `current`. Returns whether the flag changed.
    ///
    /// Turning on is a no-op unless `current` is in the sequence. Turning off
    /// sorts by id and moves the cursor to `current`; if `current` is absent
    /// the cursor keeps its numeric value.
    pub fn shuffle(&mut self, current: Option<TrackId>) -> bool {
        if self.shuffled {
            self.sequence.sort();
            if let Some(index) = current.and_then(|c| self.position_of(c)) {
                self.cursor = index;
            }
            self.shuffled = false;
            return true;
        }

        let Some(current) = current else {
            return false;
        };
        let Some(index) = self.position_of(current) else {
            return false;
        };

        let mut rest = std::mem::take(&mut self.sequence);
        rest.remove(index);

        let mut sequence = Vec::with_capacity(rest.len() + 1);
        sequence.push(current);
        sequence.extend(fisher_yates(rest, &mut self.rng));

        self.sequence = sequence;
        self.cursor = 0;
        self.shuffled = true;
        true
    }

    /// Replace the whole sequence. Cursor goes to 0 and shuffle is cleared.
    pub fn replace(&mut self, tracks: Vec<TrackId>) {
        self.sequence = tracks;
        self.cursor = 0;
        self.shuffled = false;
    }

    /// Queue `track` to play before the main sequence resumes.
    pub fn enqueue_next(&mut self, track: TrackId) {
        self.priority.push_back(track);
    }

    /// Point the cursor at `index`. Out-of-range indices are ignored.
    pub fn jump_to(&mut self, index: usize) -> Option<TrackId> {
        let track = *self.sequence.get(index)?;
        self.cursor = index;
        Some(track)
    }

    /// Drop everything, including the priority list and shuffle flag.
    pub fn clear(&mut self) {
        self.sequence.clear();
        self.priority.clear();
        self.cursor = 0;
        self.shuffled = false;
    }

    pub fn current(&self) -> Option<TrackId> {
        self.sequence.get(self.cursor).copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sequence(&self) -> &[TrackId] {
        &self.sequence
    }

    pub fn priority(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.priority.iter().copied()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            sequence: self.sequence.clone(),
            cursor: self.cursor,
            priority: self.priority.iter().copied().collect(),
            shuffled: self.shuffled,
        }
    }

    /// Restore persisted fields, keeping this queue's shuffle source.
    /// A cursor past the end is clamped to the last track.
    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        self.cursor = snapshot.cursor.min(snapshot.sequence.len().saturating_sub(1));
        self.sequence = snapshot.sequence;
        self.priority = snapshot.priority.into();
        self.shuffled = snapshot.shuffled;
    }

    fn position_of(&self, track: TrackId) -> Option<usize> {
        self.sequence.iter().position(|&t| t == track)
    }
}

/// Uniform Fisher–Yates: repeatedly draw a random element from the
/// not-yet-drawn remainder and append it to the output.
pub fn fisher_yates<T, R: Rng + ?Sized>(mut input: Vec<T>, rng: &mut R) -> Vec<T> {
    let mut output = Vec::with_capacity(input.len());
    while !input.is_empty() {
        let pick = rng.random_range(0..input.len());
        output.push(input.swap_remove(pick));
    }
    output
}
