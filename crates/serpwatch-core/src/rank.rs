//! Rank-field state transition and the impact policy table.
//!
//! [`RankTransition::compute`] is the single place the tracked-term ranking
//! fields change. It is pure: the DB layer loads the prior state, computes
//! the transition here, and writes the result back in the same transaction
//! that records the observation.
//!
//! Position `0` is the unranked sentinel (see [`crate::UNRANKED`]): the
//! domain did not appear anywhere in the scanned results. An unranked
//! observation never improves `best_rank_ever` and is reported as a drop
//! when the term was previously ranked.

use crate::types::{Impact, RankStatus};
use crate::UNRANKED;

/// Outcome of applying one new observation to a term's ranking fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTransition {
    pub status: RankStatus,
    /// Positions gained (positive) or lost (negative). Zero for `New`,
    /// `NoChange`, and for a drop out of the visible range (the magnitude
    /// of that drop is unknowable).
    pub rank_delta: i32,
    /// Set when the term ranks for the first time (or first after a reset).
    pub initial_rank: Option<i32>,
    /// Updated best-ever position; unchanged by unranked observations.
    pub best_rank_ever: i32,
}

impl RankTransition {
    /// Computes the transition from `(prior_rank, prior_best)` to
    /// `new_position`.
    ///
    /// Rules, in order:
    /// - prior unranked, new ranked → `New`, `initial_rank` set, delta 0;
    /// - both unranked → `NoChange`;
    /// - ranked → unranked → `Down` with delta 0;
    /// - otherwise `Up`/`Down`/`NoChange` with `delta = prior - new`
    ///   (lower position number is better).
    #[must_use]
    pub fn compute(prior_rank: i32, prior_best: i32, new_position: i32) -> Self {
        let best_rank_ever = if new_position == UNRANKED {
            prior_best
        } else if prior_best == UNRANKED {
            new_position
        } else {
            prior_best.min(new_position)
        };

        if prior_rank == UNRANKED {
            if new_position == UNRANKED {
                return Self {
                    status: RankStatus::NoChange,
                    rank_delta: 0,
                    initial_rank: None,
                    best_rank_ever,
                };
            }
            return Self {
                status: RankStatus::New,
                rank_delta: 0,
                initial_rank: Some(new_position),
                best_rank_ever,
            };
        }

        if new_position == UNRANKED {
            return Self {
                status: RankStatus::Down,
                rank_delta: 0,
                initial_rank: None,
                best_rank_ever,
            };
        }

        let delta = prior_rank - new_position;
        let status = match delta {
            d if d > 0 => RankStatus::Up,
            d if d < 0 => RankStatus::Down,
            _ => RankStatus::NoChange,
        };
        Self {
            status,
            rank_delta: delta,
            initial_rank: None,
            best_rank_ever,
        }
    }
}

/// Tunable thresholds for classifying how much a movement matters.
///
/// The defaults encode current product policy; they are a value, not a law —
/// construct a custom table to experiment without touching the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ImpactPolicy {
    /// Holding or reaching a position at or above this is always high impact.
    pub top_positions: i32,
    /// The "first page" window used for crossing detection.
    pub top_window: i32,
    /// Minimum |delta| for a top-window crossing to count as high impact.
    pub big_swing: i32,
    /// |delta| at or above this is medium impact on its own.
    pub medium_swing: i32,
    /// Movement at or beyond this position is noise.
    pub tail_start: i32,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        Self {
            top_positions: 3,
            top_window: 10,
            big_swing: 5,
            medium_swing: 10,
            tail_start: 30,
        }
    }
}

impl ImpactPolicy {
    /// Classifies one transition. `prior_rank` and `new_position` use the
    /// unranked-0 sentinel; `delta` comes from [`RankTransition`].
    #[must_use]
    pub fn classify(&self, prior_rank: i32, new_position: i32, delta: i32) -> Impact {
        let ranked = new_position != UNRANKED;

        if ranked && new_position <= self.top_positions {
            return Impact::High;
        }

        let was_in_window = prior_rank != UNRANKED && prior_rank <= self.top_window;
        let now_in_window = ranked && new_position <= self.top_window;
        if was_in_window != now_in_window && delta.abs() >= self.big_swing {
            return Impact::High;
        }

        if !ranked || new_position >= self.tail_start {
            return Impact::No;
        }

        if delta.abs() >= self.medium_swing || (now_in_window && delta != 0) {
            return Impact::Medium;
        }

        if delta != 0 {
            return Impact::Low;
        }

        Impact::No
    }
}
