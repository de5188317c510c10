//! Uniform draws without replacement, honouring the no-repeat filter.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Anything that can be picked and remembered by its ID.
pub trait Candidate {
    fn candidate_id(&self) -> String;
}

/// What to do when every candidate in the pool has already been picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Start over from the full pool. Used by continuous re-rolls.
    AutoReset,
    /// Report exhaustion and wait for an explicit reset.
    RequireReset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T> {
    pub members: Vec<T>,
    /// The used members have to be cleared before this selection is recorded.
    pub reset_performed: bool,
    /// Eligible candidates left after this draw.
    pub remaining: usize,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Draw<T> {
    EmptyPool,
    Exhausted { pool_size: usize },
    Selected(Selection<T>),
}

/// Draws `count` candidates from `pool`, skipping anyone listed in `used`.
///
/// `count` is clamped to `1..=eligible`. Nothing here touches the ledger; the caller
/// records the outcome.
pub fn draw<T, R>(
    pool: &[T],
    used: &[String],
    count: usize,
    policy: ExhaustionPolicy,
    rng: &mut R,
) -> Draw<T>
where
    T: Candidate + Clone,
    R: Rng + ?Sized,
{
    if pool.is_empty() {
        return Draw::EmptyPool;
    }

    let used: HashSet<&str> = used.iter().map(String::as_str).collect();
    let mut eligible: Vec<&T> = pool
        .iter()
        .filter(|candidate| !used.contains(candidate.candidate_id().as_str()))
        .collect();

    let mut reset_performed = false;
    if eligible.is_empty() {
        match policy {
            ExhaustionPolicy::RequireReset => {
                return Draw::Exhausted {
                    pool_size: pool.len(),
                };
            }
            ExhaustionPolicy::AutoReset => {
                eligible = pool.iter().collect();
                reset_performed = true;
            }
        }
    }

    let eligible_count = eligible.len();
    let count = count.clamp(1, eligible_count);
    let (chosen, _) = eligible.partial_shuffle(rng, count);
    let members = chosen.iter().map(|candidate| (*candidate).clone()).collect();

    Draw::Selected(Selection {
        members,
        reset_performed,
        remaining: eligible_count - count,
        pool_size: pool.len(),
    })
}
