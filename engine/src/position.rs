//! Fractional positions for conflict-free ordered insertion (C2).
//!
//! A [`FractionalPosition`] sorts densely between any two existing positions,
//! which is what lets two replicas insert at "index 0" concurrently and have
//! both insertions converge to a well-defined, agreed-upon order once the
//! positions are compared. The value is compared by `(path, storeId, clock)`
//! — the path carries the actual ordering; `storeId`/`clock` only break ties
//! when two replicas independently mint the same path, which `between`'s
//! jitter makes exceedingly unlikely but does not forbid.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dense, totally ordered position key for list/text element identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractionalPosition {
    /// Sentinel less than every generated position.
    Min,
    /// A concrete, generated position.
    At {
        path: Vec<u8>,
        store_id: u32,
        clock: u64,
    },
    /// Sentinel greater than every generated position.
    Max,
}

impl FractionalPosition {
    fn rank(&self) -> u8 {
        match self {
            FractionalPosition::Min => 0,
            FractionalPosition::At { .. } => 1,
            FractionalPosition::Max => 2,
        }
    }

    /// `between(storeId, clock, low, high)`: returns a position `p` such
    /// that `low < p < high`. Requires `low < high`.
    pub fn between(
        store_id: u32,
        clock: u64,
        low: &FractionalPosition,
        high: &FractionalPosition,
    ) -> Result<FractionalPosition> {
        if low >= high {
            return Err(Error::PositionOrder);
        }
        let low_path: &[u8] = match low {
            FractionalPosition::Min => &[],
            FractionalPosition::At { path, .. } => path,
            FractionalPosition::Max => unreachable!("Max is always the greatest position"),
        };
        let high_path: Option<&[u8]> = match high {
            FractionalPosition::Min => unreachable!("Min is always the least position"),
            FractionalPosition::At { path, .. } => Some(path),
            FractionalPosition::Max => None,
        };

        let path = build_between_path(low_path, high_path);
        Ok(FractionalPosition::At {
            path,
            store_id,
            clock,
        })
    }

    /// `compare(a, b)`.
    pub fn compare(a: &FractionalPosition, b: &FractionalPosition) -> Ordering {
        a.cmp(b)
    }
}

/// Minimum headroom (in a single byte's worth of digits) below which we stop
/// carrying digits forward and instead append a fresh, fully-jittered digit.
const DIGIT_SPACE: u16 = 256;

/// Builds a path strictly between `low_path` and `high_path` (`None` means
/// the conceptual infinite path of `Max`), digit by digit, with randomized
/// jitter near the low end so repeated appends densify rather than forming
/// a degenerate left spine.
fn build_between_path(low_path: &[u8], high_path: Option<&[u8]>) -> Vec<u8> {
    let mut result = Vec::new();
    let mut rng = rand::thread_rng();
    let mut depth = 0usize;

    loop {
        let low_digit = low_path.get(depth).copied().unwrap_or(0) as u16;
        let high_digit = match high_path {
            Some(hp) => match hp.get(depth) {
                Some(&d) => d as u16,
                // high_path is shorter at this depth: its implicit continuation
                // is all-zero, which only ever happens when high_path is a
                // strict prefix of (or equal to) the path we're building below
                // low_path — but low < high was already checked, so treat the
                // remaining space as the full byte range.
                None => DIGIT_SPACE,
            },
            None => DIGIT_SPACE, // Max: unbounded headroom
        };

        if high_digit.saturating_sub(low_digit) > 1 {
            // room to pick a new digit strictly between low_digit and high_digit
            let span = high_digit - low_digit - 1;
            // bias towards the low end: jitter over at most the first 64 slots
            // of headroom so amortized path length stays small even when the
            // true span is huge (e.g. appending against MAX).
            let bounded_span = span.min(64);
            let jitter = if bounded_span == 0 {
                0
            } else {
                rng.gen_range(0..bounded_span)
            };
            result.push((low_digit + 1 + jitter) as u8);
            return result;
        }

        // no room at this digit: carry the low digit forward and go deeper.
        result.push(low_digit as u8);
        depth += 1;

        if depth > 256 {
            // Pathological: low_path and high_path agree on 256 digits with no
            // room to split. Append a maximally jittered tail digit; this can
            // only happen if callers feed adversarially colliding inputs.
            result.push(rng.gen_range(1..=255));
            return result;
        }
    }
}

impl PartialOrd for FractionalPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FractionalPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FractionalPosition::At { path: p1, store_id: s1, clock: c1 },
             FractionalPosition::At { path: p2, store_id: s2, clock: c2 }) => {
                p1.cmp(p2).then_with(|| s1.cmp(s2)).then_with(|| c1.cmp(c2))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}
