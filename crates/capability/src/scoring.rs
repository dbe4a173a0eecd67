//! Rank-to-capability conversion.
//!
//! A rank vector holds one positive integer per skill axis (smaller = better).
//! Each row is converted to capability scores by measuring every entry's
//! distance from the row's best rank and applying a piecewise decay, then
//! scaling so the best entry lands exactly on [`SCALE`].

use crate::SKILL_COUNT;

/// Upper bound of the capability range; the best entry of every row equals it.
pub const SCALE: f64 = 0.6;

// Decay bases at the regime boundaries.  Each regime starts where the
// previous one left off so the curve is continuous at d = 3, 8, 15.
const BASE_ADVANTAGE: f64 = 1.0 / (1.0 + 0.10 * 3.0);
const BASE_WIDE: f64 = BASE_ADVANTAGE / (1.0 + 0.15 * 5.0);
const BASE_DOMINANT: f64 = BASE_WIDE / (1.0 + 0.20 * 7.0);

/// Raw score for a single entry at rank-distance `diff` from the row best.
fn raw_score(diff: u32) -> f64 {
    match diff {
        0 => 1.0,
        1..=3 => 1.0 / (1.0 + 0.10 * f64::from(diff)),
        4..=8 => BASE_ADVANTAGE / (1.0 + 0.15 * f64::from(diff - 3)),
        9..=15 => BASE_WIDE / (1.0 + 0.20 * f64::from(diff - 8)),
        _ => BASE_DOMINANT / (1.0 + 0.30 * f64::from(diff - 15)),
    }
}

/// Derive the capability row for a single model from its own rank vector.
///
/// The result depends on the rank vector alone; peer models never affect
/// it.  Every entry lies in `[0, SCALE]` and the minimum-rank entry equals
/// `SCALE` exactly.
pub fn capability_row(ranks: &[u32; SKILL_COUNT]) -> [f64; SKILL_COUNT] {
    let best = ranks.iter().copied().min().unwrap_or(1);

    let mut raw = [0.0; SKILL_COUNT];
    for (slot, rank) in raw.iter_mut().zip(ranks.iter()) {
        *slot = raw_score(rank - best);
    }

    // The best-ranked entry always scores 1.0, so max-normalising to SCALE
    // reduces to a plain multiplication.
    let max = raw.iter().copied().fold(f64::MIN, f64::max);
    raw.map(|score| score * (SCALE / max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_ranks_score_full_scale_everywhere() {
        let row = capability_row(&[1, 1, 1, 1, 1]);
        for entry in row {
            assert!((entry - SCALE).abs() < 1e-12);
        }
    }

    #[test]
    fn spread_ranks_decay_monotonically() {
        let row = capability_row(&[1, 2, 5, 10, 20]);

        assert!((row[0] - SCALE).abs() < 1e-12);
        for pair in row.windows(2) {
            assert!(pair[0] > pair[1], "expected strict decay, got {row:?}");
        }

        // Closed-form spot checks against the piecewise table.
        let close = SCALE / (1.0 + 0.10);
        assert!((row[1] - close).abs() < 1e-4);
        let advantage = SCALE * BASE_ADVANTAGE / (1.0 + 0.15);
        assert!((row[2] - advantage).abs() < 1e-4);
        let wide = SCALE * BASE_WIDE / (1.0 + 0.20);
        assert!((row[3] - wide).abs() < 1e-4);
        let dominant = SCALE * BASE_DOMINANT / (1.0 + 0.30 * 4.0);
        assert!((row[4] - dominant).abs() < 1e-4);
    }

    #[test]
    fn all_entries_stay_within_bounds() {
        let rows = [
            [1, 1, 2, 3, 4],
            [7, 7, 7, 7, 7],
            [1, 50, 100, 3, 9],
            [2, 18, 4, 11, 200],
        ];
        for ranks in rows {
            let row = capability_row(&ranks);
            let max = row.iter().copied().fold(f64::MIN, f64::max);
            assert!((max - SCALE).abs() < 1e-12, "row max must equal SCALE");
            for entry in row {
                assert!((0.0..=SCALE + 1e-12).contains(&entry));
            }
        }
    }

    #[test]
    fn worsening_a_rank_never_raises_its_capability() {
        // With the row minimum held fixed, increasing any single rank can
        // only lower (or keep) every capability entry.
        let base = [1, 2, 6, 9, 16];
        let worse = [1, 4, 6, 12, 30];

        let row_a = capability_row(&base);
        let row_b = capability_row(&worse);
        for (a, b) in row_a.iter().zip(row_b.iter()) {
            assert!(a >= b, "{row_a:?} vs {row_b:?}");
        }
    }

    #[test]
    fn decay_curve_is_continuous_at_regime_boundaries() {
        // Adjacent distances across each boundary should not jump upward.
        let mut previous = raw_score(0);
        for diff in 1..40 {
            let current = raw_score(diff);
            assert!(current < previous, "raw score must strictly decrease");
            previous = current;
        }
    }

    #[test]
    fn row_depends_only_on_distances_not_absolute_ranks() {
        let shifted_by_ten: Vec<u32> = [1, 2, 5, 10, 20].iter().map(|r| r + 10).collect();
        let mut shifted = [0u32; SKILL_COUNT];
        shifted.copy_from_slice(&shifted_by_ten);

        assert_eq!(capability_row(&[1, 2, 5, 10, 20]), capability_row(&shifted));
    }
}
