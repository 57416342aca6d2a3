//! Composite leaderboard score over recent session scores

use playcache_api::CompositeScore;

const AVERAGE_WEIGHT: f64 = 0.5;
const CONSISTENCY_WEIGHT: f64 = 0.25;
const IMPROVEMENT_WEIGHT: f64 = 0.25;

/// Standard deviation at which consistency bottoms out
const MAX_DEVIATION: f64 = 20.0;

/// Half-over-half change (percent) mapped to the ends of the 0-100 scale
const MAX_IMPROVEMENT_PCT: f64 = 20.0;

/// Neutral improvement when there is nothing to compare
const NEUTRAL_IMPROVEMENT: f64 = 50.0;

/// Compute the composite score from session scores ordered oldest to newest.
///
/// Returns `None` for an empty series.
pub fn composite_score(scores: &[f64]) -> Option<CompositeScore> {
    if scores.is_empty() {
        return None;
    }

    let average = mean(scores);
    let consistency = consistency(scores, average);
    let improvement = improvement_rate(scores);

    Some(CompositeScore {
        sessions: scores.len(),
        average,
        consistency,
        improvement,
        composite: AVERAGE_WEIGHT * average
            + CONSISTENCY_WEIGHT * consistency
            + IMPROVEMENT_WEIGHT * improvement,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation scaled against `MAX_DEVIATION`
fn consistency(scores: &[f64], average: f64) -> f64 {
    let variance = scores
        .iter()
        .map(|score| (score - average).powi(2))
        .sum::<f64>()
        / scores.len() as f64;
    let stddev = variance.sqrt();

    (100.0 - (stddev / MAX_DEVIATION) * 100.0).max(0.0)
}

/// Older half is the first `n / 2` scores; the newer half gets the extra one
fn improvement_rate(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return NEUTRAL_IMPROVEMENT;
    }

    let (older, newer) = scores.split_at(scores.len() / 2);
    let older_mean = mean(older);
    if older_mean == 0.0 {
        return NEUTRAL_IMPROVEMENT;
    }

    let change_pct = (mean(newer) - older_mean) / older_mean.abs() * 100.0;
    let clamped = change_pct.clamp(-MAX_IMPROVEMENT_PCT, MAX_IMPROVEMENT_PCT);

    (clamped + MAX_IMPROVEMENT_PCT) / (2.0 * MAX_IMPROVEMENT_PCT) * 100.0
}
