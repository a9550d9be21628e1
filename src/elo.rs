use crate::constants::*;
use std::cmp::Ordering;

/// Probability that a player rated `a` beats one rated `b`.
pub fn expected(a: f64, b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((b - a) / ELO_STEP))
}

pub fn outcome(score_a: u32, score_b: u32) -> (f64, f64) {
    match score_a.cmp(&score_b) {
        Ordering::Greater => (1.0, 0.0),
        Ordering::Equal => (0.5, 0.5),
        Ordering::Less => (0.0, 1.0),
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// New ratings for both sides. Computed at full precision, rounded once.
pub fn elo(a: f64, b: f64, score_a: u32, score_b: u32) -> (f64, f64) {
    let pa = expected(a, b);
    let pb = expected(b, a);
    let (wa, wb) = outcome(score_a, score_b);
    (
        round2(a + K_FACTOR * (wa - pa)),
        round2(b + K_FACTOR * (wb - pb)),
    )
}
