//! Brute-force 2-NN matcher with Lowe's ratio test.

use super::{FeatureMatch, MatchSet};

/// Match every `reference` descriptor against all `query` descriptors.
///
/// A match is kept when `best < ratio * second_best`. Reference descriptors
/// with a single available neighbor count as candidates but never pass, since
/// there is nothing to compare against.
///
/// Survivors are one-to-one: when several reference descriptors land on the
/// same query descriptor only the closest one is kept (earliest on ties).
pub fn knn_ratio_match<D, F>(reference: &[D], query: &[D], ratio: f32, distance: F) -> MatchSet
where
    F: Fn(&D, &D) -> f32,
{
    let mut out = MatchSet::default();
    if query.is_empty() {
        return out;
    }

    // query index -> slot in `out.matches`
    let mut owner: Vec<Option<usize>> = vec![None; query.len()];
    for (reference_idx, r) in reference.iter().enumerate() {
        let mut best = (f32::INFINITY, usize::MAX);
        let mut second = f32::INFINITY;
        for (query_idx, q) in query.iter().enumerate() {
            let d = distance(r, q);
            if d < best.0 {
                second = best.0;
                best = (d, query_idx);
            } else if d < second {
                second = d;
            }
        }
        if best.1 == usize::MAX {
            continue;
        }
        out.candidates += 1;
        if !(second.is_finite() && best.0 < ratio * second) {
            continue;
        }
        let m = FeatureMatch {
            reference_idx,
            query_idx: best.1,
            distance: best.0,
        };
        match owner[best.1] {
            Some(slot) if out.matches[slot].distance <= m.distance => {}
            Some(slot) => out.matches[slot] = m,
            None => {
                owner[best.1] = Some(out.matches.len());
                out.matches.push(m);
            }
        }
    }
    out
}
