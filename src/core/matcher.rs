//! Approximate filename matching for multispectral/panchromatic pairing.
//!
//! Acquisitions rarely share an exact join key across vendors, so the best
//! guess derived by marker substitution is resolved against the real glob
//! results by string similarity. An exact hit always wins; the fuzzy ranking
//! is a heuristic and its picks are logged for audit.
use tracing::{debug, warn};

/// Minimum similarity for a fuzzy candidate to be considered a match.
const SIMILARITY_CUTOFF: f64 = 0.6;

/// Return the pool entry closest to `candidate`, or `None` when the pool is
/// empty or nothing reaches the cutoff.
///
/// An exact occurrence of `candidate` is preferred over any ranking. Fuzzy
/// ranking uses Jaro-Winkler similarity; ties resolve to the
/// lexicographically smallest entry so the result is deterministic.
pub fn closest_match<'a>(candidate: &str, pool: &'a [String]) -> Option<&'a str> {
    if pool.is_empty() {
        return None;
    }

    if let Some(exact) = pool.iter().find(|p| p.as_str() == candidate) {
        debug!("Exact panchromatic match: {}", exact);
        return Some(exact);
    }

    let mut best: Option<(&str, f64)> = None;
    for entry in pool {
        let score = strsim::jaro_winkler(candidate, entry);
        let better = match best {
            None => score >= SIMILARITY_CUTOFF,
            Some((best_entry, best_score)) => {
                score > best_score
                    || (score == best_score && entry.as_str() < best_entry)
            }
        };
        if better {
            best = Some((entry, score));
        }
    }

    match best {
        Some((entry, score)) => {
            warn!(
                "Fuzzy panchromatic match for {}: {} (similarity {:.3})",
                candidate, entry, score
            );
            Some(entry)
        }
        None => None,
    }
}
