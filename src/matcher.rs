use crate::storage::Gallery;
use crate::{Error, Result};
use svdface_vision::Descriptor;

/// Subspace similarity ‖AᵀB‖²_F: the sum of squared cosines of the principal
/// angles between the column spaces of `a` and `b`.
///
/// Lies in `[0, k]` for orthonormal bases of rank `k`, reaching `k` when they
/// span the same subspace. Squaring makes it insensitive to the sign of any
/// individual singular vector. Both descriptors must have the same row count.
pub fn similarity(a: &Descriptor, b: &Descriptor) -> f64 {
    let m = a.basis().t().dot(&b.basis());
    m.iter().map(|v| v * v).sum()
}

/// [`similarity`] with the row dimensions checked first.
pub fn try_similarity(a: &Descriptor, b: &Descriptor) -> Result<f64> {
    if a.rows() != b.rows() {
        return Err(Error::InvalidInput(format!(
            "descriptor row mismatch: {} vs {}",
            a.rows(),
            b.rows()
        )));
    }
    Ok(similarity(a, b))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub name: Option<String>,
    pub score: f64,
}

impl BestMatch {
    fn none() -> Self {
        Self {
            name: None,
            score: f64::NEG_INFINITY,
        }
    }
}

/// Highest-scoring gallery entry. Only a strictly greater score replaces the
/// current best, so the earliest entry wins ties. An empty gallery yields no
/// name and a score of negative infinity.
pub fn best_match(gallery: &Gallery, probe: &Descriptor) -> Result<BestMatch> {
    let mut best = BestMatch::none();
    for (name, descriptor) in gallery.iter() {
        let score = try_similarity(descriptor, probe)?;
        log::debug!("{}: {:.4}", name, score);
        if score > best.score {
            best = BestMatch {
                name: Some(name.to_string()),
                score,
            };
        }
    }
    Ok(best)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept { name: String, score: f64 },
    Reject { best: BestMatch },
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept { .. })
    }

    /// Matched identity, only on accept.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Decision::Accept { name, .. } => Some(name),
            Decision::Reject { .. } => None,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Decision::Accept { score, .. } => *score,
            Decision::Reject { best } => best.score,
        }
    }
}

pub fn decide(best: BestMatch, threshold: f64) -> Decision {
    match best.name {
        Some(name) if best.score >= threshold => Decision::Accept {
            name,
            score: best.score,
        },
        _ => Decision::Reject { best },
    }
}

pub fn verify(gallery: &Gallery, probe: &Descriptor, threshold: f64) -> Result<Decision> {
    Ok(decide(best_match(gallery, probe)?, threshold))
}
