//! Distance metrics.
//!
//! The index only records which metric it was built for; the trainer and
//! searcher are the ones that evaluate it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Distance metric for dense vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance, computed via the expanded form
    /// $\|a\|^2 + \|b\|^2 - 2\langle a,b\rangle$.
    #[default]
    L2,
    /// Euclidean distance (square root of [`L2`](Self::L2)).
    L2Sqrt,
    /// Inner product $\langle a,b\rangle$ (for maximum inner product search).
    InnerProduct,
    /// Cosine similarity $\cos(a,b)$.
    Cosine,
}

impl DistanceMetric {
    /// Whether larger values mean closer (similarity rather than distance).
    #[inline]
    #[must_use]
    pub const fn is_similarity(self) -> bool {
        matches!(self, DistanceMetric::InnerProduct | DistanceMetric::Cosine)
    }

    pub const fn name(self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::L2Sqrt => "l2_sqrt",
            DistanceMetric::InnerProduct => "inner_product",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_metrics() {
        assert!(!DistanceMetric::L2.is_similarity());
        assert!(!DistanceMetric::L2Sqrt.is_similarity());
        assert!(DistanceMetric::InnerProduct.is_similarity());
        assert!(DistanceMetric::Cosine.is_similarity());
        assert_eq!(DistanceMetric::InnerProduct.to_string(), "inner_product");
    }
}
