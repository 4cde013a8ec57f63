//! IVF-PQ build and search parameters.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};

/// How PQ codebooks are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodebookGen {
    /// One codebook per subspace: `pq_dim` codebooks shared by all clusters.
    #[default]
    PerSubspace,
    /// One codebook per cluster: `n_lists` codebooks shared by all subspaces.
    PerCluster,
}

/// Index build parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Distance metric used for clustering and search.
    pub metric: DistanceMetric,

    /// Number of inverted lists (clusters).
    ///
    /// Aim for roughly 1,000 to 10,000 vectors per list.
    pub n_lists: u32,

    /// k-means iterations when searching for cluster centers.
    pub kmeans_n_iters: u32,

    /// Fraction of the data used to train k-means, in `(0, 1]`.
    pub kmeans_trainset_fraction: f64,

    /// Bits per PQ code element, in `[4, 8]`.
    ///
    /// Fewer bits mean a smaller index and faster search, at lower recall.
    pub pq_bits: u32,

    /// Number of PQ subspaces. `0` picks one with [`calculate_pq_dim`](super::calculate_pq_dim).
    ///
    /// `pq_dim * pq_bits` must be a multiple of 8. Multiples of 32 that also
    /// divide `dim` perform best.
    pub pq_dim: u32,

    pub codebook_kind: CodebookGen,

    /// Apply a random rotation even when `dim % pq_dim == 0`.
    ///
    /// When `dim` is not a multiple of `pq_dim` a random rotation into
    /// `rot_dim` dimensions is always applied; otherwise the identity is used
    /// unless this flag is set.
    pub force_random_rotation: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::L2,
            n_lists: 1024,
            kmeans_n_iters: 20,
            kmeans_trainset_fraction: 0.5,
            pq_bits: 8,
            pq_dim: 0,
            codebook_kind: CodebookGen::PerSubspace,
            force_random_rotation: false,
        }
    }
}

impl IndexParams {
    /// Check scalar ranges. The `pq_bits * pq_dim` constraint is checked at
    /// index construction, once `pq_dim` is resolved.
    pub fn validate(&self) -> Result<()> {
        if self.n_lists == 0 {
            return Err(Error::InvalidParameter {
                name: "n_lists",
                reason: "must be >= 1".to_string(),
            });
        }
        if !(self.kmeans_trainset_fraction > 0.0 && self.kmeans_trainset_fraction <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "kmeans_trainset_fraction",
                reason: format!("must be in (0, 1], got {}", self.kmeans_trainset_fraction),
            });
        }
        if !(4..=8).contains(&self.pq_bits) {
            return Err(Error::PqBitsOutOfRange {
                pq_bits: self.pq_bits,
            });
        }
        Ok(())
    }
}

/// Element type of the lookup table built at search time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutDtype {
    #[default]
    F32,
    /// Half precision; less shared memory, slightly lower recall.
    F16,
    /// 8-bit; least shared memory, lowest recall.
    U8,
}

/// Storage type for distances computed at search time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalDistanceDtype {
    #[default]
    F32,
    F16,
}

/// Allowed values of [`SearchParams::preferred_thread_block_size`].
pub const THREAD_BLOCK_SIZES: [u32; 4] = [0, 256, 512, 1024];

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Number of lists to probe.
    pub n_probes: u32,
    pub lut_dtype: LutDtype,
    pub internal_distance_dtype: InternalDistanceDtype,
    /// Block size of the scan kernel. `0` lets the searcher choose.
    pub preferred_thread_block_size: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            n_probes: 20,
            lut_dtype: LutDtype::F32,
            internal_distance_dtype: InternalDistanceDtype::F32,
            preferred_thread_block_size: 0,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_probes == 0 {
            return Err(Error::InvalidParameter {
                name: "n_probes",
                reason: "must be >= 1".to_string(),
            });
        }
        if !THREAD_BLOCK_SIZES.contains(&self.preferred_thread_block_size) {
            return Err(Error::InvalidParameter {
                name: "preferred_thread_block_size",
                reason: format!(
                    "must be one of {:?}, got {}",
                    THREAD_BLOCK_SIZES, self.preferred_thread_block_size
                ),
            });
        }
        Ok(())
    }

    /// Probes actually performed against an index with `n_lists` lists.
    #[inline]
    pub fn effective_n_probes(&self, n_lists: u32) -> u32 {
        self.n_probes.min(n_lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        IndexParams::default().validate().unwrap();
        SearchParams::default().validate().unwrap();
    }

    #[test]
    fn index_params_ranges() {
        let p = IndexParams {
            n_lists: 0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(Error::InvalidParameter { name: "n_lists", .. })
        ));

        let p = IndexParams {
            kmeans_trainset_fraction: 0.0,
            ..Default::default()
        };
        assert!(p.validate().is_err());

        let p = IndexParams {
            pq_bits: 9,
            ..Default::default()
        };
        assert_eq!(p.validate(), Err(Error::PqBitsOutOfRange { pq_bits: 9 }));
    }

    #[test]
    fn search_params_block_size() {
        let p = SearchParams {
            preferred_thread_block_size: 384,
            ..Default::default()
        };
        assert!(p.validate().is_err());
        let p = SearchParams {
            preferred_thread_block_size: 512,
            ..Default::default()
        };
        p.validate().unwrap();
        assert_eq!(p.effective_n_probes(8), 8);
        assert_eq!(p.effective_n_probes(1000), 20);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: IndexParams =
            serde_json::from_str(r#"{"n_lists": 64, "codebook_kind": "per_cluster"}"#).unwrap();
        assert_eq!(p.n_lists, 64);
        assert_eq!(p.codebook_kind, CodebookGen::PerCluster);
        assert_eq!(p.pq_bits, 8);

        let s: SearchParams = serde_json::from_str(r#"{"lut_dtype": "f16"}"#).unwrap();
        assert_eq!(s.lut_dtype, LutDtype::F16);
        assert_eq!(s.n_probes, 20);
    }
}
