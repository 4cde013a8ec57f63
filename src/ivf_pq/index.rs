//! The IVF-PQ index container.
//!
//! [`Index`] owns every device array a trainer fills in and a searcher reads,
//! and keeps their shapes consistent with the scalar parameters. It performs
//! no training or search itself.
//!
//! Shapes, with `book = 1 << pq_bits`:
//!
//! | array             | extents                                   |
//! |-------------------|-------------------------------------------|
//! | `pq_centers`      | `[pq_dim, book, pq_len]` per subspace     |
//! |                   | `[n_lists, book, pq_len]` per cluster     |
//! | `pq_dataset`      | `[size, pq_dim * pq_bits / 8]`            |
//! | `indices`         | `[size]`                                  |
//! | `rotation_matrix` | `[rot_dim, dim]`                          |
//! | `list_offsets`    | `[n_lists + 1]`                           |
//! | `centers`         | `[n_lists, dim_ext]`                      |
//! | `centers_rot`     | `[n_lists, rot_dim]`                      |

use std::fmt;

use bytemuck::Pod;
use tracing::{debug, info};

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::ivf_pq::params::{CodebookGen, IndexParams};
use crate::mdarray::DeviceArray;
use crate::mdspan::{DeviceView, DeviceViewMut};
use crate::resources::Resources;

/// Integer type of source-vector ids and list offsets.
///
/// Must represent every `u32`.
pub trait IndexId: Pod + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Widen to `u64`. Negative values saturate to `u64::MAX`, which is never
    /// a valid offset.
    fn to_u64(self) -> u64;

    /// Narrow from `usize`, if the value fits.
    fn from_usize(value: usize) -> Option<Self>;
}

macro_rules! impl_index_id {
    ($($t:ty),*) => {$(
        impl IndexId for $t {
            #[inline]
            fn to_u64(self) -> u64 {
                u64::try_from(self).unwrap_or(u64::MAX)
            }

            #[inline]
            fn from_usize(value: usize) -> Option<Self> {
                <$t>::try_from(value).ok()
            }
        }
    )*};
}

impl_index_id!(u32, u64, i64);

/// Pick a default `pq_dim` for a `dim`-dimensional dataset.
///
/// Halves large dimensions, then prefers a multiple of 32, falling back to
/// the largest power of two not above `dim` (at least 1).
pub fn calculate_pq_dim(dim: u32) -> u32 {
    let mut dim = dim;
    if dim >= 128 {
        dim /= 2;
    }
    let r = dim / 32 * 32;
    if r > 0 {
        return r;
    }
    let mut r = 1;
    while r * 2 <= dim {
        r *= 2;
    }
    r
}

fn check_pq_params(pq_bits: u32, pq_dim: u32) -> Result<()> {
    if !(4..=8).contains(&pq_bits) {
        return Err(Error::PqBitsOutOfRange { pq_bits });
    }
    let product = u64::from(pq_bits) * u64::from(pq_dim);
    if product % 8 != 0 {
        return Err(Error::PqCodeNotByteAligned {
            pq_bits,
            pq_dim,
            product,
        });
    }
    Ok(())
}

/// An IVF-PQ index: coarse cluster centers, PQ codebooks, encoded vectors
/// grouped by list, and the rotation applied before encoding.
///
/// Move-only: cloning would duplicate device memory, so there is no `Clone`.
pub struct Index<IdxT: IndexId = u64> {
    metric: DistanceMetric,
    codebook_kind: CodebookGen,
    n_lists: u32,
    dim: u32,
    pq_bits: u32,
    pq_dim: u32,
    n_nonempty_lists: u32,

    pq_centers: DeviceArray<f32, 3>,
    pq_dataset: DeviceArray<u8, 2>,
    indices: DeviceArray<IdxT, 1>,
    rotation_matrix: DeviceArray<f32, 2>,
    list_offsets: DeviceArray<IdxT, 1>,
    centers: DeviceArray<f32, 2>,
    centers_rot: DeviceArray<f32, 2>,
}

impl<IdxT: IndexId> Index<IdxT> {
    /// Construct an empty index (size 0) with every array allocated for the
    /// given parameters. Array contents are unspecified.
    ///
    /// `pq_dim == 0` selects [`calculate_pq_dim`]`(dim)`.
    ///
    /// # Errors
    ///
    /// - [`Error::PqBitsOutOfRange`], [`Error::PqCodeNotByteAligned`] for bad
    ///   PQ parameters
    /// - [`Error::InvalidParameter`] for `n_lists == 0`, `dim == 0`,
    ///   `n_nonempty_lists > n_lists`, or derived dimensions exceeding `u32`
    /// - [`Error::Alloc`] if the memory resource refuses
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        res: &Resources,
        metric: DistanceMetric,
        codebook_kind: CodebookGen,
        n_lists: u32,
        dim: u32,
        pq_bits: u32,
        pq_dim: u32,
        n_nonempty_lists: u32,
    ) -> Result<Self> {
        if n_lists == 0 {
            return Err(Error::InvalidParameter {
                name: "n_lists",
                reason: "must be >= 1".to_string(),
            });
        }
        if dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dim",
                reason: "must be >= 1".to_string(),
            });
        }
        check_nonempty(n_nonempty_lists, n_lists)?;

        let pq_dim = if pq_dim == 0 {
            let derived = calculate_pq_dim(dim);
            info!(dim, pq_dim = derived, "derived pq_dim from dim");
            derived
        } else {
            pq_dim
        };
        check_pq_params(pq_bits, pq_dim)?;
        check_derived_dims(dim, pq_dim)?;

        let pq_len = dim.div_ceil(pq_dim) as usize;
        let rot_dim = pq_len * pq_dim as usize;
        let dim_ext = (dim as usize + 1).div_ceil(8) * 8;
        let (n_lists_us, dim_us) = (n_lists as usize, dim as usize);
        let code_bytes = pq_dim as usize * pq_bits as usize / 8;

        let index = Self {
            metric,
            codebook_kind,
            n_lists,
            dim,
            pq_bits,
            pq_dim,
            n_nonempty_lists,
            pq_centers: DeviceArray::new(
                res,
                pq_centers_extents(codebook_kind, n_lists, pq_dim, pq_len, pq_bits),
            )?,
            pq_dataset: DeviceArray::new(res, [0, code_bytes])?,
            indices: DeviceArray::new(res, [0])?,
            rotation_matrix: DeviceArray::new(res, [rot_dim, dim_us])?,
            list_offsets: DeviceArray::new(res, [n_lists_us + 1])?,
            centers: DeviceArray::new(res, [n_lists_us, dim_ext])?,
            centers_rot: DeviceArray::new(res, [n_lists_us, rot_dim])?,
        };
        index.check_consistency()?;

        debug!(
            metric = %metric,
            codebook_kind = ?codebook_kind,
            n_lists,
            dim,
            pq_bits,
            pq_dim,
            rot_dim = index.rot_dim(),
            bytes = index.bytes_allocated(),
            "constructed IVF-PQ index"
        );
        Ok(index)
    }

    /// Construct from build parameters, taking `metric`, `codebook_kind`,
    /// `n_lists`, `pq_bits` and `pq_dim` from `params`.
    pub fn from_params(
        res: &Resources,
        params: &IndexParams,
        dim: u32,
        n_nonempty_lists: u32,
    ) -> Result<Self> {
        params.validate()?;
        Self::new(
            res,
            params.metric,
            params.codebook_kind,
            params.n_lists,
            dim,
            params.pq_bits,
            params.pq_dim,
            n_nonempty_lists,
        )
    }

    /// Resize the index to hold `index_size` encoded vectors.
    ///
    /// Replaces `pq_dataset` and `indices` with fresh, unspecified storage;
    /// every other array is untouched. Both new buffers are allocated before
    /// either old one is released, so on error the index is unchanged.
    pub fn allocate(&mut self, res: &Resources, index_size: usize) -> Result<()> {
        if IdxT::from_usize(index_size).is_none() {
            return Err(Error::IdOverflow {
                value: index_size as u64,
            });
        }
        let pq_dataset = DeviceArray::new(res, [index_size, self.pq_code_bytes()])?;
        let indices = DeviceArray::new(res, [index_size])?;
        self.pq_dataset = pq_dataset;
        self.indices = indices;

        debug!(
            size = index_size,
            code_bytes = self.pq_code_bytes(),
            bytes = self.bytes_allocated(),
            "allocated IVF-PQ index storage"
        );
        self.check_consistency()
    }

    /// Verify the relations between scalar parameters and array shapes.
    pub fn check_consistency(&self) -> Result<()> {
        check_pq_params(self.pq_bits, self.pq_dim)?;

        let (indices, pq_dataset) = (self.indices.extent(0), self.pq_dataset.extent(0));
        if indices != pq_dataset {
            return Err(Error::SizeMismatch {
                indices,
                pq_dataset,
            });
        }
        let expected = self.n_lists as usize + 1;
        if self.list_offsets.extent(0) != expected {
            return Err(Error::ListOffsetsLength {
                expected,
                actual: self.list_offsets.extent(0),
            });
        }

        let n_lists = self.n_lists as usize;
        let rot_dim = self.rot_dim() as usize;
        check_shape("pq_centers", &self.pq_centers_extents(), &self.pq_centers.extents())?;
        check_shape(
            "pq_dataset",
            &[indices, self.pq_code_bytes()],
            &self.pq_dataset.extents(),
        )?;
        check_shape(
            "rotation_matrix",
            &[rot_dim, self.dim as usize],
            &self.rotation_matrix.extents(),
        )?;
        check_shape(
            "centers",
            &[n_lists, self.dim_ext() as usize],
            &self.centers.extents(),
        )?;
        check_shape("centers_rot", &[n_lists, rot_dim], &self.centers_rot.extents())
    }

    /// Check that `list_offsets` holds a valid partition of `[0, size)`:
    /// it starts at 0, ends at `size`, and never decreases.
    ///
    /// Reads the offsets back to the host.
    pub fn validate_list_offsets(&self, res: &Resources) -> Result<()> {
        let offsets: Vec<u64> = res
            .copy_to_host(self.list_offsets())
            .into_iter()
            .map(IndexId::to_u64)
            .collect();
        let size = self.size() as u64;
        let first = offsets.first().copied().unwrap_or(0);
        let last = offsets.last().copied().unwrap_or(0);
        if first != 0 || last != size {
            return Err(Error::ListOffsetsBounds { first, last, size });
        }
        for (list, pair) in offsets.windows(2).enumerate() {
            if pair[0] > pair[1] {
                return Err(Error::ListOffsetsNotMonotonic {
                    list,
                    start: pair[0],
                    end: pair[1],
                });
            }
        }
        Ok(())
    }

    /// Record how many lists hold at least one vector.
    pub fn set_n_nonempty_lists(&mut self, n_nonempty_lists: u32) -> Result<()> {
        check_nonempty(n_nonempty_lists, self.n_lists)?;
        self.n_nonempty_lists = n_nonempty_lists;
        Ok(())
    }

    /// Whether encoding must go through a random rotation rather than the
    /// identity: always when `rot_dim != dim`, otherwise only when forced.
    #[inline]
    pub fn requires_random_rotation(&self, force_random_rotation: bool) -> bool {
        force_random_rotation || self.rot_dim() != self.dim
    }

    // Scalars

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn codebook_kind(&self) -> CodebookGen {
        self.codebook_kind
    }

    #[inline]
    pub fn n_lists(&self) -> u32 {
        self.n_lists
    }

    #[inline]
    pub fn n_nonempty_lists(&self) -> u32 {
        self.n_nonempty_lists
    }

    /// Dimensionality of the input data.
    #[inline]
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// `dim + 1` rounded up to a multiple of 8: room for the center norm.
    #[inline]
    pub fn dim_ext(&self) -> u32 {
        (self.dim + 1).div_ceil(8) * 8
    }

    /// Dimensionality after rotation: `pq_len * pq_dim`, never below `dim`.
    #[inline]
    pub fn rot_dim(&self) -> u32 {
        self.pq_len() * self.pq_dim
    }

    #[inline]
    pub fn pq_bits(&self) -> u32 {
        self.pq_bits
    }

    #[inline]
    pub fn pq_dim(&self) -> u32 {
        self.pq_dim
    }

    /// Length of one subspace: `ceil(dim / pq_dim)`.
    #[inline]
    pub fn pq_len(&self) -> u32 {
        self.dim.div_ceil(self.pq_dim)
    }

    /// Codebook entries: `1 << pq_bits`.
    #[inline]
    pub fn pq_book_size(&self) -> u32 {
        1 << self.pq_bits
    }

    /// Bytes per encoded vector: `pq_dim * pq_bits / 8`.
    #[inline]
    pub fn pq_code_bytes(&self) -> usize {
        self.pq_dim as usize * self.pq_bits as usize / 8
    }

    /// Number of encoded vectors.
    #[inline]
    pub fn size(&self) -> usize {
        self.indices.extent(0)
    }

    /// Device bytes held by all seven arrays.
    pub fn bytes_allocated(&self) -> usize {
        self.pq_centers.bytes()
            + self.pq_dataset.bytes()
            + self.indices.bytes()
            + self.rotation_matrix.bytes()
            + self.list_offsets.bytes()
            + self.centers.bytes()
            + self.centers_rot.bytes()
    }

    // Arrays

    /// PQ codebooks.
    #[inline]
    pub fn pq_centers(&self) -> DeviceView<'_, f32, 3> {
        self.pq_centers.view()
    }

    #[inline]
    pub fn pq_centers_mut(&mut self) -> DeviceViewMut<'_, f32, 3> {
        self.pq_centers.view_mut()
    }

    /// Encoded vectors, one row of `pq_code_bytes` per vector, grouped by list.
    #[inline]
    pub fn pq_dataset(&self) -> DeviceView<'_, u8, 2> {
        self.pq_dataset.view()
    }

    #[inline]
    pub fn pq_dataset_mut(&mut self) -> DeviceViewMut<'_, u8, 2> {
        self.pq_dataset.view_mut()
    }

    /// Source ids of the encoded vectors, in `pq_dataset` order.
    #[inline]
    pub fn indices(&self) -> DeviceView<'_, IdxT, 1> {
        self.indices.view()
    }

    #[inline]
    pub fn indices_mut(&mut self) -> DeviceViewMut<'_, IdxT, 1> {
        self.indices.view_mut()
    }

    /// Transform from `dim` to `rot_dim`.
    #[inline]
    pub fn rotation_matrix(&self) -> DeviceView<'_, f32, 2> {
        self.rotation_matrix.view()
    }

    #[inline]
    pub fn rotation_matrix_mut(&mut self) -> DeviceViewMut<'_, f32, 2> {
        self.rotation_matrix.view_mut()
    }

    /// List `l` occupies rows `list_offsets[l]..list_offsets[l + 1]`.
    #[inline]
    pub fn list_offsets(&self) -> DeviceView<'_, IdxT, 1> {
        self.list_offsets.view()
    }

    #[inline]
    pub fn list_offsets_mut(&mut self) -> DeviceViewMut<'_, IdxT, 1> {
        self.list_offsets.view_mut()
    }

    /// Cluster centers in the input space, extended with their norms.
    #[inline]
    pub fn centers(&self) -> DeviceView<'_, f32, 2> {
        self.centers.view()
    }

    #[inline]
    pub fn centers_mut(&mut self) -> DeviceViewMut<'_, f32, 2> {
        self.centers.view_mut()
    }

    /// Cluster centers in the rotated space.
    #[inline]
    pub fn centers_rot(&self) -> DeviceView<'_, f32, 2> {
        self.centers_rot.view()
    }

    #[inline]
    pub fn centers_rot_mut(&mut self) -> DeviceViewMut<'_, f32, 2> {
        self.centers_rot.view_mut()
    }

    fn pq_centers_extents(&self) -> [usize; 3] {
        pq_centers_extents(
            self.codebook_kind,
            self.n_lists,
            self.pq_dim,
            self.pq_len() as usize,
            self.pq_bits,
        )
    }
}

impl<IdxT: IndexId> fmt::Debug for Index<IdxT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("metric", &self.metric)
            .field("codebook_kind", &self.codebook_kind)
            .field("n_lists", &self.n_lists)
            .field("n_nonempty_lists", &self.n_nonempty_lists)
            .field("dim", &self.dim)
            .field("rot_dim", &self.rot_dim())
            .field("pq_bits", &self.pq_bits)
            .field("pq_dim", &self.pq_dim)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

fn pq_centers_extents(
    kind: CodebookGen,
    n_lists: u32,
    pq_dim: u32,
    pq_len: usize,
    pq_bits: u32,
) -> [usize; 3] {
    let book = 1usize << pq_bits;
    match kind {
        CodebookGen::PerSubspace => [pq_dim as usize, book, pq_len],
        CodebookGen::PerCluster => [n_lists as usize, book, pq_len],
    }
}

fn check_nonempty(n_nonempty_lists: u32, n_lists: u32) -> Result<()> {
    if n_nonempty_lists > n_lists {
        return Err(Error::InvalidParameter {
            name: "n_nonempty_lists",
            reason: format!("{n_nonempty_lists} exceeds n_lists = {n_lists}"),
        });
    }
    Ok(())
}

// `rot_dim` and `dim_ext` are kept as u32 like the other dimensions.
fn check_derived_dims(dim: u32, pq_dim: u32) -> Result<()> {
    let dim = u64::from(dim);
    let pq_dim = u64::from(pq_dim);
    let rot_dim = dim.div_ceil(pq_dim) * pq_dim;
    if rot_dim > u64::from(u32::MAX) {
        return Err(Error::InvalidParameter {
            name: "pq_dim",
            reason: format!("rot_dim = {rot_dim} exceeds u32"),
        });
    }
    if (dim + 1).div_ceil(8) * 8 > u64::from(u32::MAX) {
        return Err(Error::InvalidParameter {
            name: "dim",
            reason: format!("dim_ext for dim = {dim} exceeds u32"),
        });
    }
    Ok(())
}

fn check_shape(array: &'static str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            array,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdspan::MemoryType;
    use crate::resources::ResourcesConfig;

    fn index(res: &Resources, n_lists: u32, dim: u32, pq_bits: u32, pq_dim: u32) -> Result<Index> {
        Index::new(
            res,
            DistanceMetric::L2,
            CodebookGen::PerSubspace,
            n_lists,
            dim,
            pq_bits,
            pq_dim,
            0,
        )
    }

    #[test]
    fn default_pq_dim() {
        assert_eq!(calculate_pq_dim(512), 256);
        assert_eq!(calculate_pq_dim(128), 64);
        assert_eq!(calculate_pq_dim(200), 96);
        assert_eq!(calculate_pq_dim(100), 96);
        assert_eq!(calculate_pq_dim(33), 32);
        assert_eq!(calculate_pq_dim(10), 8);
        assert_eq!(calculate_pq_dim(1), 1);
        assert_eq!(calculate_pq_dim(0), 1);
    }

    #[test]
    fn construct_dim_128() {
        let res = Resources::new();
        let idx = index(&res, 4, 128, 8, 0).unwrap();
        assert_eq!(idx.pq_dim(), 64);
        assert_eq!(idx.pq_len(), 2);
        assert_eq!(idx.rot_dim(), 128);
        assert_eq!(idx.dim_ext(), 136);
        assert_eq!(idx.pq_book_size(), 256);
        assert_eq!(idx.pq_code_bytes(), 64);
        assert_eq!(idx.size(), 0);

        assert_eq!(idx.pq_centers().extents(), [64, 256, 2]);
        assert_eq!(idx.pq_dataset().extents(), [0, 64]);
        assert_eq!(idx.indices().extents(), [0]);
        assert_eq!(idx.rotation_matrix().extents(), [128, 128]);
        assert_eq!(idx.list_offsets().extents(), [5]);
        assert_eq!(idx.centers().extents(), [4, 136]);
        assert_eq!(idx.centers_rot().extents(), [4, 128]);
        assert!(!idx.requires_random_rotation(false));
        assert!(idx.requires_random_rotation(true));
        assert_eq!(idx.pq_centers().memory_type(), MemoryType::Device);
    }

    #[test]
    fn uneven_dim_rotates() {
        let res = Resources::new();
        let idx = index(&res, 8, 100, 4, 32).unwrap();
        assert_eq!(idx.pq_len(), 4);
        assert_eq!(idx.rot_dim(), 128);
        assert_eq!(idx.dim_ext(), 104);
        assert_eq!(idx.pq_code_bytes(), 16);
        assert_eq!(idx.pq_centers().extents(), [32, 16, 4]);
        assert_eq!(idx.rotation_matrix().extents(), [128, 100]);
        assert!(idx.requires_random_rotation(false));
    }

    #[test]
    fn per_cluster_codebooks() {
        let res = Resources::new();
        let idx = Index::<u32>::new(
            &res,
            DistanceMetric::InnerProduct,
            CodebookGen::PerCluster,
            16,
            64,
            8,
            16,
            3,
        )
        .unwrap();
        assert_eq!(idx.pq_centers().extents(), [16, 256, 4]);
        assert_eq!(idx.n_nonempty_lists(), 3);
        assert_eq!(idx.metric(), DistanceMetric::InnerProduct);
    }

    #[test]
    fn rejects_bad_pq_params() {
        let res = Resources::new();
        assert_eq!(
            index(&res, 4, 64, 5, 3).unwrap_err(),
            Error::PqCodeNotByteAligned {
                pq_bits: 5,
                pq_dim: 3,
                product: 15
            }
        );
        assert_eq!(
            index(&res, 4, 64, 3, 8).unwrap_err(),
            Error::PqBitsOutOfRange { pq_bits: 3 }
        );
        assert_eq!(
            index(&res, 4, 64, 9, 8).unwrap_err(),
            Error::PqBitsOutOfRange { pq_bits: 9 }
        );
        assert!(matches!(
            index(&res, 0, 64, 8, 8),
            Err(Error::InvalidParameter { name: "n_lists", .. })
        ));
        assert!(matches!(
            index(&res, 4, 0, 8, 8),
            Err(Error::InvalidParameter { name: "dim", .. })
        ));
        assert_eq!(res.memory_stats().total_allocated, 0);
    }

    #[test]
    fn allocate_touches_only_dataset_and_indices() {
        let res = Resources::new();
        let mut idx = index(&res, 2, 16, 8, 8).unwrap();
        let centers: Vec<f32> = (0..idx.centers().len()).map(|i| i as f32).collect();
        res.copy_from_host(&mut idx.centers_mut(), &centers).unwrap();
        let rotation_addr = idx.rotation_matrix().addr();

        idx.allocate(&res, 10).unwrap();
        assert_eq!(idx.size(), 10);
        assert_eq!(idx.pq_dataset().extents(), [10, 8]);
        assert_eq!(idx.indices().extents(), [10]);
        assert_eq!(idx.rotation_matrix().addr(), rotation_addr);
        assert_eq!(res.copy_to_host(idx.centers()), centers);

        idx.allocate(&res, 3).unwrap();
        assert_eq!(idx.size(), 3);
        idx.allocate(&res, 0).unwrap();
        assert_eq!(idx.pq_dataset().extents(), [0, 8]);
        idx.check_consistency().unwrap();
    }

    #[test]
    fn failed_allocate_leaves_index_unchanged() {
        let res = Resources::with_config(ResourcesConfig::with_budget(64 * 1024)).unwrap();
        let mut idx = index(&res, 2, 16, 8, 8).unwrap();
        idx.allocate(&res, 4).unwrap();
        let before = res.memory_stats().total_allocated;

        let err = idx.allocate(&res, 1 << 20).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Allocation);
        assert_eq!(idx.size(), 4);
        assert_eq!(idx.pq_dataset().extents(), [4, 8]);
        assert_eq!(res.memory_stats().total_allocated, before);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn allocate_rejects_sizes_beyond_id_type() {
        let res = Resources::new();
        let mut idx = Index::<u32>::new(
            &res,
            DistanceMetric::L2,
            CodebookGen::PerSubspace,
            1,
            8,
            8,
            8,
            0,
        )
        .unwrap();
        let err = idx.allocate(&res, u32::MAX as usize + 1).unwrap_err();
        assert_eq!(
            err,
            Error::IdOverflow {
                value: u64::from(u32::MAX) + 1
            }
        );
        assert_eq!(idx.size(), 0);
    }

    #[test]
    fn list_offsets_validation() {
        let res = Resources::new();
        let mut idx = Index::<i64>::new(
            &res,
            DistanceMetric::L2,
            CodebookGen::PerSubspace,
            4,
            8,
            8,
            8,
            0,
        )
        .unwrap();
        // Zeroed offsets describe an empty index.
        idx.validate_list_offsets(&res).unwrap();

        idx.allocate(&res, 10).unwrap();
        res.copy_from_host(&mut idx.list_offsets_mut(), &[0, 3, 3, 7, 10])
            .unwrap();
        idx.validate_list_offsets(&res).unwrap();

        res.copy_from_host(&mut idx.list_offsets_mut(), &[0, 5, 3, 7, 10])
            .unwrap();
        assert_eq!(
            idx.validate_list_offsets(&res).unwrap_err(),
            Error::ListOffsetsNotMonotonic {
                list: 1,
                start: 5,
                end: 3
            }
        );

        res.copy_from_host(&mut idx.list_offsets_mut(), &[0, 3, 3, 7, 9])
            .unwrap();
        assert_eq!(
            idx.validate_list_offsets(&res).unwrap_err(),
            Error::ListOffsetsBounds {
                first: 0,
                last: 9,
                size: 10
            }
        );

        res.copy_from_host(&mut idx.list_offsets_mut(), &[-1, 3, 3, 7, 10])
            .unwrap();
        assert!(matches!(
            idx.validate_list_offsets(&res),
            Err(Error::ListOffsetsBounds { first: u64::MAX, .. })
        ));
    }

    #[test]
    fn nonempty_list_count() {
        let res = Resources::new();
        let mut idx = index(&res, 4, 8, 8, 8).unwrap();
        idx.set_n_nonempty_lists(4).unwrap();
        assert_eq!(idx.n_nonempty_lists(), 4);
        assert!(idx.set_n_nonempty_lists(5).is_err());
        assert_eq!(idx.n_nonempty_lists(), 4);
    }

    #[test]
    fn move_keeps_storage() {
        let res = Resources::new();
        let mut idx = index(&res, 2, 16, 8, 8).unwrap();
        idx.allocate(&res, 5).unwrap();

        let ramp = |n: usize| (0..n).map(|i| i as f32 * 0.5).collect::<Vec<_>>();
        let books = ramp(idx.pq_centers().len());
        let rotation = ramp(idx.rotation_matrix().len());
        let centers = ramp(idx.centers().len());
        let centers_rot = ramp(idx.centers_rot().len());
        let codes: Vec<u8> = (0..idx.pq_dataset().len()).map(|i| i as u8).collect();
        res.copy_from_host(&mut idx.pq_centers_mut(), &books).unwrap();
        res.copy_from_host(&mut idx.rotation_matrix_mut(), &rotation).unwrap();
        res.copy_from_host(&mut idx.centers_mut(), &centers).unwrap();
        res.copy_from_host(&mut idx.centers_rot_mut(), &centers_rot).unwrap();
        res.copy_from_host(&mut idx.pq_dataset_mut(), &codes).unwrap();
        res.copy_from_host(&mut idx.indices_mut(), &[4, 3, 2, 1, 0]).unwrap();
        res.copy_from_host(&mut idx.list_offsets_mut(), &[0, 2, 5]).unwrap();

        let shapes = |i: &Index| {
            (
                i.pq_centers().extents(),
                i.pq_dataset().extents(),
                i.indices().extents(),
                i.rotation_matrix().extents(),
                i.list_offsets().extents(),
                i.centers().extents(),
                i.centers_rot().extents(),
            )
        };
        let before = shapes(&idx);
        let addr = idx.indices().addr();
        let bytes = idx.bytes_allocated();
        assert_eq!(res.memory_stats().total_allocated, bytes);

        let moved = idx;
        assert_eq!(shapes(&moved), before);
        assert_eq!(moved.indices().addr(), addr);
        assert_eq!(moved.size(), 5);
        assert_eq!(res.copy_to_host(moved.pq_centers()), books);
        assert_eq!(res.copy_to_host(moved.pq_dataset()), codes);
        assert_eq!(res.copy_to_host(moved.indices()), vec![4, 3, 2, 1, 0]);
        assert_eq!(res.copy_to_host(moved.rotation_matrix()), rotation);
        assert_eq!(res.copy_to_host(moved.list_offsets()), vec![0, 2, 5]);
        assert_eq!(res.copy_to_host(moved.centers()), centers);
        assert_eq!(res.copy_to_host(moved.centers_rot()), centers_rot);
        moved.validate_list_offsets(&res).unwrap();
        assert_eq!(res.memory_stats().total_allocated, bytes);

        drop(moved);
        assert_eq!(res.memory_stats().total_allocated, 0);
    }
}
