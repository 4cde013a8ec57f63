//! End-to-end lifecycle of an IVF-PQ index.
//!
//! Construct -> allocate -> populate through mutable views -> read back
//! through read-only views -> resize -> drop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pqspan::ivf_pq::{CodebookGen, Index, IndexParams, SearchParams};
use pqspan::{DistanceMetric, Resources, ResourcesConfig};

/// Stand-in for an external trainer: fills the arrays a searcher reads and
/// lays out `sizes[l]` vectors in list `l`.
fn populate(res: &Resources, index: &mut Index<u64>, sizes: &[u64]) {
    let total: u64 = sizes.iter().sum();
    index
        .allocate(res, total as usize)
        .expect("allocate failed");

    let mut offsets = vec![0u64];
    for s in sizes {
        offsets.push(offsets.last().copied().unwrap_or(0) + s);
    }
    res.copy_from_host(&mut index.list_offsets_mut(), &offsets)
        .expect("offsets");

    let ids: Vec<u64> = (0..total).map(|i| 1000 + i).collect();
    res.copy_from_host(&mut index.indices_mut(), &ids)
        .expect("indices");

    let codes: Vec<u8> = (0..index.pq_dataset().len()).map(|i| (i % 251) as u8).collect();
    res.copy_from_host(&mut index.pq_dataset_mut(), &codes)
        .expect("codes");

    let mut rng = StdRng::seed_from_u64(42);
    let books: Vec<f32> = (0..index.pq_centers().len())
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();
    res.copy_from_host(&mut index.pq_centers_mut(), &books)
        .expect("codebooks");

    let nonempty = sizes.iter().filter(|&&s| s > 0).count() as u32;
    index.set_n_nonempty_lists(nonempty).expect("nonempty");
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn default_params_scenario() {
    let res = Resources::new();
    let params = IndexParams {
        n_lists: 8,
        ..Default::default()
    };
    let index: Index<u64> = Index::from_params(&res, &params, 128, 0).expect("construct");

    assert_eq!(index.pq_dim(), 64);
    assert_eq!(index.pq_book_size(), 256);
    assert_eq!(index.dim_ext(), 136);
    assert_eq!(index.pq_len(), 2);
    assert_eq!(index.rot_dim(), 128);
    assert_eq!(index.size(), 0);
    assert_eq!(index.list_offsets().extent(0), 9);
    assert_eq!(index.codebook_kind(), CodebookGen::PerSubspace);
    assert_eq!(index.metric(), DistanceMetric::L2);
    assert!(!index.requires_random_rotation(params.force_random_rotation));
}

#[test]
fn codebook_kind_selects_first_axis() {
    let res = Resources::new();
    let base = IndexParams {
        n_lists: 10,
        pq_dim: 16,
        pq_bits: 6,
        ..Default::default()
    };
    let per_subspace: Index<u64> = Index::from_params(&res, &base, 64, 0).expect("subspace");
    let per_cluster: Index<u64> = Index::from_params(
        &res,
        &IndexParams {
            codebook_kind: CodebookGen::PerCluster,
            ..base.clone()
        },
        64,
        0,
    )
    .expect("cluster");

    assert_eq!(per_subspace.pq_centers().extents(), [16, 64, 4]);
    assert_eq!(per_cluster.pq_centers().extents(), [10, 64, 4]);
    assert_eq!(per_subspace.pq_code_bytes(), 12);
}

// =============================================================================
// Populate and read back
// =============================================================================

#[test]
fn populate_and_read_back() {
    let res = Resources::new();
    let mut index = Index::<u64>::new(
        &res,
        DistanceMetric::InnerProduct,
        CodebookGen::PerSubspace,
        4,
        32,
        8,
        8,
        0,
    )
    .expect("construct");

    populate(&res, &mut index, &[3, 0, 5, 2]);
    assert_eq!(index.size(), 10);
    assert_eq!(index.n_nonempty_lists(), 3);
    index.validate_list_offsets(&res).expect("offsets valid");
    index.check_consistency().expect("consistent");

    let offsets = res.copy_to_host(index.list_offsets());
    assert_eq!(offsets, vec![0, 3, 3, 8, 10]);

    // List 2 occupies rows 3..8.
    let ids = res.copy_to_host(index.indices());
    assert_eq!(&ids[3..8], &[1003, 1004, 1005, 1006, 1007]);

    let codes = res.copy_to_host(index.pq_dataset());
    assert_eq!(codes.len(), 10 * 8);
    assert_eq!(codes[9], 9);
}

#[test]
fn searcher_sees_read_only_device_views() {
    let res = Resources::new();
    let mut index = Index::<u64>::new(
        &res,
        DistanceMetric::L2,
        CodebookGen::PerCluster,
        2,
        16,
        8,
        8,
        0,
    )
    .expect("construct");
    populate(&res, &mut index, &[1, 1]);

    let search = SearchParams {
        n_probes: 50,
        ..Default::default()
    };
    search.validate().expect("search params");
    assert_eq!(search.effective_n_probes(index.n_lists()), 2);

    let index = &index;
    let centers = index.pq_centers();
    let again = index.pq_centers();
    assert_eq!(centers.as_ptr(), again.as_ptr());
    assert_eq!(centers.extents(), [2, 256, 2]);
    assert!(!centers.as_ptr().is_null());
}

// =============================================================================
// Resize and release
// =============================================================================

#[test]
fn resize_replaces_only_dataset_and_indices() {
    let res = Resources::new();
    let mut index = Index::<u64>::new(
        &res,
        DistanceMetric::L2,
        CodebookGen::PerSubspace,
        4,
        32,
        8,
        8,
        0,
    )
    .expect("construct");
    populate(&res, &mut index, &[2, 2, 2, 2]);
    let books = res.copy_to_host(index.pq_centers());

    index.allocate(&res, 20).expect("grow");
    assert_eq!(index.size(), 20);
    assert_eq!(index.pq_dataset().extents(), [20, 8]);
    assert_eq!(res.copy_to_host(index.pq_centers()), books);
    // Offsets were not rewritten, so they no longer describe the index.
    assert!(index.validate_list_offsets(&res).is_err());

    index.allocate(&res, 4).expect("shrink");
    assert_eq!(index.indices().extent(0), 4);
}

#[test]
fn drop_releases_everything() {
    let res = Resources::with_config(ResourcesConfig::default()).expect("resources");
    {
        let mut index = Index::<u64>::new(
            &res,
            DistanceMetric::L2,
            CodebookGen::PerSubspace,
            16,
            96,
            8,
            32,
            0,
        )
        .expect("construct");
        index.allocate(&res, 1000).expect("allocate");
        let stats = res.memory_stats();
        assert_eq!(stats.total_allocated, index.bytes_allocated());
        assert!(stats.peak_usage >= stats.total_allocated);
    }
    assert_eq!(res.memory_stats().total_allocated, 0);
}

#[test]
fn index_moves_across_threads() {
    let res = Resources::new();
    let mut index = Index::<u64>::new(
        &res,
        DistanceMetric::L2,
        CodebookGen::PerSubspace,
        2,
        16,
        8,
        8,
        0,
    )
    .expect("construct");
    populate(&res, &mut index, &[3, 1]);

    let handle = {
        let res = res.clone();
        std::thread::spawn(move || {
            index.validate_list_offsets(&res).expect("offsets");
            res.copy_to_host(index.indices())
        })
    };
    let ids = handle.join().expect("thread panicked");
    assert_eq!(ids, vec![1000, 1001, 1002, 1003]);
}
