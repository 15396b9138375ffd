use gp_core::Error;
use gp_datasets::{CachePolicy, Dataset, DatasetConfig, GmmConfig, MvnConfig, Provenance};

fn gmm_config(ptb_mean: f64) -> DatasetConfig {
    DatasetConfig::Gmm(GmmConfig {
        num_trials: 4,
        num_samples: 50,
        logweight: vec![0.0, 0.5],
        mean: vec![vec![-2.0, 0.0, 1.0], vec![2.0, 0.0, -1.0]],
        cov: vec![
            vec![vec![1.0, 0.2, 0.0], vec![0.2, 1.0, 0.0], vec![0.0, 0.0, 0.5]],
            vec![vec![0.8, 0.0, 0.0], vec![0.0, 0.8, 0.0], vec![0.0, 0.0, 0.8]],
        ],
        ptb_logweight: 0.1,
        ptb_mean,
        ptb_logvar: 0.1,
        seed: 42,
    })
}

fn mvn_config() -> DatasetConfig {
    DatasetConfig::Mvn(MvnConfig {
        num_trials: 6,
        num_samples: 30,
        mean: vec![0.0],
        cov: vec![vec![2.0]],
        ptb_mean: 0.5,
        ptb_logvar: 0.2,
        seed: 1,
    })
}

#[test]
fn second_open_reuses_cached_data() {
    let dir = tempfile::tempdir().unwrap();
    let first = Dataset::open(dir.path(), gmm_config(1.0)).unwrap();
    assert_eq!(first.provenance(), Provenance::Generated);

    let second = Dataset::open(dir.path(), gmm_config(1.0)).unwrap();
    assert_eq!(second.provenance(), Provenance::Cached);
    assert_eq!(second.fingerprint(), first.fingerprint());
    assert_eq!(second.null_array(), first.null_array());
    assert_eq!(second.alter_array(), first.alter_array());
    assert_eq!(second.alter_params(), first.alter_params());
}

#[test]
fn distinct_configs_get_distinct_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let a = Dataset::open(dir.path(), gmm_config(1.0)).unwrap();
    let b = Dataset::open(dir.path(), gmm_config(2.0)).unwrap();
    assert_eq!(b.provenance(), Provenance::Generated);
    assert_ne!(a.artifact_path(), b.artifact_path());
    assert_eq!(std::fs::read_dir(a.processed_folder()).unwrap().count(), 2);
}

#[test]
fn corrupt_artifact_is_reported_and_force_regenerate_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let ds = Dataset::open(dir.path(), mvn_config()).unwrap();
    let path = ds.artifact_path();

    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x5a;
    std::fs::write(&path, &bytes).unwrap();

    let err = Dataset::open(dir.path(), mvn_config()).unwrap_err();
    match err {
        Error::CacheCorrupt { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected CacheCorrupt, got {other}"),
    }

    let fresh = Dataset::open_with(dir.path(), mvn_config(), CachePolicy::ForceRegenerate).unwrap();
    assert_eq!(fresh.provenance(), Provenance::Generated);
    assert_eq!(fresh.null_array(), ds.null_array());

    let reopened = Dataset::open(dir.path(), mvn_config()).unwrap();
    assert_eq!(reopened.provenance(), Provenance::Cached);
}

#[test]
fn empty_artifact_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let ds = Dataset::open(dir.path(), mvn_config()).unwrap();
    std::fs::write(ds.artifact_path(), b"").unwrap();
    assert!(matches!(
        Dataset::open(dir.path(), mvn_config()).unwrap_err(),
        Error::CacheCorrupt { .. }
    ));
}

#[test]
fn shapes_and_metadata_agree() {
    let dir = tempfile::tempdir().unwrap();
    for cfg in [gmm_config(0.5), mvn_config()] {
        let (t, n, d) = (cfg.num_trials(), cfg.num_samples(), cfg.dim());
        let ds = Dataset::open(dir.path(), cfg).unwrap();
        assert_eq!(ds.len(), t);
        assert_eq!(ds.null_array().shape(), [t, n, d]);
        assert_eq!(ds.alter_array().shape(), [t, n, d]);
        assert_eq!(ds.alter_params().len(), t);
        for trial in ds.iter() {
            let trial = trial.unwrap();
            assert_eq!(trial.null.shape(), (n, d));
            assert_eq!(trial.alter.shape(), (n, d));
            assert_eq!(trial.alter_params.dim(), d);
            assert_eq!(trial.alter_params.family(), trial.null_params.family());
            trial.alter_params.validate().unwrap();
        }
    }
}

#[test]
fn generation_is_reproducible_across_roots() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let da = Dataset::open(a.path(), gmm_config(1.0)).unwrap();
    let db = Dataset::open(b.path(), gmm_config(1.0)).unwrap();
    assert_eq!(da.null_array(), db.null_array());
    assert_eq!(da.alter_params(), db.alter_params());
}

#[test]
fn concurrent_first_open_of_one_config_succeeds_everywhere() {
    use std::sync::{Arc, Barrier};

    let cfg = DatasetConfig::Mvn(MvnConfig {
        num_trials: 50,
        num_samples: 2000,
        mean: vec![0.0, 0.0],
        cov: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ptb_mean: 1.0,
        ptb_logvar: 0.0,
        seed: 99,
    });

    for round in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = dir.path().to_path_buf();
                let cfg = cfg.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    Dataset::open(root, cfg)
                })
            })
            .collect();

        let opened: Vec<Dataset> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap_or_else(|e| panic!("round {round}: {e}")))
            .collect();
        for ds in &opened[1..] {
            assert_eq!(ds.null_array(), opened[0].null_array());
            assert_eq!(ds.alter_params(), opened[0].alter_params());
        }

        // Only the published artifact remains; no staging files leak.
        let names: Vec<_> = std::fs::read_dir(opened[0].processed_folder())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "round {round}: {names:?}");
        let reopened = Dataset::open(dir.path(), cfg.clone()).unwrap();
        assert_eq!(reopened.provenance(), Provenance::Cached);
    }
}
