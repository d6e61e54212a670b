use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use svdface::config::Config;
use svdface::matcher::{self, similarity, Decision};
use svdface::storage::{self, FileStore, Gallery, IdentityStore, MemoryStore, SharedStore};
use svdface::{Descriptor, Error, Recognizer};

const K: usize = 10;
const THRESHOLD: f64 = K as f64 * 0.8;

fn random_image(seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((100, 100), |_| rng.gen_range(0.0..=255.0))
}

fn descriptor(seed: u64) -> Descriptor {
    svdface_vision::extract(&Default::default(), &random_image(seed)).unwrap()
}

/// Probe spanned by the first K axes of R^100.
fn probe() -> Descriptor {
    Descriptor::from_basis(Array2::from_shape_fn((100, K), |(r, c)| {
        if r == c {
            1.0
        } else {
            0.0
        }
    }))
}

/// Orthonormal basis whose similarity to `probe()` is exactly `7 + 3 * cos2`:
/// seven shared axes, three columns tilted towards private axes.
fn tilted(cos2: f64) -> Descriptor {
    let (c, s) = (cos2.sqrt(), (1.0 - cos2).sqrt());
    let mut basis = Array2::zeros((100, K));
    for j in 0..7 {
        basis[[j, j]] = 1.0;
    }
    for j in 7..K {
        basis[[j, j]] = c;
        basis[[j + 10, j]] = s;
    }
    Descriptor::from_basis(basis)
}

fn temp_store_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("svdface-test-{}", uuid::Uuid::new_v4()))
        .join("faces.bin")
}

#[test]
fn test_self_similarity_is_k() {
    for seed in 0..3 {
        let d = descriptor(seed);
        let s = similarity(&d, &d);
        assert!((s - K as f64).abs() < 1e-6, "seed {}: {}", seed, s);
    }
}

#[test]
fn test_similarity_symmetric_and_bounded() {
    let ds: Vec<_> = (0..4).map(descriptor).collect();
    for a in &ds {
        for b in &ds {
            let ab = similarity(a, b);
            let ba = similarity(b, a);
            assert!((ab - ba).abs() < 1e-9);
            assert!(ab >= 0.0 && ab <= K as f64 + 1e-6, "out of range: {}", ab);
        }
    }
}

#[test]
fn test_reenroll_keeps_only_latest() -> Result<()> {
    let store = MemoryStore::new();
    let (d1, d2) = (descriptor(1), descriptor(2));
    storage::enroll(&store, "alice", d1)?;
    storage::enroll(&store, "alice", d2.clone())?;

    let gallery = store.load()?;
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery.get("alice"), Some(&d2));
    Ok(())
}

#[test]
fn test_empty_store_rejects() -> Result<()> {
    let decision = matcher::verify(&Gallery::new(), &descriptor(5), THRESHOLD)?;
    assert!(!decision.is_accept());
    assert_eq!(decision.identity(), None);
    assert_eq!(decision.score(), f64::NEG_INFINITY);
    Ok(())
}

#[test]
fn test_identical_subspace_accepts() -> Result<()> {
    let mut gallery = Gallery::new();
    gallery.insert("bob", probe());

    let decision = matcher::verify(&gallery, &probe(), THRESHOLD)?;
    assert_eq!(decision.identity(), Some("bob"));
    Ok(())
}

#[test]
fn test_orthogonal_subspace_rejects() -> Result<()> {
    let orthogonal = Descriptor::from_basis(Array2::from_shape_fn((100, K), |(r, c)| {
        if r == c + 50 {
            1.0
        } else {
            0.0
        }
    }));
    let mut gallery = Gallery::new();
    gallery.insert("bob", orthogonal);

    let decision = matcher::verify(&gallery, &probe(), THRESHOLD)?;
    assert!(!decision.is_accept());
    assert_eq!(decision.score(), 0.0);
    Ok(())
}

#[test]
fn test_best_below_threshold_still_rejects() -> Result<()> {
    let mut gallery = Gallery::new();
    gallery.insert("carol", tilted(0.3));
    gallery.insert("dave", tilted(0.95 / 3.0));

    let best = matcher::best_match(&gallery, &probe())?;
    assert_eq!(best.name.as_deref(), Some("dave"));
    assert!((best.score - 7.95).abs() < 1e-9);

    match matcher::decide(best, THRESHOLD) {
        Decision::Reject { best } => assert!(best.score < THRESHOLD),
        other => panic!("expected reject, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_round_trip_preserves_decisions() -> Result<()> {
    let path = temp_store_path();
    let store = FileStore::new(&path);
    assert!(store.load()?.is_empty());

    for seed in 0..3 {
        storage::enroll(&store, &format!("user{}", seed), descriptor(seed))?;
    }
    let in_memory = store.load()?;
    let reloaded = FileStore::new(&path).load()?;
    assert_eq!(in_memory, reloaded);

    for seed in 0..5 {
        let p = descriptor(seed);
        assert_eq!(
            matcher::verify(&in_memory, &p, THRESHOLD)?,
            matcher::verify(&reloaded, &p, THRESHOLD)?
        );
    }

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
    Ok(())
}

#[test]
fn test_corrupt_store_is_persistence_error() -> Result<()> {
    let path = temp_store_path();
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(&path, [0xff, 0xff, 0xff])?;

    let err = FileStore::new(&path).load().unwrap_err();
    assert!(err.is_persistence());

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
    Ok(())
}

#[test]
fn test_failed_enroll_leaves_store_untouched() -> Result<()> {
    let path = temp_store_path();
    let store = FileStore::new(&path);
    storage::enroll(&store, "alice", descriptor(1))?;
    let before = store.load()?;

    let rec = Recognizer::new(&Config::default(), FileStore::new(&path))?;
    let err = rec.enroll_image("bob", &Array2::zeros((50, 100))).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.load()?, before);

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
    Ok(())
}

#[test]
fn test_recognizer_end_to_end() -> Result<()> {
    let path = temp_store_path();
    let rec = Recognizer::new(&Config::default(), FileStore::new(&path))?;

    rec.enroll_image("alice", &random_image(10))?;
    rec.enroll_image("bob", &random_image(11))?;

    let v = rec.verify_image(&random_image(11))?;
    assert_eq!(v.decision.identity(), Some("bob"));
    assert!((v.decision.score() - K as f64).abs() < 1e-6);

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
    Ok(())
}

#[test]
fn test_concurrent_enrollment_through_recognizer_keeps_everyone() -> Result<()> {
    let path = temp_store_path();
    let rec = Recognizer::new(&Config::default(), SharedStore::new(FileStore::new(&path)))?;

    std::thread::scope(|s| {
        for seed in 0..6u64 {
            let rec = &rec;
            s.spawn(move || {
                rec.enroll_image(&format!("user{}", seed), &random_image(seed))
                    .unwrap();
            });
        }
    });

    let gallery = FileStore::new(&path).load()?;
    assert_eq!(gallery.len(), 6);
    for seed in 0..6u64 {
        let v = rec.verify_image(&random_image(seed))?;
        assert_eq!(v.decision.identity(), Some(format!("user{}", seed).as_str()));
    }

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
    Ok(())
}
