//! Signed Distance and Fusion Suite
//!
//! Properties of the operations built on two-sided propagation: sign of
//! the signed map, boundary behaviour of the soft fusion and the
//! smoothing effect of the symmetric filter.

use geodesic_core::{
    geodesic_symmetric_filter_2d, geodesic_symmetric_filter_3d, gsf_2d, gsf_3d,
    signed_generalised_geodesic_2d, signed_generalised_geodesic_3d, Device, ExecutionStrategy,
    GeodesicError, GeodesicParams, GeodesicTransform, GridField,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// 2D binary mask with a filled square `[lo, hi)²`
fn square_mask(size: usize, lo: usize, hi: usize) -> GridField {
    let mut mask = GridField::zeros(&[1, 1, size, size]).unwrap();
    for h in lo..hi {
        for w in lo..hi {
            mask.set(&[0, 0, h, w], 1.0);
        }
    }
    mask
}

fn random_image(rng: &mut StdRng, shape: &[usize]) -> GridField {
    let len = shape.iter().product();
    GridField::from_vec(shape, (0..len).map(|_| rng.random::<f32>()).collect()).unwrap()
}

#[test]
fn test_signed_sign_follows_mask() {
    let mut rng = StdRng::seed_from_u64(3);
    let image = random_image(&mut rng, &[1, 2, 16, 16]);
    let mask = square_mask(16, 4, 11);

    for lamb in [0.0, 0.5, 1.0] {
        let signed = signed_generalised_geodesic_2d(&image, &mask, 1e10, lamb, 2).unwrap();
        for (s, m) in signed.as_slice().iter().zip(mask.as_slice()) {
            if *m == 1.0 {
                assert!(*s <= 0.0, "foreground cell has {s}");
            } else {
                assert!(*s >= 0.0, "background cell has {s}");
            }
        }
    }
}

#[test]
fn test_signed_magnitude_euclidean() {
    let image = GridField::zeros(&[1, 1, 16, 16]).unwrap();
    let mask = square_mask(16, 4, 12);
    let signed = signed_generalised_geodesic_2d(&image, &mask, 1e10, 0.0, 2).unwrap();

    // Centre of the square is 4 steps from the nearest background cell
    assert_eq!(signed.get(&[0, 0, 7, 7]), -4.0);
    // First background row outside the square is 1 step from the foreground
    assert_eq!(signed.get(&[0, 0, 3, 7]), 1.0);
    assert_eq!(signed.get(&[0, 0, 0, 7]), 4.0);
}

#[test]
fn test_signed_3d_sign() {
    let image = GridField::zeros(&[1, 1, 8, 8, 8]).unwrap();
    let mut mask = GridField::zeros(&[1, 1, 8, 8, 8]).unwrap();
    for d in 2..6 {
        for h in 2..6 {
            for w in 2..6 {
                mask.set(&[0, 0, d, h, w], 1.0);
            }
        }
    }
    let signed =
        signed_generalised_geodesic_3d(&image, &mask, &[2.0, 1.0, 1.0], 1e10, 0.0, 2).unwrap();
    assert_eq!(signed.spacing(), &[2.0, 1.0, 1.0]);
    assert!(signed.get(&[0, 0, 3, 3, 3]) < 0.0);
    assert!(signed.get(&[0, 0, 0, 0, 0]) > 0.0);
    // One depth step out of the cube costs the depth spacing
    assert_eq!(signed.get(&[0, 0, 1, 3, 3]), 2.0);
}

#[test]
fn test_gsf_zero_theta_is_uniform() {
    let mut rng = StdRng::seed_from_u64(17);
    let image = random_image(&mut rng, &[1, 1, 12, 12]);
    let mask = square_mask(12, 3, 8);

    let p = gsf_2d(&image, &mask, 0.0, 1e10, 0.5, 2).unwrap();
    assert!(p.as_slice().iter().all(|&x| x == 0.5));
}

#[test]
fn test_gsf_sharpens_with_theta() {
    let image = GridField::zeros(&[1, 1, 16, 16]).unwrap();
    let mask = square_mask(16, 4, 12);

    let soft = gsf_2d(&image, &mask, 0.5, 1e10, 0.0, 2).unwrap();
    let sharp = gsf_2d(&image, &mask, 8.0, 1e10, 0.0, 2).unwrap();

    let inside = [0, 0, 7, 7];
    let outside = [0, 0, 0, 0];
    assert!(sharp.get(&inside) > soft.get(&inside));
    assert!(sharp.get(&inside) > 0.999);
    assert!(sharp.get(&outside) < soft.get(&outside));
    assert!(sharp.get(&outside) < 0.001);
    assert!(sharp.as_slice().iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_gsf_3d_orientation() {
    let image = GridField::zeros(&[1, 1, 6, 6, 6]).unwrap();
    let mut mask = GridField::zeros(&[1, 1, 6, 6, 6]).unwrap();
    mask.set(&[0, 0, 3, 3, 3], 1.0);

    let p = gsf_3d(&image, &mask, 4.0, &[1.0, 1.0, 1.0], 1e10, 0.0, 2).unwrap();
    assert!(p.get(&[0, 0, 3, 3, 3]) > 0.5);
    assert!(p.get(&[0, 0, 0, 0, 0]) < 0.5);
}

#[test]
fn test_gsf_rejects_bad_theta() {
    let image = GridField::zeros(&[1, 1, 4, 4]).unwrap();
    let mask = square_mask(4, 1, 3);
    let err = gsf_2d(&image, &mask, f32::INFINITY, 1e10, 0.0, 2).unwrap_err();
    assert!(matches!(err, GeodesicError::InvalidParameter { name: "theta", .. }));
}

#[test]
fn test_symmetric_filter_zero_theta_doubles_signed() {
    let mut rng = StdRng::seed_from_u64(23);
    let image = random_image(&mut rng, &[1, 1, 14, 14]);
    let mask = square_mask(14, 3, 10);

    let signed = signed_generalised_geodesic_2d(&image, &mask, 1e10, 0.4, 2).unwrap();
    let filtered = geodesic_symmetric_filter_2d(&image, &mask, 0.0, 1e10, 0.4, 2).unwrap();

    for (f, s) in filtered.as_slice().iter().zip(signed.as_slice()) {
        assert_eq!(*f, 2.0 * s);
    }
}

#[test]
fn test_symmetric_filter_removes_small_speck() {
    let image = GridField::zeros(&[1, 1, 9, 9]).unwrap();
    let mut mask = GridField::zeros(&[1, 1, 9, 9]).unwrap();
    mask.set(&[0, 0, 4, 4], 1.0);

    // A single foreground cell is thinner than theta and erodes away
    let filtered = geodesic_symmetric_filter_2d(&image, &mask, 1.5, 1e10, 0.0, 2).unwrap();
    assert!(filtered.as_slice().iter().all(|&f| f > 0.0));
}

#[test]
fn test_symmetric_filter_keeps_large_region() {
    let image = GridField::zeros(&[1, 1, 6, 16, 16]).unwrap();
    let mut mask = GridField::zeros(&[1, 1, 6, 16, 16]).unwrap();
    for d in 0..6 {
        for h in 3..13 {
            for w in 3..13 {
                mask.set(&[0, 0, d, h, w], 1.0);
            }
        }
    }

    let filtered =
        geodesic_symmetric_filter_3d(&image, &mask, 1.0, &[1.0, 1.0, 1.0], 1e10, 0.0, 2).unwrap();
    assert_eq!(filtered.shape(), mask.shape());
    assert!(filtered.get(&[0, 0, 3, 8, 8]) < 0.0);
    assert!(filtered.get(&[0, 0, 3, 0, 0]) > 0.0);
}

#[test]
fn test_signed_gpu_matches_cpu() {
    let mut rng = StdRng::seed_from_u64(31);
    let image = random_image(&mut rng, &[1, 2, 5, 18, 16]);
    let mut mask = GridField::zeros(&[1, 1, 5, 18, 16]).unwrap();
    for d in 1..4 {
        for h in 4..12 {
            for w in 5..11 {
                mask.set(&[0, 0, d, h, w], 1.0);
            }
        }
    }
    let spacing = [1.5, 1.0, 1.0];
    let params = GeodesicParams::new(1e10, 0.6, 2);

    let reference = GeodesicTransform::new(params)
        .with_strategy(ExecutionStrategy::Sequential)
        .signed(&image, &mask, &spacing)
        .unwrap();

    let gpu_image = image.clone().on(Device::Gpu);
    let gpu_mask = mask.clone().on(Device::Gpu);
    // Both one-sided propagations share one device
    let gpu = match GeodesicTransform::new(params).signed(&gpu_image, &gpu_mask, &spacing) {
        Ok(gpu) => gpu,
        Err(GeodesicError::BackendUnavailable { .. }) => return,
        Err(e) => panic!("GPU signed transform failed: {e}"),
    };

    assert_eq!(gpu.device(), Device::Gpu);
    for (cpu, gpu) in reference.as_slice().iter().zip(gpu.as_slice()) {
        assert!((cpu - gpu).abs() <= 1e-3 * cpu.abs().max(1.0), "{cpu} vs {gpu}");
    }
}
