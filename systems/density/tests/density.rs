use glam::Vec2;
use match_atlas_system_density::{
    DensityError, DensityEstimator, DensityParams, HeatmapMode, Intensity, KernelRadius,
    OpacityMask,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn estimator(radius: f32, mode: HeatmapMode) -> DensityEstimator {
    DensityEstimator::new(DensityParams {
        radius: KernelRadius::new(radius),
        intensity: Intensity::default(),
        mode,
    })
}

#[test]
fn single_point_peaks_at_its_cell_and_falls_off() {
    let estimator = estimator(5.0, HeatmapMode::Traffic);
    let field = estimator.accumulate(&[Vec2::new(10.2, 9.8)], 32);

    assert_eq!(field.value(10, 10), Some(1.0));
    assert_eq!(field.max(), 1.0);

    let mut previous = 1.0;
    for offset in 1..=5 {
        let value = field.value(10 + offset, 10).expect("inside the canvas");
        assert!(value > 0.0);
        assert!(value < previous, "density must decrease with distance");
        previous = value;
    }
    assert_eq!(field.value(16, 10), Some(0.0));
    assert_eq!(field.value(10, 16), Some(0.0));
}

#[test]
fn accumulation_is_independent_of_point_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut points: Vec<Vec2> = (0..500)
        .map(|_| Vec2::new(rng.gen_range(-8.0..72.0), rng.gen_range(-8.0..72.0)))
        .collect();
    let estimator = estimator(6.0, HeatmapMode::Traffic);

    let baseline = estimator.accumulate(&points, 64);
    points.shuffle(&mut rng);
    let shuffled = estimator.accumulate(&points, 64);

    let tolerance = baseline.sum() * 1e-5;
    assert!((baseline.sum() - shuffled.sum()).abs() <= tolerance);
    for (left, right) in baseline.cells().iter().zip(shuffled.cells()) {
        assert!((left - right).abs() <= 1e-3);
    }
}

#[test]
fn empty_point_set_yields_empty_image() {
    let image = estimator(20.0, HeatmapMode::Kills)
        .estimate(&[], 64, None)
        .expect("no mask to validate");

    assert!(image.is_empty());
    assert_eq!(image.width(), 64);
}

#[test]
fn points_entirely_off_canvas_yield_empty_image() {
    let image = estimator(4.0, HeatmapMode::Loot)
        .estimate(&[Vec2::new(-500.0, -500.0)], 64, None)
        .expect("no mask to validate");

    assert!(image.is_empty());
}

#[test]
fn faint_cells_below_one_percent_stay_transparent() {
    let mut points = vec![Vec2::new(8.0, 8.0); 200];
    points.push(Vec2::new(56.0, 56.0));

    let image = estimator(4.0, HeatmapMode::Deaths)
        .estimate(&points, 64, None)
        .expect("no mask to validate");

    let hot = image.pixel(8, 8);
    assert_eq!(hot[3], 235);
    assert_eq!(&hot[..3], &[255, 220, 100]);
    assert_eq!(image.pixel(56, 56)[3], 0);
}

#[test]
fn higher_intensity_brightens_mid_densities() {
    let points = [Vec2::new(16.0, 16.0)];
    let low = DensityEstimator::new(DensityParams {
        radius: KernelRadius::new(8.0),
        intensity: Intensity::from_fraction(0.0),
        mode: HeatmapMode::Traffic,
    });
    let high = DensityEstimator::new(DensityParams {
        radius: KernelRadius::new(8.0),
        intensity: Intensity::from_fraction(1.0),
        mode: HeatmapMode::Traffic,
    });

    let low_alpha = low.estimate(&points, 32, None).expect("valid").pixel(21, 16)[3];
    let high_alpha = high.estimate(&points, 32, None).expect("valid").pixel(21, 16)[3];

    assert!(high_alpha > low_alpha);
}

#[test]
fn mask_clips_density_outside_playable_area() {
    let canvas = 16u32;
    let alpha: Vec<u8> = (0..canvas * canvas)
        .map(|index| if index % canvas < 8 { 0 } else { 255 })
        .collect();
    let mask = OpacityMask::from_alpha(canvas, canvas, alpha).expect("buffer matches canvas");

    let image = estimator(3.0, HeatmapMode::Traffic)
        .estimate(&[Vec2::new(8.0, 8.0)], canvas, Some(&mask))
        .expect("mask matches canvas");

    assert_eq!(image.pixel(7, 8)[3], 0);
    assert_eq!(image.pixel(6, 8)[3], 0);
    assert_eq!(image.pixel(8, 8)[3], 235);
    assert!(image.pixel(9, 8)[3] > 0);
}

#[test]
fn mismatched_mask_is_rejected() {
    let mask = OpacityMask::from_alpha(8, 8, vec![255; 64]).expect("buffer matches size");

    let error = estimator(3.0, HeatmapMode::Traffic)
        .estimate(&[Vec2::new(1.0, 1.0)], 16, Some(&mask))
        .expect_err("mask is smaller than the canvas");

    assert_eq!(
        error,
        DensityError::MaskSize {
            canvas: 16,
            width: 8,
            height: 8,
        }
    );
}
