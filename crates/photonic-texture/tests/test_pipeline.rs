//! End-to-end properties of the in-memory pipeline.
//!
//! Covers dimension preservation, pool-size independence and the
//! constant-albedo fixed point of every generator.

use photonic_texture::maps::HEIGHT_DETAIL_WEIGHTS;
use photonic_texture::{
    ImageBuffer, MapGenerator, MaterialClass, NormalField, PipelineConfig,
    DIFFUSE_BASELINE_ROUGHNESS,
};

fn generator(threads: usize) -> MapGenerator {
    MapGenerator::new(PipelineConfig::default().with_threads(threads)).unwrap()
}

/// Brick-like albedo with mortar lines and per-brick tint.
fn bricks(width: u32, height: u32) -> ImageBuffer {
    ImageBuffer::from_fn_rgba(width, height, |x, y| {
        let row = y / 8;
        let offset = if row % 2 == 0 { 0 } else { 8 };
        let mortar = y % 8 == 0 || (x + offset) % 16 == 0;
        if mortar {
            [190, 185, 170, 255]
        } else {
            let tint = (((x + offset) / 16 * 29 + row * 13) % 40) as u8;
            [140 + tint, 60 + tint / 2, 45, 255]
        }
    })
    .unwrap()
}

// ============================================================================
// Dimensions
// ============================================================================

#[test]
fn test_generators_preserve_dimensions() {
    let g = generator(3);
    for (w, h) in [(2, 2), (5, 3), (64, 17), (33, 48)] {
        let albedo = bricks(w, h);
        let height = g.generate_height(&albedo).unwrap();
        let normal = g.generate_normal(&height).unwrap();
        let classes = g.classify(&albedo, &height).unwrap();
        let roughness = g.generate_roughness(&albedo, &classes).unwrap();

        assert_eq!(height.dimensions(), (w, h), "height for {}x{}", w, h);
        assert_eq!(normal.dimensions(), (w, h), "normal for {}x{}", w, h);
        assert_eq!(classes.dimensions(), (w, h), "classes for {}x{}", w, h);
        assert_eq!(roughness.dimensions(), (w, h), "roughness for {}x{}", w, h);
    }
}

#[test]
fn test_fields_stay_in_range() {
    let maps = generator(2).generate_all(&bricks(48, 40)).unwrap();
    assert!(maps.height.data.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(maps.roughness.data.iter().all(|v| (0.0..=1.0).contains(v)));
    for n in &maps.normal.data {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-9, "normal {:?} is not unit length", n);
        assert!(n[2] > 0.0);
    }
}

#[test]
fn test_one_pixel_wide_input_is_rejected() {
    let albedo = ImageBuffer::solid(1, 9, [10, 10, 10, 255]).unwrap();
    let err = generator(1).generate_height(&albedo).unwrap_err();
    assert_eq!(err.kind(), "InvalidDimensions");
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_pool_size_does_not_change_output() {
    let albedo = bricks(57, 43);
    let one = generator(1).generate_all(&albedo).unwrap();
    let many = generator(6).generate_all(&albedo).unwrap();
    assert_eq!(one, many, "outputs must be bit-identical across pool sizes");
}

#[test]
fn test_packing_independent_of_pool_size() {
    let albedo = bricks(30, 22);
    let (a1, b1) = generator(1).pack_generated(&albedo).unwrap();
    let (a2, b2) = generator(5).pack_generated(&albedo).unwrap();
    assert_eq!(a1, a2);
    assert_eq!(b1, b2);
}

// ============================================================================
// Constant albedo
// ============================================================================

#[test]
fn test_constant_albedo_fixed_point() {
    let albedo = ImageBuffer::solid(37, 29, [120, 110, 90, 255]).unwrap();
    let g = generator(4);

    let height = g.generate_height(&albedo).unwrap();
    let first = height.data[0];
    for v in &height.data {
        assert!((v - first).abs() < 1e-9, "height should be uniform");
    }

    let normal = g.generate_normal(&height).unwrap();
    for &n in &normal.data {
        assert_eq!(NormalField::encode(n), [128, 128, 255]);
    }

    let classes = g.classify(&albedo, &height).unwrap();
    assert!(classes.data.iter().all(|c| c.label == MaterialClass::Diffuse));

    let roughness = g.generate_roughness(&albedo, &classes).unwrap();
    for v in &roughness.data {
        assert!(
            (v - DIFFUSE_BASELINE_ROUGHNESS).abs() < 1e-6,
            "roughness {} should be the Diffuse baseline",
            v
        );
    }
}

#[test]
fn test_detail_weights_favor_coarse_bands() {
    assert!(HEIGHT_DETAIL_WEIGHTS[0] < HEIGHT_DETAIL_WEIGHTS[1]);
    assert!(HEIGHT_DETAIL_WEIGHTS[1] < HEIGHT_DETAIL_WEIGHTS[2]);
}
