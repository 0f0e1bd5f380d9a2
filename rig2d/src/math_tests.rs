use crate::math::{Affine, LocalTransform, wrap_degrees, wrap_radians};
use std::f32::consts::PI;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

#[test]
fn wrap_degrees_lands_in_half_turn_range() {
    assert_approx(wrap_degrees(0.0), 0.0);
    assert_approx(wrap_degrees(180.0), 180.0);
    assert_approx(wrap_degrees(190.0), -170.0);
    assert_approx(wrap_degrees(-190.0), 170.0);
    assert_approx(wrap_degrees(720.0 + 45.0), 45.0);
    assert_approx(wrap_degrees(-360.0), 0.0);
}

#[test]
fn wrap_radians_corrects_one_turn() {
    assert_approx(wrap_radians(PI + 0.5), -PI + 0.5);
    assert_approx(wrap_radians(-PI - 0.5), PI - 0.5);
    assert_approx(wrap_radians(1.0), 1.0);
}

#[test]
fn inverse_undoes_the_transform() {
    let m = LocalTransform {
        x: 3.0,
        y: -2.0,
        rotation: 30.0,
        scale_x: 2.0,
        scale_y: 0.5,
        shear_x: 0.0,
        shear_y: 10.0,
    }
    .to_affine();
    let inverse = m.inverse().unwrap();
    let identity = m.mul(&inverse);
    for (actual, expected) in [
        (identity.a, 1.0),
        (identity.b, 0.0),
        (identity.c, 0.0),
        (identity.d, 1.0),
        (identity.x, 0.0),
        (identity.y, 0.0),
    ] {
        assert_approx(actual, expected);
    }

    let [x, y] = m.transform_point(4.0, 7.0);
    let [bx, by] = m.inverse_transform_point(x, y);
    assert_approx(bx, 4.0);
    assert_approx(by, 7.0);
}

#[test]
fn singular_transforms_have_no_inverse() {
    let flat = Affine::new(1.0, 2.0, 2.0, 4.0, 5.0, 5.0);
    assert!(flat.is_singular());
    assert!(flat.inverse().is_none());
    assert_eq!(flat.inverse_transform_point(6.0, 7.0), [1.0, 2.0]);
}

#[test]
fn tiny_scales_remain_invertible() {
    let small = Affine::from_scale_translation(0.005, 0.005, 1.0, 0.0);
    assert!(!small.is_singular());
    let [x, y] = small.inverse_transform_point(1.05, 0.05);
    assert_approx(x, 10.0);
    assert_approx(y, 10.0);
    assert!(small.inverse().is_some());
}

#[test]
fn mul_applies_the_right_operand_first() {
    let translate = Affine::from_scale_translation(1.0, 1.0, 10.0, 0.0);
    let rotate = LocalTransform {
        rotation: 90.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();

    let [x, y] = rotate.mul(&translate).transform_point(1.0, 0.0);
    assert_approx(x, 0.0);
    assert_approx(y, 11.0);

    let [x, y] = translate.mul(&rotate).transform_point(1.0, 0.0);
    assert_approx(x, 10.0);
    assert_approx(y, 1.0);
}

#[test]
fn affine_reports_axis_rotation_and_scale() {
    let m = LocalTransform {
        rotation: 45.0,
        scale_x: 3.0,
        scale_y: 2.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    assert_approx(m.rotation_x(), 45.0);
    assert_approx(m.rotation_y(), 135.0);
    assert_approx(m.scale_x(), 3.0);
    assert_approx(m.scale_y(), 2.0);
    assert!(m.is_finite());
    assert!(!Affine::new(f32::NAN, 0.0, 0.0, 1.0, 0.0, 0.0).is_finite());
}

#[test]
fn shear_tilts_only_its_own_axis() {
    let m = LocalTransform {
        shear_y: 30.0,
        ..LocalTransform::IDENTITY
    }
    .to_affine();
    assert_approx(m.rotation_x(), 0.0);
    assert_approx(m.rotation_y(), 120.0);
}

#[test]
fn approx_eq_compares_angles_modulo_a_turn() {
    let a = LocalTransform {
        rotation: 179.99,
        ..LocalTransform::IDENTITY
    };
    let b = LocalTransform {
        rotation: -179.99,
        ..LocalTransform::IDENTITY
    };
    assert!(a.approx_eq(&b, 0.1));
    assert!(!a.approx_eq(
        &LocalTransform {
            x: 1.0,
            ..a
        },
        0.1
    ));
}

#[cfg(feature = "glam")]
#[test]
fn glam_conversion_keeps_columns() {
    let m = Affine::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    let g: glam::Affine2 = m.into();
    assert_eq!(g.transform_point2(glam::Vec2::new(1.0, 0.0)), glam::Vec2::new(6.0, 9.0));
    assert_eq!(Affine::from(g), m);
}
