//! Transform builders used by the layers.
//!
//! Both transforms are pure functions of the current framebuffer size (and, for
//! the rotation, the elapsed time). They are recomputed every frame and never
//! cached.

use glam::{Mat3, Mat4, Vec3};

/// Maps framebuffer pixels (origin top-left, +Y down) to NDC (origin centre,
/// +Y up): scale `(2/w, -2/h)` then translate `(-1, +1)`.
///
/// `width` and `height` must be positive.
pub fn viewport_transform_2d(width: f32, height: f32) -> Mat3 {
    debug_assert!(width > 0.0 && height > 0.0);
    Mat3::from_cols(
        Vec3::new(2.0 / width, 0.0, 0.0),
        Vec3::new(0.0, -2.0 / height, 0.0),
        Vec3::new(-1.0, 1.0, 1.0),
    )
}

/// Orthographic projection over `[-aspect, aspect] x [-1, 1]` with `near = 1`,
/// `far = -1`, composed with a rotation of `angle` radians about +Z.
///
/// The rotation is applied first: `ortho * rot_z`.
pub fn rotation_ortho_4x4(angle: f32, aspect_ratio: f32) -> Mat4 {
    let projection = Mat4::orthographic_rh_gl(-aspect_ratio, aspect_ratio, -1.0, 1.0, 1.0, -1.0);
    projection * Mat4::from_rotation_z(angle)
}
