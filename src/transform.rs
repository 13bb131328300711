use std::hash::{Hash, Hasher};

use auto_ops::impl_op_ex;

use crate::{
    float::float_to_bits,
    square_matrix::SquareMatrix,
    vecmath::{Normal3f, Point3f, Tuple3, Vector3f},
    Float,
};

/// A 4x4 affine transform stored alongside its inverse.
///
/// Transforms are values: composition and inversion produce new transforms,
/// and a transform frozen into a scene entity is never modified afterwards.
#[derive(Debug, Copy, Clone)]
pub struct Transform {
    m: SquareMatrix<4>,
    // Inverse of m
    m_inv: SquareMatrix<4>,
}

impl Transform {
    /// The caller must ensure that m_inv is the correct inverse of m.
    pub fn new(m: SquareMatrix<4>, m_inv: SquareMatrix<4>) -> Transform {
        Self { m, m_inv }
    }

    /// Creates a transform from m, computing the inverse using the general form.
    /// A singular m gets an inverse filled with NaN.
    pub fn new_calc_inverse(m: SquareMatrix<4>) -> Transform {
        let m_inv = m
            .inverse()
            .unwrap_or_else(|| SquareMatrix::new([[Float::NAN; 4]; 4]));
        Transform { m, m_inv }
    }

    pub fn from_2d(m: [[Float; 4]; 4]) -> Transform {
        Self::new_calc_inverse(SquareMatrix::new(m))
    }

    pub fn translate(delta: Vector3f) -> Transform {
        let m = SquareMatrix::<4>::new([
            [1.0, 0.0, 0.0, delta.x],
            [0.0, 1.0, 0.0, delta.y],
            [0.0, 0.0, 1.0, delta.z],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let m_inv = SquareMatrix::<4>::new([
            [1.0, 0.0, 0.0, -delta.x],
            [0.0, 1.0, 0.0, -delta.y],
            [0.0, 0.0, 1.0, -delta.z],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        Self::new(m, m_inv)
    }

    pub fn scale(x: Float, y: Float, z: Float) -> Transform {
        let m = SquareMatrix::<4>::new([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let m_inv = SquareMatrix::<4>::new([
            [1.0 / x, 0.0, 0.0, 0.0],
            [0.0, 1.0 / y, 0.0, 0.0],
            [0.0, 0.0, 1.0 / z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        Self::new(m, m_inv)
    }

    /// theta: radians
    pub fn rotate_x(theta: Float) -> Transform {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let m = SquareMatrix::<4>::new([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, cos_theta, -sin_theta, 0.0],
            [0.0, sin_theta, cos_theta, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    /// theta: radians
    pub fn rotate_y(theta: Float) -> Transform {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let m = SquareMatrix::<4>::new([
            [cos_theta, 0.0, sin_theta, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [-sin_theta, 0.0, cos_theta, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    /// theta: radians
    pub fn rotate_z(theta: Float) -> Transform {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let m = SquareMatrix::<4>::new([
            [cos_theta, -sin_theta, 0.0, 0.0],
            [sin_theta, cos_theta, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    fn rotate_helper(sin_theta: Float, cos_theta: Float, axis: &Vector3f) -> Transform {
        let a = axis.normalize();
        let mut m = SquareMatrix::<4>::default();
        // Compute the rotation of each basis vector in turn.
        m[0][0] = a.x * a.x + (1.0 - a.x * a.x) * cos_theta;
        m[0][1] = a.x * a.y * (1.0 - cos_theta) - a.z * sin_theta;
        m[0][2] = a.x * a.z * (1.0 - cos_theta) + a.y * sin_theta;

        m[1][0] = a.x * a.y * (1.0 - cos_theta) + a.z * sin_theta;
        m[1][1] = a.y * a.y + (1.0 - a.y * a.y) * cos_theta;
        m[1][2] = a.y * a.z * (1.0 - cos_theta) - a.x * sin_theta;

        m[2][0] = a.x * a.z * (1.0 - cos_theta) - a.y * sin_theta;
        m[2][1] = a.y * a.z * (1.0 - cos_theta) + a.x * sin_theta;
        m[2][2] = a.z * a.z + (1.0 - a.z * a.z) * cos_theta;

        Transform {
            m,
            m_inv: m.transpose(),
        }
    }

    /// Rotation by `degrees` about an arbitrary `axis`, as the scene
    /// description's `Rotate` directive expresses it.
    pub fn rotate(degrees: Float, axis: &Vector3f) -> Transform {
        let (sin_theta, cos_theta) = degrees.to_radians().sin_cos();
        Transform::rotate_helper(sin_theta, cos_theta, axis)
    }

    /// The camera-from-world transform for a viewer at `pos` looking at
    /// `look_at`. Returns `None` when `up` is parallel to the viewing direction.
    pub fn look_at(pos: &Point3f, look_at: &Point3f, up: &Vector3f) -> Option<Transform> {
        let mut world_from_camera = SquareMatrix::<4>::zero();

        world_from_camera[0][3] = pos.x;
        world_from_camera[1][3] = pos.y;
        world_from_camera[2][3] = pos.z;
        world_from_camera[3][3] = 1.0;

        let dir = (look_at - pos).normalize();
        if up.normalize().cross(&dir).length() == 0.0 {
            return None;
        }
        let right = up.normalize().cross(&dir).normalize();
        let new_up = dir.cross(&right);

        world_from_camera[0][0] = right.x;
        world_from_camera[1][0] = right.y;
        world_from_camera[2][0] = right.z;

        world_from_camera[0][1] = new_up.x;
        world_from_camera[1][1] = new_up.y;
        world_from_camera[2][1] = new_up.z;

        world_from_camera[0][2] = dir.x;
        world_from_camera[1][2] = dir.y;
        world_from_camera[2][2] = dir.z;

        let camera_from_world = world_from_camera.inverse()?;

        Some(Transform {
            m: camera_from_world,
            m_inv: world_from_camera,
        })
    }

    pub fn get_matrix(&self) -> &SquareMatrix<4> {
        &self.m
    }

    pub fn get_inverse_matrix(&self) -> &SquareMatrix<4> {
        &self.m_inv
    }

    pub fn inverse(&self) -> Transform {
        Transform {
            m: self.m_inv,
            m_inv: self.m,
        }
    }

    pub fn transpose(&self) -> Transform {
        Transform {
            m: self.m.transpose(),
            m_inv: self.m_inv.transpose(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.m.is_identity()
    }

    pub fn apply<T: Transformable>(&self, val: &T) -> T {
        val.apply(self)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            m: Default::default(),
            m_inv: Default::default(),
        }
    }
}

/// Compares the forward matrices bit for bit (after folding -0.0 onto 0.0).
/// The inverse is derived from `m`, and a singular `m` leaves NaN in it, so
/// it takes no part in equality.
impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.m
            .m
            .iter()
            .flatten()
            .zip(other.m.m.iter().flatten())
            .all(|(a, b)| float_to_bits(*a) == float_to_bits(*b))
    }
}

impl Eq for Transform {}

/// Hashes the forward matrix only, matching `PartialEq`.
impl Hash for Transform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for row in self.m.m.iter() {
            for v in row {
                float_to_bits(*v).hash(state);
            }
        }
    }
}

// Allow composition of transformations!
impl_op_ex!(*|t1: &Transform, t2: &Transform| -> Transform {
    Transform {
        m: t1.m * t2.m,
        m_inv: t2.m_inv * t1.m_inv,
    }
});

pub trait Transformable {
    fn apply(&self, transform: &Transform) -> Self;
}

impl Transformable for Point3f {
    fn apply(&self, transform: &Transform) -> Self {
        let m = &transform.m;
        let xp = m[0][0] * self.x + m[0][1] * self.y + m[0][2] * self.z + m[0][3];
        let yp = m[1][0] * self.x + m[1][1] * self.y + m[1][2] * self.z + m[1][3];
        let zp = m[2][0] * self.x + m[2][1] * self.y + m[2][2] * self.z + m[2][3];
        let wp = m[3][0] * self.x + m[3][1] * self.y + m[3][2] * self.z + m[3][3];
        if wp == 1.0 {
            Point3f::new(xp, yp, zp)
        } else {
            Point3f::new(xp / wp, yp / wp, zp / wp)
        }
    }
}

impl Transformable for Vector3f {
    fn apply(&self, transform: &Transform) -> Self {
        let m = &transform.m;
        Vector3f::new(
            m[0][0] * self.x + m[0][1] * self.y + m[0][2] * self.z,
            m[1][0] * self.x + m[1][1] * self.y + m[1][2] * self.z,
            m[2][0] * self.x + m[2][1] * self.y + m[2][2] * self.z,
        )
    }
}

impl Transformable for Normal3f {
    fn apply(&self, transform: &Transform) -> Self {
        // Normals are transformed by the inverse transpose.
        let m_inv = &transform.m_inv;
        Normal3f::new(
            m_inv[0][0] * self.x + m_inv[1][0] * self.y + m_inv[2][0] * self.z,
            m_inv[0][1] * self.x + m_inv[1][1] * self.y + m_inv[2][1] * self.z,
            m_inv[0][2] * self.x + m_inv[1][2] * self.y + m_inv[2][2] * self.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use float_cmp::assert_approx_eq;

    use super::Transform;
    use crate::{
        vecmath::{Normal3f, Point3f, Tuple3, Vector3f},
        Float,
    };

    fn digest(t: &Transform) -> u64 {
        let mut hasher = DefaultHasher::new();
        t.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn translate_point() {
        let t = Transform::translate(Vector3f::new(1.0, 2.0, 3.0));
        assert_eq!(t.apply(&Point3f::ORIGIN), Point3f::new(1.0, 2.0, 3.0));
        // Vectors are unaffected by translation.
        assert_eq!(t.apply(&Vector3f::X), Vector3f::X);
    }

    #[test]
    fn scale_point() {
        let t = Transform::scale(2.0, 3.0, 4.0);
        assert_eq!(
            t.apply(&Point3f::new(1.0, 1.0, 1.0)),
            Point3f::new(2.0, 3.0, 4.0)
        );
    }

    #[test]
    fn transform_composition() {
        let t = Transform::translate(Vector3f::new(1.0, 0.0, 0.0)) * Transform::scale(2.0, 2.0, 2.0);
        // Scale applies first, then the translation.
        assert_eq!(
            t.apply(&Point3f::new(1.0, 1.0, 1.0)),
            Point3f::new(3.0, 2.0, 2.0)
        );
        let round_trip = t * t.inverse();
        assert!(round_trip.is_identity());
    }

    #[test]
    fn inverse_swaps_matrices() {
        let t = Transform::translate(Vector3f::new(4.0, 0.0, 0.0));
        let inv = t.inverse();
        assert_eq!(inv.get_matrix(), t.get_inverse_matrix());
        assert_eq!(inv.apply(&Point3f::new(4.0, 0.0, 0.0)), Point3f::ORIGIN);
    }

    #[test]
    fn rotate_takes_degrees() {
        let t = Transform::rotate(90.0, &Vector3f::Z);
        let p = t.apply(&Point3f::new(1.0, 0.0, 0.0));
        assert_approx_eq!(Float, 0.0, p.x, epsilon = 1e-6);
        assert_approx_eq!(Float, 1.0, p.y, epsilon = 1e-6);

        let rz = Transform::rotate_z((90.0 as Float).to_radians());
        for i in 0..4 {
            for j in 0..4 {
                assert_approx_eq!(
                    Float,
                    rz.get_matrix()[i][j],
                    t.get_matrix()[i][j],
                    epsilon = 1e-6
                );
            }
        }
    }

    #[test]
    fn look_at_places_eye_at_origin() {
        let t = Transform::look_at(
            &Point3f::new(0.0, 0.0, -5.0),
            &Point3f::ORIGIN,
            &Vector3f::Y,
        )
        .unwrap();
        let eye = t.apply(&Point3f::new(0.0, 0.0, -5.0));
        assert_approx_eq!(Float, 0.0, eye.z, epsilon = 1e-6);
        let target = t.apply(&Point3f::ORIGIN);
        assert_approx_eq!(Float, 5.0, target.z, epsilon = 1e-6);
    }

    #[test]
    fn look_at_degenerate_up() {
        assert!(Transform::look_at(&Point3f::ORIGIN, &Point3f::new(0.0, 1.0, 0.0), &Vector3f::Y)
            .is_none());
    }

    #[test]
    fn normals_use_inverse_transpose() {
        let t = Transform::scale(2.0, 1.0, 1.0);
        let n = t.apply(&Normal3f::new(1.0, 0.0, 0.0));
        assert_approx_eq!(Float, 0.5, n.x, epsilon = 1e-6);
    }

    #[test]
    fn equal_transforms_hash_alike() {
        let a = Transform::translate(Vector3f::new(0.0, 1.0, 0.0));
        let b = Transform::translate(Vector3f::new(-0.0, 1.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(digest(&a), digest(&b));
        assert_ne!(digest(&a), digest(&Transform::default()));
    }

    #[test]
    fn singular_transform_equals_itself() {
        let zero = Transform::from_2d([[0.0; 4]; 4]);
        assert_eq!(zero, zero);
        let flattened =
            Transform::scale(0.0, 1.0, 1.0) * Transform::rotate(30.0, &Vector3f::new(1.0, 0.0, 0.0));
        let copy = flattened;
        assert_eq!(flattened, copy);
        assert_eq!(digest(&flattened), digest(&copy));
    }
}
