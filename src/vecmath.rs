//! Points, vectors and normals are distinct types even though they share a
//! representation: a point has no length, and a normal transforms by the
//! inverse transpose. Keeping them apart lets the type system catch
//! mixed-up arithmetic.

use auto_ops::{impl_op_ex, impl_op_ex_commutative};

use crate::float::Float;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Point2f {
    pub x: Float,
    pub y: Float,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Vector2f {
    pub x: Float,
    pub y: Float,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Point3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Vector3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Normal3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Point2f {
    pub fn new(x: Float, y: Float) -> Self {
        Self { x, y }
    }
}

impl Vector2f {
    pub fn new(x: Float, y: Float) -> Self {
        Self { x, y }
    }
}

pub trait Tuple3 {
    fn new(x: Float, y: Float, z: Float) -> Self;
    fn x(&self) -> Float;
    fn y(&self) -> Float;
    fn z(&self) -> Float;
}

macro_rules! impl_tuple3 {
    ($t:ty) => {
        impl Tuple3 for $t {
            fn new(x: Float, y: Float, z: Float) -> Self {
                Self { x, y, z }
            }

            fn x(&self) -> Float {
                self.x
            }

            fn y(&self) -> Float {
                self.y
            }

            fn z(&self) -> Float {
                self.z
            }
        }
    };
}

impl_tuple3!(Point3f);
impl_tuple3!(Vector3f);
impl_tuple3!(Normal3f);

impl Point3f {
    pub const ORIGIN: Point3f = Point3f {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Vector3f {
    pub const X: Vector3f = Vector3f {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };
    pub const Y: Vector3f = Vector3f {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
    pub const Z: Vector3f = Vector3f {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn dot(&self, other: &Vector3f) -> Float {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3f) -> Vector3f {
        Vector3f {
            x: difference_of_products(self.y, other.z, self.z, other.y),
            y: difference_of_products(self.z, other.x, self.x, other.z),
            z: difference_of_products(self.x, other.y, self.y, other.x),
        }
    }

    pub fn length_squared(&self) -> Float {
        self.dot(self)
    }

    pub fn length(&self) -> Float {
        self.length_squared().sqrt()
    }

    pub fn normalize(&self) -> Vector3f {
        self / self.length()
    }
}

impl From<Point3f> for Vector3f {
    fn from(p: Point3f) -> Self {
        Vector3f {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

/// a * b - c * d with a fused multiply-add to recover the rounding error.
fn difference_of_products(a: Float, b: Float, c: Float, d: Float) -> Float {
    let cd = c * d;
    let difference = a.mul_add(b, -cd);
    let error = (-c).mul_add(d, cd);
    difference + error
}

impl_op_ex!(-|a: &Point3f, b: &Point3f| -> Vector3f {
    Vector3f {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(+|a: &Point3f, b: &Vector3f| -> Point3f {
    Point3f {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(+|a: &Vector3f, b: &Vector3f| -> Vector3f {
    Vector3f {
        x: a.x + b.x,
        y: a.y + b.y,
        z: a.z + b.z,
    }
});

impl_op_ex!(-|a: &Vector3f, b: &Vector3f| -> Vector3f {
    Vector3f {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
});

impl_op_ex!(-|a: &Vector3f| -> Vector3f {
    Vector3f {
        x: -a.x,
        y: -a.y,
        z: -a.z,
    }
});

impl_op_ex_commutative!(*|a: &Vector3f, s: &Float| -> Vector3f {
    Vector3f {
        x: a.x * s,
        y: a.y * s,
        z: a.z * s,
    }
});

impl_op_ex!(/|a: &Vector3f, s: &Float| -> Vector3f {
    let inv = 1.0 / *s;
    Vector3f {
        x: a.x * inv,
        y: a.y * inv,
        z: a.z * inv,
    }
});
