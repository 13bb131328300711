use std::{collections::HashMap, fmt, sync::Arc};

use once_cell::sync::Lazy;

use crate::{square_matrix::SquareMatrix, vecmath::Point2f, Float};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Rgb {
    pub r: Float,
    pub g: Float,
    pub b: Float,
}

impl Rgb {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        Self { r, g, b }
    }

    /// True if all three channels hold the same value.
    pub fn is_constant(&self) -> bool {
        self.r == self.g && self.g == self.b
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Xyz {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

impl Xyz {
    /// XYZ of chromaticity `xy` scaled to luminance `y_lum`.
    pub fn from_xy_y(xy: &Point2f, y_lum: Float) -> Xyz {
        if xy.y == 0.0 {
            return Xyz::default();
        }
        Xyz {
            x: xy.x * y_lum / xy.y,
            y: y_lum,
            z: (1.0 - xy.x - xy.y) * y_lum / xy.y,
        }
    }
}

fn mul_mat3(m: &SquareMatrix<3>, v: [Float; 3]) -> [Float; 3] {
    let mut out = [0.0; 3];
    for (i, o) in out.iter_mut().enumerate() {
        *o = m[i][0] * v[0] + m[i][1] * v[1] + m[i][2] * v[2];
    }
    out
}

/// An RGB color space defined by its primaries and white point, all given
/// as xy chromaticities.
#[derive(Debug, PartialEq)]
pub struct RgbColorSpace {
    pub name: &'static str,
    /// Red primary
    pub r: Point2f,
    /// Green primary
    pub g: Point2f,
    /// Blue primary
    pub b: Point2f,
    pub whitepoint: Point2f,
    pub xyz_from_rgb: SquareMatrix<3>,
    pub rgb_from_xyz: SquareMatrix<3>,
}

impl RgbColorSpace {
    /// Returns `None` if the primaries are degenerate.
    pub fn new(
        name: &'static str,
        r: Point2f,
        g: Point2f,
        b: Point2f,
        whitepoint: Point2f,
    ) -> Option<RgbColorSpace> {
        let w = Xyz::from_xy_y(&whitepoint, 1.0);
        let r_xyz = Xyz::from_xy_y(&r, 1.0);
        let g_xyz = Xyz::from_xy_y(&g, 1.0);
        let b_xyz = Xyz::from_xy_y(&b, 1.0);

        let rgb = SquareMatrix::<3>::new([
            [r_xyz.x, g_xyz.x, b_xyz.x],
            [r_xyz.y, g_xyz.y, b_xyz.y],
            [r_xyz.z, g_xyz.z, b_xyz.z],
        ]);
        let c = mul_mat3(&rgb.inverse()?, [w.x, w.y, w.z]);
        let diag = SquareMatrix::<3>::new([[c[0], 0.0, 0.0], [0.0, c[1], 0.0], [0.0, 0.0, c[2]]]);
        let xyz_from_rgb = rgb * diag;
        let rgb_from_xyz = xyz_from_rgb.inverse()?;

        Some(RgbColorSpace {
            name,
            r,
            g,
            b,
            whitepoint,
            xyz_from_rgb,
            rgb_from_xyz,
        })
    }

    pub fn to_xyz(&self, rgb: &Rgb) -> Xyz {
        let [x, y, z] = mul_mat3(&self.xyz_from_rgb, [rgb.r, rgb.g, rgb.b]);
        Xyz { x, y, z }
    }

    pub fn to_rgb(&self, xyz: &Xyz) -> Rgb {
        let [r, g, b] = mul_mat3(&self.rgb_from_xyz, [xyz.x, xyz.y, xyz.z]);
        Rgb { r, g, b }
    }

    /// Looks up one of the standard color spaces by (case-insensitive) name.
    pub fn get_named(name: &str) -> Option<Arc<RgbColorSpace>> {
        NAMED_COLOR_SPACES.get(name.to_lowercase().as_str()).cloned()
    }

    pub fn srgb() -> Arc<RgbColorSpace> {
        SRGB.clone()
    }
}

impl fmt::Display for RgbColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

const D65: Point2f = Point2f {
    x: 0.3127,
    y: 0.3290,
};

fn standard(
    name: &'static str,
    r: (Float, Float),
    g: (Float, Float),
    b: (Float, Float),
    w: Point2f,
) -> Arc<RgbColorSpace> {
    let cs = RgbColorSpace::new(
        name,
        Point2f::new(r.0, r.1),
        Point2f::new(g.0, g.1),
        Point2f::new(b.0, b.1),
        w,
    );
    Arc::new(cs.expect("Uninvertible primaries!"))
}

static SRGB: Lazy<Arc<RgbColorSpace>> =
    Lazy::new(|| standard("srgb", (0.64, 0.33), (0.3, 0.6), (0.15, 0.06), D65));

static NAMED_COLOR_SPACES: Lazy<HashMap<&'static str, Arc<RgbColorSpace>>> = Lazy::new(|| {
    let mut spaces = HashMap::new();
    spaces.insert("srgb", SRGB.clone());
    spaces.insert(
        "rec2020",
        standard("rec2020", (0.708, 0.292), (0.170, 0.797), (0.131, 0.046), D65),
    );
    spaces.insert(
        "aces2065-1",
        standard(
            "aces2065-1",
            (0.7347, 0.2653),
            (0.0, 1.0),
            (0.0001, -0.077),
            Point2f::new(0.32168, 0.33767),
        ),
    );
    spaces.insert(
        "dci-p3",
        standard("dci-p3", (0.68, 0.32), (0.265, 0.690), (0.15, 0.06), D65),
    );
    spaces
});
