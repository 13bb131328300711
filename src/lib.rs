mod colorspace;
mod float;
pub mod loading;
mod options;
mod square_matrix;
mod transform;
mod util;
mod vecmath;

// For convenience, re-export.
pub use colorspace::{Rgb, RgbColorSpace, Xyz};
pub use float::Float;
pub use options::{Options, RenderingCoordinateSystem};
pub use square_matrix::SquareMatrix;
pub use transform::Transform;
pub use vecmath::{Normal3f, Point2f, Point3f, Tuple3, Vector2f, Vector3f};
