use crate::Float;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderingCoordinateSystem {
    Camera,
    CameraWorld,
    World,
}

/// Process-level rendering options. Most come from the command line of the
/// render driver; the `Option` directive may override them in-band.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub seed: i32,
    pub rendering_coord_system: RenderingCoordinateSystem,
    pub disable_texture_filtering: bool,
    pub disable_pixel_jitter: bool,
    pub disable_wavelength_jitter: bool,
    pub force_diffuse: bool,
    pub record_pixel_statistics: bool,
    pub wavefront: bool,
    pub displacement_edge_scale: Float,
    pub mse_reference_image: Option<String>,
    pub mse_reference_output: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: 0,
            rendering_coord_system: RenderingCoordinateSystem::CameraWorld,
            disable_texture_filtering: false,
            disable_pixel_jitter: false,
            disable_wavelength_jitter: false,
            force_diffuse: false,
            record_pixel_statistics: false,
            wavefront: false,
            displacement_edge_scale: 1.0,
            mse_reference_image: None,
            mse_reference_output: None,
        }
    }
}
