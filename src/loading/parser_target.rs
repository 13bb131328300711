use std::fmt;

use crate::Float;

use super::{error::Result, paramdict::ParsedParameter};

pub type ParsedParameterVector = Vec<ParsedParameter>;

/// Where in the scene description a directive or parameter came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLoc {
    pub filename: String,
    pub line: i32,
    pub column: i32,
}

impl FileLoc {
    pub fn new(filename: &str, line: i32, column: i32) -> Self {
        Self {
            filename: filename.to_owned(),
            line,
            column,
        }
    }
}

impl fmt::Display for FileLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// A consumer of scene-description directives, one method per directive.
///
/// Directives arrive already decoded and strictly in stream order. A
/// returned `Err` is fatal: the caller should stop feeding the target.
/// Recoverable problems are logged by the implementation and reported as
/// `Ok(())`.
pub trait ParserTarget {
    fn option(&mut self, name: &str, value: &str, loc: FileLoc) -> Result<()>;
    fn identity(&mut self, loc: FileLoc) -> Result<()>;
    fn translate(&mut self, dx: Float, dy: Float, dz: Float, loc: FileLoc) -> Result<()>;
    fn scale(&mut self, sx: Float, sy: Float, sz: Float, loc: FileLoc) -> Result<()>;
    /// `angle` is in degrees.
    fn rotate(&mut self, angle: Float, ax: Float, ay: Float, az: Float, loc: FileLoc)
        -> Result<()>;
    #[allow(clippy::too_many_arguments)]
    fn look_at(
        &mut self,
        ex: Float,
        ey: Float,
        ez: Float,
        lx: Float,
        ly: Float,
        lz: Float,
        ux: Float,
        uy: Float,
        uz: Float,
        loc: FileLoc,
    ) -> Result<()>;
    /// `transform` is given in the file's row-major order.
    fn concat_transform(&mut self, transform: [Float; 16], loc: FileLoc) -> Result<()>;
    fn transform(&mut self, transform: [Float; 16], loc: FileLoc) -> Result<()>;
    fn coordinate_system(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn coord_sys_transform(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn active_transform_all(&mut self, loc: FileLoc) -> Result<()>;
    fn active_transform_end_time(&mut self, loc: FileLoc) -> Result<()>;
    fn active_transform_start_time(&mut self, loc: FileLoc) -> Result<()>;
    fn transform_times(&mut self, start: Float, end: Float, loc: FileLoc) -> Result<()>;
    fn color_space(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn pixel_filter(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn film(&mut self, film_type: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn sampler(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()>;
    fn accelerator(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn integrator(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn camera(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()>;
    fn make_named_medium(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn medium_interface(&mut self, inside_name: &str, outside_name: &str, loc: FileLoc)
        -> Result<()>;
    fn world_begin(&mut self, loc: FileLoc) -> Result<()>;
    fn attribute_begin(&mut self, loc: FileLoc) -> Result<()>;
    fn attribute_end(&mut self, loc: FileLoc) -> Result<()>;
    fn attribute(&mut self, target: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn transform_begin(&mut self, loc: FileLoc) -> Result<()>;
    fn transform_end(&mut self, loc: FileLoc) -> Result<()>;
    fn texture(
        &mut self,
        name: &str,
        texture_type: &str,
        tex_name: &str,
        params: ParsedParameterVector,
        loc: FileLoc,
    ) -> Result<()>;
    fn material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn make_named_material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn named_material(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn area_light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()>;
    fn shape(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()>;
    fn reverse_orientation(&mut self, loc: FileLoc) -> Result<()>;
    fn object_begin(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn object_end(&mut self, loc: FileLoc) -> Result<()>;
    fn object_instance(&mut self, name: &str, loc: FileLoc) -> Result<()>;
    fn world_end(&mut self, loc: FileLoc) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActiveTransform {
    StartTime,
    EndTime,
    All,
}

/// One decoded directive with its arguments, as produced upstream of the
/// scene builder.
#[derive(Debug, Clone)]
pub enum Directive {
    Option {
        name: String,
        value: String,
    },
    Identity,
    Translate {
        v: [Float; 3],
    },
    Scale {
        v: [Float; 3],
    },
    Rotate {
        angle: Float,
        v: [Float; 3],
    },
    LookAt {
        eye: [Float; 3],
        look_at: [Float; 3],
        up: [Float; 3],
    },
    ConcatTransform {
        m: [Float; 16],
    },
    Transform {
        m: [Float; 16],
    },
    CoordinateSystem {
        name: String,
    },
    CoordSysTransform {
        name: String,
    },
    ActiveTransform {
        ty: ActiveTransform,
    },
    TransformTimes {
        start: Float,
        end: Float,
    },
    ColorSpace {
        ty: String,
    },
    PixelFilter {
        name: String,
        params: ParsedParameterVector,
    },
    Film {
        ty: String,
        params: ParsedParameterVector,
    },
    Sampler {
        ty: String,
        params: ParsedParameterVector,
    },
    Accelerator {
        ty: String,
        params: ParsedParameterVector,
    },
    Integrator {
        ty: String,
        params: ParsedParameterVector,
    },
    Camera {
        ty: String,
        params: ParsedParameterVector,
    },
    MakeNamedMedium {
        name: String,
        params: ParsedParameterVector,
    },
    MediumInterface {
        interior: String,
        exterior: String,
    },
    WorldBegin,
    AttributeBegin,
    AttributeEnd,
    Attribute {
        attr_target: String,
        params: ParsedParameterVector,
    },
    TransformBegin,
    TransformEnd,
    Texture {
        name: String,
        ty: String,
        class: String,
        params: ParsedParameterVector,
    },
    Material {
        ty: String,
        params: ParsedParameterVector,
    },
    MakeNamedMaterial {
        name: String,
        params: ParsedParameterVector,
    },
    NamedMaterial {
        name: String,
    },
    LightSource {
        ty: String,
        params: ParsedParameterVector,
    },
    AreaLightSource {
        ty: String,
        params: ParsedParameterVector,
    },
    Shape {
        name: String,
        params: ParsedParameterVector,
    },
    ReverseOrientation,
    ObjectBegin {
        name: String,
    },
    ObjectEnd,
    ObjectInstance {
        name: String,
    },
    WorldEnd,
}

impl Directive {
    /// Forwards this directive to the matching `ParserTarget` method.
    pub fn apply<T: ParserTarget + ?Sized>(self, target: &mut T, loc: FileLoc) -> Result<()> {
        match self {
            Directive::Option { name, value } => target.option(&name, &value, loc),
            Directive::Identity => target.identity(loc),
            Directive::Translate { v } => target.translate(v[0], v[1], v[2], loc),
            Directive::Scale { v } => target.scale(v[0], v[1], v[2], loc),
            Directive::Rotate { angle, v } => target.rotate(angle, v[0], v[1], v[2], loc),
            Directive::LookAt { eye, look_at, up } => target.look_at(
                eye[0], eye[1], eye[2], look_at[0], look_at[1], look_at[2], up[0], up[1], up[2],
                loc,
            ),
            Directive::ConcatTransform { m } => target.concat_transform(m, loc),
            Directive::Transform { m } => target.transform(m, loc),
            Directive::CoordinateSystem { name } => target.coordinate_system(&name, loc),
            Directive::CoordSysTransform { name } => target.coord_sys_transform(&name, loc),
            Directive::ActiveTransform { ty } => match ty {
                ActiveTransform::StartTime => target.active_transform_start_time(loc),
                ActiveTransform::EndTime => target.active_transform_end_time(loc),
                ActiveTransform::All => target.active_transform_all(loc),
            },
            Directive::TransformTimes { start, end } => target.transform_times(start, end, loc),
            Directive::ColorSpace { ty } => target.color_space(&ty, loc),
            Directive::PixelFilter { name, params } => target.pixel_filter(&name, params, loc),
            Directive::Film { ty, params } => target.film(&ty, params, loc),
            Directive::Sampler { ty, params } => target.sampler(&ty, params, loc),
            Directive::Accelerator { ty, params } => target.accelerator(&ty, params, loc),
            Directive::Integrator { ty, params } => target.integrator(&ty, params, loc),
            Directive::Camera { ty, params } => target.camera(&ty, params, loc),
            Directive::MakeNamedMedium { name, params } => {
                target.make_named_medium(&name, params, loc)
            }
            Directive::MediumInterface { interior, exterior } => {
                target.medium_interface(&interior, &exterior, loc)
            }
            Directive::WorldBegin => target.world_begin(loc),
            Directive::AttributeBegin => target.attribute_begin(loc),
            Directive::AttributeEnd => target.attribute_end(loc),
            Directive::Attribute {
                attr_target,
                params,
            } => target.attribute(&attr_target, params, loc),
            Directive::TransformBegin => target.transform_begin(loc),
            Directive::TransformEnd => target.transform_end(loc),
            Directive::Texture {
                name,
                ty,
                class,
                params,
            } => target.texture(&name, &ty, &class, params, loc),
            Directive::Material { ty, params } => target.material(&ty, params, loc),
            Directive::MakeNamedMaterial { name, params } => {
                target.make_named_material(&name, params, loc)
            }
            Directive::NamedMaterial { name } => target.named_material(&name, loc),
            Directive::LightSource { ty, params } => target.light_source(&ty, params, loc),
            Directive::AreaLightSource { ty, params } => target.area_light_source(&ty, params, loc),
            Directive::Shape { name, params } => target.shape(&name, params, loc),
            Directive::ReverseOrientation => target.reverse_orientation(loc),
            Directive::ObjectBegin { name } => target.object_begin(&name, loc),
            Directive::ObjectEnd => target.object_end(loc),
            Directive::ObjectInstance { name } => target.object_instance(&name, loc),
            Directive::WorldEnd => target.world_end(loc),
        }
    }
}

/// Feeds `directives` to `target` in order, stopping at the first fatal error.
pub fn replay<T, I>(target: &mut T, directives: I) -> Result<()>
where
    T: ParserTarget + ?Sized,
    I: IntoIterator<Item = (Directive, FileLoc)>,
{
    for (directive, loc) in directives {
        directive.apply(target, loc)?;
    }
    Ok(())
}
