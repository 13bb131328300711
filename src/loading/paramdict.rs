use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;
use log::warn;

use crate::{
    colorspace::{Rgb, RgbColorSpace},
    loading::{
        error::{Error, Result},
        parser_target::{FileLoc, ParsedParameterVector},
    },
    vecmath::{Normal3f, Point2f, Point3f, Tuple3, Vector2f, Vector3f},
    Float,
};

/// A parameter type a `ParameterDictionary` knows how to extract.
/// Sealed so that the set of types stays closed.
pub trait ParameterType: sealed::Sealed {
    const TYPE_NAME: &'static str;
    const N_PER_ITEM: usize;
    type ConvertType;
    type ReturnType;

    fn convert(v: &[Self::ConvertType]) -> Self::ReturnType;
    fn get_values(param: &ParsedParameter) -> &[Self::ConvertType];
}

macro_rules! parameter_type {
    ($param:ident, $name:literal, $n:literal, $field:ident: $conv:ty => $ret:ty, |$v:ident| $body:expr) => {
        pub struct $param;

        impl ParameterType for $param {
            const TYPE_NAME: &'static str = $name;
            const N_PER_ITEM: usize = $n;
            type ConvertType = $conv;
            type ReturnType = $ret;

            fn convert($v: &[Self::ConvertType]) -> Self::ReturnType {
                $body
            }

            fn get_values(param: &ParsedParameter) -> &[Self::ConvertType] {
                &param.$field
            }
        }

        impl sealed::Sealed for $param {}
    };
}

parameter_type!(BooleanParam, "bool", 1, bools: bool => bool, |v| v[0]);
parameter_type!(FloatParam, "float", 1, floats: Float => Float, |v| v[0]);
parameter_type!(IntegerParam, "integer", 1, ints: i32 => i32, |v| v[0]);
parameter_type!(Point2fParam, "point2", 2, floats: Float => Point2f, |v| Point2f::new(v[0], v[1]));
parameter_type!(Vector2fParam, "vector2", 2, floats: Float => Vector2f, |v| Vector2f::new(v[0], v[1]));
parameter_type!(Point3fParam, "point3", 3, floats: Float => Point3f, |v| Point3f::new(v[0], v[1], v[2]));
parameter_type!(Vector3fParam, "vector3", 3, floats: Float => Vector3f, |v| Vector3f::new(v[0], v[1], v[2]));
parameter_type!(Normal3fParam, "normal", 3, floats: Float => Normal3f, |v| Normal3f::new(v[0], v[1], v[2]));
parameter_type!(RgbParam, "rgb", 3, floats: Float => Rgb, |v| Rgb::new(v[0], v[1], v[2]));
parameter_type!(BlackbodyParam, "blackbody", 1, floats: Float => Float, |v| v[0]);
parameter_type!(StringParam, "string", 1, strings: String => String, |v| v[0].clone());
parameter_type!(TextureParam, "texture", 1, strings: String => String, |v| v[0].clone());

const SPECTRUM_TYPES: [&str; 3] = ["rgb", "blackbody", "spectrum"];

/// One parameter of a directive, e.g. `"float radius" [ 1 ]`, with its
/// values already decoded. Exactly one of the value vectors is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParameter {
    /// The name of the parameter, e.g. "radius" or "indices"
    pub name: String,
    /// The type of the parameter, e.g. "float" or "integer"
    pub param_type: String,
    pub loc: FileLoc,
    pub floats: Vec<Float>,
    pub ints: Vec<i32>,
    pub strings: Vec<String>,
    pub bools: Vec<bool>,
    /// Set once something has read the values.
    pub looked_up: bool,
    /// The color space in effect when the parameter was declared, if it
    /// came from an `Attribute` directive.
    pub color_space: Option<Arc<RgbColorSpace>>,
    pub may_be_unused: bool,
}

impl ParsedParameter {
    /// Shorthand type names are canonicalized: "point" and "vector" mean
    /// their 3D forms and "normal3" means "normal".
    pub fn new(param_type: &str, name: &str, loc: FileLoc) -> Self {
        let param_type = match param_type {
            "point" => Point3fParam::TYPE_NAME,
            "vector" => Vector3fParam::TYPE_NAME,
            "normal3" => Normal3fParam::TYPE_NAME,
            t => t,
        };
        Self {
            name: name.to_owned(),
            param_type: param_type.to_owned(),
            loc,
            floats: Vec::new(),
            ints: Vec::new(),
            strings: Vec::new(),
            bools: Vec::new(),
            looked_up: false,
            color_space: None,
            may_be_unused: false,
        }
    }

    pub fn with_floats(mut self, v: &[Float]) -> Self {
        self.floats.extend_from_slice(v);
        self
    }

    pub fn with_ints(mut self, v: &[i32]) -> Self {
        self.ints.extend_from_slice(v);
        self
    }

    pub fn with_strings(mut self, v: &[&str]) -> Self {
        self.strings.extend(v.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_bools(mut self, v: &[bool]) -> Self {
        self.bools.extend_from_slice(v);
        self
    }

    fn has_values(&self) -> bool {
        !(self.floats.is_empty()
            && self.ints.is_empty()
            && self.strings.is_empty()
            && self.bools.is_empty())
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::InvalidParameterValues {
            loc: self.loc.clone(),
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// `"type name" [ v0 v1 ... ]`, wrapping long value lists. `indent` is
    /// the column the definition starts at.
    pub fn to_definition(&self, indent: usize) -> String {
        let mut s = format!("\"{} {}\" [ ", self.param_type, self.name);
        let continuation = indent + 10 + self.param_type.len() + self.name.len();
        let mut column = indent + 4 + s.len();
        let values = self
            .floats
            .iter()
            .map(|f| format!("{} ", f))
            .chain(self.ints.iter().map(|i| format!("{} ", i)))
            .chain(self.strings.iter().map(|st| format!("\"{}\" ", st)))
            .chain(self.bools.iter().map(|b| format!("{} ", b)));
        for value in values {
            if column > 80 {
                s.push('\n');
                s.push_str(&" ".repeat(continuation));
                column = continuation;
            }
            column += value.len();
            s.push_str(&value);
        }
        s.push(']');
        s
    }
}

/// Adds typed lookup and validation on top of a list of parsed parameters.
///
/// Parameters are stored in reverse declaration order, with any inherited
/// (`Attribute`) parameters after the directive's own, so a lookup finds
/// the last explicit definition first.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDictionary {
    pub params: ParsedParameterVector,
    pub color_space: Arc<RgbColorSpace>,
}

impl Default for ParameterDictionary {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            color_space: RgbColorSpace::srgb(),
        }
    }
}

impl ParameterDictionary {
    /// The color space applies to any RGB-valued parameter that doesn't
    /// carry its own.
    pub fn new(
        params: ParsedParameterVector,
        color_space: Arc<RgbColorSpace>,
    ) -> Result<ParameterDictionary> {
        Self::new_with_unowned(params, Vec::new(), color_space)
    }

    pub fn new_with_unowned(
        params: ParsedParameterVector,
        unowned: ParsedParameterVector,
        color_space: Arc<RgbColorSpace>,
    ) -> Result<ParameterDictionary> {
        let params = params
            .into_iter()
            .rev()
            .chain(unowned.into_iter().rev())
            .collect();
        let d = ParameterDictionary {
            params,
            color_space,
        };
        d.check_parameter_types()?;
        Ok(d)
    }

    fn check_parameter_types(&self) -> Result<()> {
        for p in &self.params {
            match p.param_type.as_str() {
                BooleanParam::TYPE_NAME => {
                    if p.bools.is_empty() {
                        return Err(p.invalid("non-Boolean values provided"));
                    }
                }
                FloatParam::TYPE_NAME
                | IntegerParam::TYPE_NAME
                | Point2fParam::TYPE_NAME
                | Vector2fParam::TYPE_NAME
                | Point3fParam::TYPE_NAME
                | Vector3fParam::TYPE_NAME
                | Normal3fParam::TYPE_NAME
                | RgbParam::TYPE_NAME
                | BlackbodyParam::TYPE_NAME => {
                    if p.ints.is_empty() && p.floats.is_empty() {
                        return Err(p.invalid("non-numeric values provided"));
                    }
                }
                StringParam::TYPE_NAME | TextureParam::TYPE_NAME => {
                    if p.strings.is_empty() {
                        return Err(p.invalid("non-string values provided"));
                    }
                }
                "spectrum" => {
                    if p.strings.is_empty() && p.ints.is_empty() && p.floats.is_empty() {
                        return Err(p.invalid("expecting string or numeric values"));
                    }
                }
                _ => {
                    return Err(Error::UnknownParameterType {
                        loc: p.loc.clone(),
                        ty: p.param_type.clone(),
                        name: p.name.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    fn lookup_single<P: ParameterType>(
        &mut self,
        name: &str,
        default_value: P::ReturnType,
    ) -> Result<P::ReturnType> {
        let Some(p) = self
            .params
            .iter_mut()
            .find(|p| p.name == name && p.param_type == P::TYPE_NAME)
        else {
            return Ok(default_value);
        };
        p.looked_up = true;
        let values = P::get_values(p);
        if values.is_empty() {
            return Err(p.invalid("no values provided"));
        }
        if values.len() != P::N_PER_ITEM {
            return Err(p.invalid(format!("expected {} values", P::N_PER_ITEM)));
        }
        Ok(P::convert(values))
    }

    fn lookup_array<P: ParameterType>(&mut self, name: &str) -> Result<Vec<P::ReturnType>> {
        let Some(p) = self
            .params
            .iter_mut()
            .find(|p| p.name == name && p.param_type == P::TYPE_NAME)
        else {
            return Ok(Vec::new());
        };
        let values = P::get_values(p);
        if values.is_empty() {
            return Err(p.invalid("no values provided"));
        }
        if values.len() % P::N_PER_ITEM != 0 {
            return Err(p.invalid(format!(
                "number of values provided is not a multiple of {}",
                P::N_PER_ITEM
            )));
        }
        let converted = values.chunks_exact(P::N_PER_ITEM).map(P::convert).collect();
        p.looked_up = true;
        Ok(converted)
    }

    pub fn get_one_float(&mut self, name: &str, default_value: Float) -> Result<Float> {
        self.lookup_single::<FloatParam>(name, default_value)
    }

    pub fn get_one_int(&mut self, name: &str, default_value: i32) -> Result<i32> {
        self.lookup_single::<IntegerParam>(name, default_value)
    }

    pub fn get_one_bool(&mut self, name: &str, default_value: bool) -> Result<bool> {
        self.lookup_single::<BooleanParam>(name, default_value)
    }

    pub fn get_one_point2f(&mut self, name: &str, default_value: Point2f) -> Result<Point2f> {
        self.lookup_single::<Point2fParam>(name, default_value)
    }

    pub fn get_one_vector2f(&mut self, name: &str, default_value: Vector2f) -> Result<Vector2f> {
        self.lookup_single::<Vector2fParam>(name, default_value)
    }

    pub fn get_one_point3f(&mut self, name: &str, default_value: Point3f) -> Result<Point3f> {
        self.lookup_single::<Point3fParam>(name, default_value)
    }

    pub fn get_one_vector3f(&mut self, name: &str, default_value: Vector3f) -> Result<Vector3f> {
        self.lookup_single::<Vector3fParam>(name, default_value)
    }

    pub fn get_one_normal3f(&mut self, name: &str, default_value: Normal3f) -> Result<Normal3f> {
        self.lookup_single::<Normal3fParam>(name, default_value)
    }

    pub fn get_one_string(&mut self, name: &str, default_value: &str) -> Result<String> {
        self.lookup_single::<StringParam>(name, default_value.to_owned())
    }

    /// The value of an `"rgb"` parameter, if there is one with exactly
    /// three components.
    pub fn get_one_rgb(&mut self, name: &str) -> Option<Rgb> {
        let p = self
            .params
            .iter_mut()
            .find(|p| p.name == name && p.param_type == RgbParam::TYPE_NAME)?;
        if p.floats.len() != 3 {
            return None;
        }
        p.looked_up = true;
        Some(RgbParam::convert(&p.floats))
    }

    /// The name of the texture bound to `name`, or an empty string.
    pub fn get_texture(&mut self, name: &str) -> Result<String> {
        self.lookup_single::<TextureParam>(name, String::new())
    }

    pub fn get_float_array(&mut self, name: &str) -> Result<Vec<Float>> {
        self.lookup_array::<FloatParam>(name)
    }

    pub fn get_int_array(&mut self, name: &str) -> Result<Vec<i32>> {
        self.lookup_array::<IntegerParam>(name)
    }

    pub fn get_bool_array(&mut self, name: &str) -> Result<Vec<bool>> {
        self.lookup_array::<BooleanParam>(name)
    }

    pub fn get_string_array(&mut self, name: &str) -> Result<Vec<String>> {
        self.lookup_array::<StringParam>(name)
    }

    pub fn get_point2f_array(&mut self, name: &str) -> Result<Vec<Point2f>> {
        self.lookup_array::<Point2fParam>(name)
    }

    pub fn get_vector2f_array(&mut self, name: &str) -> Result<Vec<Vector2f>> {
        self.lookup_array::<Vector2fParam>(name)
    }

    pub fn get_point3f_array(&mut self, name: &str) -> Result<Vec<Point3f>> {
        self.lookup_array::<Point3fParam>(name)
    }

    pub fn get_vector3f_array(&mut self, name: &str) -> Result<Vec<Vector3f>> {
        self.lookup_array::<Vector3fParam>(name)
    }

    pub fn get_normal3f_array(&mut self, name: &str) -> Result<Vec<Normal3f>> {
        self.lookup_array::<Normal3fParam>(name)
    }

    /// Temperatures of a `"blackbody"` parameter; older files append a
    /// scale factor as a second value.
    pub fn get_blackbody_array(&mut self, name: &str) -> Result<Vec<Float>> {
        self.lookup_array::<BlackbodyParam>(name)
    }

    /// True if `name` is given as any spectrum-valued parameter.
    pub fn has_spectrum(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| p.name == name && SPECTRUM_TYPES.contains(&p.param_type.as_str()))
    }

    pub fn loc(&self, name: &str) -> Option<&FileLoc> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.loc)
    }

    fn remove_where(&mut self, name: &str, types: &[&str]) {
        self.params
            .retain(|p| !(p.name == name && types.contains(&p.param_type.as_str())));
    }

    pub fn remove_float(&mut self, name: &str) {
        self.remove_where(name, &[FloatParam::TYPE_NAME]);
    }

    pub fn remove_int(&mut self, name: &str) {
        self.remove_where(name, &[IntegerParam::TYPE_NAME]);
    }

    pub fn remove_bool(&mut self, name: &str) {
        self.remove_where(name, &[BooleanParam::TYPE_NAME]);
    }

    pub fn remove_string(&mut self, name: &str) {
        self.remove_where(name, &[StringParam::TYPE_NAME]);
    }

    pub fn remove_point2f(&mut self, name: &str) {
        self.remove_where(name, &[Point2fParam::TYPE_NAME]);
    }

    pub fn remove_spectrum(&mut self, name: &str) {
        self.remove_where(name, &SPECTRUM_TYPES);
    }

    pub fn remove_texture(&mut self, name: &str) {
        self.remove_where(name, &[TextureParam::TYPE_NAME]);
    }

    pub fn rename_parameter(&mut self, before: &str, after: &str) {
        for p in self.params.iter_mut().filter(|p| p.name == before) {
            p.name = after.to_owned();
        }
    }

    /// Errors on the first parameter nobody asked for.
    pub fn report_unused(&self) -> Result<()> {
        match self.params.iter().find(|p| !p.looked_up && !p.may_be_unused) {
            Some(p) => Err(p.invalid("parameter is unused")),
            None => Ok(()),
        }
    }

    /// One parameter definition per line in declaration order, each
    /// indented four spaces past `indent`.
    pub fn to_parameter_list(&self, indent: usize) -> String {
        self.params
            .iter()
            .rev()
            .map(|p| format!("{}{}\n", " ".repeat(indent + 4), p.to_definition(indent)))
            .join("")
    }

    /// The definition of `name`, or an empty string if it isn't present.
    pub fn to_parameter_definition(&self, name: &str) -> String {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.to_definition(0))
            .unwrap_or_default()
    }
}

/// Float and spectrum textures resolved by the caller, keyed by the name
/// given in their `Texture` directive.
#[derive(Debug, Clone)]
pub struct NamedTextures<F, S> {
    pub float_textures: HashMap<String, F>,
    pub spectrum_textures: HashMap<String, S>,
}

impl<F, S> Default for NamedTextures<F, S> {
    fn default() -> Self {
        Self {
            float_textures: HashMap::new(),
            spectrum_textures: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FloatTextureParam<F> {
    Texture(F),
    Constant(Float),
}

#[derive(Debug, Clone)]
pub enum SpectrumTextureParam<S> {
    Texture(S),
    Rgb(Rgb, Arc<RgbColorSpace>),
    Blackbody(Float),
    Named(String),
    /// (wavelength, value) pairs
    Sampled(Vec<(Float, Float)>),
}

/// A `ParameterDictionary` that can also resolve texture-valued parameters.
pub struct TextureParameterDictionary<'a, F, S> {
    pub dict: ParameterDictionary,
    textures: &'a NamedTextures<F, S>,
}

impl<'a, F: Clone, S: Clone> TextureParameterDictionary<'a, F, S> {
    pub fn new(dict: ParameterDictionary, textures: &'a NamedTextures<F, S>) -> Self {
        Self { dict, textures }
    }

    pub fn get_float_texture_or_none(
        &mut self,
        name: &str,
    ) -> Result<Option<FloatTextureParam<F>>> {
        let Some(p) = self.dict.params.iter_mut().find(|p| p.name == name) else {
            return Ok(None);
        };
        match p.param_type.as_str() {
            TextureParam::TYPE_NAME => {
                if p.strings.len() != 1 {
                    return Err(p.invalid("expected exactly one texture name"));
                }
                p.looked_up = true;
                match self.textures.float_textures.get(&p.strings[0]) {
                    Some(tex) => Ok(Some(FloatTextureParam::Texture(tex.clone()))),
                    None => Err(Error::TextureNotFound {
                        loc: p.loc.clone(),
                        kind: "float",
                        name: p.strings[0].clone(),
                    }),
                }
            }
            FloatParam::TYPE_NAME => {
                if p.floats.len() != 1 {
                    return Err(p.invalid("expected 1 value"));
                }
                p.looked_up = true;
                Ok(Some(FloatTextureParam::Constant(p.floats[0])))
            }
            _ => Ok(None),
        }
    }

    pub fn get_float_texture(
        &mut self,
        name: &str,
        default_value: Float,
    ) -> Result<FloatTextureParam<F>> {
        Ok(self
            .get_float_texture_or_none(name)?
            .unwrap_or(FloatTextureParam::Constant(default_value)))
    }

    pub fn get_spectrum_texture_or_none(
        &mut self,
        name: &str,
    ) -> Result<Option<SpectrumTextureParam<S>>> {
        let color_space = self.dict.color_space.clone();
        let Some(p) = self.dict.params.iter_mut().find(|p| p.name == name) else {
            return Ok(None);
        };
        let tex = match p.param_type.as_str() {
            TextureParam::TYPE_NAME => {
                if p.strings.len() != 1 {
                    return Err(p.invalid("expected exactly one texture name"));
                }
                match self.textures.spectrum_textures.get(&p.strings[0]) {
                    Some(tex) => SpectrumTextureParam::Texture(tex.clone()),
                    None => {
                        return Err(Error::TextureNotFound {
                            loc: p.loc.clone(),
                            kind: "spectrum",
                            name: p.strings[0].clone(),
                        })
                    }
                }
            }
            RgbParam::TYPE_NAME => {
                if p.floats.len() != 3 {
                    return Err(p.invalid("expected 3 values for RGB texture parameter"));
                }
                let rgb = RgbParam::convert(&p.floats);
                if rgb.r < 0.0 || rgb.g < 0.0 || rgb.b < 0.0 {
                    return Err(p.invalid("RGB parameter has negative component"));
                }
                let cs = p.color_space.clone().unwrap_or(color_space);
                SpectrumTextureParam::Rgb(rgb, cs)
            }
            BlackbodyParam::TYPE_NAME => {
                if p.floats.len() != 1 {
                    return Err(p.invalid("expected one blackbody temperature"));
                }
                SpectrumTextureParam::Blackbody(p.floats[0])
            }
            "spectrum" if !p.strings.is_empty() => {
                if p.strings.len() != 1 {
                    return Err(p.invalid("expected one named spectrum"));
                }
                SpectrumTextureParam::Named(p.strings[0].clone())
            }
            "spectrum" => {
                if p.floats.len() % 2 != 0 {
                    return Err(p.invalid("found odd number of values"));
                }
                if p.floats.len() == 2 {
                    warn!(
                        "{}: {}: specified spectrum is only non-zero at a single wavelength",
                        p.loc, p.name
                    );
                }
                let samples: Vec<(Float, Float)> =
                    p.floats.chunks_exact(2).map(|c| (c[0], c[1])).collect();
                if samples.windows(2).any(|w| w[1].0 <= w[0].0) {
                    return Err(p.invalid("wavelengths aren't increasing"));
                }
                SpectrumTextureParam::Sampled(samples)
            }
            _ => return Ok(None),
        };
        p.looked_up = true;
        Ok(Some(tex))
    }
}

impl<'a, F, S> std::ops::Deref for TextureParameterDictionary<'a, F, S> {
    type Target = ParameterDictionary;

    fn deref(&self) -> &Self::Target {
        &self.dict
    }
}

impl<'a, F, S> std::ops::DerefMut for TextureParameterDictionary<'a, F, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dict
    }
}

mod sealed {
    pub trait Sealed {}
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::{
        FloatTextureParam, NamedTextures, ParameterDictionary, ParsedParameter,
        SpectrumTextureParam, TextureParameterDictionary,
    };
    use crate::{
        colorspace::RgbColorSpace,
        loading::{error::Error, parser_target::FileLoc},
        vecmath::Tuple3,
        Float,
    };

    fn param(ty: &str, name: &str) -> ParsedParameter {
        ParsedParameter::new(ty, name, FileLoc::default())
    }

    fn dict(params: Vec<ParsedParameter>) -> ParameterDictionary {
        ParameterDictionary::new(params, RgbColorSpace::srgb()).unwrap()
    }

    #[test]
    fn single_values_and_defaults() {
        let mut d = dict(vec![
            param("float", "radius").with_floats(&[2.5]),
            param("integer", "maxdepth").with_ints(&[5]),
            param("string", "filename").with_strings(&["a.exr"]),
            param("bool", "twosided").with_bools(&[true]),
            param("point", "from").with_floats(&[1.0, 2.0, 3.0]),
        ]);
        assert_approx_eq!(Float, 2.5, d.get_one_float("radius", 1.0).unwrap());
        assert_approx_eq!(Float, 1.0, d.get_one_float("missing", 1.0).unwrap());
        assert_eq!(5, d.get_one_int("maxdepth", 0).unwrap());
        assert_eq!("a.exr", d.get_one_string("filename", "").unwrap());
        assert!(d.get_one_bool("twosided", false).unwrap());
        let from = d.get_one_point3f("from", Default::default()).unwrap();
        assert_approx_eq!(Float, 2.0, from.y());
        // Type must match too.
        assert_eq!(0, d.get_one_int("radius", 0).unwrap());
    }

    #[test]
    fn later_definition_wins() {
        let mut d = dict(vec![
            param("float", "radius").with_floats(&[1.0]),
            param("float", "radius").with_floats(&[3.0]),
        ]);
        assert_approx_eq!(Float, 3.0, d.get_one_float("radius", 0.0).unwrap());
    }

    #[test]
    fn owned_parameters_shadow_inherited_ones() {
        let mut d = ParameterDictionary::new_with_unowned(
            vec![param("float", "radius").with_floats(&[1.0])],
            vec![param("float", "radius").with_floats(&[7.0])],
            RgbColorSpace::srgb(),
        )
        .unwrap();
        assert_approx_eq!(Float, 1.0, d.get_one_float("radius", 0.0).unwrap());
    }

    #[test]
    fn arrays() {
        let mut d = dict(vec![
            param("point2", "uv").with_floats(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]),
            param("integer", "indices").with_ints(&[0, 1, 2]),
        ]);
        assert_eq!(3, d.get_point2f_array("uv").unwrap().len());
        assert_eq!(vec![0, 1, 2], d.get_int_array("indices").unwrap());
        assert!(d.get_float_array("nothing").unwrap().is_empty());
    }

    #[test]
    fn bad_counts_are_errors() {
        let mut d = dict(vec![param("point3", "P").with_floats(&[0.0, 1.0])]);
        assert!(matches!(
            d.get_point3f_array("P"),
            Err(Error::InvalidParameterValues { .. })
        ));
        let mut d = dict(vec![param("float", "radius").with_floats(&[1.0, 2.0])]);
        assert!(d.get_one_float("radius", 0.0).is_err());
    }

    #[test]
    fn type_checking() {
        let r = ParameterDictionary::new(
            vec![param("quaternion", "q").with_floats(&[1.0])],
            RgbColorSpace::srgb(),
        );
        assert!(matches!(r, Err(Error::UnknownParameterType { .. })));
        let r = ParameterDictionary::new(
            vec![param("float", "radius").with_strings(&["one"])],
            RgbColorSpace::srgb(),
        );
        assert!(matches!(r, Err(Error::InvalidParameterValues { .. })));
    }

    #[test]
    fn removal_and_rename() {
        let mut d = dict(vec![
            param("rgb", "Kd").with_floats(&[0.5, 0.5, 0.5]),
            param("float", "roughness").with_floats(&[0.1]),
            param("texture", "bumpmap").with_strings(&["bumps"]),
        ]);
        assert!(d.has_spectrum("Kd"));
        d.rename_parameter("Kd", "reflectance");
        assert!(!d.has_spectrum("Kd"));
        assert!(d.get_one_rgb("reflectance").unwrap().is_constant());
        assert_eq!("bumps", d.get_texture("bumpmap").unwrap());
        d.remove_texture("bumpmap");
        d.remove_float("roughness");
        // Removing a float doesn't touch a spectrum of the same name.
        d.remove_float("reflectance");
        assert_eq!(1, d.params.len());
        d.remove_spectrum("reflectance");
        assert!(d.params.is_empty());
    }

    #[test]
    fn parameter_list_keeps_declaration_order() {
        let d = dict(vec![
            param("float", "radius").with_floats(&[1.0]),
            param("string", "mapping").with_strings(&["equirect"]),
        ]);
        assert_eq!(
            "    \"float radius\" [ 1 ]\n    \"string mapping\" [ \"equirect\" ]\n",
            d.to_parameter_list(0)
        );
        assert_eq!("\"float radius\" [ 1 ]", d.to_parameter_definition("radius"));
        assert_eq!("", d.to_parameter_definition("nothing"));
    }

    #[test]
    fn long_value_lists_wrap() {
        let values: Vec<Float> = (0..40).map(|i| i as Float).collect();
        let d = dict(vec![param("float", "P").with_floats(&values)]);
        let def = d.to_parameter_definition("P");
        assert!(def.lines().count() > 1);
        assert!(def.lines().all(|l| l.len() < 100));
    }

    #[test]
    fn unused_parameters() {
        let mut d = dict(vec![
            param("float", "radius").with_floats(&[1.0]),
            param("float", "zmin").with_floats(&[1.0]),
        ]);
        d.get_one_float("radius", 0.0).unwrap();
        assert!(d.report_unused().is_err());
        d.params.iter_mut().for_each(|p| p.may_be_unused = true);
        assert!(d.report_unused().is_ok());
    }

    #[test]
    fn texture_lookups() {
        let mut textures: NamedTextures<&str, &str> = NamedTextures::default();
        textures.float_textures.insert("rough".into(), "rough-tex");
        textures.spectrum_textures.insert("wood".into(), "wood-tex");

        let d = dict(vec![
            param("texture", "roughness").with_strings(&["rough"]),
            param("float", "eta").with_floats(&[1.5]),
            param("texture", "reflectance").with_strings(&["wood"]),
            param("rgb", "Ks").with_floats(&[0.1, 0.2, 0.3]),
            param("blackbody", "L").with_floats(&[6500.0]),
            param("spectrum", "k").with_strings(&["metal-Ag-k"]),
            param("texture", "missing").with_strings(&["nope"]),
        ]);
        let mut td = TextureParameterDictionary::new(d, &textures);
        assert_eq!(
            FloatTextureParam::Texture("rough-tex"),
            td.get_float_texture("roughness", 0.0).unwrap()
        );
        assert_eq!(
            FloatTextureParam::Constant(1.5),
            td.get_float_texture("eta", 1.0).unwrap()
        );
        assert_eq!(
            FloatTextureParam::Constant(0.25),
            td.get_float_texture("nothing", 0.25).unwrap()
        );
        assert!(matches!(
            td.get_spectrum_texture_or_none("reflectance").unwrap(),
            Some(SpectrumTextureParam::Texture("wood-tex"))
        ));
        match td.get_spectrum_texture_or_none("Ks").unwrap() {
            Some(SpectrumTextureParam::Rgb(rgb, cs)) => {
                assert_approx_eq!(Float, 0.2, rgb.g);
                assert_eq!("srgb", cs.name);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            td.get_spectrum_texture_or_none("L").unwrap(),
            Some(SpectrumTextureParam::Blackbody(_))
        ));
        assert!(matches!(
            td.get_spectrum_texture_or_none("k").unwrap(),
            Some(SpectrumTextureParam::Named(_))
        ));
        assert!(matches!(
            td.get_float_texture_or_none("missing"),
            Err(Error::TextureNotFound { kind: "float", .. })
        ));
        // Deref gives access to the plain lookups.
        assert_approx_eq!(Float, 1.5, td.get_one_float("eta", 0.0).unwrap());
    }
}
