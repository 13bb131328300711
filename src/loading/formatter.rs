//! A `ParserTarget` that writes the directive stream back out as text.
//!
//! Output is indented four spaces per open `AttributeBegin`/`TransformBegin`
//! and each parameter goes on its own line. With `upgrade` set, syntax from
//! older scene files is rewritten into its current form; constructs that
//! have no automatic translation fail with `Error::UpgradeFailed`.

use std::io::Write;

use log::{error, warn};

use crate::{
    colorspace::{Rgb, RgbColorSpace},
    loading::{
        error::{Error, Result},
        paramdict::ParameterDictionary,
        parser_target::{FileLoc, ParsedParameterVector, ParserTarget},
    },
    util::normalize_arg,
    vecmath::Point2f,
    Float,
};

pub struct FormattingTarget<W: Write> {
    out: W,
    indent: usize,
    upgrade: bool,
}

fn upgrade_failed(loc: &FileLoc, message: impl Into<String>) -> Error {
    Error::UpgradeFailed {
        loc: loc.clone(),
        message: message.into(),
    }
}

/// Folds a spectrally constant RGB `name` into `total_scale`. Returns false
/// if `name` is some other kind of spectrum.
fn upgrade_rgb_to_scale(
    dict: &mut ParameterDictionary,
    name: &str,
    total_scale: &mut Float,
) -> bool {
    if !dict.has_spectrum(name) {
        return true;
    }
    match dict.get_one_rgb(name) {
        Some(rgb) if rgb.is_constant() => {
            *total_scale *= rgb.r;
            dict.remove_spectrum(name);
            true
        }
        _ => false,
    }
}

/// Removes spectrum or texture `param`, returning whether it was the
/// constant `value`. Anything else being dropped is worth a warning.
fn remove_if_constant(
    dict: &mut ParameterDictionary,
    material: &str,
    param: &str,
    value: Float,
    loc: &FileLoc,
) -> bool {
    let matches = dict
        .get_one_rgb(param)
        .map_or(false, |rgb| rgb == Rgb::new(value, value, value));
    if !matches && dict.has_spectrum(param) {
        warn!(
            "{}: Parameter is being removed when converting to \"{}\" material: {}",
            loc,
            material,
            dict.to_parameter_definition(param)
        );
    }
    dict.remove_spectrum(param);
    dict.remove_texture(param);
    matches
}

fn upgrade_uber_opacity(dict: &mut ParameterDictionary, loc: &FileLoc) -> Result<()> {
    if !dict.get_texture("opacity")?.is_empty() {
        return Err(upgrade_failed(
            loc,
            "Non-opaque \"opacity\" in \"uber\" material is not supported by the current format. Please edit the file manually.",
        ));
    }
    if !dict.has_spectrum("opacity") {
        return Ok(());
    }
    if dict.get_one_rgb("opacity") == Some(Rgb::new(1.0, 1.0, 1.0)) {
        dict.remove_spectrum("opacity");
        return Ok(());
    }
    Err(upgrade_failed(
        loc,
        "A non-opaque \"opacity\" in the \"uber\" material is not supported by the current format. Please edit the file manually.",
    ))
}

impl<W: Write> FormattingTarget<W> {
    pub fn new(out: W, upgrade: bool) -> Self {
        Self {
            out,
            indent: 0,
            upgrade,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn indent(&self, extra: usize) -> String {
        " ".repeat(self.indent + 4 * extra)
    }

    /// Old files spell RGB parameters `"color"`; when upgrading they are
    /// read as `"rgb"`.
    fn dictionary(&self, mut params: ParsedParameterVector) -> Result<ParameterDictionary> {
        if self.upgrade {
            for p in params.iter_mut().filter(|p| p.param_type == "color") {
                p.param_type = "rgb".to_owned();
            }
        }
        ParameterDictionary::new(params, RgbColorSpace::srgb())
    }

    fn write_parameters(&mut self, extra: &str, dict: &ParameterDictionary) -> Result<()> {
        let list = dict.to_parameter_list(self.indent);
        write!(self.out, "{}{}", extra, list)?;
        Ok(())
    }

    fn upgrade_material_index(
        &self,
        name: &str,
        dict: &mut ParameterDictionary,
        loc: &FileLoc,
    ) -> Result<String> {
        if name != "glass" && name != "uber" {
            return Ok(String::new());
        }
        let both = || {
            upgrade_failed(
                loc,
                format!("Material \"{}\" has both \"index\" and \"eta\" parameters.", name),
            )
        };

        let tex = dict.get_texture("index")?;
        if !tex.is_empty() {
            if !dict.get_texture("eta")?.is_empty() {
                return Err(both());
            }
            dict.remove_texture("index");
            return Ok(format!("{}\"texture eta\" \"{}\"\n", self.indent(1), tex));
        }

        let index = dict.get_float_array("index")?;
        if index.is_empty() {
            return Ok(String::new());
        }
        if index.len() != 1 {
            return Err(upgrade_failed(
                loc,
                "Multiple values provided for \"index\" parameter.",
            ));
        }
        if !dict.get_float_array("eta")?.is_empty() {
            return Err(both());
        }
        dict.remove_float("index");
        Ok(format!("{}\"float eta\" [ {} ]\n", self.indent(1), index[0]))
    }

    fn upgrade_material_bumpmap(&self, dict: &mut ParameterDictionary) -> Result<String> {
        let bump = dict.get_texture("bumpmap")?;
        if bump.is_empty() {
            return Ok(String::new());
        }
        dict.remove_texture("bumpmap");
        Ok(format!("{}\"texture displacement\" \"{}\"\n", self.indent(1), bump))
    }

    /// Renames `name` to its current material type and rewrites its
    /// parameters to match. Returns parameter lines to print ahead of the
    /// rest of the dictionary.
    fn upgrade_material(
        &self,
        name: &mut String,
        dict: &mut ParameterDictionary,
        loc: &FileLoc,
    ) -> Result<String> {
        let mut extra = self.upgrade_material_index(name, dict, loc)?;
        extra += &self.upgrade_material_bumpmap(dict)?;

        let old_name = name.clone();
        match old_name.as_str() {
            "uber" => {
                *name = "coateddiffuse".to_owned();
                if remove_if_constant(dict, name, "Ks", 0.0, loc) {
                    *name = "diffuse".to_owned();
                    dict.remove_float("eta");
                    dict.remove_float("roughness");
                }
                remove_if_constant(dict, name, "Kr", 0.0, loc);
                remove_if_constant(dict, name, "Kt", 0.0, loc);
                dict.rename_parameter("Kd", "reflectance");
                upgrade_uber_opacity(dict, loc)?;
            }
            "mix" => {
                if let Some(rgb) = dict.get_one_rgb("amount") {
                    let amount = if rgb.is_constant() {
                        rgb.r
                    } else {
                        let average = (rgb.r + rgb.g + rgb.b) / 3.0;
                        warn!(
                            "{}: Changing RGB \"amount\" ({}, {}, {}) to scalar average {}",
                            loc, rgb.r, rgb.g, rgb.b, average
                        );
                        average
                    };
                    extra += &format!("{}\"float amount\" [ {} ]\n", self.indent(1), amount);
                } else if dict.has_spectrum("amount") {
                    error!(
                        "{}: Unable to update non-RGB spectrum \"amount\" to a scalar: {}",
                        loc,
                        dict.to_parameter_definition("amount")
                    );
                }
                dict.remove_spectrum("amount");
            }
            "substrate" => {
                *name = "coateddiffuse".to_owned();
                remove_if_constant(dict, name, "Ks", 1.0, loc);
                dict.rename_parameter("Kd", "reflectance");
            }
            "glass" => {
                *name = "dielectric".to_owned();
                remove_if_constant(dict, name, "Kr", 1.0, loc);
                remove_if_constant(dict, name, "Kt", 1.0, loc);
            }
            "plastic" => {
                *name = "coateddiffuse".to_owned();
                if remove_if_constant(dict, name, "Ks", 0.0, loc) {
                    *name = "diffuse".to_owned();
                    dict.remove_float("roughness");
                    dict.remove_float("eta");
                }
                dict.rename_parameter("Kd", "reflectance");
            }
            "fourier" => warn!(
                "{}: \"fourier\" material is no longer supported. (But there is \"measured\"!)",
                loc
            ),
            "kdsubsurface" => {
                *name = "subsurface".to_owned();
                dict.rename_parameter("Kd", "reflectance");
            }
            "matte" => {
                *name = "diffuse".to_owned();
                dict.rename_parameter("Kd", "reflectance");
            }
            "metal" => {
                *name = "conductor".to_owned();
                remove_if_constant(dict, name, "Kr", 1.0, loc);
            }
            "translucent" => {
                *name = "diffusetransmission".to_owned();
                dict.rename_parameter("Kd", "transmittance");
                remove_if_constant(dict, name, "reflect", 0.0, loc);
                remove_if_constant(dict, name, "transmit", 1.0, loc);
                remove_if_constant(dict, name, "Ks", 0.0, loc);
                dict.remove_float("roughness");
            }
            "mirror" => {
                *name = "conductor".to_owned();
                let indent = self.indent(1);
                extra += &format!("{}\"float roughness\" [ 0 ]\n", indent);
                extra += &format!("{}\"spectrum eta\" [ \"metal-Ag-eta\" ]\n", indent);
                extra += &format!("{}\"spectrum k\" [ \"metal-Ag-k\" ]\n", indent);
                remove_if_constant(dict, name, "Kr", 0.0, loc);
            }
            _ => {}
        }
        Ok(extra)
    }

    /// Old files give a blackbody's scale as a second value; it moves into
    /// `total_scale`.
    fn upgrade_blackbody(
        &self,
        dict: &mut ParameterDictionary,
        total_scale: &mut Float,
    ) -> Result<String> {
        let mut extra = String::new();
        for name in ["L", "I"] {
            let values = dict.get_blackbody_array(name)?;
            if values.len() < 2 {
                continue;
            }
            let scale = dict.get_one_float("scale", 1.0)?;
            dict.remove_float("scale");
            *total_scale *= scale * values[1];
            dict.remove_spectrum(name);
            extra += &format!("{}\"blackbody {}\" [ {} ]\n", self.indent(1), name, values[0]);
        }
        Ok(extra)
    }

    fn upgrade_mapname(&self, dict: &mut ParameterDictionary) -> Result<String> {
        let mapname = dict.get_one_string("mapname", "")?;
        if mapname.is_empty() {
            return Ok(String::new());
        }
        dict.remove_string("mapname");
        Ok(format!("{}\"string imagefile\" \"{}\"\n", self.indent(1), mapname))
    }

    /// Float `uv`/`st` arrays and point2 `st` all become a point2 `uv`.
    fn upgrade_tri_mesh_uvs(&self, dict: &mut ParameterDictionary) -> Result<String> {
        let mut uv = dict.get_point2f_array("st")?;
        if !uv.is_empty() {
            dict.remove_point2f("st");
        } else {
            for name in ["uv", "st"] {
                let values = dict.get_float_array(name)?;
                if values.is_empty() {
                    continue;
                }
                uv = values
                    .chunks_exact(2)
                    .map(|c| Point2f::new(c[0], c[1]))
                    .collect();
                dict.remove_float(name);
            }
        }
        if uv.is_empty() {
            return Ok(String::new());
        }

        let mut s = format!("{}\"point2 uv\" [ ", self.indent(1));
        for (i, p) in uv.iter().enumerate() {
            s += &format!("{} {} ", p.x, p.y);
            if (i + 1) % 4 == 0 && i + 1 < uv.len() {
                s.push('\n');
                s += &self.indent(2);
            }
        }
        s += "]\n";
        Ok(s)
    }

    fn rewrite_scale_texture(
        name: &str,
        texture_type: &str,
        params: &mut ParsedParameterVector,
    ) -> Result<()> {
        if texture_type == "float" {
            for p in params.iter_mut() {
                if p.name == "tex1" {
                    p.name = "tex".to_owned();
                } else if p.name == "tex2" {
                    p.name = "scale".to_owned();
                }
            }
            return Ok(());
        }

        // One of the two must be a constant RGB, which becomes a float scale.
        let (mut found_rgb, mut found_texture) = (false, false);
        for p in params
            .iter_mut()
            .filter(|p| p.name == "tex1" || p.name == "tex2")
        {
            if p.param_type == "rgb" || p.param_type == "color" {
                if found_rgb {
                    return Err(upgrade_failed(
                        &p.loc,
                        format!(
                            "Two \"rgb\" textures found for \"scale\" texture \"{}\". Please manually edit the file to upgrade.",
                            name
                        ),
                    ));
                }
                if p.floats.len() != 3 {
                    return Err(upgrade_failed(
                        &p.loc,
                        format!("Didn't find 3 values for \"rgb\" \"{}\".", p.name),
                    ));
                }
                if p.floats[0] != p.floats[1] || p.floats[1] != p.floats[2] {
                    return Err(upgrade_failed(
                        &p.loc,
                        format!(
                            "Non-constant \"rgb\" value found for \"scale\" texture parameter \"{}\". Please manually edit the file to upgrade.",
                            p.name
                        ),
                    ));
                }
                found_rgb = true;
                p.param_type = "float".to_owned();
                p.name = "scale".to_owned();
                p.floats.truncate(1);
            } else {
                if found_texture {
                    return Err(upgrade_failed(
                        &p.loc,
                        format!(
                            "Two textures found for \"scale\" texture \"{}\". Please manually edit the file to upgrade.",
                            name
                        ),
                    ));
                }
                p.name = "tex".to_owned();
                found_texture = true;
            }
        }
        Ok(())
    }
}

impl<W: Write> ParserTarget for FormattingTarget<W> {
    fn option(&mut self, name: &str, value: &str, _loc: FileLoc) -> Result<()> {
        match normalize_arg(name).as_str() {
            "msereferenceimage" | "msereferenceout" => {
                writeln!(self.out, "{}Option \"{}\" \"{}\"", self.indent(0), name, value)?
            }
            _ => writeln!(self.out, "{}Option \"{}\" {}", self.indent(0), name, value)?,
        }
        Ok(())
    }

    fn identity(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}Identity", self.indent(0))?;
        Ok(())
    }

    fn translate(&mut self, dx: Float, dy: Float, dz: Float, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}Translate {} {} {}", self.indent(0), dx, dy, dz)?;
        Ok(())
    }

    fn scale(&mut self, sx: Float, sy: Float, sz: Float, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}Scale {} {} {}", self.indent(0), sx, sy, sz)?;
        Ok(())
    }

    fn rotate(
        &mut self,
        angle: Float,
        ax: Float,
        ay: Float,
        az: Float,
        _loc: FileLoc,
    ) -> Result<()> {
        writeln!(self.out, "{}Rotate {} {} {} {}", self.indent(0), angle, ax, ay, az)?;
        Ok(())
    }

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
        _loc: FileLoc,
    ) -> Result<()> {
        let indent = self.indent(0);
        writeln!(self.out, "{}LookAt {} {} {}", indent, ex, ey, ez)?;
        writeln!(self.out, "{}    {} {} {}", indent, lx, ly, lz)?;
        writeln!(self.out, "{}    {} {} {}", indent, ux, uy, uz)?;
        Ok(())
    }

    fn concat_transform(&mut self, transform: [Float; 16], _loc: FileLoc) -> Result<()> {
        let values = transform.map(|v| v.to_string()).join(" ");
        writeln!(self.out, "{}ConcatTransform [ {} ]", self.indent(0), values)?;
        Ok(())
    }

    fn transform(&mut self, transform: [Float; 16], _loc: FileLoc) -> Result<()> {
        let values = transform.map(|v| v.to_string()).join(" ");
        writeln!(self.out, "{}Transform [ {} ]", self.indent(0), values)?;
        Ok(())
    }

    fn coordinate_system(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}CoordinateSystem \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn coord_sys_transform(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}CoordSysTransform \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn active_transform_all(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ActiveTransform All", self.indent(0))?;
        Ok(())
    }

    fn active_transform_end_time(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ActiveTransform EndTime", self.indent(0))?;
        Ok(())
    }

    fn active_transform_start_time(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ActiveTransform StartTime", self.indent(0))?;
        Ok(())
    }

    fn transform_times(&mut self, start: Float, end: Float, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}TransformTimes {} {}", self.indent(0), start, end)?;
        Ok(())
    }

    fn color_space(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ColorSpace \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn pixel_filter(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        let mut extra = String::new();
        if self.upgrade {
            let xr = dict.get_float_array("xwidth")?;
            if xr.len() == 1 {
                dict.remove_float("xwidth");
                extra += &format!("{}\"float xradius\" [ {} ]\n", self.indent(1), xr[0]);
            }
            let yr = dict.get_float_array("ywidth")?;
            if yr.len() == 1 {
                dict.remove_float("ywidth");
                extra += &format!("{}\"float yradius\" [ {} ]\n", self.indent(1), yr[0]);
            }
            if name == "gaussian" {
                let alpha = dict.get_float_array("alpha")?;
                if alpha.len() == 1 {
                    dict.remove_float("alpha");
                    let sigma = 1.0 / (2.0 * alpha[0]).sqrt();
                    extra += &format!("{}\"float sigma\" [ {} ]\n", self.indent(1), sigma);
                }
            }
        }
        writeln!(self.out, "{}PixelFilter \"{}\"", self.indent(0), name)?;
        self.write_parameters(&extra, &dict)
    }

    fn film(&mut self, film_type: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let dict = self.dictionary(params)?;
        let film_type = if self.upgrade && film_type == "image" {
            "rgb"
        } else {
            film_type
        };
        writeln!(self.out, "{}Film \"{}\"", self.indent(0), film_type)?;
        self.write_parameters("", &dict)
    }

    fn sampler(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc) -> Result<()> {
        let dict = self.dictionary(params)?;
        let name = match name {
            "lowdiscrepancy" | "02sequence" if self.upgrade => "paddedsobol",
            "maxmindist" if self.upgrade => "pmj02bn",
            _ => name,
        };
        writeln!(self.out, "{}Sampler \"{}\"", self.indent(0), name)?;
        self.write_parameters("", &dict)
    }

    fn accelerator(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let dict = self.dictionary(params)?;
        writeln!(self.out, "{}Accelerator \"{}\"", self.indent(0), name)?;
        self.write_parameters("", &dict)
    }

    fn integrator(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        let mut extra = String::new();
        if self.upgrade {
            if name == "sppm" {
                dict.remove_int("imagewritefrequency");
                let iterations = dict.get_int_array("numiterations")?;
                if let Some(iterations) = iterations.first() {
                    dict.remove_int("numiterations");
                    extra += &format!(
                        "{}\"integer iterations\" [ {} ]\n",
                        self.indent(1),
                        iterations
                    );
                }
            }
            if dict.get_one_string("lightsamplestrategy", "")? == "spatial" {
                dict.remove_string("lightsamplestrategy");
                extra += &format!("{}\"string lightsamplestrategy\" \"bvh\"\n", self.indent(1));
            }
        }

        if self.upgrade && name == "directlighting" {
            writeln!(self.out, "{}Integrator \"path\"", self.indent(0))?;
            extra += &format!("{}\"integer maxdepth\" [ 1 ]\n", self.indent(1));
        } else {
            writeln!(self.out, "{}Integrator \"{}\"", self.indent(0), name)?;
        }
        self.write_parameters(&extra, &dict)
    }

    fn camera(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc) -> Result<()> {
        let mut dict = self.dictionary(params)?;
        if self.upgrade && name == "environment" {
            writeln!(
                self.out,
                "{}Camera \"spherical\" \"string mapping\" \"equirect\"",
                self.indent(0)
            )?;
        } else {
            writeln!(self.out, "{}Camera \"{}\"", self.indent(0), name)?;
        }
        if self.upgrade && name == "realistic" {
            dict.remove_bool("simpleweighting");
        }
        self.write_parameters("", &dict)
    }

    fn make_named_medium(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let dict = self.dictionary(params)?;
        writeln!(self.out, "{}MakeNamedMedium \"{}\"", self.indent(0), name)?;
        self.write_parameters("", &dict)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn medium_interface(&mut self, inside_name: &str, outside_name: &str, _loc: FileLoc)
        -> Result<()> {
        writeln!(
            self.out,
            "{}MediumInterface \"{}\" \"{}\"",
            self.indent(0),
            inside_name,
            outside_name
        )?;
        Ok(())
    }

    fn world_begin(&mut self, _loc: FileLoc) -> Result<()> {
        write!(self.out, "\n\nWorldBegin\n\n")?;
        Ok(())
    }

    fn attribute_begin(&mut self, _loc: FileLoc) -> Result<()> {
        write!(self.out, "\n{}AttributeBegin\n", self.indent(0))?;
        self.indent += 4;
        Ok(())
    }

    fn attribute_end(&mut self, _loc: FileLoc) -> Result<()> {
        self.indent = self.indent.saturating_sub(4);
        writeln!(self.out, "{}AttributeEnd", self.indent(0))?;
        Ok(())
    }

    fn attribute(&mut self, target: &str, params: ParsedParameterVector, _loc: FileLoc)
        -> Result<()> {
        let dict = self.dictionary(params)?;
        write!(self.out, "{}Attribute \"{}\" ", self.indent(0), target)?;
        match dict.params.as_slice() {
            // A single parameter stays on the directive's line.
            [p] => writeln!(self.out, "{}", p.to_definition(self.indent))?,
            _ => {
                writeln!(self.out)?;
                self.write_parameters("", &dict)?;
            }
        }
        Ok(())
    }

    fn transform_begin(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}TransformBegin", self.indent(0))?;
        self.indent += 4;
        Ok(())
    }

    fn transform_end(&mut self, _loc: FileLoc) -> Result<()> {
        self.indent = self.indent.saturating_sub(4);
        writeln!(self.out, "{}TransformEnd", self.indent(0))?;
        Ok(())
    }

    fn texture(
        &mut self,
        name: &str,
        texture_type: &str,
        tex_name: &str,
        mut params: ParsedParameterVector,
        _loc: FileLoc,
    ) -> Result<()> {
        if self.upgrade && tex_name == "scale" {
            Self::rewrite_scale_texture(name, texture_type, &mut params)?;
        }
        let mut dict = self.dictionary(params)?;

        let mut extra = String::new();
        if self.upgrade {
            if tex_name == "imagemap" {
                let trilinear = dict.get_bool_array("trilinear")?;
                if trilinear.len() == 1 {
                    dict.remove_bool("trilinear");
                    let filter = if trilinear[0] { "trilinear" } else { "bilinear" };
                    extra += &format!("{}\"string filter\" \"{}\"\n", self.indent(1), filter);
                }
            }
            if tex_name == "imagemap" || tex_name == "ptex" {
                let filename = dict.get_one_string("filename", "")?;
                if !filename.is_empty() {
                    dict.remove_string("filename");
                    extra += &format!("{}\"string imagefile\" \"{}\"\n", self.indent(1), filename);
                }

                let gamma = dict.get_one_float("gamma", 0.0)?;
                if gamma != 0.0 {
                    dict.remove_float("gamma");
                    extra +=
                        &format!("{}\"string encoding\" \"gamma {}\"\n", self.indent(1), gamma);
                } else {
                    let gamma = dict.get_bool_array("gamma")?;
                    if gamma.len() == 1 {
                        dict.remove_bool("gamma");
                        let encoding = if gamma[0] { "sRGB" } else { "linear" };
                        extra +=
                            &format!("{}\"string encoding\" \"{}\"\n", self.indent(1), encoding);
                    }
                }
            }
        }

        let texture_type = if self.upgrade && texture_type == "color" {
            "spectrum"
        } else {
            texture_type
        };
        writeln!(
            self.out,
            "{}Texture \"{}\" \"{}\" \"{}\"",
            self.indent(0),
            name,
            texture_type,
            tex_name
        )?;
        self.write_parameters(&extra, &dict)
    }

    fn material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        let mut name = name.to_owned();
        let extra = if self.upgrade {
            self.upgrade_material(&mut name, &mut dict, &loc)?
        } else {
            String::new()
        };
        writeln!(self.out, "{}Material \"{}\"", self.indent(0), name)?;
        self.write_parameters(&extra, &dict)
    }

    fn make_named_material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        writeln!(self.out, "{}MakeNamedMaterial \"{}\"", self.indent(0), name)?;
        if !self.upgrade {
            return self.write_parameters("", &dict);
        }
        let mut material_type = dict.get_one_string("type", "")?;
        let upgraded = self.upgrade_material(&mut material_type, &mut dict, &loc)?;
        dict.remove_string("type");
        let extra = format!(
            "{}\"string type\" [ \"{}\" ]\n{}",
            self.indent(1),
            material_type,
            upgraded
        );
        self.write_parameters(&extra, &dict)
    }

    fn named_material(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}NamedMaterial \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        writeln!(self.out, "{}LightSource \"{}\"", self.indent(0), name)?;

        let mut extra = String::new();
        if self.upgrade {
            let mut total_scale = 1.0;
            if !upgrade_rgb_to_scale(&mut dict, "scale", &mut total_scale) {
                return Err(upgrade_failed(
                    dict.loc("scale").unwrap_or(&loc),
                    "\"scale\" is now a \"float\" parameter to light sources. Please modify your scene file manually.",
                ));
            }
            extra += &self.upgrade_blackbody(&mut dict, &mut total_scale)?;
            dict.remove_int("nsamples");

            if !dict.get_one_string("mapname", "")?.is_empty() {
                if name == "infinite" && !upgrade_rgb_to_scale(&mut dict, "L", &mut total_scale) {
                    return Err(upgrade_failed(
                        dict.loc("L").unwrap_or(&loc),
                        "Non-constant \"L\" is no longer supported with \"mapname\" for the \"infinite\" light source. Please upgrade your scene file manually.",
                    ));
                }
            } else if name == "projection" && !upgrade_rgb_to_scale(&mut dict, "I", &mut total_scale)
            {
                return Err(upgrade_failed(
                    dict.loc("I").unwrap_or(&loc),
                    "\"I\" is no longer supported with \"mapname\" for the \"projection\" light source. Please upgrade your scene file manually.",
                ));
            }

            // After the infinite light check, which needs "mapname".
            extra += &self.upgrade_mapname(&mut dict)?;

            if total_scale != 1.0 {
                total_scale *= dict.get_one_float("scale", 1.0)?;
                dict.remove_float("scale");
                writeln!(self.out, "{}\"float scale\" [ {} ]", self.indent(1), total_scale)?;
            }
        }
        self.write_parameters(&extra, &dict)
    }

    fn area_light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        let mut dict = self.dictionary(params)?;
        let mut extra = String::new();
        let mut total_scale = 1.0;
        let mut name = name;
        if self.upgrade {
            if !upgrade_rgb_to_scale(&mut dict, "scale", &mut total_scale) {
                return Err(upgrade_failed(
                    dict.loc("scale").unwrap_or(&loc),
                    "\"scale\" is now a \"float\" parameter to light sources. Please modify your scene file manually.",
                ));
            }
            extra += &self.upgrade_blackbody(&mut dict, &mut total_scale)?;
            if name == "area" {
                name = "diffuse";
            }
            dict.remove_int("nsamples");
        }
        writeln!(self.out, "{}AreaLightSource \"{}\"", self.indent(0), name)?;
        if total_scale != 1.0 {
            writeln!(self.out, "{}\"float scale\" [ {} ]", self.indent(1), total_scale)?;
        }
        self.write_parameters(&extra, &dict)
    }

    fn shape(&mut self, name: &str, params: ParsedParameterVector, _loc: FileLoc) -> Result<()> {
        let mut dict = self.dictionary(params)?;
        writeln!(self.out, "{}Shape \"{}\"", self.indent(0), name)?;

        let mut extra = String::new();
        if self.upgrade {
            // Indices are implied for a single triangle or bilinear patch.
            let trivial_indices: &[i32] = match name {
                "trianglemesh" => &[0, 1, 2],
                "bilinearmesh" => &[0, 1, 2, 3],
                _ => &[],
            };
            if !trivial_indices.is_empty()
                && dict.get_int_array("indices")? == trivial_indices
                && dict.get_point3f_array("P")?.len() == trivial_indices.len()
            {
                dict.remove_int("indices");
            }

            if name == "loopsubdiv" {
                let levels = dict.get_int_array("nlevels")?;
                if let Some(levels) = levels.first() {
                    writeln!(self.out, "{}\"integer levels\" [ {} ]", self.indent(1), levels)?;
                    dict.remove_int("nlevels");
                }
            }
            if name == "trianglemesh" || name == "plymesh" {
                dict.remove_bool("discarddegenerateUVs");
            }
            if name == "plymesh" {
                let filename = dict.get_one_string("filename", "")?;
                if !filename.is_empty() {
                    dict.remove_string("filename");
                    writeln!(self.out, "{}\"string plyfile\" \"{}\"", self.indent(1), filename)?;
                }
            }
            if name == "trianglemesh" {
                extra += &self.upgrade_tri_mesh_uvs(&mut dict)?;
            }

            extra += &self.upgrade_material_bumpmap(&mut dict)?;
            dict.rename_parameter("Kd", "reflectance");
        }
        self.write_parameters(&extra, &dict)
    }

    fn reverse_orientation(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ReverseOrientation", self.indent(0))?;
        Ok(())
    }

    fn object_begin(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ObjectBegin \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn object_end(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ObjectEnd", self.indent(0))?;
        Ok(())
    }

    fn object_instance(&mut self, name: &str, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}ObjectInstance \"{}\"", self.indent(0), name)?;
        Ok(())
    }

    fn world_end(&mut self, _loc: FileLoc) -> Result<()> {
        writeln!(self.out, "{}WorldEnd", self.indent(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FormattingTarget;
    use crate::loading::{
        builder::BasicSceneBuilder,
        error::Error,
        paramdict::ParsedParameter,
        parser_target::{replay, Directive, FileLoc, ParsedParameterVector, ParserTarget},
    };
    use crate::options::Options;

    fn loc() -> FileLoc {
        FileLoc::new("old.pbrt", 3, 1)
    }

    fn param(ty: &str, name: &str) -> ParsedParameter {
        ParsedParameter::new(ty, name, loc())
    }

    fn upgrader() -> FormattingTarget<Vec<u8>> {
        let _ = env_logger::builder().is_test(true).try_init();
        FormattingTarget::new(Vec::new(), true)
    }

    fn output(f: FormattingTarget<Vec<u8>>) -> String {
        String::from_utf8(f.into_inner()).unwrap()
    }

    fn scene_directives() -> Vec<(Directive, FileLoc)> {
        let radius: ParsedParameterVector = vec![param("float", "radius").with_floats(&[1.0])];
        vec![
            Directive::LookAt {
                eye: [0.0, 0.0, 5.0],
                look_at: [0.0, 0.0, 0.0],
                up: [0.0, 1.0, 0.0],
            },
            Directive::Camera {
                ty: "perspective".to_owned(),
                params: vec![param("float", "fov").with_floats(&[45.0])],
            },
            Directive::WorldBegin,
            Directive::AttributeBegin,
            Directive::Translate { v: [1.0, 0.0, 0.0] },
            Directive::Shape {
                name: "sphere".to_owned(),
                params: radius,
            },
            Directive::AttributeEnd,
            Directive::WorldEnd,
        ]
        .into_iter()
        .map(|d| (d, loc()))
        .collect()
    }

    #[test]
    fn canonical_output() {
        let mut f = FormattingTarget::new(Vec::new(), false);
        replay(&mut f, scene_directives()).unwrap();
        let expected = concat!(
            "LookAt 0 0 5\n",
            "    0 0 0\n",
            "    0 1 0\n",
            "Camera \"perspective\"\n",
            "    \"float fov\" [ 45 ]\n",
            "\n\nWorldBegin\n\n",
            "\nAttributeBegin\n",
            "    Translate 1 0 0\n",
            "    Shape \"sphere\"\n",
            "        \"float radius\" [ 1 ]\n",
            "AttributeEnd\n",
            "WorldEnd\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn builder_and_formatter_see_the_same_stream() {
        let mut builder = BasicSceneBuilder::new(Options::default());
        replay(&mut builder, scene_directives()).unwrap();
        let scene = builder.take_scene().unwrap();
        assert_eq!(1, scene.shapes().len());

        let mut f = FormattingTarget::new(Vec::new(), true);
        replay(&mut f, scene_directives()).unwrap();
        assert!(output(f).contains("Shape \"sphere\""));
    }

    #[test]
    fn nested_blocks_indent() {
        let mut f = FormattingTarget::new(Vec::new(), false);
        f.attribute_begin(loc()).unwrap();
        f.transform_begin(loc()).unwrap();
        f.attribute(
            "shape",
            vec![param("float", "radius").with_floats(&[2.0])],
            loc(),
        )
        .unwrap();
        f.attribute(
            "light",
            vec![
                param("float", "scale").with_floats(&[2.0]),
                param("integer", "nsamples").with_ints(&[4]),
            ],
            loc(),
        )
        .unwrap();
        f.transform_end(loc()).unwrap();
        f.attribute_end(loc()).unwrap();
        let expected = concat!(
            "\nAttributeBegin\n",
            "    TransformBegin\n",
            "        Attribute \"shape\" \"float radius\" [ 2 ]\n",
            "        Attribute \"light\" \n",
            "            \"float scale\" [ 2 ]\n",
            "            \"integer nsamples\" [ 4 ]\n",
            "    TransformEnd\n",
            "AttributeEnd\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn plain_directives() {
        let mut f = FormattingTarget::new(Vec::new(), false);
        f.option("seed", "7", loc()).unwrap();
        f.option("mse_reference_image", "ref.exr", loc()).unwrap();
        f.object_begin("tree", loc()).unwrap();
        f.object_end(loc()).unwrap();
        f.object_instance("tree", loc()).unwrap();
        f.named_material("gold", loc()).unwrap();
        f.medium_interface("fog", "", loc()).unwrap();
        f.reverse_orientation(loc()).unwrap();
        f.active_transform_start_time(loc()).unwrap();
        let expected = concat!(
            "Option \"seed\" 7\n",
            "Option \"mse_reference_image\" \"ref.exr\"\n",
            "ObjectBegin \"tree\"\n",
            "ObjectEnd\n",
            "ObjectInstance \"tree\"\n",
            "NamedMaterial \"gold\"\n",
            "MediumInterface \"fog\" \"\"\n",
            "ReverseOrientation\n",
            "ActiveTransform StartTime\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn render_settings_are_upgraded() {
        let mut f = upgrader();
        f.film("image", vec![], loc()).unwrap();
        f.sampler("lowdiscrepancy", vec![], loc()).unwrap();
        f.sampler("maxmindist", vec![], loc()).unwrap();
        f.integrator("directlighting", vec![], loc()).unwrap();
        f.integrator(
            "sppm",
            vec![
                param("integer", "numiterations").with_ints(&[64]),
                param("integer", "imagewritefrequency").with_ints(&[8]),
            ],
            loc(),
        )
        .unwrap();
        f.camera("environment", vec![], loc()).unwrap();
        f.pixel_filter(
            "gaussian",
            vec![
                param("float", "xwidth").with_floats(&[2.0]),
                param("float", "alpha").with_floats(&[2.0]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "Film \"rgb\"\n",
            "Sampler \"paddedsobol\"\n",
            "Sampler \"pmj02bn\"\n",
            "Integrator \"path\"\n",
            "    \"integer maxdepth\" [ 1 ]\n",
            "Integrator \"sppm\"\n",
            "    \"integer iterations\" [ 64 ]\n",
            "Camera \"spherical\" \"string mapping\" \"equirect\"\n",
            "PixelFilter \"gaussian\"\n",
            "    \"float xradius\" [ 2 ]\n",
            "    \"float sigma\" [ 0.5 ]\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn without_upgrade_names_pass_through() {
        let mut f = FormattingTarget::new(Vec::new(), false);
        f.film("image", vec![], loc()).unwrap();
        f.material("matte", vec![], loc()).unwrap();
        assert_eq!("Film \"image\"\nMaterial \"matte\"\n", output(f));
    }

    #[test]
    fn textures_are_upgraded() {
        let mut f = upgrader();
        f.texture(
            "checks",
            "color",
            "imagemap",
            vec![
                param("string", "filename").with_strings(&["wood.png"]),
                param("bool", "trilinear").with_bools(&[true]),
                param("bool", "gamma").with_bools(&[false]),
            ],
            loc(),
        )
        .unwrap();
        f.texture(
            "scaled",
            "color",
            "scale",
            vec![
                param("color", "tex1").with_floats(&[0.5, 0.5, 0.5]),
                param("texture", "tex2").with_strings(&["checks"]),
            ],
            loc(),
        )
        .unwrap();
        f.texture(
            "bumps",
            "float",
            "scale",
            vec![
                param("texture", "tex1").with_strings(&["noise"]),
                param("float", "tex2").with_floats(&[0.1]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "Texture \"checks\" \"spectrum\" \"imagemap\"\n",
            "    \"string filter\" \"trilinear\"\n",
            "    \"string imagefile\" \"wood.png\"\n",
            "    \"string encoding\" \"linear\"\n",
            "Texture \"scaled\" \"spectrum\" \"scale\"\n",
            "    \"float scale\" [ 0.5 ]\n",
            "    \"texture tex\" [ \"checks\" ]\n",
            "Texture \"bumps\" \"float\" \"scale\"\n",
            "    \"texture tex\" [ \"noise\" ]\n",
            "    \"float scale\" [ 0.1 ]\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn non_constant_scale_texture_fails() {
        let mut f = upgrader();
        let result = f.texture(
            "scaled",
            "spectrum",
            "scale",
            vec![param("rgb", "tex1").with_floats(&[0.5, 0.2, 0.5])],
            loc(),
        );
        assert!(matches!(result, Err(Error::UpgradeFailed { .. })));
    }

    #[test]
    fn materials_are_upgraded() {
        let mut f = upgrader();
        f.material(
            "uber",
            vec![
                param("rgb", "Kd").with_floats(&[0.5, 0.5, 0.5]),
                param("rgb", "Ks").with_floats(&[0.0, 0.0, 0.0]),
                param("float", "roughness").with_floats(&[0.1]),
            ],
            loc(),
        )
        .unwrap();
        f.material(
            "glass",
            vec![
                param("float", "index").with_floats(&[1.5]),
                param("texture", "bumpmap").with_strings(&["bumps"]),
            ],
            loc(),
        )
        .unwrap();
        f.material("mirror", vec![], loc()).unwrap();
        f.material(
            "mix",
            vec![param("rgb", "amount").with_floats(&[0.25, 0.25, 0.25])],
            loc(),
        )
        .unwrap();
        f.make_named_material(
            "floor",
            vec![
                param("string", "type").with_strings(&["matte"]),
                param("rgb", "Kd").with_floats(&[0.2, 0.2, 0.2]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "Material \"diffuse\"\n",
            "    \"rgb reflectance\" [ 0.5 0.5 0.5 ]\n",
            "Material \"dielectric\"\n",
            "    \"float eta\" [ 1.5 ]\n",
            "    \"texture displacement\" \"bumps\"\n",
            "Material \"conductor\"\n",
            "    \"float roughness\" [ 0 ]\n",
            "    \"spectrum eta\" [ \"metal-Ag-eta\" ]\n",
            "    \"spectrum k\" [ \"metal-Ag-k\" ]\n",
            "Material \"mix\"\n",
            "    \"float amount\" [ 0.25 ]\n",
            "MakeNamedMaterial \"floor\"\n",
            "    \"string type\" [ \"diffuse\" ]\n",
            "    \"rgb reflectance\" [ 0.2 0.2 0.2 ]\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn uber_opacity() {
        let mut f = upgrader();
        f.material(
            "uber",
            vec![param("rgb", "opacity").with_floats(&[1.0, 1.0, 1.0])],
            loc(),
        )
        .unwrap();
        assert!(matches!(
            f.material(
                "uber",
                vec![param("rgb", "opacity").with_floats(&[0.5, 1.0, 1.0])],
                loc()
            ),
            Err(Error::UpgradeFailed { .. })
        ));
        assert!(matches!(
            f.material(
                "glass",
                vec![
                    param("float", "index").with_floats(&[1.5]),
                    param("float", "eta").with_floats(&[1.33]),
                ],
                loc()
            ),
            Err(Error::UpgradeFailed { .. })
        ));
    }

    #[test]
    fn lights_are_upgraded() {
        let mut f = upgrader();
        f.light_source(
            "point",
            vec![
                param("rgb", "scale").with_floats(&[2.0, 2.0, 2.0]),
                param("blackbody", "I").with_floats(&[3000.0, 2.0]),
                param("integer", "nsamples").with_ints(&[4]),
            ],
            loc(),
        )
        .unwrap();
        f.light_source(
            "infinite",
            vec![
                param("string", "mapname").with_strings(&["sky.exr"]),
                param("rgb", "L").with_floats(&[0.5, 0.5, 0.5]),
            ],
            loc(),
        )
        .unwrap();
        f.area_light_source(
            "area",
            vec![
                param("rgb", "L").with_floats(&[1.0, 1.0, 1.0]),
                param("integer", "nsamples").with_ints(&[4]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "LightSource \"point\"\n",
            "    \"float scale\" [ 4 ]\n",
            "    \"blackbody I\" [ 3000 ]\n",
            "LightSource \"infinite\"\n",
            "    \"float scale\" [ 0.5 ]\n",
            "    \"string imagefile\" \"sky.exr\"\n",
            "AreaLightSource \"diffuse\"\n",
            "    \"rgb L\" [ 1 1 1 ]\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn spectral_light_scale_fails() {
        let mut f = upgrader();
        let result = f.light_source(
            "point",
            vec![param("rgb", "scale").with_floats(&[1.0, 2.0, 3.0])],
            loc(),
        );
        assert!(matches!(result, Err(Error::UpgradeFailed { .. })));
    }

    #[test]
    fn shapes_are_upgraded() {
        let mut f = upgrader();
        f.shape(
            "trianglemesh",
            vec![
                param("integer", "indices").with_ints(&[0, 1, 2]),
                param("point3", "P").with_floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]),
                param("float", "uv").with_floats(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]),
                param("bool", "discarddegenerateUVs").with_bools(&[true]),
            ],
            loc(),
        )
        .unwrap();
        f.shape(
            "plymesh",
            vec![param("string", "filename").with_strings(&["bunny.ply"])],
            loc(),
        )
        .unwrap();
        f.shape(
            "loopsubdiv",
            vec![
                param("integer", "nlevels").with_ints(&[3]),
                param("texture", "bumpmap").with_strings(&["bumps"]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "Shape \"trianglemesh\"\n",
            "    \"point2 uv\" [ 0 0 1 0 1 1 ]\n",
            "    \"point3 P\" [ 0 0 0 1 0 0 1 1 0 ]\n",
            "Shape \"plymesh\"\n",
            "    \"string plyfile\" \"bunny.ply\"\n",
            "Shape \"loopsubdiv\"\n",
            "    \"integer levels\" [ 3 ]\n",
            "    \"texture displacement\" \"bumps\"\n",
        );
        assert_eq!(expected, output(f));
    }

    #[test]
    fn larger_meshes_keep_their_indices() {
        let mut f = upgrader();
        f.shape(
            "trianglemesh",
            vec![
                param("integer", "indices").with_ints(&[0, 1, 2, 2, 1, 3]),
                param("point2", "st").with_floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.5, 0.5]),
            ],
            loc(),
        )
        .unwrap();
        let expected = concat!(
            "Shape \"trianglemesh\"\n",
            "    \"point2 uv\" [ 0 0 1 0 0 1 1 1 \n",
            "        0.5 0.5 ]\n",
            "    \"integer indices\" [ 0 1 2 2 1 3 ]\n",
        );
        assert_eq!(expected, output(f));
    }
}
