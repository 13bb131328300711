use std::{
    collections::{HashMap, HashSet},
    mem,
    ops::{Index, IndexMut},
    sync::Arc,
};

use log::{debug, error, trace, warn};

use crate::{
    colorspace::RgbColorSpace,
    loading::{
        entity::{
            AnimatedShapeSceneEntity, CameraSceneEntity, InstanceDefinitionSceneEntity,
            InstanceSceneEntity, InstanceTransform, LightSceneEntity, MaterialRef,
            MediumSceneEntity, SceneEntity, ShapeSceneEntity, TextureSceneEntity,
        },
        error::{Error, Result},
        paramdict::{ParameterDictionary, ParsedParameter},
        parser_target::{FileLoc, ParsedParameterVector, ParserTarget},
        scene::BasicScene,
        transform_cache::AnimatedTransform,
    },
    options::{Options, RenderingCoordinateSystem},
    transform::Transform,
    util::{dequote_string, normalize_arg},
    vecmath::{Point3f, Tuple3, Vector3f},
    Float,
};

/// Number of instants the CTM is tracked at: the shutter open and close.
pub const MAX_TRANSFORMS: usize = 2;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct TransformSet {
    t: [Transform; MAX_TRANSFORMS],
}

impl TransformSet {
    pub fn inverse(&self) -> TransformSet {
        let mut t_inv = TransformSet::default();
        for i in 0..MAX_TRANSFORMS {
            t_inv.t[i] = self.t[i].inverse();
        }
        t_inv
    }

    pub fn is_animated(&self) -> bool {
        (1..MAX_TRANSFORMS).any(|i| self.t[i - 1] != self.t[i])
    }
}

impl Index<usize> for TransformSet {
    type Output = Transform;

    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(index < MAX_TRANSFORMS);
        &self.t[index]
    }
}

impl IndexMut<usize> for TransformSet {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        debug_assert!(index < MAX_TRANSFORMS);
        &mut self.t[index]
    }
}

/// An `AreaLightSource` waiting to be attached to the shapes that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAreaLight {
    pub name: String,
    pub parameters: ParameterDictionary,
    pub loc: FileLoc,
}

/// Everything an `AttributeBegin`/`AttributeEnd` pair saves and restores,
/// apart from the CTM and the active transform bits which have stacks of
/// their own.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub current_inside_medium: String,
    pub current_outside_medium: String,

    pub current_material: MaterialRef,

    /// Stays set for every shape in the scope, not just the next one.
    pub area_light: Option<PendingAreaLight>,

    pub shape_attributes: ParsedParameterVector,
    pub light_attributes: ParsedParameterVector,
    pub material_attributes: ParsedParameterVector,
    pub medium_attributes: ParsedParameterVector,
    pub texture_attributes: ParsedParameterVector,
    pub reverse_orientation: bool,
    pub color_space: Arc<RgbColorSpace>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            current_inside_medium: Default::default(),
            current_outside_medium: Default::default(),
            current_material: MaterialRef::Index(0),
            area_light: None,
            shape_attributes: Default::default(),
            light_attributes: Default::default(),
            material_attributes: Default::default(),
            medium_attributes: Default::default(),
            texture_attributes: Default::default(),
            reverse_orientation: false,
            color_space: RgbColorSpace::srgb(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiState {
    Uninitialized,
    OptionsBlock,
    WorldBlock,
}

/// Which directives a given directive may follow.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Gate {
    Initialized,
    Options,
    World,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScopeKind {
    Attribute,
    Transform,
    Object,
}

impl ScopeKind {
    fn begin_directive(self) -> &'static str {
        match self {
            ScopeKind::Attribute => "AttributeBegin",
            ScopeKind::Transform => "TransformBegin",
            ScopeKind::Object => "ObjectBegin",
        }
    }

    fn end_directive(self) -> &'static str {
        match self {
            ScopeKind::Attribute => "AttributeEnd",
            ScopeKind::Transform => "TransformEnd",
            ScopeKind::Object => "ObjectEnd",
        }
    }
}

/// Called with the finished scene at `WorldEnd`.
pub type RenderFunction = Box<dyn FnOnce(&BasicScene)>;

/// Returns early with `Ok(())` when the directive isn't legal in the
/// current state; the gate has already logged why.
macro_rules! verify {
    ($self:ident, $gate:ident, $directive:literal, $loc:expr) => {
        if !$self.admit(Gate::$gate, $directive, &$loc)? {
            return Ok(());
        }
    };
}

/// The scene-description state machine. Directives arrive through
/// `ParserTarget`; the resulting `BasicScene` is handed off at `WorldEnd`.
///
/// A fatal error poisons the builder: the failing directive returns the
/// error and every later one returns `Error::Aborted`.
pub struct BasicSceneBuilder {
    scene: BasicScene,
    state: ApiState,
    aborted: bool,
    world_ended: bool,
    options: Options,

    graphics_state: GraphicsState,
    pushed_graphics_states: Vec<GraphicsState>,
    ctm: TransformSet,
    pushed_transforms: Vec<TransformSet>,
    active_transform_bits: u32,
    pushed_active_transform_bits: Vec<u32>,
    push_stack: Vec<(ScopeKind, FileLoc)>,

    named_coordinate_systems: HashMap<String, TransformSet>,
    render_from_world: TransformSet,
    transform_start_time: Float,
    transform_end_time: Float,

    named_material_names: HashSet<String>,
    float_texture_names: HashSet<String>,
    spectrum_texture_names: HashSet<String>,
    current_instance: Option<String>,

    finished: Option<BasicScene>,
    render_function: Option<RenderFunction>,
}

impl Default for BasicSceneBuilder {
    fn default() -> Self {
        Self {
            scene: BasicScene::new(),
            state: ApiState::Uninitialized,
            aborted: false,
            world_ended: false,
            options: Options::default(),
            graphics_state: GraphicsState::default(),
            pushed_graphics_states: Vec::new(),
            ctm: TransformSet::default(),
            pushed_transforms: Vec::new(),
            active_transform_bits: Self::ALL_TRANSFORM_BITS,
            pushed_active_transform_bits: Vec::new(),
            push_stack: Vec::new(),
            named_coordinate_systems: HashMap::new(),
            render_from_world: TransformSet::default(),
            transform_start_time: 0.0,
            transform_end_time: 1.0,
            named_material_names: HashSet::new(),
            float_texture_names: HashSet::new(),
            spectrum_texture_names: HashSet::new(),
            current_instance: None,
            finished: None,
            render_function: None,
        }
    }
}

impl BasicSceneBuilder {
    const START_TRANSFORM_BITS: u32 = 1 << 0;
    const END_TRANSFORM_BITS: u32 = 1 << 1;
    const ALL_TRANSFORM_BITS: u32 = (1 << MAX_TRANSFORMS) - 1;

    /// A builder ready to accept options-block directives.
    pub fn new(options: Options) -> BasicSceneBuilder {
        let mut builder = BasicSceneBuilder {
            options,
            ..Default::default()
        };
        builder.init();
        builder
    }

    pub fn init(&mut self) {
        if self.state == ApiState::Uninitialized {
            trace!("Scene builder state: Uninitialized -> OptionsBlock");
            self.state = ApiState::OptionsBlock;
        }
    }

    pub fn with_render_function(mut self, render: RenderFunction) -> Self {
        self.render_function = Some(render);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn state(&self) -> ApiState {
        self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn graphics_state(&self) -> &GraphicsState {
        &self.graphics_state
    }

    /// The scene built at `WorldEnd`, if it hasn't been taken yet.
    pub fn take_scene(&mut self) -> Option<BasicScene> {
        self.finished.take()
    }

    fn admit(&self, gate: Gate, directive: &str, loc: &FileLoc) -> Result<bool> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        if self.world_ended {
            error!(
                "{}: Scene description has already ended. \"{}\" ignored.",
                loc, directive
            );
            return Ok(false);
        }
        match (gate, self.state) {
            (_, ApiState::Uninitialized) => {
                error!(
                    "{}: Scene builder must be initialized before calling \"{}\". Ignoring.",
                    loc, directive
                );
                Ok(false)
            }
            (Gate::Options, ApiState::WorldBlock) => {
                error!(
                    "{}: Options cannot be set inside world block; \"{}\" not allowed. Ignoring.",
                    loc, directive
                );
                Ok(false)
            }
            (Gate::World, ApiState::OptionsBlock) => {
                error!(
                    "{}: Scene description must be inside world block; \"{}\" not allowed. Ignoring.",
                    loc, directive
                );
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// `ActiveTransform` is legal in any block, but not after an abort or
    /// once the scene has ended.
    fn set_active_transform_bits(&mut self, bits: u32, loc: &FileLoc) -> Result<()> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        if self.world_ended {
            error!(
                "{}: Scene description has already ended. \"ActiveTransform\" ignored.",
                loc
            );
            return Ok(());
        }
        self.active_transform_bits = bits;
        Ok(())
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        error!("{}", err);
        self.aborted = true;
        Err(err)
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => self.fail(e),
        }
    }

    fn dictionary(
        &mut self,
        params: ParsedParameterVector,
        inherited: ParsedParameterVector,
    ) -> Result<ParameterDictionary> {
        let dict = ParameterDictionary::new_with_unowned(
            params,
            inherited,
            self.graphics_state.color_space.clone(),
        );
        self.check(dict)
    }

    fn for_active_transforms(&mut self, func: impl Fn(&mut Transform)) {
        for i in 0..MAX_TRANSFORMS {
            if self.active_transform_bits & (1 << i) != 0 {
                func(&mut self.ctm[i]);
            }
        }
    }

    /// The CTM at time index `i`, expressed in rendering space.
    fn get_ctm(&self, i: usize) -> Transform {
        self.render_from_world[i] * self.ctm[i]
    }

    fn freeze(&mut self, start: Transform, end: Transform) -> AnimatedTransform {
        let cache = &mut self.scene.transform_cache;
        AnimatedTransform::new(
            cache.lookup(&start),
            self.transform_start_time,
            cache.lookup(&end),
            self.transform_end_time,
        )
    }

    fn render_from_object(&mut self) -> AnimatedTransform {
        let (start, end) = (self.get_ctm(0), self.get_ctm(1));
        self.freeze(start, end)
    }

    fn push_scope(&mut self, kind: ScopeKind, loc: FileLoc) {
        self.pushed_graphics_states.push(self.graphics_state.clone());
        self.pushed_transforms.push(self.ctm);
        self.pushed_active_transform_bits
            .push(self.active_transform_bits);
        trace!(
            "{}: {} (depth {})",
            loc,
            kind.begin_directive(),
            self.push_stack.len() + 1
        );
        self.push_stack.push((kind, loc));
    }

    /// Pops all three state stacks together. The graphics state saved by a
    /// `TransformBegin` is discarded rather than restored.
    fn pop_scope(&mut self, kind: ScopeKind, loc: FileLoc) -> Result<()> {
        let (open_kind, open_loc) = match self.push_stack.pop() {
            Some(top) => top,
            None => {
                error!(
                    "{}: Unmatched {} encountered. Ignoring it.",
                    loc,
                    kind.end_directive()
                );
                return Ok(());
            }
        };
        trace!(
            "{}: {} (depth {})",
            loc,
            kind.end_directive(),
            self.push_stack.len()
        );
        if let Some(gs) = self.pushed_graphics_states.pop() {
            if open_kind != ScopeKind::Transform {
                self.graphics_state = gs;
            }
        }
        if let Some(ctm) = self.pushed_transforms.pop() {
            self.ctm = ctm;
        }
        if let Some(bits) = self.pushed_active_transform_bits.pop() {
            self.active_transform_bits = bits;
        }

        if open_kind != kind {
            return self.fail(Error::MismatchedNesting {
                loc,
                open: open_kind.begin_directive(),
                open_loc,
                directive: kind.end_directive(),
            });
        }
        Ok(())
    }

    fn set_option(&mut self, name: &str, value: &str, loc: &FileLoc) -> Result<()> {
        let invalid = || Error::InvalidOptionValue {
            loc: loc.clone(),
            name: name.to_owned(),
            value: value.to_owned(),
        };
        let parse_bool = |value: &str| match value {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid()),
        };
        let quoted = |value: &str| dequote_string(value).map(str::to_owned).ok_or_else(invalid);

        match normalize_arg(name).as_str() {
            "disablepixeljitter" => self.options.disable_pixel_jitter = parse_bool(value)?,
            "disabletexturefiltering" => {
                self.options.disable_texture_filtering = parse_bool(value)?
            }
            "disablewavelengthjitter" => {
                self.options.disable_wavelength_jitter = parse_bool(value)?
            }
            "displacementedgescale" => {
                self.options.displacement_edge_scale =
                    value.parse::<Float>().map_err(|_| invalid())?
            }
            "msereferenceimage" => self.options.mse_reference_image = Some(quoted(value)?),
            "msereferenceout" => self.options.mse_reference_output = Some(quoted(value)?),
            "rendercoordsys" => {
                self.options.rendering_coord_system = match quoted(value)?.as_str() {
                    "camera" => RenderingCoordinateSystem::Camera,
                    "cameraworld" => RenderingCoordinateSystem::CameraWorld,
                    "world" => RenderingCoordinateSystem::World,
                    _ => return Err(invalid()),
                }
            }
            "seed" => self.options.seed = value.parse::<i32>().map_err(|_| invalid())?,
            "forcediffuse" => self.options.force_diffuse = parse_bool(value)?,
            "pixelstats" => self.options.record_pixel_statistics = parse_bool(value)?,
            "wavefront" => self.options.wavefront = parse_bool(value)?,
            _ => {
                return Err(Error::UnknownOption {
                    loc: loc.clone(),
                    name: name.to_owned(),
                })
            }
        }
        Ok(())
    }
}

/// Builds a transform from the 16 values of a `Transform` or
/// `ConcatTransform` directive.
fn transform_from_directive(m: [Float; 16]) -> Transform {
    Transform::from_2d(std::array::from_fn(|r| std::array::from_fn(|c| m[r * 4 + c])))
        .transpose()
}

impl ParserTarget for BasicSceneBuilder {
    fn option(&mut self, name: &str, value: &str, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "Option", loc);
        let result = self.set_option(name, value, &loc);
        self.check(result)
    }

    fn identity(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "Identity", loc);
        self.for_active_transforms(|t| *t = Transform::default());
        Ok(())
    }

    fn translate(&mut self, dx: Float, dy: Float, dz: Float, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "Translate", loc);
        let translation = Transform::translate(Vector3f::new(dx, dy, dz));
        self.for_active_transforms(|t| *t = *t * translation);
        Ok(())
    }

    fn scale(&mut self, sx: Float, sy: Float, sz: Float, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "Scale", loc);
        let scale = Transform::scale(sx, sy, sz);
        self.for_active_transforms(|t| *t = *t * scale);
        Ok(())
    }

    fn rotate(
        &mut self,
        angle: Float,
        ax: Float,
        ay: Float,
        az: Float,
        loc: FileLoc,
    ) -> Result<()> {
        verify!(self, Initialized, "Rotate", loc);
        let rotation = Transform::rotate(angle, &Vector3f::new(ax, ay, az));
        self.for_active_transforms(|t| *t = *t * rotation);
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
        loc: FileLoc,
    ) -> Result<()> {
        verify!(self, Initialized, "LookAt", loc);
        let look_at = Transform::look_at(
            &Point3f::new(ex, ey, ez),
            &Point3f::new(lx, ly, lz),
            &Vector3f::new(ux, uy, uz),
        );
        match look_at {
            Some(look_at) => self.for_active_transforms(|t| *t = *t * look_at),
            None => error!(
                "{}: \"up\" vector ({}, {}, {}) and viewing direction passed to LookAt are pointing in the same direction. Ignoring.",
                loc, ux, uy, uz
            ),
        }
        Ok(())
    }

    fn concat_transform(&mut self, transform: [Float; 16], loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "ConcatTransform", loc);
        let transform = transform_from_directive(transform);
        self.for_active_transforms(|t| *t = *t * transform);
        Ok(())
    }

    fn transform(&mut self, transform: [Float; 16], loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "Transform", loc);
        let transform = transform_from_directive(transform);
        self.for_active_transforms(|t| *t = transform);
        Ok(())
    }

    fn coordinate_system(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "CoordinateSystem", loc);
        self.named_coordinate_systems
            .insert(name.to_owned(), self.ctm);
        Ok(())
    }

    fn coord_sys_transform(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "CoordSysTransform", loc);
        match self.named_coordinate_systems.get(name) {
            Some(ctm) => self.ctm = *ctm,
            None => warn!("{}: Couldn't find named coordinate system \"{}\"", loc, name),
        }
        Ok(())
    }

    fn active_transform_all(&mut self, loc: FileLoc) -> Result<()> {
        self.set_active_transform_bits(Self::ALL_TRANSFORM_BITS, &loc)
    }

    fn active_transform_end_time(&mut self, loc: FileLoc) -> Result<()> {
        self.set_active_transform_bits(Self::END_TRANSFORM_BITS, &loc)
    }

    fn active_transform_start_time(&mut self, loc: FileLoc) -> Result<()> {
        self.set_active_transform_bits(Self::START_TRANSFORM_BITS, &loc)
    }

    fn transform_times(&mut self, start: Float, end: Float, loc: FileLoc) -> Result<()> {
        verify!(self, Options, "TransformTimes", loc);
        self.transform_start_time = start;
        self.transform_end_time = end;
        Ok(())
    }

    fn color_space(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, Initialized, "ColorSpace", loc);
        match RgbColorSpace::get_named(name) {
            Some(color_space) => self.graphics_state.color_space = color_space,
            None => error!("{}: {}: color space unknown", loc, name),
        }
        Ok(())
    }

    fn pixel_filter(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Options, "PixelFilter", loc);
        let dict = self.dictionary(params, Vec::new())?;
        self.scene.filter = SceneEntity::new(name, loc, dict, &mut self.scene.string_interner);
        Ok(())
    }

    fn film(&mut self, film_type: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Options, "Film", loc);
        let dict = self.dictionary(params, Vec::new())?;
        self.scene.film = SceneEntity::new(film_type, loc, dict, &mut self.scene.string_interner);
        Ok(())
    }

    fn sampler(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()> {
        verify!(self, Options, "Sampler", loc);
        let dict = self.dictionary(params, Vec::new())?;
        self.scene.sampler = SceneEntity::new(name, loc, dict, &mut self.scene.string_interner);
        Ok(())
    }

    fn accelerator(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Options, "Accelerator", loc);
        let dict = self.dictionary(params, Vec::new())?;
        self.scene.accelerator =
            SceneEntity::new(name, loc, dict, &mut self.scene.string_interner);
        Ok(())
    }

    fn integrator(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Options, "Integrator", loc);
        let dict = self.dictionary(params, Vec::new())?;
        self.scene.integrator =
            SceneEntity::new(name, loc, dict, &mut self.scene.string_interner);
        Ok(())
    }

    fn camera(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()> {
        verify!(self, Options, "Camera", loc);
        let dict = self.dictionary(params, Vec::new())?;

        let camera_from_world = self.ctm;
        let world_from_camera = camera_from_world.inverse();
        self.named_coordinate_systems
            .insert("camera".to_owned(), world_from_camera);

        for i in 0..MAX_TRANSFORMS {
            self.render_from_world[i] = match self.options.rendering_coord_system {
                RenderingCoordinateSystem::CameraWorld => {
                    let p_camera = world_from_camera[i].apply(&Point3f::ORIGIN);
                    Transform::translate(-Vector3f::from(p_camera))
                }
                RenderingCoordinateSystem::Camera => camera_from_world[i],
                RenderingCoordinateSystem::World => Transform::default(),
            };
        }
        let world_from_render = self.render_from_world.inverse();
        let render_from_camera = self.freeze(
            (camera_from_world[0] * world_from_render[0]).inverse(),
            (camera_from_world[1] * world_from_render[1]).inverse(),
        );

        self.scene.camera = CameraSceneEntity {
            base: SceneEntity::new(name, loc, dict, &mut self.scene.string_interner),
            render_from_camera,
            medium: self.graphics_state.current_outside_medium.clone(),
        };
        Ok(())
    }

    fn make_named_medium(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Initialized, "MakeNamedMedium", loc);
        if self.scene.media.contains_key(name) {
            return self.fail(Error::NamedMediumRedefined {
                loc,
                name: name.to_owned(),
            });
        }
        let inherited = self.graphics_state.medium_attributes.clone();
        let dict = self.dictionary(params, inherited)?;
        if self.ctm.is_animated() {
            warn!(
                "{}: Animated transformations set; ignoring for \"{}\" and using the start transform only",
                loc, name
            );
        }
        let render_from_medium = self.get_ctm(0);
        let render_from_medium = self.freeze(render_from_medium, render_from_medium);
        let medium = MediumSceneEntity::new(
            name,
            dict,
            &mut self.scene.string_interner,
            loc,
            render_from_medium,
        );
        self.scene.media.insert(name.to_owned(), medium);
        Ok(())
    }

    fn medium_interface(&mut self, inside_name: &str, outside_name: &str, loc: FileLoc)
        -> Result<()> {
        verify!(self, Initialized, "MediumInterface", loc);
        self.graphics_state.current_inside_medium = inside_name.to_owned();
        self.graphics_state.current_outside_medium = outside_name.to_owned();
        Ok(())
    }

    fn world_begin(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, Options, "WorldBegin", loc);
        trace!("{}: Scene builder state: OptionsBlock -> WorldBlock", loc);
        self.state = ApiState::WorldBlock;
        for i in 0..MAX_TRANSFORMS {
            self.ctm[i] = Transform::default();
        }
        self.active_transform_bits = Self::ALL_TRANSFORM_BITS;
        self.named_coordinate_systems
            .insert("world".to_owned(), self.ctm);
        Ok(())
    }

    fn attribute_begin(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "AttributeBegin", loc);
        self.push_scope(ScopeKind::Attribute, loc);
        Ok(())
    }

    fn attribute_end(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "AttributeEnd", loc);
        self.pop_scope(ScopeKind::Attribute, loc)
    }

    fn attribute(&mut self, target: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, Initialized, "Attribute", loc);
        let color_space = self.graphics_state.color_space.clone();
        let attributes = match target {
            "shape" => &mut self.graphics_state.shape_attributes,
            "light" => &mut self.graphics_state.light_attributes,
            "material" => &mut self.graphics_state.material_attributes,
            "medium" => &mut self.graphics_state.medium_attributes,
            "texture" => &mut self.graphics_state.texture_attributes,
            _ => {
                return self.fail(Error::UnknownAttributeTarget {
                    loc,
                    target: target.to_owned(),
                })
            }
        };
        for mut p in params {
            p.may_be_unused = true;
            p.color_space = Some(color_space.clone());
            attributes.push(p);
        }
        Ok(())
    }

    fn transform_begin(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "TransformBegin", loc);
        self.push_scope(ScopeKind::Transform, loc);
        Ok(())
    }

    fn transform_end(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "TransformEnd", loc);
        self.pop_scope(ScopeKind::Transform, loc)
    }

    fn texture(
        &mut self,
        name: &str,
        texture_type: &str,
        tex_name: &str,
        params: ParsedParameterVector,
        loc: FileLoc,
    ) -> Result<()> {
        verify!(self, World, "Texture", loc);
        let inherited = self.graphics_state.texture_attributes.clone();
        let dict = self.dictionary(params, inherited)?;

        let names = match texture_type {
            "float" => &mut self.float_texture_names,
            "spectrum" => &mut self.spectrum_texture_names,
            _ => {
                return self.fail(Error::UnknownTextureType {
                    loc,
                    ty: texture_type.to_owned(),
                })
            }
        };
        if !names.insert(name.to_owned()) {
            return self.fail(Error::TextureRedefined {
                loc,
                name: name.to_owned(),
            });
        }

        let render_from_texture = self.render_from_object();
        let texture = TextureSceneEntity::new(
            tex_name,
            dict,
            &mut self.scene.string_interner,
            loc,
            render_from_texture,
        );
        let textures = if texture_type == "float" {
            &mut self.scene.float_textures
        } else {
            &mut self.scene.spectrum_textures
        };
        textures.push((name.to_owned(), texture));
        Ok(())
    }

    fn material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, World, "Material", loc);
        let inherited = self.graphics_state.material_attributes.clone();
        let dict = self.dictionary(params, inherited)?;
        self.scene
            .materials
            .push(SceneEntity::new(name, loc, dict, &mut self.scene.string_interner));
        self.graphics_state.current_material = MaterialRef::Index(self.scene.materials.len() - 1);
        Ok(())
    }

    fn make_named_material(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, World, "MakeNamedMaterial", loc);
        let inherited = self.graphics_state.material_attributes.clone();
        let dict = self.dictionary(params, inherited)?;
        if !self.named_material_names.insert(name.to_owned()) {
            return self.fail(Error::NamedMaterialRedefined {
                loc,
                name: name.to_owned(),
            });
        }
        // The material's type comes from its "string type" parameter.
        let entity = SceneEntity::new("", loc, dict, &mut self.scene.string_interner);
        self.scene.named_materials.push((name.to_owned(), entity));
        Ok(())
    }

    fn named_material(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, World, "NamedMaterial", loc);
        self.graphics_state.current_material = MaterialRef::Named(name.to_owned());
        Ok(())
    }

    fn light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, World, "LightSource", loc);
        let inherited = self.graphics_state.light_attributes.clone();
        let dict = self.dictionary(params, inherited)?;
        let render_from_light = self.render_from_object();
        let light = LightSceneEntity::new(
            name,
            dict,
            &mut self.scene.string_interner,
            loc,
            render_from_light,
            &self.graphics_state.current_outside_medium,
        );
        self.scene.lights.push(light);
        Ok(())
    }

    fn area_light_source(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc)
        -> Result<()> {
        verify!(self, World, "AreaLightSource", loc);
        let inherited = self.graphics_state.light_attributes.clone();
        let parameters = self.dictionary(params, inherited)?;
        self.graphics_state.area_light = Some(PendingAreaLight {
            name: name.to_owned(),
            parameters,
            loc,
        });
        Ok(())
    }

    fn shape(&mut self, name: &str, params: ParsedParameterVector, loc: FileLoc) -> Result<()> {
        verify!(self, World, "Shape", loc);
        let inherited = self.graphics_state.shape_attributes.clone();
        let dict = self.dictionary(params, inherited)?;

        let light_index = match &self.graphics_state.area_light {
            Some(area_light) => {
                if self.current_instance.is_some() {
                    warn!("{}: Area lights not supported with object instancing", loc);
                }
                self.scene.area_lights.push(SceneEntity::new(
                    &area_light.name,
                    area_light.loc.clone(),
                    area_light.parameters.clone(),
                    &mut self.scene.string_interner,
                ));
                Some(self.scene.area_lights.len() - 1)
            }
            None => None,
        };

        if self.ctm.is_animated() {
            let render_from_object = self.render_from_object();
            let identity = self.scene.transform_cache.lookup(&Transform::default());
            let gs = &self.graphics_state;
            let shape = AnimatedShapeSceneEntity {
                base: SceneEntity::new(name, loc, dict, &mut self.scene.string_interner),
                render_from_object,
                identity,
                reverse_orientation: gs.reverse_orientation,
                material: gs.current_material.clone(),
                light_index,
                inside_medium: gs.current_inside_medium.clone(),
                outside_medium: gs.current_outside_medium.clone(),
            };
            match &self.current_instance {
                Some(instance) => {
                    if let Some(definition) = self.scene.instance_definitions.get_mut(instance) {
                        definition.animated_shapes.push(shape);
                    }
                }
                None => self.scene.animated_shapes.push(shape),
            }
        } else {
            let render_from_object = self.get_ctm(0);
            let object_from_render = render_from_object.inverse();
            let cache = &mut self.scene.transform_cache;
            let render_from_object = cache.lookup(&render_from_object);
            let object_from_render = cache.lookup(&object_from_render);
            let gs = &self.graphics_state;
            let shape = ShapeSceneEntity {
                base: SceneEntity::new(name, loc, dict, &mut self.scene.string_interner),
                render_from_object,
                object_from_render,
                reverse_orientation: gs.reverse_orientation,
                material: gs.current_material.clone(),
                light_index,
                inside_medium: gs.current_inside_medium.clone(),
                outside_medium: gs.current_outside_medium.clone(),
            };
            match &self.current_instance {
                Some(instance) => {
                    if let Some(definition) = self.scene.instance_definitions.get_mut(instance) {
                        definition.shapes.push(shape);
                    }
                }
                None => self.scene.shapes.push(shape),
            }
        }
        Ok(())
    }

    fn reverse_orientation(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "ReverseOrientation", loc);
        self.graphics_state.reverse_orientation = !self.graphics_state.reverse_orientation;
        Ok(())
    }

    fn object_begin(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, World, "ObjectBegin", loc);
        self.push_scope(ScopeKind::Object, loc.clone());

        if self.current_instance.is_some() {
            return self.fail(Error::NestedObjectDefinition { loc });
        }
        if self.scene.instance_definitions.contains_key(name) {
            return self.fail(Error::ObjectRedefined {
                loc,
                name: name.to_owned(),
            });
        }

        let mut name_param = ParsedParameter::new("string", "name", loc.clone()).with_strings(&[name]);
        name_param.may_be_unused = true;
        self.graphics_state.shape_attributes.push(name_param);

        let definition =
            InstanceDefinitionSceneEntity::new(name, loc, &mut self.scene.string_interner);
        self.scene
            .instance_definitions
            .insert(name.to_owned(), definition);
        self.current_instance = Some(name.to_owned());
        Ok(())
    }

    fn object_end(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "ObjectEnd", loc);
        if self.current_instance.take().is_none() {
            return self.fail(Error::ObjectEndOutsideDefinition { loc });
        }
        self.pop_scope(ScopeKind::Object, loc)
    }

    fn object_instance(&mut self, name: &str, loc: FileLoc) -> Result<()> {
        verify!(self, World, "ObjectInstance", loc);
        if self.current_instance.is_some() {
            return self.fail(Error::ObjectInstanceInsideDefinition { loc });
        }

        let world_from_render = self.render_from_world.inverse();
        let start = self.get_ctm(0) * world_from_render[0];
        let render_from_instance = if self.ctm.is_animated() {
            let end = self.get_ctm(1) * world_from_render[1];
            InstanceTransform::Animated(self.freeze(start, end))
        } else {
            InstanceTransform::Static(self.scene.transform_cache.lookup(&start))
        };

        let instance = InstanceSceneEntity::new(
            name,
            loc,
            &mut self.scene.string_interner,
            render_from_instance,
        );
        self.scene.instances.push(instance);
        Ok(())
    }

    fn world_end(&mut self, loc: FileLoc) -> Result<()> {
        verify!(self, World, "WorldEnd", loc);
        while let Some((kind, open_loc)) = self.push_stack.pop() {
            warn!(
                "{}: Missing end to {} from {}",
                loc,
                kind.begin_directive(),
                open_loc
            );
            self.pushed_graphics_states.pop();
            self.pushed_transforms.pop();
            self.pushed_active_transform_bits.pop();
        }
        if let Some(instance) = self.current_instance.take() {
            warn!("{}: Missing ObjectEnd for object \"{}\"", loc, instance);
        }

        let (lookups, hits) = self.scene.transform_cache.stats();
        debug!(
            "Transform cache: {} lookups, {} hits ({:.1}%), {} transforms stored",
            lookups,
            hits,
            100.0 * hits as f64 / lookups.max(1) as f64,
            self.scene.transform_cache.len()
        );

        let mut scene = mem::replace(&mut self.scene, BasicScene::new());
        scene.options = self.options.clone();
        if let Some(render) = self.render_function.take() {
            render(&scene);
        }
        self.finished = Some(scene);
        self.world_ended = true;
        trace!("{}: Scene description ended", loc);
        Ok(())
    }
}
