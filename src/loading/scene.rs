use std::collections::HashMap;

use string_interner::{symbol::SymbolU32, StringInterner};

use crate::{
    loading::{
        entity::{
            AnimatedShapeSceneEntity, CameraSceneEntity, InstanceDefinitionSceneEntity,
            InstanceSceneEntity, LightSceneEntity, MediumSceneEntity, SceneEntity,
            ShapeSceneEntity, TextureSceneEntity,
        },
        error::{Error, Result},
        paramdict::{NamedTextures, ParameterDictionary, TextureParameterDictionary},
        parser_target::FileLoc,
        transform_cache::{AnimatedTransform, TransformCache, TransformHandle},
    },
    options::Options,
    transform::Transform,
};

/// The completed scene description handed to the render driver at
/// `WorldEnd`. Everything here is read-only; entities refer to names and
/// transforms owned by the scene's interners.
#[derive(Debug)]
pub struct BasicScene {
    pub(super) string_interner: StringInterner,
    pub(super) transform_cache: TransformCache,
    pub(super) options: Options,

    pub(super) camera: CameraSceneEntity,
    pub(super) film: SceneEntity,
    pub(super) sampler: SceneEntity,
    pub(super) filter: SceneEntity,
    pub(super) integrator: SceneEntity,
    pub(super) accelerator: SceneEntity,

    pub(super) materials: Vec<SceneEntity>,
    pub(super) named_materials: Vec<(String, SceneEntity)>,
    pub(super) media: HashMap<String, MediumSceneEntity>,
    pub(super) float_textures: Vec<(String, TextureSceneEntity)>,
    pub(super) spectrum_textures: Vec<(String, TextureSceneEntity)>,
    pub(super) lights: Vec<LightSceneEntity>,
    pub(super) area_lights: Vec<SceneEntity>,
    pub(super) shapes: Vec<ShapeSceneEntity>,
    pub(super) animated_shapes: Vec<AnimatedShapeSceneEntity>,
    pub(super) instance_definitions: HashMap<String, InstanceDefinitionSceneEntity>,
    pub(super) instances: Vec<InstanceSceneEntity>,
}

/// Builds a material of one type from its parameters. Named materials
/// created so far are passed along so that e.g. a "mix" material can refer
/// to them.
pub type MaterialFactory<F, S, M> = Box<
    dyn Fn(&mut TextureParameterDictionary<'_, F, S>, &HashMap<String, M>, &FileLoc) -> Result<M>,
>;

/// Material constructors keyed by material type name.
pub struct MaterialRegistry<F, S, M> {
    factories: HashMap<String, MaterialFactory<F, S, M>>,
}

impl<F, S, M> Default for MaterialRegistry<F, S, M> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<F: Clone, S: Clone, M> MaterialRegistry<F, S, M> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&mut self, name: &str, factory: MaterialFactory<F, S, M>) -> &mut Self {
        self.factories.insert(name.to_owned(), factory);
        self
    }

    pub fn create(
        &self,
        name: &str,
        parameters: &mut TextureParameterDictionary<'_, F, S>,
        named_materials: &HashMap<String, M>,
        loc: &FileLoc,
    ) -> Result<M> {
        let factory = self.factories.get(name).ok_or_else(|| Error::UnknownMaterial {
            loc: loc.clone(),
            name: name.to_owned(),
        })?;
        factory(parameters, named_materials, loc)
    }
}

impl BasicScene {
    /// An empty scene holding the defaults a description starts from: a
    /// perspective camera at the origin, a gaussian filter, an rgb film, a
    /// zsobol sampler, the volpath integrator, a bvh and a single "diffuse"
    /// material at index 0.
    pub(super) fn new() -> BasicScene {
        let mut string_interner: StringInterner = StringInterner::default();
        let mut transform_cache = TransformCache::new();
        let identity = transform_cache.lookup(&Transform::default());
        let mut default_entity = |name: &str| {
            SceneEntity::new(
                name,
                FileLoc::default(),
                ParameterDictionary::default(),
                &mut string_interner,
            )
        };

        let camera = CameraSceneEntity {
            base: default_entity("perspective"),
            render_from_camera: AnimatedTransform::new(identity, 0.0, identity, 1.0),
            medium: String::new(),
        };
        let film = default_entity("rgb");
        let sampler = default_entity("zsobol");
        let filter = default_entity("gaussian");
        let integrator = default_entity("volpath");
        let accelerator = default_entity("bvh");
        let materials = vec![default_entity("diffuse")];

        BasicScene {
            string_interner,
            transform_cache,
            options: Options::default(),
            camera,
            film,
            sampler,
            filter,
            integrator,
            accelerator,
            materials,
            named_materials: Vec::new(),
            media: HashMap::new(),
            float_textures: Vec::new(),
            spectrum_textures: Vec::new(),
            lights: Vec::new(),
            area_lights: Vec::new(),
            shapes: Vec::new(),
            animated_shapes: Vec::new(),
            instance_definitions: HashMap::new(),
            instances: Vec::new(),
        }
    }

    /// Resolves an entity or instance name.
    pub fn name(&self, symbol: SymbolU32) -> &str {
        self.string_interner.resolve(symbol).unwrap_or_default()
    }

    pub fn transform(&self, handle: TransformHandle) -> &Transform {
        self.transform_cache.get(handle)
    }

    pub fn transform_cache(&self) -> &TransformCache {
        &self.transform_cache
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn camera(&self) -> &CameraSceneEntity {
        &self.camera
    }

    pub fn film(&self) -> &SceneEntity {
        &self.film
    }

    pub fn sampler(&self) -> &SceneEntity {
        &self.sampler
    }

    pub fn filter(&self) -> &SceneEntity {
        &self.filter
    }

    pub fn integrator(&self) -> &SceneEntity {
        &self.integrator
    }

    pub fn accelerator(&self) -> &SceneEntity {
        &self.accelerator
    }

    pub fn materials(&self) -> &[SceneEntity] {
        &self.materials
    }

    pub fn named_materials(&self) -> &[(String, SceneEntity)] {
        &self.named_materials
    }

    pub fn media(&self) -> &HashMap<String, MediumSceneEntity> {
        &self.media
    }

    pub fn float_textures(&self) -> &[(String, TextureSceneEntity)] {
        &self.float_textures
    }

    pub fn spectrum_textures(&self) -> &[(String, TextureSceneEntity)] {
        &self.spectrum_textures
    }

    pub fn lights(&self) -> &[LightSceneEntity] {
        &self.lights
    }

    pub fn area_lights(&self) -> &[SceneEntity] {
        &self.area_lights
    }

    pub fn shapes(&self) -> &[ShapeSceneEntity] {
        &self.shapes
    }

    pub fn animated_shapes(&self) -> &[AnimatedShapeSceneEntity] {
        &self.animated_shapes
    }

    pub fn instance_definitions(&self) -> &HashMap<String, InstanceDefinitionSceneEntity> {
        &self.instance_definitions
    }

    pub fn instances(&self) -> &[InstanceSceneEntity] {
        &self.instances
    }

    /// Creates every named material and then every material in the ordered
    /// list, in declaration order. A named material's type comes from its
    /// `"string type"` parameter; an ordered material's from its name.
    pub fn create_materials<F: Clone, S: Clone, M>(
        &self,
        textures: &NamedTextures<F, S>,
        registry: &MaterialRegistry<F, S, M>,
    ) -> Result<(HashMap<String, M>, Vec<M>)> {
        let mut named_materials_out = HashMap::new();
        for (name, mtl) in &self.named_materials {
            if named_materials_out.contains_key(name) {
                return Err(Error::NamedMaterialRedefined {
                    loc: mtl.loc.clone(),
                    name: name.clone(),
                });
            }
            let mut tex_dict = TextureParameterDictionary::new(mtl.parameters.clone(), textures);
            let ty = tex_dict.get_one_string("type", "")?;
            if ty.is_empty() {
                return Err(Error::MissingMaterialType {
                    loc: mtl.loc.clone(),
                    name: name.clone(),
                });
            }
            let m = registry.create(&ty, &mut tex_dict, &named_materials_out, &mtl.loc)?;
            named_materials_out.insert(name.clone(), m);
        }

        let mut materials_out = Vec::with_capacity(self.materials.len());
        for mtl in &self.materials {
            let mut tex_dict = TextureParameterDictionary::new(mtl.parameters.clone(), textures);
            let m = registry.create(
                self.name(mtl.name),
                &mut tex_dict,
                &named_materials_out,
                &mtl.loc,
            )?;
            materials_out.push(m);
        }

        Ok((named_materials_out, materials_out))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use itertools::Itertools;

    use super::{BasicScene, MaterialRegistry};
    use crate::loading::{
        builder::BasicSceneBuilder,
        error::{Error, Result},
        paramdict::{
            NamedTextures, ParsedParameter, SpectrumTextureParam, TextureParameterDictionary,
        },
        parser_target::{FileLoc, ParsedParameterVector, ParserTarget},
    };
    use crate::options::Options;

    type Params<'a> = TextureParameterDictionary<'a, String, String>;

    fn loc() -> FileLoc {
        FileLoc::new("materials.pbrt", 1, 1)
    }

    fn typed(ty: &str) -> ParsedParameterVector {
        vec![ParsedParameter::new("string", "type", loc()).with_strings(&[ty])]
    }

    fn conductor(_: &mut Params, _: &HashMap<String, String>, _: &FileLoc) -> Result<String> {
        Ok("conductor".to_owned())
    }

    fn diffuse(params: &mut Params, _: &HashMap<String, String>, _: &FileLoc) -> Result<String> {
        Ok(match params.get_spectrum_texture_or_none("reflectance")? {
            Some(SpectrumTextureParam::Texture(tex)) => format!("diffuse({})", tex),
            _ => "diffuse".to_owned(),
        })
    }

    fn mix(params: &mut Params, named: &HashMap<String, String>, loc: &FileLoc) -> Result<String> {
        let names = params.get_string_array("materials")?;
        let parts: Vec<&String> = names
            .iter()
            .map(|n| {
                named.get(n).ok_or_else(|| Error::UnknownMaterial {
                    loc: loc.clone(),
                    name: n.clone(),
                })
            })
            .collect::<Result<_>>()?;
        Ok(format!("mix({})", parts.iter().join(", ")))
    }

    fn registry() -> MaterialRegistry<String, String, String> {
        let mut registry = MaterialRegistry::new();
        registry
            .register("conductor", Box::new(conductor))
            .register("diffuse", Box::new(diffuse))
            .register("mix", Box::new(mix));
        registry
    }

    fn textures() -> NamedTextures<String, String> {
        let mut textures = NamedTextures::default();
        textures
            .spectrum_textures
            .insert("checks".to_owned(), "checker".to_owned());
        textures
    }

    fn scene(build: impl FnOnce(&mut BasicSceneBuilder)) -> BasicScene {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut builder = BasicSceneBuilder::new(Options::default());
        builder.world_begin(loc()).unwrap();
        build(&mut builder);
        builder.world_end(loc()).unwrap();
        builder.take_scene().unwrap()
    }

    #[test]
    fn named_materials_then_ordered_materials() {
        let scene = scene(|b| {
            b.make_named_material("gold", typed("conductor"), loc()).unwrap();
            let mut blend = typed("mix");
            blend.push(
                ParsedParameter::new("string", "materials", loc()).with_strings(&["gold", "gold"]),
            );
            b.make_named_material("blend", blend, loc()).unwrap();
            b.material(
                "diffuse",
                vec![ParsedParameter::new("texture", "reflectance", loc())
                    .with_strings(&["checks"])],
                loc(),
            )
            .unwrap();
        });

        let (named, materials) = scene.create_materials(&textures(), &registry()).unwrap();
        assert_eq!("conductor", named["gold"]);
        assert_eq!("mix(conductor, conductor)", named["blend"]);
        // The default material comes first.
        assert_eq!(vec!["diffuse", "diffuse(checker)"], materials);
    }

    #[test]
    fn named_materials_only_see_earlier_definitions() {
        let scene = scene(|b| {
            let mut blend = typed("mix");
            blend.push(ParsedParameter::new("string", "materials", loc()).with_strings(&["gold"]));
            b.make_named_material("blend", blend, loc()).unwrap();
            b.make_named_material("gold", typed("conductor"), loc()).unwrap();
        });
        let result = scene.create_materials(&textures(), &registry());
        assert!(matches!(result, Err(Error::UnknownMaterial { name, .. }) if name == "gold"));
    }

    #[test]
    fn named_material_needs_a_type() {
        let scene = scene(|b| {
            b.make_named_material("gold", vec![], loc()).unwrap();
        });
        let result = scene.create_materials(&textures(), &registry());
        assert!(matches!(result, Err(Error::MissingMaterialType { name, .. }) if name == "gold"));
    }

    #[test]
    fn unregistered_material_type() {
        let scene = scene(|b| {
            b.material("plastic", vec![], loc()).unwrap();
        });
        let result = scene.create_materials(&textures(), &registry());
        assert!(matches!(result, Err(Error::UnknownMaterial { name, .. }) if name == "plastic"));
    }

    #[test]
    fn missing_texture_is_an_error() {
        let scene = scene(|b| {
            b.material(
                "diffuse",
                vec![ParsedParameter::new("texture", "reflectance", loc()).with_strings(&["wood"])],
                loc(),
            )
            .unwrap();
        });
        let result = scene.create_materials(&textures(), &registry());
        assert!(matches!(result, Err(Error::TextureNotFound { name, .. }) if name == "wood"));
    }
}
