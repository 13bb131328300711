//! Scene entities: immutable records produced by terminal directives.
//!
//! Names are interned in the scene's `StringInterner` and transforms in its
//! `TransformCache`; entities hold only symbols and handles into them.

use string_interner::{symbol::SymbolU32, StringInterner};

use crate::loading::{
    paramdict::ParameterDictionary,
    parser_target::FileLoc,
    transform_cache::{AnimatedTransform, TransformHandle},
};

/// The simplest entity: a name, where it was declared, and its parameters.
/// Used directly for the film, sampler, integrator, pixel filter,
/// accelerator and materials.
#[derive(Debug, Clone)]
pub struct SceneEntity {
    pub name: SymbolU32,
    pub loc: FileLoc,
    pub parameters: ParameterDictionary,
}

impl SceneEntity {
    pub fn new(
        name: &str,
        loc: FileLoc,
        parameters: ParameterDictionary,
        string_interner: &mut StringInterner,
    ) -> Self {
        Self {
            name: string_interner.get_or_intern(name),
            loc,
            parameters,
        }
    }
}

/// Which material a shape uses: an index into the ordered material list,
/// or the name of a named material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialRef {
    Index(usize),
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ShapeSceneEntity {
    pub base: SceneEntity,
    pub render_from_object: TransformHandle,
    pub object_from_render: TransformHandle,
    pub reverse_orientation: bool,
    pub material: MaterialRef,
    /// Index into the scene's area lights, if the shape is emissive.
    pub light_index: Option<usize>,
    pub inside_medium: String,
    pub outside_medium: String,
}

/// A shape whose transform differs between the start and end times.
#[derive(Debug, Clone)]
pub struct AnimatedShapeSceneEntity {
    pub base: SceneEntity,
    pub render_from_object: AnimatedTransform,
    pub identity: TransformHandle,
    pub reverse_orientation: bool,
    pub material: MaterialRef,
    pub light_index: Option<usize>,
    pub inside_medium: String,
    pub outside_medium: String,
}

#[derive(Debug, Clone)]
pub struct CameraSceneEntity {
    pub base: SceneEntity,
    pub render_from_camera: AnimatedTransform,
    pub medium: String,
}

#[derive(Debug, Clone)]
pub struct TransformedSceneEntity {
    pub base: SceneEntity,
    pub render_from_object: AnimatedTransform,
}

impl TransformedSceneEntity {
    pub fn new(
        name: &str,
        parameters: ParameterDictionary,
        string_interner: &mut StringInterner,
        loc: FileLoc,
        render_from_object: AnimatedTransform,
    ) -> Self {
        Self {
            base: SceneEntity::new(name, loc, parameters, string_interner),
            render_from_object,
        }
    }
}

pub type MediumSceneEntity = TransformedSceneEntity;
pub type TextureSceneEntity = TransformedSceneEntity;

#[derive(Debug, Clone)]
pub struct LightSceneEntity {
    pub base: TransformedSceneEntity,
    pub medium: String,
}

impl LightSceneEntity {
    pub fn new(
        name: &str,
        parameters: ParameterDictionary,
        string_interner: &mut StringInterner,
        loc: FileLoc,
        render_from_light: AnimatedTransform,
        medium: &str,
    ) -> LightSceneEntity {
        LightSceneEntity {
            base: TransformedSceneEntity::new(
                name,
                parameters,
                string_interner,
                loc,
                render_from_light,
            ),
            medium: medium.to_owned(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InstanceTransform {
    Static(TransformHandle),
    Animated(AnimatedTransform),
}

/// One use of an object instance.
#[derive(Debug, Clone)]
pub struct InstanceSceneEntity {
    pub name: SymbolU32,
    pub loc: FileLoc,
    pub render_from_instance: InstanceTransform,
}

impl InstanceSceneEntity {
    pub fn new(
        name: &str,
        loc: FileLoc,
        string_interner: &mut StringInterner,
        render_from_instance: InstanceTransform,
    ) -> Self {
        Self {
            name: string_interner.get_or_intern(name),
            loc,
            render_from_instance,
        }
    }
}

/// The shapes between an `ObjectBegin` and its `ObjectEnd`.
#[derive(Debug, Clone)]
pub struct InstanceDefinitionSceneEntity {
    pub name: SymbolU32,
    pub loc: FileLoc,
    pub shapes: Vec<ShapeSceneEntity>,
    pub animated_shapes: Vec<AnimatedShapeSceneEntity>,
}

impl InstanceDefinitionSceneEntity {
    pub fn new(name: &str, loc: FileLoc, string_interner: &mut StringInterner) -> Self {
        Self {
            name: string_interner.get_or_intern(name),
            loc,
            shapes: Vec::new(),
            animated_shapes: Vec::new(),
        }
    }
}
