use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    ops::Index,
};

use crate::{transform::Transform, Float};

/// Handle to a transform stored in a `TransformCache`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransformHandle(usize);

impl TransformHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Interns transforms so that equal values share one stored instance.
///
/// Transforms are only ever appended; a handle stays valid for the life of
/// the cache.
#[derive(Debug, Default)]
pub struct TransformCache {
    arena: Vec<Transform>,
    buckets: HashMap<u64, Vec<TransformHandle>>,
    lookups: usize,
    hits: usize,
}

impl TransformCache {
    pub fn new() -> TransformCache {
        Default::default()
    }

    fn digest(t: &Transform) -> u64 {
        let mut hasher = DefaultHasher::new();
        t.hash(&mut hasher);
        hasher.finish()
    }

    pub fn lookup(&mut self, t: &Transform) -> TransformHandle {
        self.lookups += 1;
        let bucket = self.buckets.entry(Self::digest(t)).or_default();
        if let Some(&h) = bucket.iter().find(|h| self.arena[h.index()] == *t) {
            self.hits += 1;
            return h;
        }
        let h = TransformHandle(self.arena.len());
        self.arena.push(*t);
        bucket.push(h);
        h
    }

    pub fn get(&self, handle: TransformHandle) -> &Transform {
        &self.arena[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// (lookups, hits)
    pub fn stats(&self) -> (usize, usize) {
        (self.lookups, self.hits)
    }
}

impl Index<TransformHandle> for TransformCache {
    type Output = Transform;

    fn index(&self, handle: TransformHandle) -> &Self::Output {
        self.get(handle)
    }
}

/// A transform that may vary over the shutter interval, given by its value
/// at the start and end times.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnimatedTransform {
    pub start_transform: TransformHandle,
    pub start_time: Float,
    pub end_transform: TransformHandle,
    pub end_time: Float,
}

impl AnimatedTransform {
    pub fn new(
        start_transform: TransformHandle,
        start_time: Float,
        end_transform: TransformHandle,
        end_time: Float,
    ) -> AnimatedTransform {
        AnimatedTransform {
            start_transform,
            start_time,
            end_transform,
            end_time,
        }
    }

    /// Interned transforms are equal exactly when their handles are.
    pub fn is_animated(&self) -> bool {
        self.start_transform != self.end_transform
    }
}

#[cfg(test)]
mod tests {
    use super::{AnimatedTransform, TransformCache};
    use crate::{
        transform::Transform,
        vecmath::{Tuple3, Vector3f},
    };

    #[test]
    fn equal_values_share_a_handle() {
        let mut cache = TransformCache::new();
        let a = cache.lookup(&Transform::translate(Vector3f::new(1.0, 2.0, 3.0)));
        let b = cache.lookup(&Transform::translate(Vector3f::new(1.0, 2.0, 3.0)));
        assert_eq!(a, b);
        assert_eq!(1, cache.len());
        assert_eq!((2, 1), cache.stats());
    }

    #[test]
    fn distinct_values_get_distinct_handles() {
        let mut cache = TransformCache::new();
        let a = cache.lookup(&Transform::default());
        let b = cache.lookup(&Transform::scale(2.0, 2.0, 2.0));
        assert_ne!(a, b);
        assert_eq!(Transform::scale(2.0, 2.0, 2.0), cache[b]);
        assert!(cache.get(a).is_identity());
    }

    #[test]
    fn signed_zero_is_one_value() {
        let mut cache = TransformCache::new();
        let a = cache.lookup(&Transform::translate(Vector3f::new(0.0, 0.0, 0.0)));
        let b = cache.lookup(&Transform::translate(Vector3f::new(-0.0, 0.0, -0.0)));
        assert_eq!(a, b);
    }

    #[test]
    fn composed_and_direct_values_intern_together() {
        let mut cache = TransformCache::new();
        let composed = Transform::translate(Vector3f::new(1.0, 0.0, 0.0))
            * Transform::translate(Vector3f::new(0.0, 1.0, 0.0));
        let direct = Transform::translate(Vector3f::new(1.0, 1.0, 0.0));
        assert_eq!(cache.lookup(&composed), cache.lookup(&direct));
    }

    #[test]
    fn animation_follows_handles() {
        let mut cache = TransformCache::new();
        let a = cache.lookup(&Transform::default());
        let b = cache.lookup(&Transform::scale(1.0, 2.0, 1.0));
        assert!(!AnimatedTransform::new(a, 0.0, a, 1.0).is_animated());
        assert!(AnimatedTransform::new(a, 0.0, b, 1.0).is_animated());
    }

    #[test]
    fn singular_transforms_intern_once() {
        let mut cache = TransformCache::new();
        let zero = Transform::from_2d([[0.0; 4]; 4]);
        assert_eq!(cache.lookup(&zero), cache.lookup(&zero));

        let flattened =
            Transform::scale(0.0, 1.0, 1.0) * Transform::rotate(45.0, &Vector3f::new(0.0, 0.0, 1.0));
        let a = cache.lookup(&flattened);
        let b = cache.lookup(&flattened);
        assert_eq!(a, b);
        assert_eq!(2, cache.len());
        assert_eq!((4, 2), cache.stats());
    }
}
