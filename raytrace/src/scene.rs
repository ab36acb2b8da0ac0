use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::{Geometry, Hit, Instance, Intersect, Ray};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u32);

impl SceneId {
    fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);

        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u32);

impl GeometryId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Collection of instances (and geometries placed without any instance)
/// queried together.
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    label: String,
    instances: FxHashMap<InstanceId, Instance>,
    geometries: FxHashMap<GeometryId, Arc<Geometry>>,
    next_id: u32,
}

impl Scene {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: SceneId::next(),
            label: label.into(),
            instances: Default::default(),
            geometries: Default::default(),
            next_id: 0,
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn debug_label(&self) -> &str {
        &self.label
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;

        self.next_id += 1;
        id
    }

    pub fn attach_instance(&mut self, mut instance: Instance) -> InstanceId {
        let id = InstanceId(self.next_id());

        log::trace!(
            "Scene `{}`: attaching instance `{}` as {}",
            self.label,
            instance.debug_label(),
            id.0
        );

        instance.set_scene(Some(self.id));
        self.instances.insert(id, instance);

        id
    }

    pub fn detach_instance(&mut self, id: InstanceId) -> Option<Instance> {
        let mut instance = self.instances.remove(&id)?;

        instance.set_scene(None);

        Some(instance)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub fn instances(
        &self,
    ) -> impl Iterator<Item = (InstanceId, &Instance)> + '_ {
        self.instances.iter().map(|(id, instance)| (*id, instance))
    }

    /// Places geometry into the scene as-is, i.e. with identity transform.
    pub fn attach_geometry(&mut self, geometry: Arc<Geometry>) -> GeometryId {
        let id = GeometryId(self.next_id());

        log::trace!(
            "Scene `{}`: attaching geometry `{}` as {}",
            self.label,
            geometry.debug_label(),
            id.0
        );

        self.geometries.insert(id, geometry);

        id
    }

    pub fn detach_geometry(&mut self, id: GeometryId) -> Option<Arc<Geometry>> {
        self.geometries.remove(&id)
    }

    pub fn geometries(
        &self,
    ) -> impl Iterator<Item = (GeometryId, &Arc<Geometry>)> + '_ {
        self.geometries.iter().map(|(id, geometry)| (*id, geometry))
    }

    /// Nothing to prepare at the moment, since geometries get committed on
    /// their own and instances are queried one by one.
    pub fn commit(&mut self) {
        log::trace!(
            "Scene `{}` committed; instances={}, geometries={}",
            self.label,
            self.instances.len(),
            self.geometries.len()
        );
    }
}

impl Intersect for Scene {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<Hit<'a>> {
        let mut nearest = None;

        // Every hit shortens the ray, so the last one found is the nearest
        for geometry in self.geometries.values() {
            if let Some(hit) = geometry.intersect(ray, None) {
                nearest = Some(hit);
            }
        }

        for instance in self.instances.values() {
            if let Some(hit) = Intersect::intersect(instance, ray) {
                nearest = Some(hit);
            }
        }

        nearest
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec3, Mat4, Vec3};

    use super::*;
    use crate::test_utils::triangle_buffers;
    use crate::{BuildConfig, SequentialExecutor};

    fn geometry(label: &str, offset: Vec3) -> Arc<Geometry> {
        let mut geometry = Geometry::new(label);
        let triangle = [Vec3::ZERO, Vec3::X, Vec3::Y].map(|v| v + offset);

        for buffer in triangle_buffers(&[triangle]) {
            geometry.set_buffer(buffer);
        }

        geometry.commit(&SequentialExecutor, None, &BuildConfig::default());

        Arc::new(geometry)
    }

    fn ray() -> Ray {
        Ray::new(vec3(0.25, 0.25, 1.0), -Vec3::Z)
    }

    #[test]
    fn ids_are_unique() {
        let a = Scene::new("a");
        let b = Scene::new("b");

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn attach_and_detach_instance() {
        let mut target = Scene::new("test");
        let instance = Instance::new("a", geometry("a", Vec3::ZERO));
        let id = target.attach_instance(instance);

        assert_eq!(Some(target.id()), target.instance(id).unwrap().scene());
        assert_eq!(1, target.instances().count());

        let instance = target.detach_instance(id).unwrap();

        assert!(instance.scene().is_none());
        assert!(target.detach_instance(id).is_none());
        assert_eq!(0, target.instances().count());
    }

    #[test]
    fn nearest_hit() {
        let mut target = Scene::new("test");

        // Same triangle placed at z = 0 (directly) and z = -1 / z = -2
        // (through instances)
        let lower = geometry("lower", -Vec3::Z);

        target.attach_instance(Instance::new("lower", lower.clone()));
        target.attach_geometry(geometry("upper", Vec3::ZERO));
        target.attach_instance(Instance::new(
            "lowest",
            geometry("lowest", -2.0 * Vec3::Z),
        ));

        target.commit();

        let hit = target.intersect(&mut ray()).unwrap();

        assert_relative_eq!(1.0, hit.t_far);
        assert_eq!("upper", hit.geometry.debug_label());
        assert!(hit.instance.is_none());

        // Detaching the upper geometry uncovers the instances
        let (upper_id, _) = target.geometries().next().unwrap();

        target.detach_geometry(upper_id).unwrap();

        let hit = target.intersect(&mut ray()).unwrap();

        assert_relative_eq!(2.0, hit.t_far);
        assert_eq!("lower", hit.instance.unwrap().debug_label());
    }

    #[test]
    fn instance_state_is_respected() {
        let mut target = Scene::new("test");
        let id = target.attach_instance(Instance::new(
            "a",
            geometry("a", Vec3::ZERO),
        ));

        assert!(target.intersect(&mut ray()).is_some());

        target.instance_mut(id).unwrap().disable();

        assert!(target.intersect(&mut ray()).is_none());

        target.instance_mut(id).unwrap().enable();
        target.instance_mut(id).unwrap().set_mask(0b10);

        assert!(target.intersect(&mut ray().with_mask(0b01)).is_none());
        assert!(target.intersect(&mut ray().with_mask(0b10)).is_some());

        // Transform only affects normals
        target
            .instance_mut(id)
            .unwrap()
            .set_transform(Mat4::from_scale(vec3(1.0, 1.0, -1.0)));

        let hit = target.intersect(&mut ray()).unwrap();

        assert_relative_eq!(1.0, hit.t_far);
        assert_relative_eq!(-Vec3::Z, hit.normal);
    }

    #[test]
    fn empty() {
        let target = Scene::new("test");
        let mut ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert!(target.intersect(&mut ray).is_none());
    }
}
