use std::sync::Arc;

use derivative::Derivative;
use glam::Mat4;

use crate::{Geometry, Hit, Intersect, Ray, SceneId, UserData};

/// Placement of a [`Geometry`] within a scene.
///
/// Instances share their geometry, so a single mesh can be placed many
/// times without being rebuilt.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Instance {
    label: String,
    #[derivative(Debug = "ignore")]
    geometry: Arc<Geometry>,
    transform: Mat4,
    enabled: bool,
    mask: u32,
    #[derivative(Debug = "ignore")]
    user_data: Option<UserData>,
    scene: Option<SceneId>,
}

impl Instance {
    pub fn new(label: impl Into<String>, geometry: Arc<Geometry>) -> Self {
        Self {
            label: label.into(),
            geometry,
            transform: Mat4::IDENTITY,
            enabled: true,
            mask: u32::MAX,
            user_data: None,
            scene: None,
        }
    }

    pub fn debug_label(&self) -> &str {
        &self.label
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn set_user_data(&mut self, user_data: Option<UserData>) {
        self.user_data = user_data;
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Scene this instance is attached to, if any; maintained by the scene.
    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub fn set_scene(&mut self, scene: Option<SceneId>) {
        self.scene = scene;
    }
}

impl Intersect for Instance {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<Hit<'a>> {
        if !self.enabled || ray.mask & self.mask == 0 {
            return None;
        }

        self.geometry.intersect(ray, Some(self))
    }
}
