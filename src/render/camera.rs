use crate::scene::Ray;
use crate::viewer::CameraSettings;
use glam::{Mat4, Vec3, Vec4Swizzles};

const ORBIT_RADIANS_PER_PIXEL: f32 = 0.005;
const ZOOM_STEP: f32 = 0.1;
const MIN_DISTANCE: f32 = 0.05;
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Perspective camera orbiting a target point, driven by pointer drag and
/// scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    target: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    fov_y: f32,
    near: f32,
    far: f32,
    controls_enabled: bool,
}

impl OrbitCamera {
    pub fn new(settings: &CameraSettings, controls_enabled: bool) -> Self {
        let target = Vec3::from(settings.target);
        let offset = Vec3::from(settings.position) - target;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            target,
            distance,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            fov_y: settings.fov.to_radians(),
            near: settings.near,
            far: settings.far,
            controls_enabled,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Rotates around the target by a pointer drag measured in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        if !self.controls_enabled {
            return;
        }
        self.yaw -= dx * ORBIT_RADIANS_PER_PIXEL;
        self.pitch = (self.pitch + dy * ORBIT_RADIANS_PER_PIXEL).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Positive `steps` move toward the target.
    pub fn zoom(&mut self, steps: f32) {
        if !self.controls_enabled {
            return;
        }
        let factor = (1.0 - ZOOM_STEP).powf(steps);
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, self.far * 0.5);
    }

    /// World-space ray through a cursor position given in physical pixels.
    pub fn picking_ray(&self, cursor: [f32; 2], viewport: [f32; 2]) -> Option<Ray> {
        let [width, height] = viewport;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * cursor[0] / width - 1.0;
        let ndc_y = 1.0 - 2.0 * cursor[1] / height;

        let inverse = self.view_projection(width / height).inverse();
        let unproject = |z: f32| {
            let point = inverse * glam::Vec4::new(ndc_x, ndc_y, z, 1.0);
            point.xyz() / point.w
        };
        let near = unproject(0.0);
        let far = unproject(1.0);
        Some(Ray::new(near, far - near))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn settings_position_is_reproduced() {
        let camera = OrbitCamera::new(&CameraSettings::default(), true);
        assert!(approx(camera.position(), Vec3::new(-8.0, 3.0, 8.0)));
    }

    #[test]
    fn centre_ray_points_at_target() {
        let camera = OrbitCamera::new(&CameraSettings::default(), true);
        let ray = camera
            .picking_ray([400.0, 300.0], [800.0, 600.0])
            .expect("ray");
        let expected = (camera.target() - camera.position()).normalize();
        assert!(approx(ray.direction, expected));
        assert!(camera.picking_ray([0.0, 0.0], [0.0, 600.0]).is_none());
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let mut camera = OrbitCamera::new(&CameraSettings::default(), false);
        let before = camera;
        camera.orbit(120.0, -40.0);
        camera.zoom(3.0);
        assert_eq!(camera, before);
    }

    #[test]
    fn orbit_keeps_distance_and_zoom_clamps() {
        let mut camera = OrbitCamera::new(&CameraSettings::default(), true);
        let distance = camera.distance();
        camera.orbit(200.0, 10_000.0);
        assert!((camera.position() - camera.target()).length() - distance < 1e-3);
        assert!(camera.position().y < camera.target().y + distance);

        camera.zoom(500.0);
        assert_eq!(camera.distance(), MIN_DISTANCE);
    }
}
