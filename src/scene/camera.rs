// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use crate::core::{
    algebra::{Matrix4, Point3, UnitQuaternion, Vector3},
    math::Resolution,
};
use serde::{Deserialize, Serialize};

/// Source of view and projection matrices for a frame.
pub trait Camera {
    fn view_matrix(&self) -> Matrix4<f32>;

    fn projection_matrix(&self) -> Matrix4<f32>;

    /// Called by the renderer when the size of the output changes, projection must be
    /// recalculated here.
    fn resolution_changed(&mut self, resolution: Resolution);

    fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCameraConfig {
    pub z_near: f32,
    pub z_far: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
}

impl Default for PerspectiveCameraConfig {
    fn default() -> Self {
        Self {
            z_near: 0.1,
            z_far: 100.0,
            fov: 45.0f32.to_radians(),
        }
    }
}

/// Free camera looking along its local -Z axis. Orientation is defined by yaw (around world Y)
/// and pitch (around local X).
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    config: PerspectiveCameraConfig,
    pub position: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    projection: Matrix4<f32>,
}

fn make_projection(resolution: Resolution, config: &PerspectiveCameraConfig) -> Matrix4<f32> {
    Matrix4::new_perspective(
        resolution.aspect_ratio(),
        config.fov,
        config.z_near,
        config.z_far,
    )
}

impl PerspectiveCamera {
    const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;

    pub fn new(resolution: Resolution, config: PerspectiveCameraConfig) -> Self {
        Self {
            projection: make_projection(resolution, &config),
            config,
            position: Vector3::default(),
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn config(&self) -> &PerspectiveCameraConfig {
        &self.config
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    /// Sets pitch, clamped short of the poles to keep the up vector defined.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    fn rotation(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.pitch)
    }

    pub fn look_direction(&self) -> Vector3<f32> {
        self.rotation() * Vector3::new(0.0, 0.0, -1.0)
    }

    pub fn side_direction(&self) -> Vector3<f32> {
        self.rotation() * Vector3::x()
    }
}

impl Camera for PerspectiveCamera {
    fn view_matrix(&self) -> Matrix4<f32> {
        let dir = self.look_direction();
        let right = Vector3::y().cross(&dir);
        let up = dir
            .cross(&right)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::y);
        let eye = Point3::from(self.position);
        Matrix4::look_at_rh(&eye, &(eye + dir), &up)
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    fn resolution_changed(&mut self, resolution: Resolution) {
        self.projection = make_projection(resolution, &self.config);
    }
}

#[cfg(test)]
mod test {
    use super::{Camera, PerspectiveCamera};
    use crate::core::{
        algebra::{Point3, Vector3},
        math::Resolution,
    };

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = PerspectiveCamera::new(Resolution::new(800, 600), Default::default())
            .with_position(Vector3::new(0.0, 0.0, 10.0));

        let view = camera.view_matrix();
        let origin = view.transform_point(&Point3::origin());
        assert!((origin.coords - Vector3::new(0.0, 0.0, -10.0)).norm() < 1e-5);

        let clip = camera.view_projection_matrix() * Point3::origin().to_homogeneous();
        let ndc = clip.xyz() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > -1.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_resolution_change_updates_projection() {
        let mut camera = PerspectiveCamera::new(Resolution::new(800, 600), Default::default());
        let before = camera.projection_matrix();
        camera.resolution_changed(Resolution::new(800, 600));
        assert_eq!(before, camera.projection_matrix());
        camera.resolution_changed(Resolution::new(600, 600));
        // Aspect ratio lives in the first column.
        assert_ne!(before[(0, 0)], camera.projection_matrix()[(0, 0)]);
        assert_eq!(before[(1, 1)], camera.projection_matrix()[(1, 1)]);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = PerspectiveCamera::new(Resolution::new(1, 1), Default::default());
        camera.set_pitch(10.0);
        assert!(camera.pitch() < std::f32::consts::FRAC_PI_2);
        assert!(camera.look_direction().y > 0.99);
    }
}
