use glam::{DMat3, DVec3};
use serde::Deserialize;
use zerocopy::{Immutable, IntoBytes};

use crate::error::GsprepError;

/// Length of the flat camera parameter vector:
/// eye(3) + look point(3) + negated up(3) + fx + fy.
pub const CAMERA_PARAM_LEN: usize = 11;

/// One stored camera pose as it appears in the configuration JSON. The
/// rotation is the world-to-camera matrix, row-major. Unknown keys in the
/// JSON objects are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraView {
    pub position: [f64; 3],
    pub rotation: [[f64; 3]; 3],
    pub fx: f64,
    pub fy: f64,
    pub width: u32,
    pub height: u32,
}

/// The two flat buffers the renderer takes per view.
#[derive(Debug, Clone, PartialEq, IntoBytes, Immutable)]
#[repr(C)]
pub struct CameraParams {
    pub params: [f32; CAMERA_PARAM_LEN],
    pub size: [u32; 2],
}

impl CameraParams {
    /// Raw native-endian bytes of `params` followed by `size`, the exact
    /// representation a GPU upload consumes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// Parses the camera configuration document: an ordered JSON array of view
/// objects. Unparsable input is fatal for the whole configuration.
pub fn load_cameras(json: &str) -> Result<Vec<CameraView>, GsprepError> {
    serde_json::from_str(json).map_err(|e| GsprepError::ParseCameras(e.to_string()))
}

/// Derives the renderer's flat parameter vector from one stored pose.
///
/// The stored rotation is world-to-camera, so its rows become the columns of
/// the camera-to-world orientation. Forward is the +Z axis of that
/// orientation. The third triple of the output is a *point* ahead of the
/// camera (forward unit direction plus position), not a direction; the
/// renderer's look-at construction depends on exactly this shape.
pub fn derive_camera(view: &CameraView) -> CameraParams {
    let orientation = DMat3::from_cols(
        DVec3::from_array(view.rotation[0]),
        DVec3::from_array(view.rotation[1]),
        DVec3::from_array(view.rotation[2]),
    );
    let eye = DVec3::from_array(view.position);
    let dir = (orientation * DVec3::Z).normalize();
    let look = eye + dir;
    let up = orientation * DVec3::Y;

    CameraParams {
        params: [
            eye.x as f32,
            eye.y as f32,
            eye.z as f32,
            look.x as f32,
            look.y as f32,
            look.z as f32,
            -up.x as f32,
            -up.y as f32,
            -up.z as f32,
            view.fx as f32,
            view.fy as f32,
        ],
        size: [view.width, view.height],
    }
}

pub fn derive_cameras(views: &[CameraView]) -> Vec<CameraParams> {
    views.iter().map(derive_camera).collect()
}
