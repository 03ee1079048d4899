//! Scalar volume data and the normalized bounding box derived from it.

use std::sync::Arc;

use glam::{UVec3, Vec3};

use crate::error::{Result, Vol3dError};

/// An immutable 8-bit scalar volume with its physical voxel spacing.
///
/// The sample buffer is shared, not copied, so the caller can keep its own handle
/// to the decoded data. A new dataset replaces the whole `Volume`.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Arc<[u8]>,
    size: UVec3,
    voxel_size: Vec3,
    declared_depth: u32,
}

impl Volume {
    /// Creates a volume, correcting the depth if it disagrees with the buffer length.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidDimensions`] if width or height is zero, if the
    /// buffer is empty or not a whole number of `width * height` slices, or if any
    /// voxel size component is not a positive finite number.
    pub fn new(data: impl Into<Arc<[u8]>>, size: UVec3, voxel_size: Vec3) -> Result<Self> {
        let data = data.into();
        let fixed = fix_volume_size(size, data.len())?;

        if !(voxel_size.is_finite() && voxel_size.cmpgt(Vec3::ZERO).all()) {
            return Err(Vol3dError::InvalidDimensions(format!(
                "voxel size must be positive, got {voxel_size}"
            )));
        }

        log::info!(
            "Volume {}x{}x{} ({} bytes), voxel size {voxel_size}",
            fixed.x,
            fixed.y,
            fixed.z,
            data.len()
        );

        Ok(Self {
            data,
            size: fixed,
            voxel_size,
            declared_depth: size.z,
        })
    }

    /// Returns the raw samples, x fastest, then y, then z.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a shared handle to the sample buffer.
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Returns the (possibly corrected) dimensions in voxels.
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Returns the physical size of one voxel.
    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    /// Returns the depth as declared by the caller, before any correction.
    pub fn declared_depth(&self) -> u32 {
        self.declared_depth
    }

    /// Returns whether the depth was corrected at load.
    pub fn depth_was_corrected(&self) -> bool {
        self.declared_depth != self.size.z
    }

    /// Returns the normalized bounding box for this volume.
    pub fn box_size(&self) -> Vec3 {
        box_size(self.size, self.voxel_size)
    }

    /// Returns the sample at integer voxel coordinates.
    ///
    /// Coordinates outside the volume are clamped to the nearest edge voxel.
    pub fn voxel(&self, x: i64, y: i64, z: i64) -> u8 {
        let clamp = |v: i64, n: u32| v.clamp(0, i64::from(n) - 1) as usize;
        let (w, h) = (self.size.x as usize, self.size.y as usize);
        let (x, y, z) = (clamp(x, self.size.x), clamp(y, self.size.y), clamp(z, self.size.z));
        self.data[x + w * (y + h * z)]
    }
}

/// Checks `size` against a buffer of `byte_len` samples and corrects the depth.
///
/// Some containers record a frame count that disagrees with the decoded data, so the
/// depth is recomputed as `byte_len / (width * height)` and the mismatch is logged.
///
/// # Errors
///
/// Returns [`Vol3dError::InvalidDimensions`] when width or height is zero, the buffer is
/// empty, or the buffer is not a whole number of slices.
pub fn fix_volume_size(size: UVec3, byte_len: usize) -> Result<UVec3> {
    let slice = size.x as usize * size.y as usize;
    if slice == 0 {
        return Err(Vol3dError::InvalidDimensions(format!(
            "width and height must be non-zero, got {}x{}",
            size.x, size.y
        )));
    }
    if byte_len == 0 {
        return Err(Vol3dError::InvalidDimensions("empty volume buffer".into()));
    }
    if byte_len % slice != 0 {
        return Err(Vol3dError::InvalidDimensions(format!(
            "buffer of {byte_len} bytes is not a multiple of the {}x{} slice size",
            size.x, size.y
        )));
    }

    let frames = u32::try_from(byte_len / slice).map_err(|_| {
        Vol3dError::InvalidDimensions(format!("buffer of {byte_len} bytes is too large"))
    })?;
    if frames != size.z {
        log::warn!("Frame count (z) seems to be {frames} rather than {}", size.z);
    }
    Ok(UVec3::new(size.x, size.y, frames))
}

/// Computes the bounding box for a volume, with the width normalized to 1.
///
/// Anisotropic voxels map to a box with the correct physical aspect ratio.
pub fn box_size(volume_size: UVec3, voxel_size: Vec3) -> Vec3 {
    let s = volume_size.x as f32 * voxel_size.x;
    Vec3::new(
        1.0,
        volume_size.y as f32 * voxel_size.y / s,
        volume_size.z as f32 * voxel_size.z / s,
    )
}
