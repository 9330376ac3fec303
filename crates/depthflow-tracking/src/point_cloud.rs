//! Point set payload carried by clusters and sensor frames.
//!
//! A [`PointCloud`] is either *unorganized* (a flat list, `height == 1`) or
//! *organized* (a `width × height` grid in sensor row-major order, as produced
//! by a depth camera). Concatenation always yields an unorganized cloud.

use alloc::vec::Vec;

use crate::cluster::BoundingBox;
use crate::vec3::Vec3;

/// Ordered or unordered set of 3-D points.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointCloud {
    points: Vec<Vec3>,
    width: u32,
    height: u32,
}

impl PointCloud {
    /// Creates an unorganized cloud from a list of points.
    pub fn new(points: Vec<Vec3>) -> Self {
        let width = points.len() as u32;
        Self {
            points,
            width,
            height: 1,
        }
    }

    /// Creates an organized `width × height` cloud.
    ///
    /// Returns `None` if `points.len() != width * height`.
    pub fn organized(points: Vec<Vec3>, width: u32, height: u32) -> Option<Self> {
        if points.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            points,
            width,
            height,
        })
    }

    /// Returns the points.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the cloud has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Grid width (equals `len()` for unorganized clouds).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height (1 for unorganized clouds).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if the cloud keeps a 2-D sensor structure.
    pub fn is_organized(&self) -> bool {
        self.height > 1
    }

    /// Returns the point at grid position `(col, row)` of an organized cloud.
    pub fn at(&self, col: u32, row: u32) -> Option<Vec3> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.points
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    /// Appends every point of `other`. The result is unorganized.
    pub fn extend_from(&mut self, other: &PointCloud) {
        self.points.extend_from_slice(&other.points);
        self.width = self.points.len() as u32;
        self.height = 1;
    }

    /// Arithmetic mean of the points, or `None` if the cloud is empty.
    pub fn centroid(&self) -> Option<Vec3> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self.points.iter().fold(Vec3::ZERO, |acc, &p| acc + p);
        Some(sum / self.points.len() as f32)
    }

    /// Axis-aligned extent of the points, or `None` if the cloud is empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let first = *self.points.first()?;
        Some(
            self.points
                .iter()
                .fold(BoundingBox::new(first, first), |bb, &p| {
                    BoundingBox::new(bb.min.min(p), bb.max.max(p))
                }),
        )
    }
}
