//! Typed values moved between slots.
//!
//! Every slot carries exactly one [`SlotType`]; a [`Payload`] is the value
//! traveling over a connection. Heavy payloads are reference counted so fan-out
//! to several consumers shares the data instead of copying it.

use std::fmt;
use std::sync::Arc;

use depthflow_tracking::{Cluster, PointCloud, Vec3};
use serde::{Deserialize, Serialize};

/// Payload type carried by a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// [`PointCloud`] shared via `Arc`.
    PointCloud,
    /// List of tracked or detected clusters.
    Clusters,
    /// 4×4 row-major matrix.
    Matrix,
    /// Single 3-D vector.
    Vector,
    /// 2-D sensor image.
    Image,
    /// Rigid transform.
    Transform,
    /// Point index list.
    Indices,
}

impl SlotType {
    /// Human-readable name.
    pub const fn label(self) -> &'static str {
        match self {
            SlotType::PointCloud => "point cloud",
            SlotType::Clusters => "clusters",
            SlotType::Matrix => "matrix",
            SlotType::Vector => "vector",
            SlotType::Image => "image",
            SlotType::Transform => "transform",
            SlotType::Indices => "indices",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Interleaved 8-bit image, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Image {
    /// Wraps raw pixel data. Returns `None` if the buffer size is wrong.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        (data.len() == expected).then_some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved channels per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Rigid transform: rotation quaternion `(x, y, z, w)` then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation in meters.
    pub translation: Vec3,
    /// Unit quaternion `(x, y, z, w)`.
    pub rotation: [f32; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Value carried over a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A point set.
    PointCloud(Arc<PointCloud>),
    /// A cluster list. Consumers that modify clusters copy them first.
    Clusters(Arc<[Cluster]>),
    /// A 4×4 matrix.
    Matrix([[f32; 4]; 4]),
    /// A vector.
    Vector(Vec3),
    /// An image.
    Image(Arc<Image>),
    /// A transform.
    Transform(Transform),
    /// Point indices.
    Indices(Arc<[usize]>),
}

impl Payload {
    /// The slot type this payload fits.
    pub fn slot_type(&self) -> SlotType {
        match self {
            Payload::PointCloud(_) => SlotType::PointCloud,
            Payload::Clusters(_) => SlotType::Clusters,
            Payload::Matrix(_) => SlotType::Matrix,
            Payload::Vector(_) => SlotType::Vector,
            Payload::Image(_) => SlotType::Image,
            Payload::Transform(_) => SlotType::Transform,
            Payload::Indices(_) => SlotType::Indices,
        }
    }

    /// Builds a cluster payload from an owned list.
    pub fn clusters(clusters: Vec<Cluster>) -> Self {
        Payload::Clusters(clusters.into())
    }

    /// Builds a point cloud payload.
    pub fn cloud(cloud: PointCloud) -> Self {
        Payload::PointCloud(Arc::new(cloud))
    }

    /// The cluster list, if this is one.
    pub fn as_clusters(&self) -> Option<&Arc<[Cluster]>> {
        match self {
            Payload::Clusters(c) => Some(c),
            _ => None,
        }
    }

    /// The point cloud, if this is one.
    pub fn as_cloud(&self) -> Option<&Arc<PointCloud>> {
        match self {
            Payload::PointCloud(c) => Some(c),
            _ => None,
        }
    }

    /// The image, if this is one.
    pub fn as_image(&self) -> Option<&Arc<Image>> {
        match self {
            Payload::Image(i) => Some(i),
            _ => None,
        }
    }
}
