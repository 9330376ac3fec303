//! Synthetic scene of blobs moving in front of the sensors.
//!
//! Blob paths are functions of time, so every acquisition thread observes the
//! same scene without sharing state. Each sensor adds its own calibration
//! offset and point jitter.

use depthflow_tracking::{Cluster, PointCloud, Vec3};

/// Points sampled per blob and frame.
const POINTS_PER_BLOB: usize = 48;

/// Blob radius (m).
const BLOB_RADIUS: f32 = 0.15;

/// Calibration error between consecutive sensors (m).
const SENSOR_OFFSET: f32 = 0.04;

/// Simple PRNG for point jitter (xorshift32)
#[derive(Debug, Clone)]
pub struct Xorshift32(u32);

impl Xorshift32 {
    /// Seeds the generator; zero is replaced by a fixed constant.
    pub fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x1234_5678 } else { seed })
    }

    /// Uniform in `[0, 1]`.
    pub fn next_f32(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f32) / (u32::MAX as f32)
    }

    /// Uniform in `[-1, 1]`.
    pub fn next_signed(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Blob {
    origin: Vec3,
    amplitude: Vec3,
    rate: f32,
    phase: f32,
}

impl Blob {
    fn position(&self, t: f64) -> Vec3 {
        let a = self.rate * t as f32 + self.phase;
        self.origin + Vec3::new(self.amplitude.x * a.sin(), 0.0, self.amplitude.z * a.cos())
    }
}

/// Blobs on elliptical paths through the sensors' shared field of view.
#[derive(Debug, Clone)]
pub struct BlobScene {
    blobs: Vec<Blob>,
}

impl BlobScene {
    /// Creates `count` blobs with paths derived from `seed`.
    pub fn new(count: usize, seed: u32) -> Self {
        let mut rng = Xorshift32::new(seed);
        let blobs = (0..count)
            .map(|_| Blob {
                origin: Vec3::new(rng.next_signed() * 1.5, 1.0, 2.5 + rng.next_signed()),
                amplitude: Vec3::new(0.5 + rng.next_f32(), 0.0, 0.3 + rng.next_f32() * 0.5),
                // Walking pace: one loop every 6 to 12 s.
                rate: 0.5 + rng.next_f32() * 0.5,
                phase: rng.next_f32() * core::f32::consts::TAU,
            })
            .collect();
        Self { blobs }
    }

    /// Number of blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Blob centers at time `t`.
    pub fn positions(&self, t: f64) -> Vec<Vec3> {
        self.blobs.iter().map(|b| b.position(t)).collect()
    }

    /// Point cloud of every blob as seen by `sensor` at time `t`.
    pub fn observe_clouds(&self, sensor: usize, t: f64, rng: &mut Xorshift32) -> Vec<PointCloud> {
        let offset = Vec3::new(SENSOR_OFFSET * sensor as f32, 0.0, 0.0);
        self.positions(t)
            .into_iter()
            .map(|center| {
                let points = (0..POINTS_PER_BLOB)
                    .map(|_| {
                        let jitter = Vec3::new(rng.next_signed(), rng.next_signed() * 2.0, rng.next_signed());
                        center + offset + jitter * BLOB_RADIUS
                    })
                    .collect();
                PointCloud::new(points)
            })
            .collect()
    }

    /// Detections of `sensor` at time `t`, one cluster per blob.
    pub fn observe(&self, sensor: usize, t: f64, rng: &mut Xorshift32) -> Vec<Cluster> {
        self.observe_clouds(sensor, t, rng)
            .into_iter()
            .map(|cloud| Cluster::from_cloud(cloud, t))
            .collect()
    }

    /// Every blob's points merged into one cloud.
    pub fn observe_cloud(&self, sensor: usize, t: f64, rng: &mut Xorshift32) -> PointCloud {
        let mut all = PointCloud::default();
        for cloud in self.observe_clouds(sensor, t, rng) {
            all.extend_from(&cloud);
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xorshift_stays_in_range() {
        let mut rng = Xorshift32::new(0);
        for _ in 0..1000 {
            let x = rng.next_f32();
            assert!((0.0..=1.0).contains(&x));
            assert!((-1.0..=1.0).contains(&rng.next_signed()));
        }
    }

    #[test]
    fn same_seed_same_scene() {
        let a = BlobScene::new(3, 7);
        let b = BlobScene::new(3, 7);
        assert_eq!(a.positions(1.5), b.positions(1.5));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn detections_sit_near_blob_centers() {
        let scene = BlobScene::new(2, 42);
        let mut rng = Xorshift32::new(1);
        let centers = scene.positions(0.5);
        let clusters = scene.observe(0, 0.5, &mut rng);
        assert_eq!(clusters.len(), 2);
        for (c, center) in clusters.iter().zip(centers) {
            assert_eq!(c.cloud.len(), POINTS_PER_BLOB);
            assert!(c.centroid.distance(center) < BLOB_RADIUS);
        }
    }

    #[test]
    fn sensors_disagree_by_their_offset() {
        let scene = BlobScene::new(1, 3);
        let a = scene.observe(0, 2.0, &mut Xorshift32::new(5));
        let b = scene.observe(1, 2.0, &mut Xorshift32::new(5));
        let dx = b[0].centroid.x - a[0].centroid.x;
        assert!((dx - SENSOR_OFFSET).abs() < 1e-4);
    }

    #[test]
    fn merged_cloud_holds_every_blob() {
        let scene = BlobScene::new(3, 9);
        let cloud = scene.observe_cloud(0, 0.0, &mut Xorshift32::new(2));
        assert_eq!(cloud.len(), 3 * POINTS_PER_BLOB);
    }
}
