//! Source node for raw sensor frames.

use std::sync::Arc;

use depthflow_graph::{
    GraphError, Image, LatestReceiver, NodeError, NodeProcessor, NodeType, OutputSlot, Payload, ProcessContext,
    SlotLayout, SlotType,
};
use depthflow_tracking::PointCloud;

use crate::cluster_source::SourceConfig;

/// One acquisition from a depth sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorFrame {
    /// Point cloud in sensor space.
    pub cloud: Arc<PointCloud>,
    /// Color or depth image, when the sensor provides one.
    pub image: Option<Arc<Image>>,
}

/// Emits the newest sensor frame: the cloud on `Cloud`, the image on `Image`.
pub struct CloudSourceNode {
    rx: LatestReceiver<SensorFrame>,
    config: SourceConfig,
    last: Option<SensorFrame>,
    cloud: OutputSlot,
    image: OutputSlot,
}

impl CloudSourceNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "cloud_source";

    /// Creates a source reading from `rx`.
    pub fn new(rx: LatestReceiver<SensorFrame>, config: SourceConfig) -> Self {
        Self {
            rx,
            config,
            last: None,
            cloud: OutputSlot::default(),
            image: OutputSlot::default(),
        }
    }
}

impl NodeProcessor for CloudSourceNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.cloud = slots.output("Cloud", SlotType::PointCloud)?;
        self.image = slots.output("Image", SlotType::Image)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let frame = match self.rx.take() {
            Some(frame) => {
                if !self.config.only_new_frames {
                    self.last = Some(frame.clone());
                }
                frame
            }
            None => match &self.last {
                Some(frame) => frame.clone(),
                None => return Ok(()),
            },
        };
        ctx.send(self.cloud, Payload::PointCloud(frame.cloud))?;
        if let Some(image) = frame.image {
            ctx.send(self.image, Payload::Image(image))?;
        }
        Ok(())
    }
}
