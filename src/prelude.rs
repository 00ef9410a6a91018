//! Re-exports all commonly used types.

pub use ash::vk;

pub use crate::error::Error;

pub use crate::graph::dependency::{PipelineStage, SubpassDependency, SubpassTarget, SyncScope};
pub use crate::graph::hazard::{Hazard, HazardKind};
pub use crate::graph::limits::Limits;
pub use crate::graph::pass::{AttachmentRef, ExternalOrder, SubpassDescription, SubpassId, SubpassKind};
pub use crate::graph::pass_graph::{GraphViz, RenderPassBuilder, RenderPassDescription};
pub use crate::graph::resource::{Attachment, AttachmentClass, AttachmentId, AttachmentInfo};

pub use crate::util::to_vk::IntoVulkanType;
