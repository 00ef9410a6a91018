//! Subpass handles, the state a [`RenderPassBuilder`](crate::RenderPassBuilder) accumulates for every subpass,
//! and the baked [`SubpassDescription`].
//!
//! Subpasses are identified by a [`SubpassId`], an index into the builder. All declarations go through the builder:
//! ```
//! use phobos_subpass::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = RenderPassBuilder::new();
//! let albedo = builder.attach(AttachmentInfo::color(vk::Format::R8G8B8A8_UNORM))?;
//! let depth = builder.attach(AttachmentInfo::depth(vk::Format::D32_SFLOAT))?;
//! let swapchain = builder.attach(AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB))?;
//!
//! let geometry = builder.subpass(SubpassKind::Graphics)?;
//! builder.output(geometry, albedo)?;
//! builder.output(geometry, depth)?;
//!
//! let lighting = builder.subpass(SubpassKind::Graphics)?;
//! builder.input(lighting, albedo)?;
//! builder.input(lighting, depth)?;
//! builder.output(lighting, swapchain)?;
//!
//! let desc = builder.build()?;
//! let lighting = desc.subpass(lighting).unwrap();
//! assert_eq!(lighting.stage(), 1);
//! assert_eq!(lighting.input_attachments().len(), 2);
//! # Ok(())
//! # }
//! ```

use std::fmt::{Display, Formatter};

use ash::vk;

use crate::graph::dependency::SyncScope;
use crate::graph::resource::{AttachmentClass, AttachmentId, AttachmentUsage};
use crate::util::to_vk::IntoVulkanType;

/// Handle to a subpass in a [`RenderPassBuilder`](crate::RenderPassBuilder). Subpasses are numbered in
/// creation order, starting at zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubpassId(pub(crate) u32);

impl SubpassId {
    /// Index of the subpass in the render pass
    pub fn index(&self) -> u32 {
        self.0
    }

    pub(crate) fn idx(&self) -> usize {
        self.0 as usize
    }
}

impl Display for SubpassId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a subpass does.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SubpassKind {
    /// Regular rasterization subpass
    #[default]
    Graphics,
    /// Compute-like subpass
    Compute,
}

impl SubpassKind {
    /// Pipeline bind point for pipelines used in this subpass.
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match self {
            SubpassKind::Graphics => vk::PipelineBindPoint::GRAPHICS,
            SubpassKind::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }
}

/// Position of an external dependency relative to the subpass declaring it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExternalOrder {
    /// Work submitted before the render pass must be synchronized with this subpass.
    Before,
    /// Work submitted after the render pass must be synchronized with this subpass.
    After,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PassOutput {
    pub attachment: AttachmentId,
    /// Previous contents are read, e.g. for blending.
    pub read: bool,
}

/// Everything declared on a subpass so far.
#[derive(Debug, Default, Clone)]
pub(crate) struct SubpassInfo {
    pub kind: SubpassKind,
    pub inputs: Vec<AttachmentId>,
    /// Color and depth outputs, in declaration order.
    pub outputs: Vec<PassOutput>,
    /// Resolve companions written by this subpass.
    pub resolves: Vec<AttachmentId>,
    pub depth: Option<AttachmentId>,
    pub depends_on: Vec<SubpassId>,
    pub external: Vec<(ExternalOrder, SyncScope)>,
    pub outputs_to_present: bool,
    pub uses_aliased_attachment: bool,
}

impl SubpassInfo {
    pub fn new(kind: SubpassKind) -> Self {
        SubpassInfo {
            kind,
            ..Default::default()
        }
    }

    pub fn output(&self, attachment: AttachmentId) -> Option<&PassOutput> {
        self.outputs.iter().find(|output| output.attachment == attachment)
    }

    /// Outputs that are bound as color attachments.
    pub fn color_outputs(&self) -> impl Iterator<Item = &PassOutput> {
        self.outputs
            .iter()
            .filter(move |output| Some(output.attachment) != self.depth)
    }

    /// All usages of an attachment in this subpass.
    pub fn usages(&self, attachment: AttachmentId) -> impl Iterator<Item = AttachmentUsage> {
        let input = self.inputs.contains(&attachment).then_some(AttachmentUsage::Input);
        let output = self.output(attachment).map(|output| {
            if output.read {
                AttachmentUsage::OutputRead
            } else {
                AttachmentUsage::Output
            }
        });
        let resolve = self.resolves.contains(&attachment).then_some(AttachmentUsage::Resolve);
        input.into_iter().chain(output).chain(resolve)
    }

    /// Whether this subpass modifies the attachment in any way.
    pub fn writes(&self, attachment: AttachmentId) -> bool {
        self.usages(attachment).any(|usage| usage.is_write())
    }

    /// Whether this subpass uses the attachment at all.
    pub fn touches(&self, attachment: AttachmentId) -> bool {
        self.usages(attachment).next().is_some()
    }

    /// Combined pipeline stages and access flags of every usage of the attachment in this subpass.
    pub fn access(&self, attachment: AttachmentId, class: AttachmentClass) -> (vk::PipelineStageFlags, vk::AccessFlags) {
        self.usages(attachment).fold(
            (vk::PipelineStageFlags::empty(), vk::AccessFlags::empty()),
            |(stage, access), usage| (stage | usage.stage(class), access | usage.access(class)),
        )
    }
}

/// Reference to an attachment from within a subpass, together with the layout the attachment is in during the subpass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub(crate) attachment: Option<AttachmentId>,
    pub(crate) layout: vk::ImageLayout,
}

impl AttachmentRef {
    /// Placeholder reference. Used in resolve lists for color attachments that are not multisampled.
    pub const UNUSED: AttachmentRef = AttachmentRef {
        attachment: None,
        layout: vk::ImageLayout::UNDEFINED,
    };

    pub(crate) fn new(attachment: AttachmentId, layout: vk::ImageLayout) -> Self {
        AttachmentRef {
            attachment: Some(attachment),
            layout,
        }
    }

    /// Get the referenced attachment, or `None` for a placeholder.
    pub fn attachment(&self) -> Option<AttachmentId> {
        self.attachment
    }

    /// Get the layout of the attachment during the subpass.
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Whether this is a placeholder reference
    pub fn is_unused(&self) -> bool {
        self.attachment.is_none()
    }
}

impl IntoVulkanType for AttachmentRef {
    type Output = vk::AttachmentReference;

    fn into_vulkan(self) -> Self::Output {
        vk::AttachmentReference {
            attachment: self.attachment.map_or(vk::ATTACHMENT_UNUSED, |attachment| attachment.index()),
            layout: self.layout,
        }
    }
}

/// Baked description of one subpass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpassDescription {
    pub(crate) kind: SubpassKind,
    pub(crate) stage: u32,
    pub(crate) inputs: Vec<AttachmentRef>,
    pub(crate) colors: Vec<AttachmentRef>,
    pub(crate) resolves: Vec<AttachmentRef>,
    pub(crate) depth: Option<AttachmentRef>,
    pub(crate) depth_resolve: Option<AttachmentRef>,
    pub(crate) preserve: Vec<AttachmentId>,
}

impl SubpassDescription {
    /// Get the subpass kind
    pub fn kind(&self) -> SubpassKind {
        self.kind
    }

    /// Pipeline bind point of this subpass.
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.kind.bind_point()
    }

    /// Stage this subpass was scheduled in. Subpasses in the same stage have no ordering between them.
    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn input_attachments(&self) -> &[AttachmentRef] {
        &self.inputs
    }

    pub fn color_attachments(&self) -> &[AttachmentRef] {
        &self.colors
    }

    /// Resolve attachments. Either empty, or exactly as long as [`SubpassDescription::color_attachments`].
    pub fn resolve_attachments(&self) -> &[AttachmentRef] {
        &self.resolves
    }

    pub fn depth_attachment(&self) -> Option<AttachmentRef> {
        self.depth
    }

    /// Resolve target of a multisampled depth attachment. Requires `VK_KHR_depth_stencil_resolve` to be used.
    pub fn depth_resolve_attachment(&self) -> Option<AttachmentRef> {
        self.depth_resolve
    }

    /// Attachments this subpass does not use, but whose contents must be preserved for a later subpass.
    pub fn preserve_attachments(&self) -> &[AttachmentId] {
        &self.preserve
    }

    /// Preserve attachment indices, as passed to `VkSubpassDescription::pPreserveAttachments`.
    pub fn preserve_indices(&self) -> Vec<u32> {
        self.preserve.iter().map(AttachmentId::index).collect()
    }
}
