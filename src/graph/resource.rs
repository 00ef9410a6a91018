//! Attachments and the registry that tracks which subpasses read and write them.
//!
//! Attachments are registered once and are immutable afterwards. Registering a multisampled attachment
//! also registers its resolve companion: a single-sampled copy of the description that receives the
//! resolved image. The companion is always placed directly after the attachment it resolves.

use std::fmt::{Display, Formatter};

use anyhow::Result;
use ash::vk;
use multimap::MultiMap;

use crate::Error;
use crate::graph::dependency::PipelineStage;
use crate::graph::pass::SubpassId;
use crate::util::to_vk::IntoVulkanType;

/// Handle to an attachment registered in a [`RenderPassBuilder`](crate::RenderPassBuilder).
/// The index is the attachment index in the final render pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttachmentId(pub(crate) u32);

impl AttachmentId {
    /// Index of this attachment in the render pass attachment list.
    pub fn index(&self) -> u32 {
        self.0
    }

    pub(crate) fn idx(&self) -> usize {
        self.0 as usize
    }
}

impl Display for AttachmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Access class of an attachment. This decides how the attachment is bound in a subpass and which
/// pipeline stages touch it.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentClass {
    /// Color attachment
    #[default]
    Color,
    /// Depth and/or stencil attachment. A subpass can write to at most one of these.
    DepthStencil,
    /// Color attachment that leaves the render pass to be presented. Writing to it synchronizes
    /// with the presentation engine.
    Present,
}

impl AttachmentClass {
    /// Derive the access class from the final layout of an attachment.
    pub fn from_layout(layout: vk::ImageLayout) -> Self {
        match layout {
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
            | vk::ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL
            | vk::ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL => AttachmentClass::DepthStencil,
            vk::ImageLayout::PRESENT_SRC_KHR => AttachmentClass::Present,
            _ => AttachmentClass::Color,
        }
    }

    /// Whether this is a depth-stencil attachment
    pub fn is_depth(&self) -> bool {
        matches!(self, AttachmentClass::DepthStencil)
    }

    /// Layout used when the attachment is written to as an attachment.
    pub(crate) fn attachment_layout(&self) -> vk::ImageLayout {
        match self {
            AttachmentClass::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            // Present images are rendered to as regular color attachments
            AttachmentClass::Color | AttachmentClass::Present => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }
    }

    /// Layout used when the attachment is read as an input attachment.
    pub(crate) fn read_only_layout(&self) -> vk::ImageLayout {
        match self {
            AttachmentClass::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            AttachmentClass::Color | AttachmentClass::Present => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    fn default_final_layout(&self) -> vk::ImageLayout {
        match self {
            AttachmentClass::Color => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            AttachmentClass::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            AttachmentClass::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

/// The ways a subpass can use an attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum AttachmentUsage {
    /// Read in the fragment shader as an input attachment.
    Input,
    /// Written as a color or depth attachment.
    Output,
    /// Written as a color or depth attachment, while also reading its previous contents (blending, depth testing).
    OutputRead,
    /// Written by the multisample resolve at the end of the subpass.
    Resolve,
}

impl AttachmentUsage {
    /// Get the pipeline stages this usage happens in.
    pub fn stage(&self, class: AttachmentClass) -> PipelineStage {
        match self {
            AttachmentUsage::Input => PipelineStage::FRAGMENT_SHADER,
            AttachmentUsage::Resolve => PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            AttachmentUsage::Output | AttachmentUsage::OutputRead => {
                if class.is_depth() {
                    PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS
                } else {
                    PipelineStage::COLOR_ATTACHMENT_OUTPUT
                }
            }
        }
    }

    /// Get the access flags for this usage.
    pub fn access(&self, class: AttachmentClass) -> vk::AccessFlags {
        match (self, class.is_depth()) {
            (AttachmentUsage::Input, _) => vk::AccessFlags::INPUT_ATTACHMENT_READ,
            (AttachmentUsage::Resolve, _) => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            (AttachmentUsage::Output, false) => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            (AttachmentUsage::Output, true) => vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            (AttachmentUsage::OutputRead, false) => {
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_READ
            }
            (AttachmentUsage::OutputRead, true) => {
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            }
        }
    }

    /// Whether this usage modifies the attachment
    pub fn is_write(&self) -> bool {
        !matches!(self, AttachmentUsage::Input)
    }
}

/// Describes an attachment to register in a render pass.
/// # Example
/// ```
/// use phobos_subpass::prelude::*;
///
/// let gbuffer = AttachmentInfo::color(vk::Format::R16G16B16A16_SFLOAT)
///     .samples(4)
///     .store_op(vk::AttachmentStoreOp::DONT_CARE);
/// let depth = AttachmentInfo::depth(vk::Format::D32_SFLOAT);
/// let swapchain = AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// Image format
    pub format: vk::Format,
    /// Sample count. Anything above 1 creates a resolve attachment.
    pub samples: u32,
    /// Access class of the attachment.
    pub class: AttachmentClass,
    /// Whether the attachment memory may alias other attachments.
    pub may_alias: bool,
    /// Load operation for color and depth
    pub load_op: vk::AttachmentLoadOp,
    /// Store operation for color and depth
    pub store_op: vk::AttachmentStoreOp,
    /// Load operation for stencil
    pub stencil_load_op: vk::AttachmentLoadOp,
    /// Store operation for stencil
    pub stencil_store_op: vk::AttachmentStoreOp,
    /// Layout of the image when the render pass begins.
    pub initial_layout: vk::ImageLayout,
    /// Layout of the image when the render pass ends.
    pub final_layout: vk::ImageLayout,
}

impl AttachmentInfo {
    fn new(format: vk::Format, class: AttachmentClass, store_op: vk::AttachmentStoreOp) -> Self {
        AttachmentInfo {
            format,
            samples: 1,
            class,
            may_alias: false,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: class.default_final_layout(),
        }
    }

    /// A cleared and stored color attachment.
    pub fn color(format: vk::Format) -> Self {
        Self::new(format, AttachmentClass::Color, vk::AttachmentStoreOp::STORE)
    }

    /// A cleared depth attachment whose contents are discarded after the render pass.
    pub fn depth(format: vk::Format) -> Self {
        Self::new(format, AttachmentClass::DepthStencil, vk::AttachmentStoreOp::DONT_CARE)
    }

    /// A cleared color attachment that is transitioned to `VK_IMAGE_LAYOUT_PRESENT_SRC_KHR` at the end of the render pass.
    pub fn present(format: vk::Format) -> Self {
        Self::new(format, AttachmentClass::Present, vk::AttachmentStoreOp::STORE)
    }

    /// Create attachment info from a raw attachment description. The access class is derived from the final layout.
    pub fn from_description(desc: &vk::AttachmentDescription) -> Self {
        AttachmentInfo {
            format: desc.format,
            samples: desc.samples.as_raw(),
            class: AttachmentClass::from_layout(desc.final_layout),
            may_alias: desc.flags.contains(vk::AttachmentDescriptionFlags::MAY_ALIAS),
            load_op: desc.load_op,
            store_op: desc.store_op,
            stencil_load_op: desc.stencil_load_op,
            stencil_store_op: desc.stencil_store_op,
            initial_layout: desc.initial_layout,
            final_layout: desc.final_layout,
        }
    }

    /// Set the sample count.
    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Mark the attachment memory as possibly aliasing other attachments.
    pub fn may_alias(mut self, may_alias: bool) -> Self {
        self.may_alias = may_alias;
        self
    }

    /// Set the load operation
    pub fn load_op(mut self, op: vk::AttachmentLoadOp) -> Self {
        self.load_op = op;
        self
    }

    /// Set the store operation
    pub fn store_op(mut self, op: vk::AttachmentStoreOp) -> Self {
        self.store_op = op;
        self
    }

    /// Set the initial layout
    pub fn initial_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.initial_layout = layout;
        self
    }

    /// Set the final layout. This does not change the access class.
    pub fn final_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }
}

/// Convert a sample count to Vulkan sample count flags.
/// # Errors
/// * Fails if the count is not a power of two, or larger than 64.
pub(crate) fn sample_count_flags(samples: u32) -> Result<vk::SampleCountFlags> {
    if samples.is_power_of_two() && samples <= 64 {
        Ok(vk::SampleCountFlags::from_raw(samples))
    } else {
        Err(Error::InvalidSampleCount(samples).into())
    }
}

/// An attachment registered in a render pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub(crate) info: AttachmentInfo,
    pub(crate) samples: vk::SampleCountFlags,
    pub(crate) resolve: Option<AttachmentId>,
    pub(crate) resolves: Option<AttachmentId>,
}

impl Attachment {
    /// Get the info this attachment was registered with.
    pub fn info(&self) -> &AttachmentInfo {
        &self.info
    }

    /// Get the access class
    pub fn class(&self) -> AttachmentClass {
        self.info.class
    }

    /// Get the sample count flags
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    /// Whether the attachment memory may alias other attachments
    pub fn may_alias(&self) -> bool {
        self.info.may_alias
    }

    /// Whether this attachment has more than one sample
    pub fn is_multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }

    /// The resolve companion of a multisampled attachment.
    pub fn resolve_attachment(&self) -> Option<AttachmentId> {
        self.resolve
    }

    /// If this is a resolve companion, the multisampled attachment it resolves.
    pub fn resolve_source(&self) -> Option<AttachmentId> {
        self.resolves
    }
}

impl IntoVulkanType for &Attachment {
    type Output = vk::AttachmentDescription;

    fn into_vulkan(self) -> Self::Output {
        vk::AttachmentDescription {
            flags: if self.info.may_alias {
                vk::AttachmentDescriptionFlags::MAY_ALIAS
            } else {
                vk::AttachmentDescriptionFlags::empty()
            },
            format: self.info.format,
            samples: self.samples,
            load_op: self.info.load_op,
            store_op: self.info.store_op,
            stencil_load_op: self.info.stencil_load_op,
            stencil_store_op: self.info.stencil_store_op,
            initial_layout: self.info.initial_layout,
            final_layout: self.info.final_layout,
        }
    }
}

/// Stores all registered attachments together with the subpasses that read and write them.
/// Readers and writers are kept in declaration order.
#[derive(Debug, Default, Clone)]
pub(crate) struct AttachmentRegistry {
    attachments: Vec<Attachment>,
    readers: MultiMap<AttachmentId, SubpassId>,
    writers: MultiMap<AttachmentId, SubpassId>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new attachment, and its resolve companion if it is multisampled.
    /// # Errors
    /// * Fails if the sample count is invalid.
    /// * Fails if registering would exceed `max` attachments.
    pub fn register(&mut self, info: AttachmentInfo, max: usize) -> Result<AttachmentId> {
        let samples = sample_count_flags(info.samples)?;
        let multisampled = samples != vk::SampleCountFlags::TYPE_1;
        let needed = if multisampled { 2 } else { 1 };
        if self.attachments.len() + needed > max {
            return Err(Error::TooManyAttachments(max).into());
        }

        let id = AttachmentId(self.attachments.len() as u32);
        self.attachments.push(Attachment {
            info,
            samples,
            resolve: None,
            resolves: None,
        });
        trace!("Registered attachment {id} ({:?}, {:?}, {:?})", info.class, info.format, samples);

        if multisampled {
            let resolve = AttachmentId(id.0 + 1);
            // The resolve overwrites the whole image, its previous contents are never needed.
            let resolve_info = AttachmentInfo {
                samples: 1,
                load_op: vk::AttachmentLoadOp::DONT_CARE,
                store_op: vk::AttachmentStoreOp::STORE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..info
            };
            self.attachments.push(Attachment {
                info: resolve_info,
                samples: vk::SampleCountFlags::TYPE_1,
                resolve: None,
                resolves: Some(id),
            });
            self.attachments[id.idx()].resolve = Some(resolve);
            trace!("Registered resolve attachment {resolve} for {id}");
        }

        Ok(id)
    }

    /// Look up an attachment.
    /// # Errors
    /// * Fails if the attachment was not registered in this registry.
    pub fn get(&self, id: AttachmentId) -> Result<&Attachment> {
        self.attachments
            .get(id.idx())
            .ok_or_else(|| Error::UnknownAttachment(id).into())
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttachmentId, &Attachment)> {
        self.attachments
            .iter()
            .enumerate()
            .map(|(index, attachment)| (AttachmentId(index as u32), attachment))
    }

    pub fn add_reader(&mut self, id: AttachmentId, pass: SubpassId) {
        if !self.readers(id).contains(&pass) {
            self.readers.insert(id, pass);
        }
    }

    pub fn add_writer(&mut self, id: AttachmentId, pass: SubpassId) {
        if !self.writers(id).contains(&pass) {
            self.writers.insert(id, pass);
        }
    }

    /// All subpasses that declared this attachment as input, in declaration order.
    pub fn readers(&self, id: AttachmentId) -> &[SubpassId] {
        self.readers.get_vec(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All subpasses that write to this attachment, in declaration order.
    pub fn writers(&self, id: AttachmentId) -> &[SubpassId] {
        self.writers.get_vec(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every subpass touching this attachment, each listed once, in subpass order.
    pub fn accessors(&self, id: AttachmentId) -> Vec<SubpassId> {
        let mut accessors = self
            .writers(id)
            .iter()
            .chain(self.readers(id))
            .copied()
            .collect::<Vec<_>>();
        accessors.sort();
        accessors.dedup();
        accessors
    }
}
