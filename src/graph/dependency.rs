//! Subpass dependencies and their synchronization scopes.
//!
//! Dependencies are synthesized in three groups, in this order:
//! 1. A pair of external dependencies for every subpass that renders to a present attachment.
//! 2. Explicit dependencies declared through [`RenderPassBuilder::depends_on`](crate::RenderPassBuilder::depends_on)
//!    and [`RenderPassBuilder::depends_external`](crate::RenderPassBuilder::depends_external).
//! 3. One dependency per pair of subpasses with a hazard between them. Hazards on multiple attachments between the
//!    same two subpasses are merged into a single dependency.
//!
//! Identical dependencies are only emitted once.

use std::fmt::{Display, Formatter};

use anyhow::Result;
use ash::vk;

use crate::Error;
use crate::graph::hazard::Hazard;
use crate::graph::pass::{ExternalOrder, SubpassId, SubpassInfo};
use crate::graph::resource::AttachmentRegistry;
use crate::util::to_vk::IntoVulkanType;

/// Pipeline stage flags as used in subpass dependencies.
pub type PipelineStage = vk::PipelineStageFlags;

/// Synchronization scope of a dependency: which accesses must complete, and which accesses must wait for them.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SyncScope {
    /// Stages that must complete
    pub src_stage: PipelineStage,
    /// Accesses that must be made available
    pub src_access: vk::AccessFlags,
    /// Stages that wait
    pub dst_stage: PipelineStage,
    /// Accesses that the source accesses must be visible to
    pub dst_access: vk::AccessFlags,
    /// Dependency flags
    pub flags: vk::DependencyFlags,
}

impl SyncScope {
    /// Create a new synchronization scope without dependency flags.
    pub fn new(
        src_stage: PipelineStage,
        src_access: vk::AccessFlags,
        dst_stage: PipelineStage,
        dst_access: vk::AccessFlags,
    ) -> Self {
        SyncScope {
            src_stage,
            src_access,
            dst_stage,
            dst_access,
            flags: vk::DependencyFlags::empty(),
        }
    }

    /// Make this a framebuffer-local dependency.
    pub fn by_region(mut self) -> Self {
        self.flags |= vk::DependencyFlags::BY_REGION;
        self
    }

    /// Everything before must finish before anything after starts.
    pub(crate) fn whole_pipeline() -> Self {
        SyncScope::new(
            PipelineStage::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_WRITE,
            PipelineStage::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        )
        .by_region()
    }

    /// Wait for the presentation engine to release the image before writing to it.
    pub(crate) fn present_acquire() -> Self {
        SyncScope::new(
            PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::empty(),
            PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
    }

    /// Finish writing to the image before it is handed to the presentation engine.
    pub(crate) fn present_release() -> Self {
        SyncScope::new(
            PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            PipelineStage::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        )
    }

    pub(crate) fn merge(&mut self, other: &SyncScope) {
        self.src_stage |= other.src_stage;
        self.src_access |= other.src_access;
        self.dst_stage |= other.dst_stage;
        self.dst_access |= other.dst_access;
        self.flags |= other.flags;
    }
}

/// Endpoint of a subpass dependency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SubpassTarget {
    /// Commands outside of the render pass
    External,
    /// A subpass inside the render pass
    Subpass(SubpassId),
}

impl SubpassTarget {
    /// Subpass index as used in `VkSubpassDependency`.
    pub fn index(&self) -> u32 {
        match self {
            SubpassTarget::External => vk::SUBPASS_EXTERNAL,
            SubpassTarget::Subpass(id) => id.index(),
        }
    }

    /// Get the subpass, or `None` for an external endpoint.
    pub fn subpass(&self) -> Option<SubpassId> {
        match self {
            SubpassTarget::External => None,
            SubpassTarget::Subpass(id) => Some(*id),
        }
    }
}

impl Display for SubpassTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubpassTarget::External => f.write_str("external"),
            SubpassTarget::Subpass(id) => write!(f, "subpass {id}"),
        }
    }
}

/// Ordering and synchronization constraint between two subpasses, or a subpass and the outside of the render pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubpassDependency {
    pub(crate) src: SubpassTarget,
    pub(crate) dst: SubpassTarget,
    pub(crate) scope: SyncScope,
}

impl SubpassDependency {
    pub(crate) fn new(src: SubpassTarget, dst: SubpassTarget, scope: SyncScope) -> Self {
        SubpassDependency {
            src,
            dst,
            scope,
        }
    }

    /// Endpoint that executes first
    pub fn src(&self) -> SubpassTarget {
        self.src
    }

    /// Endpoint that waits
    pub fn dst(&self) -> SubpassTarget {
        self.dst
    }

    /// Get the synchronization scope
    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    /// Whether this dependency orders the two given subpasses, in either direction.
    pub fn connects(&self, a: SubpassId, b: SubpassId) -> bool {
        let (a, b) = (SubpassTarget::Subpass(a), SubpassTarget::Subpass(b));
        (self.src == a && self.dst == b) || (self.src == b && self.dst == a)
    }
}

impl IntoVulkanType for &SubpassDependency {
    type Output = vk::SubpassDependency;

    fn into_vulkan(self) -> Self::Output {
        vk::SubpassDependency {
            src_subpass: self.src.index(),
            dst_subpass: self.dst.index(),
            src_stage_mask: self.scope.src_stage,
            dst_stage_mask: self.scope.dst_stage,
            src_access_mask: self.scope.src_access,
            dst_access_mask: self.scope.dst_access,
            dependency_flags: self.scope.flags,
        }
    }
}

/// Bounded list of dependencies that never contains the same dependency twice.
#[derive(Debug, Default, Clone)]
pub(crate) struct DependencyList {
    dependencies: Vec<SubpassDependency>,
    max: usize,
}

impl DependencyList {
    pub fn new(max: usize) -> Self {
        DependencyList {
            dependencies: Vec::new(),
            max,
        }
    }

    /// Append a dependency, unless an identical one is already present.
    /// # Errors
    /// * Fails if the list is full.
    pub fn push(&mut self, dependency: SubpassDependency) -> Result<()> {
        if self.dependencies.contains(&dependency) {
            return Ok(());
        }
        if self.dependencies.len() >= self.max {
            return Err(Error::TooManyDependencies(self.max).into());
        }
        trace!(
            "Dependency {} -> {} ({:?} {:?} => {:?} {:?})",
            dependency.src,
            dependency.dst,
            dependency.scope.src_stage,
            dependency.scope.src_access,
            dependency.scope.dst_stage,
            dependency.scope.dst_access
        );
        self.dependencies.push(dependency);
        Ok(())
    }

    pub fn into_inner(self) -> Vec<SubpassDependency> {
        self.dependencies
    }
}

/// Synchronization scope protecting the attachment of a hazard.
fn hazard_scope(hazard: &Hazard, subpasses: &[SubpassInfo], registry: &AttachmentRegistry) -> Result<SyncScope> {
    let class = registry.get(hazard.attachment())?.class();
    let earlier = &subpasses[hazard.earlier().idx()];
    let later = &subpasses[hazard.later().idx()];
    let (src_stage, src_access) = earlier.access(hazard.attachment(), class);
    let (dst_stage, dst_access) = later.access(hazard.attachment(), class);
    let scope = SyncScope::new(src_stage, src_access, dst_stage, dst_access);
    // Aliased attachments may be overwritten outside of the current region.
    if earlier.uses_aliased_attachment || later.uses_aliased_attachment {
        Ok(scope)
    } else {
        Ok(scope.by_region())
    }
}

/// Create all dependencies of a render pass.
/// # Errors
/// * Fails if more than `max` dependencies are needed.
pub(crate) fn synthesize(
    subpasses: &[SubpassInfo],
    registry: &AttachmentRegistry,
    hazards: &[Hazard],
    max: usize,
) -> Result<Vec<SubpassDependency>> {
    let mut dependencies = DependencyList::new(max);

    for (index, info) in subpasses.iter().enumerate() {
        if !info.outputs_to_present {
            continue;
        }
        let pass = SubpassTarget::Subpass(SubpassId(index as u32));
        dependencies.push(SubpassDependency::new(SubpassTarget::External, pass, SyncScope::present_acquire()))?;
        dependencies.push(SubpassDependency::new(pass, SubpassTarget::External, SyncScope::present_release()))?;
    }

    for (index, info) in subpasses.iter().enumerate() {
        let pass = SubpassTarget::Subpass(SubpassId(index as u32));
        for parent in &info.depends_on {
            dependencies.push(SubpassDependency::new(
                SubpassTarget::Subpass(*parent),
                pass,
                SyncScope::whole_pipeline(),
            ))?;
        }
        for (order, scope) in &info.external {
            let dependency = match order {
                ExternalOrder::Before => SubpassDependency::new(SubpassTarget::External, pass, *scope),
                ExternalOrder::After => SubpassDependency::new(pass, SubpassTarget::External, *scope),
            };
            dependencies.push(dependency)?;
        }
    }

    let mut implicit: Vec<SubpassDependency> = Vec::new();
    for hazard in hazards {
        let scope = hazard_scope(hazard, subpasses, registry)?;
        let src = SubpassTarget::Subpass(hazard.earlier());
        let dst = SubpassTarget::Subpass(hazard.later());
        match implicit.iter_mut().find(|dependency| dependency.src == src && dependency.dst == dst) {
            Some(dependency) => dependency.scope.merge(&scope),
            None => implicit.push(SubpassDependency::new(src, dst, scope)),
        }
    }
    for dependency in implicit {
        dependencies.push(dependency)?;
    }

    Ok(dependencies.into_inner())
}
