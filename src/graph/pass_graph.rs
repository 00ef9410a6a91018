//! The render pass builder, and the baked [`RenderPassDescription`] it produces.

use anyhow::Result;
use ash::vk;
use petgraph::dot::Dot;
use petgraph::Graph;

use crate::Error;
use crate::graph::dependency::{self, SubpassDependency, SubpassTarget, SyncScope};
use crate::graph::hazard::{self, Hazard, HazardKind};
use crate::graph::limits::Limits;
use crate::graph::pass::{AttachmentRef, ExternalOrder, PassOutput, SubpassDescription, SubpassId, SubpassInfo, SubpassKind};
use crate::graph::resource::{Attachment, AttachmentClass, AttachmentId, AttachmentInfo, AttachmentRegistry};
use crate::graph::task_graph::{Constraint, TaskGraph, group_stages};
use crate::util::to_vk::IntoVulkanType;

/// A fully built render pass description. Immutable, and safe to share between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassDescription {
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) subpasses: Vec<SubpassDescription>,
    pub(crate) dependencies: Vec<SubpassDependency>,
    pub(crate) stages: Vec<Vec<SubpassId>>,
}

assert_impl_all!(RenderPassDescription: Send, Sync);

impl RenderPassDescription {
    /// All attachments, including resolve attachments, indexed by [`AttachmentId::index`].
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// All subpasses, indexed by [`SubpassId::index`].
    pub fn subpasses(&self) -> &[SubpassDescription] {
        &self.subpasses
    }

    /// Get a single subpass
    pub fn subpass(&self, id: SubpassId) -> Option<&SubpassDescription> {
        self.subpasses.get(id.idx())
    }

    pub fn dependencies(&self) -> &[SubpassDependency] {
        &self.dependencies
    }

    /// Subpasses grouped by stage. Stages are ordered, subpasses within a stage are not.
    pub fn stages(&self) -> &[Vec<SubpassId>] {
        &self.stages
    }

    /// Attachment descriptions, ready for `VkRenderPassCreateInfo::pAttachments`.
    pub fn vk_attachments(&self) -> Vec<vk::AttachmentDescription> {
        self.attachments.iter().map(|attachment| attachment.into_vulkan()).collect()
    }

    /// Subpass dependencies, ready for `VkRenderPassCreateInfo::pDependencies`.
    pub fn vk_dependencies(&self) -> Vec<vk::SubpassDependency> {
        self.dependencies.iter().map(|dependency| dependency.into_vulkan()).collect()
    }
}

/// Trait implemented for the render pass description to help with debugging and visualizing the subpass graph.
pub trait GraphViz {
    /// Get the string representation of this graph in `dot` format.
    fn dot(&self) -> Result<String>;
}

impl GraphViz for RenderPassDescription {
    fn dot(&self) -> Result<String> {
        let mut graph = Graph::<String, String>::new();
        let nodes = self
            .subpasses
            .iter()
            .enumerate()
            .map(|(index, subpass)| graph.add_node(format!("Subpass {index} (stage {})", subpass.stage)))
            .collect::<Vec<_>>();
        let external = graph.add_node(String::from("External"));
        for dependency in &self.dependencies {
            let node = |target: SubpassTarget| match target {
                SubpassTarget::External => external,
                SubpassTarget::Subpass(id) => nodes[id.idx()],
            };
            let scope = dependency.scope();
            graph.add_edge(
                node(dependency.src),
                node(dependency.dst),
                format!("{:?} => {:?}", scope.src_access, scope.dst_access),
            );
        }
        Ok(format!("{}", Dot::with_config(&graph, &[])))
    }
}

#[derive(Debug, Clone)]
struct Baked {
    hazards: Vec<Hazard>,
    description: RenderPassDescription,
}

/// Builds a [`RenderPassDescription`] from attachments and the subpasses reading and writing them.
///
/// Subpass ordering, subpass dependencies and preserve attachments are all derived automatically when
/// [`RenderPassBuilder::build`] is called for the first time. After that the builder is baked: it can no
/// longer be modified, and further calls to `build()` return the same description.
/// # Example
/// ```
/// use phobos_subpass::prelude::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = RenderPassBuilder::new();
/// let color = builder.attach(AttachmentInfo::color(vk::Format::R8G8B8A8_UNORM))?;
/// let post = builder.attach(AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB))?;
///
/// let scene = builder.subpass(SubpassKind::Graphics)?;
/// builder.output(scene, color)?;
/// let tonemap = builder.subpass(SubpassKind::Graphics)?;
/// builder.input(tonemap, color)?;
/// builder.output(tonemap, post)?;
///
/// let desc = builder.build()?;
/// assert_eq!(desc.stages().len(), 2);
/// // Two dependencies for presenting, one for reading `color` in `tonemap`.
/// assert_eq!(desc.dependencies().len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RenderPassBuilder {
    limits: Limits,
    registry: AttachmentRegistry,
    subpasses: Vec<SubpassInfo>,
    #[derivative(Debug = "ignore")]
    baked: Option<Baked>,
}

impl Default for RenderPassBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPassBuilder {
    /// Create a new builder with the default [`Limits`].
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Create a new builder with custom limits.
    pub fn with_limits(limits: Limits) -> Self {
        RenderPassBuilder {
            limits,
            registry: AttachmentRegistry::new(),
            subpasses: Vec::new(),
            baked: None,
        }
    }

    /// Get the limits of this builder
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Whether [`RenderPassBuilder::build`] has completed successfully.
    pub fn is_baked(&self) -> bool {
        self.baked.is_some()
    }

    fn ensure_open(&self) -> Result<()> {
        match self.baked {
            Some(_) => Err(Error::AlreadyBaked.into()),
            None => Ok(()),
        }
    }

    fn subpass_info(subpasses: &mut [SubpassInfo], pass: SubpassId) -> Result<&mut SubpassInfo> {
        subpasses
            .get_mut(pass.idx())
            .ok_or_else(|| Error::UnknownSubpass(pass).into())
    }

    /// Register an attachment. If the attachment is multisampled, a resolve attachment is registered with it.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if the sample count is not a power of two up to 64.
    /// * Fails if the attachment limit is exceeded.
    pub fn attach(&mut self, info: AttachmentInfo) -> Result<AttachmentId> {
        self.ensure_open()?;
        self.registry.register(info, self.limits.max_attachments)
    }

    /// Get a registered attachment
    pub fn attachment(&self, id: AttachmentId) -> Option<&Attachment> {
        self.registry.get(id).ok()
    }

    /// Get the resolve companion of a multisampled attachment.
    pub fn resolve_attachment(&self, id: AttachmentId) -> Option<AttachmentId> {
        self.attachment(id).and_then(Attachment::resolve_attachment)
    }

    /// Subpasses reading this attachment as input, in declaration order.
    pub fn readers(&self, id: AttachmentId) -> &[SubpassId] {
        self.registry.readers(id)
    }

    /// Subpasses writing this attachment, in declaration order. Subpasses writing to a multisampled attachment
    /// are also writers of its resolve attachment.
    pub fn writers(&self, id: AttachmentId) -> &[SubpassId] {
        self.registry.writers(id)
    }

    /// Add a new subpass.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if the subpass limit is exceeded.
    pub fn subpass(&mut self, kind: SubpassKind) -> Result<SubpassId> {
        self.ensure_open()?;
        if self.subpasses.len() >= self.limits.max_subpasses {
            return Err(Error::TooManySubpasses(self.limits.max_subpasses).into());
        }
        let id = SubpassId(self.subpasses.len() as u32);
        self.subpasses.push(SubpassInfo::new(kind));
        trace!("Added subpass {id} ({kind:?})");
        Ok(id)
    }

    /// Read an attachment as input attachment in a subpass.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if the subpass or attachment does not exist.
    pub fn input(&mut self, pass: SubpassId, attachment: AttachmentId) -> Result<()> {
        self.ensure_open()?;
        let may_alias = self.registry.get(attachment)?.may_alias();
        let info = Self::subpass_info(&mut self.subpasses, pass)?;
        if info.inputs.contains(&attachment) {
            return Ok(());
        }
        info.inputs.push(attachment);
        info.uses_aliased_attachment |= may_alias;
        self.registry.add_reader(attachment, pass);
        trace!("Subpass {pass} reads attachment {attachment}");
        Ok(())
    }

    /// Write to an attachment in a subpass. Depth attachments are bound as the depth attachment of the subpass,
    /// all other attachments as color attachments.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if the subpass or attachment does not exist.
    /// * Fails if this is a second depth attachment for the subpass.
    /// * Fails if the color attachment limit is exceeded.
    pub fn output(&mut self, pass: SubpassId, attachment: AttachmentId) -> Result<()> {
        self.add_output(pass, attachment, false)
    }

    /// Write to an attachment in a subpass while also reading its previous contents, for example when blending
    /// or depth testing against earlier subpasses.
    /// # Errors
    /// See [`RenderPassBuilder::output`].
    pub fn output_read(&mut self, pass: SubpassId, attachment: AttachmentId) -> Result<()> {
        self.add_output(pass, attachment, true)
    }

    fn add_output(&mut self, pass: SubpassId, attachment: AttachmentId, read: bool) -> Result<()> {
        self.ensure_open()?;
        let target = self.registry.get(attachment)?;
        let class = target.class();
        let may_alias = target.may_alias();
        let resolve = target.resolve_attachment();
        let max_colors = self.limits.max_color_attachments;

        let info = Self::subpass_info(&mut self.subpasses, pass)?;
        if let Some(output) = info.outputs.iter_mut().find(|output| output.attachment == attachment) {
            output.read |= read;
            return Ok(());
        }
        if class.is_depth() {
            if let Some(depth) = info.depth {
                return Err(Error::MultipleDepthOutputs(pass, depth).into());
            }
            info.depth = Some(attachment);
        } else if info.color_outputs().count() >= max_colors {
            return Err(Error::TooManyColorAttachments(pass, max_colors).into());
        }

        info.outputs.push(PassOutput {
            attachment,
            read,
        });
        info.outputs_to_present |= class == AttachmentClass::Present;
        info.uses_aliased_attachment |= may_alias;
        if let Some(resolve) = resolve {
            info.resolves.push(resolve);
        }

        self.registry.add_writer(attachment, pass);
        if let Some(resolve) = resolve {
            self.registry.add_writer(resolve, pass);
        }
        trace!("Subpass {pass} writes attachment {attachment} (read = {read})");
        Ok(())
    }

    /// Require `pass` to execute after `other`.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if either subpass does not exist.
    pub fn depends_on(&mut self, pass: SubpassId, other: SubpassId) -> Result<()> {
        self.ensure_open()?;
        if other.idx() >= self.subpasses.len() {
            return Err(Error::UnknownSubpass(other).into());
        }
        let info = Self::subpass_info(&mut self.subpasses, pass)?;
        if !info.depends_on.contains(&other) {
            info.depends_on.push(other);
        }
        Ok(())
    }

    /// Add a dependency between a subpass and commands outside of the render pass.
    /// # Errors
    /// * Fails if the builder was already baked.
    /// * Fails if the subpass does not exist.
    pub fn depends_external(&mut self, pass: SubpassId, order: ExternalOrder, scope: SyncScope) -> Result<()> {
        self.ensure_open()?;
        let info = Self::subpass_info(&mut self.subpasses, pass)?;
        if !info.external.contains(&(order, scope)) {
            info.external.push((order, scope));
        }
        Ok(())
    }

    /// Hazards found while baking. `None` before the builder is baked.
    pub fn hazards(&self) -> Option<&[Hazard]> {
        self.baked.as_ref().map(|baked| baked.hazards.as_slice())
    }

    /// The baked description. `None` before the builder is baked.
    pub fn description(&self) -> Option<&RenderPassDescription> {
        self.baked.as_ref().map(|baked| &baked.description)
    }

    /// Bake the render pass. The first call computes the description, every later call returns the same description.
    /// # Errors
    /// * Fails if explicit dependencies contain a cycle.
    /// * Fails if the dependency limit is exceeded.
    pub fn build(&mut self) -> Result<&RenderPassDescription> {
        let baked = match self.baked.take() {
            Some(baked) => baked,
            None => self.bake()?,
        };
        Ok(&self.baked.insert(baked).description)
    }

    fn bake(&self) -> Result<Baked> {
        let mut graph = TaskGraph::new(self.subpasses.len());
        for (index, info) in self.subpasses.iter().enumerate() {
            for parent in &info.depends_on {
                graph.add_constraint(*parent, SubpassId(index as u32), Constraint::Explicit);
            }
        }
        let ranks = graph.ranks()?;

        let hazards = hazard::detect(&self.registry, &self.subpasses, &ranks);
        for hazard in &hazards {
            graph.add_constraint(hazard.earlier(), hazard.later(), Constraint::Hazard(hazard.attachment()));
        }
        let levels = graph.levels()?;
        for (before, after, constraint) in graph.constraints() {
            assert!(
                levels[before.idx()] < levels[after.idx()],
                "{constraint:?} constraint between subpass {before} and {after} was not separated"
            );
        }
        let stages = group_stages(&levels);

        self.warn_uninitialized_reads();
        let dependencies = dependency::synthesize(
            &self.subpasses,
            &self.registry,
            &hazards,
            self.limits.max_dependencies,
        )?;
        let preserve = self.preserve_attachments(&hazards, &levels, &stages);
        let subpasses = self.assemble(&levels, preserve)?;

        debug!(
            "Baked render pass: {} attachments, {} subpasses in {} stages, {} hazards, {} dependencies",
            self.registry.attachments().len(),
            subpasses.len(),
            stages.len(),
            hazards.len(),
            dependencies.len()
        );

        Ok(Baked {
            hazards,
            description: RenderPassDescription {
                attachments: self.registry.attachments().to_vec(),
                subpasses,
                dependencies,
                stages,
            },
        })
    }

    fn warn_uninitialized_reads(&self) {
        for (id, attachment) in self.registry.iter() {
            let readers = self.registry.readers(id);
            if !readers.is_empty()
                && self.registry.writers(id).is_empty()
                && attachment.info().load_op != vk::AttachmentLoadOp::LOAD
            {
                warn!("Attachment {id} is read by subpasses {readers:?}, but it is never written or loaded.");
            }
        }
    }

    /// For every read-after-write hazard spanning more than one stage, every subpass in between that does not
    /// use the attachment must preserve it.
    fn preserve_attachments(&self, hazards: &[Hazard], levels: &[u32], stages: &[Vec<SubpassId>]) -> Vec<Vec<AttachmentId>> {
        let mut preserve = vec![Vec::new(); self.subpasses.len()];
        for hazard in hazards.iter().filter(|hazard| hazard.kind() == HazardKind::ReadAfterWrite) {
            let write = levels[hazard.earlier().idx()] as usize;
            let read = levels[hazard.later().idx()] as usize;
            if read - write < 2 {
                continue;
            }
            let attachment = hazard.attachment();
            for pass in stages[write + 1..read].iter().flatten() {
                let list: &mut Vec<AttachmentId> = &mut preserve[pass.idx()];
                if !self.subpasses[pass.idx()].touches(attachment) && !list.contains(&attachment) {
                    trace!("Subpass {pass} preserves attachment {attachment}");
                    list.push(attachment);
                }
            }
        }
        preserve
    }

    fn assemble(&self, levels: &[u32], preserve: Vec<Vec<AttachmentId>>) -> Result<Vec<SubpassDescription>> {
        let mut subpasses = Vec::with_capacity(self.subpasses.len());
        for ((info, level), preserve) in self.subpasses.iter().zip(levels).zip(preserve) {
            let mut inputs = Vec::with_capacity(info.inputs.len());
            for &attachment in &info.inputs {
                let class = self.registry.get(attachment)?.class();
                let layout = if info.writes(attachment) {
                    vk::ImageLayout::GENERAL
                } else {
                    class.read_only_layout()
                };
                inputs.push(AttachmentRef::new(attachment, layout));
            }

            let mut colors = Vec::new();
            let mut resolves = Vec::new();
            for output in info.color_outputs() {
                let target = self.registry.get(output.attachment)?;
                let layout = if info.inputs.contains(&output.attachment) {
                    vk::ImageLayout::GENERAL
                } else {
                    target.class().attachment_layout()
                };
                colors.push(AttachmentRef::new(output.attachment, layout));
                resolves.push(match target.resolve_attachment() {
                    Some(resolve) => AttachmentRef::new(resolve, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                    None => AttachmentRef::UNUSED,
                });
            }
            // Only multisampled subpasses get a resolve list, with placeholders for single-sampled outputs.
            if resolves.iter().all(AttachmentRef::is_unused) {
                resolves.clear();
            }

            let (depth, depth_resolve) = match info.depth {
                Some(attachment) => {
                    let layout = if info.inputs.contains(&attachment) {
                        vk::ImageLayout::GENERAL
                    } else {
                        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                    };
                    let resolve = self
                        .registry
                        .get(attachment)?
                        .resolve_attachment()
                        .map(|resolve| AttachmentRef::new(resolve, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));
                    (Some(AttachmentRef::new(attachment, layout)), resolve)
                }
                None => (None, None),
            };

            subpasses.push(SubpassDescription {
                kind: info.kind,
                stage: *level,
                inputs,
                colors,
                resolves,
                depth,
                depth_resolve,
                preserve,
            });
        }
        Ok(subpasses)
    }
}
