//! Exposes the render pass builder error type

use thiserror::Error;

use crate::graph::pass::SubpassId;
use crate::graph::resource::AttachmentId;

/// Error type that the render pass builder can return. All of these are configuration errors:
/// building the same graph again will fail in exactly the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// More subpasses were declared than the configured limit allows.
    #[error("Render pass can have at most {0} subpasses.")]
    TooManySubpasses(usize),
    /// More attachments were registered than the configured limit allows. Resolve companions count too.
    #[error("Render pass can have at most {0} attachments (including resolve attachments).")]
    TooManyAttachments(usize),
    /// A single subpass writes to more color attachments than allowed.
    #[error("Subpass {0} writes to more than {1} color attachments.")]
    TooManyColorAttachments(SubpassId, usize),
    /// Dependency synthesis produced more dependencies than allowed.
    #[error("Render pass can have at most {0} subpass dependencies.")]
    TooManyDependencies(usize),
    /// Each subpass can only output to a single depth buffer.
    #[error("Subpass {0} already outputs to depth attachment {1}.")]
    MultipleDepthOutputs(SubpassId, AttachmentId),
    /// Subpass handle does not belong to this builder.
    #[error("Subpass {0} does not exist.")]
    UnknownSubpass(SubpassId),
    /// Attachment handle does not belong to this builder.
    #[error("Attachment {0} does not exist.")]
    UnknownAttachment(AttachmentId),
    /// Sample counts must be a power of two no larger than 64.
    #[error("Invalid sample count `{0}`.")]
    InvalidSampleCount(u32),
    /// Explicit subpass dependencies contain a cycle and are impossible to resolve.
    #[error("Explicit subpass dependencies contain a cycle.")]
    GraphHasCycle,
    /// The builder was already baked and can no longer be modified.
    #[error("Render pass was already built and can no longer be modified.")]
    AlreadyBaked,
}
