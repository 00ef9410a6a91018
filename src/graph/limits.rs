//! Construction-time capacity limits of a [`RenderPassBuilder`](crate::RenderPassBuilder).
//!
//! Render passes are small. These limits exist to catch runaway graph construction early, and to
//! mirror the limits of the hardware the description is eventually submitted to. Exceeding any of
//! them is a configuration error reported by the builder call that crossed the limit.

/// Upper bounds on the size of a render pass graph.
/// # Example
/// ```
/// use phobos_subpass::prelude::*;
///
/// let limits = Limits {
///     max_subpasses: 4,
///     ..Default::default()
/// };
/// let builder = RenderPassBuilder::with_limits(limits);
/// ```
#[derive(Derivative, Debug, Copy, Clone, PartialEq, Eq)]
#[derivative(Default)]
pub struct Limits {
    /// Maximum amount of subpasses in one render pass.
    #[derivative(Default(value = "16"))]
    pub max_subpasses: usize,
    /// Maximum amount of attachments, including implicitly created resolve attachments.
    /// The default allows 8 color attachments and one depth attachment, each with a resolve companion.
    #[derivative(Default(value = "18"))]
    pub max_attachments: usize,
    /// Maximum amount of color attachments a single subpass may write to.
    #[derivative(Default(value = "8"))]
    pub max_color_attachments: usize,
    /// Maximum amount of synthesized subpass dependencies.
    #[derivative(Default(value = "64"))]
    pub max_dependencies: usize,
}
