//! The render pass graph turns a set of subpasses and the attachments they read and write into a complete
//! render pass description. Each subpass only declares its inputs and outputs, the graph then works out
//! * in which order subpasses can run, grouped into stages,
//! * which subpass dependencies are needed to synchronize access to shared attachments,
//! * which attachments unrelated subpasses must preserve.
//!
//! Through the [`GraphViz`](crate::GraphViz) trait, it's possible to export a graphviz-compatible dot file to display
//! the subpass graph.
//!
//! # Example
//!
//! ```
//! use phobos_subpass::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = RenderPassBuilder::new();
//! let depth = builder.attach(AttachmentInfo::depth(vk::Format::D32_SFLOAT))?;
//! let swapchain = builder.attach(AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB))?;
//!
//! // Depth prepass, then shading with the depth buffer as input.
//! let prepass = builder.subpass(SubpassKind::Graphics)?;
//! builder.output(prepass, depth)?;
//! let shading = builder.subpass(SubpassKind::Graphics)?;
//! builder.input(shading, depth)?;
//! builder.output(shading, swapchain)?;
//!
//! let desc = builder.build()?;
//! assert_eq!(desc.stages().len(), 2);
//! let shading = desc.subpass(shading).unwrap();
//! assert_eq!(shading.input_attachments()[0].layout(), vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
//! # Ok(())
//! # }
//! ```
//!
//! For more complex setups, see the [`pass`] module documentation.

pub mod dependency;
pub mod hazard;
pub mod limits;
pub mod pass;
pub mod pass_graph;
pub mod resource;

pub(crate) mod task_graph;
