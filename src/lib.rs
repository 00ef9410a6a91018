//! Automatic subpass scheduling for Vulkan render passes
//!
//! Writing a `VkRenderPass` by hand means working out subpass order, subpass dependencies and preserve
//! attachments yourself, and keeping them correct every time a subpass changes. This library derives all of
//! that from what each subpass reads and writes.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import types under a namespace.
//! use phobos_subpass::prelude as ph;
//!
//! // Or, if you dont care about using the types under a namespace
//! use phobos_subpass::prelude::*;
//! ```
//!
//! # Example
//!
//! First, register the attachments of the render pass. Multisampled attachments automatically get a
//! resolve attachment.
//! ```
//! use phobos_subpass::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = RenderPassBuilder::new();
//! let color = builder.attach(AttachmentInfo::color(vk::Format::R8G8B8A8_UNORM).samples(4))?;
//! let depth = builder.attach(AttachmentInfo::depth(vk::Format::D32_SFLOAT).samples(4))?;
//! let swapchain = builder.attach(AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB))?;
//! assert!(builder.resolve_attachment(color).is_some());
//! # Ok(())
//! # }
//! ```
//! Then declare subpasses and what they read and write. Subpasses can be declared in any order, the builder
//! works out the order in which they run.
//! ```
//! # use phobos_subpass::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! # let mut builder = RenderPassBuilder::new();
//! # let color = builder.attach(AttachmentInfo::color(vk::Format::R8G8B8A8_UNORM).samples(4))?;
//! # let depth = builder.attach(AttachmentInfo::depth(vk::Format::D32_SFLOAT).samples(4))?;
//! # let swapchain = builder.attach(AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB))?;
//! let scene = builder.subpass(SubpassKind::Graphics)?;
//! builder.output(scene, color)?;
//! builder.output(scene, depth)?;
//!
//! let resolved = builder.resolve_attachment(color).unwrap();
//! let post = builder.subpass(SubpassKind::Graphics)?;
//! builder.input(post, resolved)?;
//! builder.output(post, swapchain)?;
//!
//! // Bake the description. From now on the builder can no longer be modified.
//! let desc = builder.build()?;
//! let attachments: Vec<vk::AttachmentDescription> = desc.vk_attachments();
//! let dependencies: Vec<vk::SubpassDependency> = desc.vk_dependencies();
//! assert_eq!(attachments.len(), 5);
//! assert!(!dependencies.is_empty());
//! # Ok(())
//! # }
//! ```
//! For further example code, check out the following modules
//! - [`graph`] for the builder and the render pass description it produces.
//! - [`graph::resource`] for attachments.
//! - [`graph::dependency`] for how subpass dependencies are derived.
//! - [`util`] for conversions to raw Vulkan types.

#[macro_use]
extern crate derivative;
#[macro_use] extern crate log;
#[macro_use] extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod error;
pub mod graph;
pub mod util;
