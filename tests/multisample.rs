use anyhow::Result;

use phobos_subpass::prelude::*;

mod framework;

#[test]
fn resolve_attachment_registered() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let color = builder.attach(framework::color().samples(4).load_op(vk::AttachmentLoadOp::LOAD))?;
    let next = builder.attach(framework::depth())?;

    let resolve = builder.resolve_attachment(color).unwrap();
    assert_eq!(resolve.index(), color.index() + 1);
    assert_eq!(next.index(), resolve.index() + 1);

    let ms = builder.attachment(color).unwrap();
    assert!(ms.is_multisampled());
    assert_eq!(ms.samples(), vk::SampleCountFlags::TYPE_4);

    let companion = builder.attachment(resolve).unwrap();
    assert!(!companion.is_multisampled());
    assert_eq!(companion.resolve_source(), Some(color));
    assert_eq!(companion.class(), AttachmentClass::Color);
    assert_eq!(companion.info().format, vk::Format::R8G8B8A8_UNORM);
    assert_eq!(companion.info().load_op, vk::AttachmentLoadOp::DONT_CARE);
    assert_eq!(companion.info().store_op, vk::AttachmentStoreOp::STORE);
    assert_eq!(companion.info().initial_layout, vk::ImageLayout::UNDEFINED);

    assert!(builder.resolve_attachment(next).is_none());
    Ok(())
}

#[test]
fn resolve_list_with_placeholders() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let single = builder.attach(framework::color())?;
    let ms = builder.attach(framework::hdr_color().samples(8))?;
    let resolve = builder.resolve_attachment(ms).unwrap();

    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, single)?;
    builder.output(s0, ms)?;
    assert_eq!(builder.writers(resolve), &[s0]);

    let desc = framework::build_checked(&mut builder)?;
    assert_eq!(desc.attachments().len(), 3);
    let subpass = &desc.subpasses()[0];
    assert_eq!(subpass.color_attachments().len(), 2);
    assert_eq!(subpass.resolve_attachments().len(), 2);
    assert!(subpass.resolve_attachments()[0].is_unused());
    assert_eq!(subpass.resolve_attachments()[1].attachment(), Some(resolve));
    assert_eq!(subpass.resolve_attachments()[1].layout(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let raw = subpass.resolve_attachments()[0].into_vulkan();
    assert_eq!(raw.attachment, vk::ATTACHMENT_UNUSED);
    let raw = subpass.resolve_attachments()[1].into_vulkan();
    assert_eq!(raw.attachment, resolve.index());

    let attachments = desc.vk_attachments();
    assert_eq!(attachments[1].samples, vk::SampleCountFlags::TYPE_8);
    assert_eq!(attachments[2].samples, vk::SampleCountFlags::TYPE_1);
    Ok(())
}

#[test]
fn single_sampled_pass_has_no_resolve_list() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let single = builder.attach(framework::color())?;
    let ms = builder.attach(framework::color().samples(2))?;

    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, single)?;
    let s1 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s1, ms)?;

    let desc = framework::build_checked(&mut builder)?;
    assert!(desc.subpasses()[0].resolve_attachments().is_empty());
    assert_eq!(desc.subpasses()[1].resolve_attachments().len(), 1);
    Ok(())
}

#[test]
fn reading_resolved_attachment() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let ms = builder.attach(framework::color().samples(4))?;
    let resolve = builder.resolve_attachment(ms).unwrap();
    let swapchain = builder.attach(framework::present())?;

    let scene = builder.subpass(SubpassKind::Graphics)?;
    builder.output(scene, ms)?;
    let post = builder.subpass(SubpassKind::Graphics)?;
    builder.input(post, resolve)?;
    builder.output(post, swapchain)?;

    let desc = framework::build_checked(&mut builder)?;
    assert_eq!(desc.stages(), &[vec![scene], vec![post]]);

    let hazards = builder.hazards().unwrap();
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].attachment(), resolve);
    assert_eq!(hazards[0].kind(), HazardKind::ReadAfterWrite);

    let scope = framework::subpass_dependency(&desc, scene, post).unwrap().scope();
    assert_eq!(scope.src_stage, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(scope.src_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    assert_eq!(scope.dst_access, vk::AccessFlags::INPUT_ATTACHMENT_READ);
    Ok(())
}

#[test]
fn multisampled_depth_resolve() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let color = builder.attach(framework::color().samples(4))?;
    let depth = builder.attach(framework::depth().samples(4))?;
    let depth_resolve = builder.resolve_attachment(depth).unwrap();

    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, color)?;
    builder.output(s0, depth)?;

    let desc = framework::build_checked(&mut builder)?;
    assert_eq!(desc.attachments().len(), 4);
    let subpass = &desc.subpasses()[0];
    assert_eq!(subpass.resolve_attachments().len(), 1);
    let resolve = subpass.depth_resolve_attachment().unwrap();
    assert_eq!(resolve.attachment(), Some(depth_resolve));
    assert_eq!(resolve.layout(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    assert_eq!(desc.attachments()[depth_resolve.index() as usize].class(), AttachmentClass::DepthStencil);
    Ok(())
}

#[test]
fn preserve_skips_resolving_pass() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let gbuffer = builder.attach(framework::color())?;
    let ms = builder.attach(framework::color().samples(4))?;
    let resolve = builder.resolve_attachment(ms).unwrap();
    let out = builder.attach(framework::color())?;

    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, gbuffer)?;
    builder.output(s0, resolve)?;
    let s1 = builder.subpass(SubpassKind::Graphics)?;
    builder.input(s1, gbuffer)?;
    builder.output(s1, ms)?;
    let s2 = builder.subpass(SubpassKind::Graphics)?;
    builder.input(s2, gbuffer)?;
    builder.input(s2, resolve)?;
    builder.output(s2, out)?;

    let desc = framework::build_checked(&mut builder)?;
    assert_eq!(desc.stages(), &[vec![s0], vec![s1], vec![s2]]);
    // s1 writes the resolve attachment itself, so it must not preserve it.
    assert!(desc.subpasses()[1].preserve_attachments().is_empty());
    Ok(())
}
