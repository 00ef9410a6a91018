#![allow(dead_code)]

use anyhow::Result;

use phobos_subpass::prelude::*;

/// Enable log output for tests. Control verbosity with `RUST_LOG`.
pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn color() -> AttachmentInfo {
    AttachmentInfo::color(vk::Format::R8G8B8A8_UNORM)
}

pub fn hdr_color() -> AttachmentInfo {
    AttachmentInfo::color(vk::Format::R16G16B16A16_SFLOAT)
}

pub fn depth() -> AttachmentInfo {
    AttachmentInfo::depth(vk::Format::D32_SFLOAT)
}

pub fn present() -> AttachmentInfo {
    AttachmentInfo::present(vk::Format::B8G8R8A8_SRGB)
}

/// Bake the builder and check every property a baked render pass must have.
pub fn build_checked(builder: &mut RenderPassBuilder) -> Result<RenderPassDescription> {
    init_logging();
    builder.build()?;
    let desc = builder.description().unwrap();
    let hazards = builder.hazards().unwrap();
    check_stages(desc);
    check_hazards_separated(desc, hazards);
    check_dependencies_complete(desc, hazards);
    check_preserve(desc, hazards);
    check_resolve_companions(desc);
    Ok(desc.clone())
}

/// Whether a subpass references the attachment in any attachment list other than the preserve list.
pub fn references(subpass: &SubpassDescription, attachment: AttachmentId) -> bool {
    subpass
        .input_attachments()
        .iter()
        .chain(subpass.color_attachments())
        .chain(subpass.resolve_attachments())
        .chain(subpass.depth_attachment().iter())
        .chain(subpass.depth_resolve_attachment().iter())
        .any(|reference| reference.attachment() == Some(attachment))
}

/// Stages are dense, every subpass is in exactly one stage and subpass dependencies point forward.
pub fn check_stages(desc: &RenderPassDescription) {
    let mut seen = vec![false; desc.subpasses().len()];
    for (stage, subpasses) in desc.stages().iter().enumerate() {
        assert!(!subpasses.is_empty(), "stage {stage} is empty");
        for id in subpasses {
            assert_eq!(desc.subpass(*id).unwrap().stage(), stage as u32);
            assert!(!seen[id.index() as usize], "subpass {id} scheduled twice");
            seen[id.index() as usize] = true;
        }
    }
    assert!(seen.iter().all(|seen| *seen), "not every subpass was scheduled");

    for dependency in desc.dependencies() {
        if let (Some(src), Some(dst)) = (dependency.src().subpass(), dependency.dst().subpass()) {
            let src_stage = desc.subpass(src).unwrap().stage();
            let dst_stage = desc.subpass(dst).unwrap().stage();
            assert!(src_stage < dst_stage, "dependency {src} -> {dst} does not point forward");
        }
    }
}

pub fn check_hazards_separated(desc: &RenderPassDescription, hazards: &[Hazard]) {
    for hazard in hazards {
        let earlier = desc.subpass(hazard.earlier()).unwrap().stage();
        let later = desc.subpass(hazard.later()).unwrap().stage();
        assert!(earlier < later, "{hazard:?} is not separated by a stage");
    }
}

/// Every hazard is covered by a dependency from the earlier to the later subpass.
pub fn check_dependencies_complete(desc: &RenderPassDescription, hazards: &[Hazard]) {
    for hazard in hazards {
        let src = SubpassTarget::Subpass(hazard.earlier());
        let dst = SubpassTarget::Subpass(hazard.later());
        assert!(
            desc.dependencies()
                .iter()
                .any(|dependency| dependency.src() == src && dependency.dst() == dst),
            "no dependency covers {hazard:?}"
        );
    }
    for (i, a) in desc.dependencies().iter().enumerate() {
        for b in &desc.dependencies()[i + 1..] {
            assert_ne!(a, b, "duplicate dependency");
        }
    }
}

/// Subpasses between a write and a later read of the same attachment preserve it, and nothing else is preserved.
pub fn check_preserve(desc: &RenderPassDescription, hazards: &[Hazard]) {
    for subpass in desc.subpasses() {
        for attachment in subpass.preserve_attachments() {
            assert!(!references(subpass, *attachment), "{attachment} is both used and preserved");
        }
        let mut sorted = subpass.preserve_attachments().to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), subpass.preserve_attachments().len(), "duplicate preserve entry");
    }

    for hazard in hazards.iter().filter(|hazard| hazard.kind() == HazardKind::ReadAfterWrite) {
        let write = desc.subpass(hazard.earlier()).unwrap().stage() as usize;
        let read = desc.subpass(hazard.later()).unwrap().stage() as usize;
        for stage in desc.stages().iter().take(read).skip(write + 1) {
            for id in stage {
                let subpass = desc.subpass(*id).unwrap();
                if !references(subpass, hazard.attachment()) {
                    assert!(
                        subpass.preserve_attachments().contains(&hazard.attachment()),
                        "subpass {id} does not preserve {}",
                        hazard.attachment()
                    );
                }
            }
        }
    }
}

/// Every multisampled attachment is directly followed by its single-sampled resolve attachment.
pub fn check_resolve_companions(desc: &RenderPassDescription) {
    for (index, attachment) in desc.attachments().iter().enumerate() {
        match attachment.resolve_attachment() {
            Some(resolve) => {
                assert!(attachment.is_multisampled());
                assert_eq!(resolve.index() as usize, index + 1);
                let companion = &desc.attachments()[index + 1];
                assert_eq!(companion.samples(), vk::SampleCountFlags::TYPE_1);
                assert_eq!(companion.info().format, attachment.info().format);
                assert_eq!(companion.resolve_source().map(|id| id.index() as usize), Some(index));
            }
            None => assert!(!attachment.is_multisampled()),
        }
    }
    let companion = |reference: &AttachmentRef| {
        reference
            .attachment()
            .and_then(|id| desc.attachments()[id.index() as usize].resolve_attachment())
    };
    for subpass in desc.subpasses() {
        let resolves = subpass.resolve_attachments();
        assert!(resolves.is_empty() || resolves.len() == subpass.color_attachments().len());
        for (index, color) in subpass.color_attachments().iter().enumerate() {
            if let Some(resolve) = companion(color) {
                assert_eq!(resolves[index].attachment(), Some(resolve));
            }
        }
        if let Some(resolve) = subpass.depth_attachment().as_ref().and_then(companion) {
            assert_eq!(subpass.depth_resolve_attachment().and_then(|r| r.attachment()), Some(resolve));
        }
    }
}

pub fn has_dependency(desc: &RenderPassDescription, src: SubpassTarget, dst: SubpassTarget) -> bool {
    desc.dependencies()
        .iter()
        .any(|dependency| dependency.src() == src && dependency.dst() == dst)
}

pub fn subpass_dependency<'a>(desc: &'a RenderPassDescription, src: SubpassId, dst: SubpassId) -> Option<&'a SubpassDependency> {
    desc.dependencies()
        .iter()
        .find(|dependency| dependency.src() == SubpassTarget::Subpass(src) && dependency.dst() == SubpassTarget::Subpass(dst))
}
