use anyhow::Result;

use phobos_subpass::prelude::*;

mod framework;

fn error_of<T: std::fmt::Debug>(result: Result<T>) -> Error {
    result
        .unwrap_err()
        .downcast::<Error>()
        .expect("expected a render pass error")
}

#[test]
fn too_many_subpasses() -> Result<()> {
    let mut builder = RenderPassBuilder::with_limits(Limits {
        max_subpasses: 2,
        ..Default::default()
    });
    builder.subpass(SubpassKind::Graphics)?;
    builder.subpass(SubpassKind::Graphics)?;
    assert_eq!(error_of(builder.subpass(SubpassKind::Graphics)), Error::TooManySubpasses(2));
    Ok(())
}

#[test]
fn too_many_attachments() -> Result<()> {
    let mut builder = RenderPassBuilder::with_limits(Limits {
        max_attachments: 2,
        ..Default::default()
    });
    builder.attach(framework::color())?;
    // A multisampled attachment needs room for its resolve attachment too.
    assert_eq!(
        error_of(builder.attach(framework::color().samples(4))),
        Error::TooManyAttachments(2)
    );
    builder.attach(framework::color())?;
    assert_eq!(error_of(builder.attach(framework::color())), Error::TooManyAttachments(2));
    Ok(())
}

#[test]
fn too_many_color_attachments() -> Result<()> {
    let mut builder = RenderPassBuilder::with_limits(Limits {
        max_color_attachments: 1,
        ..Default::default()
    });
    let a = builder.attach(framework::color())?;
    let b = builder.attach(framework::color())?;
    let depth = builder.attach(framework::depth())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, a)?;
    // Depth attachments do not count as color attachments.
    builder.output(s0, depth)?;
    assert_eq!(error_of(builder.output(s0, b)), Error::TooManyColorAttachments(s0, 1));
    Ok(())
}

#[test]
fn too_many_dependencies() -> Result<()> {
    let mut builder = RenderPassBuilder::with_limits(Limits {
        max_dependencies: 1,
        ..Default::default()
    });
    let swapchain = builder.attach(framework::present())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, swapchain)?;
    assert_eq!(error_of(builder.build()), Error::TooManyDependencies(1));
    assert!(!builder.is_baked());
    assert!(builder.hazards().is_none());
    Ok(())
}

#[test]
fn multiple_depth_outputs() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let first = builder.attach(framework::depth())?;
    let second = builder.attach(framework::depth())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, first)?;
    // Re-declaring the same depth output is fine.
    builder.output_read(s0, first)?;
    assert_eq!(error_of(builder.output(s0, second)), Error::MultipleDepthOutputs(s0, first));
    Ok(())
}

#[test]
fn explicit_cycle() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    let s1 = builder.subpass(SubpassKind::Graphics)?;
    let s2 = builder.subpass(SubpassKind::Graphics)?;
    builder.depends_on(s1, s0)?;
    builder.depends_on(s2, s1)?;
    builder.depends_on(s0, s2)?;
    assert_eq!(error_of(builder.build()), Error::GraphHasCycle);
    assert!(!builder.is_baked());
    Ok(())
}

#[test]
fn self_dependency() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.depends_on(s0, s0)?;
    assert_eq!(error_of(builder.build()), Error::GraphHasCycle);
    Ok(())
}

#[test]
fn modify_after_build() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let color = builder.attach(framework::color())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    builder.output(s0, color)?;
    builder.build()?;

    assert_eq!(error_of(builder.attach(framework::color())), Error::AlreadyBaked);
    assert_eq!(error_of(builder.subpass(SubpassKind::Graphics)), Error::AlreadyBaked);
    assert_eq!(error_of(builder.input(s0, color)), Error::AlreadyBaked);
    assert_eq!(error_of(builder.output(s0, color)), Error::AlreadyBaked);
    assert_eq!(error_of(builder.output_read(s0, color)), Error::AlreadyBaked);
    assert_eq!(error_of(builder.depends_on(s0, s0)), Error::AlreadyBaked);
    assert_eq!(
        error_of(builder.depends_external(s0, ExternalOrder::Before, SyncScope::default())),
        Error::AlreadyBaked
    );
    // Building again still works.
    assert_eq!(builder.build()?.subpasses().len(), 1);
    Ok(())
}

#[test]
fn unknown_handles() -> Result<()> {
    let mut other = RenderPassBuilder::new();
    other.attach(framework::color())?;
    let foreign_attachment = other.attach(framework::color())?;
    other.subpass(SubpassKind::Graphics)?;
    let foreign_subpass = other.subpass(SubpassKind::Graphics)?;

    let mut builder = RenderPassBuilder::new();
    let color = builder.attach(framework::color())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;

    assert_eq!(
        error_of(builder.input(s0, foreign_attachment)),
        Error::UnknownAttachment(foreign_attachment)
    );
    assert_eq!(
        error_of(builder.output(s0, foreign_attachment)),
        Error::UnknownAttachment(foreign_attachment)
    );
    assert_eq!(error_of(builder.input(foreign_subpass, color)), Error::UnknownSubpass(foreign_subpass));
    assert_eq!(error_of(builder.depends_on(s0, foreign_subpass)), Error::UnknownSubpass(foreign_subpass));
    assert_eq!(error_of(builder.depends_on(foreign_subpass, s0)), Error::UnknownSubpass(foreign_subpass));
    assert!(builder.attachment(foreign_attachment).is_none());
    assert!(builder.readers(color).is_empty());
    Ok(())
}

#[test]
fn invalid_sample_count() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    assert_eq!(
        error_of(builder.attach(framework::color().samples(3))),
        Error::InvalidSampleCount(3)
    );
    assert_eq!(
        error_of(builder.attach(framework::color().samples(128))),
        Error::InvalidSampleCount(128)
    );
    assert_eq!(error_of(builder.attach(framework::color().samples(0))), Error::InvalidSampleCount(0));
    // Failed registrations do not take up attachment slots.
    assert_eq!(builder.attach(framework::color())?.index(), 0);
    Ok(())
}

#[test]
fn errors_display() -> Result<()> {
    let message = Error::TooManySubpasses(16).to_string();
    assert!(message.contains("16"));

    let mut builder = RenderPassBuilder::new();
    builder.attach(framework::color())?;
    let depth = builder.attach(framework::depth())?;
    let s0 = builder.subpass(SubpassKind::Graphics)?;
    let message = Error::MultipleDepthOutputs(s0, depth).to_string();
    assert_eq!(message, "Subpass 0 already outputs to depth attachment #1.");
    Ok(())
}
