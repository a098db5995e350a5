//! Minimal end-to-end sketch of wiring the ambient stack into the render
//! task graph's compile step. Instance/device/surface bootstrap is out
//! of scope for this crate family (see `rg_rhi::Device`'s doc comment),
//! so this binary stops at the one stage that needs no live Vulkan
//! device at all: building a frame's passes and resources, then asking
//! `rg_graph::compile` for the dependency-ordered, barrier-annotated,
//! alias-planned schedule a real frame loop would hand to the command
//! arena and submission scheduler.

#[macro_use]
extern crate log as _log;

use std::path::PathBuf;

use ash::vk;
use rg_core::config::EngineConfig;
use rg_core::log::{LogConfig, LevelFilter};
use rg_graph::{AccessKind, AliasClass, PassNode, ResourceDescriptor, ResourceId, ResourceUsage};
use rg_rhi::QueueClass;

fn main() -> anyhow::Result<()> {
    rg_core::log::init(LogConfig {
        level: LevelFilter::Trace,
        file_path: None,
    })?;

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("demo.toml"));
    let config = EngineConfig::load_or_default(&config_path)?;
    info!(
        "engine config: frames_in_flight={} worker_threads={} require_sync2={}",
        config.frames_in_flight, config.worker_threads, config.require_synchronization2
    );

    let compiled = compile_example_frame()?;

    info!(
        "compiled {} pass(es) into {} schedule level(s)",
        compiled.topological_order.len(),
        compiled.levels.len()
    );
    for (level_index, level) in compiled.levels.iter().enumerate() {
        debug!("level {level_index}: {} pass(es)", level.len());
    }
    info!("inferred {} cross-pass dependency edge(s)", compiled.edges.len());
    info!(
        "planned {} transient alias allocation(s) for {} transient lifetime(s)",
        compiled.alias_allocations.len(),
        compiled.lifetimes.len()
    );

    Ok(())
}

/// One frame's worth of passes: a depth prepass, a color pass that reads
/// the depth and writes a presentable color target, and a post pass that
/// reads color back through a scratch transient buffer. Resource 0 is the
/// transient depth image; resource 1 is the externally-owned color
/// image (e.g. a swapchain image, already acquired upstream); resource 2
/// is a transient scratch buffer used only by the post pass.
fn compile_example_frame() -> anyhow::Result<rg_graph::CompiledGraph> {
    let resources = vec![
        ResourceDescriptor::transient_image(
            vk::Extent3D { width: 1920, height: 1080, depth: 1 },
            vk::Format::D32_SFLOAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::ImageType::TYPE_2D,
            1,
            1,
            vk::SampleCountFlags::TYPE_1,
            AliasClass::WILDCARD,
        ),
        ResourceDescriptor::image(vk::Image::null(), vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }, vk::ImageLayout::UNDEFINED, 0),
        ResourceDescriptor::transient_buffer(4 * 1024 * 1024, 256, AliasClass::WILDCARD),
    ];

    let depth_prepass = PassNode::new(
        QueueClass::Graphics,
        vec![ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .with_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)],
        Box::new(|_cb, _incoming, _outgoing| {
            trace!("recording depth prepass");
            Ok(())
        }),
    );

    let color_pass = PassNode::new(
        QueueClass::Graphics,
        vec![
            ResourceUsage::new(
                ResourceId(0),
                AccessKind::Read,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
            )
            .with_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL),
            ResourceUsage::new(
                ResourceId(1),
                AccessKind::Write,
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            )
            .with_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        ],
        Box::new(|_cb, _incoming, _outgoing| {
            trace!("recording color pass");
            Ok(())
        }),
    );

    let post_pass = PassNode::new(
        QueueClass::Graphics,
        vec![
            ResourceUsage::new(
                ResourceId(1),
                AccessKind::Read,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
            )
            .with_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            ResourceUsage::new(
                ResourceId(2),
                AccessKind::Write,
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
            )
            .with_buffer_range(0, 4 * 1024 * 1024),
        ],
        Box::new(|_cb, _incoming, _outgoing| {
            trace!("recording post pass");
            Ok(())
        }),
    );

    Ok(rg_graph::compile::compile(&[depth_prepass, color_pass, post_pass], &resources)?)
}
