//! Memory barriers v2 (execution + access + layout + queue-family
//! ownership), and their collapse to the legacy `vkCmdPipelineBarrier`
//! form when `Synchronization2` is unavailable. This is the concrete
//! shape of spec §3's `BarrierBatch`: three parallel lists, each entry
//! carrying src/dst stage and access masks, old/new layout, src/dst
//! queue family, and the target handle + sub-range.

use ash::vk;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryBarrier2 {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferMemoryBarrier2 {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageMemoryBarrier2 {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub image: vk::Image,
    pub subresource_range: vk::ImageSubresourceRange,
}

/// Three parallel lists of barriers to be recorded together as one
/// `vkCmdPipelineBarrier2` (or, in legacy mode, one `vkCmdPipelineBarrier`
/// call per translated masks-compatible group).
#[derive(Clone, Debug, Default)]
pub struct BarrierBatch {
    pub memory: Vec<MemoryBarrier2>,
    pub buffer: Vec<BufferMemoryBarrier2>,
    pub image: Vec<ImageMemoryBarrier2>,
}

impl BarrierBatch {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.buffer.is_empty() && self.image.is_empty()
    }

    pub fn merge(&mut self, other: BarrierBatch) {
        self.memory.extend(other.memory);
        self.buffer.extend(other.buffer);
        self.image.extend(other.image);
    }
}

/// Any pipeline-stage-2 bit with no legacy (`PipelineStageFlags`)
/// counterpart collapses to `ALL_COMMANDS`, per §4.2's batching rule:
/// "any unmappable stage 2 bits force `ALL_COMMANDS`".
pub fn sanitize_stage2_to_legacy(stage: vk::PipelineStageFlags2) -> vk::PipelineStageFlags {
    if stage.is_empty() {
        return vk::PipelineStageFlags::empty();
    }

    const PAIRS: &[(vk::PipelineStageFlags2, vk::PipelineStageFlags)] = &[
        (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (vk::PipelineStageFlags2::DRAW_INDIRECT, vk::PipelineStageFlags::DRAW_INDIRECT),
        (vk::PipelineStageFlags2::VERTEX_INPUT, vk::PipelineStageFlags::VERTEX_INPUT),
        (vk::PipelineStageFlags2::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        (
            vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        (vk::PipelineStageFlags2::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (vk::PipelineStageFlags2::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        (vk::PipelineStageFlags2::HOST, vk::PipelineStageFlags::HOST),
        (vk::PipelineStageFlags2::ALL_GRAPHICS, vk::PipelineStageFlags::ALL_GRAPHICS),
        (vk::PipelineStageFlags2::ALL_COMMANDS, vk::PipelineStageFlags::ALL_COMMANDS),
    ];

    let mut legacy = vk::PipelineStageFlags::empty();
    let mut remaining = stage;
    for (stage2_bit, legacy_bit) in PAIRS {
        if remaining.contains(*stage2_bit) {
            legacy |= *legacy_bit;
            remaining &= !*stage2_bit;
        }
    }

    if !remaining.is_empty() {
        legacy |= vk::PipelineStageFlags::ALL_COMMANDS;
    }

    legacy
}

pub fn sanitize_access2_to_legacy(access: vk::AccessFlags2) -> vk::AccessFlags {
    const PAIRS: &[(vk::AccessFlags2, vk::AccessFlags)] = &[
        (vk::AccessFlags2::INDIRECT_COMMAND_READ, vk::AccessFlags::INDIRECT_COMMAND_READ),
        (vk::AccessFlags2::INDEX_READ, vk::AccessFlags::INDEX_READ),
        (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, vk::AccessFlags::VERTEX_ATTRIBUTE_READ),
        (vk::AccessFlags2::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
        (
            vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            vk::AccessFlags::COLOR_ATTACHMENT_READ,
        ),
        (
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        (
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (vk::AccessFlags2::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (vk::AccessFlags2::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (vk::AccessFlags2::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
        (vk::AccessFlags2::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
        (vk::AccessFlags2::HOST_READ, vk::AccessFlags::HOST_READ),
        (vk::AccessFlags2::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
        (vk::AccessFlags2::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
        (vk::AccessFlags2::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
    ];

    let mut legacy = vk::AccessFlags::empty();
    let mut remaining = access;
    for (access2_bit, legacy_bit) in PAIRS {
        if remaining.contains(*access2_bit) {
            legacy |= *legacy_bit;
            remaining &= !*access2_bit;
        }
    }
    legacy
}

/// Records a batch either as `vkCmdPipelineBarrier2` (preferred) or as a
/// legacy `vkCmdPipelineBarrier` with sanitized 32-bit masks, matching the
/// round-trip law in spec §8: "Serializing a `BarrierBatch` to
/// Synchronization2 then collapsing back to legacy yields equivalent
/// synchronization when all stage-2 bits map to legacy bits."
pub fn record(device: &ash::Device, cb: vk::CommandBuffer, batch: &BarrierBatch, synchronization2: bool) {
    if batch.is_empty() {
        return;
    }

    if synchronization2 {
        record_sync2(device, cb, batch);
    } else {
        record_legacy(device, cb, batch);
    }
}

fn record_sync2(device: &ash::Device, cb: vk::CommandBuffer, batch: &BarrierBatch) {
    let memory_barriers: Vec<vk::MemoryBarrier2> = batch
        .memory
        .iter()
        .map(|b| {
            vk::MemoryBarrier2::builder()
                .src_stage_mask(b.src_stage)
                .src_access_mask(b.src_access)
                .dst_stage_mask(b.dst_stage)
                .dst_access_mask(b.dst_access)
                .build()
        })
        .collect();

    let buffer_barriers: Vec<vk::BufferMemoryBarrier2> = batch
        .buffer
        .iter()
        .map(|b| {
            vk::BufferMemoryBarrier2::builder()
                .src_stage_mask(b.src_stage)
                .src_access_mask(b.src_access)
                .dst_stage_mask(b.dst_stage)
                .dst_access_mask(b.dst_access)
                .src_queue_family_index(b.src_queue_family)
                .dst_queue_family_index(b.dst_queue_family)
                .buffer(b.buffer)
                .offset(b.offset)
                .size(b.size)
                .build()
        })
        .collect();

    let image_barriers: Vec<vk::ImageMemoryBarrier2> = batch
        .image
        .iter()
        .map(|b| {
            vk::ImageMemoryBarrier2::builder()
                .src_stage_mask(b.src_stage)
                .src_access_mask(b.src_access)
                .dst_stage_mask(b.dst_stage)
                .dst_access_mask(b.dst_access)
                .old_layout(b.old_layout)
                .new_layout(b.new_layout)
                .src_queue_family_index(b.src_queue_family)
                .dst_queue_family_index(b.dst_queue_family)
                .image(b.image)
                .subresource_range(b.subresource_range)
                .build()
        })
        .collect();

    let dependency_info = vk::DependencyInfo::builder()
        .memory_barriers(&memory_barriers)
        .buffer_memory_barriers(&buffer_barriers)
        .image_memory_barriers(&image_barriers)
        .build();

    unsafe {
        device.cmd_pipeline_barrier2(cb, &dependency_info);
    }
}

fn record_legacy(device: &ash::Device, cb: vk::CommandBuffer, batch: &BarrierBatch) {
    let mut src_stage = vk::PipelineStageFlags::empty();
    let mut dst_stage = vk::PipelineStageFlags::empty();

    let memory_barriers: Vec<vk::MemoryBarrier> = batch
        .memory
        .iter()
        .map(|b| {
            src_stage |= sanitize_stage2_to_legacy(b.src_stage);
            dst_stage |= sanitize_stage2_to_legacy(b.dst_stage);
            vk::MemoryBarrier::builder()
                .src_access_mask(sanitize_access2_to_legacy(b.src_access))
                .dst_access_mask(sanitize_access2_to_legacy(b.dst_access))
                .build()
        })
        .collect();

    let buffer_barriers: Vec<vk::BufferMemoryBarrier> = batch
        .buffer
        .iter()
        .map(|b| {
            src_stage |= sanitize_stage2_to_legacy(b.src_stage);
            dst_stage |= sanitize_stage2_to_legacy(b.dst_stage);
            vk::BufferMemoryBarrier::builder()
                .src_access_mask(sanitize_access2_to_legacy(b.src_access))
                .dst_access_mask(sanitize_access2_to_legacy(b.dst_access))
                .src_queue_family_index(b.src_queue_family)
                .dst_queue_family_index(b.dst_queue_family)
                .buffer(b.buffer)
                .offset(b.offset)
                .size(b.size)
                .build()
        })
        .collect();

    let image_barriers: Vec<vk::ImageMemoryBarrier> = batch
        .image
        .iter()
        .map(|b| {
            src_stage |= sanitize_stage2_to_legacy(b.src_stage);
            dst_stage |= sanitize_stage2_to_legacy(b.dst_stage);
            vk::ImageMemoryBarrier::builder()
                .src_access_mask(sanitize_access2_to_legacy(b.src_access))
                .dst_access_mask(sanitize_access2_to_legacy(b.dst_access))
                .old_layout(b.old_layout)
                .new_layout(b.new_layout)
                .src_queue_family_index(b.src_queue_family)
                .dst_queue_family_index(b.dst_queue_family)
                .image(b.image)
                .subresource_range(b.subresource_range)
                .build()
        })
        .collect();

    if src_stage.is_empty() {
        src_stage = vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if dst_stage.is_empty() {
        dst_stage = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }

    unsafe {
        device.cmd_pipeline_barrier(
            cb,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &memory_barriers,
            &buffer_barriers,
            &image_barriers,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmappable_stage2_bits_fall_back_to_all_commands() {
        let legacy = sanitize_stage2_to_legacy(vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR);
        assert_eq!(legacy, vk::PipelineStageFlags::ALL_COMMANDS);
    }

    #[test]
    fn mappable_stage2_bits_round_trip_exactly() {
        let legacy = sanitize_stage2_to_legacy(vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::TRANSFER);
        assert_eq!(legacy, vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn empty_stage_maps_to_empty() {
        assert_eq!(sanitize_stage2_to_legacy(vk::PipelineStageFlags2::empty()), vk::PipelineStageFlags::empty());
    }
}
