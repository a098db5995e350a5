//! Dependency/barrier inference, topological scheduling, and transient
//! resource lifetime analysis with greedy aliasing. This is the part of
//! the render task graph that runs once per frame, before any GPU
//! command is recorded.

use std::collections::{HashMap, HashSet, VecDeque};

use ash::vk;
use thiserror::Error;

use crate::pass::{PassId, PassNode};
use crate::resource::{AccessKind, AliasClass, ImageShape, ResourceDescriptor, ResourceId, ResourceKind, ResourceUsage};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("validation failure: {0}")]
    Validation(&'static str),
    #[error("validation failure: {0}: {1}")]
    ValidationWithDetail(&'static str, String),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GraphMemoryBarrier {
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

#[derive(Clone, Copy, Debug)]
pub struct GraphBufferBarrier {
    pub resource: ResourceId,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

#[derive(Clone, Copy, Debug)]
pub struct GraphImageBarrier {
    pub resource: ResourceId,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub subresource_range: vk::ImageSubresourceRange,
}

/// Three parallel lists of barriers attached to one pass's incoming or
/// outgoing side. Unlike [`rg_rhi::BarrierBatch`] these reference a
/// [`ResourceId`] rather than a raw Vulkan handle; the graph resolves
/// them to real handles right before recording, once transient
/// resources have concrete backing.
#[derive(Clone, Debug, Default)]
pub struct BarrierBatch {
    pub memory: Vec<GraphMemoryBarrier>,
    pub buffer: Vec<GraphBufferBarrier>,
    pub image: Vec<GraphImageBarrier>,
}

impl BarrierBatch {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.buffer.is_empty() && self.image.is_empty()
    }
}

/// The decision §4.1 derives from comparing a source and destination
/// usage of the same resource.
#[derive(Clone, Copy, Debug)]
pub struct SyncContractDecision {
    pub requires_memory_barrier: bool,
    pub requires_queue_ownership_transfer: bool,
    pub requires_layout_transition: bool,
    pub requires_execution_dependency: bool,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub src_layout: vk::ImageLayout,
    pub dst_layout: vk::ImageLayout,
}

/// Either a real usage from a pass, or the resource's declared initial
/// state, used uniformly as the "source" side of a sync decision.
#[derive(Clone, Copy, Debug)]
struct DecisionSource {
    is_write: bool,
    stage_mask: vk::PipelineStageFlags2,
    access_mask: vk::AccessFlags2,
    layout: Option<vk::ImageLayout>,
    queue_family: Option<u32>,
}

impl DecisionSource {
    fn from_usage(usage: &ResourceUsage) -> Self {
        Self {
            is_write: usage.access.is_write(),
            stage_mask: usage.stage_mask,
            access_mask: usage.access_mask,
            layout: usage.layout,
            queue_family: usage.queue_family,
        }
    }

    fn from_initial(descriptor: &ResourceDescriptor) -> Self {
        Self {
            is_write: false,
            stage_mask: descriptor.initial_stage_mask,
            access_mask: descriptor.initial_access_mask,
            layout: if descriptor.is_image() { Some(descriptor.initial_layout) } else { None },
            queue_family: descriptor.initial_queue_family,
        }
    }
}

fn decide(source: DecisionSource, dest: &ResourceUsage, descriptor: &ResourceDescriptor) -> Result<SyncContractDecision, CompileError> {
    let requires_memory_barrier = source.is_write || dest.access.is_write();

    let requires_queue_ownership_transfer = match (source.queue_family, dest.queue_family) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    let is_image = descriptor.is_image();
    let (mut src_layout, mut dst_layout) = match (source.layout, dest.layout) {
        (Some(a), Some(b)) => (a, b),
        (Some(a), None) => (a, a),
        (None, Some(b)) => (b, b),
        (None, None) => (vk::ImageLayout::UNDEFINED, vk::ImageLayout::UNDEFINED),
    };

    // Layout defaulting forward/backward across UNDEFINED.
    if is_image {
        if src_layout == vk::ImageLayout::UNDEFINED && dst_layout != vk::ImageLayout::UNDEFINED {
            src_layout = dst_layout;
        } else if dst_layout == vk::ImageLayout::UNDEFINED && src_layout != vk::ImageLayout::UNDEFINED {
            dst_layout = src_layout;
        }
    }

    let requires_layout_transition = is_image && src_layout != dst_layout;
    let requires_execution_dependency = requires_memory_barrier || requires_queue_ownership_transfer || requires_layout_transition;

    let mut src_stage = source.stage_mask;
    let mut dst_stage = dest.stage_mask;

    if requires_execution_dependency {
        if src_stage.is_empty() && dst_stage.is_empty() {
            return Err(CompileError::Validation(
                "execution dependency requires at least one non-zero stage mask",
            ));
        }
        if src_stage.is_empty() {
            src_stage = vk::PipelineStageFlags2::ALL_COMMANDS;
        }
        if dst_stage.is_empty() {
            dst_stage = vk::PipelineStageFlags2::ALL_COMMANDS;
        }
    }

    Ok(SyncContractDecision {
        requires_memory_barrier,
        requires_queue_ownership_transfer,
        requires_layout_transition,
        requires_execution_dependency,
        src_stage,
        dst_stage,
        src_layout,
        dst_layout,
    })
}

fn validate_usage(usage: &ResourceUsage, descriptor: &ResourceDescriptor) -> Result<(), CompileError> {
    if !usage.access_mask.is_empty() && usage.stage_mask.is_empty() {
        return Err(CompileError::Validation("non-zero access mask with a zero stage mask"));
    }
    if usage.access.is_write() && descriptor.is_image() && usage.layout.is_none() {
        return Err(CompileError::Validation("write usage of an image with no explicit layout"));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
struct UsageRef {
    pass: PassId,
    usage: ResourceUsage,
}

struct ResourceState {
    last_writer: Option<UsageRef>,
    readers: Vec<UsageRef>,
}

fn push_barrier(
    batch: &mut BarrierBatch,
    decision: &SyncContractDecision,
    resource: ResourceId,
    descriptor: &ResourceDescriptor,
    usage: &ResourceUsage,
    src_queue_family: u32,
    dst_queue_family: u32,
) {
    match &descriptor.kind {
        ResourceKind::Global => batch.memory.push(GraphMemoryBarrier {
            src_stage: decision.src_stage,
            src_access: usage.access_mask,
            dst_stage: decision.dst_stage,
            dst_access: usage.access_mask,
        }),
        ResourceKind::Buffer(_) => {
            let (offset, size) = usage.buffer_range.unwrap_or((0, vk::WHOLE_SIZE));
            batch.buffer.push(GraphBufferBarrier {
                resource,
                src_stage: decision.src_stage,
                src_access: usage.access_mask,
                dst_stage: decision.dst_stage,
                dst_access: usage.access_mask,
                src_queue_family,
                dst_queue_family,
                offset,
                size,
            });
        }
        ResourceKind::Image(_) => {
            let subresource_range = usage.subresource_range.unwrap_or(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });
            batch.image.push(GraphImageBarrier {
                resource,
                src_stage: decision.src_stage,
                src_access: usage.access_mask,
                dst_stage: decision.dst_stage,
                dst_access: usage.access_mask,
                old_layout: decision.src_layout,
                new_layout: decision.dst_layout,
                src_queue_family,
                dst_queue_family,
                subresource_range,
            });
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransientLifetime {
    pub resource: ResourceId,
    pub first_use_order: usize,
    pub last_use_order: usize,
}

#[derive(Clone, Debug)]
pub struct AliasAllocation {
    pub resources: Vec<ResourceId>,
    pub shape: Option<ImageShape>,
    pub buffer_size: Option<vk::DeviceSize>,
    pub(crate) last_use_order: usize,
    pub(crate) alias_class: AliasClass,
    pub(crate) is_image: bool,
}

pub struct CompiledGraph {
    pub topological_order: Vec<PassId>,
    pub level_by_pass: Vec<u32>,
    pub levels: Vec<Vec<PassId>>,
    pub incoming_barriers: Vec<BarrierBatch>,
    pub outgoing_barriers: Vec<BarrierBatch>,
    pub edges: Vec<(PassId, PassId)>,
    pub lifetimes: Vec<TransientLifetime>,
    pub alias_allocations: Vec<AliasAllocation>,
    pub alias_slot_by_resource: HashMap<ResourceId, usize>,
}

/// Walks passes in insertion order, inferring dependency edges and
/// barriers per §4.1, then computes a Kahn-style topological schedule
/// and transient resource aliasing.
pub fn compile(passes: &[PassNode], resources: &[ResourceDescriptor]) -> Result<CompiledGraph, CompileError> {
    let pass_count = passes.len();
    let mut incoming_barriers: Vec<BarrierBatch> = (0..pass_count).map(|_| BarrierBatch::default()).collect();
    let mut outgoing_barriers: Vec<BarrierBatch> = (0..pass_count).map(|_| BarrierBatch::default()).collect();
    let mut edge_set: HashSet<(PassId, PassId)> = HashSet::new();
    let mut edges: Vec<(PassId, PassId)> = Vec::new();

    let mut states: HashMap<ResourceId, ResourceState> = HashMap::new();

    let mut add_edge = |edge_set: &mut HashSet<(PassId, PassId)>, edges: &mut Vec<(PassId, PassId)>, from: PassId, to: PassId| {
        if edge_set.insert((from, to)) {
            edges.push((from, to));
        }
    };

    for (pass_index, pass) in passes.iter().enumerate() {
        let pass_id = PassId(pass_index);

        for usage in &pass.usages {
            let resource_index = usage.resource.0 as usize;
            let descriptor = resources
                .get(resource_index)
                .ok_or(CompileError::Validation("usage references an unregistered resource id"))?;

            validate_usage(usage, descriptor)?;

            let state = states.entry(usage.resource).or_insert_with(|| ResourceState {
                last_writer: None,
                readers: Vec::new(),
            });

            if let Some(writer) = state.last_writer {
                if writer.usage.overlaps(usage) {
                    let decision = decide(DecisionSource::from_usage(&writer.usage), usage, descriptor)?;
                    if decision.requires_execution_dependency {
                        add_edge(&mut edge_set, &mut edges, writer.pass, pass_id);

                        let src_family = writer.usage.queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);
                        let dst_family = usage.queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);

                        if decision.requires_queue_ownership_transfer {
                            let mut release_decision = decision;
                            release_decision.dst_stage = vk::PipelineStageFlags2::NONE;
                            push_barrier(
                                &mut outgoing_barriers[writer.pass.0],
                                &release_decision,
                                usage.resource,
                                descriptor,
                                &writer.usage,
                                src_family,
                                dst_family,
                            );

                            let mut acquire_decision = decision;
                            acquire_decision.src_stage = vk::PipelineStageFlags2::NONE;
                            push_barrier(
                                &mut incoming_barriers[pass_id.0],
                                &acquire_decision,
                                usage.resource,
                                descriptor,
                                usage,
                                src_family,
                                dst_family,
                            );
                        } else {
                            push_barrier(
                                &mut incoming_barriers[pass_id.0],
                                &decision,
                                usage.resource,
                                descriptor,
                                usage,
                                src_family,
                                dst_family,
                            );
                        }
                    }
                }
            }

            if usage.access.is_write() {
                for reader in state.readers.drain(..) {
                    if reader.usage.overlaps(usage) {
                        let decision = decide(DecisionSource::from_usage(&reader.usage), usage, descriptor)?;
                        if decision.requires_execution_dependency {
                            add_edge(&mut edge_set, &mut edges, reader.pass, pass_id);
                            let src_family = reader.usage.queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);
                            let dst_family = usage.queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);
                            push_barrier(
                                &mut incoming_barriers[pass_id.0],
                                &decision,
                                usage.resource,
                                descriptor,
                                usage,
                                src_family,
                                dst_family,
                            );
                        }
                    }
                }
                state.readers.clear();
                state.last_writer = Some(UsageRef { pass: pass_id, usage: *usage });
            } else {
                if state.last_writer.is_none() {
                    let decision = decide(DecisionSource::from_initial(descriptor), usage, descriptor)?;
                    if decision.requires_execution_dependency {
                        let dst_family = usage.queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);
                        let src_family = descriptor.initial_queue_family.unwrap_or(vk::QUEUE_FAMILY_IGNORED);
                        push_barrier(
                            &mut incoming_barriers[pass_id.0],
                            &decision,
                            usage.resource,
                            descriptor,
                            usage,
                            src_family,
                            dst_family,
                        );
                    }
                }
                state.readers.push(UsageRef { pass: pass_id, usage: *usage });
            }
        }
    }

    let (topological_order, level_by_pass, levels) = topological_schedule(pass_count, &edges)?;

    let (lifetimes, alias_allocations, alias_slot_by_resource) = plan_transients(resources, passes, &topological_order);

    Ok(CompiledGraph {
        topological_order,
        level_by_pass,
        levels,
        incoming_barriers,
        outgoing_barriers,
        edges,
        lifetimes,
        alias_allocations,
        alias_slot_by_resource,
    })
}

fn topological_schedule(pass_count: usize, edges: &[(PassId, PassId)]) -> Result<(Vec<PassId>, Vec<u32>, Vec<Vec<PassId>>), CompileError> {
    let mut adjacency: Vec<Vec<PassId>> = vec![Vec::new(); pass_count];
    let mut in_degree: Vec<u32> = vec![0; pass_count];

    for &(from, to) in edges {
        adjacency[from.0].push(to);
        in_degree[to.0] += 1;
    }

    let mut topological_order = Vec::with_capacity(pass_count);
    let mut level_by_pass = vec![0u32; pass_count];
    let mut levels: Vec<Vec<PassId>> = Vec::new();

    let mut remaining_in_degree = in_degree.clone();
    let mut ready: VecDeque<PassId> = (0..pass_count)
        .filter(|&i| remaining_in_degree[i] == 0)
        .map(PassId)
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let mut ready_vec: Vec<PassId> = ready.drain(..).collect();
    ready_vec.sort_by_key(|p| p.0);

    let mut current_level = ready_vec;
    let mut level_index = 0u32;

    while !current_level.is_empty() {
        levels.push(current_level.clone());
        let mut next_level: Vec<PassId> = Vec::new();

        for &pass_id in &current_level {
            level_by_pass[pass_id.0] = level_index;
            topological_order.push(pass_id);

            for &next in &adjacency[pass_id.0] {
                remaining_in_degree[next.0] -= 1;
                if remaining_in_degree[next.0] == 0 {
                    next_level.push(next);
                }
            }
        }

        next_level.sort_by_key(|p| p.0);
        current_level = next_level;
        level_index += 1;
    }

    if topological_order.len() != pass_count {
        return Err(CompileError::Validation("dependency_cycle_detected"));
    }

    Ok((topological_order, level_by_pass, levels))
}

fn plan_transients(
    resources: &[ResourceDescriptor],
    passes: &[PassNode],
    topological_order: &[PassId],
) -> (Vec<TransientLifetime>, Vec<AliasAllocation>, HashMap<ResourceId, usize>) {
    let mut order_of_pass = vec![0usize; passes.len()];
    for (order, &pass_id) in topological_order.iter().enumerate() {
        order_of_pass[pass_id.0] = order;
    }

    let mut first_use: HashMap<ResourceId, usize> = HashMap::new();
    let mut last_use: HashMap<ResourceId, usize> = HashMap::new();

    for (pass_index, pass) in passes.iter().enumerate() {
        let order = order_of_pass[pass_index];
        for usage in &pass.usages {
            let resource_index = usage.resource.0 as usize;
            if !resources.get(resource_index).map(|r| r.transient).unwrap_or(false) {
                continue;
            }
            first_use.entry(usage.resource).and_modify(|v| *v = (*v).min(order)).or_insert(order);
            last_use.entry(usage.resource).and_modify(|v| *v = (*v).max(order)).or_insert(order);
        }
    }

    let mut lifetimes: Vec<TransientLifetime> = first_use
        .iter()
        .map(|(&resource, &first)| TransientLifetime {
            resource,
            first_use_order: first,
            last_use_order: last_use[&resource],
        })
        .collect();

    lifetimes.sort_by_key(|l| (l.first_use_order, l.resource.0));

    let mut alias_allocations: Vec<AliasAllocation> = Vec::new();
    let mut alias_slot_by_resource: HashMap<ResourceId, usize> = HashMap::new();

    for lifetime in &lifetimes {
        let descriptor = &resources[lifetime.resource.0 as usize];
        let is_image = descriptor.is_image();

        let mut chosen_slot = None;
        for (slot_index, slot) in alias_allocations.iter().enumerate() {
            if slot.is_image != is_image {
                continue;
            }
            if !slot.alias_class.compatible_with(descriptor.alias_class) {
                continue;
            }
            if slot.last_use_order >= lifetime.first_use_order {
                continue;
            }

            let shape_compatible = if is_image {
                match (&slot.shape, &descriptor.kind) {
                    (Some(slot_shape), ResourceKind::Image(resource_shape)) => ImageShape::compatible_transient(slot_shape, resource_shape),
                    _ => false,
                }
            } else {
                true
            };

            if shape_compatible {
                chosen_slot = Some(slot_index);
                break;
            }
        }

        match chosen_slot {
            Some(slot_index) => {
                let slot = &mut alias_allocations[slot_index];
                slot.resources.push(lifetime.resource);
                slot.last_use_order = lifetime.last_use_order;
                if is_image {
                    if let (Some(existing), ResourceKind::Image(new_shape)) = (slot.shape, &descriptor.kind) {
                        slot.shape = Some(existing.widen(new_shape));
                    }
                } else if let ResourceKind::Buffer(crate::resource::BufferShape::Transient { size, .. }) = descriptor.kind {
                    slot.buffer_size = Some(slot.buffer_size.unwrap_or(0).max(size));
                }
                alias_slot_by_resource.insert(lifetime.resource, slot_index);
            }
            None => {
                let slot_index = alias_allocations.len();
                let (shape, buffer_size) = match &descriptor.kind {
                    ResourceKind::Image(image_shape) => (Some(*image_shape), None),
                    ResourceKind::Buffer(crate::resource::BufferShape::Transient { size, .. }) => (None, Some(*size)),
                    _ => (None, None),
                };
                alias_allocations.push(AliasAllocation {
                    resources: vec![lifetime.resource],
                    shape,
                    buffer_size,
                    last_use_order: lifetime.last_use_order,
                    alias_class: descriptor.alias_class,
                    is_image,
                });
                alias_slot_by_resource.insert(lifetime.resource, slot_index);
            }
        }
    }

    (lifetimes, alias_allocations, alias_slot_by_resource)
}

#[cfg(test)]
mod tests {
    use rg_rhi::QueueClass;

    use super::*;
    use crate::pass::PassNode;

    fn noop_pass(usages: Vec<ResourceUsage>) -> PassNode {
        PassNode::new(QueueClass::Graphics, usages, Box::new(|_, _, _| Ok(())))
    }

    fn global_resource() -> ResourceDescriptor {
        ResourceDescriptor::global(vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty())
    }

    #[test]
    fn independent_passes_land_in_the_same_level() {
        let resources = vec![global_resource(), global_resource()];
        let passes = vec![
            noop_pass(vec![ResourceUsage::new(
                ResourceId(0),
                AccessKind::Write,
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::MEMORY_WRITE,
            )]),
            noop_pass(vec![ResourceUsage::new(
                ResourceId(1),
                AccessKind::Write,
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::MEMORY_WRITE,
            )]),
        ];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.levels.len(), 1);
        assert_eq!(compiled.levels[0].len(), 2);
        assert!(compiled.edges.is_empty());
    }

    #[test]
    fn write_then_read_creates_an_edge_and_an_incoming_barrier() {
        let resources = vec![global_resource()];
        let write_usage = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        );
        let read_usage = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Read,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_READ,
        );
        let passes = vec![noop_pass(vec![write_usage]), noop_pass(vec![read_usage])];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.edges, vec![(PassId(0), PassId(1))]);
        assert_eq!(compiled.topological_order, vec![PassId(0), PassId(1)]);
        assert_eq!(compiled.level_by_pass, vec![0, 1]);
        assert!(!compiled.incoming_barriers[1].is_empty());
        assert!(compiled.outgoing_barriers[0].is_empty());
    }

    #[test]
    fn two_overlapping_readers_do_not_serialize_against_each_other() {
        let resources = vec![global_resource()];
        let write_usage = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        );
        let read_usage = || {
            ResourceUsage::new(
                ResourceId(0),
                AccessKind::Read,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
            )
        };
        let passes = vec![noop_pass(vec![write_usage]), noop_pass(vec![read_usage()]), noop_pass(vec![read_usage()])];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.levels.len(), 2);
        assert_eq!(compiled.levels[1].len(), 2);
        assert!(!compiled.edges.contains(&(PassId(1), PassId(2))));
        assert!(!compiled.edges.contains(&(PassId(2), PassId(1))));
    }

    #[test]
    fn a_dependency_cycle_is_rejected() {
        // compile() can never construct a cycle on its own (usages are
        // processed in insertion order), so exercise the scheduler
        // directly with a hand-built edge list.
        let edges = vec![(PassId(0), PassId(1)), (PassId(1), PassId(0))];
        let result = topological_schedule(2, &edges);
        assert!(matches!(result, Err(CompileError::Validation("dependency_cycle_detected"))));
    }

    #[test]
    fn zero_stage_execution_dependency_is_rejected() {
        let resources = vec![global_resource()];
        let write_usage = ResourceUsage::new(ResourceId(0), AccessKind::Write, vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty());
        let read_usage = ResourceUsage::new(ResourceId(0), AccessKind::Read, vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty());
        let passes = vec![noop_pass(vec![write_usage]), noop_pass(vec![read_usage])];

        let result = compile(&passes, &resources);
        assert!(matches!(result, Err(CompileError::Validation(_))));
    }

    #[test]
    fn undefined_layout_defaults_forward_to_the_destination_layout() {
        let descriptor = ResourceDescriptor::transient_image(
            vk::Extent3D { width: 64, height: 64, depth: 1 },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageType::TYPE_2D,
            1,
            1,
            vk::SampleCountFlags::TYPE_1,
            AliasClass::WILDCARD,
        );
        let dest = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        )
        .with_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let decision = decide(DecisionSource::from_initial(&descriptor), &dest, &descriptor).expect("decide");
        assert_eq!(decision.src_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(decision.dst_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert!(!decision.requires_layout_transition);
    }

    #[test]
    fn distinct_layouts_require_a_transition() {
        let descriptor = ResourceDescriptor::image(vk::Image::null(), vk::ImageSubresourceRange::default(), vk::ImageLayout::UNDEFINED, 0);
        let source = DecisionSource {
            is_write: false,
            stage_mask: vk::PipelineStageFlags2::TOP_OF_PIPE,
            access_mask: vk::AccessFlags2::empty(),
            layout: Some(vk::ImageLayout::UNDEFINED),
            queue_family: Some(0),
        };
        let dest = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        )
        .with_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .with_queue_family(0);

        let decision = decide(source, &dest, &descriptor).expect("decide");
        assert!(decision.requires_layout_transition);
        assert!(decision.requires_execution_dependency);
    }

    #[test]
    fn cross_queue_family_requires_ownership_transfer() {
        let descriptor = ResourceDescriptor::buffer(vk::Buffer::null(), 0, 256, 0);
        let source = DecisionSource {
            is_write: true,
            stage_mask: vk::PipelineStageFlags2::TRANSFER,
            access_mask: vk::AccessFlags2::TRANSFER_WRITE,
            layout: None,
            queue_family: Some(0),
        };
        let dest = ResourceUsage::new(
            ResourceId(0),
            AccessKind::Read,
            vk::PipelineStageFlags2::VERTEX_SHADER,
            vk::AccessFlags2::SHADER_READ,
        )
        .with_queue_family(1);

        let decision = decide(source, &dest, &descriptor).expect("decide");
        assert!(decision.requires_queue_ownership_transfer);
    }

    fn transient_buffer_resource(size: vk::DeviceSize, alias_class: AliasClass) -> ResourceDescriptor {
        ResourceDescriptor::transient_buffer(size, 256, alias_class)
    }

    #[test]
    fn non_overlapping_transients_of_the_same_alias_class_share_a_slot() {
        // resource 0 lives in pass 0 only, resource 1 lives in pass 1
        // only: their lifetimes never overlap so they should alias.
        let resources = vec![transient_buffer_resource(1024, AliasClass::WILDCARD), transient_buffer_resource(512, AliasClass::WILDCARD)];
        let passes = vec![
            noop_pass(vec![ResourceUsage::new(
                ResourceId(0),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            )]),
            noop_pass(vec![ResourceUsage::new(
                ResourceId(1),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            )]),
        ];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.alias_allocations.len(), 1);
        assert_eq!(compiled.alias_allocations[0].buffer_size, Some(1024));
        assert_eq!(compiled.alias_slot_by_resource[&ResourceId(0)], compiled.alias_slot_by_resource[&ResourceId(1)]);
    }

    #[test]
    fn distinct_nonzero_alias_classes_never_share_a_slot() {
        let resources = vec![transient_buffer_resource(1024, AliasClass(1)), transient_buffer_resource(512, AliasClass(2))];
        let passes = vec![
            noop_pass(vec![ResourceUsage::new(
                ResourceId(0),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            )]),
            noop_pass(vec![ResourceUsage::new(
                ResourceId(1),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            )]),
        ];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.alias_allocations.len(), 2);
        assert_ne!(compiled.alias_slot_by_resource[&ResourceId(0)], compiled.alias_slot_by_resource[&ResourceId(1)]);
    }

    #[test]
    fn overlapping_lifetimes_never_share_a_slot() {
        let resources = vec![transient_buffer_resource(1024, AliasClass::WILDCARD), transient_buffer_resource(512, AliasClass::WILDCARD)];
        // both resources are touched by the same pass, so their
        // lifetimes overlap and must not alias.
        let passes = vec![noop_pass(vec![
            ResourceUsage::new(
                ResourceId(0),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            ),
            ResourceUsage::new(
                ResourceId(1),
                AccessKind::Write,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
            ),
        ])];

        let compiled = compile(&passes, &resources).expect("compile");
        assert_eq!(compiled.alias_allocations.len(), 2);
    }

    #[test]
    fn plan_transients_ignores_non_transient_resources() {
        let resources = vec![global_resource()];
        let passes = vec![noop_pass(vec![ResourceUsage::new(
            ResourceId(0),
            AccessKind::Write,
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_WRITE,
        )])];

        let compiled = compile(&passes, &resources).expect("compile");
        assert!(compiled.lifetimes.is_empty());
        assert!(compiled.alias_allocations.is_empty());
    }
}
