//! Resource declarations: the vocabulary a renderer author writes
//! against when describing what a pass touches. Concrete (externally
//! owned) resources carry a handle and the state they're in when the
//! graph starts; transient resources carry only shape parameters, and
//! the graph allocates (and possibly aliases) their backing memory.

use ash::vk;

/// Opaque dense id, stable within one compiled graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
}

impl AccessKind {
    pub fn is_write(self) -> bool {
        matches!(self, AccessKind::Write | AccessKind::ReadWrite)
    }

    pub fn is_read(self) -> bool {
        matches!(self, AccessKind::Read | AccessKind::ReadWrite)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum BufferShape {
    Concrete {
        handle: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
    Transient {
        size: vk::DeviceSize,
        alignment: vk::DeviceSize,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum ImageShape {
    Concrete {
        handle: vk::Image,
        subresource_range: vk::ImageSubresourceRange,
    },
    Transient {
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        image_type: vk::ImageType,
        mip_levels: u32,
        array_layers: u32,
        samples: vk::SampleCountFlags,
    },
}

impl ImageShape {
    /// Two transient image shapes are compatible (may share an alias
    /// slot) when format/usage/type/mip/array/samples match exactly.
    pub fn compatible_transient(a: &ImageShape, b: &ImageShape) -> bool {
        match (a, b) {
            (
                ImageShape::Transient {
                    format: fa,
                    usage: ua,
                    image_type: ta,
                    mip_levels: ma,
                    array_layers: aa,
                    samples: sa,
                    ..
                },
                ImageShape::Transient {
                    format: fb,
                    usage: ub,
                    image_type: tb,
                    mip_levels: mb,
                    array_layers: ab,
                    samples: sb,
                    ..
                },
            ) => fa == fb && ua == ub && ta == tb && ma == mb && aa == ab && sa == sb,
            _ => false,
        }
    }

    /// The alias slot's shape is the component-wise maximum extent over
    /// every resource assigned to it; other parameters must already
    /// match for the resources to be compatible.
    pub fn widen(self, other: &ImageShape) -> ImageShape {
        match (self, other) {
            (
                ImageShape::Transient {
                    mut extent,
                    format,
                    usage,
                    image_type,
                    mip_levels,
                    array_layers,
                    samples,
                },
                ImageShape::Transient { extent: other_extent, .. },
            ) => {
                extent.width = extent.width.max(other_extent.width);
                extent.height = extent.height.max(other_extent.height);
                extent.depth = extent.depth.max(other_extent.depth);
                ImageShape::Transient {
                    extent,
                    format,
                    usage,
                    image_type,
                    mip_levels,
                    array_layers,
                    samples,
                }
            }
            (shape, _) => shape,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ResourceKind {
    Global,
    Buffer(BufferShape),
    Image(ImageShape),
}

/// 64-bit alias tag. Zero is a wildcard: a zero-tagged transient may
/// share a slot with any other zero-tagged transient of compatible
/// shape; a nonzero tag only matches the same nonzero tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AliasClass(pub u64);

impl AliasClass {
    pub const WILDCARD: AliasClass = AliasClass(0);

    pub fn compatible_with(self, other: AliasClass) -> bool {
        self == AliasClass::WILDCARD || other == AliasClass::WILDCARD || self == other
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub transient: bool,
    pub alias_class: AliasClass,
    pub initial_stage_mask: vk::PipelineStageFlags2,
    pub initial_access_mask: vk::AccessFlags2,
    pub initial_layout: vk::ImageLayout,
    pub initial_queue_family: Option<u32>,
}

impl ResourceDescriptor {
    pub fn global(initial_stage_mask: vk::PipelineStageFlags2, initial_access_mask: vk::AccessFlags2) -> Self {
        Self {
            kind: ResourceKind::Global,
            transient: false,
            alias_class: AliasClass::WILDCARD,
            initial_stage_mask,
            initial_access_mask,
            initial_layout: vk::ImageLayout::UNDEFINED,
            initial_queue_family: None,
        }
    }

    pub fn buffer(handle: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, queue_family: u32) -> Self {
        Self {
            kind: ResourceKind::Buffer(BufferShape::Concrete { handle, offset, size }),
            transient: false,
            alias_class: AliasClass::WILDCARD,
            initial_stage_mask: vk::PipelineStageFlags2::empty(),
            initial_access_mask: vk::AccessFlags2::empty(),
            initial_layout: vk::ImageLayout::UNDEFINED,
            initial_queue_family: Some(queue_family),
        }
    }

    pub fn transient_buffer(size: vk::DeviceSize, alignment: vk::DeviceSize, alias_class: AliasClass) -> Self {
        Self {
            kind: ResourceKind::Buffer(BufferShape::Transient { size, alignment }),
            transient: true,
            alias_class,
            initial_stage_mask: vk::PipelineStageFlags2::empty(),
            initial_access_mask: vk::AccessFlags2::empty(),
            initial_layout: vk::ImageLayout::UNDEFINED,
            initial_queue_family: None,
        }
    }

    pub fn image(handle: vk::Image, subresource_range: vk::ImageSubresourceRange, initial_layout: vk::ImageLayout, queue_family: u32) -> Self {
        Self {
            kind: ResourceKind::Image(ImageShape::Concrete { handle, subresource_range }),
            transient: false,
            alias_class: AliasClass::WILDCARD,
            initial_stage_mask: vk::PipelineStageFlags2::empty(),
            initial_access_mask: vk::AccessFlags2::empty(),
            initial_layout,
            initial_queue_family: Some(queue_family),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transient_image(
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        image_type: vk::ImageType,
        mip_levels: u32,
        array_layers: u32,
        samples: vk::SampleCountFlags,
        alias_class: AliasClass,
    ) -> Self {
        Self {
            kind: ResourceKind::Image(ImageShape::Transient {
                extent,
                format,
                usage,
                image_type,
                mip_levels,
                array_layers,
                samples,
            }),
            transient: true,
            alias_class,
            initial_stage_mask: vk::PipelineStageFlags2::empty(),
            initial_access_mask: vk::AccessFlags2::empty(),
            initial_layout: vk::ImageLayout::UNDEFINED,
            initial_queue_family: None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ResourceKind::Image(_))
    }
}

/// One pass's declared use of one resource. The sole source of truth
/// from which barriers and inter-pass dependencies are derived.
#[derive(Clone, Copy, Debug)]
pub struct ResourceUsage {
    pub resource: ResourceId,
    pub access: AccessKind,
    pub stage_mask: vk::PipelineStageFlags2,
    pub access_mask: vk::AccessFlags2,
    pub layout: Option<vk::ImageLayout>,
    pub subresource_range: Option<vk::ImageSubresourceRange>,
    pub buffer_range: Option<(vk::DeviceSize, vk::DeviceSize)>,
    pub queue_family: Option<u32>,
}

impl ResourceUsage {
    pub fn new(resource: ResourceId, access: AccessKind, stage_mask: vk::PipelineStageFlags2, access_mask: vk::AccessFlags2) -> Self {
        Self {
            resource,
            access,
            stage_mask,
            access_mask,
            layout: None,
            subresource_range: None,
            buffer_range: None,
            queue_family: None,
        }
    }

    pub fn with_layout(mut self, layout: vk::ImageLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_subresource_range(mut self, range: vk::ImageSubresourceRange) -> Self {
        self.subresource_range = Some(range);
        self
    }

    pub fn with_buffer_range(mut self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.buffer_range = Some((offset, size));
        self
    }

    pub fn with_queue_family(mut self, family: u32) -> Self {
        self.queue_family = Some(family);
        self
    }

    /// Whether this usage's sub-range overlaps `other`'s on the same
    /// resource. Buffers compare byte ranges; images compare
    /// subresource ranges on (mip, array layer); missing ranges are
    /// treated as "whole resource" and always overlap.
    pub fn overlaps(&self, other: &ResourceUsage) -> bool {
        match (self.buffer_range, other.buffer_range) {
            (Some((a_off, a_size)), Some((b_off, b_size))) => a_off < b_off + b_size && b_off < a_off + a_size,
            _ => match (self.subresource_range, other.subresource_range) {
                (Some(a), Some(b)) => {
                    let mip_overlap = a.base_mip_level < b.base_mip_level + b.level_count && b.base_mip_level < a.base_mip_level + a.level_count;
                    let layer_overlap =
                        a.base_array_layer < b.base_array_layer + b.layer_count && b.base_array_layer < a.base_array_layer + a.layer_count;
                    mip_overlap && layer_overlap
                }
                _ => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(resource: ResourceId, access: AccessKind) -> ResourceUsage {
        ResourceUsage::new(resource, access, vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::empty())
    }

    #[test]
    fn whole_resource_usages_always_overlap() {
        let a = usage(ResourceId(0), AccessKind::Read);
        let b = usage(ResourceId(0), AccessKind::Write);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn disjoint_buffer_ranges_do_not_overlap() {
        let a = usage(ResourceId(0), AccessKind::Read).with_buffer_range(0, 16);
        let b = usage(ResourceId(0), AccessKind::Write).with_buffer_range(16, 16);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn touching_buffer_ranges_overlap_when_they_share_a_byte() {
        let a = usage(ResourceId(0), AccessKind::Read).with_buffer_range(0, 17);
        let b = usage(ResourceId(0), AccessKind::Write).with_buffer_range(16, 16);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn disjoint_mip_ranges_do_not_overlap() {
        let range_a = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let range_b = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 1,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let a = usage(ResourceId(0), AccessKind::Read).with_subresource_range(range_a);
        let b = usage(ResourceId(0), AccessKind::Write).with_subresource_range(range_b);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn disjoint_array_layers_do_not_overlap_even_with_shared_mip() {
        let range_a = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let range_b = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 1,
            layer_count: 1,
        };
        let a = usage(ResourceId(0), AccessKind::Read).with_subresource_range(range_a);
        let b = usage(ResourceId(0), AccessKind::Write).with_subresource_range(range_b);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn alias_class_wildcard_matches_anything() {
        assert!(AliasClass::WILDCARD.compatible_with(AliasClass(7)));
        assert!(AliasClass(7).compatible_with(AliasClass::WILDCARD));
        assert!(AliasClass::WILDCARD.compatible_with(AliasClass::WILDCARD));
    }

    #[test]
    fn alias_class_distinct_nonzero_tags_do_not_match() {
        assert!(!AliasClass(1).compatible_with(AliasClass(2)));
        assert!(AliasClass(1).compatible_with(AliasClass(1)));
    }

    fn transient_image(width: u32, height: u32) -> ImageShape {
        ImageShape::Transient {
            extent: vk::Extent3D { width, height, depth: 1 },
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_type: vk::ImageType::TYPE_2D,
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }

    #[test]
    fn transient_image_shapes_compatible_ignoring_extent() {
        let a = transient_image(512, 512);
        let b = transient_image(1024, 256);
        assert!(ImageShape::compatible_transient(&a, &b));
    }

    #[test]
    fn transient_image_shapes_incompatible_on_format_mismatch() {
        let a = transient_image(512, 512);
        let b = ImageShape::Transient {
            format: vk::Format::R32_SFLOAT,
            ..transient_image(512, 512)
        };
        assert!(!ImageShape::compatible_transient(&a, &b));
    }

    #[test]
    fn concrete_image_shapes_are_never_alias_compatible() {
        let concrete = ImageShape::Concrete {
            handle: vk::Image::null(),
            subresource_range: vk::ImageSubresourceRange::default(),
        };
        let transient = transient_image(512, 512);
        assert!(!ImageShape::compatible_transient(&concrete, &transient));
    }

    #[test]
    fn widen_takes_the_component_wise_max_extent() {
        let a = transient_image(512, 128);
        let b = transient_image(256, 512);
        let widened = a.widen(&b);
        match widened {
            ImageShape::Transient { extent, .. } => {
                assert_eq!(extent.width, 512);
                assert_eq!(extent.height, 512);
            }
            _ => panic!("expected transient shape"),
        }
    }
}
