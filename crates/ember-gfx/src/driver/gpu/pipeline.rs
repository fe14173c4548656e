//! Render pipelines keyed by draw state.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::driver::{Blend, BlendFactor, BlendOperation, ShaderId, VERTEX_FLOAT_COUNT};

pub(super) const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

/// Stencil usage of one pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) enum StencilPass {
    /// No stencil attachment.
    None,
    /// Color writes off; front faces increment, back faces decrement.
    WriteNonZero,
    /// Color writes off; every face inverts.
    WriteEvenOdd,
    /// Shade where the stencil is non-zero and zero it.
    Test,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub shader: ShaderId,
    pub blend: Blend,
    pub stencil: StencilPass,
}

// ── uniforms ──────────────────────────────────────────────────────────────

/// Engine-owned uniform block, mirrored by `Frame` in the WGSL prelude.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct FrameUniform {
    pub dst_size: [f32; 2],
    pub src_size: [f32; 2],
    pub src_region_min: [f32; 2],
    pub src_region_max: [f32; 2],
    pub src_offsets: [[f32; 2]; 3],
    pub _pad: [f32; 2], // 16-byte alignment
}

// ── vertex layout ─────────────────────────────────────────────────────────

const VERTEX_ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x2,
    1 => Float32x2,
    2 => Float32x4,
    3 => Float32x4,
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (VERTEX_FLOAT_COUNT * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

// ── blend ─────────────────────────────────────────────────────────────────

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
    }
}

fn blend_operation(op: BlendOperation) -> wgpu::BlendOperation {
    match op {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
    }
}

pub(super) fn blend_state(b: Blend) -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(b.src_rgb),
            dst_factor: blend_factor(b.dst_rgb),
            operation: blend_operation(b.op_rgb),
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(b.src_alpha),
            dst_factor: blend_factor(b.dst_alpha),
            operation: blend_operation(b.op_alpha),
        },
    }
}

// ── stencil ───────────────────────────────────────────────────────────────

fn stencil_face(compare: wgpu::CompareFunction, pass_op: wgpu::StencilOperation) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    }
}

fn depth_stencil_state(pass: StencilPass) -> Option<wgpu::DepthStencilState> {
    use wgpu::{CompareFunction as Cmp, StencilOperation as Op};
    let (front, back) = match pass {
        StencilPass::None => return None,
        StencilPass::WriteNonZero => (
            stencil_face(Cmp::Always, Op::IncrementWrap),
            stencil_face(Cmp::Always, Op::DecrementWrap),
        ),
        StencilPass::WriteEvenOdd => (
            stencil_face(Cmp::Always, Op::Invert),
            stencil_face(Cmp::Always, Op::Invert),
        ),
        StencilPass::Test => (
            stencil_face(Cmp::NotEqual, Op::Zero),
            stencil_face(Cmp::NotEqual, Op::Zero),
        ),
    };
    Some(wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState {
            front,
            back,
            read_mask: 0xff,
            write_mask: 0xff,
        },
        bias: wgpu::DepthBiasState::default(),
    })
}

// ── cache ─────────────────────────────────────────────────────────────────

/// Flat pipeline storage plus a key index.
#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: Vec<wgpu::RenderPipeline>,
    index: HashMap<PipelineKey, usize>,
}

impl PipelineCache {
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Drops every pipeline built from `shader`.
    pub fn forget_shader(&mut self, shader: ShaderId) {
        let stale: Vec<_> = self
            .index
            .keys()
            .filter(|k| k.shader == shader)
            .copied()
            .collect();
        for key in stale {
            self.index.remove(&key);
        }
        // Slots stay allocated; indices of live keys remain valid.
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.index.get(key).map(|&i| &self.pipelines[i])
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
        key: PipelineKey,
    ) -> &wgpu::RenderPipeline {
        if let Some(&i) = self.index.get(&key) {
            return &self.pipelines[i];
        }

        log::debug!("building pipeline {key:?} ({} cached)", self.len());
        let write_mask = match key.stencil {
            StencilPass::WriteNonZero | StencilPass::WriteEvenOdd => wgpu::ColorWrites::empty(),
            StencilPass::None | StencilPass::Test => wgpu::ColorWrites::ALL,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ember draw pipeline"),
            layout: Some(layout),

            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(blend_state(key.blend)),
                    write_mask,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Facing is an input to the stencil programs; nothing is culled.
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },

            depth_stencil: depth_stencil_state(key.stencil),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.push(pipeline);
        let i = self.pipelines.len() - 1;
        self.index.insert(key, i);
        &self.pipelines[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<FrameUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<FrameUniform>(), 64);
    }

    #[test]
    fn source_over_maps_to_premultiplied_blend() {
        let s = blend_state(Blend::SOURCE_OVER);
        assert_eq!(s.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(s.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(s.alpha.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn stencil_write_passes_disable_color() {
        assert!(depth_stencil_state(StencilPass::None).is_none());
        let ds = depth_stencil_state(StencilPass::WriteEvenOdd).unwrap();
        assert_eq!(ds.stencil.front.pass_op, wgpu::StencilOperation::Invert);
        let ds = depth_stencil_state(StencilPass::Test).unwrap();
        assert_eq!(ds.stencil.back.compare, wgpu::CompareFunction::NotEqual);
    }
}
