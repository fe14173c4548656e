/// Blend factor applied to the source or destination term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    DstAlpha,
    OneMinusSrcAlpha,
    OneMinusDstAlpha,
    DstColor,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
}

/// Fixed-function blend state, split into color and alpha components.
///
/// Colors are premultiplied. `result = op(src * src_factor, dst * dst_factor)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Blend {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub op_rgb: BlendOperation,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub op_alpha: BlendOperation,
}

impl Blend {
    const fn uniform(src: BlendFactor, dst: BlendFactor, op: BlendOperation) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            op_rgb: op,
            src_alpha: src,
            dst_alpha: dst,
            op_alpha: op,
        }
    }

    /// Replaces the destination.
    pub const COPY: Blend = Blend::uniform(BlendFactor::One, BlendFactor::Zero, BlendOperation::Add);

    /// Premultiplied source-over.
    pub const SOURCE_OVER: Blend = Blend::uniform(
        BlendFactor::One,
        BlendFactor::OneMinusSrcAlpha,
        BlendOperation::Add,
    );

    /// Additive; used to accumulate stencil counts.
    pub const LIGHTER: Blend = Blend::uniform(BlendFactor::One, BlendFactor::One, BlendOperation::Add);

    /// Writes transparent black.
    pub const CLEAR: Blend = Blend::uniform(BlendFactor::Zero, BlendFactor::Zero, BlendOperation::Add);

    /// Evaluates the blend for one premultiplied RGBA pixel in `[0, 1]`.
    pub fn apply(&self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for c in 0..3 {
            let s = src[c] * factor(self.src_rgb, c, src, dst);
            let d = dst[c] * factor(self.dst_rgb, c, src, dst);
            out[c] = operate(self.op_rgb, s, d);
        }
        let s = src[3] * factor(self.src_alpha, 3, src, dst);
        let d = dst[3] * factor(self.dst_alpha, 3, src, dst);
        out[3] = operate(self.op_alpha, s, d);
        out.map(|v| v.clamp(0.0, 1.0))
    }
}

impl Default for Blend {
    fn default() -> Self {
        Blend::SOURCE_OVER
    }
}

fn factor(f: BlendFactor, channel: usize, src: [f32; 4], dst: [f32; 4]) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFactor::OneMinusDstAlpha => 1.0 - dst[3],
        BlendFactor::DstColor => dst[channel],
    }
}

fn operate(op: BlendOperation, s: f32, d: f32) -> f32 {
    match op {
        BlendOperation::Add => s + d,
        BlendOperation::Subtract => s - d,
        BlendOperation::ReverseSubtract => d - s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_replaces_destination() {
        let out = Blend::COPY.apply([0.2, 0.3, 0.4, 0.5], [1.0; 4]);
        assert_eq!(out, [0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn source_over_opaque_source_wins() {
        let out = Blend::SOURCE_OVER.apply([1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(out, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn lighter_accumulates_and_saturates() {
        let out = Blend::LIGHTER.apply([0.75, 0.0, 0.0, 0.0], [0.5, 0.25, 0.0, 0.0]);
        assert_eq!(out, [1.0, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn reverse_subtract_uses_destination_first() {
        let b = Blend::uniform(BlendFactor::One, BlendFactor::One, BlendOperation::ReverseSubtract);
        let out = b.apply([0.25; 4], [0.75; 4]);
        assert_eq!(out, [0.5; 4]);
    }
}
