use super::fingerprint::{SourceHash, fingerprint};

/// Texel filter for copy programs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Behavior when sampling outside the source region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Clamped to the texture only; reads may bleed past the region.
    Unsafe,
    /// Transparent outside the region.
    ClampToZero,
    /// Wraps inside the region.
    Repeat,
}

/// Every program the engine itself issues.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    /// `sample(src0, src_pos) * color`.
    Copy { filter: Filter, address: Address },
    /// The vertex color.
    Solid,
    /// Stencil count accumulation for fan triangles.
    StencilFill,
    /// Stencil count correction for quadratic segments.
    StencilBezier,
    /// Stencil coverage to color.
    Resolve { even_odd: bool, antialias: bool },
}

macro_rules! wgsl {
    ($($file:literal),+ $(,)?) => {
        concat!($(include_str!(concat!("wgsl/", $file))),+)
    };
}

const COPY_NEAREST_UNSAFE: &str = wgsl!("prelude.wgsl", "address_unsafe.wgsl", "filter_nearest.wgsl", "copy.wgsl");
const COPY_NEAREST_CLAMP: &str = wgsl!("prelude.wgsl", "address_clamp_to_zero.wgsl", "filter_nearest.wgsl", "copy.wgsl");
const COPY_NEAREST_REPEAT: &str = wgsl!("prelude.wgsl", "address_repeat.wgsl", "filter_nearest.wgsl", "copy.wgsl");
const COPY_LINEAR_UNSAFE: &str = wgsl!("prelude.wgsl", "address_unsafe.wgsl", "filter_linear.wgsl", "copy.wgsl");
const COPY_LINEAR_CLAMP: &str = wgsl!("prelude.wgsl", "address_clamp_to_zero.wgsl", "filter_linear.wgsl", "copy.wgsl");
const COPY_LINEAR_REPEAT: &str = wgsl!("prelude.wgsl", "address_repeat.wgsl", "filter_linear.wgsl", "copy.wgsl");
const SOLID: &str = wgsl!("prelude.wgsl", "solid.wgsl");
const STENCIL_FILL: &str = wgsl!("prelude.wgsl", "stencil_fill.wgsl");
const STENCIL_BEZIER: &str = wgsl!("prelude.wgsl", "stencil_bezier.wgsl");
const RESOLVE_NON_ZERO: &str = wgsl!("prelude.wgsl", "resolve_common.wgsl", "rule_non_zero.wgsl", "resolve.wgsl");
const RESOLVE_NON_ZERO_AA: &str = wgsl!("prelude.wgsl", "resolve_common.wgsl", "rule_non_zero.wgsl", "resolve_aa.wgsl");
const RESOLVE_EVEN_ODD: &str = wgsl!("prelude.wgsl", "resolve_common.wgsl", "rule_even_odd.wgsl", "resolve.wgsl");
const RESOLVE_EVEN_ODD_AA: &str = wgsl!("prelude.wgsl", "resolve_common.wgsl", "rule_even_odd.wgsl", "resolve_aa.wgsl");

impl BuiltinShader {
    /// The nearest-neighbor copy used for moving pixels between backends.
    pub const COPY: BuiltinShader = BuiltinShader::Copy {
        filter: Filter::Nearest,
        address: Address::Unsafe,
    };

    pub const ALL: [BuiltinShader; 13] = [
        BuiltinShader::Copy { filter: Filter::Nearest, address: Address::Unsafe },
        BuiltinShader::Copy { filter: Filter::Nearest, address: Address::ClampToZero },
        BuiltinShader::Copy { filter: Filter::Nearest, address: Address::Repeat },
        BuiltinShader::Copy { filter: Filter::Linear, address: Address::Unsafe },
        BuiltinShader::Copy { filter: Filter::Linear, address: Address::ClampToZero },
        BuiltinShader::Copy { filter: Filter::Linear, address: Address::Repeat },
        BuiltinShader::Solid,
        BuiltinShader::StencilFill,
        BuiltinShader::StencilBezier,
        BuiltinShader::Resolve { even_odd: false, antialias: false },
        BuiltinShader::Resolve { even_odd: false, antialias: true },
        BuiltinShader::Resolve { even_odd: true, antialias: false },
        BuiltinShader::Resolve { even_odd: true, antialias: true },
    ];

    /// WGSL source of the variant.
    pub fn source(self) -> &'static str {
        use Address::*;
        use Filter::*;
        match self {
            BuiltinShader::Copy { filter: Nearest, address: Unsafe } => COPY_NEAREST_UNSAFE,
            BuiltinShader::Copy { filter: Nearest, address: ClampToZero } => COPY_NEAREST_CLAMP,
            BuiltinShader::Copy { filter: Nearest, address: Repeat } => COPY_NEAREST_REPEAT,
            BuiltinShader::Copy { filter: Linear, address: Unsafe } => COPY_LINEAR_UNSAFE,
            BuiltinShader::Copy { filter: Linear, address: ClampToZero } => COPY_LINEAR_CLAMP,
            BuiltinShader::Copy { filter: Linear, address: Repeat } => COPY_LINEAR_REPEAT,
            BuiltinShader::Solid => SOLID,
            BuiltinShader::StencilFill => STENCIL_FILL,
            BuiltinShader::StencilBezier => STENCIL_BEZIER,
            BuiltinShader::Resolve { even_odd: false, antialias: false } => RESOLVE_NON_ZERO,
            BuiltinShader::Resolve { even_odd: false, antialias: true } => RESOLVE_NON_ZERO_AA,
            BuiltinShader::Resolve { even_odd: true, antialias: false } => RESOLVE_EVEN_ODD,
            BuiltinShader::Resolve { even_odd: true, antialias: true } => RESOLVE_EVEN_ODD_AA,
        }
    }

    pub fn fingerprint(self) -> SourceHash {
        fingerprint(self.source())
    }

    /// Finds the variant whose source hashes to `hash`.
    pub fn from_fingerprint(hash: SourceHash) -> Option<BuiltinShader> {
        Self::ALL.into_iter().find(|s| s.fingerprint() == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for s in BuiltinShader::ALL {
            assert!(seen.insert(s.fingerprint()), "duplicate fingerprint for {s:?}");
        }
    }

    #[test]
    fn lookup_round_trips_every_variant() {
        for s in BuiltinShader::ALL {
            assert_eq!(BuiltinShader::from_fingerprint(s.fingerprint()), Some(s));
        }
        assert_eq!(BuiltinShader::from_fingerprint(crate::shader::fingerprint("nope")), None);
    }

    #[test]
    fn every_variant_has_entry_points() {
        for s in BuiltinShader::ALL {
            let src = s.source();
            assert!(src.contains("fn vs_main"), "{s:?}");
            assert!(src.contains("fn fs_main"), "{s:?}");
        }
    }
}
