//! Tunables for the atlas and the drivers.

/// Atlas placement parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Initial page edge of a new source backend.
    pub min_source_size: u32,

    /// Initial page edge of a new destination backend.
    pub min_destination_size: u32,

    /// Overrides the backend size cap.
    ///
    /// `None` uses the largest power of two not above the driver's
    /// `max_image_size()`, resolved on the first frame.
    pub max_size: Option<u32>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            min_source_size: 1024,
            min_destination_size: 16,
            max_size: None,
        }
    }
}

impl AtlasConfig {
    /// Small sizes used by tests so packing and doubling kick in early.
    pub fn for_tests() -> Self {
        Self {
            min_source_size: 256,
            min_destination_size: 16,
            max_size: Some(4096),
        }
    }
}

/// Parameters for the CPU reference driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareDriverConfig {
    /// Value reported by `max_image_size()`.
    pub max_image_size: u32,
}

impl Default for SoftwareDriverConfig {
    fn default() -> Self {
        Self {
            max_image_size: 4096,
        }
    }
}

/// Largest power of two that is `<= x`. Returns 0 for 0.
pub fn floor_pow2(x: u32) -> u32 {
    if x == 0 {
        return 0;
    }
    1 << (31 - x.leading_zeros())
}
