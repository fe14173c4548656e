//! Alpha conversion at the straight-alpha boundary.
//!
//! The engine stores premultiplied RGBA8 internally. Decoded images and
//! encoders expect straight alpha.

/// Converts straight RGBA8 to premultiplied in place.
pub fn premultiply(pix: &mut [u8]) {
    for px in pix.chunks_exact_mut(4) {
        let a = px[3] as u32;
        for c in &mut px[..3] {
            *c = ((*c as u32 * a + 127) / 255) as u8;
        }
    }
}

/// Converts premultiplied RGBA8 to straight in place.
///
/// Fully transparent pixels become `0,0,0,0`.
pub fn unpremultiply(pix: &mut [u8]) {
    for px in pix.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
