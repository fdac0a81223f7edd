//! Adalight frame codec used by Skydimo strip controllers
//!
//! Frame layout: `['A', 'd', 'a', 0x00, 0x00, count] [r g b]...`
//!
//! The count byte saturates at 255, but the pixel region always carries one
//! triple per configured LED.

use crate::types::Rgb;

/// Magic marker that opens every frame
pub const MAGIC: [u8; 3] = *b"Ada";

/// Bytes before the first pixel
pub const HEADER_SIZE: usize = 6;

/// Bytes per LED (R, G, B)
pub const BYTES_PER_LED: usize = 3;

/// Largest LED count the header can express
pub const MAX_HEADER_COUNT: usize = 255;

/// Build the 6-byte frame header for `led_count` LEDs
pub fn build_header(led_count: usize) -> [u8; HEADER_SIZE] {
    [
        MAGIC[0],
        MAGIC[1],
        MAGIC[2],
        0,
        0,
        led_count.min(MAX_HEADER_COUNT) as u8,
    ]
}

/// Total frame length for `led_count` LEDs
pub fn frame_len(led_count: usize) -> usize {
    HEADER_SIZE + led_count * BYTES_PER_LED
}

/// Allocate a frame for `led_count` LEDs with the header written and all
/// pixels black
pub fn resize(led_count: usize) -> Vec<u8> {
    let mut frame = vec![0u8; frame_len(led_count)];
    frame[..HEADER_SIZE].copy_from_slice(&build_header(led_count));
    frame
}

/// Write `color` into every pixel slot of `frame`
///
/// `frame` must have been produced by [`resize`] with the same `led_count`.
pub fn fill(frame: &mut [u8], led_count: usize, color: Rgb) {
    debug_assert_eq!(
        frame.len(),
        frame_len(led_count),
        "frame not sized for {led_count} LEDs"
    );

    let rgb = color.to_bytes();
    for pixel in frame[HEADER_SIZE..]
        .chunks_exact_mut(BYTES_PER_LED)
        .take(led_count)
    {
        pixel.copy_from_slice(&rgb);
    }
}
