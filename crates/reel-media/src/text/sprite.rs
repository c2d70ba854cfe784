//! Pre-rendered RGBA overlays composited onto RGB frames.

use image::{ImageBuffer, Rgb, RgbaImage};
use std::ops::{Deref, DerefMut};

/// An RGBA image placed at a fixed position over a frame.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub x: i32,
    pub y: i32,
    pub image: RgbaImage,
}

impl Sprite {
    pub fn new(x: i32, y: i32, image: RgbaImage) -> Self {
        Self { x, y, image }
    }

    /// Alpha-composite onto an RGB frame. Returns whether any pixel changed.
    pub fn composite_onto<C>(&self, frame: &mut ImageBuffer<Rgb<u8>, C>) -> bool
    where
        C: Deref<Target = [u8]> + DerefMut,
    {
        let (fw, fh) = frame.dimensions();
        let mut touched = false;

        for (sx, sy, px) in self.image.enumerate_pixels() {
            let alpha = u16::from(px.0[3]);
            if alpha == 0 {
                continue;
            }
            let x = self.x + sx as i32;
            let y = self.y + sy as i32;
            if x < 0 || y < 0 || x >= fw as i32 || y >= fh as i32 {
                continue;
            }

            let dst = frame.get_pixel_mut(x as u32, y as u32);
            let inv = 255 - alpha;
            for c in 0..3 {
                let blended = (u16::from(px.0[c]) * alpha + u16::from(dst.0[c]) * inv + 127) / 255;
                dst.0[c] = blended as u8;
            }
            touched = true;
        }

        touched
    }
}
