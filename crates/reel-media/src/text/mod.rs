//! Text rasterizing: fonts, glyph painting, and RGBA sprites.

mod font;
mod painter;
mod sprite;

pub use font::{load_font, FontSet};
#[cfg(test)]
pub(crate) use font::fixture_fonts;
pub use painter::{blend_over, fill_rect, split_in_two, Outline, TextPainter};
pub use sprite::Sprite;
