// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bitmap fonts: an image with all glyphs plus a json file with per-glyph
//! metrics. The metrics json has the layout
//! `{ "first_char": n, "last_char": n, "height": n, "metrics": [...] }` where
//! `metrics` holds 7 numbers per glyph: posX, posY, sizeX, sizeY, offsetX,
//! offsetY, advance.

use platform::Platform;
use serde::Deserialize;

use crate::color::Rgba;
use crate::geom::{vec2, Vec2};
use crate::image::{Image, Images};
use crate::render::Render;

#[derive(Debug, Deserialize)]
struct FontDef {
    first_char: i32,
    last_char: i32,
    height: i32,
    metrics: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    pos: Vec2,
    size: Vec2,
    offset: Vec2,
    advance: i32,
}

/// Horizontal anchoring for [`Font::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontAlign {
    Left,
    Center,
    Right,
}

/// A loaded bitmap font. See the module docs for the asset layout.
pub struct Font {
    /// The line height when drawing multi-line text. Increase for more line
    /// spacing.
    pub line_height: i32,
    /// Extra spacing between letters on a single line. Default 0.
    pub letter_spacing: i32,
    /// A tint color for this font. Default white.
    pub color: Rgba,

    first_char: i32,
    last_char: i32,
    image: Image,
    glyphs: Vec<Glyph>,
}

impl Font {
    /// Load a font from its glyph image and metrics json paths. Malformed
    /// metrics are fatal.
    pub fn load(
        platform: &dyn Platform,
        images: &mut Images,
        image_path: &str,
        definition_path: &str,
    ) -> Font {
        let image = images.load(platform, image_path);

        let bytes = platform
            .load_asset(definition_path)
            .unwrap_or_else(|| panic!("couldn't load font definition json {definition_path}"));
        let def: FontDef = serde_json::from_slice(&bytes)
            .unwrap_or_else(|err| panic!("malformed font definition {definition_path}: {err}"));

        let expected_chars = (def.last_char - def.first_char) as usize;
        assert_eq!(
            def.metrics.len(),
            expected_chars * 7,
            "font metrics has incorrect length (expected {} have {})",
            expected_chars,
            def.metrics.len() / 7
        );

        let glyphs = def
            .metrics
            .chunks_exact(7)
            .map(|m| Glyph {
                pos: vec2(m[0], m[1]),
                size: vec2(m[2], m[3]),
                offset: vec2(m[4], m[5]),
                advance: m[6] as i32,
            })
            .collect();

        Font {
            line_height: def.height,
            letter_spacing: 0,
            color: Rgba::WHITE,
            first_char: def.first_char,
            last_char: def.last_char,
            image,
            glyphs,
        }
    }

    fn glyph(&self, c: u8) -> Option<&Glyph> {
        let c = c as i32;
        if c >= self.first_char && c <= self.last_char {
            self.glyphs.get((c - self.first_char) as usize)
        } else {
            None
        }
    }

    /// The width in pixels of the first line of `text`.
    pub fn line_width(&self, text: &str) -> i32 {
        let mut width = 0;
        for c in text.bytes() {
            if c == b'\n' {
                break;
            }
            if let Some(glyph) = self.glyph(c) {
                width += glyph.advance + self.letter_spacing;
            }
        }
        i32::max(0, width - self.letter_spacing)
    }

    /// Draw some text; `\n` starts a new line. `pos` is the anchor position,
    /// where y is the top of the characters (not the baseline) and x is the
    /// left, right or center according to `align`.
    pub fn draw(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        pos: Vec2,
        text: &str,
        align: FontAlign,
    ) {
        let mut pos = pos;
        for line in text.split('\n') {
            self.draw_line(render, platform, pos, line, align);
            pos.y += self.line_height as f32;
        }
    }

    fn draw_line(
        &self,
        render: &mut Render,
        platform: &dyn Platform,
        mut pos: Vec2,
        line: &str,
        align: FontAlign,
    ) {
        if align == FontAlign::Center || align == FontAlign::Right {
            let width = self.line_width(line);
            pos.x -= match align {
                FontAlign::Center => (width / 2) as f32,
                _ => width as f32,
            };
        }

        for c in line.bytes() {
            if let Some(glyph) = self.glyph(c) {
                self.image.draw_ex(
                    render,
                    platform,
                    glyph.pos,
                    glyph.size,
                    pos + glyph.offset,
                    glyph.size,
                    self.color,
                );
                pos.x += (glyph.advance + self.letter_spacing) as f32;
            }
        }
    }
}
