//! Text rasterization for text layers.
//!
//! Glyphs are laid out with ab_glyph (kerning + advances) and stamped into
//! the layer's local buffer; fonts come from the system via font-kit, keyed
//! by family/weight/style with a sans-serif fallback.  The first baseline
//! sits one ascent below the top so the text is top-anchored at the layer
//! origin.

use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::canvas::TextStyle;

/// Local buffer size of a freshly inserted text layer.
pub const TEXT_LAYER_WIDTH: u32 = 300;
pub const TEXT_LAYER_HEIGHT: u32 = 100;

/// Load a font by family name from the system, falling back to the generic
/// sans-serif family.  Returns None when no usable font exists at all.
pub fn load_font(family: &str, bold: bool, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = if bold { Weight::BOLD } else { Weight::NORMAL };
    if italic {
        props.style = Style::Italic;
    }

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &props,
        )
        .ok()?;
    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Rasterize `style` into a fresh `width × height` buffer.  Multiline text
/// steps one scaled font height per '\n'.  When no font can be resolved the
/// buffer comes back blank — the layer still exists and stays editable.
pub fn rasterize_text(style: &TextStyle, width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    if style.text.is_empty() {
        return out;
    }
    let Some(font) = load_font(&style.font_family, style.bold, style.italic) else {
        log_warn!(
            "no usable font for family '{}'; text layer left blank",
            style.font_family
        );
        return out;
    };
    draw_text(&mut out, &font, style);
    out
}

fn draw_text(out: &mut RgbaImage, font: &FontArc, style: &TextStyle) {
    let scaled = font.as_scaled(style.font_size);
    let ascent = scaled.ascent();
    let line_height = scaled.height();
    let italic = style.italic;

    let mut baseline = ascent;
    for line in style.text.split('\n') {
        let mut cursor = 0.0f32;
        let mut prev = None;
        for ch in line.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev_id) = prev {
                cursor += scaled.kern(prev_id, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(style.font_size, point(cursor, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let py = bounds.min.y + gy as f32;
                    let mut px = bounds.min.x + gx as f32;
                    if italic {
                        px += (baseline - py) * 0.2;
                    }
                    let (ix, iy) = (px.round() as i32, py.round() as i32);
                    plot(out, ix, iy, style.color, coverage);
                    if style.bold {
                        plot(out, ix + 1, iy, style.color, coverage);
                    }
                });
            }
            cursor += scaled.h_advance(glyph_id);
            prev = Some(glyph_id);
        }
        baseline += line_height;
    }
}

/// Max-coverage stamp: overlapping glyph edges keep the strongest alpha
/// instead of stacking.
fn plot(out: &mut RgbaImage, x: i32, y: i32, color: [u8; 4], coverage: f32) {
    if x < 0 || y < 0 || x >= out.width() as i32 || y >= out.height() as i32 {
        return;
    }
    let alpha = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
    if alpha == 0 {
        return;
    }
    let px = out.get_pixel_mut(x as u32, y as u32);
    if alpha > px[3] {
        *px = Rgba([color[0], color[1], color[2], alpha]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(text: &str) -> TextStyle {
        TextStyle {
            text: text.to_string(),
            ..TextStyle::default()
        }
    }

    #[test]
    fn empty_text_yields_a_blank_buffer_of_the_requested_size() {
        let out = rasterize_text(&style(""), TEXT_LAYER_WIDTH, TEXT_LAYER_HEIGHT);
        assert_eq!(out.dimensions(), (TEXT_LAYER_WIDTH, TEXT_LAYER_HEIGHT));
        assert!(out.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn unknown_family_does_not_panic() {
        // Either the sans-serif fallback kicks in or (fontless machines) the
        // buffer stays blank; both are fine, crashing is not.
        let mut s = style("Hi");
        s.font_family = "No Such Family 9000".to_string();
        let out = rasterize_text(&s, 64, 32);
        assert_eq!(out.dimensions(), (64, 32));
    }

    #[test]
    fn glyphs_carry_the_requested_color_when_a_font_exists() {
        let mut s = style("Hello");
        s.color = [7, 99, 200, 255];
        let out = rasterize_text(&s, TEXT_LAYER_WIDTH, TEXT_LAYER_HEIGHT);
        for px in out.pixels() {
            if px[3] > 0 {
                assert_eq!(&px.0[..3], &[7, 99, 200]);
            }
        }
    }
}
