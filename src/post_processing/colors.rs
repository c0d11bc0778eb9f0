use crate::{
    error::{RenderError, RenderResult},
    post_processing::color_map::Color,
};

const NAMED_COLORS: [(&str, [u8; 3]); 18] = [
    ("blue", [0, 0, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("orange", [255, 165, 0]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("purple", [128, 0, 128]),
    ("brown", [165, 42, 42]),
    ("pink", [255, 192, 203]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("lightblue", [173, 216, 230]),
    ("darkblue", [0, 0, 139]),
];

fn from_u8(rgb: [u8; 3]) -> Color {
    Color::new(rgb[0] as f64 / 255., rgb[1] as f64 / 255., rgb[2] as f64 / 255.)
}

/// Parses a color given by name (`"blue"`), as `#rrggbb` or as `#rgb`.
pub fn parse_color(spec: &str) -> RenderResult<Color> {
    let s = spec.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        let digits: Option<Vec<u8>> = hex.chars().map(|c| c.to_digit(16).map(|d| d as u8)).collect();
        return match digits.as_deref() {
            Some(&[r1, r0, g1, g0, b1, b0]) => Ok(from_u8([r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0])),
            Some(&[r, g, b]) => Ok(from_u8([r * 17, g * 17, b * 17])),
            _ => Err(RenderError::InvalidColor(spec.to_string())),
        };
    }

    let s = s.replace([' ', '_'], "");
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, rgb)| from_u8(*rgb))
        .ok_or_else(|| RenderError::InvalidColor(spec.to_string()))
}

/// Shades a sphere marker: brighter towards the highlight, darker at the rim.
pub fn shade(color: Color, factor: f64) -> Color {
    color.map(|c| (c * factor).clamp(0., 1.))
}

pub fn highlight(color: Color, amount: f64) -> Color {
    color.map(|c| c + (1. - c) * amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors() {
        assert_eq!(parse_color("blue").unwrap(), Color::new(0., 0., 1.));
        assert_eq!(parse_color(" Light Blue ").unwrap(), from_u8([173, 216, 230]));
        assert_eq!(parse_color("dark_blue").unwrap(), from_u8([0, 0, 139]));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_color("#ff0000").unwrap(), Color::new(1., 0., 0.));
        assert_eq!(parse_color("#0F0").unwrap(), Color::new(0., 1., 0.));
    }

    #[test]
    fn invalid_colors() {
        assert!(matches!(parse_color("ultraviolet"), Err(RenderError::InvalidColor(_))));
        assert!(matches!(parse_color("#12345"), Err(RenderError::InvalidColor(_))));
        assert!(matches!(parse_color("#gg0000"), Err(RenderError::InvalidColor(_))));
    }

    #[test]
    fn shading_stays_in_unit_range() {
        let c = Color::new(0.8, 0.4, 0.0);
        assert_eq!(shade(c, 2.), Color::new(1., 0.8, 0.));
        assert!((highlight(c, 1.) - Color::new(1., 1., 1.)).norm() < 1e-12);
    }
}
