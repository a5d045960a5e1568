//! Colors.

/// An RGBA color with components between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Color {
        Color { r, g, b, a }
    }

    pub const fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b, a: 1. }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Color> {
        let digits = hex.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f64::from(v) / 255.);

        match digits.len() {
            3 => {
                let mut c = digits.chars().map(|c| c.to_digit(16).map(|v| f64::from(v * 17) / 255.));
                Some(Color::rgb(c.next()??, c.next()??, c.next()??))
            }
            6 | 8 => {
                let r = channel(&digits[0..2])?;
                let g = channel(&digits[2..4])?;
                let b = channel(&digits[4..6])?;
                let a = if digits.len() == 8 {
                    channel(&digits[6..8])?
                } else {
                    1.
                };
                Some(Color::rgba(r, g, b, a))
            }
            _ => None,
        }
    }
}
