//! Draw-style attributes carried by samples and groups for rendering backends.

use std::fmt;

use pit_core::{Error, Result};
use serde::{Deserialize, Deserializer};

use crate::config::SampleType;

/// RGBA color; channels in `[0, 255]`, alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| (h.len() == 6 || h.len() == 8) && h.is_ascii())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "color should be in the format '#RRGGBB' or '#RRGGBBAA' (got {:?})",
                    s
                ))
            })?;
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| Error::Validation(format!("invalid hex digits in color {:?}", s)))
        };
        let a = if hex.len() == 8 { channel(6)? as f64 / 255.0 } else { 1.0 };
        Ok(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (self.a - 1.0).abs() < 1e-6 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "{}{:02x}", self.to_hex(), (self.a * 255.0).round() as u8)
        }
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Style options shared by files and groups.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PlotStyle {
    pub legend: Option<String>,
    pub legend_style: Option<String>,
    pub legend_order: i64,
    pub drawing_options: Option<String>,
    pub marker_size: Option<f64>,
    pub marker_color: Option<Color>,
    pub marker_type: Option<i64>,
    pub fill_color: Option<Color>,
    pub fill_type: Option<i64>,
    pub line_width: Option<f64>,
    pub line_color: Option<Color>,
    pub line_type: Option<i64>,
}

impl PlotStyle {
    /// Fill in the type-dependent defaults for legend style and drawing options.
    pub fn with_type_defaults(mut self, sample_type: SampleType) -> Self {
        if self.legend_style.is_none() {
            self.legend_style = Some(
                match sample_type {
                    SampleType::Mc => "lf",
                    SampleType::Signal => "l",
                    SampleType::Data => "pe",
                }
                .to_string(),
            );
        }
        if self.drawing_options.as_deref().is_none_or(str::is_empty) {
            self.drawing_options = Some(
                match sample_type {
                    SampleType::Mc | SampleType::Signal => "hist",
                    SampleType::Data => "pe",
                }
                .to_string(),
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb_and_rgba() {
        let c = Color::parse("#FF8000").unwrap();
        assert_eq!((c.r, c.g, c.b), (255, 128, 0));
        assert_eq!(c.a, 1.0);
        assert_eq!(c.to_string(), "#ff8000");

        let c = Color::parse("#00000080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-12);
        assert_eq!(c.to_string(), "#00000080");
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["FF8000", "#FF80", "#GG8000", "#FF800000FF"] {
            assert!(Color::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn type_defaults() {
        let s = PlotStyle::default().with_type_defaults(SampleType::Data);
        assert_eq!(s.drawing_options.as_deref(), Some("pe"));
        assert_eq!(s.legend_style.as_deref(), Some("pe"));

        let s = PlotStyle { drawing_options: Some("e2".into()), ..Default::default() }
            .with_type_defaults(SampleType::Mc);
        assert_eq!(s.drawing_options.as_deref(), Some("e2"));
        assert_eq!(s.legend_style.as_deref(), Some("lf"));
    }
}
