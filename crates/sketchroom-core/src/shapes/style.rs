//! Shape styling and text content.

use serde::{Deserialize, Serialize};

/// Style properties shared by every shape kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeStyle {
    /// Fill color as a CSS color string.
    pub fill_color: String,
    /// Stroke color as a CSS color string.
    pub stroke_color: String,
    /// Stroke width in canvas units.
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    pub opacity: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill_color: "#ffffff".to_string(),
            stroke_color: "#000000".to_string(),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

impl ShapeStyle {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(format!("invalid stroke width {}", self.stroke_width));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(format!("opacity {} is outside [0, 1]", self.opacity));
        }
        Ok(())
    }
}

/// Partial style update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl StylePatch {
    pub(crate) fn apply(&self, style: &mut ShapeStyle) {
        if let Some(fill) = &self.fill_color {
            style.fill_color = fill.clone();
        }
        if let Some(stroke) = &self.stroke_color {
            style.stroke_color = stroke.clone();
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = width;
        }
        if let Some(opacity) = self.opacity {
            style.opacity = opacity;
        }
    }
}

/// Text payload of a text shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextContent {
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
}

impl Default for TextContent {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 16.0,
            font_family: "Arial".to_string(),
        }
    }
}

/// Partial text update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl TextContentPatch {
    pub(crate) fn apply(&self, content: &mut TextContent) {
        if let Some(text) = &self.text {
            content.text = text.clone();
        }
        if let Some(size) = self.font_size {
            content.font_size = size;
        }
        if let Some(family) = &self.font_family {
            content.font_family = family.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_defaults_fill_missing_fields() {
        let style: ShapeStyle = serde_json::from_str(r##"{"strokeColor":"#ff0000"}"##).unwrap();
        assert_eq!(style.stroke_color, "#ff0000");
        assert_eq!(style.fill_color, "#ffffff");
        assert!((style.opacity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_style_patch_only_touches_given_fields() {
        let mut style = ShapeStyle::default();
        let patch = StylePatch {
            opacity: Some(0.5),
            ..Default::default()
        };
        patch.apply(&mut style);
        assert!((style.opacity - 0.5).abs() < f64::EPSILON);
        assert_eq!(style.stroke_color, "#000000");
    }

    #[test]
    fn test_style_validation() {
        let mut style = ShapeStyle::default();
        assert!(style.validate().is_ok());
        style.opacity = 1.5;
        assert!(style.validate().is_err());
        style.opacity = 1.0;
        style.stroke_width = -1.0;
        assert!(style.validate().is_err());
    }
}
