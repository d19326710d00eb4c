//! Per-kind geometry for shapes.

use super::style::TextContent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Width and height of a box-shaped element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.width.is_finite() || !self.height.is_finite() {
            return Err("dimensions must be finite".to_string());
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err("dimensions must not be negative".to_string());
        }
        Ok(())
    }
}

/// The kind of a shape, as it appears in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Line,
    Text,
    Freehand,
    Arrow,
    Polygon,
    Ellipse,
    Image,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Line => "line",
            ShapeKind::Text => "text",
            ShapeKind::Freehand => "freehand",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Image => "image",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific fields of a shape, tagged by `type`.
///
/// Each variant carries only what that kind needs; `position`, style and
/// flags live on [`super::Shape`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeGeometry {
    Rectangle {
        #[serde(default)]
        dimensions: Dimensions,
    },
    Ellipse {
        #[serde(default)]
        dimensions: Dimensions,
    },
    Circle {
        #[serde(default)]
        radius: f64,
    },
    /// Straight or poly-line, points relative to the canvas.
    Line {
        #[serde(default)]
        path: Vec<Point>,
    },
    Arrow {
        #[serde(default)]
        path: Vec<Point>,
    },
    Polygon {
        #[serde(default)]
        path: Vec<Point>,
    },
    Freehand {
        #[serde(default)]
        path: Vec<Point>,
    },
    Text {
        #[serde(default)]
        content: TextContent,
        #[serde(default)]
        dimensions: Dimensions,
    },
    Image {
        #[serde(rename = "imageSrc")]
        image_src: String,
        #[serde(default)]
        dimensions: Dimensions,
    },
}

impl ShapeGeometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeGeometry::Rectangle { .. } => ShapeKind::Rectangle,
            ShapeGeometry::Ellipse { .. } => ShapeKind::Ellipse,
            ShapeGeometry::Circle { .. } => ShapeKind::Circle,
            ShapeGeometry::Line { .. } => ShapeKind::Line,
            ShapeGeometry::Arrow { .. } => ShapeKind::Arrow,
            ShapeGeometry::Polygon { .. } => ShapeKind::Polygon,
            ShapeGeometry::Freehand { .. } => ShapeKind::Freehand,
            ShapeGeometry::Text { .. } => ShapeKind::Text,
            ShapeGeometry::Image { .. } => ShapeKind::Image,
        }
    }

    /// Minimum number of path points for path-based kinds.
    fn min_points(kind: ShapeKind) -> usize {
        match kind {
            ShapeKind::Freehand => 1,
            ShapeKind::Line | ShapeKind::Arrow => 2,
            ShapeKind::Polygon => 3,
            _ => 0,
        }
    }

    pub fn dimensions_mut(&mut self) -> Option<&mut Dimensions> {
        match self {
            ShapeGeometry::Rectangle { dimensions }
            | ShapeGeometry::Ellipse { dimensions }
            | ShapeGeometry::Text { dimensions, .. }
            | ShapeGeometry::Image { dimensions, .. } => Some(dimensions),
            _ => None,
        }
    }

    pub fn path_mut(&mut self) -> Option<&mut Vec<Point>> {
        match self {
            ShapeGeometry::Line { path }
            | ShapeGeometry::Arrow { path }
            | ShapeGeometry::Polygon { path }
            | ShapeGeometry::Freehand { path } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let kind = self.kind();
        match self {
            ShapeGeometry::Rectangle { dimensions } | ShapeGeometry::Ellipse { dimensions } => {
                dimensions.validate()
            }
            ShapeGeometry::Circle { radius } => {
                if radius.is_finite() && *radius >= 0.0 {
                    Ok(())
                } else {
                    Err(format!("invalid circle radius {radius}"))
                }
            }
            ShapeGeometry::Line { path }
            | ShapeGeometry::Arrow { path }
            | ShapeGeometry::Polygon { path }
            | ShapeGeometry::Freehand { path } => {
                let min = Self::min_points(kind);
                if path.len() < min {
                    return Err(format!("{kind} needs at least {min} points"));
                }
                if path.iter().any(|p| !p.is_finite()) {
                    return Err(format!("{kind} path contains non-finite points"));
                }
                Ok(())
            }
            ShapeGeometry::Text { content, dimensions } => {
                if !content.font_size.is_finite() || content.font_size <= 0.0 {
                    return Err(format!("invalid font size {}", content.font_size));
                }
                dimensions.validate()
            }
            ShapeGeometry::Image {
                image_src,
                dimensions,
            } => {
                if image_src.trim().is_empty() {
                    return Err("image source is required".to_string());
                }
                dimensions.validate()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_tagged_by_type() {
        let geometry: ShapeGeometry =
            serde_json::from_str(r#"{"type":"circle","radius":12.5}"#).unwrap();
        assert_eq!(geometry, ShapeGeometry::Circle { radius: 12.5 });
        assert_eq!(geometry.kind(), ShapeKind::Circle);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<ShapeGeometry>(r#"{"type":"hexagon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_min_points() {
        let line = ShapeGeometry::Line {
            path: vec![Point::new(0.0, 0.0)],
        };
        assert!(line.validate().is_err());

        let polygon = ShapeGeometry::Polygon {
            path: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
        };
        assert!(polygon.validate().is_ok());
    }

    #[test]
    fn test_negative_dimensions_rejected() {
        let rect = ShapeGeometry::Rectangle {
            dimensions: Dimensions::new(-1.0, 10.0),
        };
        assert!(rect.validate().is_err());
    }

    #[test]
    fn test_image_requires_source() {
        let image = ShapeGeometry::Image {
            image_src: "  ".to_string(),
            dimensions: Dimensions::default(),
        };
        assert!(image.validate().is_err());
    }
}
