//! Partial shape updates.

use super::geometry::{Dimensions, Point, ShapeGeometry};
use super::style::{StylePatch, TextContentPatch};
use super::Shape;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Field-level update for an existing shape.
///
/// Fields are merged last-write-wins; absent fields keep their value.
/// Geometry fields must match the shape's kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<TextContentPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StylePatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl ShapePatch {
    pub fn is_empty(&self) -> bool {
        *self == ShapePatch::default()
    }

    /// Merge this patch into `shape` and validate the result.
    ///
    /// On error `shape` may be partially modified; callers apply the patch
    /// to a copy and commit only on success.
    pub fn apply(&self, shape: &mut Shape) -> CoreResult<()> {
        let kind = shape.kind();
        let mismatch = |field: &str| {
            CoreError::Validation(format!("field `{field}` does not apply to a {kind}"))
        };

        if let Some(position) = self.position {
            shape.position = position;
        }
        if let Some(dimensions) = self.dimensions {
            *shape
                .geometry
                .dimensions_mut()
                .ok_or_else(|| mismatch("dimensions"))? = dimensions;
        }
        if let Some(new_radius) = self.radius {
            match &mut shape.geometry {
                ShapeGeometry::Circle { radius } => *radius = new_radius,
                _ => return Err(mismatch("radius")),
            }
        }
        if let Some(path) = &self.path {
            *shape.geometry.path_mut().ok_or_else(|| mismatch("path"))? = path.clone();
        }
        if let Some(patch) = &self.content {
            match &mut shape.geometry {
                ShapeGeometry::Text { content, .. } => patch.apply(content),
                _ => return Err(mismatch("content")),
            }
        }
        if let Some(src) = &self.image_src {
            match &mut shape.geometry {
                ShapeGeometry::Image { image_src, .. } => *image_src = src.clone(),
                _ => return Err(mismatch("imageSrc")),
            }
        }
        if let Some(style) = &self.style {
            style.apply(&mut shape.style);
        }
        if let Some(rotation) = self.rotation {
            shape.rotation = rotation;
        }
        if let Some(locked) = self.locked {
            shape.locked = locked;
        }
        if let Some(visible) = self.visible {
            shape.visible = visible;
        }

        shape.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeDraft;
    use chrono::Utc;

    fn rectangle() -> Shape {
        ShapeDraft::new(
            ShapeGeometry::Rectangle {
                dimensions: Dimensions::new(10.0, 10.0),
            },
            Point::new(0.0, 0.0),
        )
        .into_shape("alice", Utc::now())
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut shape = rectangle();
        let patch: ShapePatch = serde_json::from_str(
            r#"{"position":{"x":5,"y":6},"dimensions":{"width":40,"height":50},"style":{"opacity":0.25}}"#,
        )
        .unwrap();
        patch.apply(&mut shape).unwrap();

        assert_eq!(shape.position, Point::new(5.0, 6.0));
        assert_eq!(
            shape.geometry,
            ShapeGeometry::Rectangle {
                dimensions: Dimensions::new(40.0, 50.0)
            }
        );
        assert!((shape.style.opacity - 0.25).abs() < f64::EPSILON);
        assert_eq!(shape.style.stroke_color, "#000000");
    }

    #[test]
    fn test_patch_rejects_mismatched_geometry() {
        let mut shape = rectangle();
        let patch = ShapePatch {
            radius: Some(3.0),
            ..Default::default()
        };
        assert!(matches!(patch.apply(&mut shape), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_patch_rejects_invalid_result() {
        let mut shape = rectangle();
        let patch = ShapePatch {
            style: Some(StylePatch {
                opacity: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(patch.apply(&mut shape).is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(ShapePatch::default().is_empty());
        let patch = ShapePatch {
            locked: Some(true),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
