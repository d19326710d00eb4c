//! Shape definitions for the shared canvas.

mod geometry;
mod patch;
mod style;

pub use geometry::{Dimensions, Point, ShapeGeometry, ShapeKind};
pub use patch::ShapePatch;
pub use style::{ShapeStyle, StylePatch, TextContent, TextContentPatch};

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a shape, unique within its canvas only.
pub type ShapeId = String;

/// Generate a fresh shape identifier.
pub fn generate_shape_id() -> ShapeId {
    format!("shape_{}", Uuid::new_v4().simple())
}

fn default_visible() -> bool {
    true
}

/// One drawable element on a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
    /// Anchor position (top-left for boxes, center for circles).
    pub position: Point,
    #[serde(default)]
    pub style: ShapeStyle,
    /// Rotation angle in degrees.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    /// Check every field a client can set.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.position.is_finite() {
            return Err(CoreError::Validation("position must be finite".to_string()));
        }
        if !self.rotation.is_finite() {
            return Err(CoreError::Validation("rotation must be finite".to_string()));
        }
        self.style.validate().map_err(CoreError::Validation)?;
        self.geometry.validate().map_err(CoreError::Validation)
    }
}

/// A shape as submitted by a client, before the canvas stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDraft {
    /// Client-chosen id; one is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ShapeId>,
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
    pub position: Point,
    #[serde(default)]
    pub style: ShapeStyle,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl ShapeDraft {
    /// Create a draft with default style at the given position.
    pub fn new(geometry: ShapeGeometry, position: Point) -> Self {
        Self {
            id: None,
            geometry,
            position,
            style: ShapeStyle::default(),
            rotation: 0.0,
            locked: false,
            visible: true,
        }
    }

    /// Stamp the draft into a stored shape.
    pub fn into_shape(self, created_by: &str, now: DateTime<Utc>) -> Shape {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_shape_id);
        Shape {
            id,
            geometry: self.geometry,
            position: self.position,
            style: self.style,
            rotation: self.rotation,
            locked: self.locked,
            visible: self.visible,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
