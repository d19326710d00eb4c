//! Canvas document: the authoritative shape list of a room.

use crate::error::{CoreError, CoreResult};
use crate::room::Room;
use crate::shapes::{Shape, ShapeDraft, ShapeId, ShapePatch};
use crate::storage::{DocumentStore, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version a freshly created canvas starts at.
pub const INITIAL_VERSION: u64 = 1;

/// Background of the drawing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundSettings {
    pub color: String,
    /// `none`, `grid` or `dots`.
    pub pattern: String,
    pub pattern_size: f64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            pattern: "none".to_string(),
            pattern_size: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewportSettings {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasDimensions {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasDimensions {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 1500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasPermissions {
    pub allow_drawing: bool,
    pub allow_shapes: bool,
    pub allow_text: bool,
    pub allow_delete: bool,
}

impl Default for CanvasPermissions {
    fn default() -> Self {
        Self {
            allow_drawing: true,
            allow_shapes: true,
            allow_text: true,
            allow_delete: true,
        }
    }
}

/// Canvas-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasSettings {
    pub background: BackgroundSettings,
    pub viewport: ViewportSettings,
    pub dimensions: CanvasDimensions,
    pub permissions: CanvasPermissions,
}

/// Shallow settings update: each present section replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<CanvasDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<CanvasPermissions>,
}

impl CanvasSettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == CanvasSettingsPatch::default()
    }

    fn validate(&self) -> CoreResult<()> {
        if let Some(viewport) = &self.viewport {
            if !(0.1..=10.0).contains(&viewport.zoom) {
                return Err(CoreError::Validation(format!(
                    "zoom {} is outside [0.1, 10]",
                    viewport.zoom
                )));
            }
        }
        if let Some(dimensions) = &self.dimensions {
            if !(dimensions.width > 0.0 && dimensions.height > 0.0) {
                return Err(CoreError::Validation(
                    "canvas dimensions must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn apply(&self, settings: &mut CanvasSettings) {
        if let Some(background) = &self.background {
            settings.background = background.clone();
        }
        if let Some(viewport) = &self.viewport {
            settings.viewport = viewport.clone();
        }
        if let Some(dimensions) = &self.dimensions {
            settings.dimensions = dimensions.clone();
        }
        if let Some(permissions) = &self.permissions {
            settings.permissions = permissions.clone();
        }
    }
}

/// What a history entry recorded, with the state needed to revert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all_fields = "camelCase")]
pub enum HistoryAction {
    /// A shape was added; reverting removes it.
    #[serde(rename = "create")]
    Created { shape: Shape },
    /// A shape was patched; `prior` is the shape before the patch.
    #[serde(rename = "update")]
    Updated { shape_id: ShapeId, prior: Shape },
    /// A shape was removed; reverting re-adds it.
    #[serde(rename = "delete")]
    Deleted { shape: Shape },
    /// Settings were changed; `prior` holds the old settings.
    #[serde(rename = "settings")]
    Settings { prior: CanvasSettings },
}

impl HistoryAction {
    pub fn shape_id(&self) -> Option<&str> {
        match self {
            HistoryAction::Created { shape } | HistoryAction::Deleted { shape } => Some(&shape.id),
            HistoryAction::Updated { shape_id, .. } => Some(shape_id),
            HistoryAction::Settings { .. } => None,
        }
    }
}

/// One append-only history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    /// Canvas version produced by this change.
    pub version: u64,
}

/// The state a joining client needs to render the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    pub canvas_id: String,
    pub shapes: Vec<Shape>,
    pub settings: CanvasSettings,
    pub version: u64,
}

/// The shared drawing document of one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub canvas_id: String,
    pub room_id: String,
    pub name: String,
    /// Shapes in z-order (back to front).
    pub shapes: Vec<Shape>,
    pub version: u64,
    pub settings: CanvasSettings,
    pub last_modified: DateTime<Utc>,
    pub modified_by: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl Canvas {
    /// Create an empty canvas for a room at [`INITIAL_VERSION`].
    pub fn new(room_id: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            canvas_id: format!("canvas_{}", Uuid::new_v4().simple()),
            room_id: room_id.to_string(),
            name: name.to_string(),
            shapes: Vec::new(),
            version: INITIAL_VERSION,
            settings: CanvasSettings::default(),
            last_modified: now,
            modified_by: None,
            history: Vec::new(),
            created_at: now,
        }
    }

    /// Get a shape by ID.
    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    fn position_of(&self, id: &str) -> CoreResult<usize> {
        self.shapes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| CoreError::ShapeNotFound(id.to_string()))
    }

    /// Record a successful mutation: exactly one version step.
    fn commit(&mut self, action: HistoryAction, user_id: &str, now: DateTime<Utc>) {
        self.version += 1;
        self.last_modified = now;
        self.modified_by = Some(user_id.to_string());
        self.history.push(HistoryEntry {
            action,
            timestamp: now,
            user_id: user_id.to_string(),
            version: self.version,
        });
    }

    /// Append a shape. Generates an id when the draft has none.
    pub fn add_shape(
        &mut self,
        draft: ShapeDraft,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<&Shape> {
        let shape = draft.into_shape(user_id, now);
        shape.validate()?;
        if self.shape(&shape.id).is_some() {
            return Err(CoreError::Validation(format!(
                "shape id {} already exists on this canvas",
                shape.id
            )));
        }

        self.shapes.push(shape.clone());
        self.commit(HistoryAction::Created { shape }, user_id, now);
        Ok(&self.shapes[self.shapes.len() - 1])
    }

    /// Merge `patch` into an existing shape (last write wins per field).
    pub fn update_shape(
        &mut self,
        shape_id: &str,
        patch: &ShapePatch,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<&Shape> {
        let index = self.position_of(shape_id)?;
        if patch.is_empty() {
            return Err(CoreError::Validation("update contains no fields".to_string()));
        }

        let mut updated = self.shapes[index].clone();
        patch.apply(&mut updated)?;
        updated.updated_at = now;

        let prior = std::mem::replace(&mut self.shapes[index], updated);
        self.commit(
            HistoryAction::Updated {
                shape_id: shape_id.to_string(),
                prior,
            },
            user_id,
            now,
        );
        Ok(&self.shapes[index])
    }

    /// Remove a shape, returning it.
    pub fn remove_shape(
        &mut self,
        shape_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Shape> {
        let index = self.position_of(shape_id)?;
        let shape = self.shapes.remove(index);
        self.commit(
            HistoryAction::Deleted {
                shape: shape.clone(),
            },
            user_id,
            now,
        );
        Ok(shape)
    }

    /// Shallow-merge settings sections.
    pub fn update_settings(
        &mut self,
        patch: &CanvasSettingsPatch,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<&CanvasSettings> {
        if patch.is_empty() {
            return Err(CoreError::Validation("settings update contains no fields".to_string()));
        }
        patch.validate()?;

        let prior = self.settings.clone();
        patch.apply(&mut self.settings);
        self.commit(HistoryAction::Settings { prior }, user_id, now);
        Ok(&self.settings)
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            canvas_id: self.canvas_id.clone(),
            shapes: self.shapes.clone(),
            settings: self.settings.clone(),
            version: self.version,
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Load the canvas of `room`, creating an empty one on first use.
///
/// Losing a creation race to another writer yields the winner's canvas.
pub async fn load_or_create(
    store: &dyn DocumentStore,
    room: &Room,
    now: DateTime<Utc>,
) -> CoreResult<Canvas> {
    if let Some(canvas) = store.get_canvas(&room.room_id).await? {
        return Ok(canvas);
    }

    let canvas = Canvas::new(&room.room_id, &format!("{} Canvas", room.name), now);
    match store.insert_canvas(&canvas).await {
        Ok(()) => {
            log::debug!("Created canvas {} for room {}", canvas.canvas_id, room.room_id);
            Ok(canvas)
        }
        Err(StorageError::AlreadyExists(_)) => store
            .get_canvas(&room.room_id)
            .await?
            .ok_or_else(|| CoreError::RoomNotFound(room.room_id.clone())),
        Err(e) => Err(e.into()),
    }
}
