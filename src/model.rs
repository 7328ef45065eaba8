//! Object model: canvas objects, sparse patches, and construction defaults.
//!
//! This module defines what is on the canvas (`CanvasObject`, `ShapeKind`),
//! the partial-update type used for every local edit (`ObjectPatch`), and the
//! pure helpers the rest of the engine builds on: default construction,
//! patch merge, stacking order, and the document encoding used at the store
//! boundary.
//!
//! Nothing here performs I/O or consults the clock. Data flows in from the
//! store (document decoding) and from the executor (patches); the merge
//! engine and session own the resulting collection.

#[cfg(test)]
#[path = "model_test.rs"]
mod model_test;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::consts::{
    BODY_FONT_SIZE, DEFAULT_CIRCLE_SIZE, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_SHAPE_HEIGHT,
    DEFAULT_SHAPE_WIDTH, HEADING_FONT_SIZE, NEW_SHAPE_CASCADE, NEW_SHAPE_ORIGIN, SUBTITLE_FONT_SIZE,
    TEXT_ADVANCE_RATIO, TEXT_LINE_HEIGHT,
};

/// Unique identifier for a canvas object. Client-generated, never reassigned.
pub type ObjectId = String;

/// The in-memory object collection. Shared pointers let unchanged objects keep
/// their identity across merges so renderers can skip them.
pub type Collection = Vec<Arc<CanvasObject>>;

/// The kind of a canvas object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle.
    Rectangle,
    /// Circle inscribed in a square bounding box.
    Circle,
    /// Isosceles triangle with its apex at the top edge midpoint.
    Triangle,
    /// Directed arrow from the left edge to the right edge of the box.
    Arrow,
    /// Single-line text label.
    Text,
}

/// Typographic role of a text object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Heading,
    Subtitle,
    Body,
}

impl TextKind {
    /// Font size associated with this role.
    #[must_use]
    pub fn font_size(self) -> f64 {
        match self {
            Self::Heading => HEADING_FONT_SIZE,
            Self::Subtitle => SUBTITLE_FONT_SIZE,
            Self::Body => BODY_FONT_SIZE,
        }
    }
}

/// "Someone else just edited this" highlight. Local decoration only.
#[derive(Debug, Clone, PartialEq)]
pub struct EditFlash {
    /// Highlight is drawn while `now < until_ms`.
    pub until_ms: i64,
    /// Outline colour of the editing peer.
    pub color: String,
    /// Display name of the editing peer.
    pub editor_name: String,
}

/// A canvas object as held in memory and stored as a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    /// Globally unique identifier.
    pub id: ObjectId,
    /// Shape type.
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// Left edge of the unrotated bounding box.
    pub x: f64,
    /// Top edge of the unrotated bounding box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees around the box centre.
    #[serde(default)]
    pub rotation: f64,
    /// Fill colour (text colour for text objects).
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_kind: Option<TextKind>,
    /// Stacking order; lower values are drawn beneath higher values.
    #[serde(default)]
    pub order: i64,
    /// Store-assigned write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_ms: Option<i64>,
    /// Identity of the last writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    /// Client time of the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_at_ms: Option<i64>,
    /// Remote-edit highlight; never persisted.
    #[serde(skip)]
    pub flash: Option<EditFlash>,
}

/// Sparse update for a canvas object. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_kind: Option<TextKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl ObjectPatch {
    /// Patch that moves an object's top-left corner.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Patch that resizes an object's bounding box.
    #[must_use]
    pub fn size(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::default() }
    }

    /// Returns `true` if the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Shallow per-field merge: every present patch field overwrites the base.
#[must_use]
pub fn apply_patch(base: &CanvasObject, patch: &ObjectPatch) -> CanvasObject {
    let mut next = base.clone();
    if let Some(x) = patch.x {
        next.x = x;
    }
    if let Some(y) = patch.y {
        next.y = y;
    }
    if let Some(w) = patch.width {
        next.width = w;
    }
    if let Some(h) = patch.height {
        next.height = h;
    }
    if let Some(r) = patch.rotation {
        next.rotation = r;
    }
    if let Some(ref color) = patch.color {
        next.color.clone_from(color);
    }
    if patch.opacity.is_some() {
        next.opacity = patch.opacity;
    }
    if patch.stroke.is_some() {
        next.stroke.clone_from(&patch.stroke);
    }
    if patch.stroke_width.is_some() {
        next.stroke_width = patch.stroke_width;
    }
    if patch.text.is_some() {
        next.text.clone_from(&patch.text);
    }
    if patch.font_size.is_some() {
        next.font_size = patch.font_size;
    }
    if patch.font_family.is_some() {
        next.font_family.clone_from(&patch.font_family);
    }
    if patch.text_kind.is_some() {
        next.text_kind = patch.text_kind;
    }
    if let Some(order) = patch.order {
        next.order = order;
    }
    next
}

/// Construct a new object with type-appropriate defaults.
///
/// Fields present in `initial` win over defaults. Objects without an explicit
/// position cascade from the canvas origin by `cascade_index` steps. Circles
/// always get equal width and height; text gets a default font and a box
/// sized to its content.
#[must_use]
pub fn new_object(kind: ShapeKind, initial: &ObjectPatch, cascade_index: usize) -> CanvasObject {
    #[allow(clippy::cast_precision_loss)]
    let offset = cascade_index as f64 * NEW_SHAPE_CASCADE;
    let color = initial.color.clone().unwrap_or_else(crate::color::random_shape_color);

    let mut obj = CanvasObject {
        id: Uuid::new_v4().to_string(),
        kind,
        x: NEW_SHAPE_ORIGIN + offset,
        y: NEW_SHAPE_ORIGIN + offset,
        width: DEFAULT_SHAPE_WIDTH,
        height: DEFAULT_SHAPE_HEIGHT,
        rotation: 0.0,
        color,
        opacity: None,
        stroke: None,
        stroke_width: None,
        text: None,
        font_size: None,
        font_family: None,
        text_kind: None,
        order: 0,
        updated_at_ms: None,
        last_edited_by: None,
        last_edited_at_ms: None,
        flash: None,
    };

    match kind {
        ShapeKind::Circle => {
            let size = initial.width.or(initial.height).unwrap_or(DEFAULT_CIRCLE_SIZE);
            obj.width = size;
            obj.height = size;
        }
        ShapeKind::Text => {
            let text = initial.text.clone().unwrap_or_else(|| "Text".to_owned());
            let font_size = initial
                .font_size
                .or_else(|| initial.text_kind.map(TextKind::font_size))
                .unwrap_or(DEFAULT_FONT_SIZE);
            let (w, h) = text_extent(&text, font_size);
            obj.width = w;
            obj.height = h;
            obj.text = Some(text);
            obj.font_size = Some(font_size);
            obj.font_family = Some(DEFAULT_FONT_FAMILY.to_owned());
            obj.text_kind = Some(TextKind::Body);
        }
        _ => {}
    }

    let mut obj = apply_patch(&obj, initial);
    if kind == ShapeKind::Circle {
        obj.height = obj.width;
    }
    obj
}

/// Approximate box for a single line of text.
#[must_use]
pub fn text_extent(text: &str, font_size: f64) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let chars = text.chars().count().max(1) as f64;
    let width = (chars * font_size * TEXT_ADVANCE_RATIO).max(font_size * 2.0);
    (width.ceil(), (font_size * TEXT_LINE_HEIGHT).ceil())
}

/// Axis-aligned extent of an object under its rotation:
/// `(|w·cos θ| + |h·sin θ|, |w·sin θ| + |h·cos θ|)`.
#[must_use]
pub fn bounding_size(obj: &CanvasObject) -> (f64, f64) {
    let theta = obj.rotation.to_radians();
    let (sin, cos) = theta.sin_cos();
    let w = (obj.width * cos).abs() + (obj.height * sin).abs();
    let h = (obj.width * sin).abs() + (obj.height * cos).abs();
    (w, h)
}

/// Whether two objects would draw identically: kind, geometry, colour,
/// opacity, rotation, text and stacking order.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn visually_equal(a: &CanvasObject, b: &CanvasObject) -> bool {
    a.kind == b.kind
        && a.x == b.x
        && a.y == b.y
        && a.width == b.width
        && a.height == b.height
        && a.rotation == b.rotation
        && a.color == b.color
        && a.opacity == b.opacity
        && a.stroke == b.stroke
        && a.stroke_width == b.stroke_width
        && a.text == b.text
        && a.font_size == b.font_size
        && a.font_family == b.font_family
        && a.text_kind == b.text_kind
        && a.order == b.order
}

/// Sort a collection by `(order, id)` for deterministic stacking.
pub fn sort_for_stacking(objects: &mut Collection) {
    objects.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// Order value that stacks a new object above everything in `objects`.
#[must_use]
pub fn next_order(objects: &[Arc<CanvasObject>]) -> i64 {
    objects.iter().map(|o| o.order).max().map_or(0, |max| max + 1)
}

/// Strip sync metadata and local decoration, leaving only authored fields.
#[must_use]
pub fn sanitize(obj: &CanvasObject) -> CanvasObject {
    CanvasObject { updated_at_ms: None, last_edited_by: None, last_edited_at_ms: None, flash: None, ..obj.clone() }
}

/// Encode an object as a store document.
///
/// The store must never see absent markers, so any `null` left after
/// serialization is removed rather than written.
///
/// # Errors
///
/// Returns the serializer error if the object is not representable as JSON.
pub fn to_document(obj: &CanvasObject) -> Result<Map<String, Value>, serde_json::Error> {
    let value = serde_json::to_value(obj)?;
    let Value::Object(mut doc) = value else {
        return Ok(Map::new());
    };
    doc.retain(|_, v| !v.is_null());
    Ok(doc)
}

/// Decode a store document into an object.
///
/// # Errors
///
/// Returns the deserializer error for documents missing required fields.
pub fn from_document(doc: &Map<String, Value>) -> Result<CanvasObject, serde_json::Error> {
    serde_json::from_value(Value::Object(doc.clone()))
}
