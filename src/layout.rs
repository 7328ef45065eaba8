//! Container geometry and layout algorithms.
//!
//! DESIGN
//! ======
//! Every function here is pure arithmetic on rectangles; the executor turns
//! the positions into patches. Containers are given as a [`Rect`] with an
//! origin so padded (inset) containers compose without special cases.
//!
//! Positions are top-left corners of axis-aligned boxes. Callers that lay
//! out rotated objects pass the rotated bounding box and convert back.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the two rectangles share interior area. Touching edges do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Whether `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }
}

/// Per-side padding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Insets {
    /// Same padding on every side.
    #[must_use]
    pub fn uniform(padding: f64) -> Self {
        Self { top: padding, right: padding, bottom: padding, left: padding }
    }
}

/// Container edge targeted by an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// Distribution axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Anchor point used by [`relative_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

// =============================================================================
// CONTAINER HELPERS
// =============================================================================

/// Shrink `container` by `insets`. Sizes never go negative.
#[must_use]
pub fn inset_container(container: Rect, insets: Insets) -> Rect {
    Rect {
        x: container.x + insets.left,
        y: container.y + insets.top,
        width: (container.width - insets.left - insets.right).max(0.0),
        height: (container.height - insets.top - insets.bottom).max(0.0),
    }
}

/// Top-left that centres a `width`×`height` box in `container`, snapped to whole pixels.
#[must_use]
pub fn center_within(container: Rect, width: f64, height: f64) -> (f64, f64) {
    (
        container.x + ((container.width - width) / 2.0).floor().max(0.0),
        container.y + ((container.height - height) / 2.0).floor().max(0.0),
    )
}

/// Coordinate that snaps a box to one container edge.
///
/// Returns the new `x` for left/right and the new `y` for top/bottom.
#[must_use]
pub fn align_within(container: Rect, width: f64, height: f64, edge: Edge) -> f64 {
    match edge {
        Edge::Left => container.x,
        Edge::Right => container.x + (container.width - width).max(0.0),
        Edge::Top => container.y,
        Edge::Bottom => container.y + (container.height - height).max(0.0),
    }
}

/// Nearest top-left that keeps a box inside `container`.
///
/// EDGE: a box larger than the container is pinned to the container origin.
#[must_use]
pub fn clamp_within(container: Rect, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
    let max_x = container.x + (container.width - width).max(0.0);
    let max_y = container.y + (container.height - height).max(0.0);
    (x.max(container.x).min(max_x), y.max(container.y).min(max_y))
}

/// Place a child box relative to `parent` at `anchor`, inside `padding`, then offset.
#[must_use]
pub fn relative_to(parent: Rect, width: f64, height: f64, anchor: Anchor, offset: (f64, f64), padding: Insets) -> (f64, f64) {
    let inner = inset_container(parent, padding);
    let free_w = (inner.width - width).max(0.0);
    let free_h = (inner.height - height).max(0.0);
    let (x, y) = match anchor {
        Anchor::TopLeft => (inner.x, inner.y),
        Anchor::TopRight => (inner.x + free_w, inner.y),
        Anchor::BottomLeft => (inner.x, inner.y + free_h),
        Anchor::BottomRight => (inner.x + free_w, inner.y + free_h),
        Anchor::Center => (inner.x + (free_w / 2.0).floor(), inner.y + (free_h / 2.0).floor()),
    };
    (x + offset.0, y + offset.1)
}

// =============================================================================
// GRID
// =============================================================================

/// Most columns of `item_width` (plus gaps) that fit in `width`; at least one.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn grid_columns(width: f64, item_width: f64, gap: f64) -> usize {
    let step = item_width + gap;
    if step <= 0.0 {
        return 1;
    }
    (((width + gap) / step).floor() as usize).max(1)
}

/// Row-major positions for `count` equal cells of `item_width`×`item_height`
/// starting at the container origin.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn grid_positions(container: Rect, count: usize, item_width: f64, item_height: f64, gap: f64) -> Vec<(f64, f64)> {
    let cols = grid_columns(container.width, item_width, gap);
    (0..count)
        .map(|i| {
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            (container.x + col * (item_width + gap), container.y + row * (item_height + gap))
        })
        .collect()
}

/// Near-square column and row counts for tiling `count` items in `container`:
/// `cols = ceil(sqrt(count · aspect))`, `rows = ceil(count / cols)`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tile_dimensions(container: Rect, count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let aspect = if container.height > 0.0 { container.width / container.height } else { 1.0 };
    let cols = ((count as f64 * aspect).sqrt().ceil() as usize).clamp(1, count);
    let rows = count.div_ceil(cols);
    (cols, rows)
}

// =============================================================================
// DISTRIBUTE
// =============================================================================

/// Leading edges that space items of `sizes` (in their current order) evenly
/// across `extent` starting at `start`, using `gap = (extent − Σ sizes) / (n + 1)`.
///
/// EDGE: items that do not fit get a zero gap rather than overlapping backwards.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn distribute(start: f64, extent: f64, sizes: &[f64]) -> Vec<f64> {
    let total: f64 = sizes.iter().sum();
    let gap = ((extent - total) / (sizes.len() as f64 + 1.0)).max(0.0);
    let mut cursor = start + gap;
    sizes
        .iter()
        .map(|size| {
            let edge = cursor;
            cursor += size + gap;
            edge
        })
        .collect()
}

// =============================================================================
// ROW WRAP
// =============================================================================

/// Greedy row packing: consecutive items go on the current row until the next
/// one would push it past `max_width`. Returns index ranges into `widths`.
///
/// EDGE: an item wider than `max_width` gets a row of its own.
#[must_use]
pub fn wrap_rows(widths: &[f64], max_width: f64, gap: f64) -> Vec<std::ops::Range<usize>> {
    let mut rows = Vec::new();
    let mut start = 0;
    let mut used = 0.0;
    for (i, w) in widths.iter().enumerate() {
        let needed = if i == start { *w } else { used + gap + w };
        if i > start && needed > max_width {
            rows.push(start..i);
            start = i;
            used = *w;
        } else {
            used = needed;
        }
    }
    if start < widths.len() {
        rows.push(start..widths.len());
    }
    rows
}
