//! Command executor: turns a [`Command`] into new objects or patches.
//!
//! DESIGN
//! ======
//! Planning is pure. [`plan`] reads the collection, the selection and the
//! canvas extent and returns a [`Plan`]; the session applies it through its
//! single state-update path (history entry, optimistic write, suppression).
//! Keeping the layout arithmetic here means every algorithm can be tested
//! without a store or a clock.
//!
//! Every position a plan produces is clamped into the canvas, using the
//! rotated bounding box so tilted objects stay fully visible.
//!
//! Targets:
//! - `*Selected` commands and `arrangeCenter` act on the selection.
//! - Layouts (`gridLayout`, `rowLayout`, `distributeObjects`) act on the
//!   selection when it holds two or more objects, otherwise on everything.
//! - An empty target set yields [`Plan::Noop`].

#[cfg(test)]
#[path = "executor_test.rs"]
mod executor_test;

use std::sync::Arc;

use crate::command::{Command, CreateMany, CreateShape, CreateText, LoginForm, Spacing};
use crate::config::SyncConfig;
use crate::consts::{
    DEFAULT_CIRCLE_SIZE, DEFAULT_LAYOUT_GAP, DEFAULT_LAYOUT_PADDING, DEFAULT_SHAPE_HEIGHT, DEFAULT_SHAPE_WIDTH,
    LOGIN_BUTTON_COLOR, LOGIN_BUTTON_TEXT, LOGIN_FORM_WIDTH, LOGIN_INPUT_COLOR, LOGIN_INPUT_HEIGHT,
    LOGIN_LABEL_COLOR, LOGIN_PANEL_COLOR, LOGIN_TITLE, LOGIN_TITLE_COLOR, MAX_CREATE_MANY,
};
use crate::layout::{
    Anchor, Axis, Edge, Insets, Rect, align_within, center_within, clamp_within, distribute, grid_columns,
    grid_positions, inset_container, relative_to, tile_dimensions, wrap_rows,
};
use crate::model::{
    CanvasObject, ObjectId, ObjectPatch, ShapeKind, TextKind, apply_patch, bounding_size, new_object, next_order,
    text_extent,
};
use crate::session::Selection;

/// What a command wants done to the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Add these objects (one history entry, selected afterwards).
    Create(Vec<CanvasObject>),
    /// Patch these existing objects (one history entry).
    Update(Vec<(ObjectId, ObjectPatch)>),
    /// Nothing applicable.
    Noop,
}

/// Read-only view of the state a command runs against.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    pub objects: &'a [Arc<CanvasObject>],
    pub selection: &'a Selection,
    pub config: &'a SyncConfig,
    /// Cascade step for objects created without a position.
    pub cascade_index: usize,
}

impl ExecContext<'_> {
    fn canvas(&self) -> Rect {
        Rect::new(0.0, 0.0, self.config.canvas_width, self.config.canvas_height)
    }

    fn selected(&self) -> Vec<&Arc<CanvasObject>> {
        self.objects.iter().filter(|o| self.selection.contains(&o.id)).collect()
    }

    fn layout_targets(&self) -> Vec<&Arc<CanvasObject>> {
        let selected = self.selected();
        if selected.len() >= 2 { selected } else { self.objects.iter().collect() }
    }
}

/// Plan the effect of `cmd`.
#[must_use]
pub fn plan(cmd: &Command, ctx: &ExecContext<'_>) -> Plan {
    match cmd {
        Command::CreateShape(p) => create_shape(p, ctx),
        Command::CreateMany(p) => create_many(p, ctx),
        Command::CreateText(p) => create_text(p, ctx),
        Command::MoveSelected { x, y } => move_selected(*x, *y, ctx),
        Command::ResizeSelected { width, height } => patch_selected(ctx, |obj| {
            let height = if obj.kind == ShapeKind::Circle { *width } else { *height };
            ObjectPatch::size(width.min(ctx.config.canvas_width), height.min(ctx.config.canvas_height))
        }),
        Command::RotateSelected { rotation } => {
            patch_selected(ctx, |_| ObjectPatch { rotation: Some(*rotation), ..ObjectPatch::default() })
        }
        Command::SetColorSelected { color } => {
            patch_selected(ctx, |_| ObjectPatch { color: Some(color.clone()), ..ObjectPatch::default() })
        }
        Command::ArrangeCenter => arrange_center(ctx),
        Command::AlignSelected { position } => align_selected(*position, ctx),
        Command::DistributeObjects { axis } => distribute_objects(*axis, ctx),
        Command::SetTextKindSelected { kind } => set_text_kind(*kind, ctx),
        Command::GridLayout(spacing) => grid_layout(spacing, ctx),
        Command::RowLayout(spacing) => row_layout(spacing, &ctx.layout_targets(), ctx),
        Command::AutoLayout => {
            let all: Vec<&Arc<CanvasObject>> = ctx.objects.iter().collect();
            row_layout(&Spacing::default(), &all, ctx)
        }
        Command::GenerateLoginForm(form) => login_form(form, ctx),
    }
}

// =============================================================================
// GEOMETRY HELPERS
// =============================================================================

/// Rotated bounding box of `obj`, sharing its centre.
fn aabb(obj: &CanvasObject) -> Rect {
    let (bw, bh) = bounding_size(obj);
    let cx = obj.x + obj.width / 2.0;
    let cy = obj.y + obj.height / 2.0;
    Rect::new(cx - bw / 2.0, cy - bh / 2.0, bw, bh)
}

/// Top-left that puts the rotated bounding box of `obj` at `(left, top)`.
fn from_aabb(obj: &CanvasObject, left: f64, top: f64) -> (f64, f64) {
    let (bw, bh) = bounding_size(obj);
    (left + (bw - obj.width) / 2.0, top + (bh - obj.height) / 2.0)
}

/// Clamp `obj` (after `patch`) into `container` and fold the position into the patch.
fn clamped(obj: &CanvasObject, mut patch: ObjectPatch, container: Rect) -> ObjectPatch {
    let next = apply_patch(obj, &patch);
    let bounds = aabb(&next);
    let (left, top) = clamp_within(container, bounds.width, bounds.height, bounds.x, bounds.y);
    let (x, y) = from_aabb(&next, left, top);
    patch.x = Some(x);
    patch.y = Some(y);
    patch
}

/// Clamp a freshly built object into `container` in place.
fn clamp_new(mut obj: CanvasObject, container: Rect) -> CanvasObject {
    let bounds = aabb(&obj);
    let (left, top) = clamp_within(container, bounds.width, bounds.height, bounds.x, bounds.y);
    (obj.x, obj.y) = from_aabb(&obj, left, top);
    obj
}

fn union(objects: &[&Arc<CanvasObject>]) -> Option<Rect> {
    let mut iter = objects.iter().map(|o| aabb(o));
    let first = iter.next()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.right(), first.bottom());
    for r in iter {
        x0 = x0.min(r.x);
        y0 = y0.min(r.y);
        x1 = x1.max(r.right());
        y1 = y1.max(r.bottom());
    }
    Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
}

fn padded(ctx: &ExecContext<'_>, padding: Option<f64>) -> Rect {
    inset_container(ctx.canvas(), Insets::uniform(padding.unwrap_or(DEFAULT_LAYOUT_PADDING)))
}

fn patch_selected(ctx: &ExecContext<'_>, mut make: impl FnMut(&CanvasObject) -> ObjectPatch) -> Plan {
    let canvas = ctx.canvas();
    let patches: Vec<(ObjectId, ObjectPatch)> =
        ctx.selected()
            .into_iter()
            .map(|o| {
                let obj: &CanvasObject = o;
                (o.id.clone(), clamped(obj, make(obj), canvas))
            })
            .collect();
    update(patches)
}

fn update(patches: Vec<(ObjectId, ObjectPatch)>) -> Plan {
    if patches.is_empty() { Plan::Noop } else { Plan::Update(patches) }
}

// =============================================================================
// CREATION
// =============================================================================

fn create_shape(p: &CreateShape, ctx: &ExecContext<'_>) -> Plan {
    let initial = ObjectPatch { x: p.x, y: p.y, color: p.color.clone(), ..ObjectPatch::default() };
    let mut obj = new_object(p.kind, &initial, ctx.cascade_index);
    obj.order = next_order(ctx.objects);
    Plan::Create(vec![clamp_new(obj, ctx.canvas())])
}

fn create_text(p: &CreateText, ctx: &ExecContext<'_>) -> Plan {
    let initial = ObjectPatch {
        x: p.x,
        y: p.y,
        text: Some(p.text.clone()),
        font_size: p.font_size,
        color: p.color.clone(),
        ..ObjectPatch::default()
    };
    let mut obj = new_object(ShapeKind::Text, &initial, ctx.cascade_index);
    obj.order = next_order(ctx.objects);
    Plan::Create(vec![clamp_new(obj, ctx.canvas())])
}

/// Tile `count` new objects inside the padded canvas without overlap.
#[allow(clippy::cast_precision_loss)]
fn create_many(p: &CreateMany, ctx: &ExecContext<'_>) -> Plan {
    let count = p.count.min(MAX_CREATE_MANY) as usize;
    let gap = p.gap.unwrap_or(DEFAULT_LAYOUT_GAP);
    let inner = padded(ctx, p.padding);
    let (cols, rows) = tile_dimensions(inner, count);
    if cols == 0 {
        return Plan::Noop;
    }

    let cell_w = ((inner.width - gap * (cols as f64 - 1.0)) / cols as f64).max(1.0);
    let cell_h = ((inner.height - gap * (rows as f64 - 1.0)) / rows as f64).max(1.0);
    let (item_w, item_h) = match p.kind {
        ShapeKind::Circle => {
            let size = DEFAULT_CIRCLE_SIZE.min(cell_w).min(cell_h);
            (size, size)
        }
        _ => (DEFAULT_SHAPE_WIDTH.min(cell_w), DEFAULT_SHAPE_HEIGHT.min(cell_h)),
    };

    let base_order = next_order(ctx.objects);
    let objects = (0..count)
        .map(|i| {
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            let x = inner.x + col * (cell_w + gap) + (cell_w - item_w) / 2.0;
            let y = inner.y + row * (cell_h + gap) + (cell_h - item_h) / 2.0;
            let initial = ObjectPatch {
                width: Some(item_w),
                height: Some(item_h),
                color: p.color.clone(),
                ..ObjectPatch::position(x, y)
            };
            let mut obj = new_object(p.kind, &initial, 0);
            obj.order = base_order + i64::try_from(i).unwrap_or(i64::MAX);
            clamp_new(obj, inner)
        })
        .collect();
    Plan::Create(objects)
}

/// Panel, title, two inputs, a button and its label, centred on the canvas.
fn login_form(form: &LoginForm, ctx: &ExecContext<'_>) -> Plan {
    let canvas = ctx.canvas();
    let padding = form.padding.unwrap_or(DEFAULT_LAYOUT_PADDING);
    let gap = form.gap.unwrap_or(DEFAULT_LAYOUT_GAP);
    let width = form.width.unwrap_or(LOGIN_FORM_WIDTH).min(canvas.width);
    let inner_w = (width - 2.0 * padding).max(1.0);

    let title = form.title.clone().unwrap_or_else(|| LOGIN_TITLE.to_owned());
    let title_size = TextKind::Heading.font_size();
    let (_, title_h) = text_extent(&title, title_size);
    let height = padding * 2.0 + title_h + (gap + LOGIN_INPUT_HEIGHT) * 3.0;
    let (px, py) = center_within(canvas, width, height);

    let row_y = |i: f64| py + padding + title_h + gap + i * (LOGIN_INPUT_HEIGHT + gap);
    let rect = |x, y, w, h, color: &str| {
        let initial =
            ObjectPatch { width: Some(w), height: Some(h), color: Some(color.to_owned()), ..ObjectPatch::position(x, y) };
        new_object(ShapeKind::Rectangle, &initial, 0)
    };
    let text = |body: String, kind: TextKind, color: &str| {
        let initial = ObjectPatch {
            text: Some(body),
            text_kind: Some(kind),
            font_size: Some(kind.font_size()),
            color: Some(color.to_owned()),
            ..ObjectPatch::default()
        };
        new_object(ShapeKind::Text, &initial, 0)
    };

    let panel = rect(px, py, width, height, LOGIN_PANEL_COLOR);
    let mut heading = text(title, TextKind::Heading, LOGIN_TITLE_COLOR);
    (heading.x, heading.y) = (px + padding, py + padding);
    let email = rect(px + padding, row_y(0.0), inner_w, LOGIN_INPUT_HEIGHT, LOGIN_INPUT_COLOR);
    let password = rect(px + padding, row_y(1.0), inner_w, LOGIN_INPUT_HEIGHT, LOGIN_INPUT_COLOR);
    let button_color = form.color.as_deref().unwrap_or(LOGIN_BUTTON_COLOR);
    let button = rect(px + padding, row_y(2.0), inner_w, LOGIN_INPUT_HEIGHT, button_color);
    let label_text = form.button_text.clone().unwrap_or_else(|| LOGIN_BUTTON_TEXT.to_owned());
    let mut label = text(label_text, TextKind::Body, LOGIN_LABEL_COLOR);
    let button_rect = Rect::new(button.x, button.y, button.width, button.height);
    (label.x, label.y) = relative_to(button_rect, label.width, label.height, Anchor::Center, (0.0, 0.0), Insets::default());

    let base_order = next_order(ctx.objects);
    let objects = [panel, heading, email, password, button, label]
        .into_iter()
        .zip(base_order..)
        .map(|(mut obj, order)| {
            obj.order = order;
            clamp_new(obj, canvas)
        })
        .collect();
    Plan::Create(objects)
}

// =============================================================================
// SELECTION EDITS
// =============================================================================

/// Move the selection so its bounding box starts at `(x, y)`, keeping relative offsets.
fn move_selected(x: f64, y: f64, ctx: &ExecContext<'_>) -> Plan {
    let selected = ctx.selected();
    let Some(bounds) = union(&selected) else {
        return Plan::Noop;
    };
    let (dx, dy) = (x - bounds.x, y - bounds.y);
    let canvas = ctx.canvas();
    update(
        selected
            .into_iter()
            .map(|o| (o.id.clone(), clamped(o, ObjectPatch::position(o.x + dx, o.y + dy), canvas)))
            .collect(),
    )
}

fn arrange_center(ctx: &ExecContext<'_>) -> Plan {
    let selected = ctx.selected();
    let Some(bounds) = union(&selected) else {
        return Plan::Noop;
    };
    let (left, top) = center_within(ctx.canvas(), bounds.width, bounds.height);
    move_selected(left, top, ctx)
}

fn align_selected(edge: Edge, ctx: &ExecContext<'_>) -> Plan {
    let canvas = ctx.canvas();
    update(
        ctx.selected()
            .into_iter()
            .map(|o| {
                let bounds = aabb(o);
                let target = align_within(canvas, bounds.width, bounds.height, edge);
                let (left, top) = match edge {
                    Edge::Left | Edge::Right => (target, bounds.y),
                    Edge::Top | Edge::Bottom => (bounds.x, target),
                };
                let (x, y) = from_aabb(o, left, top);
                (o.id.clone(), clamped(o, ObjectPatch::position(x, y), canvas))
            })
            .collect(),
    )
}

fn set_text_kind(kind: TextKind, ctx: &ExecContext<'_>) -> Plan {
    let canvas = ctx.canvas();
    update(
        ctx.selected()
            .into_iter()
            .filter(|o| o.kind == ShapeKind::Text)
            .map(|o| {
                let size = kind.font_size();
                let (w, h) = text_extent(o.text.as_deref().unwrap_or_default(), size);
                let patch = ObjectPatch {
                    text_kind: Some(kind),
                    font_size: Some(size),
                    ..ObjectPatch::size(w, h)
                };
                (o.id.clone(), clamped(o, patch, canvas))
            })
            .collect(),
    )
}

// =============================================================================
// LAYOUTS
// =============================================================================

/// Evenly space leading edges across the canvas along `axis`.
fn distribute_objects(axis: Axis, ctx: &ExecContext<'_>) -> Plan {
    let mut targets: Vec<(&Arc<CanvasObject>, Rect)> =
        ctx.layout_targets().into_iter().map(|o| (o, aabb(o))).collect();
    let lead = |r: &Rect| match axis {
        Axis::Horizontal => r.x,
        Axis::Vertical => r.y,
    };
    targets.sort_by(|(a, ra), (b, rb)| lead(ra).total_cmp(&lead(rb)).then_with(|| a.id.cmp(&b.id)));

    let canvas = ctx.canvas();
    let (start, extent) = match axis {
        Axis::Horizontal => (canvas.x, canvas.width),
        Axis::Vertical => (canvas.y, canvas.height),
    };
    let sizes: Vec<f64> = targets
        .iter()
        .map(|(_, r)| match axis {
            Axis::Horizontal => r.width,
            Axis::Vertical => r.height,
        })
        .collect();
    let edges = distribute(start, extent, &sizes);

    update(
        targets
            .into_iter()
            .zip(edges)
            .map(|((o, r), edge)| {
                let (left, top) = match axis {
                    Axis::Horizontal => (edge, r.y),
                    Axis::Vertical => (r.x, edge),
                };
                let (x, y) = from_aabb(o, left, top);
                (o.id.clone(), clamped(o, ObjectPatch::position(x, y), canvas))
            })
            .collect(),
    )
}

/// Equal cells sized to the largest target, filled row-major in reading order.
fn grid_layout(spacing: &Spacing, ctx: &ExecContext<'_>) -> Plan {
    let mut targets: Vec<(&Arc<CanvasObject>, Rect)> =
        ctx.layout_targets().into_iter().map(|o| (o, aabb(o))).collect();
    if targets.is_empty() {
        return Plan::Noop;
    }
    targets.sort_by(|(a, ra), (b, rb)| {
        ra.y.total_cmp(&rb.y).then(ra.x.total_cmp(&rb.x)).then_with(|| a.id.cmp(&b.id))
    });

    let gap = spacing.gap.unwrap_or(DEFAULT_LAYOUT_GAP);
    let inner = padded(ctx, spacing.padding);
    let cell_w = targets.iter().map(|(_, r)| r.width).fold(0.0, f64::max);
    let cell_h = targets.iter().map(|(_, r)| r.height).fold(0.0, f64::max);
    let cols = grid_columns(inner.width, cell_w, gap);
    tracing::debug!(count = targets.len(), cols, "grid layout");

    let positions = grid_positions(inner, targets.len(), cell_w, cell_h, gap);
    update(
        targets
            .into_iter()
            .zip(positions)
            .map(|((o, r), (cx, cy))| {
                let left = cx + (cell_w - r.width) / 2.0;
                let top = cy + (cell_h - r.height) / 2.0;
                let (x, y) = from_aabb(o, left, top);
                (o.id.clone(), clamped(o, ObjectPatch::position(x, y), inner))
            })
            .collect(),
    )
}

/// Wrap targets (by current x) into rows no wider than the padded canvas,
/// centre each row, and centre the block on the group's centroid.
#[allow(clippy::cast_precision_loss)]
fn row_layout(spacing: &Spacing, targets: &[&Arc<CanvasObject>], ctx: &ExecContext<'_>) -> Plan {
    if targets.is_empty() {
        return Plan::Noop;
    }
    let mut items: Vec<(&Arc<CanvasObject>, Rect)> = targets.iter().map(|o| (*o, aabb(o))).collect();
    items.sort_by(|(a, ra), (b, rb)| ra.x.total_cmp(&rb.x).then_with(|| a.id.cmp(&b.id)));

    let gap = spacing.gap.unwrap_or(DEFAULT_LAYOUT_GAP);
    let inner = padded(ctx, spacing.padding);
    let n = items.len() as f64;
    let centroid_x = items.iter().map(|(_, r)| r.x + r.width / 2.0).sum::<f64>() / n;
    let centroid_y = items.iter().map(|(_, r)| r.y + r.height / 2.0).sum::<f64>() / n;

    let widths: Vec<f64> = items.iter().map(|(_, r)| r.width).collect();
    let rows = wrap_rows(&widths, inner.width, gap);
    let row_heights: Vec<f64> =
        rows.iter().map(|range| items[range.clone()].iter().map(|(_, r)| r.height).fold(0.0, f64::max)).collect();
    let block_h = row_heights.iter().sum::<f64>() + gap * (rows.len() as f64 - 1.0);

    let mut patches = Vec::with_capacity(items.len());
    let mut row_top = centroid_y - block_h / 2.0;
    for (range, row_h) in rows.into_iter().zip(row_heights) {
        let row = &items[range];
        let row_w = row.iter().map(|(_, r)| r.width).sum::<f64>() + gap * (row.len() as f64 - 1.0);
        let mut left = centroid_x - row_w / 2.0;
        for (o, r) in row {
            let top = row_top + (row_h - r.height) / 2.0;
            let (x, y) = from_aabb(o, left, top);
            patches.push((o.id.clone(), clamped(o, ObjectPatch::position(x, y), inner)));
            left += r.width + gap;
        }
        row_top += row_h + gap;
    }
    update(patches)
}
