//! Shared numeric constants for the sync engine.

// ── Object defaults ─────────────────────────────────────────────

/// Default width of a new non-circle shape.
pub const DEFAULT_SHAPE_WIDTH: f64 = 160.0;

/// Default height of a new non-circle shape.
pub const DEFAULT_SHAPE_HEIGHT: f64 = 100.0;

/// Default diameter of a new circle.
pub const DEFAULT_CIRCLE_SIZE: f64 = 120.0;

/// Default font size for new text objects.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// Default font family for new text objects.
pub const DEFAULT_FONT_FAMILY: &str = "Inter, sans-serif";

/// Origin of the cascading placement used when a shape has no position.
pub const NEW_SHAPE_ORIGIN: f64 = 120.0;

/// Step between successive cascaded shapes, and the duplicate offset.
pub const NEW_SHAPE_CASCADE: f64 = 24.0;

/// Offset applied when a saved component is inserted back onto the canvas.
pub const COMPONENT_INSERT_OFFSET: f64 = 20.0;

// ── Text kinds ──────────────────────────────────────────────────

/// Font size applied by `setTextKindSelected { kind: heading }`.
pub const HEADING_FONT_SIZE: f64 = 32.0;

/// Font size applied by `setTextKindSelected { kind: subtitle }`.
pub const SUBTITLE_FONT_SIZE: f64 = 20.0;

/// Font size applied by `setTextKindSelected { kind: body }`.
pub const BODY_FONT_SIZE: f64 = 16.0;

/// Approximate glyph advance as a fraction of the font size.
pub const TEXT_ADVANCE_RATIO: f64 = 0.6;

/// Line box height as a multiple of the font size.
pub const TEXT_LINE_HEIGHT: f64 = 1.4;

// ── Layout ──────────────────────────────────────────────────────

/// Gap used by layout commands when the payload omits one.
pub const DEFAULT_LAYOUT_GAP: f64 = 16.0;

/// Padding used by layout commands when the payload omits one.
pub const DEFAULT_LAYOUT_PADDING: f64 = 24.0;

/// Default width of a generated login form.
pub const LOGIN_FORM_WIDTH: f64 = 320.0;

/// Height of each input row in a generated login form.
pub const LOGIN_INPUT_HEIGHT: f64 = 40.0;

/// Upper bound on objects produced by one batch-creation command.
pub const MAX_CREATE_MANY: u32 = 500;

/// Default title of a generated login form.
pub const LOGIN_TITLE: &str = "Sign in";

/// Default button label of a generated login form.
pub const LOGIN_BUTTON_TEXT: &str = "Log in";

/// Login form panel fill.
pub const LOGIN_PANEL_COLOR: &str = "#f8fafc";

/// Login form input fill.
pub const LOGIN_INPUT_COLOR: &str = "#e2e8f0";

/// Login form button fill when the command gives none.
pub const LOGIN_BUTTON_COLOR: &str = "#3b82f6";

/// Login form text colour for the title.
pub const LOGIN_TITLE_COLOR: &str = "#0f172a";

/// Login form text colour for the button label.
pub const LOGIN_LABEL_COLOR: &str = "#ffffff";
