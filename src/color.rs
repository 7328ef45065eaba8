//! Colour palettes for new shapes and per-user highlights.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

use rand::Rng;

/// Fill colours picked at random for new shapes without an explicit colour.
pub const SHAPE_PALETTE: [&str; 3] = ["#91c9f9", "#a7f3d0", "#fde68a"];

/// Per-user highlight colours, indexed by a stable hash of the user id.
pub const USER_PALETTE: [&str; 10] = [
    "#e11d48", "#f97316", "#f59e0b", "#84cc16", "#22c55e", "#06b6d4", "#3b82f6", "#8b5cf6", "#ec4899", "#14b8a6",
];

/// Pick a random fill from [`SHAPE_PALETTE`].
#[must_use]
pub fn random_shape_color() -> String {
    let idx = rand::rng().random_range(0..SHAPE_PALETTE.len());
    SHAPE_PALETTE[idx].to_owned()
}

/// Stable highlight colour for a user id.
///
/// Uses a 32-bit `hash * 31 + code_unit` rolling hash so the same id maps to
/// the same colour on every client.
#[must_use]
pub fn color_for_id(id: &str) -> &'static str {
    let hash = id
        .encode_utf16()
        .fold(0_u32, |hash, unit| hash.wrapping_mul(31).wrapping_add(u32::from(unit)));
    USER_PALETTE[hash as usize % USER_PALETTE.len()]
}
