//! Reusable component library: saved groups of objects.
//!
//! Components store sanitized copies (no sync metadata, no highlight) keyed
//! by name. Inserting a component mints fresh ids and offsets the copies so
//! they never land exactly on top of the originals.

#[cfg(test)]
#[path = "library_test.rs"]
mod library_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::COMPONENT_INSERT_OFFSET;
use crate::model::{CanvasObject, sanitize};

/// A named group of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub objects: Vec<CanvasObject>,
}

#[derive(Debug, Default)]
pub struct ComponentLibrary {
    components: BTreeMap<String, Component>,
}

impl ComponentLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `objects` under `name`, replacing any component of that name.
    ///
    /// Returns `false` (and saves nothing) for an empty group or blank name.
    pub fn save<'a>(&mut self, name: &str, objects: impl IntoIterator<Item = &'a CanvasObject>) -> bool {
        let name = name.trim();
        let objects: Vec<CanvasObject> = objects.into_iter().map(sanitize).collect();
        if name.is_empty() || objects.is_empty() {
            return false;
        }
        self.components.insert(name.to_owned(), Component { name: name.to_owned(), objects });
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Saved component names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<Component> {
        self.components.remove(name)
    }

    /// Fresh copies of a component ready to add to the canvas, stacked from
    /// `base_order` upwards in their saved order.
    #[must_use]
    pub fn instantiate(&self, name: &str, base_order: i64) -> Option<Vec<CanvasObject>> {
        let component = self.components.get(name)?;
        let copies = component
            .objects
            .iter()
            .zip(base_order..)
            .map(|(saved, order)| CanvasObject {
                id: Uuid::new_v4().to_string(),
                x: saved.x + COMPONENT_INSERT_OFFSET,
                y: saved.y + COMPONENT_INSERT_OFFSET,
                order,
                ..saved.clone()
            })
            .collect();
        Some(copies)
    }
}
