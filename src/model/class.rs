//! Vehicle class registry: id → display attributes.
//!
//! The engine consumes the registry read-only (class names for export,
//! shortcut/color lookups for the UI layer); editing and persisting it is
//! the application's concern.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Display attributes of one annotatable class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleClass {
    /// Unique class identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// RGB render color.
    pub color: [u8; 3],
    /// Keyboard shortcut assigned to this class, if any.
    pub shortcut: Option<char>,
    /// Optional free-form description.
    pub description: Option<String>,
}

impl VehicleClass {
    /// Create a class with a color from the default palette.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color_for_id(id),
            shortcut: None,
            description: None,
        }
    }

    /// Set the keyboard shortcut.
    pub fn with_shortcut(mut self, shortcut: char) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    /// Set the color.
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered collection of vehicle classes, keyed by class id.
///
/// Iteration order is ascending id, which also defines the zero-based class
/// indices used by YOLO export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRegistry {
    classes: BTreeMap<u32, VehicleClass>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default road-scene registry: motorcycle, car, truck, bus.
    pub fn default_vehicle_classes() -> Self {
        let mut registry = Self::new();
        let defaults = [
            (0, "motorcycle", '1'),
            (1, "car", '2'),
            (2, "truck", '3'),
            (3, "bus", '4'),
        ];
        for (id, name, shortcut) in defaults {
            // Defaults cannot collide, so insert never fails here.
            let _ = registry.insert(VehicleClass::new(id, name).with_shortcut(shortcut));
        }
        registry
    }

    /// Add a class, rejecting duplicate ids, names, and shortcuts.
    pub fn insert(&mut self, class: VehicleClass) -> Result<()> {
        if self.classes.contains_key(&class.id) {
            return Err(EngineError::invalid_state(format!(
                "class id {} already registered",
                class.id
            )));
        }
        if self.classes.values().any(|c| c.name == class.name) {
            return Err(EngineError::invalid_state(format!(
                "class name '{}' already registered",
                class.name
            )));
        }
        if let Some(key) = class.shortcut {
            if self.classes.values().any(|c| c.shortcut == Some(key)) {
                return Err(EngineError::invalid_state(format!(
                    "shortcut '{}' already registered",
                    key
                )));
            }
        }
        self.classes.insert(class.id, class);
        Ok(())
    }

    /// Look up a class by id.
    pub fn get(&self, id: u32) -> Option<&VehicleClass> {
        self.classes.get(&id)
    }

    /// Display name for a class id, or "unknown".
    pub fn name_of(&self, id: u32) -> &str {
        self.get(id).map_or("unknown", |c| c.name.as_str())
    }

    /// Look up a class by its keyboard shortcut.
    pub fn by_shortcut(&self, key: char) -> Option<&VehicleClass> {
        self.classes.values().find(|c| c.shortcut == Some(key))
    }

    /// Iterate classes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &VehicleClass> {
        self.classes.values()
    }

    /// Zero-based export index for a class id (position in id order).
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.classes.keys().position(|&k| k == id)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Default palette color for a class id, spaced by the golden angle.
fn color_for_id(id: u32) -> [u8; 3] {
    let hue = (id as f32 * 137.5) % 360.0;
    let (r, g, b) = hsv_to_rgb(hue, 0.7, 0.9);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Convert HSV to RGB (h in degrees, s and v in 0-1).
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = ClassRegistry::default_vehicle_classes();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.name_of(0), "motorcycle");
        assert_eq!(registry.name_of(1), "car");
        assert_eq!(registry.name_of(2), "truck");
        assert_eq!(registry.name_of(3), "bus");
        assert_eq!(registry.by_shortcut('3').map(|c| c.id), Some(2));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = ClassRegistry::new();
        registry.insert(VehicleClass::new(0, "car")).unwrap();
        assert!(registry.insert(VehicleClass::new(0, "truck")).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ClassRegistry::new();
        registry.insert(VehicleClass::new(0, "car")).unwrap();
        assert!(registry.insert(VehicleClass::new(1, "car")).is_err());
    }

    #[test]
    fn test_duplicate_shortcut_rejected() {
        let mut registry = ClassRegistry::new();
        registry
            .insert(VehicleClass::new(0, "car").with_shortcut('1'))
            .unwrap();
        assert!(
            registry
                .insert(VehicleClass::new(1, "bus").with_shortcut('1'))
                .is_err()
        );
    }

    #[test]
    fn test_index_follows_id_order() {
        let mut registry = ClassRegistry::new();
        registry.insert(VehicleClass::new(7, "bus")).unwrap();
        registry.insert(VehicleClass::new(2, "car")).unwrap();
        assert_eq!(registry.index_of(2), Some(0));
        assert_eq!(registry.index_of(7), Some(1));
        assert_eq!(registry.index_of(99), None);
    }

    #[test]
    fn test_distinct_default_colors() {
        let registry = ClassRegistry::default_vehicle_classes();
        let colors: Vec<_> = registry.iter().map(|c| c.color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in colors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_name_of_unknown() {
        let registry = ClassRegistry::new();
        assert_eq!(registry.name_of(42), "unknown");
    }
}
