//! Document registries
//!
//! The closed set of elements and events the host understands, the
//! document listener table and the canvases attached to the body.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::HostError;

/// Elements `document.createElement` can build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Script,
    Div,
    Canvas,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Div => "div",
            Self::Canvas => "canvas",
        }
    }
}

impl FromStr for ElementKind {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "div" => Ok(Self::Div),
            "canvas" => Ok(Self::Canvas),
            _ => Err(HostError::UnsupportedMode {
                what: "element",
                name: s.to_string(),
            }),
        }
    }
}

/// Document events scripts may listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    MouseMove,
    KeyDown,
    KeyUp,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MouseMove => "mousemove",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mousemove" => Ok(Self::MouseMove),
            "keydown" => Ok(Self::KeyDown),
            "keyup" => Ok(Self::KeyUp),
            _ => Err(HostError::UnsupportedEventType(s.to_string())),
        }
    }
}

/// Listeners per event type, in registration order
#[derive(Debug)]
pub struct EventListeners<T> {
    by_type: HashMap<EventType, Vec<T>>,
}

impl<T: Clone> EventListeners<T> {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    pub fn add(&mut self, event: EventType, listener: T) {
        self.by_type.entry(event).or_default().push(listener);
    }

    /// Copy of the listeners for `event`, so dispatch may register more
    pub fn listeners(&self, event: EventType) -> Vec<T> {
        self.by_type.get(&event).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
    }
}

impl<T: Clone> Default for EventListeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Canvases appended to the body, keyed by element id
#[derive(Debug)]
pub struct BodyLayers<T> {
    layers: Vec<(u32, T)>,
}

impl<T> BodyLayers<T> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Attach a canvas. Re-attaching moves it to the end.
    pub fn attach(&mut self, id: u32, element: T) {
        self.detach(id);
        self.layers.push((id, element));
    }

    pub fn detach(&mut self, id: u32) -> bool {
        let before = self.layers.len();
        self.layers.retain(|(existing, _)| *existing != id);
        self.layers.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.layers.iter().map(|(_, element)| element)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }
}

impl<T> Default for BodyLayers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drawing order for layers with the given z-indices: ascending and
/// stable, so equal z keeps attach order and higher z lands on top.
pub fn composition_order(z_indices: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..z_indices.len()).collect();
    order.sort_by(|&a, &b| z_indices[a].total_cmp(&z_indices[b]));
    order
}
