//! Canvas drawing state
//!
//! Style properties of a 2D context, scoped by `save`/`restore`.

use std::fmt;
use std::str::FromStr;

use crate::transforms::TransformMatrix;
use crate::{CanvasError, Result};

/// Line cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Text alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Start,
    End,
    Left,
    Right,
    Center,
}

/// Text baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextBaseline {
    Top,
    Hanging,
    Middle,
    #[default]
    Alphabetic,
    Ideographic,
    Bottom,
}

macro_rules! keyword_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = CanvasError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(CanvasError::InvalidArgument(format!(
                        "{} is not a valid {}",
                        other,
                        stringify!($ty)
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum!(LineCap { Butt => "butt", Round => "round", Square => "square" });
keyword_enum!(LineJoin { Miter => "miter", Round => "round", Bevel => "bevel" });
keyword_enum!(TextAlign {
    Start => "start",
    End => "end",
    Left => "left",
    Right => "right",
    Center => "center",
});
keyword_enum!(TextBaseline {
    Top => "top",
    Hanging => "hanging",
    Middle => "middle",
    Alphabetic => "alphabetic",
    Ideographic => "ideographic",
    Bottom => "bottom",
});

/// Script-facing type of a state property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Number,
    Text,
}

/// Value of a state property as seen by script
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f64),
    Text(String),
}

/// One frame of the state stack
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingState {
    pub fill_style: String,
    pub stroke_style: String,
    pub global_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    pub shadow_blur: f64,
    pub shadow_color: String,
    /// Kept verbatim, validated when a draw uses it
    pub composite_operation: String,
    pub font: String,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub transform: TransformMatrix,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            fill_style: "#000000".to_string(),
            stroke_style: "#000000".to_string(),
            global_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            shadow_blur: 0.0,
            shadow_color: "#000000".to_string(),
            composite_operation: "source-over".to_string(),
            font: "10px sans-serif".to_string(),
            text_align: TextAlign::default(),
            text_baseline: TextBaseline::default(),
            transform: TransformMatrix::identity(),
        }
    }
}

impl DrawingState {
    /// Names of the script-visible properties
    pub const PROPERTIES: &'static [&'static str] = &[
        "fillStyle",
        "strokeStyle",
        "globalAlpha",
        "lineWidth",
        "lineCap",
        "lineJoin",
        "miterLimit",
        "shadowOffsetX",
        "shadowOffsetY",
        "shadowBlur",
        "shadowColor",
        "globalCompositeOperation",
        "font",
        "textAlign",
        "textBaseline",
    ];

    /// Type of a property, `None` for unknown names
    pub fn kind(name: &str) -> Option<PropKind> {
        match name {
            "globalAlpha" | "lineWidth" | "miterLimit" | "shadowOffsetX" | "shadowOffsetY"
            | "shadowBlur" => Some(PropKind::Number),
            "fillStyle" | "strokeStyle" | "lineCap" | "lineJoin" | "shadowColor"
            | "globalCompositeOperation" | "font" | "textAlign" | "textBaseline" => {
                Some(PropKind::Text)
            }
            _ => None,
        }
    }

    /// Read a property by its script name
    pub fn get(&self, name: &str) -> Result<StyleValue> {
        use StyleValue::{Number, Text};
        Ok(match name {
            "fillStyle" => Text(self.fill_style.clone()),
            "strokeStyle" => Text(self.stroke_style.clone()),
            "globalAlpha" => Number(self.global_alpha),
            "lineWidth" => Number(self.line_width),
            "lineCap" => Text(self.line_cap.to_string()),
            "lineJoin" => Text(self.line_join.to_string()),
            "miterLimit" => Number(self.miter_limit),
            "shadowOffsetX" => Number(self.shadow_offset_x),
            "shadowOffsetY" => Number(self.shadow_offset_y),
            "shadowBlur" => Number(self.shadow_blur),
            "shadowColor" => Text(self.shadow_color.clone()),
            "globalCompositeOperation" => Text(self.composite_operation.clone()),
            "font" => Text(self.font.clone()),
            "textAlign" => Text(self.text_align.to_string()),
            "textBaseline" => Text(self.text_baseline.to_string()),
            other => return Err(unknown(other)),
        })
    }

    /// Assign a property by its script name.
    ///
    /// Like a browser context, values that do not fit the property
    /// (non-finite numbers, unknown keywords) are ignored.
    pub fn set(&mut self, name: &str, value: StyleValue) -> Result<()> {
        let kind = Self::kind(name).ok_or_else(|| unknown(name))?;
        match (kind, value) {
            (PropKind::Number, StyleValue::Number(v)) => {
                if !v.is_finite() {
                    tracing::trace!(name, value = v, "ignoring non-finite assignment");
                    return Ok(());
                }
                match name {
                    "globalAlpha" => {
                        if (0.0..=1.0).contains(&v) {
                            self.global_alpha = v;
                        }
                    }
                    "lineWidth" if v > 0.0 => self.line_width = v,
                    "miterLimit" if v > 0.0 => self.miter_limit = v,
                    "shadowOffsetX" => self.shadow_offset_x = v,
                    "shadowOffsetY" => self.shadow_offset_y = v,
                    "shadowBlur" if v >= 0.0 => self.shadow_blur = v,
                    _ => {}
                }
            }
            (PropKind::Text, StyleValue::Text(s)) => match name {
                "fillStyle" => self.fill_style = s,
                "strokeStyle" => self.stroke_style = s,
                "shadowColor" => self.shadow_color = s,
                "globalCompositeOperation" => self.composite_operation = s,
                "font" => self.font = s,
                "lineCap" => assign_keyword(&mut self.line_cap, &s),
                "lineJoin" => assign_keyword(&mut self.line_join, &s),
                "textAlign" => assign_keyword(&mut self.text_align, &s),
                "textBaseline" => assign_keyword(&mut self.text_baseline, &s),
                _ => {}
            },
            (_, value) => {
                tracing::trace!(name, ?value, "ignoring mistyped assignment");
            }
        }
        Ok(())
    }
}

fn assign_keyword<T: FromStr>(slot: &mut T, value: &str) {
    if let Ok(parsed) = value.parse() {
        *slot = parsed;
    }
}

fn unknown(name: &str) -> CanvasError {
    CanvasError::InvalidArgument(format!("unknown context property {name}"))
}

/// Save/restore stack, never empty
#[derive(Debug, Clone)]
pub struct StateStack {
    frames: Vec<DrawingState>,
}

impl StateStack {
    pub fn new() -> Self {
        Self {
            frames: vec![DrawingState::default()],
        }
    }

    /// Current state
    pub fn current(&self) -> &DrawingState {
        // the stack is never empty: restore keeps the base frame
        &self.frames[self.frames.len() - 1]
    }

    /// Current state, mutably
    pub fn current_mut(&mut self) -> &mut DrawingState {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    /// Push a copy of the current state
    pub fn save(&mut self) {
        let top = self.current().clone();
        self.frames.push(top);
    }

    /// Pop the current state. Returns `false` and leaves the stack
    /// untouched when only the base frame is left.
    pub fn restore(&mut self) -> bool {
        if self.frames.len() > 1 {
            self.frames.pop();
            true
        } else {
            tracing::trace!("restore without matching save ignored");
            false
        }
    }

    /// Number of frames, at least 1
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn set_transform(&mut self, m: TransformMatrix) {
        self.current_mut().transform = m;
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        let state = self.current_mut();
        state.transform = state.transform.scale(sx, sy);
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        let state = self.current_mut();
        state.transform = state.transform.translate(tx, ty);
    }
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}
