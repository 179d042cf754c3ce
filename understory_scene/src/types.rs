// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene graph: node identifiers, node kinds, and the
//! small enums that describe node appearance.

use alloc::rc::Rc;

use kurbo::Rect;
use understory_style::{Color, Font};

/// Identifier for a node in the scene graph (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The concrete kind of a node, which decides its intrinsic geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A container whose bounds are the union of its visible children.
    Group,
    /// A resizable container. Its size is assigned by layout.
    Region,
    /// An axis-aligned rectangle anchored at the local origin.
    Rectangle {
        /// Width.
        width: f64,
        /// Height.
        height: f64,
    },
    /// A circle centered on the local origin.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// A single line of text; metrics derive from the node's font.
    Text {
        /// Text content.
        content: Rc<str>,
    },
}

impl NodeKind {
    /// Creates a text kind.
    pub fn text(content: &str) -> Self {
        Self::Text {
            content: Rc::from(content),
        }
    }

    /// Whether nodes of this kind may have children.
    pub fn is_parent(&self) -> bool {
        matches!(self, Self::Group | Self::Region)
    }

    /// Whether nodes of this kind are sized by their parent's layout.
    pub fn is_resizable(&self) -> bool {
        matches!(self, Self::Region)
    }

    /// Whether nodes of this kind carry fill and stroke.
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            Self::Rectangle { .. } | Self::Circle { .. } | Self::Text { .. }
        )
    }

    /// Name used by type selectors.
    pub fn type_selector(&self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Region => "Region",
            Self::Rectangle { .. } => "Rectangle",
            Self::Circle { .. } => "Circle",
            Self::Text { .. } => "Text",
        }
    }
}

/// Average advance of a glyph as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;
/// Line height as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;

/// Approximate bounds of a line of text set in `font`, with the baseline at
/// `y = 0`.
///
/// There is no shaping here; the estimate only needs to be stable and to scale
/// with the font.
pub fn text_bounds(content: &str, font: &Font) -> Rect {
    let glyphs = content.chars().count() as f64;
    let ascent = font.size * 0.8;
    Rect::new(
        0.0,
        -ascent,
        glyphs * font.size * GLYPH_ADVANCE,
        font.size * LINE_HEIGHT - ascent,
    )
}

/// Visual effects that extend a node's bounds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Effect {
    /// Gaussian blur of the given radius.
    GaussianBlur {
        /// Blur radius.
        radius: f64,
    },
    /// A blurred, offset copy of the node drawn beneath it.
    DropShadow {
        /// Blur radius.
        radius: f64,
        /// Horizontal offset.
        offset_x: f64,
        /// Vertical offset.
        offset_y: f64,
    },
}

impl Effect {
    /// Returns the area touched when the effect is applied to `input`.
    pub fn bounds(&self, input: Rect) -> Rect {
        match *self {
            Self::GaussianBlur { radius } => input.inflate(radius, radius),
            Self::DropShadow {
                radius,
                offset_x,
                offset_y,
            } => {
                let shadow = input
                    .inflate(radius, radius)
                    .with_origin((input.x0 - radius + offset_x, input.y0 - radius + offset_y));
                input.union(shadow)
            }
        }
    }
}

/// Horizontal flow of a node and its descendants.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeOrientation {
    /// Left to right.
    LeftToRight,
    /// Right to left; the node is mirrored relative to a left-to-right parent.
    RightToLeft,
    /// Same as the parent.
    #[default]
    Inherit,
}

/// How a node's pixels are combined with what lies beneath it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Normal compositing.
    SrcOver,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
    /// Overlay.
    Overlay,
    /// Darken.
    Darken,
    /// Lighten.
    Lighten,
    /// Additive.
    Add,
}

impl BlendMode {
    /// Keywords accepted by the `-fx-blend-mode` property.
    pub const KEYWORDS: &'static [&'static str] = &[
        "src-over", "multiply", "screen", "overlay", "darken", "lighten", "add",
    ];

    /// Parses a blend-mode keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword.to_ascii_lowercase().as_str() {
            "src-over" => Self::SrcOver,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "add" => Self::Add,
            _ => return None,
        })
    }

    /// The keyword for this mode.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::SrcOver => "src-over",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::Add => "add",
        }
    }
}

/// Tradeoff requested when a node is cached as a bitmap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CacheHint {
    /// Let the backend decide.
    #[default]
    Default,
    /// Prefer redraw speed.
    Speed,
    /// Prefer visual quality.
    Quality,
}

/// Which dimension of a resizable node depends on the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentBias {
    /// Height depends on width.
    Horizontal,
    /// Width depends on height.
    Vertical,
}

/// Styled paint and decoration of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Appearance {
    /// Shape fill.
    pub fill: Option<Color>,
    /// Shape stroke.
    pub stroke: Option<Color>,
    /// Stroke width.
    pub stroke_width: f64,
    /// Region background.
    pub background: Option<Color>,
    /// Region border color.
    pub border_color: Option<Color>,
    /// Region border width.
    pub border_width: f64,
    /// Region padding, applied on every side.
    pub padding: f64,
    /// Text font.
    pub font: Font,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            fill: Some(Color::BLACK),
            stroke: None,
            stroke_width: 1.0,
            background: None,
            border_color: None,
            border_width: 0.0,
            padding: 0.0,
            font: Font::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_shadow_bounds_cover_input_and_shadow() {
        let shadow = Effect::DropShadow {
            radius: 2.0,
            offset_x: 5.0,
            offset_y: 5.0,
        };
        assert_eq!(
            shadow.bounds(Rect::new(0.0, 0.0, 10.0, 10.0)),
            Rect::new(0.0, 0.0, 17.0, 17.0),
            "shadow extends down and right"
        );
        let blur = Effect::GaussianBlur { radius: 3.0 };
        assert_eq!(
            blur.bounds(Rect::new(0.0, 0.0, 10.0, 10.0)),
            Rect::new(-3.0, -3.0, 13.0, 13.0),
            "blur inflates evenly"
        );
    }

    #[test]
    fn text_bounds_scale_with_font() {
        let small = text_bounds("abcd", &Font::new("System", 10.0));
        let large = text_bounds("abcd", &Font::new("System", 20.0));
        assert_eq!(small.width() * 2.0, large.width(), "width doubles");
        assert!(small.y0 < 0.0, "ascent is above the baseline");
    }

    #[test]
    fn blend_mode_keywords_round_trip() {
        for k in BlendMode::KEYWORDS {
            let mode = BlendMode::from_keyword(k).unwrap();
            assert_eq!(mode.keyword(), *k, "keyword for {mode:?}");
        }
    }
}
