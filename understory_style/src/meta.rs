// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Styleable property descriptors.

use core::fmt;

use crate::converter::{
    FontConverter, FontPostureConverter, FontSizeConverter, FontWeightConverter,
    StringConverter, StyleConverter,
};
use crate::value::{Font, FontPosture, FontWeight, StyleValue};

/// Describes one styleable property.
///
/// Descriptors are `'static` and compared by property name. A shorthand
/// property lists its constituents in `sub_properties`; when no declaration
/// exists for the shorthand itself, its value is assembled from them.
pub struct CssMetaData {
    /// Property name, lower case, e.g. `-fx-opacity`.
    pub property: &'static str,
    /// Converts parsed values for this property.
    pub converter: &'static (dyn StyleConverter + Sync),
    /// Produces the initial value.
    pub initial: fn() -> StyleValue,
    /// Whether the property inherits from the nearest styled ancestor when
    /// nothing matches the node itself.
    pub inherits: bool,
    /// Constituents of a shorthand property.
    pub sub_properties: &'static [&'static CssMetaData],
}

impl CssMetaData {
    /// Returns the initial value.
    pub fn initial_value(&self) -> StyleValue {
        (self.initial)()
    }

    /// Returns `true` if this property resolves through the font lookup.
    pub fn is_font(&self) -> bool {
        self.converter.is_font()
    }
}

impl PartialEq for CssMetaData {
    fn eq(&self, other: &Self) -> bool {
        self.property == other.property
    }
}

impl Eq for CssMetaData {}

impl fmt::Debug for CssMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssMetaData")
            .field("property", &self.property)
            .field("inherits", &self.inherits)
            .finish_non_exhaustive()
    }
}

fn default_font() -> StyleValue {
    StyleValue::Font(Font::default())
}

/// The `-fx-font` shorthand.
pub static FONT: CssMetaData = CssMetaData {
    property: "-fx-font",
    converter: &FontConverter,
    initial: default_font,
    inherits: true,
    sub_properties: &[&FONT_SIZE, &FONT_WEIGHT, &FONT_STYLE, &FONT_FAMILY],
};

/// `-fx-font-size`
pub static FONT_SIZE: CssMetaData = CssMetaData {
    property: "-fx-font-size",
    converter: &FontSizeConverter,
    initial: || StyleValue::Number(Font::DEFAULT_SIZE),
    inherits: true,
    sub_properties: &[],
};

/// `-fx-font-weight`
pub static FONT_WEIGHT: CssMetaData = CssMetaData {
    property: "-fx-font-weight",
    converter: &FontWeightConverter,
    initial: || StyleValue::FontWeight(FontWeight::Normal),
    inherits: true,
    sub_properties: &[],
};

/// `-fx-font-style`
pub static FONT_STYLE: CssMetaData = CssMetaData {
    property: "-fx-font-style",
    converter: &FontPostureConverter,
    initial: || StyleValue::FontPosture(FontPosture::Regular),
    inherits: true,
    sub_properties: &[],
};

/// `-fx-font-family`
pub static FONT_FAMILY: CssMetaData = CssMetaData {
    property: "-fx-font-family",
    converter: &StringConverter,
    initial: || StyleValue::String(alloc::rc::Rc::from(Font::DEFAULT_FAMILY)),
    inherits: true,
    sub_properties: &[],
};
