// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion from parsed declaration values to typed style values.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::value::{Color, Font, FontPosture, FontWeight, ParsedValue, StyleValue};

/// Error produced when a parsed value cannot be converted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvertError {
    /// The value still references a named style that could not be resolved.
    UnresolvedLookup(String),
    /// The value has the wrong shape for the property.
    Mismatch {
        /// What the converter accepts.
        expected: &'static str,
        /// What it was given.
        found: String,
    },
    /// The converter does not combine sub-properties.
    NotAShorthand,
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedLookup(name) => write!(f, "could not resolve '{name}'"),
            Self::Mismatch { expected, found } => write!(f, "expected {expected}, found '{found}'"),
            Self::NotAShorthand => f.write_str("converter does not accept sub-properties"),
        }
    }
}

impl core::error::Error for ConvertError {}

/// Turns a fully resolved [`ParsedValue`] into a [`StyleValue`].
///
/// `font` is the font that relative units (`em`, `ex`, and percentages of font
/// properties) are measured against.
pub trait StyleConverter: fmt::Debug {
    /// Converts a single value.
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError>;

    /// Combines resolved sub-property values of a shorthand property.
    fn convert_parts(
        &self,
        parts: Vec<(&'static str, StyleValue)>,
    ) -> Result<StyleValue, ConvertError> {
        let _ = parts;
        Err(ConvertError::NotAShorthand)
    }

    /// Returns `true` for the font shorthand converter, which routes resolution
    /// through the dedicated font lookup.
    fn is_font(&self) -> bool {
        false
    }
}

fn mismatch(expected: &'static str, value: &ParsedValue) -> ConvertError {
    if let Some(name) = value.first_lookup() {
        return ConvertError::UnresolvedLookup(name.to_string());
    }
    ConvertError::Mismatch {
        expected,
        found: format!("{value}"),
    }
}

/// Unwraps single-element sequences produced by the parser.
fn single(value: &ParsedValue) -> &ParsedValue {
    match value {
        ParsedValue::Sequence(items) | ParsedValue::Layers(items) if items.len() == 1 => {
            single(&items[0])
        }
        other => other,
    }
}

/// Numbers and lengths, converted to pixels.
#[derive(Copy, Clone, Debug, Default)]
pub struct NumberConverter;

impl StyleConverter for NumberConverter {
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Number(n) => Ok(StyleValue::Number(*n)),
            ParsedValue::Size(s) => Ok(StyleValue::Number(s.pixels(1.0, font.size))),
            other => Err(mismatch("a number", other)),
        }
    }
}

/// Lengths where percentages are fractions of one.
#[derive(Copy, Clone, Debug, Default)]
pub struct SizeConverter;

impl StyleConverter for SizeConverter {
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        NumberConverter.convert(value, font)
    }
}

/// Font sizes; percentages and `em` are relative to the given font.
#[derive(Copy, Clone, Debug, Default)]
pub struct FontSizeConverter;

impl StyleConverter for FontSizeConverter {
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Number(n) => Ok(StyleValue::Number(*n)),
            ParsedValue::Size(s) => Ok(StyleValue::Number(s.pixels(font.size, font.size))),
            other => Err(mismatch("a font size", other)),
        }
    }
}

/// `true` / `false` keywords.
#[derive(Copy, Clone, Debug, Default)]
pub struct BooleanConverter;

impl StyleConverter for BooleanConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Ident(s) if s.eq_ignore_ascii_case("true") => Ok(StyleValue::Bool(true)),
            ParsedValue::Ident(s) if s.eq_ignore_ascii_case("false") => Ok(StyleValue::Bool(false)),
            other => Err(mismatch("true or false", other)),
        }
    }
}

/// Color literals and color keywords.
#[derive(Copy, Clone, Debug, Default)]
pub struct ColorConverter;

impl StyleConverter for ColorConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Color(c) => Ok(StyleValue::Color(*c)),
            ParsedValue::Ident(name) => Color::named(name)
                .map(StyleValue::Color)
                .ok_or_else(|| mismatch("a color", value)),
            other => Err(mismatch("a color", other)),
        }
    }
}

/// Strings and bare identifiers, kept as text.
#[derive(Copy, Clone, Debug, Default)]
pub struct StringConverter;

impl StyleConverter for StringConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::String(s) | ParsedValue::Ident(s) => Ok(StyleValue::String(s.clone())),
            ParsedValue::Sequence(items) => {
                let mut out = String::new();
                for item in items {
                    let (ParsedValue::Ident(s) | ParsedValue::String(s)) = item else {
                        return Err(mismatch("a string", value));
                    };
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(s);
                }
                Ok(StyleValue::String(Rc::from(out.as_str())))
            }
            other => Err(mismatch("a string", other)),
        }
    }
}

/// One identifier out of a fixed set.
#[derive(Copy, Clone, Debug)]
pub struct EnumConverter {
    /// Accepted keywords, lower case.
    pub values: &'static [&'static str],
}

impl StyleConverter for EnumConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Ident(s) => self
                .values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(s))
                .map(|v| StyleValue::String(Rc::from(*v)))
                .ok_or_else(|| mismatch("a known keyword", value)),
            other => Err(mismatch("a keyword", other)),
        }
    }
}

/// Font weight keywords and numeric weights.
#[derive(Copy, Clone, Debug, Default)]
pub struct FontWeightConverter;

impl StyleConverter for FontWeightConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Ident(s) => FontWeight::from_keyword(s)
                .map(StyleValue::FontWeight)
                .ok_or_else(|| mismatch("a font weight", value)),
            ParsedValue::Number(n) => Ok(StyleValue::FontWeight(FontWeight::from_weight(*n))),
            other => Err(mismatch("a font weight", other)),
        }
    }
}

/// Font posture keywords.
#[derive(Copy, Clone, Debug, Default)]
pub struct FontPostureConverter;

impl StyleConverter for FontPostureConverter {
    fn convert(&self, value: &ParsedValue, _font: &Font) -> Result<StyleValue, ConvertError> {
        match single(value) {
            ParsedValue::Ident(s) => FontPosture::from_keyword(s)
                .map(StyleValue::FontPosture)
                .ok_or_else(|| mismatch("a font style", value)),
            other => Err(mismatch("a font style", other)),
        }
    }
}

/// The `-fx-font` shorthand: `[style] [weight] size family`.
///
/// Parts that are not given fall back to regular posture, normal weight, and the
/// family and size of the reference font.
#[derive(Copy, Clone, Debug, Default)]
pub struct FontConverter;

impl StyleConverter for FontConverter {
    fn convert(&self, value: &ParsedValue, font: &Font) -> Result<StyleValue, ConvertError> {
        let items: &[ParsedValue] = match value {
            ParsedValue::Sequence(items) => items,
            other => core::slice::from_ref(other),
        };
        let mut weight = FontWeight::Normal;
        let mut posture = FontPosture::Regular;
        let mut size = None;
        let mut family: Vec<&str> = Vec::new();
        for item in items {
            match item {
                ParsedValue::Size(s) if size.is_none() => {
                    size = Some(s.pixels(font.size, font.size));
                }
                ParsedValue::Number(n) if size.is_none() && family.is_empty() => {
                    weight = FontWeight::from_weight(*n);
                }
                ParsedValue::Ident(s) if size.is_none() => {
                    if let Some(p) = FontPosture::from_keyword(s) {
                        posture = p;
                    } else if let Some(w) = FontWeight::from_keyword(s) {
                        weight = w;
                    } else {
                        return Err(mismatch("a font", value));
                    }
                }
                ParsedValue::Ident(s) | ParsedValue::String(s) => family.push(s),
                ParsedValue::Layers(families) => {
                    if let Some(ParsedValue::Ident(s) | ParsedValue::String(s)) = families.first() {
                        family.push(s);
                    }
                }
                other => return Err(mismatch("a font", other)),
            }
        }
        let size = size.ok_or_else(|| mismatch("a font with a size", value))?;
        let family = if family.is_empty() {
            font.family.to_string()
        } else {
            family.join(" ")
        };
        let mut out = Font::new(&family, size);
        out.weight = weight;
        out.posture = posture;
        Ok(StyleValue::Font(out))
    }

    fn is_font(&self) -> bool {
        true
    }
}
