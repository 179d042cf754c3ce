// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parsed and computed style values.
//!
//! A [`ParsedValue`] is what a declaration holds before conversion: keywords,
//! numbers, sizes with units, colors, strings, and references to other named
//! styles ("lookups"). Converters turn resolved parsed values into
//! [`StyleValue`]s, which are what styleable properties store.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::origin::StyleOrigin;

/// Unit of a [`Size`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SizeUnit {
    /// CSS pixels.
    Px,
    /// Points (1/72 inch).
    Pt,
    /// Inches.
    In,
    /// Centimeters.
    Cm,
    /// Millimeters.
    Mm,
    /// Multiples of the current font size.
    Em,
    /// Multiples of the current font's x-height (half the font size).
    Ex,
    /// Percentage of a reference length.
    Percent,
}

impl SizeUnit {
    /// Parses a unit suffix such as `px` or `em`.
    pub fn from_suffix(unit: &str) -> Option<Self> {
        Some(match unit.to_ascii_lowercase().as_str() {
            "px" => Self::Px,
            "pt" => Self::Pt,
            "in" => Self::In,
            "cm" => Self::Cm,
            "mm" => Self::Mm,
            "em" => Self::Em,
            "ex" => Self::Ex,
            "%" => Self::Percent,
            _ => return None,
        })
    }
}

/// A length with a unit, as written in a declaration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Size {
    /// Numeric value.
    pub value: f64,
    /// Unit of `value`.
    pub unit: SizeUnit,
}

const POINTS_PER_INCH: f64 = 72.0;
const PIXELS_PER_INCH: f64 = 96.0;

impl Size {
    /// Creates a size.
    pub const fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    /// Creates a pixel size.
    pub const fn px(value: f64) -> Self {
        Self::new(value, SizeUnit::Px)
    }

    /// Returns `true` for units that depend on the font.
    pub fn is_font_relative(&self, percent_is_relative: bool) -> bool {
        match self.unit {
            SizeUnit::Em | SizeUnit::Ex => true,
            SizeUnit::Percent => percent_is_relative,
            _ => false,
        }
    }

    /// Converts to pixels.
    ///
    /// `multiplier` is the reference length for percentages and `font_size` the
    /// base for `em`/`ex`.
    pub fn pixels(&self, multiplier: f64, font_size: f64) -> f64 {
        let v = self.value;
        match self.unit {
            SizeUnit::Px => v,
            SizeUnit::Pt => v * (PIXELS_PER_INCH / POINTS_PER_INCH),
            SizeUnit::In => v * PIXELS_PER_INCH,
            SizeUnit::Cm => v * (PIXELS_PER_INCH / 2.54),
            SizeUnit::Mm => v * (PIXELS_PER_INCH / 25.4),
            SizeUnit::Em => v * font_size,
            SizeUnit::Ex => v * font_size / 2.0,
            SizeUnit::Percent => v / 100.0 * multiplier,
        }
    }
}

/// An sRGB color with 8-bit channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a color with alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Looks up a CSS color keyword.
    pub fn named(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "blue" => Self::rgb(0, 0, 255),
            "navy" => Self::rgb(0, 0, 128),
            "yellow" => Self::rgb(255, 255, 0),
            "orange" => Self::rgb(255, 165, 0),
            "purple" => Self::rgb(128, 0, 128),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "silver" => Self::rgb(192, 192, 192),
            "dodgerblue" => Self::rgb(30, 144, 255),
            _ => return None,
        })
    }

    /// Parses `rgb`, `rrggbb`, or `rrggbbaa` hex digits (without the `#`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| -> Option<u8> {
            let c = *hex.as_bytes().get(i)?;
            char::from(c).to_digit(16).and_then(|d| u8::try_from(d).ok())
        };
        let pair = |i: usize| -> Option<u8> { Some(digit(i)? * 16 + digit(i + 1)?) };
        match hex.len() {
            3 => Some(Self::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
            6 => Some(Self::rgb(pair(0)?, pair(2)?, pair(4)?)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }
}

/// Font weight on the CSS 100..900 scale.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontWeight {
    /// 100
    Thin,
    /// 200
    ExtraLight,
    /// 300
    Light,
    /// 400
    #[default]
    Normal,
    /// 500
    Medium,
    /// 600
    SemiBold,
    /// 700
    Bold,
    /// 800
    ExtraBold,
    /// 900
    Black,
}

impl FontWeight {
    /// Numeric weight.
    pub const fn weight(self) -> u16 {
        match self {
            Self::Thin => 100,
            Self::ExtraLight => 200,
            Self::Light => 300,
            Self::Normal => 400,
            Self::Medium => 500,
            Self::SemiBold => 600,
            Self::Bold => 700,
            Self::ExtraBold => 800,
            Self::Black => 900,
        }
    }

    /// Closest weight for a numeric value.
    pub fn from_weight(weight: f64) -> Self {
        match weight {
            w if w < 150.0 => Self::Thin,
            w if w < 250.0 => Self::ExtraLight,
            w if w < 350.0 => Self::Light,
            w if w < 450.0 => Self::Normal,
            w if w < 550.0 => Self::Medium,
            w if w < 650.0 => Self::SemiBold,
            w if w < 750.0 => Self::Bold,
            w if w < 850.0 => Self::ExtraBold,
            _ => Self::Black,
        }
    }

    /// Parses a weight keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword.to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            "bold" => Self::Bold,
            "bolder" => Self::ExtraBold,
            "lighter" => Self::Light,
            "thin" => Self::Thin,
            "light" => Self::Light,
            "medium" => Self::Medium,
            "semibold" | "semi-bold" => Self::SemiBold,
            "extrabold" | "extra-bold" => Self::ExtraBold,
            "black" => Self::Black,
            _ => return None,
        })
    }
}

/// Font posture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontPosture {
    /// Upright.
    #[default]
    Regular,
    /// Italic or oblique.
    Italic,
}

impl FontPosture {
    /// Parses a posture keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "normal" | "regular" => Some(Self::Regular),
            "italic" | "oblique" => Some(Self::Italic),
            _ => None,
        }
    }
}

/// A resolved font description.
#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    /// Family name, unquoted.
    pub family: Rc<str>,
    /// Size in pixels.
    pub size: f64,
    /// Weight.
    pub weight: FontWeight,
    /// Posture.
    pub posture: FontPosture,
}

impl Font {
    /// Family used when nothing else is specified.
    pub const DEFAULT_FAMILY: &'static str = "System";
    /// Size used when nothing else is specified.
    pub const DEFAULT_SIZE: f64 = 13.0;

    /// Creates a regular-weight upright font.
    pub fn new(family: &str, size: f64) -> Self {
        Self {
            family: Rc::from(family),
            size,
            weight: FontWeight::Normal,
            posture: FontPosture::Regular,
        }
    }

    /// Returns a copy with the given parts replaced.
    ///
    /// `None` keeps the current part; a non-positive `size` keeps the current size.
    pub fn derive(
        &self,
        family: Option<&str>,
        weight: Option<FontWeight>,
        posture: Option<FontPosture>,
        size: f64,
    ) -> Self {
        Self {
            family: family
                .map(|f| Rc::from(f.trim_matches(['"', '\''])))
                .unwrap_or_else(|| self.family.clone()),
            size: if size > 0.0 { size } else { self.size },
            weight: weight.unwrap_or(self.weight),
            posture: posture.unwrap_or(self.posture),
        }
    }

    /// Returns a hashable key identifying this font.
    pub fn key(&self) -> FontKey {
        FontKey {
            family: self.family.clone(),
            size_bits: self.size.to_bits(),
            weight: self.weight,
            posture: self.posture,
        }
    }
}

impl Default for Font {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAMILY, Self::DEFAULT_SIZE)
    }
}

/// Hashable identity of a [`Font`], used in cache keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontKey {
    family: Rc<str>,
    size_bits: u64,
    weight: FontWeight,
    posture: FontPosture,
}

/// A declaration value before conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedValue {
    /// A keyword such as `inherit`, `bold`, or a color name.
    Ident(Rc<str>),
    /// A reference to another named style, e.g. `-fx-base`.
    Lookup(Rc<str>),
    /// A unitless number.
    Number(f64),
    /// A length.
    Size(Size),
    /// A color literal.
    Color(Color),
    /// A quoted string.
    String(Rc<str>),
    /// Space separated values.
    Sequence(Vec<ParsedValue>),
    /// Comma separated values.
    Layers(Vec<ParsedValue>),
}

impl ParsedValue {
    /// Creates an identifier value.
    pub fn ident(s: &str) -> Self {
        Self::Ident(Rc::from(s))
    }

    /// Creates a lookup reference, normalizing the name to lower case.
    pub fn lookup(name: &str) -> Self {
        Self::Lookup(Rc::from(name.to_ascii_lowercase().as_str()))
    }

    /// Creates a string value.
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    /// Returns `true` for the `inherit` keyword.
    pub fn is_inherit(&self) -> bool {
        self.is_keyword("inherit")
    }

    /// Returns `true` for the `null` and `none` keywords.
    pub fn is_null_or_none(&self) -> bool {
        self.is_keyword("null") || self.is_keyword("none")
    }

    /// Returns `true` if this value or any nested value is a lookup.
    pub fn contains_lookups(&self) -> bool {
        match self {
            Self::Lookup(_) => true,
            Self::Sequence(items) | Self::Layers(items) => items.iter().any(Self::contains_lookups),
            _ => false,
        }
    }

    /// Returns the first lookup name left in this value, if any.
    pub fn first_lookup(&self) -> Option<&str> {
        match self {
            Self::Lookup(name) => Some(name),
            Self::Sequence(items) | Self::Layers(items) => items.iter().find_map(Self::first_lookup),
            _ => None,
        }
    }

    /// Returns `true` if the value holds a size relative to the font.
    ///
    /// Percentages only count for font properties, where they are relative to
    /// the parent font size.
    pub fn contains_font_relative_size(&self, is_font_property: bool) -> bool {
        match self {
            Self::Size(size) => size.is_font_relative(is_font_property),
            Self::Sequence(items) | Self::Layers(items) => items
                .iter()
                .any(|v| v.contains_font_relative_size(is_font_property)),
            _ => false,
        }
    }
}

impl fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) | Self::Lookup(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Size(s) => {
                let unit = match s.unit {
                    SizeUnit::Px => "px",
                    SizeUnit::Pt => "pt",
                    SizeUnit::In => "in",
                    SizeUnit::Cm => "cm",
                    SizeUnit::Mm => "mm",
                    SizeUnit::Em => "em",
                    SizeUnit::Ex => "ex",
                    SizeUnit::Percent => "%",
                };
                write!(f, "{}{unit}", s.value)
            }
            Self::Color(c) => write!(f, "#{:02x}{:02x}{:02x}{:02x}", c.r, c.g, c.b, c.a),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Sequence(items) | Self::Layers(items) => {
                let sep = if matches!(self, Self::Layers(_)) { ", " } else { " " };
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// A converted, typed style value as stored by styleable properties.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    /// Explicit absence (`null` / `none`).
    Null,
    /// A boolean.
    Bool(bool),
    /// A number or pixel length.
    Number(f64),
    /// A color.
    Color(Color),
    /// A string or enumerated keyword.
    String(Rc<str>),
    /// A font.
    Font(Font),
    /// A font weight.
    FontWeight(FontWeight),
    /// A font posture.
    FontPosture(FontPosture),
    /// A list of values.
    List(Vec<StyleValue>),
    /// Values keyed by sub-property name, produced for shorthand properties.
    Composite(Vec<(&'static str, StyleValue)>),
}

impl StyleValue {
    /// Returns the number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the color, if this is one.
    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns the font, if this is one.
    pub fn as_font(&self) -> Option<&Font> {
        match self {
            Self::Font(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the named part of a composite value.
    pub fn part(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Composite(parts) => parts.iter().find(|(n, _)| *n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns a short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Color(_) => "color",
            Self::String(_) => "string",
            Self::Font(_) => "font",
            Self::FontWeight(_) => "font weight",
            Self::FontPosture(_) => "font posture",
            Self::List(_) => "list",
            Self::Composite(_) => "composite",
        }
    }
}

/// A resolved value together with where it came from.
///
/// Resolution functions return `Option<CalculatedValue>`; `None` is the skip
/// result, meaning no applicable value exists and the property should be left
/// alone or reset.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculatedValue {
    /// The converted value.
    pub value: StyleValue,
    /// The most significant origin that contributed to the value.
    pub origin: Option<StyleOrigin>,
    /// Whether the value depends on the font it was computed with.
    pub relative: bool,
}

impl CalculatedValue {
    /// Creates a calculated value.
    pub fn new(value: StyleValue, origin: Option<StyleOrigin>, relative: bool) -> Self {
        Self {
            value,
            origin,
            relative,
        }
    }

    /// Returns the font, if the value is one.
    pub fn font(&self) -> Option<&Font> {
        self.value.as_font()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn size_conversion_uses_font_for_relative_units() {
        assert_eq!(Size::new(1.5, SizeUnit::Em).pixels(1.0, 20.0), 30.0, "em scales with font");
        assert_eq!(Size::new(12.0, SizeUnit::Pt).pixels(1.0, 20.0), 16.0, "12pt is 16px");
        assert_eq!(Size::new(50.0, SizeUnit::Percent).pixels(20.0, 13.0), 10.0, "percent uses multiplier");
    }

    #[test]
    fn percent_is_relative_only_for_fonts() {
        let v = ParsedValue::Size(Size::new(120.0, SizeUnit::Percent));
        assert!(v.contains_font_relative_size(true), "font percentages are relative");
        assert!(!v.contains_font_relative_size(false), "other percentages are not");
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(Color::from_hex("f00"), Some(Color::rgb(255, 0, 0)), "short form");
        assert_eq!(Color::from_hex("00ff0080"), Some(Color::rgba(0, 255, 0, 128)), "with alpha");
        assert_eq!(Color::from_hex("zz0000"), None, "invalid digits");
    }

    #[test]
    fn derive_font_keeps_unspecified_parts() {
        let base = Font::new("Arial", 12.0).derive(None, Some(FontWeight::Bold), None, -1.0);
        assert_eq!(&*base.family, "Arial", "family kept");
        assert_eq!(base.size, 12.0, "size kept for non-positive input");
        assert_eq!(base.weight, FontWeight::Bold, "weight replaced");
        let sized = base.derive(Some("\"Fira Sans\""), None, None, 18.0);
        assert_eq!(&*sized.family, "Fira Sans", "quotes stripped");
        assert_eq!(sized.size, 18.0, "size replaced");
    }

    #[test]
    fn lookups_are_found_in_nested_values() {
        let v = ParsedValue::Layers(vec![
            ParsedValue::Sequence(vec![ParsedValue::Number(1.0), ParsedValue::lookup("-FX-Base")]),
            ParsedValue::ident("red"),
        ]);
        assert!(v.contains_lookups(), "nested lookup detected");
        assert_eq!(v.first_lookup(), Some("-fx-base"), "names are lower-cased");
    }
}
