// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declaration block parsing.
//!
//! Used for inline styles and for the declaration blocks of programmatically
//! built rules. Identifiers starting with `-` are treated as lookups of other
//! named styles (for example `-fx-base`); everything else is a keyword.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError, Parser,
    ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, Token,
};

use crate::stylesheet::Declaration;
use crate::value::{Color, ParsedValue, Size, SizeUnit};

/// Result of parsing a declaration block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedBlock {
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
    /// Source text of declarations that were dropped.
    pub errors: Vec<String>,
}

/// Parses `a: 1px; b: red !important` style declaration lists.
pub fn parse_declarations(text: &str) -> ParsedBlock {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut decls = BlockParser;
    let mut out = ParsedBlock::default();
    for item in RuleBodyParser::new(&mut parser, &mut decls) {
        match item {
            Ok(decl) => out.declarations.push(decl),
            Err((_, source)) => out.errors.push(source.trim().to_string()),
        }
    }
    out
}

struct BlockParser;

impl<'i> DeclarationParser<'i> for BlockParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _decl_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let (value, important) = parse_value(input)?;
        Ok(Declaration {
            property: Rc::from(name.to_ascii_lowercase().as_str()),
            value: Rc::new(value),
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for BlockParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for BlockParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for BlockParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

fn sequence(mut items: Vec<ParsedValue>) -> Option<ParsedValue> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(ParsedValue::Sequence(items)),
    }
}

fn parse_value<'i>(input: &mut Parser<'i, '_>) -> Result<(ParsedValue, bool), ParseError<'i, ()>> {
    let mut layers = Vec::new();
    let mut current = Vec::new();
    let mut important = false;
    loop {
        input.skip_whitespace();
        let start = input.position();
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let source = input.slice_from(start);
        if important {
            return Err(input.new_error(BasicParseErrorKind::UnexpectedToken(token)));
        }
        match token {
            Token::Comma => {
                let layer = sequence(core::mem::take(&mut current))
                    .ok_or_else(|| input.new_error(BasicParseErrorKind::UnexpectedToken(Token::Comma)))?;
                layers.push(layer);
            }
            Token::Delim('!') => {
                input.expect_ident_matching("important")?;
                important = true;
            }
            Token::Function(name) => {
                let color = input.parse_nested_block(|block| parse_color_function(&name, block))?;
                current.push(ParsedValue::Color(color));
            }
            other => current.push(single_token(input, other, source)?),
        }
    }
    let last = sequence(current);
    let value = match (layers.is_empty(), last) {
        (true, Some(v)) => v,
        (false, Some(v)) => {
            layers.push(v);
            ParsedValue::Layers(layers)
        }
        (_, None) => return Err(input.new_error(BasicParseErrorKind::EndOfInput)),
    };
    Ok((value, important))
}

/// Reads a numeric token at full precision from its source text.
///
/// `cssparser` only keeps an `f32`; widening that turns `0.3` into
/// `0.30000001192092896`.
fn exact_number(source: &str, suffix_len: usize, fallback: f32) -> f64 {
    let text = source.trim();
    text.get(..text.len().saturating_sub(suffix_len))
        .and_then(|n| n.parse::<f64>().ok())
        .unwrap_or(f64::from(fallback))
}

fn single_token<'i>(
    input: &Parser<'i, '_>,
    token: Token<'i>,
    source: &str,
) -> Result<ParsedValue, ParseError<'i, ()>> {
    Ok(match &token {
        Token::Ident(s) if s.starts_with('-') => ParsedValue::lookup(s),
        Token::Ident(s) => ParsedValue::ident(s),
        Token::Number { value, .. } => ParsedValue::Number(exact_number(source, 0, *value)),
        Token::Percentage { unit_value, .. } => ParsedValue::Size(Size::new(
            exact_number(source, 1, *unit_value * 100.0),
            SizeUnit::Percent,
        )),
        Token::Dimension { value, unit, .. } => match SizeUnit::from_suffix(unit) {
            Some(size_unit) => ParsedValue::Size(Size::new(
                exact_number(source, unit.len(), *value),
                size_unit,
            )),
            None => return Err(input.new_error(BasicParseErrorKind::UnexpectedToken(token.clone()))),
        },
        Token::Hash(hex) | Token::IDHash(hex) => match Color::from_hex(hex) {
            Some(c) => ParsedValue::Color(c),
            None => return Err(input.new_error(BasicParseErrorKind::UnexpectedToken(token.clone()))),
        },
        Token::QuotedString(s) => ParsedValue::string(s),
        _ => return Err(input.new_error(BasicParseErrorKind::UnexpectedToken(token.clone()))),
    })
}

fn parse_color_function<'i>(name: &str, input: &mut Parser<'i, '_>) -> Result<Color, ParseError<'i, ()>> {
    let with_alpha = name.eq_ignore_ascii_case("rgba");
    if !with_alpha && !name.eq_ignore_ascii_case("rgb") {
        return Err(input.new_custom_error(()));
    }
    let mut channels = [0_u8; 3];
    for (i, channel) in channels.iter_mut().enumerate() {
        if i > 0 {
            input.expect_comma()?;
        }
        let v = input.expect_number()?;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "clamped to the channel range first."
        )]
        let byte = v.clamp(0.0, 255.0).round() as u8;
        *channel = byte;
    }
    let mut alpha = 255;
    if with_alpha {
        input.expect_comma()?;
        let a = input.expect_number()?;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "clamped to the channel range first."
        )]
        let byte = (a.clamp(0.0, 1.0) * 255.0).round() as u8;
        alpha = byte;
    }
    let [r, g, b] = channels;
    Ok(Color::rgba(r, g, b, alpha))
}
