// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stylesheets, rules, and declarations.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::origin::StyleOrigin;
use crate::parse::parse_declarations;
use crate::pseudo::PseudoClassTable;
use crate::selector::{Selector, SelectorParseError};
use crate::value::ParsedValue;

/// One `property: value` pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    /// Property name, lower case.
    pub property: Rc<str>,
    /// Parsed value.
    pub value: Rc<ParsedValue>,
    /// Whether the declaration was marked `!important`.
    pub important: bool,
}

impl Declaration {
    /// Creates a declaration.
    pub fn new(property: &str, value: ParsedValue) -> Self {
        Self {
            property: Rc::from(property.to_ascii_lowercase().as_str()),
            value: Rc::new(value),
            important: false,
        }
    }

    /// Marks the declaration `!important`.
    #[must_use]
    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

/// A selector list with a declaration block.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Selectors; the rule applies if any matches.
    pub selectors: Vec<Rc<Selector>>,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
}

/// An ordered list of rules from one source.
#[derive(Clone, Debug, PartialEq)]
pub struct Stylesheet {
    /// Where the rules come from.
    pub origin: StyleOrigin,
    /// Name used in diagnostics.
    pub url: Rc<str>,
    /// Rules in source order.
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Creates an empty stylesheet.
    pub fn new(origin: StyleOrigin, url: &str) -> Self {
        Self {
            origin,
            url: Rc::from(url),
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Appends a rule from selector text and a declaration block.
    ///
    /// Selector lists are separated by commas. Declarations that fail to parse
    /// are returned as source snippets; the rest of the rule is kept.
    pub fn add_rule(
        &mut self,
        selectors: &str,
        block: &str,
        pseudo: &mut PseudoClassTable,
    ) -> Result<Vec<String>, SelectorParseError> {
        let selectors = selectors
            .split(',')
            .map(|s| Selector::parse(s, pseudo).map(Rc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let parsed = parse_declarations(block);
        self.rules.push(Rule {
            selectors,
            declarations: parsed.declarations,
        });
        Ok(parsed.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rule_splits_selector_lists() {
        let mut table = PseudoClassTable::default();
        let mut sheet = Stylesheet::new(StyleOrigin::Author, "app.css");
        let errors = sheet
            .add_rule(".a, Text:hover", "-fx-opacity: 0.5; -fx-fill: ???", &mut table)
            .unwrap();
        assert_eq!(sheet.rules[0].selectors.len(), 2, "two selectors");
        assert_eq!(sheet.rules[0].declarations.len(), 1, "bad declaration dropped");
        assert_eq!(errors.len(), 1, "one error reported");
        assert!(
            sheet.add_rule(".a >", "-fx-opacity: 1", &mut table).is_err(),
            "dangling combinator"
        );
    }
}
