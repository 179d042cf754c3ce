// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selectors: structural matching and pseudo-class state matching.
//!
//! Matching happens in two stages. [`Selector::applies`] checks type, id, and
//! classes, and records which pseudo-classes each matched node would need;
//! those become the nodes' trigger states. [`Selector::state_matches`] then
//! checks pseudo-classes against concrete states during value lookup.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;

use crate::pseudo::{PseudoClassSet, PseudoClassTable};
use crate::tree::StyleTree;

/// A compound selector such as `Text#title.label:hover`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SimpleSelector {
    type_name: Option<Rc<str>>,
    id: Option<Rc<str>>,
    classes: SmallVec<[Rc<str>; 2]>,
    pseudo_classes: PseudoClassSet,
}

impl SimpleSelector {
    /// The universal selector `*`.
    pub fn universal() -> Self {
        Self::default()
    }

    /// Requires the given type name.
    #[must_use]
    pub fn with_type(mut self, name: &str) -> Self {
        self.type_name = Some(Rc::from(name));
        self
    }

    /// Requires the given id.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(Rc::from(id));
        self
    }

    /// Requires the given style class.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(Rc::from(class));
        self
    }

    /// Requires the given pseudo-class.
    #[must_use]
    pub fn with_pseudo_class(mut self, pc: crate::pseudo::PseudoClass) -> Self {
        self.pseudo_classes.insert(pc);
        self
    }

    /// Pseudo-classes this selector requires.
    pub fn pseudo_classes(&self) -> &PseudoClassSet {
        &self.pseudo_classes
    }

    fn specificity(&self) -> u32 {
        let ids = u32::from(self.id.is_some());
        #[allow(
            clippy::cast_possible_truncation,
            reason = "selectors never carry billions of classes."
        )]
        let classes = (self.classes.len() + self.pseudo_classes.len()) as u32;
        let types = u32::from(self.type_name.is_some());
        (ids << 16) | (classes << 8) | types
    }

    fn applies<T: StyleTree + ?Sized>(&self, tree: &T, node: T::Key) -> bool {
        if let Some(ty) = &self.type_name
            && tree.type_selector(node) != &**ty
        {
            return false;
        }
        if let Some(id) = &self.id
            && tree.style_id(node) != Some(&**id)
        {
            return false;
        }
        self.classes.iter().all(|c| tree.has_style_class(node, c))
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_name {
            Some(ty) => f.write_str(ty)?,
            None if self.id.is_none() && self.classes.is_empty() => f.write_str("*")?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        if !self.pseudo_classes.is_empty() {
            write!(f, ":{:?}", self.pseudo_classes)?;
        }
        Ok(())
    }
}

/// Relationship between adjacent compound selectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Whitespace: any ancestor.
    Descendant,
    /// `>`: the direct styleable parent.
    Child,
}

/// Error returned by [`Selector::parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorParseError {
    /// The offending selector text.
    pub selector: String,
}

impl fmt::Display for SelectorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector '{}'", self.selector)
    }
}

impl core::error::Error for SelectorParseError {}

/// A complex selector: compound selectors joined by combinators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    /// Leftmost ancestor first; the subject is last.
    parts: Vec<SimpleSelector>,
    /// `combinators[i]` joins `parts[i]` and `parts[i + 1]`.
    combinators: Vec<Combinator>,
}

impl Selector {
    /// A selector with a single compound part.
    pub fn new(subject: SimpleSelector) -> Self {
        Self {
            parts: alloc::vec![subject],
            combinators: Vec::new(),
        }
    }

    /// Matches any node. Used for inline declarations.
    pub fn universal() -> Self {
        Self::new(SimpleSelector::universal())
    }

    /// Prepends an ancestor requirement.
    #[must_use]
    pub fn descendant_of(mut self, ancestor: SimpleSelector) -> Self {
        self.parts.insert(0, ancestor);
        self.combinators.insert(0, Combinator::Descendant);
        self
    }

    /// Prepends a direct-parent requirement.
    #[must_use]
    pub fn child_of(mut self, parent: SimpleSelector) -> Self {
        self.parts.insert(0, parent);
        self.combinators.insert(0, Combinator::Child);
        self
    }

    /// Parses selector text such as `.root > Text.label:hover`.
    ///
    /// Supports type, `*`, `#id`, `.class`, and `:pseudo` parts joined by
    /// whitespace or `>`.
    pub fn parse(text: &str, pseudo: &mut PseudoClassTable) -> Result<Self, SelectorParseError> {
        let err = || SelectorParseError {
            selector: String::from(text),
        };
        let spaced = text.replace('>', " > ");
        let mut parts = Vec::new();
        let mut combinators = Vec::new();
        let mut pending = None;
        for token in spaced.split_whitespace() {
            if token == ">" {
                if parts.is_empty() || pending.is_some() {
                    return Err(err());
                }
                pending = Some(Combinator::Child);
                continue;
            }
            if !parts.is_empty() {
                combinators.push(pending.take().unwrap_or(Combinator::Descendant));
            }
            parts.push(parse_compound(token, pseudo).ok_or_else(err)?);
        }
        if parts.is_empty() || pending.is_some() {
            return Err(err());
        }
        Ok(Self { parts, combinators })
    }

    /// The rightmost compound selector.
    pub fn subject(&self) -> &SimpleSelector {
        &self.parts[self.parts.len() - 1]
    }

    /// Specificity, comparable with `Ord`: ids, then classes and
    /// pseudo-classes, then types.
    pub fn specificity(&self) -> u32 {
        self.parts.iter().map(SimpleSelector::specificity).sum()
    }

    /// Structural match against `node`, ignoring pseudo-classes.
    ///
    /// On success, the pseudo-classes required of each matched node are added to
    /// `triggers`, indexed by distance from `node` (0 is `node` itself). Entries
    /// past the end of `triggers` are dropped.
    pub fn applies<T: StyleTree + ?Sized>(
        &self,
        tree: &T,
        node: T::Key,
        triggers: &mut [PseudoClassSet],
    ) -> bool {
        let mut hits: SmallVec<[(usize, usize); 4]> = SmallVec::new();
        if !self.match_from(tree, self.parts.len() - 1, node, 0, &mut hits) {
            return false;
        }
        for (depth, part) in hits {
            if let Some(slot) = triggers.get_mut(depth) {
                slot.union_with(&self.parts[part].pseudo_classes);
            }
        }
        true
    }

    fn match_from<T: StyleTree + ?Sized>(
        &self,
        tree: &T,
        part: usize,
        node: T::Key,
        depth: usize,
        hits: &mut SmallVec<[(usize, usize); 4]>,
    ) -> bool {
        if !self.parts[part].applies(tree, node) {
            return false;
        }
        hits.push((depth, part));
        if part == 0 {
            return true;
        }
        let combinator = self.combinators[part - 1];
        let mut ancestor = tree.styleable_parent(node);
        let mut d = depth + 1;
        while let Some(a) = ancestor {
            if self.match_from(tree, part - 1, a, d, hits) {
                return true;
            }
            if combinator == Combinator::Child {
                break;
            }
            ancestor = tree.styleable_parent(a);
            d += 1;
        }
        hits.pop();
        false
    }

    /// Pseudo-class match: the subject's pseudo-classes must be a subset of
    /// `states`, and ancestor parts must match the ancestors' current states.
    pub fn state_matches<T: StyleTree + ?Sized>(
        &self,
        tree: &T,
        node: T::Key,
        states: &PseudoClassSet,
    ) -> bool {
        let last = self.parts.len() - 1;
        if !states.contains_all(&self.parts[last].pseudo_classes) {
            return false;
        }
        last == 0 || self.ancestors_state_match(tree, last - 1, node)
    }

    fn ancestors_state_match<T: StyleTree + ?Sized>(
        &self,
        tree: &T,
        part: usize,
        child: T::Key,
    ) -> bool {
        let combinator = self.combinators[part];
        let mut ancestor = tree.styleable_parent(child);
        while let Some(a) = ancestor {
            let sel = &self.parts[part];
            if sel.applies(tree, a)
                && tree.pseudo_class_states(a).contains_all(&sel.pseudo_classes)
                && (part == 0 || self.ancestors_state_match(tree, part - 1, a))
            {
                return true;
            }
            if combinator == Combinator::Child {
                break;
            }
            ancestor = tree.styleable_parent(a);
        }
        false
    }

    /// Number of compound parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always `false`; a selector has at least one part.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                match self.combinators[i - 1] {
                    Combinator::Descendant => f.write_str(" ")?,
                    Combinator::Child => f.write_str(" > ")?,
                }
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

fn parse_compound(token: &str, pseudo: &mut PseudoClassTable) -> Option<SimpleSelector> {
    let mut sel = SimpleSelector::universal();
    let mut rest = token;
    let head_len = rest.find(['#', '.', ':']).unwrap_or(rest.len());
    let head = &rest[..head_len];
    if !head.is_empty() && head != "*" {
        if !head.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return None;
        }
        sel = sel.with_type(head);
    }
    rest = &rest[head_len..];
    while let Some(marker) = rest.chars().next() {
        let body = &rest[1..];
        let len = body.find(['#', '.', ':']).unwrap_or(body.len());
        let name = &body[..len];
        if name.is_empty() {
            return None;
        }
        sel = match marker {
            '#' => sel.with_id(name),
            '.' => sel.with_class(name),
            ':' => sel.with_pseudo_class(pseudo.intern(name)),
            _ => return None,
        };
        rest = &body[len..];
    }
    Some(sel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pseudo::PseudoClass;
    use crate::testing::{TestTree, node};

    #[test]
    fn parse_builds_parts_and_combinators() {
        let mut table = PseudoClassTable::default();
        let sel = Selector::parse(".root > Text#title.label:hover", &mut table).unwrap();
        assert_eq!(sel.len(), 2, "two compound parts");
        assert_eq!(
            sel.subject().pseudo_classes(),
            &PseudoClassSet::from_slice(&[PseudoClass::HOVER]),
            "subject carries :hover"
        );
        assert_eq!(sel.specificity(), (1 << 16) | (3 << 8) | 1, "one id, three classes, one type");
        assert!(Selector::parse("> .a", &mut table).is_err(), "leading combinator");
        assert!(Selector::parse(".a..b", &mut table).is_err(), "empty class");
    }

    #[test]
    fn descendant_match_records_trigger_states_by_depth() {
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").class("root").pseudo(PseudoClass::HOVER));
        let mid = tree.add(Some(root), node("Group"));
        let leaf = tree.add(Some(mid), node("Text").class("label"));
        let mut table = PseudoClassTable::default();
        let sel = Selector::parse(".root:hover .label:pressed", &mut table).unwrap();
        let mut triggers = [PseudoClassSet::new(), PseudoClassSet::new(), PseudoClassSet::new()];
        assert!(sel.applies(&tree, leaf, &mut triggers), "matches through a gap");
        assert!(triggers[0].contains(PseudoClass::PRESSED), "subject trigger");
        assert!(triggers[1].is_empty(), "middle node is not involved");
        assert!(triggers[2].contains(PseudoClass::HOVER), "ancestor trigger");

        let pressed = PseudoClassSet::from_slice(&[PseudoClass::PRESSED]);
        assert!(sel.state_matches(&tree, leaf, &pressed), "ancestor is hovered");
        assert!(!sel.state_matches(&tree, leaf, &PseudoClassSet::new()), "subject not pressed");
    }

    #[test]
    fn child_combinator_only_checks_parent() {
        let mut tree = TestTree::default();
        let root = tree.add(None, node("Group").class("root"));
        let mid = tree.add(Some(root), node("Group"));
        let leaf = tree.add(Some(mid), node("Text"));
        let mut table = PseudoClassTable::default();
        let child = Selector::parse(".root > Text", &mut table).unwrap();
        let desc = Selector::parse(".root Text", &mut table).unwrap();
        assert!(!child.applies(&tree, leaf, &mut []), "grandparent is not a parent");
        assert!(desc.applies(&tree, leaf, &mut []), "descendant reaches the root");
    }
}
