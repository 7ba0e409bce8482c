//! # Selectors
//!
//! A CSS selector subset sufficient for transform registrations:
//!
//! - type (`p`, `*`), `#id`, `.class`
//! - attributes: `[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`
//! - combinators: descendant (whitespace) and child (`>`)
//! - selector lists (`a, b`)
//! - `:has(<relative selectors>)`, `:not(<selectors>)`, `:first-child`,
//!   `:last-child`, `:empty`
//!
//! Selectors are parsed once with [`Selector::parse`] and matched against
//! nodes with [`Document::matches`].

use thiserror::Error;

use crate::document::Document;
use crate::node::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {ch:?} at offset {pos} in selector {selector:?}")]
    UnexpectedChar {
        ch: char,
        pos: usize,
        selector: String,
    },
    #[error("unexpected end of selector {0:?}")]
    UnexpectedEnd(String),
    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp },
    Has(Vec<Relative>),
    Not(Vec<Complex>),
    FirstChild,
    LastChild,
    Empty,
}

/// A compound selector: simple selectors that all apply to one element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound(Vec<Simple>);

/// `parts[i]` and `parts[i + 1]` are joined by `combinators[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A complex selector anchored at the `:has()` subject.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relative {
    leading: Combinator,
    complex: Complex,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut parser = SelectorParser::new(source);
        let alternatives = parser.selector_list(false)?;
        parser.skip_ws();
        if let Some(ch) = parser.peek() {
            return Err(parser.unexpected(ch));
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// The selector text this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    i: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            i: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += 1;
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.i;
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.i += 1;
        }
        self.i > start
    }

    fn unexpected(&self, ch: char) -> SelectorError {
        SelectorError::UnexpectedChar {
            ch,
            pos: self.i,
            selector: self.source.to_string(),
        }
    }

    fn end(&self) -> SelectorError {
        SelectorError::UnexpectedEnd(self.source.to_string())
    }

    fn expect(&mut self, want: char) -> Result<(), SelectorError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => {
                self.i -= 1;
                Err(self.unexpected(c))
            }
            None => Err(self.end()),
        }
    }

    /// Parses `complex ("," complex)*`, stopping before `)` when `nested`.
    fn selector_list(&mut self, nested: bool) -> Result<Vec<Complex>, SelectorError> {
        let mut out = vec![];
        loop {
            self.skip_ws();
            if self.peek().is_none() && out.is_empty() && !nested {
                return Err(SelectorError::Empty);
            }
            out.push(self.complex()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') if nested => return Ok(out),
                None => return Ok(out),
                Some(c) => return Err(self.unexpected(c)),
            }
        }
    }

    fn relative_list(&mut self) -> Result<Vec<Relative>, SelectorError> {
        let mut out = vec![];
        loop {
            self.skip_ws();
            let leading = if self.peek() == Some('>') {
                self.bump();
                self.skip_ws();
                Combinator::Child
            } else {
                Combinator::Descendant
            };
            out.push(Relative {
                leading,
                complex: self.complex()?,
            });
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => return Ok(out),
                Some(c) => return Err(self.unexpected(c)),
                None => return Err(self.end()),
            }
        }
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = vec![self.compound()?];
        let mut combinators = vec![];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                Some(c) if had_ws && starts_compound(c) => Combinator::Descendant,
                _ => break,
            };
            combinators.push(combinator);
            parts.push(self.compound()?);
        }
        Ok(Complex { parts, combinators })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut simples = vec![];
        let mut universal = false;
        match self.peek() {
            Some('*') => {
                self.bump();
                universal = true;
            }
            Some(c) if is_ident_char(c) => simples.push(Simple::Tag(self.ident()?.to_ascii_lowercase())),
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    simples.push(Simple::Id(self.ident()?));
                }
                Some('.') => {
                    self.bump();
                    simples.push(Simple::Class(self.ident()?));
                }
                Some('[') => simples.push(self.attribute()?),
                Some(':') => simples.push(self.pseudo()?),
                _ => break,
            }
        }
        if simples.is_empty() && !universal {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(self.end()),
            };
        }
        Ok(Compound(simples))
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.i;
        while self.peek().is_some_and(is_ident_char) {
            self.i += 1;
        }
        if self.i == start {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(self.end()),
            };
        }
        Ok(self.chars[start..self.i].iter().collect())
    }

    fn value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.i;
                while self.peek().is_some_and(|c| c != q) {
                    self.i += 1;
                }
                let value = self.chars[start..self.i].iter().collect();
                self.expect(q)?;
                Ok(value)
            }
            _ => self.ident(),
        }
    }

    fn attribute(&mut self) -> Result<Simple, SelectorError> {
        self.expect('[')?;
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => AttrOp::Exists,
            Some('=') => {
                self.bump();
                self.skip_ws();
                AttrOp::Equals(self.value()?)
            }
            Some(c @ ('~' | '^' | '$' | '*')) => {
                self.bump();
                self.expect('=')?;
                self.skip_ws();
                let v = self.value()?;
                match c {
                    '~' => AttrOp::Includes(v),
                    '^' => AttrOp::Prefix(v),
                    '$' => AttrOp::Suffix(v),
                    _ => AttrOp::Substring(v),
                }
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(self.end()),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(Simple::Attr { name, op })
    }

    fn pseudo(&mut self) -> Result<Simple, SelectorError> {
        self.expect(':')?;
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "has" => {
                self.expect('(')?;
                let inner = self.relative_list()?;
                self.expect(')')?;
                Ok(Simple::Has(inner))
            }
            "not" => {
                self.expect('(')?;
                let inner = self.selector_list(true)?;
                self.expect(')')?;
                Ok(Simple::Not(inner))
            }
            "first-child" => Ok(Simple::FirstChild),
            "last-child" => Ok(Simple::LastChild),
            "empty" => Ok(Simple::Empty),
            _ => Err(SelectorError::UnsupportedPseudo(name)),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn starts_compound(c: char) -> bool {
    is_ident_char(c) || matches!(c, '*' | '#' | '.' | '[' | ':')
}

impl Document {
    /// `Element.matches(selector)`. Non-element nodes never match.
    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.is_element(id)
            && selector
                .alternatives
                .iter()
                .any(|c| self.match_complex(id, c, c.parts.len() - 1, None))
    }

    /// First element (in document order) under `scope` matching `selector`.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| self.matches(*n, selector))
    }

    /// All elements under `scope` matching `selector`, in document order.
    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.matches(*n, selector))
            .collect()
    }

    /// Matches `complex.parts[..=idx]` with `parts[idx]` on `id`.
    ///
    /// With a `scope` (relative matching for `:has`), ancestor walks stop at the
    /// scope and the leftmost part must be related to it by `leading`.
    fn match_complex(
        &self,
        id: NodeId,
        complex: &Complex,
        idx: usize,
        scope: Option<(NodeId, Combinator)>,
    ) -> bool {
        if !self.match_compound(id, &complex.parts[idx]) {
            return false;
        }
        if idx == 0 {
            return match scope {
                None => true,
                Some((scope, Combinator::Child)) => self.parent(id) == Some(scope),
                Some((scope, Combinator::Descendant)) => self.is_ancestor(scope, id),
            };
        }
        let within = |n: NodeId| scope.is_none_or(|(s, _)| n != s);
        match complex.combinators[idx - 1] {
            Combinator::Child => self
                .parent_element(id)
                .filter(|p| within(*p))
                .is_some_and(|p| self.match_complex(p, complex, idx - 1, scope)),
            Combinator::Descendant => {
                let mut cur = self.parent_element(id);
                while let Some(p) = cur {
                    if !within(p) {
                        return false;
                    }
                    if self.match_complex(p, complex, idx - 1, scope) {
                        return true;
                    }
                    cur = self.parent_element(p);
                }
                false
            }
        }
    }

    fn match_compound(&self, id: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(id) else {
            return false;
        };
        compound.0.iter().all(|simple| match simple {
            Simple::Tag(name) => element.name == *name,
            Simple::Id(want) => element.attribute("id") == Some(want.as_str()),
            Simple::Class(want) => self.class_list(id).contains(&want.as_str()),
            Simple::Attr { name, op } => match (element.attribute(name), op) {
                (None, _) => false,
                (Some(_), AttrOp::Exists) => true,
                (Some(v), AttrOp::Equals(w)) => v == w,
                (Some(v), AttrOp::Includes(w)) => v.split_ascii_whitespace().any(|t| t == w),
                (Some(v), AttrOp::Prefix(w)) => !w.is_empty() && v.starts_with(w.as_str()),
                (Some(v), AttrOp::Suffix(w)) => !w.is_empty() && v.ends_with(w.as_str()),
                (Some(v), AttrOp::Substring(w)) => !w.is_empty() && v.contains(w.as_str()),
            },
            Simple::Has(relatives) => relatives.iter().any(|rel| {
                let last = rel.complex.parts.len() - 1;
                // `> a img`: only the leftmost part is anchored to a child.
                let candidates = match rel.leading {
                    Combinator::Child if last == 0 => self.element_children(id).collect::<Vec<_>>(),
                    _ => self.descendants(id),
                };
                candidates
                    .into_iter()
                    .any(|c| self.match_complex(c, &rel.complex, last, Some((id, rel.leading))))
            }),
            Simple::Not(list) => !list
                .iter()
                .any(|c| self.match_complex(id, c, c.parts.len() - 1, None)),
            Simple::FirstChild => self
                .parent(id)
                .and_then(|p| self.element_children(p).next())
                == Some(id),
            Simple::LastChild => self
                .parent(id)
                .and_then(|p| self.element_children(p).last())
                == Some(id),
            Simple::Empty => self.children(id).iter().all(|c| match self.kind(*c) {
                NodeKind::Text(t) => t.is_empty(),
                NodeKind::Comment(_) => true,
                _ => false,
            }),
        })
    }
}
