//! CSS Selector Subset
//!
//! Just enough of the selector grammar to evaluate the structural selectors
//! in the rule table against the in-memory document:
//!
//! - type selectors (`h3`, `strong`)
//! - class selectors (`.timeline-comment`)
//! - attribute selectors (`[attr]`, `[attr="v"]`, `[attr*="v"]`, `[attr^="v"]`)
//! - the descendant combinator (whitespace)
//! - selector groups (`a, b`)
//!
//! Matching is expressed against the [`SelectorTarget`] trait so the parser
//! stays independent of any particular tree representation.

/// Error type for selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("Unterminated attribute selector at offset {0}")]
    UnterminatedAttribute(usize),
    #[error("Unsupported combinator '{0}'")]
    UnsupportedCombinator(char),
}

/// Attribute comparison operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub name: String,
    pub op: AttrOp,
}

impl AttrSelector {
    fn matches(&self, value: Option<&str>) -> bool {
        match (&self.op, value) {
            (_, None) => false,
            (AttrOp::Exists, Some(_)) => true,
            (AttrOp::Equals(expected), Some(v)) => v == expected,
            (AttrOp::Contains(needle), Some(v)) => !needle.is_empty() && v.contains(needle.as_str()),
            (AttrOp::Prefix(prefix), Some(v)) => !prefix.is_empty() && v.starts_with(prefix.as_str()),
        }
    }
}

/// A compound selector: everything between two combinators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
}

/// A chain of compounds joined by descendant combinators. The last compound
/// is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub compounds: Vec<Compound>,
}

/// A comma-separated group of complex selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

/// Read access a tree must offer for selector matching.
pub trait SelectorTarget {
    type Id: Copy;

    fn tag_name(&self, node: Self::Id) -> &str;
    fn has_class(&self, node: Self::Id, class: &str) -> bool;
    fn attribute(&self, node: Self::Id, name: &str) -> Option<&str>;
    fn parent(&self, node: Self::Id) -> Option<Self::Id>;
}

// =============================================================================
// Parsing
// =============================================================================

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser { src: input, pos: 0 };
        let mut selectors = Vec::new();
        loop {
            selectors.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(ch) => return Err(SelectorError::UnexpectedChar { ch, offset: parser.pos }),
            }
        }
        Ok(Self { selectors })
    }

    /// Does `node` match any selector of the group?
    pub fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Id) -> bool {
        self.selectors.iter().any(|sel| sel.matches(tree, node))
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.pos > start
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_ws();
        let mut compounds = Vec::new();
        loop {
            compounds.push(self.compound()?);
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some(ch @ ('>' | '+' | '~')) => return Err(SelectorError::UnsupportedCombinator(ch)),
                Some(ch) if !had_ws => {
                    return Err(SelectorError::UnexpectedChar { ch, offset: self.pos });
                }
                Some(_) => {}
            }
        }
        Ok(ComplexSelector { compounds })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let start = self.pos;

        let tag = self.ident();
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
        } else if self.peek() == Some('*') {
            self.pos += 1;
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let class = self.ident();
                    if class.is_empty() {
                        return Err(self.unexpected());
                    }
                    compound.classes.push(class.to_string());
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                None => SelectorError::Empty,
                Some(_) => self.unexpected(),
            });
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrSelector, SelectorError> {
        let open = self.pos - 1;
        self.skip_ws();
        let name = self.ident().to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.unexpected());
        }
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector { name, op: AttrOp::Exists });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals(String::new())
            }
            Some(ch @ ('*' | '^')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                if ch == '*' {
                    AttrOp::Contains(String::new())
                } else {
                    AttrOp::Prefix(String::new())
                }
            }
            None => return Err(SelectorError::UnterminatedAttribute(open)),
            Some(_) => return Err(self.unexpected()),
        };

        self.skip_ws();
        let value = self.value(open)?;
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(SelectorError::UnterminatedAttribute(open));
        }
        self.pos += 1;

        let op = match op {
            AttrOp::Equals(_) => AttrOp::Equals(value),
            AttrOp::Contains(_) => AttrOp::Contains(value),
            AttrOp::Prefix(_) => AttrOp::Prefix(value),
            AttrOp::Exists => AttrOp::Exists,
        };
        Ok(AttrSelector { name, op })
    }

    fn value(&mut self, open: usize) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let rest = &self.src[self.pos..];
                let end = rest.find(quote).ok_or(SelectorError::UnterminatedAttribute(open))?;
                let value = rest[..end].to_string();
                self.pos += end + 1;
                Ok(value)
            }
            _ => Ok(self.ident().to_string()),
        }
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(ch) => SelectorError::UnexpectedChar { ch, offset: self.pos },
            None => SelectorError::Empty,
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

impl Compound {
    fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Id) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag_name(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.classes.iter().all(|class| tree.has_class(node, class))
            && self.attrs.iter().all(|attr| attr.matches(tree.attribute(node, &attr.name)))
    }
}

impl ComplexSelector {
    /// Right-to-left match: the subject must match the last compound, then
    /// each earlier compound must match some ancestor, nearest first.
    pub fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Id) -> bool {
        let Some((subject, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(tree, node) {
            return false;
        }

        let mut cursor = tree.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    None => return false,
                    Some(id) => {
                        cursor = tree.parent(id);
                        if compound.matches(tree, id) {
                            break;
                        }
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tree {
        // (tag, classes, attrs, parent)
        nodes: Vec<(&'static str, Vec<&'static str>, Vec<(&'static str, &'static str)>, Option<usize>)>,
    }

    impl SelectorTarget for Tree {
        type Id = usize;

        fn tag_name(&self, node: usize) -> &str {
            self.nodes[node].0
        }

        fn has_class(&self, node: usize, class: &str) -> bool {
            self.nodes[node].1.iter().any(|c| *c == class)
        }

        fn attribute(&self, node: usize, name: &str) -> Option<&str> {
            self.nodes[node].2.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
        }

        fn parent(&self, node: usize) -> Option<usize> {
            self.nodes[node].3
        }
    }

    fn header_tree() -> Tree {
        Tree {
            nodes: vec![
                ("div", vec!["timeline-comment-header"], vec![], None),
                ("h3", vec![], vec![], Some(0)),
                ("a", vec!["author", "Link--primary"], vec![("href", "/apps/dependabot")], Some(1)),
                ("span", vec!["Label", "Label--secondary"], vec![("id", "issue-42-permalink")], Some(1)),
            ],
        }
    }

    #[test]
    fn test_parse_group() {
        let list = SelectorList::parse(".timeline-comment, .review-comment , [data-testid=\"review-comment\"]").unwrap();
        assert_eq!(list.selectors.len(), 3);
        let attr = &list.selectors[2].compounds[0].attrs[0];
        assert_eq!(attr.name, "data-testid");
        assert_eq!(attr.op, AttrOp::Equals("review-comment".to_string()));
    }

    #[test]
    fn test_parse_descendant_chain() {
        let list = SelectorList::parse(".timeline-comment-header h3 .author").unwrap();
        let compounds = &list.selectors[0].compounds;
        assert_eq!(compounds.len(), 3);
        assert_eq!(compounds[1].tag.as_deref(), Some("h3"));
        assert_eq!(compounds[2].classes, vec!["author".to_string()]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(SelectorList::parse(""), Err(SelectorError::Empty));
        assert!(matches!(SelectorList::parse("a > b"), Err(SelectorError::UnsupportedCombinator('>'))));
        assert!(matches!(SelectorList::parse("[id*=\"x\""), Err(SelectorError::UnterminatedAttribute(0))));
        assert!(SelectorList::parse(".a,").is_err());
    }

    #[test]
    fn test_match_descendant() {
        let tree = header_tree();
        let sel = SelectorList::parse(".timeline-comment-header h3 .author").unwrap();
        assert!(sel.matches(&tree, 2));
        assert!(!sel.matches(&tree, 3));

        let skip = SelectorList::parse(".timeline-comment-header .author").unwrap();
        assert!(skip.matches(&tree, 2));
    }

    #[test]
    fn test_match_attribute_operators() {
        let tree = header_tree();
        let permalink = SelectorList::parse("[id*=\"issue-\"][id*=\"-permalink\"]").unwrap();
        assert!(permalink.matches(&tree, 3));
        assert!(!permalink.matches(&tree, 2));

        let prefix = SelectorList::parse("[href^='/apps/']").unwrap();
        assert!(prefix.matches(&tree, 2));

        let exists = SelectorList::parse("a[href]").unwrap();
        assert!(exists.matches(&tree, 2));
        assert!(!exists.matches(&tree, 3));
    }

    #[test]
    fn test_compound_classes_all_required() {
        let tree = header_tree();
        assert!(SelectorList::parse(".Label.Label--secondary").unwrap().matches(&tree, 3));
        assert!(!SelectorList::parse(".Label.author").unwrap().matches(&tree, 3));
    }
}
