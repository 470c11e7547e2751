//! Path queries over [`XmlElement`] trees.
//!
//! Supported syntax:
//!
//! ```text
//! /rpc-reply/software-information    absolute path from the document
//! //physical-interface               any descendant
//! chassis//serial-number             descendant below a relative step
//! configuration-information/*        any child
//! .                                  the context element
//! alarm-detail[2]                    1-based position among siblings
//! physical-interface[oper-status]    has a child
//! physical-interface[name='ge-0/0/0']
//! ```
//!
//! Namespace prefixes in the expression are ignored, matching the parser
//! which keeps only local names.

use std::collections::HashSet;

use super::XmlElement;
use crate::error::{DriverError, Result};

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Name(String),
    Any,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    HasChild(String),
    ChildEquals(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

impl Query {
    /// Parse an expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |message: &str| DriverError::InvalidQuery {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let mut rest = expression.trim();
        if rest.is_empty() {
            return Err(invalid("empty expression").into());
        }
        let absolute = rest.starts_with('/');
        let mut steps = Vec::new();

        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else if steps.is_empty() {
                Axis::Child
            } else {
                return Err(invalid("expected '/'").into());
            };

            let end = step_end(rest).map_err(|m| invalid(m))?;
            let (text, remaining) = rest.split_at(end);
            if text.is_empty() {
                return Err(invalid("empty step").into());
            }
            steps.push(parse_step(axis, text).map_err(|m| invalid(m))?);
            rest = remaining;
        }

        Ok(Self { absolute, steps })
    }

    /// Evaluate with `root` as the context element.
    ///
    /// Absolute paths start from the document containing `root`.
    pub fn evaluate<'a>(&self, root: &'a XmlElement) -> Vec<&'a XmlElement> {
        let mut steps = self.steps.iter();
        let mut current: Vec<&'a XmlElement> = if self.absolute {
            // The document node has exactly one child: the root element.
            match steps.next() {
                Some(step) => {
                    let mut found = step.filter(vec![root]);
                    if step.axis == Axis::Descendant {
                        found.extend(step.descendants(root));
                    }
                    found
                }
                None => vec![root],
            }
        } else {
            vec![root]
        };

        for step in steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for context in &current {
                let found = match (step.axis, &step.test) {
                    (Axis::Child, NameTest::Context) => step.filter(vec![*context]),
                    (Axis::Descendant, NameTest::Context) => step.filter(context.iter().collect()),
                    (Axis::Child, _) => step.filter(context.children.iter().collect()),
                    (Axis::Descendant, _) => step.descendants(context),
                };
                for element in found {
                    if seen.insert(element as *const XmlElement) {
                        next.push(element);
                    }
                }
            }
            current = next;
        }
        current
    }
}

impl Step {
    /// Apply the name test and predicates to one sibling list.
    fn filter<'a>(&self, candidates: Vec<&'a XmlElement>) -> Vec<&'a XmlElement> {
        let mut matched: Vec<&XmlElement> = candidates
            .into_iter()
            .filter(|e| match &self.test {
                NameTest::Name(name) => &e.name == name,
                NameTest::Any | NameTest::Context => true,
            })
            .collect();

        for predicate in &self.predicates {
            matched = match predicate {
                Predicate::Position(n) => matched.get(n - 1).copied().into_iter().collect(),
                Predicate::HasChild(child) => matched
                    .into_iter()
                    .filter(|e| e.child(child).is_some())
                    .collect(),
                Predicate::ChildEquals(child, value) => matched
                    .into_iter()
                    .filter(|e| {
                        e.children
                            .iter()
                            .any(|c| &c.name == child && c.trimmed_text() == value)
                    })
                    .collect(),
            };
        }
        matched
    }

    /// Matches below `context`, in document order.
    ///
    /// Each element's children are filtered as their own sibling list, so
    /// positions count within one parent.
    fn descendants<'a>(&self, context: &'a XmlElement) -> Vec<&'a XmlElement> {
        let matched: HashSet<*const XmlElement> = context
            .iter()
            .flat_map(|parent| self.filter(parent.children.iter().collect()))
            .map(|e| e as *const XmlElement)
            .collect();
        context
            .iter()
            .skip(1)
            .filter(|e| matched.contains(&(*e as *const XmlElement)))
            .collect()
    }
}

/// Byte offset where the current step ends (next `/` outside brackets).
fn step_end(rest: &str) -> std::result::Result<usize, &'static str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in rest.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1).ok_or("unbalanced ']'")?,
            (None, '/') if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated string");
    }
    if depth != 0 {
        return Err("unbalanced '['");
    }
    Ok(rest.len())
}

fn parse_step(axis: Axis, text: &str) -> std::result::Result<Step, &'static str> {
    let (name, mut rest) = match text.find('[') {
        Some(i) => text.split_at(i),
        None => (text, ""),
    };
    let name = name.trim();

    let test = match name {
        "*" => NameTest::Any,
        "." => NameTest::Context,
        _ => NameTest::Name(local_name(name)?),
    };

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let body = rest.strip_prefix('[').ok_or("expected '['")?;
        let close = predicate_end(body).ok_or("unbalanced '['")?;
        predicates.push(parse_predicate(body[..close].trim())?);
        rest = body[close + 1..].trim_start();
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn predicate_end(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(body: &str) -> std::result::Result<Predicate, &'static str> {
    if body.is_empty() {
        return Err("empty predicate");
    }
    if body.bytes().all(|b| b.is_ascii_digit()) {
        let n: usize = body.parse().map_err(|_| "position out of range")?;
        if n == 0 {
            return Err("positions start at 1");
        }
        return Ok(Predicate::Position(n));
    }
    match body.split_once('=') {
        Some((child, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or("comparison value must be quoted")?;
            Ok(Predicate::ChildEquals(
                local_name(child.trim())?,
                unquoted.to_string(),
            ))
        }
        None => Ok(Predicate::HasChild(local_name(body)?)),
    }
}

fn local_name(name: &str) -> std::result::Result<String, &'static str> {
    let local = name.rsplit(':').next().unwrap_or(name);
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("invalid element name");
    }
    Ok(local.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    const INTERFACES: &str = r#"<rpc-reply>
<interface-information>
<physical-interface>
<name>ge-0/0/0</name>
<oper-status>up</oper-status>
<logical-interface><name>ge-0/0/0.0</name></logical-interface>
</physical-interface>
<physical-interface>
<name>ge-0/0/1</name>
<oper-status>down</oper-status>
</physical-interface>
<physical-interface>
<name>lo0</name>
</physical-interface>
</interface-information>
</rpc-reply>"#;

    fn names(found: &[&XmlElement]) -> Vec<String> {
        found
            .iter()
            .map(|e| e.child_text("name").unwrap_or(&e.name).to_string())
            .collect()
    }

    #[test]
    fn test_descendant_query() {
        let root = parse(INTERFACES).unwrap();
        let found = root.query("//physical-interface").unwrap();
        assert_eq!(names(&found), ["ge-0/0/0", "ge-0/0/1", "lo0"]);

        let found = root.query("//logical-interface").unwrap();
        assert_eq!(names(&found), ["ge-0/0/0.0"]);
    }

    #[test]
    fn test_absolute_and_relative() {
        let root = parse(INTERFACES).unwrap();
        let found = root
            .query("/rpc-reply/interface-information/physical-interface")
            .unwrap();
        assert_eq!(found.len(), 3);

        let found = root.query("interface-information/physical-interface").unwrap();
        assert_eq!(found.len(), 3);

        // Absolute paths must name the root element first.
        assert!(root.query("/interface-information").unwrap().is_empty());
    }

    #[test]
    fn test_predicates() {
        let root = parse(INTERFACES).unwrap();
        let found = root.query("//physical-interface[2]").unwrap();
        assert_eq!(names(&found), ["ge-0/0/1"]);

        let found = root.query("//physical-interface[oper-status]").unwrap();
        assert_eq!(names(&found), ["ge-0/0/0", "ge-0/0/1"]);

        let found = root
            .query("//physical-interface[oper-status='up']/logical-interface/name")
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].trimmed_text(), "ge-0/0/0.0");

        let found = root.query("//physical-interface[name=\"lo0\"]").unwrap();
        assert_eq!(names(&found), ["lo0"]);
    }

    #[test]
    fn test_positions_count_per_parent() {
        let root = parse("<r><a><x>1</x><x>2</x></a><a><x>3</x><x>4</x></a></r>").unwrap();
        let text = |found: Vec<&XmlElement>| -> Vec<String> {
            found.iter().map(|e| e.trimmed_text().to_string()).collect()
        };

        assert_eq!(text(root.query("//x[2]").unwrap()), ["2", "4"]);
        assert_eq!(text(root.query("/r//x[1]").unwrap()), ["1", "3"]);
        assert_eq!(text(root.query("a//x[1]").unwrap()), ["1", "3"]);
        assert_eq!(text(root.query("//a[2]/x[1]").unwrap()), ["3"]);
        assert!(root.query("//x[3]").unwrap().is_empty());
    }

    #[test]
    fn test_nested_matches_keep_document_order() {
        let root = parse("<r><x><n>outer</n><x><n>inner</n></x></x><x><n>last</n></x></r>").unwrap();
        let found = root.query("//x").unwrap();
        let names: Vec<&str> = found.iter().filter_map(|e| e.child_text("n")).collect();
        assert_eq!(names, ["outer", "inner", "last"]);

        let found = root.query("//x[1]").unwrap();
        let names: Vec<&str> = found.iter().filter_map(|e| e.child_text("n")).collect();
        assert_eq!(names, ["outer", "inner"]);
    }

    #[test]
    fn test_wildcard_context_and_prefixes() {
        let root = parse(INTERFACES).unwrap();
        assert_eq!(root.query("interface-information/*").unwrap().len(), 3);
        assert_eq!(root.query(".").unwrap()[0].name, "rpc-reply");
        assert_eq!(root.query("//junos:physical-interface").unwrap().len(), 3);
        assert_eq!(root.query("interface-information//name").unwrap().len(), 4);
    }

    #[test]
    fn test_invalid_expressions() {
        for bad in ["", "//", "a[", "a[0]", "a/", "a[b=c]", "a b"] {
            assert!(Query::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }
}
