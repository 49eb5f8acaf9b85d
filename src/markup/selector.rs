//! A small path-selector language over [`Element`] trees.
//!
//! Covers the subset of XPath the TEI reader needs:
//!
//! ```text
//! //fileDesc                          descendant of the document
//! .//titleStmt/title                  relative, descendant then child
//! //div//*//figure[contains(@id, 'fig')]
//! .//idno[@type='DOI']
//! table/row
//! ```
//!
//! Attribute names in predicates are matched by local name, so `@xml:id`
//! and `@id` are equivalent on normalized trees.

use crate::error::PaperChemError;
use crate::markup::tree::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Has(String),
    Equals(String, String),
    Contains(String, String),
}

impl Predicate {
    fn matches(&self, el: &Element) -> bool {
        match self {
            Predicate::Has(k) => el.attr(k).is_some(),
            Predicate::Equals(k, v) => el.attr(k) == Some(v.as_str()),
            Predicate::Contains(k, v) => el.attr(k).is_some_and(|a| a.contains(v.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` is the `*` wildcard.
    name: Option<String>,
    predicate: Option<Predicate>,
}

impl Step {
    fn matches(&self, el: &Element) -> bool {
        self.name.as_deref().is_none_or(|n| n == el.name)
            && self.predicate.as_ref().is_none_or(|p| p.matches(el))
    }
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    absolute: bool,
    steps: Vec<Step>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, PaperChemError> {
        let invalid = |detail: &str| PaperChemError::InvalidSelector {
            selector: source.to_string(),
            detail: detail.to_string(),
        };

        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty selector"));
        }

        let (absolute, mut rest) = if let Some(r) = trimmed.strip_prefix('.') {
            (false, r)
        } else if trimmed.starts_with('/') {
            (true, trimmed)
        } else {
            (false, trimmed)
        };

        let mut steps = Vec::new();
        let mut first = true;
        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else if first {
                Axis::Child
            } else {
                return Err(invalid("expected '/' between steps"));
            };
            first = false;

            let name_end = rest.find(['/', '[']).unwrap_or(rest.len());
            let name = rest[..name_end].trim();
            if name.is_empty() {
                return Err(invalid("missing element name"));
            }
            rest = &rest[name_end..];

            let predicate = if rest.starts_with('[') {
                let close = find_closing_bracket(rest).ok_or_else(|| invalid("unclosed '['"))?;
                let body = &rest[1..close];
                rest = &rest[close + 1..];
                Some(parse_predicate(body).ok_or_else(|| invalid("unsupported predicate"))?)
            } else {
                None
            };

            steps.push(Step {
                axis,
                name: (name != "*").then(|| local(name).to_string()),
                predicate,
            });
        }

        if steps.is_empty() {
            return Err(invalid("no steps"));
        }

        Ok(Self {
            source: source.to_string(),
            absolute,
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate from the document root.
    pub fn select<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        self.select_from(root, root)
    }

    /// Evaluate relative to `context`; absolute selectors restart at `root`.
    pub fn select_from<'a>(&self, root: &'a Element, context: &'a Element) -> Vec<&'a Element> {
        let mut steps = self.steps.iter();
        let mut current: Vec<&'a Element> = if self.absolute {
            // The first step is taken from the virtual document node whose
            // only child is `root`.
            let Some(step) = steps.next() else {
                return Vec::new();
            };
            let candidates = match step.axis {
                Axis::Child => vec![root],
                Axis::Descendant => {
                    let mut all = vec![root];
                    all.extend(root.descendants());
                    all
                }
            };
            candidates.into_iter().filter(|e| step.matches(e)).collect()
        } else {
            vec![context]
        };

        for step in steps {
            let mut next: Vec<&'a Element> = Vec::new();
            for el in &current {
                match step.axis {
                    Axis::Child => next.extend(el.child_elements().filter(|c| step.matches(c))),
                    Axis::Descendant => next.extend(
                        el.descendants().into_iter().filter(|c| step.matches(c)),
                    ),
                }
            }
            next.sort_by_key(|e| e.order());
            next.dedup_by_key(|e| e.order());
            current = next;
        }

        current
    }

    /// First match in document order.
    pub fn first<'a>(&self, root: &'a Element, context: &'a Element) -> Option<&'a Element> {
        self.select_from(root, context).into_iter().next()
    }
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn find_closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            (None, _) => {}
        }
    }
    None
}

fn parse_predicate(body: &str) -> Option<Predicate> {
    let body = body.trim();
    if let Some(args) = body
        .strip_prefix("contains(")
        .and_then(|r| r.strip_suffix(')'))
    {
        let (attr, value) = args.split_once(',')?;
        let attr = attr.trim().strip_prefix('@')?;
        return Some(Predicate::Contains(local(attr).to_string(), unquote(value)?));
    }

    let attr_expr = body.strip_prefix('@')?;
    match attr_expr.split_once('=') {
        Some((attr, value)) => Some(Predicate::Equals(
            local(attr.trim()).to_string(),
            unquote(value)?,
        )),
        None => Some(Predicate::Has(local(attr_expr.trim()).to_string())),
    }
}

fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let inner = s
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))?;
    Some(inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tei() -> Element {
        let mut root = Element::new("TEI")
            .with_child(
                Element::new("teiHeader").with_child(
                    Element::new("fileDesc")
                        .with_child(
                            Element::new("titleStmt")
                                .with_child(Element::new("title").with_text("Green solvents")),
                        )
                        .with_child(
                            Element::new("idno")
                                .with_attr("type", "DOI")
                                .with_text("10.1021/x"),
                        )
                        .with_child(Element::new("idno").with_attr("type", "MD5")),
                ),
            )
            .with_child(
                Element::new("text").with_child(
                    Element::new("body").with_child(
                        Element::new("div")
                            .with_child(Element::new("head").with_text("Intro"))
                            .with_child(
                                Element::new("p").with_child(
                                    Element::new("figure").with_attr("id", "fig_0"),
                                ),
                            )
                            .with_child(
                                Element::new("p").with_child(
                                    Element::new("figure").with_attr("id", "tab_0"),
                                ),
                            ),
                    ),
                ),
            );
        root.renumber();
        root
    }

    #[test]
    fn absolute_descendant() {
        let root = tei();
        let s = Selector::parse("//fileDesc").unwrap();
        assert_eq!(s.select(&root).len(), 1);
    }

    #[test]
    fn relative_descendant_then_child() {
        let root = tei();
        let s = Selector::parse(".//titleStmt/title").unwrap();
        let hits = s.select(&root);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text(), "Green solvents");
    }

    #[test]
    fn equality_predicate() {
        let root = tei();
        let s = Selector::parse(".//idno[@type='DOI']").unwrap();
        let hits = s.select(&root);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text(), "10.1021/x");
    }

    #[test]
    fn contains_predicate_with_wildcard_and_prefixed_attr() {
        let root = tei();
        let figs = Selector::parse("//div//*//figure[contains(@xml:id, 'fig')]").unwrap();
        let tabs = Selector::parse("//div//*//figure[contains(@id, 'tab')]").unwrap();
        assert_eq!(figs.select(&root).len(), 1);
        assert_eq!(tabs.select(&root).len(), 1);
        assert_eq!(figs.select(&root)[0].attr("id"), Some("fig_0"));
    }

    #[test]
    fn results_are_unique_and_ordered() {
        let root = tei();
        // `//*//*` reaches the same nodes along many paths.
        let s = Selector::parse("//*//*").unwrap();
        let hits = s.select(&root);
        let orders: Vec<usize> = hits.iter().map(|e| e.order()).collect();
        let mut sorted = orders.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(orders, sorted);
    }

    #[test]
    fn child_step_from_context() {
        let root = tei();
        let div = Selector::parse("//div").unwrap().select(&root)[0];
        let heads = Selector::parse("head").unwrap().select_from(&root, div);
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].text(), "Intro");
    }

    #[test]
    fn presence_predicate() {
        let root = tei();
        let s = Selector::parse("//figure[@id]").unwrap();
        assert_eq!(s.select(&root).len(), 2);
    }

    #[test]
    fn invalid_selectors_are_rejected() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("//div[").is_err());
        assert!(Selector::parse("//div[position()=1]").is_err());
        assert!(Selector::parse("//").is_err());
    }
}
