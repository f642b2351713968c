//! JMX parser - loads a JMeter test plan into an arena of elements

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Index of an element inside [`JmxDocument::elements`]. Stable for the
/// lifetime of the document, so it doubles as node identity.
pub type NodeId = usize;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse XML: {0}")]
    ParseXml(#[from] roxmltree::Error),
}

/// A parsed JMX document
#[derive(Debug)]
pub struct JmxDocument {
    /// All elements in document (pre-)order; index 0 is the root element
    pub elements: Vec<JmxElement>,
    /// Number of full traversals performed through `iter`/`descendants`
    scans: AtomicUsize,
}

/// A single XML element of the test plan
#[derive(Debug, Clone)]
pub struct JmxElement {
    /// Tag name (e.g. "HTTPSamplerProxy", "stringProp", "hashTree")
    pub name: String,
    /// Declared attributes
    pub attributes: HashMap<String, String>,
    /// Child element indices
    pub children: Vec<NodeId>,
    /// Source location
    pub line: usize,
    pub column: usize,
    /// Element's text content (if any)
    pub text: Option<String>,
}

impl JmxDocument {
    /// Parse a JMX file
    pub fn parse_file(path: &Path) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        Self::parse_str(&source)
    }

    /// Parse JMX XML from a string
    pub fn parse_str(source: &str) -> Result<Self, ParseError> {
        let doc = roxmltree::Document::parse(source)?;
        let mut elements = Vec::new();

        fn parse_node(node: roxmltree::Node, elements: &mut Vec<JmxElement>) -> Option<NodeId> {
            if !node.is_element() {
                return None;
            }

            let idx = elements.len();
            let pos = node.document().text_pos_at(node.range().start);

            let attributes: HashMap<String, String> = node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect();

            let text = node
                .children()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>();
            let text = Some(text.trim().to_string()).filter(|s| !s.is_empty());

            elements.push(JmxElement {
                name: node.tag_name().name().to_string(),
                attributes,
                children: Vec::new(),
                line: pos.row as usize,
                column: pos.col as usize,
                text,
            });

            let child_indices: Vec<NodeId> = node
                .children()
                .filter_map(|child| parse_node(child, elements))
                .collect();
            elements[idx].children = child_indices;

            Some(idx)
        }

        parse_node(doc.root_element(), &mut elements);

        Ok(Self {
            elements,
            scans: AtomicUsize::new(0),
        })
    }

    /// The root element (`jmeterTestPlan` in a well-formed plan)
    pub fn root(&self) -> NodeId {
        0
    }

    /// Get element by index
    pub fn get(&self, id: NodeId) -> Option<&JmxElement> {
        self.elements.get(id)
    }

    /// Get element by index. Panics on an id that did not come from this document.
    pub fn element(&self, id: NodeId) -> &JmxElement {
        &self.elements[id]
    }

    /// Iterate over all elements in pre-order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &JmxElement)> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.elements.iter().enumerate()
    }

    /// Pre-order descendants of `id` (excluding `id` itself). Lazy and
    /// restartable by calling again.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let stack: Vec<NodeId> = self
            .get(id)
            .map(|e| e.children.iter().rev().copied().collect())
            .unwrap_or_default();
        Descendants { doc: self, stack }
    }

    /// How many full traversals have been started on this document
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// First direct child with the given tag
    pub fn find_first_child(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.element(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.element(c).name == tag)
    }

    /// Direct children with the given tag
    pub fn children_named<'a>(&'a self, id: NodeId, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.element(id)
            .children
            .iter()
            .copied()
            .filter(move |&c| self.element(c).name == tag)
    }

    /// Resolve a small XPath-like expression relative to `id`.
    ///
    /// Supported: `a/b` (child steps), `//b` and `a//b` (descendant steps),
    /// `*` and `tag[@attr='value']` predicates, plus an optional leading `./`.
    pub fn find_by_path(&self, id: NodeId, path: &str) -> Option<NodeId> {
        self.find_all_by_path(id, path).into_iter().next()
    }

    /// All matches of a path expression, in document order
    pub fn find_all_by_path(&self, id: NodeId, path: &str) -> Vec<NodeId> {
        let steps = match parse_path(path) {
            Some(steps) if !steps.is_empty() => steps,
            _ => return Vec::new(),
        };

        let mut current = vec![id];
        for step in &steps {
            let mut next = Vec::new();
            for &node in &current {
                let candidates: Vec<NodeId> = if step.descendant {
                    self.descendants(node).collect()
                } else {
                    self.element(node).children.clone()
                };
                for candidate in candidates {
                    if step.matches(self.element(candidate)) && !next.contains(&candidate) {
                        next.push(candidate);
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current.sort_unstable();
        current
    }

    /// Text of a typed property child (`stringProp`, `boolProp`, `intProp`,
    /// `longProp`) whose `name` attribute matches. Present-but-empty yields `Some("")`.
    pub fn prop(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).children.iter().find_map(|&c| {
            let child = self.element(c);
            let typed = matches!(
                child.name.as_str(),
                "stringProp" | "boolProp" | "intProp" | "longProp" | "doubleProp" | "floatProp"
            );
            if typed && child.attr("name") == Some(name) {
                Some(child.text.as_deref().unwrap_or(""))
            } else {
                None
            }
        })
    }

    /// Named `elementProp` child
    pub fn element_prop(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.named_child(id, "elementProp", name)
    }

    /// Named `collectionProp` child
    pub fn collection_prop(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.named_child(id, "collectionProp", name)
    }

    fn named_child(&self, id: NodeId, tag: &str, name: &str) -> Option<NodeId> {
        self.element(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.element(c).name == tag && self.element(c).attr("name") == Some(name))
    }
}

/// Lazy pre-order iterator returned by [`JmxDocument::descendants`]
pub struct Descendants<'a> {
    doc: &'a JmxDocument,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(element) = self.doc.get(id) {
            self.stack.extend(element.children.iter().rev());
        }
        Some(id)
    }
}

#[derive(Debug)]
struct PathStep {
    descendant: bool,
    tag: String,
    predicate: Option<(String, String)>,
}

impl PathStep {
    fn matches(&self, element: &JmxElement) -> bool {
        if self.tag != "*" && element.name != self.tag {
            return false;
        }
        match &self.predicate {
            Some((attr, value)) => element.attr(attr) == Some(value.as_str()),
            None => true,
        }
    }
}

fn parse_path(path: &str) -> Option<Vec<PathStep>> {
    let path = path
        .strip_prefix('.')
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(path);

    let mut steps = Vec::new();
    let mut descendant = false;
    for (i, raw) in path.split('/').enumerate() {
        if raw.is_empty() {
            // `//` produces an empty segment; a single leading `/` is ignored
            if i > 0 || path.starts_with("//") {
                descendant = true;
            }
            continue;
        }
        steps.push(parse_step(raw, descendant)?);
        descendant = false;
    }
    Some(steps)
}

fn parse_step(raw: &str, descendant: bool) -> Option<PathStep> {
    let Some(open) = raw.find('[') else {
        return Some(PathStep {
            descendant,
            tag: raw.to_string(),
            predicate: None,
        });
    };

    let tag = raw[..open].to_string();
    let inner = raw[open + 1..].strip_suffix(']')?;
    let inner = inner.strip_prefix('@')?;
    let (attr, value) = inner.split_once('=')?;
    let value = value.trim().trim_matches(|c| c == '\'' || c == '"');

    Some(PathStep {
        descendant,
        tag,
        predicate: Some((attr.trim().to_string(), value.to_string())),
    })
}

impl JmxElement {
    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Check if element has an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Display name (`testname`), if declared
    pub fn display_name(&self) -> Option<&str> {
        self.attr("testname")
    }
}
