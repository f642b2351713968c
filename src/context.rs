//! Tree-context resolution for the `hashTree` sibling encoding
//!
//! A JMX container does not hold its children. The element at position `i` of a
//! `hashTree` is followed at `i + 1` by another `hashTree` holding its logical
//! children. [`TreeContext`] rebuilds the effective parent/child relation once per
//! document and answers container and module-controller questions from it.

use crate::diagnostics::{Issue, Severity};
use crate::jmeter::{self, HASH_TREE, MODULE_NODE_PATH, PLAN_PATH_MARKER, TEST_PLAN, UNASSIGNED_CONTAINER};
use crate::parser::{JmxDocument, NodeId};

/// Returns the sibling following `siblings[index]` when that sibling is a
/// children wrapper; `None` means the element has no logical children.
pub fn children_wrapper_of(doc: &JmxDocument, siblings: &[NodeId], index: usize) -> Option<NodeId> {
    let current = *siblings.get(index)?;
    if doc.element(current).name == HASH_TREE {
        return None;
    }
    siblings
        .get(index + 1)
        .copied()
        .filter(|&next| doc.element(next).name == HASH_TREE)
}

/// Outcome of following a module controller's stored path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResolution {
    Resolved {
        node: NodeId,
        /// Wrapper whose direct children include `node`
        parent_wrapper: NodeId,
        /// Position of `node` inside `parent_wrapper`
        index: usize,
    },
    Unresolved(UnresolvedReason),
}

impl ModuleResolution {
    pub fn target(&self) -> Option<NodeId> {
        match self {
            ModuleResolution::Resolved { node, .. } => Some(*node),
            ModuleResolution::Unresolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The path collection is missing, empty or blank
    NoPath,
    /// The document has no test plan children wrapper to start from
    MissingAnchor,
    SegmentNotFound { segment: String, path: String },
    /// A non-final segment matched an element that has no children
    IncompletePath { segment: String, path: String },
}

impl UnresolvedReason {
    pub fn issue_type(&self) -> &'static str {
        match self {
            UnresolvedReason::NoPath => "Module Path Not Defined",
            UnresolvedReason::MissingAnchor => "Module Path Unresolvable",
            UnresolvedReason::SegmentNotFound { .. } => "Module Target Not Found",
            UnresolvedReason::IncompletePath { .. } => "Module Path Incomplete",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            UnresolvedReason::NoPath => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            UnresolvedReason::NoPath => "Module controller has no target path defined".to_string(),
            UnresolvedReason::MissingAnchor => {
                "Module controller path cannot be followed: the test plan has no children".to_string()
            }
            UnresolvedReason::SegmentNotFound { segment, path } => {
                format!("Module controller target segment '{segment}' not found (path: {path})")
            }
            UnresolvedReason::IncompletePath { segment, path } => {
                format!("Module controller path is incomplete: '{segment}' has no children (path: {path})")
            }
        }
    }
}

/// Effective tree derived from one document. A snapshot: never updated after `build`.
#[derive(Debug)]
pub struct TreeContext<'d> {
    doc: &'d JmxDocument,
    parent: Vec<Option<NodeId>>,
    effective_parent: Vec<Option<NodeId>>,
    wrapper: Vec<Option<NodeId>>,
    top_wrapper: Option<NodeId>,
    plan: Option<NodeId>,
    plan_wrapper: Option<NodeId>,
}

impl<'d> TreeContext<'d> {
    /// Build parent, effective-parent and wrapper maps in one pass
    pub fn build(doc: &'d JmxDocument) -> Self {
        let count = doc.elements.len();
        let mut parent = vec![None; count];
        let mut wrapper = vec![None; count];
        let mut owner = vec![None; count];

        for (id, element) in doc.iter() {
            for (index, &child) in element.children.iter().enumerate() {
                parent[child] = Some(id);
                if let Some(w) = children_wrapper_of(doc, &element.children, index) {
                    wrapper[child] = Some(w);
                    owner[w] = Some(child);
                }
            }
        }

        // Elements are stored in pre-order, so a parent is always resolved first
        let mut effective_parent: Vec<Option<NodeId>> = vec![None; count];
        for id in 0..count {
            let Some(p) = parent[id] else { continue };
            effective_parent[id] = if doc.element(p).name == HASH_TREE {
                owner[p].or(effective_parent[p])
            } else {
                Some(p)
            };
        }

        let top_wrapper = doc.find_first_child(doc.root(), HASH_TREE);
        let plan = top_wrapper.and_then(|w| doc.find_first_child(w, TEST_PLAN));
        let plan_wrapper = plan.and_then(|p| wrapper[p]);

        Self {
            doc,
            parent,
            effective_parent,
            wrapper,
            top_wrapper,
            plan,
            plan_wrapper,
        }
    }

    pub fn document(&self) -> &'d JmxDocument {
        self.doc
    }

    /// Raw XML parent
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied().flatten()
    }

    /// Logical parent: the owner of the wrapper an element sits in
    pub fn effective_parent(&self, id: NodeId) -> Option<NodeId> {
        self.effective_parent.get(id).copied().flatten()
    }

    /// Children wrapper that follows `id`, if any
    pub fn children_wrapper(&self, id: NodeId) -> Option<NodeId> {
        self.wrapper.get(id).copied().flatten()
    }

    /// Logical children of `id` (wrapper contents without nested wrappers)
    pub fn effective_children(&self, id: NodeId) -> Vec<NodeId> {
        match self.children_wrapper(id) {
            Some(w) => self.wrapper_members(w),
            None => Vec::new(),
        }
    }

    /// Non-wrapper direct children of a wrapper
    pub fn wrapper_members(&self, wrapper: NodeId) -> Vec<NodeId> {
        self.doc
            .element(wrapper)
            .children
            .iter()
            .copied()
            .filter(|&c| self.doc.element(c).name != HASH_TREE)
            .collect()
    }

    /// `hashTree` directly under the root element
    pub fn top_wrapper(&self) -> Option<NodeId> {
        self.top_wrapper
    }

    pub fn plan(&self) -> Option<NodeId> {
        self.plan
    }

    /// Wrapper holding the test plan's thread groups and fragments
    pub fn plan_wrapper(&self) -> Option<NodeId> {
        self.plan_wrapper
    }

    /// Top-level thread groups and fragments, in document order
    pub fn thread_groups(&self) -> Vec<NodeId> {
        self.plan_wrapper
            .map(|w| self.wrapper_members(w))
            .unwrap_or_default()
            .into_iter()
            .filter(|&id| jmeter::is_thread_group(&self.doc.element(id).name))
            .collect()
    }

    /// Effective ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, 'd> {
        Ancestors {
            ctx: self,
            next: self.effective_parent(id),
        }
    }

    /// Nearest enclosing logical container element
    pub fn container_node_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| jmeter::is_container(&self.doc.element(a).name))
    }

    /// Name of the nearest enclosing logical container, or the unassigned sentinel
    pub fn container_of(&self, id: NodeId) -> String {
        self.container_node_of(id)
            .map(|c| self.display_name(c).to_string())
            .unwrap_or_else(|| UNASSIGNED_CONTAINER.to_string())
    }

    /// Nearest enclosing thread group or test fragment
    pub fn thread_group_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&a| jmeter::is_thread_group(&self.doc.element(a).name))
    }

    /// Nearest enclosing element with the given tag
    pub fn enclosing(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.doc.element(a).name == tag)
    }

    /// Nearest element, `id` itself included, that carries a display name.
    /// Property elements resolve to the test element that owns them.
    pub fn named_owner(&self, id: NodeId) -> NodeId {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.doc.element(n).has_attr(jmeter::DISPLAY_NAME))
            .unwrap_or(id)
    }

    /// `testname`, falling back to the tag name
    pub fn display_name(&self, id: NodeId) -> &'d str {
        let element = self.doc.element(id);
        element.display_name().unwrap_or(element.name.as_str())
    }

    /// Human-readable location: named effective ancestors plus the source line
    pub fn location(&self, id: NodeId) -> String {
        let mut chain: Vec<&str> = self
            .ancestors(id)
            .filter(|&a| {
                let element = self.doc.element(a);
                element.has_attr(jmeter::DISPLAY_NAME) && element.name != TEST_PLAN
            })
            .map(|a| self.display_name(a))
            .collect();
        chain.reverse();
        chain.push(self.display_name(id));
        format!("{} (line {})", chain.join(" > "), self.doc.element(id).line)
    }

    /// Ordered, trimmed, non-blank segments of a module controller path
    pub fn module_path(&self, module: NodeId) -> Vec<String> {
        let Some(collection) = self.doc.collection_prop(module, MODULE_NODE_PATH) else {
            return Vec::new();
        };
        self.doc
            .element(collection)
            .children
            .iter()
            .filter_map(|&c| self.doc.element(c).text.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Follow a module controller's path from the test plan down to its target.
    /// With duplicate names, the first match that can be descended into wins.
    pub fn resolve_module(&self, module: NodeId) -> ModuleResolution {
        let segments = self.module_path(module);
        if segments.is_empty() {
            return ModuleResolution::Unresolved(UnresolvedReason::NoPath);
        }
        let (Some(plan), Some(mut wrapper)) = (self.plan, self.plan_wrapper) else {
            return ModuleResolution::Unresolved(UnresolvedReason::MissingAnchor);
        };

        let path = segments.join(" > ");
        let mut rest: &[String] = &segments;
        if rest.first().map(String::as_str) == Some(PLAN_PATH_MARKER) {
            rest = &rest[1..];
            if rest.first().map(String::as_str) == Some(self.display_name(plan)) {
                rest = &rest[1..];
            }
        }

        let Some((last, intermediate)) = rest.split_last() else {
            return ModuleResolution::Unresolved(UnresolvedReason::IncompletePath {
                segment: segments.last().cloned().unwrap_or_default(),
                path,
            });
        };

        for segment in intermediate {
            let matches = self.named_members(wrapper, segment);
            if matches.is_empty() {
                return ModuleResolution::Unresolved(UnresolvedReason::SegmentNotFound {
                    segment: segment.clone(),
                    path,
                });
            }
            match matches.iter().find_map(|&(_, node)| self.children_wrapper(node)) {
                Some(next) => wrapper = next,
                None => {
                    return ModuleResolution::Unresolved(UnresolvedReason::IncompletePath {
                        segment: segment.clone(),
                        path,
                    })
                }
            }
        }

        match self.named_members(wrapper, last).first() {
            Some(&(index, node)) => ModuleResolution::Resolved {
                node,
                parent_wrapper: wrapper,
                index,
            },
            None => ModuleResolution::Unresolved(UnresolvedReason::SegmentNotFound {
                segment: last.clone(),
                path,
            }),
        }
    }

    fn named_members(&self, wrapper: NodeId, name: &str) -> Vec<(usize, NodeId)> {
        self.doc
            .element(wrapper)
            .children
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, c)| {
                let element = self.doc.element(c);
                element.name != HASH_TREE && element.display_name() == Some(name)
            })
            .collect()
    }

    /// Structural ERROR for a document missing the root children wrapper
    pub fn require_top_wrapper(&self, rule: &str) -> Result<NodeId, Issue> {
        self.top_wrapper
            .ok_or_else(|| structural_issue(rule, "Document has no hashTree under the root element"))
    }

    /// Structural ERROR for a document without a test plan children wrapper
    pub fn require_plan_wrapper(&self, rule: &str) -> Result<NodeId, Issue> {
        self.require_top_wrapper(rule)?;
        if self.plan.is_none() {
            return Err(structural_issue(rule, "Document has no TestPlan element"));
        }
        self.plan_wrapper
            .ok_or_else(|| structural_issue(rule, "TestPlan has no children wrapper (hashTree)"))
    }
}

fn structural_issue(rule: &str, description: &str) -> Issue {
    Issue::new(
        Severity::Error,
        rule,
        "Malformed Test Plan",
        "Document root",
        description,
        UNASSIGNED_CONTAINER,
    )
}

/// Iterator over effective ancestors
pub struct Ancestors<'c, 'd> {
    ctx: &'c TreeContext<'d>,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ctx.effective_parent(current);
        Some(current)
    }
}
