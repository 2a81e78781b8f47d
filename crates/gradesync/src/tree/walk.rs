use super::model::{DeclaredTree, GradeNode};

/// One step of a declared-tree traversal.
#[derive(Debug, Clone, Copy)]
pub struct WalkEntry<'a> {
    pub node: &'a GradeNode,
    /// Name of the enclosing category; `None` only for the parent category.
    pub parent: Option<&'a str>,
    /// 0 for the parent category, 1 for its children, and so on.
    pub depth: usize,
}

/// Lazy pre-order traversal in declaration order.
///
/// Every parent is yielded before its children. Calling `DeclaredTree::walk`
/// again starts a fresh traversal.
pub struct Walk<'a> {
    stack: Vec<WalkEntry<'a>>,
}

impl<'a> Walk<'a> {
    fn new(root: &'a GradeNode) -> Self {
        Self {
            stack: vec![WalkEntry {
                node: root,
                parent: None,
                depth: 0,
            }],
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        let parent = entry.node.name();
        // Reversed so the first child is popped first.
        for child in entry.node.children().iter().rev() {
            self.stack.push(WalkEntry {
                node: child,
                parent: Some(parent),
                depth: entry.depth + 1,
            });
        }
        Some(entry)
    }
}

impl DeclaredTree {
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self.root())
    }
}
