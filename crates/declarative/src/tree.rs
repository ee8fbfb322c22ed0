//! Arena of entities with parent/child links stored as indices.

/// Stable index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A rooted tree owning its values. Nodes are only ever appended, so ids
/// stay valid for the life of the tree.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Tree<T> {
    pub fn new(root: T) -> Self {
        Self {
            nodes: vec![Node {
                value: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child under `parent`.
    pub fn add_child(&mut self, parent: NodeId, value: T) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            value,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.nodes[id.0].value
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id.0].value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].children.clone()
    }

    /// First child matching `pred`.
    pub fn find_child(&self, id: NodeId, pred: impl Fn(&T) -> bool) -> Option<NodeId> {
        self.children(id).into_iter().find(|c| pred(self.get(*c)))
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Node ids in depth-first pre-order.
    pub fn walk(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree<&'static str>, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new("root");
        let i1 = tree.add_child(tree.root(), "i1");
        let be = tree.add_child(i1, "userroot");
        let idx = tree.add_child(be, "cn");
        (tree, i1, be, idx)
    }

    #[test]
    fn test_path() {
        let (tree, i1, be, idx) = sample();
        assert_eq!(tree.path(idx), vec![tree.root(), i1, be, idx]);
    }

    #[test]
    fn test_find_child() {
        let (tree, i1, be, _) = sample();
        assert_eq!(tree.find_child(i1, |v| *v == "userroot"), Some(be));
        assert_eq!(tree.find_child(i1, |v| *v == "other"), None);
    }

    #[test]
    fn test_walk_is_preorder() {
        let (tree, ..) = sample();
        let names: Vec<&str> = tree.walk(tree.root()).iter().map(|c| *tree.get(*c)).collect();
        assert_eq!(names, vec!["root", "i1", "userroot", "cn"]);
    }
}
