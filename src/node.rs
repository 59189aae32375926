/// Read-mostly view over a document element
///
/// Extraction, candidate scanning and the save-control marker only ever need
/// this much of the DOM, so the pipeline stays independent of `web_sys` and
/// can be exercised against an in-memory tree.
pub trait PostNode: Clone + PartialEq {
    /// Lowercase tag name.
    fn tag(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    /// Element children in document order.
    fn children(&self) -> Vec<Self>;

    /// Concatenated text of the whole subtree.
    fn text(&self) -> String;

    /// Returns `false` when the host refused the write.
    fn set_attr(&self, name: &str, value: &str) -> bool;
}

/// A subtree flattened in document (pre-)order, root first.
///
/// Each element also records where its subtree ends, so containment between
/// two walked elements is an index comparison instead of another traversal.
pub struct Walk<N> {
    nodes: Vec<N>,
    ends: Vec<usize>,
}

enum Step<N> {
    Enter(N),
    Exit(usize),
}

impl<N: PostNode> Walk<N> {
    pub fn new(root: &N) -> Self {
        let mut nodes = Vec::new();
        let mut ends = Vec::new();
        let mut stack = vec![Step::Enter(root.clone())];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(node) => {
                    let index = nodes.len();
                    stack.push(Step::Exit(index));
                    let mut children = node.children();
                    children.reverse();
                    stack.extend(children.into_iter().map(Step::Enter));
                    nodes.push(node);
                    ends.push(index + 1);
                }
                Step::Exit(index) => ends[index] = nodes.len(),
            }
        }

        Walk { nodes, ends }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &N {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// One past the last element of the subtree rooted at `index`.
    pub fn end(&self, index: usize) -> usize {
        self.ends[index]
    }

    /// Whether the element at `inner` sits strictly below the one at `outer`.
    pub fn is_inside(&self, outer: usize, inner: usize) -> bool {
        outer < inner && inner < self.ends[outer]
    }
}

impl PostNode for web_sys::Element {
    fn tag(&self) -> String {
        self.tag_name().to_ascii_lowercase()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn children(&self) -> Vec<Self> {
        let collection = web_sys::Element::children(self);
        (0..collection.length())
            .filter_map(|i| collection.item(i))
            .collect()
    }

    fn text(&self) -> String {
        self.text_content().unwrap_or_default()
    }

    fn set_attr(&self, name: &str, value: &str) -> bool {
        self.set_attribute(name, value).is_ok()
    }
}
