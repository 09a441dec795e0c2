//! Prefix trie of attribute glob patterns.
//!
//! Patterns are exact names or prefix globs with a trailing `*`. Nodes nest
//! by coverage: a node's children are strictly more specific patterns, so for
//! any key exactly one root-to-leaf chain matches and the deepest node with a
//! verdict decides. A mandatory node (never-overridable exclude) terminates
//! the walk regardless of deeper includes.

/// One pattern node. The root is a structural `*` with no verdict.
#[derive(Clone, Debug)]
pub struct AttributesNode {
    pattern: String,
    prefix: String,
    wildcard: bool,
    verdict: Option<bool>,
    mandatory: bool,
    children: Vec<AttributesNode>,
}

impl AttributesNode {
    /// Structural root matching every key with no verdict of its own.
    #[must_use]
    pub fn root() -> AttributesNode {
        AttributesNode {
            pattern: "*".to_string(),
            prefix: String::new(),
            wildcard: true,
            verdict: None,
            mandatory: false,
            children: Vec::new(),
        }
    }

    fn leaf(pattern: &str, include: bool, mandatory: bool) -> AttributesNode {
        let wildcard = pattern.ends_with('*');
        let prefix = if wildcard {
            &pattern[..pattern.len() - 1]
        } else {
            pattern
        };
        AttributesNode {
            pattern: pattern.to_string(),
            prefix: prefix.to_string(),
            wildcard,
            verdict: Some(include),
            mandatory,
            children: Vec::new(),
        }
    }

    /// Whether this node's pattern matches every key the other pattern does,
    /// without being the same pattern.
    fn covers(&self, other: &AttributesNode) -> bool {
        self.wildcard && self.pattern != other.pattern && other.prefix.starts_with(&self.prefix)
    }

    fn matches(&self, key: &str) -> bool {
        if self.wildcard {
            key.starts_with(self.prefix.as_str())
        } else {
            key == self.pattern
        }
    }

    /// Inserts a pattern with its verdict, restructuring children so that
    /// more specific patterns always sit deeper.
    pub fn insert(&mut self, pattern: &str, include: bool, mandatory: bool) {
        let node = AttributesNode::leaf(pattern, include, mandatory);
        self.insert_node(node);
    }

    fn insert_node(&mut self, mut node: AttributesNode) {
        if node.pattern == self.pattern {
            // Same pattern registered twice: exclude wins, mandatory sticks.
            self.mandatory |= node.mandatory;
            self.verdict = match (self.verdict, node.verdict) {
                (Some(a), Some(b)) => Some(a && b && !self.mandatory),
                (existing, incoming) => incoming.or(existing),
            };
            if self.mandatory {
                self.verdict = Some(false);
            }
            return;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.covers(&node) || c.pattern == node.pattern) {
            child.insert_node(node);
            return;
        }

        // The new node may cover existing children; reparent them under it.
        let mut i = 0;
        while i < self.children.len() {
            if node.covers(&self.children[i]) {
                let reparented = self.children.remove(i);
                node.children.push(reparented);
            } else {
                i += 1;
            }
        }
        self.children.push(node);
    }

    /// Resolves a key. `Some(true)`/`Some(false)` is the deepest matching
    /// verdict; `None` means nothing below the root matched and the caller's
    /// destination default applies.
    #[must_use]
    pub fn apply(&self, key: &str) -> Option<bool> {
        let mut verdict = self.verdict;
        if self.mandatory {
            return Some(false);
        }
        let mut current = self;
        'walk: loop {
            for child in &current.children {
                if child.matches(key) {
                    if child.mandatory {
                        return Some(false);
                    }
                    if child.verdict.is_some() {
                        verdict = child.verdict;
                    }
                    current = child;
                    continue 'walk;
                }
            }
            return verdict;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(excludes: &[&str], includes: &[&str]) -> AttributesNode {
        let mut root = AttributesNode::root();
        for pattern in excludes {
            root.insert(pattern, false, false);
        }
        for pattern in includes {
            root.insert(pattern, true, false);
        }
        root
    }

    #[test]
    fn test_deepest_match_wins() {
        let root = build(&["hel*", "request*"], &["hello", "request.params.*"]);
        assert_eq!(root.apply("hello"), Some(true));
        assert_eq!(root.apply("helloo"), Some(false));
        assert_eq!(root.apply("request.params.foo"), Some(true));
        assert_eq!(root.apply("request"), Some(false));
    }

    #[test]
    fn test_no_match_returns_default() {
        let root = build(&["secret*"], &[]);
        assert_eq!(root.apply("user.id"), None);
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let forward = build(&["hel*"], &["hello"]);
        let mut reversed = AttributesNode::root();
        reversed.insert("hello", true, false);
        reversed.insert("hel*", false, false);
        for key in ["hello", "helloo", "hel", "other"] {
            assert_eq!(forward.apply(key), reversed.apply(key), "key {key}");
        }
    }

    #[test]
    fn test_mandatory_beats_deeper_include() {
        let mut root = AttributesNode::root();
        root.insert("request.headers.*", false, true);
        root.insert("request.headers.accept", true, false);
        assert_eq!(root.apply("request.headers.accept"), Some(false));
        assert_eq!(root.apply("request.headers.cookie"), Some(false));
    }

    #[test]
    fn test_same_pattern_exclude_wins() {
        let mut root = AttributesNode::root();
        root.insert("user.email", true, false);
        root.insert("user.email", false, false);
        assert_eq!(root.apply("user.email"), Some(false));
    }

    #[test]
    fn test_root_star_pattern() {
        let mut root = AttributesNode::root();
        root.insert("*", false, false);
        root.insert("user.*", true, false);
        assert_eq!(root.apply("anything"), Some(false));
        assert_eq!(root.apply("user.id"), Some(true));
    }
}
