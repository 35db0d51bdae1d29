use dedup_model::FileId;

use crate::hashing::hamming;

struct Node {
    hash: u64,
    file_id: FileId,
    /// Keyed by distance from this node to the child.
    children: Vec<(u32, usize)>,
}

/// A Burkhard-Keller tree indexing 64-bit perceptual hashes for
/// range queries under Hamming distance. Insertion order
/// does not affect query results, only tree shape.
#[derive(Default)]
pub struct BkTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl BkTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn insert(&mut self, hash: u64, file_id: FileId) {
        let new_index = self.nodes.len();
        self.nodes.push(Node {
            hash,
            file_id,
            children: Vec::new(),
        });

        let Some(root) = self.root else {
            self.root = Some(new_index);
            return;
        };

        let mut current = root;
        loop {
            let distance = hamming::distance(self.nodes[current].hash, hash);
            if let Some((_, child)) = self.nodes[current]
                .children
                .iter()
                .find(|(d, _)| *d == distance)
            {
                current = *child;
            } else {
                self.nodes[current].children.push((distance, new_index));
                return;
            }
        }
    }

    /// Every (file id, hash, distance) within `radius` of `query`, sorted
    /// by distance ascending,
    /// ties broken by file id for determinism.
    pub fn query(&self, query: u64, radius: u32) -> Vec<(FileId, u64, u32)> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let distance = hamming::distance(node.hash, query);
            if distance <= radius {
                out.push((node.file_id, node.hash, distance));
            }
            let lo = distance.saturating_sub(radius);
            let hi = distance + radius;
            for (child_distance, child) in &node.children {
                if *child_distance >= lo && *child_distance <= hi {
                    stack.push(*child);
                }
            }
        }
        out.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_scan(entries: &[(u64, FileId)], query: u64, radius: u32) -> Vec<FileId> {
        let mut out: Vec<FileId> = entries
            .iter()
            .filter(|(hash, _)| hamming::distance(*hash, query) <= radius)
            .map(|(_, id)| *id)
            .collect();
        out.sort();
        out
    }

    #[test]
    fn query_matches_linear_scan() {
        let entries: Vec<(u64, FileId)> = vec![
            (0b0000_0000, FileId::new()),
            (0b0000_0001, FileId::new()),
            (0b0000_0011, FileId::new()),
            (0b1111_0000, FileId::new()),
            (0b1010_1010, FileId::new()),
        ];

        let mut tree = BkTree::new();
        for (hash, id) in &entries {
            tree.insert(*hash, *id);
        }

        for radius in [0, 1, 2, 4, 8] {
            let mut from_tree: Vec<FileId> = tree
                .query(0, radius)
                .into_iter()
                .map(|(id, ..)| id)
                .collect();
            from_tree.sort();
            assert_eq!(from_tree, linear_scan(&entries, 0, radius));
        }
    }

    #[test]
    fn empty_tree_returns_no_matches() {
        let tree = BkTree::new();
        assert!(tree.query(0, 64).is_empty());
    }
}
