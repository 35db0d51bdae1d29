use std::collections::HashMap;

use dedup_model::FileId;

/// Disjoint-set over [`FileId`]s with path compression.
///
/// Union always makes the root whose canonical (lowest) member id sorts
/// first the parent of the other root, so that repeated runs over the
/// same edge set produce identical components and identical group-root
/// ids regardless of edge insertion order.
pub struct UnionFind {
    index: HashMap<FileId, usize>,
    ids: Vec<FileId>,
    parent: Vec<usize>,
    canonical: Vec<FileId>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            ids: Vec::new(),
            parent: Vec::new(),
            canonical: Vec::new(),
        }
    }

    fn index_of(&mut self, id: FileId) -> usize {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let i = self.ids.len();
        self.index.insert(id, i);
        self.ids.push(id);
        self.parent.push(i);
        self.canonical.push(id);
        i
    }

    /// Registers `id` as its own singleton set if not already present.
    pub fn make_set(&mut self, id: FileId) {
        self.index_of(id);
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    /// Links `a` and `b` into the same component.
    pub fn union(&mut self, a: FileId, b: FileId) {
        let ia = self.index_of(a);
        let ib = self.index_of(b);
        let ra = self.find(ia);
        let rb = self.find(ib);
        if ra == rb {
            return;
        }
        // The root whose canonical member id sorts first becomes the
        // parent, making group-root assignment independent of edge order.
        if self.canonical[ra].0 <= self.canonical[rb].0 {
            self.parent[rb] = ra;
        } else {
            self.parent[ra] = rb;
        }
    }

    /// The canonical (lowest-id) member of `id`'s component.
    pub fn find_canonical(&mut self, id: FileId) -> FileId {
        let i = self.index_of(id);
        let root = self.find(i);
        self.canonical[root]
    }

    /// All components with two or more members, each sorted ascending by
    /// id, themselves ordered by their canonical root id.
    pub fn components(&mut self) -> Vec<Vec<FileId>> {
        let mut by_root: HashMap<usize, Vec<FileId>> = HashMap::new();
        for i in 0..self.ids.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(self.ids[i]);
        }
        let mut groups: Vec<Vec<FileId>> = by_root
            .into_values()
            .filter(|members| members.len() >= 2)
            .map(|mut members| {
                members.sort_by_key(|id| id.0);
                members
            })
            .collect();
        groups.sort_by_key(|members| members[0].0);
        groups
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitive_edges_form_one_component() {
        let a = FileId::new();
        let b = FileId::new();
        let c = FileId::new();
        let mut uf = UnionFind::new();
        uf.union(a, b);
        uf.union(b, c);
        let components = uf.components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
    }

    #[test]
    fn root_selection_is_order_independent() {
        let mut ids = vec![FileId::new(), FileId::new(), FileId::new()];
        ids.sort_by_key(|id| id.0);
        let lowest = ids[0];

        let mut forward = UnionFind::new();
        forward.union(ids[0], ids[1]);
        forward.union(ids[1], ids[2]);

        let mut backward = UnionFind::new();
        backward.union(ids[2], ids[1]);
        backward.union(ids[1], ids[0]);

        assert_eq!(forward.find_canonical(ids[2]), lowest);
        assert_eq!(backward.find_canonical(ids[2]), lowest);
    }

    #[test]
    fn singletons_are_not_returned_as_components() {
        let mut uf = UnionFind::new();
        uf.make_set(FileId::new());
        assert!(uf.components().is_empty());
    }
}
