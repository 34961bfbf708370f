//! Recency order for cache entries
//!
//! A doubly linked list whose nodes live in one vector reserved up front for
//! the cache capacity and link to each other by index. Nodes never move once
//! allocated, so a cache entry can hold its node index for O(1) promotion.

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: Option<usize>,
    next: Option<usize>,
    /// Hash of the key currently owning this node.
    hash: u64,
}

#[derive(Debug)]
pub(crate) struct LruList {
    nodes: Vec<Node>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
}

impl LruList {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { nodes: Vec::with_capacity(capacity), head: None, tail: None }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Allocate a node at the most recently used end.
    pub(crate) fn push_front(&mut self, hash: u64) -> usize {
        debug_assert!(self.nodes.len() < self.nodes.capacity(), "LRU list grew past its reservation");
        let idx = self.nodes.len();
        self.nodes.push(Node { prev: None, next: None, hash });
        self.link_front(idx);
        idx
    }

    pub(crate) fn back(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn hash_of(&self, idx: usize) -> u64 {
        self.nodes[idx].hash
    }

    pub(crate) fn rekey(&mut self, idx: usize, hash: u64) {
        self.nodes[idx].hash = hash;
    }

    pub(crate) fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    /// Node indices from most to least recently used.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&idx| self.nodes[idx].next)
    }

    fn unlink(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.nodes[idx];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LruList) -> Vec<usize> {
        list.iter().collect()
    }

    #[test]
    fn push_front_orders_by_recency() {
        let mut list = LruList::with_capacity(3);
        assert_eq!(list.back(), None);
        for hash in 10..13 {
            list.push_front(hash);
        }
        assert_eq!(order(&list), vec![2, 1, 0]);
        assert_eq!(list.back(), Some(0));
        assert_eq!(list.hash_of(1), 11);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn move_to_front_from_every_position() {
        let mut list = LruList::with_capacity(4);
        for hash in 0..4 {
            list.push_front(hash);
        }
        // Tail
        list.move_to_front(0);
        assert_eq!(order(&list), vec![0, 3, 2, 1]);
        assert_eq!(list.back(), Some(1));
        // Middle
        list.move_to_front(2);
        assert_eq!(order(&list), vec![2, 0, 3, 1]);
        // Head
        list.move_to_front(2);
        assert_eq!(order(&list), vec![2, 0, 3, 1]);
    }

    #[test]
    fn single_node_stays_head_and_tail() {
        let mut list = LruList::with_capacity(1);
        let idx = list.push_front(7);
        list.move_to_front(idx);
        list.rekey(idx, 8);
        assert_eq!(order(&list), vec![idx]);
        assert_eq!(list.back(), Some(idx));
        assert_eq!(list.hash_of(idx), 8);
    }
}
