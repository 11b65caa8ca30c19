//! Revision walker
//!
//! A caller-owned cursor over the commit graph:
//!
//! ```text
//! Idle --push/hide/sorting--> Configured --next--> Walking --end--> Exhausted
//!   ^                                                                   |
//!   +------------------------------- reset -----------------------------+
//! ```
//!
//! Without topological or reverse sorting the walk is lazy: every call pops one
//! commit off the frontier and enqueues its parents. Those two modes need the whole
//! interesting graph first and prepare the complete order on the first call.
//!
//! Hidden commits exclude their whole ancestry. The hidden closure is computed
//! exactly before the first commit is emitted, so clock skew cannot leak hidden
//! commits into the output.

use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::list_filter::RefListFilter;
use crate::artifacts::refs::{HEAD, REFS_PREFIX};
use crate::artifacts::revision::Revision;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

bitflags! {
    /// Output order of a [`RevWalk`]; the empty set is discovery order
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SortMode: u8 {
        /// No parent before any of its children
        const TOPOLOGICAL = 0b001;
        /// Newest committer time first
        const TIME = 0b010;
        /// Invert the final order
        const REVERSE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Idle,
    Configured,
    Walking,
    Exhausted,
}

impl WalkState {
    fn as_str(&self) -> &'static str {
        match self {
            WalkState::Idle => "idle",
            WalkState::Configured => "configured",
            WalkState::Walking => "walking",
            WalkState::Exhausted => "exhausted",
        }
    }
}

/// Commits discovered but not yet emitted
#[derive(Debug)]
enum Frontier {
    Fifo(VecDeque<ObjectId>),
    /// Max-heap on time; equal times pop in discovery order
    Time(BinaryHeap<(i64, Reverse<u64>, ObjectId)>),
    /// Whole order computed up front
    Prepared(VecDeque<ObjectId>),
}

impl Frontier {
    fn new(sorting: SortMode) -> Self {
        if sorting.contains(SortMode::TIME) {
            Frontier::Time(BinaryHeap::new())
        } else {
            Frontier::Fifo(VecDeque::new())
        }
    }

    fn push(&mut self, oid: ObjectId, time: i64, sequence: u64) {
        match self {
            Frontier::Fifo(queue) | Frontier::Prepared(queue) => queue.push_back(oid),
            Frontier::Time(heap) => heap.push((time, Reverse(sequence), oid)),
        }
    }

    fn pop(&mut self) -> Option<ObjectId> {
        match self {
            Frontier::Fifo(queue) | Frontier::Prepared(queue) => queue.pop_front(),
            Frontier::Time(heap) => heap.pop().map(|(_, _, oid)| oid),
        }
    }
}

#[derive(Debug)]
pub struct RevWalk<'r> {
    database: &'r Database,
    refs: &'r Refs,
    sorting: SortMode,
    state: WalkState,
    tips: Vec<ObjectId>,
    hidden_tips: Vec<ObjectId>,
    commits: HashMap<ObjectId, SlimCommit>,
    hidden: HashSet<ObjectId>,
    seen: HashSet<ObjectId>,
    frontier: Frontier,
    sequence: u64,
}

impl<'r> RevWalk<'r> {
    pub fn new(database: &'r Database, refs: &'r Refs) -> Self {
        RevWalk {
            database,
            refs,
            sorting: SortMode::empty(),
            state: WalkState::Idle,
            tips: Vec::new(),
            hidden_tips: Vec::new(),
            commits: HashMap::new(),
            hidden: HashSet::new(),
            seen: HashSet::new(),
            frontier: Frontier::new(SortMode::empty()),
            sequence: 0,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn sorting_mode(&self) -> SortMode {
        self.sorting
    }

    fn configure(&mut self) -> Result<()> {
        match self.state {
            WalkState::Idle | WalkState::Configured => {
                self.state = WalkState::Configured;
                Ok(())
            }
            state => Err(Error::InvalidWalkState(state.as_str())),
        }
    }

    pub fn sorting(&mut self, mode: SortMode) -> Result<()> {
        self.configure()?;
        self.sorting = mode;
        Ok(())
    }

    /// Peel `oid` to the commit a walk can start from
    fn commit_tip(&self, oid: &ObjectId) -> Result<ObjectId> {
        let (peeled, object_type) = self.database.peel_tags(oid)?;
        if object_type != ObjectType::Commit {
            return Err(Error::TypeMismatch {
                oid: peeled,
                expected: ObjectType::Commit,
                actual: object_type,
            });
        }

        Ok(peeled)
    }

    pub fn push(&mut self, oid: &ObjectId) -> Result<()> {
        self.configure()?;
        let tip = self.commit_tip(oid)?;
        if !self.tips.contains(&tip) {
            self.tips.push(tip);
        }
        tracing::trace!(%tip, "walk tip pushed");

        Ok(())
    }

    pub fn hide(&mut self, oid: &ObjectId) -> Result<()> {
        self.configure()?;
        let tip = self.commit_tip(oid)?;
        if !self.hidden_tips.contains(&tip) {
            self.hidden_tips.push(tip);
        }
        tracing::trace!(%tip, "walk tip hidden");

        Ok(())
    }

    pub fn push_ref(&mut self, name: &str) -> Result<()> {
        let oid = self.refs.name_to_oid(name)?;
        self.push(&oid)
    }

    pub fn hide_ref(&mut self, name: &str) -> Result<()> {
        let oid = self.refs.name_to_oid(name)?;
        self.hide(&oid)
    }

    pub fn push_head(&mut self) -> Result<()> {
        self.push_ref(HEAD)
    }

    pub fn hide_head(&mut self) -> Result<()> {
        self.hide_ref(HEAD)
    }

    /// Push every reference matching a glob such as `heads/*` or `refs/tags/v1.*`
    ///
    /// A missing `refs/` prefix is added, and a pattern without wildcards matches
    /// everything below it. References not pointing at commits are skipped.
    pub fn push_glob(&mut self, glob: &str) -> Result<()> {
        for oid in self.glob_targets(glob)? {
            self.push(&oid)?;
        }

        Ok(())
    }

    pub fn hide_glob(&mut self, glob: &str) -> Result<()> {
        for oid in self.glob_targets(glob)? {
            self.hide(&oid)?;
        }

        Ok(())
    }

    fn glob_targets(&self, glob: &str) -> Result<Vec<ObjectId>> {
        self.configure_check()?;

        let mut pattern = if glob.starts_with(REFS_PREFIX) {
            glob.to_string()
        } else {
            format!("{REFS_PREFIX}{glob}")
        };
        if !pattern.contains(['*', '?', '[']) {
            if !pattern.ends_with('/') {
                pattern.push('/');
            }
            pattern.push('*');
        }
        let pattern = glob::Pattern::new(&pattern).map_err(|_| Error::invalid("reference glob", glob))?;

        let mut targets = Vec::new();
        for name in self.refs.list(RefListFilter::ALL)? {
            if !pattern.matches(&name) {
                continue;
            }
            let oid = self.refs.name_to_oid(&name)?;
            match self.commit_tip(&oid) {
                Ok(tip) => targets.push(tip),
                Err(Error::TypeMismatch { actual, .. }) => {
                    tracing::trace!(name, %actual, "glob skips reference to a non-commit");
                }
                Err(error) => return Err(error),
            }
        }

        Ok(targets)
    }

    fn configure_check(&self) -> Result<()> {
        match self.state {
            WalkState::Idle | WalkState::Configured => Ok(()),
            state => Err(Error::InvalidWalkState(state.as_str())),
        }
    }

    /// Walk `a..b`: push `b`, hide `a`; an empty side stands for `HEAD`
    pub fn push_range(&mut self, range: &str) -> Result<()> {
        let (hidden, pushed) = match range.split_once("..") {
            Some((_, pushed)) if pushed.starts_with('.') => return Err(Error::invalid("revision range", range)),
            Some(sides) => sides,
            None => return Err(Error::invalid("revision range", range)),
        };
        let side = |revision: &str| {
            let revision = if revision.is_empty() { HEAD } else { revision };
            Revision::try_parse(revision)?.resolve(self.database, self.refs)
        };
        let hidden = side(hidden)?;
        let pushed = side(pushed)?;

        self.hide(&hidden)?;
        self.push(&pushed)
    }

    /// Back to `Idle` with no tips; the sorting mode is kept
    pub fn reset(&mut self) {
        self.state = WalkState::Idle;
        self.tips.clear();
        self.hidden_tips.clear();
        self.commits.clear();
        self.hidden.clear();
        self.seen.clear();
        self.frontier = Frontier::new(self.sorting);
        self.sequence = 0;
    }

    fn load(&mut self, oid: &ObjectId) -> Result<&SlimCommit> {
        if !self.commits.contains_key(oid) {
            let commit = self.database.load_slim_commit(oid)?;
            self.commits.insert(*oid, commit);
        }

        self.commits
            .get(oid)
            .ok_or(Error::ObjectNotFound(*oid))
    }

    fn parents(&mut self, oid: &ObjectId) -> Result<Vec<ObjectId>> {
        Ok(self.load(oid)?.parents.clone())
    }

    fn enqueue(&mut self, oid: ObjectId) -> Result<()> {
        if self.hidden.contains(&oid) || !self.seen.insert(oid) {
            return Ok(());
        }

        let time = self.load(&oid)?.time;
        self.sequence += 1;
        self.frontier.push(oid, time, self.sequence);

        Ok(())
    }

    fn hidden_closure(&mut self) -> Result<HashSet<ObjectId>> {
        let mut hidden = HashSet::new();
        let mut pending = self.hidden_tips.clone();

        while let Some(oid) = pending.pop() {
            if hidden.insert(oid) {
                pending.extend(self.parents(&oid)?);
            }
        }

        Ok(hidden)
    }

    fn start(&mut self) -> Result<()> {
        self.hidden = self.hidden_closure()?;
        self.frontier = Frontier::new(self.sorting);
        for tip in self.tips.clone() {
            self.enqueue(tip)?;
        }

        if self.sorting.intersects(SortMode::TOPOLOGICAL | SortMode::REVERSE) {
            let mut order = if self.sorting.contains(SortMode::TOPOLOGICAL) {
                self.topological_order()?
            } else {
                self.drain()?
            };
            if self.sorting.contains(SortMode::REVERSE) {
                order.reverse();
            }
            self.frontier = Frontier::Prepared(order.into());
        }

        tracing::debug!(
            tips = self.tips.len(),
            hidden = self.hidden.len(),
            sorting = ?self.sorting,
            "revision walk started"
        );
        Ok(())
    }

    fn step(&mut self) -> Result<Option<ObjectId>> {
        let Some(oid) = self.frontier.pop() else {
            return Ok(None);
        };

        if !matches!(self.frontier, Frontier::Prepared(_)) {
            for parent in self.parents(&oid)? {
                self.enqueue(parent)?;
            }
        }

        Ok(Some(oid))
    }

    fn drain(&mut self) -> Result<Vec<ObjectId>> {
        let mut order = Vec::new();
        while let Some(oid) = self.step()? {
            order.push(oid);
        }

        Ok(order)
    }

    /// Kahn's algorithm over the interesting commits
    ///
    /// Ready commits are taken newest first with `TIME`, otherwise depth first so
    /// a line of history stays together.
    fn topological_order(&mut self) -> Result<Vec<ObjectId>> {
        let discovered = self.drain()?;

        let mut children: HashMap<ObjectId, usize> = discovered.iter().map(|oid| (*oid, 0)).collect();
        for oid in &discovered {
            for parent in self.parents(oid)? {
                if let Some(count) = children.get_mut(&parent) {
                    *count += 1;
                }
            }
        }

        let by_time = self.sorting.contains(SortMode::TIME);
        let mut heap = BinaryHeap::new();
        let mut stack = Vec::new();
        let mut sequence = 0u64;
        let tips = discovered
            .iter()
            .filter(|oid| children.get(oid) == Some(&0))
            .copied()
            .collect::<Vec<_>>();
        for oid in &tips {
            sequence += 1;
            let time = self.load(oid)?.time;
            heap.push((time, Reverse(sequence), *oid));
        }
        stack.extend(tips.iter().rev());

        let mut order = Vec::with_capacity(discovered.len());
        loop {
            let next = if by_time {
                heap.pop().map(|(_, _, oid)| oid)
            } else {
                stack.pop()
            };
            let Some(oid) = next else {
                break;
            };
            order.push(oid);

            for parent in self.parents(&oid)?.into_iter().rev() {
                let Some(count) = children.get_mut(&parent) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    sequence += 1;
                    let time = self.load(&parent)?.time;
                    heap.push((time, Reverse(sequence), parent));
                    stack.push(parent);
                }
            }
        }

        Ok(order)
    }

    /// Next commit id, or `None` once the walk is exhausted
    pub fn next_oid(&mut self) -> Result<Option<ObjectId>> {
        match self.state {
            WalkState::Exhausted => return Ok(None),
            WalkState::Idle | WalkState::Configured => {
                self.state = WalkState::Walking;
                if let Err(error) = self.start() {
                    self.state = WalkState::Exhausted;
                    return Err(error);
                }
            }
            WalkState::Walking => {}
        }

        let next = self.step();
        if matches!(next, Ok(None)) {
            self.state = WalkState::Exhausted;
        }

        next
    }
}

impl Iterator for RevWalk<'_> {
    type Item = Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_oid().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::database::memory::MemoryBackend;
    use crate::artifacts::objects::commit::Commit;
    use crate::artifacts::objects::signature::Signature;
    use crate::artifacts::objects::tag::Tag;
    use crate::artifacts::objects::EMPTY_TREE_ID;
    use crate::context::Context;
    use crate::errors::ErrorCode;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Graph {
        _dir: TempDir,
        database: Database,
        refs: Refs,
        names: HashMap<ObjectId, &'static str>,
    }

    impl Graph {
        fn commit(&mut self, label: &'static str, parents: &[ObjectId], time: i64) -> ObjectId {
            let tree = ObjectId::try_parse(EMPTY_TREE_ID).unwrap();
            let signature = Signature::at("A", "a@example.com", time, 0).unwrap();
            let commit = Commit::new(tree, parents.to_vec(), signature.clone(), signature, format!("{label}\n"));
            let oid = self.database.store(&commit).unwrap();
            self.names.insert(oid, label);
            oid
        }

        fn walk(&self) -> RevWalk<'_> {
            RevWalk::new(&self.database, &self.refs)
        }

        fn labels(&self, walk: RevWalk<'_>) -> Vec<&'static str> {
            walk.map(|oid| self.names[&oid.unwrap()]).collect()
        }
    }

    #[fixture]
    fn graph() -> Graph {
        let dir = TempDir::new().unwrap();
        let mut database = Database::new();
        database.add_backend(Arc::new(MemoryBackend::new()), 1);
        let refs = Refs::new(dir.path(), Arc::new(Context::default()));

        Graph {
            _dir: dir,
            database,
            refs,
            names: HashMap::new(),
        }
    }

    /// ```text
    /// a(1) - b(2) - c(3) ------- m(6)
    ///          \                /
    ///           d(4) - e(5) ---
    /// ```
    fn diamond(graph: &mut Graph) -> HashMap<&'static str, ObjectId> {
        let a = graph.commit("a", &[], 1);
        let b = graph.commit("b", &[a], 2);
        let c = graph.commit("c", &[b], 3);
        let d = graph.commit("d", &[b], 4);
        let e = graph.commit("e", &[d], 5);
        let m = graph.commit("m", &[c, e], 6);

        HashMap::from([("a", a), ("b", b), ("c", c), ("d", d), ("e", e), ("m", m)])
    }

    #[rstest]
    fn discovery_order_is_breadth_first(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.push(&ids["m"]).unwrap();

        assert_eq!(graph.labels(walk), vec!["m", "c", "e", "b", "d", "a"]);
    }

    #[rstest]
    fn time_order_interleaves_branches(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.sorting(SortMode::TIME).unwrap();
        walk.push(&ids["m"]).unwrap();

        assert_eq!(graph.labels(walk), vec!["m", "e", "d", "c", "b", "a"]);
    }

    #[rstest]
    fn shared_ancestors_are_emitted_once(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.push(&ids["c"]).unwrap();
        walk.push(&ids["e"]).unwrap();
        walk.push(&ids["c"]).unwrap();

        let labels = graph.labels(walk);
        assert_eq!(labels.len(), 5);
        assert_eq!(labels.iter().filter(|label| **label == "b").count(), 1);
    }

    #[rstest]
    fn hidden_commits_exclude_their_ancestry(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.sorting(SortMode::TIME).unwrap();
        walk.push(&ids["m"]).unwrap();
        walk.hide(&ids["c"]).unwrap();

        assert_eq!(graph.labels(walk), vec!["m", "e", "d"]);
    }

    #[rstest]
    fn topological_order_survives_clock_skew(mut graph: Graph) {
        let a = graph.commit("a", &[], 100);
        let b = graph.commit("b", &[a], 50);
        let c = graph.commit("c", &[b], 10);
        let d = graph.commit("d", &[a], 60);
        let m = graph.commit("m", &[c, d], 70);

        let mut walk = graph.walk();
        walk.sorting(SortMode::TOPOLOGICAL | SortMode::TIME).unwrap();
        walk.push(&m).unwrap();
        let labels = graph.labels(walk);

        let position = |label: &str| labels.iter().position(|candidate| *candidate == label).unwrap();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "m");
        assert_eq!(labels[4], "a");
        assert!(position("c") < position("b"));
        assert!(position("d") < position("a"));
    }

    #[rstest]
    fn plain_topological_order_keeps_lines_together(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.sorting(SortMode::TOPOLOGICAL).unwrap();
        walk.push(&ids["m"]).unwrap();

        assert_eq!(graph.labels(walk), vec!["m", "c", "e", "d", "b", "a"]);
    }

    #[rstest]
    fn reverse_inverts_the_final_order(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        walk.sorting(SortMode::TIME | SortMode::REVERSE).unwrap();
        walk.push(&ids["m"]).unwrap();

        assert_eq!(graph.labels(walk), vec!["a", "b", "c", "d", "e", "m"]);
    }

    fn linear(graph: &mut Graph) -> ObjectId {
        let c1 = graph.commit("C1", &[], 1);
        let c2 = graph.commit("C2", &[c1], 2);
        graph.commit("C3", &[c2], 3)
    }

    #[rstest]
    #[case(SortMode::REVERSE, vec!["C1", "C2", "C3"])]
    #[case(SortMode::TOPOLOGICAL, vec!["C3", "C2", "C1"])]
    #[case(SortMode::TOPOLOGICAL | SortMode::REVERSE, vec!["C1", "C2", "C3"])]
    fn linear_history_orders(mut graph: Graph, #[case] mode: SortMode, #[case] expected: Vec<&'static str>) {
        let tip = linear(&mut graph);
        let mut walk = graph.walk();
        walk.sorting(mode).unwrap();
        walk.push(&tip).unwrap();

        assert_eq!(graph.labels(walk), expected);
    }

    #[rstest]
    fn tips_are_refused_while_walking(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let mut walk = graph.walk();
        assert_eq!(walk.state(), WalkState::Idle);
        walk.push(&ids["b"]).unwrap();
        assert_eq!(walk.state(), WalkState::Configured);

        assert_eq!(walk.next_oid().unwrap(), Some(ids["b"]));
        assert_eq!(walk.state(), WalkState::Walking);
        assert_eq!(walk.push(&ids["m"]).unwrap_err().code(), ErrorCode::InvalidWalkState);

        assert_eq!(walk.next_oid().unwrap(), Some(ids["a"]));
        assert_eq!(walk.next_oid().unwrap(), None);
        assert_eq!(walk.state(), WalkState::Exhausted);
        assert_eq!(walk.hide(&ids["a"]).unwrap_err().code(), ErrorCode::InvalidWalkState);

        walk.reset();
        assert_eq!(walk.state(), WalkState::Idle);
        walk.push(&ids["c"]).unwrap();
        assert_eq!(walk.count(), 3);
    }

    #[rstest]
    fn tags_are_peeled_and_blobs_refused(mut graph: Graph) {
        let ids = diamond(&mut graph);
        let signature = Signature::at("T", "t@example.com", 7, 0).unwrap();
        let tag = Tag::new(ids["c"], ObjectType::Commit, "v1".into(), Some(signature), "v1\n");
        let tag_oid = graph.database.store(&tag).unwrap();
        let blob = graph.database.write(ObjectType::Blob, b"not a commit").unwrap();

        let mut walk = graph.walk();
        walk.push(&tag_oid).unwrap();
        assert_eq!(walk.push(&blob).unwrap_err().code(), ErrorCode::TypeMismatch);

        assert_eq!(graph.labels(walk), vec!["c", "b", "a"]);
    }

    #[rstest]
    fn globs_and_ranges_resolve_references(mut graph: Graph) {
        let ids = diamond(&mut graph);
        graph.refs.create_direct("refs/heads/main", ids["c"], false, "").unwrap();
        graph.refs.create_direct("refs/heads/topic", ids["e"], false, "").unwrap();
        graph.refs.create_direct("refs/tags/old", ids["a"], false, "").unwrap();
        let blob = graph.database.write(ObjectType::Blob, b"blob").unwrap();
        graph.refs.create_direct("refs/heads/blob", blob, false, "").unwrap();

        let mut walk = graph.walk();
        walk.sorting(SortMode::TIME).unwrap();
        walk.push_glob("heads").unwrap();
        walk.hide_glob("tags/*").unwrap();
        assert_eq!(graph.labels(walk), vec!["e", "d", "c", "b"]);

        let mut walk = graph.walk();
        walk.sorting(SortMode::TIME).unwrap();
        walk.push_range("main..topic").unwrap();
        assert_eq!(graph.labels(walk), vec!["e", "d"]);

        let mut walk = graph.walk();
        assert_eq!(walk.push_range("main").unwrap_err().code(), ErrorCode::InvalidSpec);
        assert_eq!(walk.push_range("main...topic").unwrap_err().code(), ErrorCode::InvalidSpec);
    }

    #[rstest]
    fn an_empty_walk_ends_immediately(graph: Graph) {
        let mut walk = graph.walk();

        assert_eq!(walk.next_oid().unwrap(), None);
        assert_eq!(walk.state(), WalkState::Exhausted);
    }
}
