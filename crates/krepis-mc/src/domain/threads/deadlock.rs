//! Deadlock diagnosis
//!
//! Builds a wait-for graph from monitor ownership: an edge `A -> B` means A
//! needs a monitor that B holds. A cycle in that graph is a lock-order
//! deadlock; threads stuck in `wait()` with nobody left to notify show up
//! as stuck threads without a cycle.

use super::types::{ThreadId, ThreadState};
use crate::domain::heap::ObjRef;
use crate::domain::state::KernelState;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A thread that cannot make progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StuckThread {
    /// Thread
    pub thread: ThreadId,
    /// Its state
    pub state: ThreadState,
    /// Monitor it blocks or waits on
    pub lock: Option<ObjRef>,
    /// Current owner of that monitor
    pub holder: Option<ThreadId>,
}

/// Why the program cannot continue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeadlockInfo {
    /// Lock-order cycles, each starting at its smallest thread id
    pub cycles: Vec<Vec<ThreadId>>,
    /// Every alive thread and what it waits for
    pub stuck: Vec<StuckThread>,
}

/// Who waits for whom
#[derive(Debug, Clone, Default)]
pub struct WaitForGraph {
    edges: BTreeMap<ThreadId, BTreeSet<ThreadId>>,
}

impl WaitForGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of the current monitor ownership in `kernel`
    pub fn from_kernel(kernel: &KernelState) -> Self {
        let mut graph = Self::new();
        for thread in kernel.threads.iter() {
            if !matches!(thread.state(), ThreadState::Blocked | ThreadState::Notified) {
                continue;
            }
            let holder = thread
                .lock_ref()
                .and_then(|obj| kernel.heap.monitor(obj).ok())
                .and_then(|m| m.holder());
            if let Some(holder) = holder {
                if holder != thread.id() {
                    graph.add_edge(thread.id(), holder);
                }
            }
        }
        graph
    }

    /// `from` waits for `to`
    pub fn add_edge(&mut self, from: ThreadId, to: ThreadId) {
        self.edges.entry(from).or_default().insert(to);
    }

    /// Path `to -> ... -> from` that adding `from -> to` would close
    pub fn would_create_cycle(&self, from: ThreadId, to: ThreadId) -> Option<Vec<ThreadId>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        if self.dfs_find_path(to, from, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs_find_path(
        &self,
        current: ThreadId,
        target: ThreadId,
        visited: &mut BTreeSet<ThreadId>,
        path: &mut Vec<ThreadId>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for &next in self.successors(current) {
            if self.dfs_find_path(next, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// All distinct cycles, each rotated to start at its smallest id
    pub fn find_cycles(&self) -> Vec<Vec<ThreadId>> {
        let mut cycles: Vec<Vec<ThreadId>> = Vec::new();
        for &start in self.edges.keys() {
            let mut visited = BTreeSet::new();
            let mut path = Vec::new();
            if self.dfs_cycle(start, start, &mut visited, &mut path, true) {
                let cycle = canonical(path);
                if !cycles.contains(&cycle) {
                    cycles.push(cycle);
                }
            }
        }
        cycles
    }

    fn dfs_cycle(
        &self,
        current: ThreadId,
        target: ThreadId,
        visited: &mut BTreeSet<ThreadId>,
        path: &mut Vec<ThreadId>,
        is_start: bool,
    ) -> bool {
        if !is_start && current == target {
            return true;
        }
        if !visited.insert(current) {
            return false;
        }
        path.push(current);
        for &next in self.successors(current) {
            if self.dfs_cycle(next, target, visited, path, false) {
                return true;
            }
        }
        path.pop();
        false
    }

    fn successors(&self, thread: ThreadId) -> impl Iterator<Item = &ThreadId> {
        self.edges.get(&thread).into_iter().flatten()
    }
}

fn canonical(mut cycle: Vec<ThreadId>) -> Vec<ThreadId> {
    if let Some(pos) = cycle.iter().enumerate().min_by_key(|(_, t)| **t).map(|(i, _)| i) {
        cycle.rotate_left(pos);
    }
    cycle
}

/// Explain why no thread of `kernel` can run
pub fn diagnose(kernel: &KernelState) -> DeadlockInfo {
    let stuck = kernel
        .threads
        .iter()
        .filter(|t| t.state().is_alive() && !kernel.is_runnable(t))
        .map(|t| StuckThread {
            thread: t.id(),
            state: t.state(),
            lock: t.lock_ref(),
            holder: t
                .lock_ref()
                .and_then(|obj| kernel.heap.monitor(obj).ok())
                .and_then(|m| m.holder()),
        })
        .collect();

    DeadlockInfo {
        cycles: WaitForGraph::from_kernel(kernel).find_cycles(),
        stuck,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::threads::{Frame, Scheduler};

    #[test]
    fn test_ab_ba_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(ThreadId(1), ThreadId(2));
        graph.add_edge(ThreadId(2), ThreadId(1));
        assert_eq!(graph.find_cycles(), vec![vec![ThreadId(1), ThreadId(2)]]);
    }

    #[test]
    fn test_chain_is_not_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(ThreadId(0), ThreadId(1));
        graph.add_edge(ThreadId(1), ThreadId(2));
        assert!(graph.find_cycles().is_empty());
        assert_eq!(
            graph.would_create_cycle(ThreadId(2), ThreadId(0)),
            Some(vec![ThreadId(0), ThreadId(1), ThreadId(2)])
        );
        assert!(graph.would_create_cycle(ThreadId(0), ThreadId(2)).is_none());
    }

    #[test]
    fn test_rotations_are_deduplicated() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(ThreadId(3), ThreadId(1));
        graph.add_edge(ThreadId(1), ThreadId(2));
        graph.add_edge(ThreadId(2), ThreadId(3));
        assert_eq!(
            graph.find_cycles(),
            vec![vec![ThreadId(1), ThreadId(2), ThreadId(3)]]
        );
    }

    #[test]
    fn test_diagnose_lock_order_deadlock() {
        let mut kernel = KernelState::new();
        let a = kernel.heap.allocate("Lock", 0);
        let b = kernel.heap.allocate("Lock", 0);
        let ids: Vec<ThreadId> = (0..2)
            .map(|i| {
                let obj = kernel.heap.allocate("Thread", 0);
                let id = kernel.threads.create(&format!("t{i}"), false, obj, Frame::new(0, 0));
                kernel.thread_mut(id).unwrap().set_state(ThreadState::Running).unwrap();
                id
            })
            .collect();

        let mut sched = Scheduler::new(&mut kernel);
        sched.enter_monitor(ids[0], a).unwrap();
        sched.enter_monitor(ids[1], b).unwrap();
        sched.enter_monitor(ids[0], b).unwrap();
        let (_, point) = sched.enter_monitor(ids[1], a).unwrap();
        assert!(point.is_none());

        let info = diagnose(&kernel);
        assert_eq!(info.cycles, vec![vec![ids[0], ids[1]]]);
        assert_eq!(info.stuck.len(), 2);
        assert_eq!(info.stuck[0].holder, Some(ids[1]));
    }
}
