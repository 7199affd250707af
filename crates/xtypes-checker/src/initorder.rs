//! Package initialization order
//!
//! Variables are initialized in dependency order; among variables ready
//! for initialization, the earliest declared goes first. Functions are
//! not initialized but carry dependencies through their bodies' references,
//! so they are removed from the graph with their edges passed through.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use tracing::debug;

use crate::errors::Diagnostic;
use crate::info::Initializer;
use crate::{Checker, Code, ObjectId, ObjectKind};

#[derive(Debug)]
struct GraphNode {
    obj: ObjectId,
    /// Nodes this one depends on
    succ: BTreeSet<usize>,
    /// Nodes depending on this one
    pred: BTreeSet<usize>,
    ndeps: usize,
}

impl GraphNode {
    fn cost(&self) -> usize {
        self.pred.len() * self.succ.len()
    }
}

impl<'a> Checker<'a> {
    /// Compute `Info::init_order` and report initialization cycles.
    pub(crate) fn init_order(&mut self) {
        self.info.init_order.clear();

        let (mut nodes, live) = self.dependency_graph();
        let mut pq: BinaryHeap<Reverse<(usize, u32, usize)>> = live
            .iter()
            .map(|&i| Reverse((nodes[i].ndeps, self.world.object(nodes[i].obj).order, i)))
            .collect();
        let mut done = vec![false; nodes.len()];
        let mut emitted: HashSet<ObjectId> = HashSet::new();

        while let Some(Reverse((ndeps, _, n))) = pq.pop() {
            // stale entries carry an outdated dependency count
            if done[n] || ndeps != nodes[n].ndeps {
                continue;
            }
            done[n] = true;
            let obj = nodes[n].obj;

            if nodes[n].ndeps > 0 {
                let mut seen = HashSet::new();
                // a node outside every cycle only waits on one
                if let Some(cycle) = self.find_path(obj, obj, &mut seen) {
                    self.report_init_cycle(&cycle);
                }
            }

            let preds: Vec<usize> = nodes[n].pred.iter().copied().collect();
            for p in preds {
                if done[p] {
                    continue;
                }
                nodes[p].ndeps = nodes[p].ndeps.saturating_sub(1);
                let order = self.world.object(nodes[p].obj).order;
                pq.push(Reverse((nodes[p].ndeps, order, p)));
            }

            if !self.world.object(obj).is_var() {
                continue;
            }
            let Some(decl) = self.obj_map.get(&obj) else {
                continue;
            };
            let Some(init) = decl.init else {
                continue;
            };
            // the variables of `a, b = f()` share one initializer
            let lhs = if decl.lhs.is_empty() {
                vec![obj]
            } else {
                decl.lhs.clone()
            };
            if !emitted.insert(lhs[0]) {
                continue;
            }
            self.info.init_order.push(Initializer { lhs, rhs: init.id });
        }
        debug!(initializers = self.info.init_order.len(), "init order");
    }

    /// The graph of constants, variables and functions with function nodes
    /// removed. Returns all nodes and the indices of the remaining ones.
    fn dependency_graph(&self) -> (Vec<GraphNode>, Vec<usize>) {
        let is_dep = |obj: ObjectId| {
            matches!(
                self.world.object(obj).kind,
                ObjectKind::Const { .. } | ObjectKind::Var(_) | ObjectKind::Func { .. }
            )
        };

        let mut objs: Vec<ObjectId> = self.obj_map.keys().copied().filter(|&o| is_dep(o)).collect();
        objs.sort();
        let index: HashMap<ObjectId, usize> = objs.iter().enumerate().map(|(i, &o)| (o, i)).collect();
        let mut nodes: Vec<GraphNode> = objs
            .iter()
            .map(|&obj| GraphNode {
                obj,
                succ: BTreeSet::new(),
                pred: BTreeSet::new(),
                ndeps: 0,
            })
            .collect();

        for (n, &obj) in objs.iter().enumerate() {
            let Some(deps) = self.deps.get(&obj) else {
                continue;
            };
            for d in deps {
                if let Some(&d) = index.get(d) {
                    nodes[n].succ.insert(d);
                    nodes[d].pred.insert(n);
                }
            }
        }

        let (mut funcs, mut live): (Vec<usize>, Vec<usize>) =
            (0..nodes.len()).partition(|&n| self.world.object(nodes[n].obj).is_func());
        // removing cheap functions first keeps the copied edge sets small
        funcs.sort_by_key(|&n| nodes[n].cost());
        for n in funcs {
            let preds: Vec<usize> = nodes[n].pred.iter().copied().collect();
            let succs: Vec<usize> = nodes[n].succ.iter().copied().collect();
            for &p in &preds {
                if p == n {
                    continue;
                }
                for &s in &succs {
                    if s != n {
                        nodes[p].succ.insert(s);
                        nodes[s].pred.insert(p);
                    }
                }
                nodes[p].succ.remove(&n);
            }
            for &s in &succs {
                nodes[s].pred.remove(&n);
            }
        }

        live.sort();
        for &n in &live {
            nodes[n].ndeps = nodes[n].succ.len();
        }
        (nodes, live)
    }

    /// A dependency path from `from` to `to`, in reverse order, if any.
    fn find_path(&self, from: ObjectId, to: ObjectId, seen: &mut HashSet<ObjectId>) -> Option<Vec<ObjectId>> {
        if !seen.insert(from) {
            return None;
        }
        for &d in self.deps.get(&from)? {
            if d == to {
                return Some(vec![d]);
            }
            if let Some(mut path) = self.find_path(d, to, seen) {
                path.push(d);
                return Some(path);
            }
        }
        None
    }

    fn report_init_cycle(&mut self, cycle: &[ObjectId]) {
        let mut obj = cycle[0];
        let name = self.world.object(obj).name.clone();
        let span = self.world.object(obj).span;
        if cycle.len() == 1 {
            self.error(
                span,
                Code::InvalidInitCycle,
                format!("initialization cycle: {name} refers to itself"),
            );
            return;
        }

        let mut diag = Diagnostic::new(span, Code::InvalidInitCycle, format!("initialization cycle for {name}"));
        for i in (0..cycle.len()).rev() {
            let o = self.world.object(obj);
            diag = diag.related(o.span, format!("{} refers to", o.name));
            obj = cycle[i];
        }
        let o = self.world.object(obj);
        diag = diag.related(o.span, o.name.clone());
        self.report(diag);
    }
}
