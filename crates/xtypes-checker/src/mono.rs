//! Detection of instantiation cycles that would need infinitely many
//! specializations
//!
//! Vertices are type parameters. Instantiating `T[P]` with a type argument
//! mentioning type parameter `Q` adds an edge `Q -> P`, weighted 0 when the
//! argument is `Q` itself and 1 when `Q` is nested inside a larger type.
//! Flows along a positive-weight cycle keep growing (`T[P]` needs `T[*P]`,
//! which needs `T[**P]`, ...), so any such cycle is an error. The check is
//! a longest-path relaxation: a path whose length reaches the number of
//! vertices must have gone around a positive cycle.

use std::collections::HashMap;

use xtypes_ast::Span;

use crate::types::Type;
use crate::{ObjectId, PackageId, TypeId, World};

#[derive(Debug, Clone)]
struct Vertex {
    /// Heaviest known path to this vertex
    weight: i64,
    /// Last edge of that path
    pre: usize,
    /// Number of edges of that path
    len: usize,
    obj: ObjectId,
}

#[derive(Debug, Clone)]
struct Edge {
    dst: usize,
    src: usize,
    weight: i64,
    span: Span,
    /// The type argument that flowed along this edge
    ty: TypeId,
}

/// One step of an instantiation cycle: at `span`, `tparam` was
/// instantiated as `ty`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoopLink {
    pub(crate) span: Span,
    pub(crate) tparam: ObjectId,
    pub(crate) ty: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InstanceLoop {
    pub(crate) start: ObjectId,
    pub(crate) links: Vec<LoopLink>,
}

#[derive(Debug, Default)]
pub(crate) struct MonoGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Receiver type parameters of methods map to the type parameters of
    /// their receiver base type
    canon: HashMap<TypeId, TypeId>,
    name_idx: HashMap<ObjectId, usize>,
}

impl MonoGraph {
    pub(crate) fn record_canon(&mut self, method_tparam: TypeId, type_tparam: TypeId) {
        self.canon.insert(method_tparam, type_tparam);
    }

    /// Record that `tparams` were instantiated with `targs` at `span`;
    /// `arg_spans` locates the individual argument expressions when known.
    pub(crate) fn record_instance(
        &mut self,
        world: &World,
        pkg: PackageId,
        span: Span,
        tparams: &[TypeId],
        targs: &[TypeId],
        arg_spans: &[Span],
    ) {
        for (i, (&tpar, &targ)) in tparams.iter().zip(targs).enumerate() {
            let span = arg_spans.get(i).copied().unwrap_or(span);
            self.assign(world, pkg, span, tpar, targ);
        }
    }

    fn assign(&mut self, world: &World, pkg: PackageId, span: Span, tpar: TypeId, targ: TypeId) {
        // instantiation cycles stay within one package
        let Some(tp) = world.types.type_param(tpar) else {
            return;
        };
        if world.object(tp.obj).pkg != Some(pkg) {
            return;
        }
        let dst = self.type_param_vertex(world, tpar);
        let mut stack = vec![targ];
        let mut visited = Vec::new();
        while let Some(ty) = stack.pop() {
            if visited.contains(&ty) {
                continue;
            }
            visited.push(ty);
            let var_types = |vars: &[ObjectId]| -> Vec<TypeId> { vars.iter().filter_map(|&v| world.object(v).ty).collect() };
            match world.types.get(ty) {
                Type::TypeParam(p) => {
                    if world.object(p.obj).pkg == Some(pkg) {
                        let src = self.type_param_vertex(world, ty);
                        let weight = if ty == targ { 0 } else { 1 };
                        self.edges.push(Edge {
                            dst,
                            src,
                            weight,
                            span,
                            ty: targ,
                        });
                    }
                }
                Type::Named(n) => stack.extend(n.type_args.iter().copied()),
                Type::Basic(_) | Type::Tuple(_) => {}
                Type::Pointer { base: elem }
                | Type::Slice { elem }
                | Type::Array { elem, .. }
                | Type::Chan { elem, .. } => stack.push(*elem),
                Type::Map { key, elem } => stack.extend([*key, *elem]),
                Type::Interface(iface) => stack.extend(var_types(&iface.methods)),
                Type::Signature(sig) => {
                    stack.extend(var_types(&sig.params));
                    stack.extend(var_types(&sig.results));
                }
                Type::Struct(s) => stack.extend(var_types(&s.fields)),
                Type::Union(terms) => stack.extend(terms.iter().map(|t| t.ty)),
            }
        }
    }

    fn type_param_vertex(&mut self, world: &World, tpar: TypeId) -> usize {
        let tpar = self.canon.get(&tpar).copied().unwrap_or(tpar);
        let obj = match world.types.type_param(tpar) {
            Some(tp) => tp.obj,
            None => ObjectId(u32::MAX),
        };
        if let Some(&idx) = self.name_idx.get(&obj) {
            return idx;
        }
        let idx = self.vertices.len();
        self.vertices.push(Vertex {
            weight: 0,
            pre: 0,
            len: 0,
            obj,
        });
        self.name_idx.insert(obj, idx);
        idx
    }

    /// Relax edges until stable; returns the first growing cycle found.
    pub(crate) fn find_loop(&mut self) -> Option<InstanceLoop> {
        let n = self.vertices.len();
        let mut again = true;
        while again {
            again = false;
            for (i, edge) in self.edges.iter().enumerate() {
                let w = self.vertices[edge.src].weight + edge.weight;
                if w <= self.vertices[edge.dst].weight {
                    continue;
                }
                let len = self.vertices[edge.src].len + 1;
                let dst = &mut self.vertices[edge.dst];
                dst.pre = i;
                dst.len = len;
                if len == n {
                    return Some(self.instance_loop(edge.dst));
                }
                dst.weight = w;
                again = true;
            }
        }
        None
    }

    fn instance_loop(&self, mut v: usize) -> InstanceLoop {
        let mut stack = Vec::new();
        let mut seen = vec![false; self.vertices.len()];
        while !seen[v] {
            stack.push(v);
            seen[v] = true;
            v = self.edges[self.vertices[v].pre].src;
        }
        // trim the lead-in to the cycle proper
        let start = stack.iter().position(|&s| s == v).unwrap_or(0);
        let links = stack[start..]
            .iter()
            .map(|&v| {
                let edge = &self.edges[self.vertices[v].pre];
                LoopLink {
                    span: edge.span,
                    tparam: self.vertices[edge.dst].obj,
                    ty: edge.ty,
                }
            })
            .collect();
        InstanceLoop {
            start: self.vertices[v].obj,
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeParam;
    use crate::{Object, ObjectKind};

    fn type_param(world: &mut World, pkg: PackageId, name: &str) -> TypeId {
        let obj = world.new_object(Object::new(name, ObjectKind::TypeName, Span::dummy(), Some(pkg)));
        let ty = world.types.alloc(Type::TypeParam(TypeParam {
            obj,
            index: 0,
            bound: world.universe_any,
            id: 0,
        }));
        world.object_mut(obj).ty = Some(ty);
        ty
    }

    #[test]
    fn test_growing_self_instantiation_is_a_loop() {
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let p = type_param(&mut world, pkg, "P");
        let ptr = world.types.alloc(Type::Pointer { base: p });
        let mut mono = MonoGraph::default();
        mono.record_instance(&world, pkg, Span::dummy(), &[p], &[ptr], &[]);
        let found = mono.find_loop().expect("loop");
        assert_eq!(found.links.len(), 1);
        assert_eq!(found.links[0].ty, ptr);
        assert_eq!(world.object(found.start).name, "P");
    }

    #[test]
    fn test_identity_instantiation_is_fine() {
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let p = type_param(&mut world, pkg, "P");
        let q = type_param(&mut world, pkg, "Q");
        let mut mono = MonoGraph::default();
        mono.record_instance(&world, pkg, Span::dummy(), &[p], &[q], &[]);
        mono.record_instance(&world, pkg, Span::dummy(), &[q], &[p], &[]);
        assert_eq!(mono.find_loop(), None);
    }

    #[test]
    fn test_growing_two_step_cycle() {
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let p = type_param(&mut world, pkg, "P");
        let q = type_param(&mut world, pkg, "Q");
        let slice = world.types.alloc(Type::Slice { elem: q });
        let mut mono = MonoGraph::default();
        mono.record_instance(&world, pkg, Span::dummy(), &[q], &[p], &[]);
        mono.record_instance(&world, pkg, Span::dummy(), &[p], &[slice], &[]);
        let found = mono.find_loop().expect("loop");
        assert_eq!(found.links.len(), 2);
    }
}
