//! Underlying types, generic instantiation and constraint satisfaction
//!
//! Instances are created unexpanded: `T[int]` only gets an underlying type
//! once something asks for it, which lets a generic type mention its own
//! instances while it is being declared.

use std::collections::{HashMap, HashSet};

use xtypes_ast::Span;

use crate::lookup::Lookup;
use crate::types::{Interface, Named, Signature, Struct, Type, UnionTerm};
use crate::typeset::{Term, TermList, TypeSet};
use crate::{Checker, ObjectId, ObjectKind, TypeId};

/// Instance nesting followed by [`Checker::settle`]; deeper nesting only
/// comes from instantiation cycles, which are reported separately.
const MAX_SETTLE_DEPTH: usize = 64;

type SubstMap = [(TypeId, TypeId)];

impl<'a> Checker<'a> {
    /// The underlying type of `t`, resolving named types and expanding
    /// instances as needed. Type parameters yield their constraint
    /// interface.
    pub(crate) fn under(&mut self, t: TypeId) -> TypeId {
        match self.world.types.get(t) {
            Type::Named(_) => self.resolve_named(t).unwrap_or(TypeId::INVALID),
            Type::TypeParam(_) => self.tparam_iface(t),
            _ => t,
        }
    }

    /// Follow the chain `type A B; type B C; ...` from `n0` to a non-named
    /// type and record it as the underlying type of every link. Returns
    /// `None` while some link is still being declared.
    fn resolve_named(&mut self, n0: TypeId) -> Option<TypeId> {
        let mut path: Vec<TypeId> = Vec::new();
        let mut t = n0;
        while let Some((underlying, is_instance)) = self.world.types.named(t).map(|n| (n.underlying, n.origin.is_some())) {
            if let Some(i) = path.iter().position(|&p| p == t) {
                let cycle: Vec<ObjectId> = path[i..]
                    .iter()
                    .filter_map(|&p| self.world.types.named(p).map(|n| n.obj))
                    .collect();
                let start = self.first_in_src(&cycle);
                self.cycle_error(&cycle, start);
                self.set_underlying(&path, TypeId::INVALID);
                return Some(TypeId::INVALID);
            }
            path.push(t);
            t = match underlying {
                Some(u) => u,
                None if is_instance => {
                    let u = self.expand(t)?;
                    if let Some(n) = self.world.types.named_mut(t) {
                        n.underlying = Some(u);
                    }
                    u
                }
                None => return None,
            };
        }
        self.set_underlying(&path, t);
        Some(t)
    }

    fn set_underlying(&mut self, path: &[TypeId], u: TypeId) {
        for &p in path {
            if let Some(n) = self.world.types.named_mut(p) {
                n.underlying = Some(u);
            }
        }
    }

    /// Compute the underlying type of instance `inst` from its origin.
    fn expand(&mut self, inst: TypeId) -> Option<TypeId> {
        let (origin, targs) = {
            let n = self.world.types.named(inst)?;
            (n.origin?, n.type_args.clone())
        };
        let ou = self.resolve_named(origin)?;
        let tparams = self.world.types.named(origin).map(|n| n.type_params.clone()).unwrap_or_default();
        if tparams.len() != targs.len() {
            // reported where the instance was written
            return Some(TypeId::INVALID);
        }
        let smap: Vec<(TypeId, TypeId)> = tparams.into_iter().zip(targs).collect();
        Some(self.subst(ou, &smap))
    }

    /// The instance `orig[targs]`, shared through the context.
    pub(crate) fn instance(&mut self, orig: TypeId, targs: Vec<TypeId>) -> TypeId {
        if let Some(inst) = self.ctxt.lookup(orig, &targs) {
            return inst;
        }
        let Some(n) = self.world.types.named(orig) else {
            return TypeId::INVALID;
        };
        let mut named = Named::new(n.obj);
        named.type_params = n.type_params.clone();
        named.origin = Some(orig);
        named.type_args = targs.clone();
        let inst = self.world.types.alloc(Type::Named(named));
        self.ctxt.update(orig, &targs, inst)
    }

    /// Replace the type parameters in `t` according to `smap`. Unchanged
    /// types are returned as is; named types are not entered, only their
    /// type arguments.
    pub(crate) fn subst(&mut self, t: TypeId, smap: &SubstMap) -> TypeId {
        if smap.is_empty() {
            return t;
        }
        let mut cache = HashMap::new();
        self.subst0(t, smap, &mut cache)
    }

    fn subst0(&mut self, t: TypeId, smap: &SubstMap, cache: &mut HashMap<TypeId, TypeId>) -> TypeId {
        if let Some(&(_, to)) = smap.iter().find(|(from, _)| *from == t) {
            return to;
        }
        if let Some(&r) = cache.get(&t) {
            return r;
        }
        let r = match self.world.types.get(t).clone() {
            Type::Basic(_) | Type::TypeParam(_) => t,
            Type::Pointer { base } => {
                let b = self.subst0(base, smap, cache);
                self.alloc_if(b != base, t, Type::Pointer { base: b })
            }
            Type::Array { len, elem } => {
                let e = self.subst0(elem, smap, cache);
                self.alloc_if(e != elem, t, Type::Array { len, elem: e })
            }
            Type::Slice { elem } => {
                let e = self.subst0(elem, smap, cache);
                self.alloc_if(e != elem, t, Type::Slice { elem: e })
            }
            Type::Map { key, elem } => {
                let k = self.subst0(key, smap, cache);
                let e = self.subst0(elem, smap, cache);
                self.alloc_if(k != key || e != elem, t, Type::Map { key: k, elem: e })
            }
            Type::Chan { dir, elem } => {
                let e = self.subst0(elem, smap, cache);
                self.alloc_if(e != elem, t, Type::Chan { dir, elem: e })
            }
            Type::Struct(s) => {
                let (fields, changed) = self.subst_vars(&s.fields, smap, cache);
                self.alloc_if(changed, t, Type::Struct(Struct { fields, tags: s.tags }))
            }
            Type::Signature(sig) => {
                let (params, p_changed) = self.subst_vars(&sig.params, smap, cache);
                let (results, r_changed) = self.subst_vars(&sig.results, smap, cache);
                self.alloc_if(
                    p_changed || r_changed,
                    t,
                    Type::Signature(Signature {
                        params,
                        results,
                        ..sig
                    }),
                )
            }
            Type::Interface(iface) => {
                let mut changed = false;
                let mut methods = Vec::with_capacity(iface.methods.len());
                for &m in &iface.methods {
                    let sig = self.world.object(m).ty.unwrap_or(TypeId::INVALID);
                    let nsig = self.subst0(sig, smap, cache);
                    if nsig == sig {
                        methods.push(m);
                    } else {
                        let mut obj = self.world.object(m).clone();
                        obj.ty = Some(nsig);
                        methods.push(self.world.new_object(obj));
                        changed = true;
                    }
                }
                let embeddeds: Vec<TypeId> = iface.embeddeds.iter().map(|&e| self.subst0(e, smap, cache)).collect();
                changed |= embeddeds != iface.embeddeds;
                self.alloc_if(
                    changed,
                    t,
                    Type::Interface(Interface {
                        methods,
                        embeddeds,
                        embed_spans: iface.embed_spans,
                        is_comparable: iface.is_comparable,
                        implicit: iface.implicit,
                        tset: None,
                        computing: false,
                    }),
                )
            }
            Type::Union(terms) => {
                let new_terms: Vec<UnionTerm> = terms
                    .iter()
                    .map(|term| UnionTerm {
                        tilde: term.tilde,
                        ty: self.subst0(term.ty, smap, cache),
                    })
                    .collect();
                self.alloc_if(new_terms != terms, t, Type::Union(new_terms))
            }
            Type::Tuple(vars) => {
                let (vars, changed) = self.subst_vars(&vars, smap, cache);
                self.alloc_if(changed, t, Type::Tuple(vars))
            }
            Type::Named(n) => {
                if n.type_args.is_empty() {
                    t
                } else {
                    let args: Vec<TypeId> = n.type_args.iter().map(|&a| self.subst0(a, smap, cache)).collect();
                    if args == n.type_args {
                        t
                    } else {
                        self.instance(n.origin.unwrap_or(t), args)
                    }
                }
            }
        };
        cache.insert(t, r);
        r
    }

    fn alloc_if(&mut self, changed: bool, t: TypeId, ty: Type) -> TypeId {
        if changed {
            self.world.types.alloc(ty)
        } else {
            t
        }
    }

    pub(crate) fn subst_vars(
        &mut self,
        vars: &[ObjectId],
        smap: &SubstMap,
        cache: &mut HashMap<TypeId, TypeId>,
    ) -> (Vec<ObjectId>, bool) {
        let mut changed = false;
        let mut out = Vec::with_capacity(vars.len());
        for &v in vars {
            let ty = self.world.object(v).ty.unwrap_or(TypeId::INVALID);
            let nt = self.subst0(ty, smap, cache);
            if nt == ty {
                out.push(v);
            } else {
                let mut obj = self.world.object(v).clone();
                obj.ty = Some(nt);
                out.push(self.world.new_object(obj));
                changed = true;
            }
        }
        (out, changed)
    }

    /// The constraint interface of type parameter `t`. A non-interface
    /// bound such as `[P int]` is wrapped into an implicit interface the
    /// first time it is needed.
    pub(crate) fn tparam_iface(&mut self, t: TypeId) -> TypeId {
        let Some(tp) = self.world.types.type_param(t) else {
            return TypeId::INVALID;
        };
        let (bound, obj) = (tp.bound, tp.obj);
        if bound.is_invalid() || self.world.types.interface(bound).is_some() {
            return bound;
        }
        let u = self.under(bound);
        if u.is_invalid() || self.world.types.interface(u).is_some() {
            return u;
        }
        let span = self.world.object(obj).span;
        let iface = self.world.types.alloc(Type::Interface(Interface {
            embeddeds: vec![bound],
            embed_spans: vec![span],
            implicit: true,
            ..Interface::default()
        }));
        if let Some(tp) = self.world.types.type_param_mut(t) {
            tp.bound = iface;
        }
        self.compute_type_set(iface, span);
        iface
    }

    /// Make `t` ready for the structural predicates: expand the instances
    /// it contains by value, and compute the type sets of its interfaces
    /// and constraints.
    pub(crate) fn settle(&mut self, t: TypeId) {
        let mut seen = HashSet::new();
        self.settle0(t, true, 0, &mut seen);
    }

    fn settle0(&mut self, t: TypeId, by_value: bool, depth: usize, seen: &mut HashSet<(TypeId, bool)>) {
        if depth > MAX_SETTLE_DEPTH || !seen.insert((t, by_value)) {
            return;
        }
        let depth = depth + 1;
        match self.world.types.get(t).clone() {
            Type::Basic(_) => {}
            Type::Named(n) => {
                for a in n.type_args {
                    self.settle0(a, false, depth, seen);
                }
                if by_value {
                    let u = self.under(t);
                    self.settle0(u, true, depth, seen);
                }
            }
            Type::TypeParam(_) => {
                let iface = self.tparam_iface(t);
                self.settle0(iface, false, depth, seen);
            }
            Type::Interface(_) => {
                let tset = self.compute_type_set(t, Span::dummy());
                for ty in tset.terms.0.iter().filter_map(|term| term.ty) {
                    self.settle0(ty, true, depth, seen);
                }
                for m in tset.methods {
                    if let Some(sig) = self.world.object(m).ty {
                        self.settle0(sig, false, depth, seen);
                    }
                }
            }
            Type::Struct(s) => {
                for f in s.fields {
                    if let Some(ft) = self.world.object(f).ty {
                        self.settle0(ft, by_value, depth, seen);
                    }
                }
            }
            Type::Array { elem, .. } => self.settle0(elem, by_value, depth, seen),
            Type::Pointer { base: elem } | Type::Slice { elem } | Type::Chan { elem, .. } => {
                self.settle0(elem, false, depth, seen)
            }
            Type::Map { key, elem } => {
                self.settle0(key, false, depth, seen);
                self.settle0(elem, false, depth, seen);
            }
            Type::Signature(sig) => {
                for v in sig.params.into_iter().chain(sig.results) {
                    if let Some(vt) = self.world.object(v).ty {
                        self.settle0(vt, false, depth, seen);
                    }
                }
            }
            Type::Tuple(vars) => {
                for v in vars {
                    if let Some(vt) = self.world.object(v).ty {
                        self.settle0(vt, false, depth, seen);
                    }
                }
            }
            Type::Union(terms) => {
                for term in terms {
                    self.settle0(term.ty, true, depth, seen);
                }
            }
        }
    }

    /// Check that each type argument satisfies its type parameter's
    /// constraint. On failure, returns the index of the offending argument
    /// and the reason.
    pub(crate) fn verify(&mut self, tparams: &[TypeId], targs: &[TypeId]) -> Result<(), (usize, String)> {
        let smap: Vec<(TypeId, TypeId)> = tparams.iter().copied().zip(targs.iter().copied()).collect();
        for (i, (&tp, &targ)) in tparams.iter().zip(targs).enumerate() {
            let iface = self.tparam_iface(tp);
            if iface.is_invalid() {
                continue;
            }
            // bounds may mention other type parameters of the same list
            let bound = self.world.types.type_param(tp).map_or(iface, |p| p.bound);
            let bound = self.subst(bound, &smap);
            let mut cause = String::new();
            if !self.implements(targ, bound, true, Some(&mut cause)) {
                return Err((i, cause));
            }
        }
        Ok(())
    }

    /// Reports whether `v` implements interface `t`; with `constraint` set,
    /// whether `v` satisfies constraint `t`. On failure `cause` receives
    /// the reason.
    pub(crate) fn implements(&mut self, v: TypeId, t: TypeId, constraint: bool, mut cause: Option<&mut String>) -> bool {
        self.settle(v);
        self.settle(t);
        let vu = self.under(v);
        let tu = self.under(t);
        if vu.is_invalid() || tu.is_invalid() {
            return true;
        }
        if let Type::Pointer { base } = *self.world.types.get(vu) {
            if self.under(base).is_invalid() {
                return true;
            }
        }

        let verb = if constraint { "satisfy" } else { "implement" };
        if self.world.types.interface(tu).is_none() {
            set_cause(&mut cause, || format!("{} is not an interface", self.ts(t)));
            return false;
        }
        let ti = self.compute_type_set(tu, Span::dummy());
        if ti.is_all() {
            return true;
        }
        if ti.is_empty() {
            set_cause(&mut cause, || format!("cannot {verb} {} (empty type set)", self.ts(t)));
            return false;
        }

        let vi = match self.world.types.interface(vu) {
            Some(_) => Some(self.compute_type_set(vu, Span::dummy())),
            None => None,
        };
        // an empty type set implements everything
        if vi.as_ref().is_some_and(TypeSet::is_empty) {
            return true;
        }

        let mut why = String::new();
        if self.missing_method(v, &ti, &mut why).is_some() {
            set_cause(&mut cause, || format!("{} does not {verb} {} {why}", self.ts(v), self.ts(t)));
            return false;
        }

        if let Some(vi) = vi {
            if !vi.terms.subset_of(&ti.terms, self.world) {
                set_cause(&mut cause, || format!("{} does not {verb} {}", self.ts(v), self.ts(t)));
                return false;
            }
            return self.check_comparability(v, &ti, constraint, verb, cause);
        }

        if ti.terms.is_all() {
            return self.check_comparability(v, &ti, constraint, verb, cause);
        }

        if !ti.terms.includes(v, self.world) {
            // suggest `~T` when `v` is in `~T` but not in `T`
            let alt = ti.terms.0.iter().find_map(|term| {
                let tt = term.ty?;
                let plain = !term.tilde && self.world.identical(tt, self.world.types.under(tt));
                (plain && Term::new(true, tt).includes(v, self.world)).then_some(tt)
            });
            let detail = match alt {
                Some(alt) => format!("possibly missing ~ for {} in {}", self.ts(alt), self.ts(t)),
                None => format!("{} missing in {}", self.ts(v), self.terms_string(&ti.terms)),
            };
            set_cause(&mut cause, || format!("{} does not {verb} {} ({detail})", self.ts(v), self.ts(t)));
            return false;
        }
        self.check_comparability(v, &ti, constraint, verb, cause)
    }

    fn check_comparability(
        &mut self,
        v: TypeId,
        ti: &TypeSet,
        constraint: bool,
        verb: &str,
        mut cause: Option<&mut String>,
    ) -> bool {
        if !ti.is_comparable(self.world, &mut Vec::new()) {
            return true;
        }
        if self.strictly_comparable(v) {
            return true;
        }
        // ordinary interfaces satisfy comparable as constraints
        if constraint && self.world.comparable(v) {
            return true;
        }
        set_cause(&mut cause, || format!("{} does not {verb} comparable", self.ts(v)));
        false
    }

    /// Comparable without the possibility of a run-time panic: interfaces
    /// other than comparable type parameters do not qualify.
    pub(crate) fn strictly_comparable(&mut self, t: TypeId) -> bool {
        self.settle(t);
        self.strict0(t, &mut Vec::new())
    }

    fn strict0(&self, t: TypeId, seen: &mut Vec<TypeId>) -> bool {
        if seen.contains(&t) {
            return true;
        }
        seen.push(t);
        if self.world.types.type_param(t).is_some() {
            return self.world.comparable(t);
        }
        let u = self.world.types.under(t);
        match self.world.types.get(u) {
            Type::Basic(kind) => *kind != crate::BasicKind::UntypedNil,
            Type::Pointer { .. } | Type::Chan { .. } => true,
            Type::Struct(s) => s
                .fields
                .iter()
                .all(|&f| self.world.object(f).ty.is_some_and(|ft| self.strict0(ft, seen))),
            Type::Array { elem, .. } => self.strict0(*elem, seen),
            _ => false,
        }
    }

    /// The first method of type set `ti` that `v` lacks or has with the
    /// wrong signature; `cause` explains the mismatch.
    pub(crate) fn missing_method(&mut self, v: TypeId, ti: &TypeSet, cause: &mut String) -> Option<ObjectId> {
        if ti.methods.is_empty() {
            return None;
        }
        let vu = self.under(v);
        let vset = match self.world.types.interface(vu) {
            Some(_) => Some(self.compute_type_set(vu, Span::dummy())),
            None => None,
        };
        let (_, v_is_ptr) = self.deref(v);

        for &m in &ti.methods {
            let name = self.world.object(m).name.clone();
            let want = self.world.object(m).ty.unwrap_or(TypeId::INVALID);
            let mut ptr_only = false;
            let found = match &vset {
                Some(vset) => vset
                    .lookup_method(&name, self.world)
                    .map(|f| self.world.object(f).ty.unwrap_or(TypeId::INVALID)),
                None => {
                    let pkg = self.world.object(m).pkg.unwrap_or(self.pkg);
                    match self.lookup_field_or_method(v, &name, pkg) {
                        Lookup::Found(s) if s.is_method => {
                            let ptr_recv = matches!(self.world.object(s.obj).kind, ObjectKind::Func { has_ptr_recv: true });
                            ptr_only = ptr_recv && !s.indirect && !v_is_ptr;
                            Some(s.ty)
                        }
                        Lookup::Found(_) => {
                            *cause = format!("({name} is a field, not a method)");
                            return Some(m);
                        }
                        _ => None,
                    }
                }
            };
            let Some(have) = found else {
                *cause = format!("(missing method {name})");
                return Some(m);
            };
            self.settle(have);
            self.settle(want);
            if !self.world.identical(have, want) {
                *cause = format!(
                    "(wrong type for method {name})\n\t\thave {name}{}\n\t\twant {name}{}",
                    self.sig_string(have),
                    self.sig_string(want)
                );
                return Some(m);
            }
            if ptr_only {
                *cause = format!("(method {name} has pointer receiver)");
                return Some(m);
            }
        }
        None
    }

    fn sig_string(&self, sig: TypeId) -> String {
        let s = self.ts(sig);
        s.strip_prefix("func").map_or(s.clone(), str::to_string)
    }

    pub(crate) fn terms_string(&self, terms: &TermList) -> String {
        if terms.is_empty() {
            return "∅".to_string();
        }
        if terms.is_all() {
            return "𝓤".to_string();
        }
        terms
            .0
            .iter()
            .filter_map(|term| {
                let ty = self.ts(term.ty?);
                Some(if term.tilde { format!("~{ty}") } else { ty })
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

fn set_cause(cause: &mut Option<&mut String>, msg: impl FnOnce() -> String) {
    if let Some(c) = cause.as_deref_mut() {
        *c = msg();
    }
}
