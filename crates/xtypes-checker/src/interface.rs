//! Interface types, union elements and type set computation

use std::collections::HashMap;

use xtypes_ast::{BinaryOp, Expr, ExprKind, InterfaceType, Span, UnaryOp};

use crate::errors::Diagnostic;
use crate::info::Mode;
use crate::types::{Interface, Signature, Type, UnionTerm};
use crate::typeset::{Term, TermList, TypeSet};
use crate::{Checker, Code, GoVersion, Object, ObjectId, ObjectKind, TypeId, VarKind};

/// Bound on the number of terms in one union
const MAX_TERM_COUNT: usize = 100;

impl<'a> Checker<'a> {
    /// Fill in interface `t` from its literal. `def` is the defined type
    /// being declared, used as the receiver type of the methods.
    pub(crate) fn interface_type(&mut self, t: TypeId, it: &'a InterfaceType, def: Option<TypeId>) {
        let mut methods = Vec::new();
        let mut embeddeds = Vec::new();
        let mut embed_spans = Vec::new();

        for f in &it.elems {
            let Some(name) = f.names.first() else {
                let et = self.parse_union(&f.ty);
                if !et.is_invalid() {
                    embeddeds.push(et);
                    embed_spans.push(f.ty.span);
                }
                continue;
            };

            if name.is_blank() {
                self.error(name.span(), Code::BlankIfaceMethod, "methods must have a unique non-blank name");
                continue;
            }
            let ExprKind::FuncType(ft) = &f.ty.kind else {
                self.invalid_ast(f.ty.span, format!("{} is not a method signature", f.ty));
                continue;
            };
            if let Some(tp) = ft.type_params.first() {
                self.error(tp.span, Code::InvalidMethodTypeParams, "methods cannot have type parameters");
            }

            let sig = self.world.types.alloc(Type::Signature(Signature::default()));
            self.func_type(sig, None, ft, f.id, f.span);
            let recv_kind = ObjectKind::Var(VarKind {
                is_param: true,
                ..VarKind::default()
            });
            let recv = self.new_field(String::new(), recv_kind, name.span(), def.unwrap_or(t));
            if let Some(s) = self.world.types.signature_mut(sig) {
                s.recv = Some(recv);
            }

            let mut m = Object::new(name.name.clone(), ObjectKind::Func { has_ptr_recv: false }, name.span(), Some(self.pkg));
            m.ty = Some(sig);
            m.set_color(crate::object::Color::Done);
            let m = self.world.new_object(m);
            self.record_def(name, Some(m));
            methods.push(m);
        }

        let empty = methods.is_empty() && embeddeds.is_empty();
        if let Some(iface) = self.world.types.interface_mut(t) {
            iface.methods = methods;
            iface.embeddeds = embeddeds;
            iface.embed_spans = embed_spans;
            if empty {
                iface.tset = Some(TypeSet::all());
            }
        }
        if empty {
            return;
        }

        // embedded types may still be incomplete; compute the type set once
        // the current declarations are done
        self.cleaners.push(t);
        let span = it_span(it);
        self.later_described(
            move || "compute interface type set".to_string(),
            move |c| {
                c.compute_type_set(t, span);
            },
        );
    }

    /// The implicit interface of a constraint written as a bare union or
    /// `~T` term, as in `[P ~int | ~string]`.
    pub(crate) fn implicit_interface(&mut self, e: &'a Expr) -> TypeId {
        let t = self.world.types.alloc(Type::Interface(Interface {
            implicit: true,
            ..Interface::default()
        }));
        let et = self.parse_union(e);
        if !et.is_invalid() {
            if let Some(iface) = self.world.types.interface_mut(t) {
                iface.embeddeds.push(et);
                iface.embed_spans.push(e.span);
            }
        }
        self.cleaners.push(t);
        let span = e.span;
        self.later(move |c| {
            c.compute_type_set(t, span);
        });
        t
    }

    /// Evaluate an embedded interface element `A | ~B | ...`. A single
    /// plain term evaluates to that type.
    fn parse_union(&mut self, e: &'a Expr) -> TypeId {
        let mut tlist = Vec::new();
        flatten_union(e, &mut tlist);

        let mut terms: Vec<UnionTerm> = Vec::with_capacity(tlist.len());
        for &x in &tlist {
            let (tilde, ty) = self.parse_tilde(x);
            if tlist.len() == 1 && !tilde {
                // single type: embedded as is
                return ty;
            }
            terms.push(UnionTerm { tilde, ty });
        }
        if terms.len() > MAX_TERM_COUNT {
            self.error(
                e.span,
                Code::InvalidUnion,
                format!("cannot handle more than {MAX_TERM_COUNT} union terms (implementation limitation)"),
            );
            return TypeId::INVALID;
        }

        let u = self.world.types.alloc(Type::Union(terms.clone()));
        self.record_type_and_value(e, Mode::TypeExpr, u, None);

        // term validity depends on underlying types that may not be known yet
        self.later_described(
            move || format!("check union {e}"),
            move |c| c.check_union_terms(&tlist, &terms),
        );
        u
    }

    fn check_union_terms(&mut self, tlist: &[&'a Expr], terms: &[UnionTerm]) {
        for (i, term) in terms.iter().enumerate() {
            if term.ty.is_invalid() {
                continue;
            }
            let x = tlist[i];
            let u = self.under(term.ty);
            let is_iface = self.world.types.interface(u).is_some();
            if term.tilde {
                if is_iface {
                    self.error(
                        x.span,
                        Code::InvalidUnion,
                        format!("invalid use of ~ ({} is an interface)", self.ts(term.ty)),
                    );
                    continue;
                }
                if !self.world.identical(u, term.ty) {
                    self.error(
                        x.span,
                        Code::InvalidUnion,
                        format!("invalid use of ~ (underlying type of {} is {})", self.ts(term.ty), self.ts(u)),
                    );
                    continue;
                }
            }

            if is_iface {
                let tset = self.compute_type_set(u, x.span);
                let name = self.union_term_string(term);
                if !tset.methods.is_empty() {
                    self.error(x.span, Code::InvalidUnion, format!("cannot use {name} in union ({name} contains methods)"));
                } else if term.ty == self.world.universe_comparable {
                    self.error(x.span, Code::InvalidUnion, "cannot use comparable in union");
                } else if tset.comparable {
                    self.error(x.span, Code::InvalidUnion, format!("cannot use {name} in union ({name} embeds comparable)"));
                }
                // interface terms may overlap
                continue;
            }

            if let Some(j) = self.overlapping_term(&terms[..i], term) {
                let (a, b) = (self.union_term_string(term), self.union_term_string(&terms[j]));
                self.soft_error(x.span, Code::InvalidUnion, format!("overlapping terms {a} and {b}"));
            }
        }
    }

    /// Index of the first non-interface term in `terms` that overlaps `y`.
    fn overlapping_term(&mut self, terms: &[UnionTerm], y: &UnionTerm) -> Option<usize> {
        let yt = Term::new(y.tilde, y.ty);
        for (i, x) in terms.iter().enumerate() {
            if x.ty.is_invalid() {
                continue;
            }
            let u = self.under(x.ty);
            if self.world.types.interface(u).is_some() {
                continue;
            }
            if !Term::new(x.tilde, x.ty).disjoint(&yt, self.world) {
                return Some(i);
            }
        }
        None
    }

    fn union_term_string(&self, term: &UnionTerm) -> String {
        let ty = self.ts(term.ty);
        if term.tilde {
            format!("~{ty}")
        } else {
            ty
        }
    }

    fn parse_tilde(&mut self, x: &'a Expr) -> (bool, TypeId) {
        let (tilde, inner) = match &x.kind {
            ExprKind::Unary { op: UnaryOp::Tilde, x: inner } => (true, &**inner),
            _ => (false, x),
        };
        let mut ty = self.typ(inner);
        // a lone type parameter cannot be embedded
        if self.world.types.type_param(ty).is_some() {
            if tilde {
                self.error(
                    inner.span,
                    Code::MisplacedTypeParam,
                    format!("type in term {x} cannot be a type parameter"),
                );
            } else {
                self.error(inner.span, Code::MisplacedTypeParam, "term cannot be a type parameter");
            }
            ty = TypeId::INVALID;
        }
        if tilde {
            let u = self.world.types.alloc(Type::Union(vec![UnionTerm { tilde, ty }]));
            self.record_type_and_value(x, Mode::TypeExpr, u, None);
        }
        (tilde, ty)
    }

    /// The type set of interface `t`, computed on first use. `span` locates
    /// errors about the interface as a whole.
    pub(crate) fn compute_type_set(&mut self, t: TypeId, span: Span) -> TypeSet {
        let Some(iface) = self.world.types.interface(t) else {
            return TypeSet::all();
        };
        if let Some(tset) = &iface.tset {
            return tset.clone();
        }
        if iface.computing {
            // an interface embedding itself; the cycle is reported elsewhere
            return TypeSet::all();
        }
        let methods = iface.methods.clone();
        let embeddeds = iface.embeddeds.clone();
        let embed_spans = iface.embed_spans.clone();
        let is_comparable = iface.is_comparable;
        if let Some(iface) = self.world.types.interface_mut(t) {
            iface.computing = true;
        }

        let mut seen: HashMap<String, ObjectId> = HashMap::new();
        let mut all_methods: Vec<ObjectId> = Vec::new();
        for m in methods {
            self.add_method(&mut seen, &mut all_methods, m, true);
        }

        let mut tset = TypeSet {
            methods: Vec::new(),
            terms: TermList::all(),
            comparable: is_comparable,
        };
        for (i, &e) in embeddeds.iter().enumerate() {
            let espan = embed_spans.get(i).copied().unwrap_or(span);
            let u = self.under(e);
            let (terms, comparable) = match self.world.types.get(u) {
                _ if u.is_invalid() => continue,
                Type::Interface(_) => {
                    let etset = self.compute_type_set(u, espan);
                    if !etset.is_method_set()
                        && !self.verify_version(espan, GoVersion::GO1_18, &format!("embedding constraint interface {}", self.ts(e)))
                    {
                        continue;
                    }
                    for &m in &etset.methods {
                        self.add_method(&mut seen, &mut all_methods, m, false);
                    }
                    (etset.terms, etset.comparable)
                }
                Type::Union(union) => {
                    let union = union.clone();
                    if !self.verify_version(espan, GoVersion::GO1_18, &format!("embedding interface element {}", self.ts(e))) {
                        continue;
                    }
                    (self.compute_union_type_set(&union), false)
                }
                _ => {
                    if !self.verify_version(espan, GoVersion::GO1_18, &format!("embedding non-interface type {}", self.ts(e))) {
                        continue;
                    }
                    (TermList(vec![Term::new(false, e)]), false)
                }
            };
            tset.intersect_terms(&terms, comparable, self.world);
        }

        all_methods.sort_by(|&a, &b| self.world.object(a).name.cmp(&self.world.object(b).name));
        tset.methods = all_methods;
        if let Some(iface) = self.world.types.interface_mut(t) {
            iface.computing = false;
            iface.tset = Some(tset.clone());
        }
        tset
    }

    fn add_method(&mut self, seen: &mut HashMap<String, ObjectId>, all: &mut Vec<ObjectId>, m: ObjectId, explicit: bool) {
        let (name, span) = {
            let o = self.world.object(m);
            (o.name.clone(), o.span)
        };
        let Some(&other) = seen.get(&name) else {
            seen.insert(name, m);
            all.push(m);
            return;
        };
        if explicit {
            let diag = Diagnostic::new(span, Code::DuplicateDecl, format!("duplicate method {name}"))
                .related(self.world.object(other).span, format!("other declaration of {name}"));
            self.report(diag);
            return;
        }
        // the same method may arrive through several embedded interfaces
        self.later(move |c| {
            let (a, b) = (c.world.object(m).ty, c.world.object(other).ty);
            if let (Some(a), Some(b)) = (a, b) {
                c.settle(a);
                c.settle(b);
                if c.world.identical(a, b) {
                    return;
                }
            }
            let diag = Diagnostic::new(span, Code::DuplicateDecl, format!("duplicate method {name}"))
                .related(c.world.object(other).span, format!("other declaration of {name}"));
            c.report(diag);
        });
    }

    /// The terms of a union; interface terms contribute their own terms.
    fn compute_union_type_set(&mut self, terms: &[UnionTerm]) -> TermList {
        let mut all = TermList::empty();
        for term in terms {
            if term.ty.is_invalid() {
                continue;
            }
            let u = self.under(term.ty);
            let list = if self.world.types.interface(u).is_some() {
                self.compute_type_set(u, Span::dummy()).terms
            } else {
                TermList(vec![Term::new(term.tilde, term.ty)])
            };
            all = all.union(&list, self.world);
        }
        all
    }
}

/// Split `a | b | c` into its terms, left to right.
fn flatten_union<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
    match &e.kind {
        ExprKind::Binary { op: BinaryOp::Or, x, y } => {
            flatten_union(x, out);
            flatten_union(y, out);
        }
        _ => out.push(e),
    }
}

fn it_span(it: &InterfaceType) -> Span {
    match (it.elems.first(), it.elems.last()) {
        (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
        _ => Span::dummy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtypes_ast::AstBuilder;

    #[test]
    fn test_flatten_union_keeps_source_order() {
        let b = AstBuilder::new();
        let e = b.union(vec![b.name("A"), b.tilde(b.name("B")), b.name("C")]);
        let mut out = Vec::new();
        flatten_union(&e, &mut out);
        let names: Vec<String> = out.iter().map(|x| x.to_string()).collect();
        assert_eq!(names, ["A", "~B", "C"]);
    }
}
