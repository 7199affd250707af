//! Interface type sets and the term algebra behind them
//!
//! A term is `T` (just the type `T`), `~T` (every type whose underlying type
//! is `T`) or the universe of all types. A [`TermList`] is a union of terms;
//! the empty list denotes the empty set. Term operations look at underlying
//! types, so instances among the terms must already be expanded.

use crate::{ObjectId, TypeId, World};

/// A single constraint term; `ty == None` is the set of all types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    pub tilde: bool,
    pub ty: Option<TypeId>,
}

impl Term {
    pub const UNIVERSE: Term = Term { tilde: false, ty: None };

    pub fn new(tilde: bool, ty: TypeId) -> Self {
        Self { tilde, ty: Some(ty) }
    }

    pub(crate) fn disjoint(&self, y: &Term, world: &World) -> bool {
        let (Some(x_ty), Some(y_ty)) = (self.ty, y.ty) else {
            return false;
        };
        let ux = if y.tilde { world.types.under(x_ty) } else { x_ty };
        let uy = if self.tilde { world.types.under(y_ty) } else { y_ty };
        !world.identical(ux, uy)
    }

    /// `x ∪ y`; returns a second term when the two are disjoint.
    pub fn union(self, y: Term, world: &World) -> (Term, Option<Term>) {
        if self.ty.is_none() {
            return (self, None);
        }
        if y.ty.is_none() {
            return (y, None);
        }
        if self.disjoint(&y, world) {
            return (self, Some(y));
        }
        // ~t ∪ ~t == ~t, ~t ∪ T == ~t, T ∪ ~t == ~t, T ∪ T == T
        if self.tilde || !y.tilde {
            (self, None)
        } else {
            (y, None)
        }
    }

    /// `x ∩ y`; `None` is the empty set.
    pub fn intersect(self, y: Term, world: &World) -> Option<Term> {
        if self.ty.is_none() {
            return Some(y);
        }
        if y.ty.is_none() {
            return Some(self);
        }
        if self.disjoint(&y, world) {
            return None;
        }
        // ~t ∩ ~t == ~t, ~t ∩ T == T, T ∩ ~t == T, T ∩ T == T
        if !self.tilde || y.tilde {
            Some(self)
        } else {
            Some(y)
        }
    }

    /// Reports whether `t ∈ x`.
    pub fn includes(&self, t: TypeId, world: &World) -> bool {
        match self.ty {
            None => true,
            Some(ty) => {
                let u = if self.tilde { world.types.under(t) } else { t };
                world.identical(ty, u)
            }
        }
    }

    /// Reports whether `x ⊆ y`.
    pub fn subset_of(&self, y: &Term, world: &World) -> bool {
        if y.ty.is_none() {
            return true;
        }
        if self.ty.is_none() || self.disjoint(y, world) {
            return false;
        }
        !self.tilde || y.tilde
    }
}

/// A union of terms in normal form (no two terms overlap)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermList(pub Vec<Term>);

impl TermList {
    pub fn all() -> Self {
        TermList(vec![Term::UNIVERSE])
    }

    pub fn empty() -> Self {
        TermList(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.0.iter().any(|t| t.ty.is_none())
    }

    /// Merge overlapping terms. A merge can widen a term so that it now
    /// covers terms kept earlier, so passes repeat until nothing merges.
    pub fn norm(&self, world: &World) -> TermList {
        if self.is_all() {
            return TermList::all();
        }
        let mut terms = self.0.clone();
        loop {
            let merged = Self::merge_pass(&terms, world);
            if merged.len() == terms.len() {
                return TermList(merged);
            }
            terms = merged;
        }
    }

    fn merge_pass(terms: &[Term], world: &World) -> Vec<Term> {
        let mut out: Vec<Term> = Vec::with_capacity(terms.len());
        'terms: for &t in terms {
            for r in out.iter_mut() {
                if let (u, None) = r.union(t, world) {
                    *r = u;
                    continue 'terms;
                }
            }
            out.push(t);
        }
        out
    }

    pub fn union(&self, y: &TermList, world: &World) -> TermList {
        let mut terms = self.0.clone();
        terms.extend_from_slice(&y.0);
        TermList(terms).norm(world)
    }

    pub fn intersect(&self, y: &TermList, world: &World) -> TermList {
        if self.is_empty() || y.is_empty() {
            return TermList::empty();
        }
        if self.is_all() {
            return y.clone();
        }
        if y.is_all() {
            return self.clone();
        }
        let terms = self
            .0
            .iter()
            .flat_map(|x| y.0.iter().filter_map(move |t| x.intersect(*t, world)))
            .collect();
        TermList(terms).norm(world)
    }

    pub fn includes(&self, t: TypeId, world: &World) -> bool {
        self.0.iter().any(|term| term.includes(t, world))
    }

    /// Reports whether every term of `self` lies within some term of `y`.
    pub fn subset_of(&self, y: &TermList, world: &World) -> bool {
        if y.is_all() || self.is_empty() {
            return true;
        }
        self.0
            .iter()
            .all(|x| y.0.iter().any(|t| x.subset_of(t, world)))
    }

    pub fn equal(&self, y: &TermList, world: &World) -> bool {
        self.subset_of(y, world) && y.subset_of(self, world)
    }
}

/// The type set of an interface: its methods, permitted types and whether
/// it is restricted to comparable types.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSet {
    /// Sorted by name, without duplicates
    pub methods: Vec<ObjectId>,
    pub terms: TermList,
    /// Comparability filter; when set, `terms` is the universe
    pub comparable: bool,
}

impl TypeSet {
    /// The set of all types (the empty interface).
    pub fn all() -> Self {
        Self {
            methods: Vec::new(),
            terms: TermList::all(),
            comparable: false,
        }
    }

    /// No methods, no type restrictions: `interface{}`.
    pub fn is_all(&self) -> bool {
        self.is_method_set() && self.methods.is_empty()
    }

    /// Fully described by its methods; usable as an ordinary type.
    pub fn is_method_set(&self) -> bool {
        !self.comparable && self.terms.is_all()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Reports whether every type in the set is comparable.
    pub(crate) fn is_comparable(&self, world: &World, seen: &mut Vec<TypeId>) -> bool {
        if self.terms.is_all() {
            return self.comparable;
        }
        self.terms
            .0
            .iter()
            .all(|t| t.ty.is_some_and(|ty| world.comparable_seen(ty, seen)))
    }

    /// Reports whether `t` is in the term part of the set (methods and
    /// comparability are checked separately).
    pub fn includes(&self, t: TypeId, world: &World) -> bool {
        self.terms.includes(t, world)
    }

    pub fn lookup_method(&self, name: &str, world: &World) -> Option<ObjectId> {
        self.methods
            .binary_search_by(|&m| world.object(m).name.as_str().cmp(name))
            .ok()
            .map(|i| self.methods[i])
    }

    /// Intersect with `other`; the comparability flag only survives while
    /// the terms stay universal.
    pub(crate) fn intersect_terms(&mut self, terms: &TermList, comparable: bool, world: &World) {
        let comparable = self.comparable || comparable;
        self.terms = self.terms.intersect(terms, world);
        self.comparable = comparable && self.terms.is_all();
        if !self.terms.is_all() && comparable {
            // keep only comparable terms
            let kept = self
                .terms
                .0
                .iter()
                .copied()
                .filter(|t| t.ty.is_some_and(|ty| world.comparable(ty)))
                .collect();
            self.terms = TermList(kept);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Named, Type};

    fn my_int(world: &mut World) -> TypeId {
        let mut named = Named::new(ObjectId(0));
        named.underlying = Some(TypeId::INT);
        world.types.alloc(Type::Named(named))
    }

    #[test]
    fn test_tilde_includes_defined_types() {
        let mut world = World::new();
        let my = my_int(&mut world);
        assert!(Term::new(true, TypeId::INT).includes(my, &world));
        assert!(!Term::new(false, TypeId::INT).includes(my, &world));
        assert!(Term::UNIVERSE.includes(my, &world));
    }

    #[test]
    fn test_union_absorbs_subsets() {
        let mut world = World::new();
        let my = my_int(&mut world);
        let list = TermList(vec![Term::new(false, my), Term::new(true, TypeId::INT)]).norm(&world);
        assert_eq!(list, TermList(vec![Term::new(true, TypeId::INT)]));
        let list = TermList(vec![Term::new(false, TypeId::INT), Term::new(false, TypeId::STRING)]).norm(&world);
        assert_eq!(list.0.len(), 2);
    }

    #[test]
    fn test_widened_term_absorbs_earlier_terms() {
        let mut world = World::new();
        let (a, b) = (my_int(&mut world), my_int(&mut world));
        let list = TermList(vec![Term::new(false, a), Term::new(false, b), Term::new(true, TypeId::INT)]);
        assert_eq!(list.norm(&world), TermList(vec![Term::new(true, TypeId::INT)]));
    }

    #[test]
    fn test_intersection() {
        let world = World::new();
        let ints = TermList(vec![Term::new(true, TypeId::INT), Term::new(false, TypeId::STRING)]);
        let exact = TermList(vec![Term::new(false, TypeId::INT)]);
        assert_eq!(ints.intersect(&exact, &world), exact);
        let floats = TermList(vec![Term::new(false, TypeId::FLOAT64)]);
        assert!(ints.intersect(&floats, &world).is_empty());
        assert_eq!(TermList::all().intersect(&floats, &world), floats);
    }

    #[test]
    fn test_is_all_implies_method_set() {
        let all = TypeSet::all();
        assert!(all.is_all());
        assert!(all.is_method_set());
        assert!(all.methods.is_empty());

        let comparable = TypeSet {
            methods: Vec::new(),
            terms: TermList::all(),
            comparable: true,
        };
        assert!(!comparable.is_all());
        assert!(!comparable.is_method_set());
        assert!(comparable.terms.is_all());
    }

    #[test]
    fn test_comparable_filter_drops_incomparable_terms() {
        let mut world = World::new();
        let slice = world.types.alloc(Type::Slice { elem: TypeId::INT });
        let mut set = TypeSet {
            methods: Vec::new(),
            terms: TermList(vec![Term::new(false, TypeId::INT), Term::new(false, slice)]),
            comparable: false,
        };
        set.intersect_terms(&TermList::all(), true, &world);
        assert_eq!(set.terms, TermList(vec![Term::new(false, TypeId::INT)]));
        assert!(!set.comparable);
    }
}
