//! Type predicates: identity, comparability and friends

use crate::types::Type;
use crate::{TypeId, World};

impl World {
    /// Reports whether `x` and `y` are identical types.
    ///
    /// Defined types are identical only to themselves; instances are
    /// identical when they share an origin and their type arguments are
    /// identical.
    pub fn identical(&self, x: TypeId, y: TypeId) -> bool {
        self.identical0(x, y, false)
    }

    /// Like [`identical`](Self::identical), but struct tags are ignored.
    pub fn identical_ignore_tags(&self, x: TypeId, y: TypeId) -> bool {
        self.identical0(x, y, true)
    }

    fn identical0(&self, x: TypeId, y: TypeId, ignore_tags: bool) -> bool {
        if x == y {
            return true;
        }
        let vars = |a: &[crate::ObjectId], b: &[crate::ObjectId]| {
            a.len() == b.len()
                && a.iter().zip(b).all(|(&a, &b)| {
                    let (ta, tb) = (self.object(a).ty, self.object(b).ty);
                    match (ta, tb) {
                        (Some(ta), Some(tb)) => self.identical0(ta, tb, ignore_tags),
                        _ => false,
                    }
                })
        };
        match (self.types.get(x), self.types.get(y)) {
            (Type::Basic(a), Type::Basic(b)) => a == b,
            (Type::Pointer { base: a }, Type::Pointer { base: b }) => self.identical0(*a, *b, ignore_tags),
            (Type::Slice { elem: a }, Type::Slice { elem: b }) => self.identical0(*a, *b, ignore_tags),
            (Type::Array { len: la, elem: a }, Type::Array { len: lb, elem: b }) => {
                la.is_some() && la == lb && self.identical0(*a, *b, ignore_tags)
            }
            (Type::Map { key: ka, elem: a }, Type::Map { key: kb, elem: b }) => {
                self.identical0(*ka, *kb, ignore_tags) && self.identical0(*a, *b, ignore_tags)
            }
            (Type::Chan { dir: da, elem: a }, Type::Chan { dir: db, elem: b }) => {
                da == db && self.identical0(*a, *b, ignore_tags)
            }
            (Type::Struct(a), Type::Struct(b)) => {
                (ignore_tags || a.tags == b.tags)
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(&fa, &fb)| {
                        let (oa, ob) = (self.object(fa), self.object(fb));
                        oa.name == ob.name && oa.kind == ob.kind
                    })
                    && vars(&a.fields, &b.fields)
            }
            (Type::Signature(a), Type::Signature(b)) => {
                a.type_params.len() == b.type_params.len()
                    && a.variadic == b.variadic
                    && vars(&a.params, &b.params)
                    && vars(&a.results, &b.results)
            }
            (Type::Interface(a), Type::Interface(b)) => match (&a.tset, &b.tset) {
                (Some(sa), Some(sb)) => {
                    sa.comparable == sb.comparable
                        && sa.methods.len() == sb.methods.len()
                        && sa.methods.iter().zip(&sb.methods).all(|(&ma, &mb)| {
                            self.object(ma).name == self.object(mb).name && vars(&[ma], &[mb])
                        })
                        && sa.terms.equal(&sb.terms, self)
                }
                _ => false,
            },
            (Type::Named(a), Type::Named(b)) => match (a.origin, b.origin) {
                (Some(oa), Some(ob)) => {
                    oa == ob
                        && a.type_args.len() == b.type_args.len()
                        && a.type_args
                            .iter()
                            .zip(&b.type_args)
                            .all(|(&ta, &tb)| self.identical0(ta, tb, ignore_tags))
                }
                _ => false,
            },
            (Type::Union(a), Type::Union(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(ta, tb)| ta.tilde == tb.tilde && self.identical0(ta.ty, tb.ty, ignore_tags))
            }
            (Type::Tuple(a), Type::Tuple(b)) => vars(a, b),
            _ => false,
        }
    }

    /// Reports whether values of type `t` may be compared with `==`.
    ///
    /// Interfaces count as comparable (comparison may fail at run time);
    /// type parameters are comparable if every type in their constraint's
    /// type set is.
    pub fn comparable(&self, t: TypeId) -> bool {
        self.comparable_seen(t, &mut Vec::new())
    }

    pub(crate) fn comparable_seen(&self, t: TypeId, seen: &mut Vec<TypeId>) -> bool {
        if seen.contains(&t) {
            return true;
        }
        seen.push(t);
        if let Some(tp) = self.types.type_param(t) {
            let bound = self.types.under(tp.bound);
            return match self.types.interface(bound).and_then(|i| i.tset.as_ref()) {
                Some(tset) => tset.is_comparable(self, seen),
                None => false,
            };
        }
        let u = self.types.under(t);
        match self.types.get(u) {
            Type::Basic(kind) => *kind != crate::BasicKind::UntypedNil,
            Type::Pointer { .. } | Type::Chan { .. } | Type::Interface(_) => true,
            Type::Struct(s) => s.fields.iter().all(|&f| {
                self.object(f)
                    .ty
                    .is_some_and(|ft| self.comparable_seen(ft, seen))
            }),
            Type::Array { elem, .. } => self.comparable_seen(*elem, seen),
            _ => false,
        }
    }

    /// Reports whether `t` has `nil` among its values.
    pub fn has_nil(&self, t: TypeId) -> bool {
        let u = self.types.under(t);
        match self.types.get(u) {
            Type::Basic(kind) => *kind == crate::BasicKind::UntypedNil,
            Type::Pointer { .. }
            | Type::Slice { .. }
            | Type::Map { .. }
            | Type::Chan { .. }
            | Type::Signature(_) => true,
            Type::Interface(_) => self.types.type_param(t).is_none(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Struct;

    #[test]
    fn test_structural_identity() {
        let mut world = World::new();
        let a = world.types.alloc(Type::Slice { elem: TypeId::INT });
        let b = world.types.alloc(Type::Slice { elem: TypeId::INT });
        let c = world.types.alloc(Type::Slice { elem: TypeId::STRING });
        assert!(world.identical(a, b));
        assert!(!world.identical(a, c));
    }

    #[test]
    fn test_comparability() {
        let mut world = World::new();
        let slice = world.types.alloc(Type::Slice { elem: TypeId::INT });
        let ptr = world.types.alloc(Type::Pointer { base: slice });
        let empty = world.types.alloc(Type::Struct(Struct::default()));
        assert!(!world.comparable(slice));
        assert!(world.comparable(ptr));
        assert!(world.comparable(empty));
        assert!(world.comparable(world.universe_error));
    }

    #[test]
    fn test_nilable_types() {
        let mut world = World::new();
        let map = world.types.alloc(Type::Map {
            key: TypeId::INT,
            elem: TypeId::INT,
        });
        assert!(world.has_nil(map));
        assert!(!world.has_nil(TypeId::INT));
    }
}
