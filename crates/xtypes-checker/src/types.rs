//! Type representation
//!
//! Types live in a [`TypeStore`] arena and are referred to by [`TypeId`]
//! handles. Composite types are allocated before their components are known,
//! which is what lets a defined type point at its own underlying type while
//! that type is still being filled in (`type T struct { next *T }`).

use xtypes_ast::{ChanDir, Span};

use crate::typeset::TypeSet;
use crate::{ObjectId, ScopeId};

/// Handle to a type in a [`TypeStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    // Reserved ids, interned by `TypeStore::new` in `BasicKind::ALL` order.
    pub const INVALID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const INT8: TypeId = TypeId(3);
    pub const INT16: TypeId = TypeId(4);
    pub const INT32: TypeId = TypeId(5);
    pub const INT64: TypeId = TypeId(6);
    pub const UINT: TypeId = TypeId(7);
    pub const UINT8: TypeId = TypeId(8);
    pub const UINT16: TypeId = TypeId(9);
    pub const UINT32: TypeId = TypeId(10);
    pub const UINT64: TypeId = TypeId(11);
    pub const UINTPTR: TypeId = TypeId(12);
    pub const FLOAT32: TypeId = TypeId(13);
    pub const FLOAT64: TypeId = TypeId(14);
    pub const STRING: TypeId = TypeId(15);
    pub const UNTYPED_BOOL: TypeId = TypeId(16);
    pub const UNTYPED_INT: TypeId = TypeId(17);
    pub const UNTYPED_RUNE: TypeId = TypeId(18);
    pub const UNTYPED_FLOAT: TypeId = TypeId(19);
    pub const UNTYPED_STRING: TypeId = TypeId(20);
    pub const UNTYPED_NIL: TypeId = TypeId(21);

    pub const FIRST_DYNAMIC: u32 = 22;

    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

/// Kind of a basic (predeclared) type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const ALL: [BasicKind; 22] = [
        BasicKind::Invalid,
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::String,
        BasicKind::UntypedBool,
        BasicKind::UntypedInt,
        BasicKind::UntypedRune,
        BasicKind::UntypedFloat,
        BasicKind::UntypedString,
        BasicKind::UntypedNil,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Invalid => "invalid type",
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::Uint | BasicKind::Uint8 | BasicKind::Uint16 | BasicKind::Uint32 | BasicKind::Uint64 | BasicKind::Uintptr
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    /// Kinds that constants may have
    pub fn is_const_type(self) -> bool {
        self.is_boolean() || self.is_numeric() || self.is_string()
    }

    /// Inclusive value range of sized integer kinds
    pub(crate) fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            BasicKind::Int8 => (i8::MIN as i128, i8::MAX as i128),
            BasicKind::Int16 => (i16::MIN as i128, i16::MAX as i128),
            BasicKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
            BasicKind::Int | BasicKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
            BasicKind::Uint8 => (0, u8::MAX as i128),
            BasicKind::Uint16 => (0, u16::MAX as i128),
            BasicKind::Uint32 => (0, u32::MAX as i128),
            BasicKind::Uint | BasicKind::Uint64 | BasicKind::Uintptr => (0, u64::MAX as i128),
            _ => return None,
        })
    }
}

/// A type
#[derive(Debug, Clone)]
pub enum Type {
    Basic(BasicKind),
    Pointer { base: TypeId },
    /// `len` is `None` when the length expression was invalid
    Array { len: Option<i64>, elem: TypeId },
    Slice { elem: TypeId },
    Struct(Struct),
    Map { key: TypeId, elem: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Signature(Signature),
    Interface(Interface),
    /// A defined type, generic definition or generic instance
    Named(Named),
    TypeParam(TypeParam),
    /// A union of constraint terms; only appears embedded in interfaces
    Union(Vec<UnionTerm>),
    /// Result list of a multi-value call
    Tuple(Vec<ObjectId>),
}

#[derive(Debug, Clone, Default)]
pub struct Struct {
    /// Field objects, in declaration order
    pub fields: Vec<ObjectId>,
    pub tags: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub type_params: Vec<TypeId>,
    /// Type parameters declared by a generic receiver, `func (l *List[T])`
    pub recv_type_params: Vec<TypeId>,
    pub recv: Option<ObjectId>,
    pub params: Vec<ObjectId>,
    pub results: Vec<ObjectId>,
    /// The last parameter has the form `...T` and type `[]T`
    pub variadic: bool,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Interface {
    /// Explicitly declared methods
    pub methods: Vec<ObjectId>,
    /// Embedded elements (interfaces, unions, or plain type terms)
    pub embeddeds: Vec<TypeId>,
    pub embed_spans: Vec<Span>,
    /// Set for the predeclared `comparable` constraint
    pub is_comparable: bool,
    /// Set for the implicit interface of a bare constraint `[P ~int]`
    pub implicit: bool,
    pub(crate) tset: Option<TypeSet>,
    pub(crate) computing: bool,
}

impl Interface {
    pub fn type_set(&self) -> Option<&TypeSet> {
        self.tset.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct Named {
    pub obj: ObjectId,
    /// Underlying type; `None` while the declaration is being resolved (or,
    /// for instances, until expanded). May temporarily be another named type.
    pub underlying: Option<TypeId>,
    pub type_params: Vec<TypeId>,
    pub type_args: Vec<TypeId>,
    /// The generic definition this type instantiates
    pub origin: Option<TypeId>,
    pub methods: Vec<ObjectId>,
}

impl Named {
    pub fn new(obj: ObjectId) -> Self {
        Self {
            obj,
            underlying: None,
            type_params: Vec::new(),
            type_args: Vec::new(),
            origin: None,
            methods: Vec::new(),
        }
    }

    pub fn is_instance(&self) -> bool {
        self.origin.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct TypeParam {
    pub obj: ObjectId,
    pub index: usize,
    /// Constraint; an interface after resolution
    pub bound: TypeId,
    /// Checker-unique id, used to tell type parameters of the same name apart
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnionTerm {
    pub tilde: bool,
    pub ty: TypeId,
}

/// Arena of all types of a [`World`](crate::World)
#[derive(Debug, Clone)]
pub struct TypeStore {
    types: Vec<Type>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    pub fn new() -> Self {
        let types = BasicKind::ALL.iter().map(|k| Type::Basic(*k)).collect();
        Self { types }
    }

    pub fn alloc(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn named(&self, id: TypeId) -> Option<&Named> {
        match self.get(id) {
            Type::Named(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn named_mut(&mut self, id: TypeId) -> Option<&mut Named> {
        match self.get_mut(id) {
            Type::Named(n) => Some(n),
            _ => None,
        }
    }

    pub fn type_param(&self, id: TypeId) -> Option<&TypeParam> {
        match self.get(id) {
            Type::TypeParam(tp) => Some(tp),
            _ => None,
        }
    }

    pub(crate) fn type_param_mut(&mut self, id: TypeId) -> Option<&mut TypeParam> {
        match self.get_mut(id) {
            Type::TypeParam(tp) => Some(tp),
            _ => None,
        }
    }

    pub fn interface(&self, id: TypeId) -> Option<&Interface> {
        match self.get(id) {
            Type::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn interface_mut(&mut self, id: TypeId) -> Option<&mut Interface> {
        match self.get_mut(id) {
            Type::Interface(i) => Some(i),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.get(id) {
            Type::Signature(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn signature_mut(&mut self, id: TypeId) -> Option<&mut Signature> {
        match self.get_mut(id) {
            Type::Signature(s) => Some(s),
            _ => None,
        }
    }

    pub fn basic(&self, id: TypeId) -> Option<BasicKind> {
        match self.get(id) {
            Type::Basic(k) => Some(*k),
            _ => None,
        }
    }

    /// The underlying type of `id`.
    ///
    /// Named types resolve through their underlying chain; a chain that is
    /// not (yet) resolved yields the invalid type. Type parameters yield
    /// their constraint's underlying interface.
    pub fn under(&self, id: TypeId) -> TypeId {
        let mut t = id;
        for _ in 0..=self.types.len() {
            match self.get(t) {
                Type::Named(n) => match n.underlying {
                    Some(u) if u != t => t = u,
                    _ => return TypeId::INVALID,
                },
                Type::TypeParam(tp) => match self.get(tp.bound) {
                    Type::Named(_) | Type::TypeParam(_) => t = tp.bound,
                    _ => return tp.bound,
                },
                _ => return t,
            }
        }
        TypeId::INVALID
    }

    /// Reports whether `id` is a basic type of the given predicate's kinds,
    /// looking through named types but not type parameters.
    pub fn is_basic(&self, id: TypeId, pred: impl Fn(BasicKind) -> bool) -> bool {
        if self.type_param(id).is_some() {
            return false;
        }
        self.basic(self.under(id)).is_some_and(pred)
    }

    /// Reports whether `id` is typed; i.e. not an untyped constant type.
    /// Safe to call on types that are not fully set up.
    pub fn is_typed(&self, id: TypeId) -> bool {
        !self.basic(id).is_some_and(BasicKind::is_untyped)
    }

    /// Reports whether `id` is a generic type that has not been instantiated.
    pub fn is_generic(&self, id: TypeId) -> bool {
        self.named(id)
            .is_some_and(|n| !n.type_params.is_empty() && n.type_args.is_empty())
    }

    pub fn is_const_type(&self, id: TypeId) -> bool {
        self.is_basic(id, BasicKind::is_const_type)
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.type_param(id).is_none() && self.interface(self.under(id)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids_match_kinds() {
        let store = TypeStore::new();
        assert_eq!(store.len() as u32, TypeId::FIRST_DYNAMIC);
        assert_eq!(store.basic(TypeId::STRING), Some(BasicKind::String));
        assert_eq!(store.basic(TypeId::UNTYPED_NIL), Some(BasicKind::UntypedNil));
        assert_eq!(store.basic(TypeId::UINTPTR), Some(BasicKind::Uintptr));
    }

    #[test]
    fn test_under_follows_named_chain() {
        let mut store = TypeStore::new();
        let slice = store.alloc(Type::Slice { elem: TypeId::INT });
        let mut a = Named::new(ObjectId(0));
        a.underlying = Some(slice);
        let a = store.alloc(Type::Named(a));
        let mut b = Named::new(ObjectId(1));
        b.underlying = Some(a);
        let b = store.alloc(Type::Named(b));
        assert_eq!(store.under(b), slice);
    }

    #[test]
    fn test_under_of_unresolved_named_is_invalid() {
        let mut store = TypeStore::new();
        let t = store.alloc(Type::Named(Named::new(ObjectId(0))));
        assert_eq!(store.under(t), TypeId::INVALID);
    }

    #[test]
    fn test_typed_predicates() {
        let store = TypeStore::new();
        assert!(store.is_typed(TypeId::INT));
        assert!(!store.is_typed(TypeId::UNTYPED_FLOAT));
        assert!(store.is_const_type(TypeId::UNTYPED_RUNE));
        assert!(!store.is_const_type(TypeId::UNTYPED_NIL));
    }
}
