//! Package files, object collection and imports

use tracing::{debug, trace};
use xtypes_ast::{Decl, DeclToken, Expr, ExprKind, File, Ident, ImportSpec, Span, Spec, ValueSpec};

use crate::check::DeclInfo;
use crate::errors::Diagnostic;
use crate::{Checker, Code, ConstValue, ImportError, Object, ObjectId, ObjectKind, PackageId, ScopeId, VarKind};

impl<'a> Checker<'a> {
    /// Determine the package name and keep the files that agree with it.
    pub(crate) fn init_files(&mut self, files: &'a [File]) {
        self.files.clear();
        for file in files {
            let name = file.name.name.as_str();
            let pkg_name = self.world.package(self.pkg).name.clone();
            if pkg_name.is_empty() {
                if name != "_" {
                    self.world.package_mut(self.pkg).name = name.to_string();
                } else {
                    self.error(file.name.span(), Code::BlankPkgName, "invalid package name _");
                }
                self.files.push(file);
            } else if pkg_name == name {
                self.files.push(file);
            } else {
                self.error(
                    Span::at(file.package),
                    Code::MismatchedPkgName,
                    format!("package {name}; expected {pkg_name}"),
                );
            }
        }
    }

    // === Declaring objects ===

    /// Insert `obj` into `scope` (unless blank) and record its definition.
    pub(crate) fn declare(&mut self, scope: ScopeId, ident: Option<&Ident>, obj: ObjectId) {
        if self.world.object(obj).name != "_" {
            if let Some(alt) = self.world.insert(scope, obj) {
                self.report_redeclared(obj, alt);
                return;
            }
        }
        if let Some(ident) = ident {
            self.record_def(ident, Some(obj));
        }
    }

    fn declare_pkg_obj(&mut self, ident: &Ident, obj: ObjectId, decl: DeclInfo<'a>) {
        if ident.name == "init" {
            self.error(ident.span(), Code::InvalidInitDecl, "cannot declare init - must be func");
            return;
        }
        if ident.name == "main" && self.world.package(self.pkg).name == "main" {
            self.error(ident.span(), Code::InvalidMainDecl, "cannot declare main - must be func");
            return;
        }
        let scope = self.world.package(self.pkg).scope;
        self.declare(scope, Some(ident), obj);
        self.obj_map.insert(obj, decl);
        self.world.object_mut(obj).order = self.obj_map.len() as u32;
    }

    fn new_pkg_object(&mut self, ident: &Ident, kind: ObjectKind) -> ObjectId {
        let obj = Object::new(ident.name.clone(), kind, ident.span(), Some(self.pkg));
        self.world.new_object(obj)
    }

    /// Collect all package-level objects and associate methods with their
    /// receiver base types.
    pub(crate) fn collect_objects(&mut self) {
        let pkg_scope = self.world.package(self.pkg).scope;
        let mut methods: Vec<(ObjectId, bool, &'a Ident)> = Vec::new();
        let mut file_scopes = Vec::new();

        for file in self.files.clone() {
            if self.bailed_out {
                return;
            }
            self.record_def(&file.name, None);
            let file_scope = self.world.new_scope(Some(pkg_scope), file.span, "file");
            self.record_scope(file.id, file_scope);
            file_scopes.push(file_scope);

            for decl in &file.decls {
                match decl {
                    Decl::Bad(_) => {}
                    Decl::Gen(gen) => {
                        let mut last: Option<&'a ValueSpec> = None;
                        for (iota, spec) in gen.specs.iter().enumerate() {
                            match (gen.tok, spec) {
                                (DeclToken::Import, Spec::Import(s)) => self.collect_import(s, file_scope),
                                (DeclToken::Const, Spec::Value(s)) => {
                                    let inherited = s.ty.is_none() && s.values.is_empty() && last.is_some();
                                    if !inherited {
                                        last = Some(s);
                                    }
                                    self.collect_const(s, last, inherited, iota as i128, file_scope);
                                }
                                (DeclToken::Var, Spec::Value(s)) => self.collect_var(s, file_scope),
                                (DeclToken::Type, Spec::Type(s)) => {
                                    let obj = self.new_pkg_object(&s.name, ObjectKind::TypeName);
                                    let mut d = DeclInfo::new(file_scope);
                                    d.tdecl = Some(s);
                                    self.declare_pkg_obj(&s.name, obj, d);
                                }
                                (tok, spec) => {
                                    self.invalid_ast(spec.span(), format!("invalid token {tok:?} for this specification"))
                                }
                            }
                        }
                    }
                    Decl::Func(f) => {
                        let name = f.name.name.as_str();
                        let obj = self.new_pkg_object(&f.name, ObjectKind::Func { has_ptr_recv: false });
                        let has_recv = f.recv.as_ref().is_some_and(|r| !r.is_empty());
                        if !has_recv {
                            if f.recv.is_some() {
                                self.error(f.name.span(), Code::BadRecv, "method has no receiver");
                            }
                            let is_main = name == "main" && self.world.package(self.pkg).name == "main";
                            if name == "init" || is_main {
                                let code = if is_main { Code::InvalidMainDecl } else { Code::InvalidInitDecl };
                                if let Some(tp) = f.ty.type_params.first() {
                                    self.soft_error(tp.span, code, format!("func {name} must have no type parameters"));
                                }
                                if !f.ty.params.is_empty() || !f.ty.results.is_empty() {
                                    self.soft_error(
                                        f.name.span(),
                                        code,
                                        format!("func {name} must have no arguments and no return values"),
                                    );
                                }
                            }
                            if name == "init" {
                                // init functions are not declared; they cannot be referred to
                                self.world.object_mut(obj).parent = Some(pkg_scope);
                                self.record_def(&f.name, Some(obj));
                                if f.body.is_none() {
                                    self.soft_error(f.name.span(), Code::MissingInitBody, "missing function body");
                                }
                            } else {
                                self.declare(pkg_scope, Some(&f.name), obj);
                            }
                        } else {
                            let recv = f.recv.as_deref().and_then(|r| r.first());
                            if let Some((ptr, Some(base))) = recv.map(|r| unpack_recv(&r.ty)) {
                                if name != "_" {
                                    methods.push((obj, ptr, base));
                                }
                            }
                            self.record_def(&f.name, Some(obj));
                        }
                        if let Some(tp) = f.ty.type_params.first() {
                            self.verify_version(tp.span, crate::GoVersion::GO1_18, "type parameter");
                        }
                        let mut d = DeclInfo::new(file_scope);
                        d.fdecl = Some(f);
                        self.obj_map.insert(obj, d);
                        self.world.object_mut(obj).order = self.obj_map.len() as u32;
                    }
                }
            }
        }

        // package and file scopes must not declare the same names
        for scope in file_scopes {
            let names: Vec<(String, ObjectId)> = {
                let s = self.world.scope(scope);
                s.names()
                    .filter_map(|n| s.lookup(n).map(|o| (n.to_string(), o)))
                    .collect()
            };
            for (name, obj) in names {
                let Some(alt) = self.world.scope(pkg_scope).lookup(&name) else {
                    continue;
                };
                let alt_span = self.world.object(alt).span;
                let diag = match self.world.object(obj).kind {
                    ObjectKind::PkgName { imported, .. } => {
                        let imp = self.world.package(imported);
                        let desc = format!("package {} ({:?})", imp.name, imp.path);
                        Diagnostic::new(alt_span, Code::DuplicateDecl, format!("{name} already declared through import of {desc}"))
                            .related(self.world.object(obj).span, format!("other declaration of {name}"))
                    }
                    _ => {
                        let desc = match self.world.object(obj).pkg {
                            Some(p) => {
                                let imp = self.world.package(p);
                                format!("package {} ({:?})", imp.name, imp.path)
                            }
                            None => "universe".to_string(),
                        };
                        Diagnostic::new(alt_span, Code::DuplicateDecl, format!("{name} already declared through dot-import of {desc}"))
                    }
                };
                self.report(diag);
            }
        }

        for (obj, ptr, recv) in methods {
            if let Some((ptr, base)) = self.resolve_base_type_name(ptr, recv) {
                self.world.object_mut(obj).kind = ObjectKind::Func { has_ptr_recv: ptr };
                self.methods.entry(base).or_default().push(obj);
            }
        }
        debug!(objects = self.obj_map.len(), "collected package objects");
    }

    fn collect_import(&mut self, s: &'a ImportSpec, file_scope: ScopeId) {
        if let Err(reason) = validate_import_path(&s.path) {
            self.error(s.path_span, Code::BadImportPath, format!("invalid import path ({reason})"));
            return;
        }
        let Some(imp) = self.import_package(s.path_span, &s.path) else {
            return;
        };
        let mut name = self.world.package(imp).name.clone();
        if let Some(local) = &s.name {
            name = local.name.clone();
            if s.path == "C" {
                self.error(local.span(), Code::ImportCRenamed, "cannot rename import \"C\"");
                return;
            }
        }
        if name == "init" {
            self.error(s.span, Code::InvalidInitDecl, "cannot import package as init - init must be a func");
            return;
        }
        if !self.world.package(self.pkg).imports.contains(&imp) {
            self.world.package_mut(self.pkg).imports.push(imp);
        }

        let fake = self.world.package(imp).fake;
        let kind = ObjectKind::PkgName {
            imported: imp,
            used: fake,
        };
        let pkg_name = self.world.new_object(Object::new(name.clone(), kind, s.span, Some(self.pkg)));
        match &s.name {
            Some(local) => self.record_def(local, Some(pkg_name)),
            None => self.record_implicit(s.id, pkg_name),
        }
        self.imports.push(pkg_name);

        if name == "." {
            let imp_scope = self.world.package(imp).scope;
            let exported: Vec<(String, ObjectId)> = {
                let scope = self.world.scope(imp_scope);
                scope
                    .names()
                    .filter(|n| xtypes_ast::is_exported(n))
                    .filter_map(|n| scope.lookup(n).map(|o| (n.to_string(), o)))
                    .collect()
            };
            for (name, obj) in exported {
                if let Some(alt) = self.world.scope(file_scope).lookup(&name) {
                    let span = s.name.as_ref().map(Ident::span).unwrap_or(s.span);
                    let alt_span = self.world.object(alt).span;
                    self.report(
                        Diagnostic::new(span, Code::DuplicateDecl, format!("{name} redeclared in this block"))
                            .related(alt_span, format!("other declaration of {name}")),
                    );
                } else {
                    self.world.scope_mut(file_scope).insert(&name, obj);
                    self.dot_import_map.insert((file_scope, obj), pkg_name);
                }
            }
        } else {
            self.declare(file_scope, None, pkg_name);
        }
    }

    fn collect_const(
        &mut self,
        s: &'a ValueSpec,
        last: Option<&'a ValueSpec>,
        inherited: bool,
        iota: i128,
        file_scope: ScopeId,
    ) {
        let (typ, values) = match last {
            Some(l) => (l.ty.as_ref(), l.values.as_slice()),
            None => (None, &[][..]),
        };
        for (i, name) in s.names.iter().enumerate() {
            let kind = ObjectKind::Const {
                val: ConstValue::Unknown,
            };
            let obj = self.new_pkg_object(name, kind);
            let mut d = DeclInfo::new(file_scope);
            d.vtyp = typ;
            d.init = values.get(i);
            d.inherited = inherited;
            d.iota = Some(iota);
            self.declare_pkg_obj(name, obj, d);
        }
        self.arity_match(s, Some(values), inherited);
    }

    fn collect_var(&mut self, s: &'a ValueSpec, file_scope: ScopeId) {
        let lhs: Vec<ObjectId> = s
            .names
            .iter()
            .map(|name| self.new_pkg_object(name, ObjectKind::Var(VarKind::default())))
            .collect();
        // a single initializer is shared by all variables: a, b = f()
        let shared = s.values.len() == 1;
        for (i, (name, &obj)) in s.names.iter().zip(&lhs).enumerate() {
            let mut d = DeclInfo::new(file_scope);
            d.vtyp = s.ty.as_ref();
            if shared {
                d.lhs = lhs.clone();
                d.init = s.values.first();
            } else {
                d.init = s.values.get(i);
            }
            self.declare_pkg_obj(name, obj, d);
        }
        self.arity_match(s, None, false);
    }

    /// Check that the number of names matches the number of initializers;
    /// `inherited_values` holds the values of the governing const spec.
    fn arity_match(&mut self, s: &'a ValueSpec, inherited_values: Option<&'a [Expr]>, inherited: bool) {
        let l = s.names.len();
        let is_const = inherited_values.is_some();
        let values = inherited_values.unwrap_or(&s.values);
        let r = values.len();
        if !is_const && r == 0 {
            if s.ty.is_none() {
                self.error(s.span, Code::WrongAssignCount, "missing type or init expr");
            }
        } else if l < r {
            if !inherited {
                let n = &values[l];
                self.error(n.span, Code::WrongAssignCount, "extra init expr");
            } else {
                let at = self.fset.position(values[0].pos());
                self.error(s.span, Code::WrongAssignCount, format!("extra init expr at {at}"));
            }
        } else if l > r && (is_const || r != 1) {
            let n = &s.names[r];
            self.error(n.span(), Code::WrongAssignCount, format!("missing init expr for {}", n.name));
        }
    }

    /// Follow a receiver type through aliases to a type defined in this
    /// package; returns whether the receiver is a pointer and the base.
    fn resolve_base_type_name(&self, seen_ptr: bool, recv: &'a Ident) -> Option<(bool, ObjectId)> {
        let pkg_scope = self.world.package(self.pkg).scope;
        let mut ptr = seen_ptr;
        let mut name = recv.name.as_str();
        let mut seen = Vec::new();
        loop {
            let obj = self.world.scope(pkg_scope).lookup(name)?;
            if !self.world.object(obj).is_type_name() || seen.contains(&obj) {
                return None;
            }
            let tdecl = self.obj_map.get(&obj)?.tdecl?;
            if !tdecl.is_alias() {
                return Some((ptr, obj));
            }
            seen.push(obj);
            let mut typ = tdecl.ty.unparen();
            if let ExprKind::Star(base) = &typ.kind {
                if ptr {
                    return None;
                }
                ptr = true;
                typ = base.unparen();
            }
            name = &typ.as_ident()?.name;
        }
    }

    /// Resolve an import path to a package, creating a fake package when
    /// the import fails.
    pub(crate) fn import_package(&mut self, span: Span, path: &str) -> Option<PackageId> {
        if let Some(&imp) = self.imp_map.get(path) {
            return Some(imp);
        }
        let opts = &self.conf.options;
        let imp = if path == "C" && (opts.fake_import_c || opts.go115_uses_cgo) {
            let cgo = opts.go115_uses_cgo;
            let imp = self.world.new_package("C", "C");
            let pkg = self.world.package_mut(imp);
            pkg.fake = true;
            pkg.cgo = cgo;
            imp
        } else {
            let result = match self.conf.importer.as_mut() {
                Some(importer) => importer.import(self.world, path),
                None => Err(ImportError::NoImporter { path: path.to_string() }),
            };
            let result = result.and_then(|imp| {
                let name = &self.world.package(imp).name;
                if name.is_empty() || name == "_" {
                    Err(ImportError::NotFound {
                        path: path.to_string(),
                        reason: format!("invalid package name: {name:?}"),
                    })
                } else {
                    Ok(imp)
                }
            });
            match result {
                Ok(imp) => imp,
                Err(err) => {
                    self.error(span, Code::BrokenImport, err.to_string());
                    let trimmed = path.trim_end_matches('/');
                    let name = trimmed.rsplit('/').next().unwrap_or(trimmed).to_string();
                    let imp = self.world.new_package(path, name);
                    // keep going with an empty package
                    self.world.package_mut(imp).fake = true;
                    imp
                }
            }
        };
        let p = self.world.package(imp);
        if p.complete || p.fake {
            trace!(path, "imported");
            self.imp_map.insert(path.to_string(), imp);
            return Some(imp);
        }
        None
    }

    /// Check all package-level objects: defined types first, then aliases,
    /// then everything else.
    pub(crate) fn package_objects(&mut self) {
        let mut objs: Vec<ObjectId> = self.obj_map.keys().copied().collect();
        objs.sort_by_key(|&o| self.world.object(o).order);

        // types checked by an earlier call may receive new methods
        for &obj in &objs {
            if self.world.object(obj).is_type_name() && self.world.object(obj).ty.is_some() {
                self.collect_methods(obj);
            }
        }

        let mut aliases = Vec::new();
        let mut others = Vec::new();
        for obj in objs {
            if self.bailed_out {
                return;
            }
            match self.obj_map.get(&obj).and_then(|d| d.tdecl) {
                Some(tdecl) if tdecl.is_alias() => aliases.push(obj),
                Some(_) => self.obj_decl(obj, None),
                None => others.push(obj),
            }
        }
        for obj in aliases.into_iter().chain(others) {
            if self.bailed_out {
                return;
            }
            self.obj_decl(obj, None);
        }
        // methods left over here have a base type that was not found;
        // they were checked like plain functions
        self.methods.clear();
    }

    /// Report imports that nothing refers to.
    pub(crate) fn unused_imports(&mut self) {
        for obj in self.imports.clone() {
            let o = self.world.object(obj);
            let ObjectKind::PkgName { imported, used } = o.kind else {
                continue;
            };
            if used || o.name == "_" {
                continue;
            }
            let path = self.world.package(imported).path.clone();
            let elem = path.rsplit('/').next().unwrap_or(&path);
            let msg = if o.name.is_empty() || o.name == "." || o.name == elem {
                format!("{path:?} imported and not used")
            } else {
                format!("{path:?} imported as {} and not used", o.name)
            };
            let span = o.span;
            self.soft_error(span, Code::UnusedImport, msg);
        }
    }
}

/// Strip pointer and parentheses from a receiver type and find its base
/// type name, dropping any type parameters: `*List[T]` yields `List`.
pub(crate) fn unpack_recv(rtyp: &Expr) -> (bool, Option<&Ident>) {
    let mut ptr = false;
    let mut t = rtyp;
    loop {
        match &t.kind {
            ExprKind::Paren(x) => t = x,
            ExprKind::Star(x) => {
                ptr = true;
                t = x;
            }
            _ => break,
        }
    }
    if let ExprKind::Index { x, .. } = &t.kind {
        t = x;
    }
    (ptr, t.as_ident())
}

fn validate_import_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty string".to_string());
    }
    const ILLEGAL: &str = "!\"#$%&'()*,:;<=>?[\\]^{|}`\u{FFFD}";
    for c in path.chars() {
        if !c.is_ascii_graphic() && !c.is_alphanumeric() || c.is_whitespace() || ILLEGAL.contains(c) {
            return Err(format!("invalid character {c:?}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtypes_ast::AstBuilder;

    #[test]
    fn test_unpack_recv() {
        let b = AstBuilder::new();
        let recv = b.star(b.index(b.name("List"), vec![b.name("T")]));
        let (ptr, base) = unpack_recv(&recv);
        assert!(ptr);
        assert_eq!(base.map(|i| i.name.as_str()), Some("List"));
    }

    #[test]
    fn test_import_path_validation() {
        assert!(validate_import_path("example.com/x/y").is_ok());
        assert!(validate_import_path("").is_err());
        assert!(validate_import_path("a b").is_err());
        assert!(validate_import_path("a:b").is_err());
    }
}
