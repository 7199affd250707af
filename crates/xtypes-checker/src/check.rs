//! The checker: per-package state and the phase driver

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;

use tracing::{debug, debug_span, trace, Level};
use xtypes_ast::{Expr, File, FileSet, FuncDecl, Ident, NodeId, Span, TypeSpec};

use crate::delayed::DelayedQueue;
use crate::errors::Diagnostic;
use crate::info::{Instance, Mode, TypeAndValue};
use crate::mono::MonoGraph;
use crate::object::Color;
use crate::{
    CheckError, Code, Config, ConstValue, Context, GoVersion, Info, ObjectId, PackageId, RelatedLocation, ScopeId,
    TypeError, TypeId, World,
};

/// Syntax needed to check a package-level object, recorded during object
/// collection and consumed when the object is checked.
#[derive(Debug, Clone)]
pub(crate) struct DeclInfo<'a> {
    pub(crate) file_scope: ScopeId,
    /// All variables of an n:1 declaration `a, b = f()`; empty otherwise
    pub(crate) lhs: Vec<ObjectId>,
    pub(crate) vtyp: Option<&'a Expr>,
    pub(crate) init: Option<&'a Expr>,
    /// The initializer is repeated implicitly from an earlier const spec
    pub(crate) inherited: bool,
    pub(crate) iota: Option<i128>,
    pub(crate) tdecl: Option<&'a TypeSpec>,
    pub(crate) fdecl: Option<&'a FuncDecl>,
}

impl<'a> DeclInfo<'a> {
    pub(crate) fn new(file_scope: ScopeId) -> Self {
        Self {
            file_scope,
            lhs: Vec::new(),
            vtyp: None,
            init: None,
            inherited: false,
            iota: None,
            tdecl: None,
            fdecl: None,
        }
    }
}

/// Context of the declaration or expression being checked.
#[derive(Debug, Clone, Default)]
pub(crate) struct Environment {
    /// Package-level object whose declaration is being checked;
    /// dependencies are recorded against it
    pub(crate) decl: Option<ObjectId>,
    pub(crate) scope: Option<ScopeId>,
    /// Value of `iota` inside a constant declaration
    pub(crate) iota: Option<ConstValue>,
    /// Position override for errors in inherited constant initializers
    pub(crate) errpos: Option<Span>,
    pub(crate) in_tparam_list: bool,
}

/// Type-checks the files of one package.
pub struct Checker<'a> {
    pub(crate) conf: &'a mut Config,
    pub(crate) fset: &'a FileSet,
    pub(crate) world: &'a mut World,
    pub(crate) pkg: PackageId,
    pub(crate) info: &'a mut Info,
    pub(crate) version: GoVersion,
    pub(crate) ctxt: Context,

    pub(crate) files: Vec<&'a File>,
    pub(crate) obj_map: HashMap<ObjectId, DeclInfo<'a>>,
    pub(crate) deps: HashMap<ObjectId, BTreeSet<ObjectId>>,
    pub(crate) imp_map: HashMap<String, PackageId>,
    /// Import package names, for the unused-import check
    pub(crate) imports: Vec<ObjectId>,
    /// Objects dot-imported into a file scope, mapped to the import's
    /// package name
    pub(crate) dot_import_map: HashMap<(ScopeId, ObjectId), ObjectId>,
    /// Methods collected per receiver base type name
    pub(crate) methods: HashMap<ObjectId, Vec<ObjectId>>,
    pub(crate) obj_path: Vec<ObjectId>,
    pub(crate) delayed: DelayedQueue<'a, Checker<'a>>,
    pub(crate) mono: MonoGraph,
    pub(crate) broken_aliases: HashSet<ObjectId>,
    pub(crate) untyped: HashMap<NodeId, TypeAndValue>,
    /// Named types and interfaces to finalize during cleanup
    pub(crate) cleaners: Vec<TypeId>,
    pub(crate) env: Environment,

    pub(crate) first_err: Option<TypeError>,
    /// Set once an error is reported without an error sink; all further
    /// work is skipped
    pub(crate) bailed_out: bool,
}

impl<'a> Checker<'a> {
    pub fn new(
        conf: &'a mut Config,
        fset: &'a FileSet,
        world: &'a mut World,
        pkg: PackageId,
        info: &'a mut Info,
    ) -> Self {
        let ctxt = conf.context.clone().unwrap_or_default();
        Self {
            conf,
            fset,
            world,
            pkg,
            info,
            version: GoVersion::LATEST,
            ctxt,
            files: Vec::new(),
            obj_map: HashMap::new(),
            deps: HashMap::new(),
            imp_map: HashMap::new(),
            imports: Vec::new(),
            dot_import_map: HashMap::new(),
            methods: HashMap::new(),
            obj_path: Vec::new(),
            delayed: DelayedQueue::default(),
            mono: MonoGraph::default(),
            broken_aliases: HashSet::new(),
            untyped: HashMap::new(),
            cleaners: Vec::new(),
            env: Environment::default(),
            first_err: None,
            bailed_out: false,
        }
    }

    /// Check the package's files.
    ///
    /// Returns the first error found. Without an error sink checking stops
    /// there; with a sink every error has been delivered to it.
    pub fn check_files(&mut self, files: &'a [File]) -> Result<(), CheckError> {
        if self.conf.options.fake_import_c && self.conf.options.go115_uses_cgo {
            return Err(CheckError::BadCgo);
        }
        self.version = self.conf.version()?;

        let pkg_path = self.world.package(self.pkg).path.clone();
        let _span = debug_span!("check_files", pkg = %pkg_path, files = files.len()).entered();
        if self.run_phases(files).is_break() {
            debug!("checking stopped at first error");
        }

        // no longer needed
        self.imp_map.clear();
        self.dot_import_map.clear();
        self.broken_aliases.clear();
        self.delayed.clear();

        match self.first_err.take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn run_phases(&mut self, files: &'a [File]) -> ControlFlow<()> {
        self.phase("init_files", |c| c.init_files(files))?;
        self.phase("collect_objects", Checker::collect_objects)?;
        self.phase("package_objects", Checker::package_objects)?;
        self.phase("process_delayed", Checker::process_delayed)?;
        self.phase("cleanup", Checker::cleanup)?;
        self.phase("init_order", Checker::init_order)?;
        if !self.conf.options.disable_unused_import_check {
            self.phase("unused_imports", Checker::unused_imports)?;
        }
        self.phase("record_untyped", Checker::record_untyped)?;
        if self.first_err.is_none() {
            self.phase("monomorph", Checker::monomorph)?;
        }
        self.world.package_mut(self.pkg).complete = true;
        ControlFlow::Continue(())
    }

    fn phase(&mut self, name: &'static str, f: impl FnOnce(&mut Self)) -> ControlFlow<()> {
        let _span = debug_span!("phase", name).entered();
        f(self);
        if self.bailed_out {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    // === Delayed actions ===

    /// Queue `f` to run once the current declarations are complete.
    pub(crate) fn later(&mut self, f: impl FnOnce(&mut Checker<'a>) + 'a) {
        self.delayed.push(f, None);
    }

    /// Like [`later`](Self::later), with a description for trace logs.
    pub(crate) fn later_described(&mut self, describe: impl FnOnce() -> String, f: impl FnOnce(&mut Checker<'a>) + 'a) {
        let desc = tracing::enabled!(Level::TRACE).then(describe);
        self.delayed.push(f, desc);
    }

    /// Run all delayed actions, including those queued while running.
    pub(crate) fn process_delayed(&mut self) {
        while let Some(action) = self.delayed.pop() {
            if self.bailed_out {
                continue;
            }
            if let Some(desc) = &action.desc {
                trace!(action = %desc, "delayed");
            }
            let saved = std::mem::take(&mut self.env);
            (action.f)(self);
            self.env = saved;
        }
    }

    // === Object path and environment ===

    /// Run `f` with `obj` pushed on the object path (in progress); `obj` is
    /// done afterwards.
    pub(crate) fn with_object_path<R>(&mut self, obj: ObjectId, f: impl FnOnce(&mut Self) -> R) -> R {
        let idx = self.obj_path.len();
        self.obj_path.push(obj);
        self.world.object_mut(obj).set_color(Color::InProgress(idx));
        let result = f(self);
        self.obj_path.pop();
        self.world.object_mut(obj).set_color(Color::Done);
        result
    }

    pub(crate) fn with_env<R>(&mut self, env: Environment, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = saved;
        result
    }

    pub(crate) fn scope(&self) -> ScopeId {
        self.env
            .scope
            .unwrap_or_else(|| self.world.package(self.pkg).scope)
    }

    /// Open a scope nested in the current one for the duration of `f`.
    pub(crate) fn with_scope<R>(&mut self, node: NodeId, span: Span, comment: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let scope = self.world.new_scope(Some(self.scope()), span, comment);
        self.record_scope(node, scope);
        let saved = self.env.scope.replace(scope);
        let result = f(self);
        self.env.scope = saved;
        result
    }

    pub(crate) fn allow_version(&self, v: GoVersion) -> bool {
        self.version >= v
    }

    /// Report an error unless the configured version supports `feature`.
    pub(crate) fn verify_version(&mut self, span: Span, v: GoVersion, feature: &str) -> bool {
        if self.allow_version(v) {
            return true;
        }
        self.error(
            span,
            Code::UnsupportedFeature,
            format!("{feature} requires {v} or later (-lang was set to {})", self.version),
        );
        false
    }

    // === Errors ===

    pub(crate) fn error(&mut self, span: Span, code: Code, msg: impl Into<String>) {
        self.report(Diagnostic::new(span, code, msg));
    }

    pub(crate) fn soft_error(&mut self, span: Span, code: Code, msg: impl Into<String>) {
        self.report(Diagnostic::new(span, code, msg).soft());
    }

    pub(crate) fn invalid_ast(&mut self, span: Span, msg: impl Into<String>) {
        self.error(span, Code::InvalidSyntaxTree, msg);
    }

    /// Report `obj` as redeclared, pointing at the earlier declaration.
    pub(crate) fn report_redeclared(&mut self, obj: ObjectId, alt: ObjectId) {
        let (name, span) = {
            let o = self.world.object(obj);
            (o.name.clone(), o.span)
        };
        let alt_span = self.world.object(alt).span;
        let mut diag = Diagnostic::new(span, Code::DuplicateDecl, format!("{name} redeclared in this block"));
        if alt_span.is_valid() {
            diag = diag.related(alt_span, format!("other declaration of {name}"));
        }
        self.report(diag);
    }

    pub(crate) fn report(&mut self, diag: Diagnostic) {
        if self.bailed_out {
            return;
        }
        let err = self.make_error(diag);

        // Messages mentioning "invalid operand" or "invalid type" past their
        // start are usually follow-on errors; drop them once something has
        // been reported. Best-effort: other cascades still get through.
        let derivative = ["invalid operand", "invalid type"]
            .iter()
            .any(|pat| err.msg.find(pat).is_some_and(|i| i > 0));
        if self.first_err.is_some() && derivative {
            return;
        }

        debug!(code = %err.code, soft = err.soft, "{err}");
        if self.first_err.is_none() {
            self.first_err = Some(err.clone());
        }
        match self.conf.error.as_mut() {
            Some(sink) => sink(&err),
            None => self.bailed_out = true,
        }
    }

    fn make_error(&self, diag: Diagnostic) -> TypeError {
        let primary = &diag.desc[0];
        let mut msg = primary.msg.clone();
        let mut related = Vec::new();
        for desc in &diag.desc[1..] {
            let position = self.fset.position(desc.span.start);
            let text = desc.msg.trim_start_matches('\t');
            msg.push_str("\n\t");
            if position.is_valid() {
                msg.push_str(&format!("{position}: "));
            }
            msg.push_str(text);
            related.push(RelatedLocation {
                position,
                span: desc.span,
                message: text.to_string(),
            });
        }
        if diag.code == Code::InvalidSyntaxTree {
            msg = format!("invalid AST: {msg}");
        }
        if let Some(url) = &self.conf.options.error_url {
            let link = url.replace("{code}", &diag.code.to_string());
            match msg.find('\n') {
                Some(i) => msg.insert_str(i, &link),
                None => msg.push_str(&link),
            }
        }
        let span = self.env.errpos.unwrap_or(primary.span);
        TypeError {
            position: self.fset.position(span.start),
            span,
            msg,
            soft: diag.soft,
            code: diag.code,
            related,
        }
    }

    /// Format `ty` for messages.
    pub(crate) fn ts(&self, ty: TypeId) -> String {
        self.world.type_string(ty, Some(self.pkg))
    }

    pub(crate) fn obj_name(&self, obj: ObjectId) -> String {
        self.world.qualified_name(obj, Some(self.pkg))
    }

    // === Recording ===

    pub(crate) fn record_def(&mut self, ident: &Ident, obj: Option<ObjectId>) {
        self.info.defs.insert(ident.id, obj);
    }

    pub(crate) fn record_use(&mut self, ident: &Ident, obj: ObjectId) {
        self.info.uses.insert(ident.id, obj);
    }

    pub(crate) fn record_implicit(&mut self, node: NodeId, obj: ObjectId) {
        self.info.implicits.insert(node, obj);
    }

    pub(crate) fn record_scope(&mut self, node: NodeId, scope: ScopeId) {
        self.info.scopes.insert(node, scope);
    }

    pub(crate) fn record_instance(&mut self, node: NodeId, type_args: Vec<TypeId>, ty: TypeId) {
        self.info.instances.insert(node, Instance { type_args, ty });
    }

    /// Record the type of `expr`; untyped results are held back until their
    /// final type is known.
    pub(crate) fn record_type_and_value(&mut self, expr: &Expr, mode: Mode, ty: TypeId, value: Option<ConstValue>) {
        if mode == Mode::Invalid {
            return;
        }
        let tv = TypeAndValue { mode, ty, value };
        if self.world.types.is_typed(ty) {
            self.info.types.insert(expr.id, tv);
        } else {
            self.untyped.insert(expr.id, tv);
        }
    }

    /// Give untyped `expr` the type `ty`, along with the untyped operands
    /// its type was derived from. With `final_` unset, an untyped `ty` only
    /// refines the held-back record.
    pub(crate) fn update_expr_type(&mut self, expr: &Expr, ty: TypeId, final_: bool) {
        self.update_expr_type0(expr, ty, final_, false);
    }

    fn update_expr_type0(&mut self, e: &Expr, ty: TypeId, final_: bool, shift_lhs: bool) {
        use xtypes_ast::{BinaryOp, ExprKind};

        let Some(old) = self.untyped.get(&e.id).cloned() else {
            return;
        };
        match &e.kind {
            ExprKind::Paren(inner) => self.update_expr_type0(inner, ty, final_, false),
            // a constant result does not depend on its operands' types
            ExprKind::Unary { x, .. } if old.value.is_none() => self.update_expr_type0(x, ty, final_, false),
            ExprKind::Binary { op, x, y } if old.value.is_none() => {
                if op.is_comparison() {
                    // result is boolean; operands were typed already
                } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
                    self.update_expr_type0(x, ty, final_, true);
                } else {
                    self.update_expr_type0(x, ty, final_, false);
                    self.update_expr_type0(y, ty, final_, false);
                }
            }
            _ => {}
        }

        if !final_ && !self.world.types.is_typed(ty) {
            if let Some(tv) = self.untyped.get_mut(&e.id) {
                tv.ty = ty;
            }
            return;
        }

        self.untyped.remove(&e.id);
        if shift_lhs {
            let u = self.world.types.under(ty);
            if !self.world.types.basic(u).is_some_and(|k| k.is_integer()) {
                self.error(
                    e.span,
                    Code::InvalidShiftOperand,
                    format!("invalid operation: shifted operand {e} (type {}) must be integer", self.ts(ty)),
                );
                return;
            }
        }
        self.info.types.insert(
            e.id,
            TypeAndValue {
                mode: old.mode,
                ty,
                value: old.value,
            },
        );
    }

    /// Update the value recorded for untyped `expr`.
    pub(crate) fn update_expr_val(&mut self, expr: &Expr, val: ConstValue) {
        if let Some(tv) = self.untyped.get_mut(&expr.id) {
            tv.value = Some(val);
        }
    }

    /// Flush the untyped expressions that never received a final type.
    pub(crate) fn record_untyped(&mut self) {
        for (id, tv) in self.untyped.drain() {
            self.info.types.insert(id, tv);
        }
    }

    /// Record that the current declaration depends on package-level `obj`.
    pub(crate) fn add_decl_dep(&mut self, obj: ObjectId) {
        let Some(from) = self.env.decl else {
            return;
        };
        if !self.obj_map.contains_key(&obj) {
            return;
        }
        let lhs = match self.obj_map.get(&from) {
            Some(d) if !d.lhs.is_empty() => d.lhs.clone(),
            _ => vec![from],
        };
        for l in lhs {
            self.deps.entry(l).or_default().insert(obj);
        }
    }

    // === Cleanup and generics ===

    /// Settle every named type's underlying type and every interface's
    /// type set.
    pub(crate) fn cleanup(&mut self) {
        let mut i = 0;
        while i < self.cleaners.len() {
            let t = self.cleaners[i];
            i += 1;
            if self.world.types.named(t).is_some() {
                let u = self.under(t);
                if let Some(named) = self.world.types.named_mut(t) {
                    named.underlying = Some(u);
                }
            } else if self.world.types.interface(t).is_some() {
                self.compute_type_set(t, Span::dummy());
            }
        }
        self.cleaners.clear();
    }

    pub(crate) fn monomorph(&mut self) {
        let Some(found) = self.mono.find_loop() else {
            return;
        };
        let span = self.world.object(found.start).span;
        let mut diag = Diagnostic::new(span, Code::InvalidInstanceCycle, "instantiation cycle:");
        for link in &found.links {
            let name = self.world.object(link.tparam).name.clone();
            diag = diag.related(link.span, format!("{name} instantiated as {}", self.ts(link.ty)));
        }
        self.report(diag);
    }
}

/// Type-check `files` as package `pkg` of `world`, filling in `info`.
pub fn check_files<'a>(
    conf: &'a mut Config,
    fset: &'a FileSet,
    world: &'a mut World,
    pkg: PackageId,
    files: &'a [File],
    info: &'a mut Info,
) -> Result<(), CheckError> {
    Checker::new(conf, fset, world, pkg, info).check_files(files)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::{Object, ObjectKind};

    #[test]
    fn test_process_delayed_drains_nested_actions_in_order() {
        let mut conf = Config::default();
        let fset = FileSet::new();
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let obj = world.new_object(Object::new("x", ObjectKind::TypeName, Span::dummy(), Some(pkg)));
        let mut info = Info::new();
        let mut checker = Checker::new(&mut conf, &fset, &mut world, pkg, &mut info);

        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        checker.later(move |c| {
            assert!(c.env.decl.is_none());
            l1.borrow_mut().push(1);
            let l3 = l1.clone();
            c.later(move |_| l3.borrow_mut().push(3));
        });
        checker.later(move |_| l2.borrow_mut().push(2));

        checker.env.decl = Some(obj);
        checker.process_delayed();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(checker.env.decl, Some(obj));
        assert!(checker.delayed.pop().is_none());
    }

    #[test]
    fn test_process_delayed_skips_actions_after_bail_out() {
        let mut conf = Config::default();
        let fset = FileSet::new();
        let mut world = World::new();
        let pkg = world.new_package("p", "p");
        let mut info = Info::new();
        let mut checker = Checker::new(&mut conf, &fset, &mut world, pkg, &mut info);

        let ran = Rc::new(RefCell::new(0));
        let r = ran.clone();
        checker.later(|c| c.bailed_out = true);
        checker.later(move |_| *r.borrow_mut() += 1);
        checker.process_delayed();
        assert_eq!(*ran.borrow(), 0);
        assert!(checker.delayed.pop().is_none());
    }
}
