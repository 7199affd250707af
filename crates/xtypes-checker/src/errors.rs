//! Diagnostics: error codes, structured error descriptions and the rendered
//! [`TypeError`] handed to clients.

use std::fmt;

use ariadne::{sources, Label, Report, ReportKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xtypes_ast::{FileSet, Position, Span};

/// Stable, machine-readable diagnostic codes.
///
/// The numeric values are part of the public contract and never change;
/// new codes are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Code {
    /// Malformed syntax that a correct parser never produces
    InvalidSyntaxTree = -1,
    BlankPkgName = 2,
    MismatchedPkgName = 3,
    InvalidPkgUse = 4,
    BadImportPath = 5,
    BrokenImport = 6,
    ImportCRenamed = 7,
    UnusedImport = 8,
    InvalidInitCycle = 9,
    DuplicateDecl = 10,
    InvalidDeclCycle = 11,
    InvalidTypeCycle = 12,
    InvalidConstInit = 13,
    InvalidConstVal = 14,
    InvalidConstType = 15,
    UntypedNilUse = 16,
    WrongAssignCount = 17,
    InvalidIfaceAssign = 21,
    InvalidChanAssign = 22,
    IncompatibleAssign = 23,
    NotAType = 25,
    InvalidArrayLen = 26,
    BlankIfaceMethod = 27,
    IncomparableMapKey = 28,
    InvalidIfaceEmbed = 29,
    InvalidPtrEmbed = 30,
    BadRecv = 31,
    InvalidRecv = 32,
    DuplicateFieldAndMethod = 33,
    DuplicateMethod = 34,
    InvalidBlank = 35,
    InvalidIota = 36,
    MissingInitBody = 37,
    InvalidInitSig = 38,
    InvalidInitDecl = 39,
    InvalidMainDecl = 40,
    TooManyValues = 41,
    NotAnExpr = 42,
    TruncatedFloat = 43,
    NumericOverflow = 44,
    UndefinedOp = 45,
    MismatchedTypes = 46,
    DivByZero = 47,
    UnaddressableOperand = 49,
    InvalidIndirection = 50,
    NonIndexableOperand = 51,
    InvalidIndex = 52,
    InvalidShiftCount = 56,
    InvalidShiftOperand = 57,
    InvalidReceive = 58,
    AmbiguousSelector = 72,
    UndeclaredImportedName = 73,
    UnexportedName = 74,
    UndeclaredName = 75,
    MissingFieldOrMethod = 76,
    BadDotDotDotSyntax = 77,
    NonVariadicDotDotDot = 78,
    MisplacedDotDotDot = 79,
    InvalidDotDotDot = 80,
    DuplicateFieldName = 81,
    NotAFunc = 90,
    WrongArgCount = 91,
    InvalidConversion = 92,
    NotAGenericType = 100,
    WrongTypeArgCount = 101,
    InvalidTypeArg = 102,
    InvalidInstanceCycle = 103,
    InvalidUnion = 104,
    MisplacedConstraintIface = 105,
    MisplacedTypeParam = 106,
    UnsupportedFeature = 107,
    InvalidMethodTypeParams = 109,
    InvalidUntypedConversion = 110,
    CannotInferTypeArgs = 111,
}

impl Code {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// One line of a diagnostic: a message anchored at a span.
#[derive(Debug, Clone)]
pub(crate) struct ErrorDesc {
    pub(crate) span: Span,
    pub(crate) msg: String,
}

/// A diagnostic as assembled by the checker, before rendering.
///
/// The first description is the primary error; the following ones are
/// related positions (the other half of a duplicate declaration, each link
/// of a cycle) and render as indented continuation lines.
#[derive(Debug, Clone)]
pub(crate) struct Diagnostic {
    pub(crate) code: Code,
    pub(crate) soft: bool,
    pub(crate) desc: Vec<ErrorDesc>,
}

impl Diagnostic {
    pub(crate) fn new(span: Span, code: Code, msg: impl Into<String>) -> Self {
        Self {
            code,
            soft: false,
            desc: vec![ErrorDesc {
                span,
                msg: msg.into(),
            }],
        }
    }

    /// Append a related position.
    pub(crate) fn related(mut self, span: Span, msg: impl Into<String>) -> Self {
        self.desc.push(ErrorDesc {
            span,
            msg: msg.into(),
        });
        self
    }

    pub(crate) fn soft(mut self) -> Self {
        self.soft = true;
        self
    }
}

/// A related source location attached to a [`TypeError`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedLocation {
    pub position: Position,
    pub span: Span,
    pub message: String,
}

/// A type-checking error as reported to clients.
///
/// `msg` is the primary message followed by one `\n\t`-indented line per
/// related location, so it renders the same whether errors are collected one
/// at a time or all at once.
#[derive(Debug, Clone, Error)]
#[error("{position}: {msg}")]
pub struct TypeError {
    pub position: Position,
    pub span: Span,
    pub msg: String,
    /// Soft errors do not invalidate the checked package
    pub soft: bool,
    pub code: Code,
    pub related: Vec<RelatedLocation>,
}

impl TypeError {
    /// The first line of the message.
    pub fn primary(&self) -> &str {
        self.msg.lines().next().unwrap_or_default()
    }

    /// Render the error as an annotated source report.
    pub fn render(&self, fset: &FileSet) -> String {
        let kind = if self.soft {
            ReportKind::Warning
        } else {
            ReportKind::Error
        };
        let name = self.position.filename.clone();
        let range = |span: Span, position: &Position| {
            let len = span.end.0.saturating_sub(span.start.0) as usize;
            position.offset..position.offset + len
        };
        let mut report = Report::build(kind, name.clone(), self.position.offset)
            .with_code(self.code)
            .with_message(self.primary())
            .with_label(Label::new((name, range(self.span, &self.position))).with_message(self.primary()));
        for rel in self.related.iter().filter(|r| r.position.is_valid()) {
            report = report.with_label(
                Label::new((rel.position.filename.clone(), range(rel.span, &rel.position)))
                    .with_message(rel.message.trim_start()),
            );
        }
        let cache = sources(
            fset.files()
                .map(|f| (f.name().to_string(), f.source().to_string())),
        );
        let mut buf = Vec::new();
        match report.finish().write(cache, &mut buf) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Errors ending a call to [`check_files`](crate::check_files)
#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error("cannot use FakeImportC and go115UsesCgo together")]
    BadCgo,

    #[error("invalid Go version {0:?}")]
    BadVersion(String),

    /// The first error found; with a custom error sink every error was also
    /// delivered to the sink.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Errors produced by an [`Importer`](crate::Importer)
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("could not import {path} (no importer configured)")]
    NoImporter { path: String },

    #[error("could not import {path} ({reason})")]
    NotFound { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtypes_ast::Pos;

    #[test]
    fn test_code_values_are_stable() {
        assert_eq!(Code::InvalidSyntaxTree.as_i32(), -1);
        assert_eq!(Code::DuplicateDecl.as_i32(), 10);
        assert_eq!(Code::InvalidDeclCycle.as_i32(), 11);
        assert_eq!(Code::IncomparableMapKey.as_i32(), 28);
        assert_eq!(Code::DuplicateFieldAndMethod.to_string(), "33");
    }

    #[test]
    fn test_diagnostic_related() {
        let d = Diagnostic::new(Span::at(Pos(3)), Code::DuplicateDecl, "x redeclared in this block")
            .related(Span::at(Pos(1)), "\tother declaration of x");
        assert_eq!(d.desc.len(), 2);
        assert_eq!(d.desc[0].span, Span::at(Pos(3)));
        assert!(!d.soft);
    }

    #[test]
    fn test_render_mentions_message() {
        let mut fset = FileSet::new();
        let base = fset.add_file("a.gop", "package a\nconst c = x\n").base();
        let err = TypeError {
            position: fset.position(base.offset(20)),
            span: Span::new(base.offset(20), base.offset(21)),
            msg: "undefined: x".into(),
            soft: false,
            code: Code::UndeclaredName,
            related: Vec::new(),
        };
        assert_eq!(err.to_string(), "a.gop:2:11: undefined: x");
        assert!(err.render(&fset).contains("undefined: x"));
    }
}
