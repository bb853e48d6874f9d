//! The typed source AST as a dialect.
//!
//! AST operations carry no SSA operands or results; the tree shape lives
//! in nested single-block regions and the leaves in attributes. The type
//! checker decorates expressions with `type_hint` attributes that the
//! AST→flat lowering consumes.

use crate::dialects::OpKind;
use crate::ir::{Attribute, Module, OpId, RegionId, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstOp {
    /// Two regions: definitions (`var_def`/`func_def`), then statements.
    Program,
    /// Attr `func_name`; regions: params, return type, body.
    FuncDef,
    /// Attr `var_name`; region: declared type.
    TypedVar,
    /// Attr `type_name`.
    TypeName,
    /// Region: element type.
    ListType,
    /// Regions: typed var, initializing literal.
    VarDef,
    /// Attr `decl_name`.
    GlobalDecl,
    /// Attr `decl_name`.
    NonlocalDecl,
    /// Reserved: attrs `class_name`, `super_class_name`; region: body. The
    /// backend emits no code for classes.
    ClassDef,
    /// Regions: condition, then, orelse.
    If,
    /// Regions: condition, body.
    While,
    /// Attr `iter_name`; regions: iterable, body.
    For,
    Pass,
    /// Region: value (empty for a bare `return`).
    Return,
    /// Regions: target, value. Chained targets nest another assign in the
    /// value region.
    Assign,
    /// Attr `value`.
    Literal,
    /// Attr `id`.
    ExprName,
    /// Attr `op`; region: value.
    UnaryExpr,
    /// Attr `op`; regions: lhs, rhs.
    BinaryExpr,
    /// Regions: condition, then-value, else-value.
    IfExpr,
    /// Region: elements.
    ListExpr,
    /// Regions: value, index.
    IndexExpr,
    /// Attr `func`; region: arguments. The type checker adds `type_hint`.
    CallExpr,
}

impl AstOp {
    pub fn short_name(&self) -> &'static str {
        match self {
            AstOp::Program => "program",
            AstOp::FuncDef => "func_def",
            AstOp::TypedVar => "typed_var",
            AstOp::TypeName => "type_name",
            AstOp::ListType => "list_type",
            AstOp::VarDef => "var_def",
            AstOp::GlobalDecl => "global_decl",
            AstOp::NonlocalDecl => "nonlocal_decl",
            AstOp::ClassDef => "class_def",
            AstOp::If => "if",
            AstOp::While => "while",
            AstOp::For => "for",
            AstOp::Pass => "pass",
            AstOp::Return => "return",
            AstOp::Assign => "assign",
            AstOp::Literal => "literal",
            AstOp::ExprName => "id_expr",
            AstOp::UnaryExpr => "unary_expr",
            AstOp::BinaryExpr => "binary_expr",
            AstOp::IfExpr => "if_expr",
            AstOp::ListExpr => "list_expr",
            AstOp::IndexExpr => "index_expr",
            AstOp::CallExpr => "call_expr",
        }
    }

    /// The name used in user-facing diagnostics (scenario: assigning to a
    /// literal reports `Literal`).
    pub fn diag_name(&self) -> &'static str {
        match self {
            AstOp::Program => "Program",
            AstOp::FuncDef => "FuncDef",
            AstOp::TypedVar => "TypedVar",
            AstOp::TypeName => "TypeName",
            AstOp::ListType => "ListType",
            AstOp::VarDef => "VarDef",
            AstOp::GlobalDecl => "GlobalDecl",
            AstOp::NonlocalDecl => "NonlocalDecl",
            AstOp::ClassDef => "ClassDef",
            AstOp::If => "If",
            AstOp::While => "While",
            AstOp::For => "For",
            AstOp::Pass => "Pass",
            AstOp::Return => "Return",
            AstOp::Assign => "Assign",
            AstOp::Literal => "Literal",
            AstOp::ExprName => "ExprName",
            AstOp::UnaryExpr => "UnaryExpr",
            AstOp::BinaryExpr => "BinaryExpr",
            AstOp::IfExpr => "IfExpr",
            AstOp::ListExpr => "ListExpr",
            AstOp::IndexExpr => "IndexExpr",
            AstOp::CallExpr => "CallExpr",
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            AstOp::Literal
                | AstOp::ExprName
                | AstOp::UnaryExpr
                | AstOp::BinaryExpr
                | AstOp::IfExpr
                | AstOp::ListExpr
                | AstOp::IndexExpr
                | AstOp::CallExpr
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            AstOp::If
                | AstOp::While
                | AstOp::For
                | AstOp::Pass
                | AstOp::Return
                | AstOp::Assign
        ) || self.is_expression()
    }

    pub fn is_type(&self) -> bool {
        matches!(self, AstOp::TypeName | AstOp::ListType)
    }
}

fn create(m: &mut Module, op: AstOp, attrs: Vec<(&str, Attribute)>, regions: Vec<RegionId>) -> OpId {
    m.create_op(OpKind::Ast(op), &[], vec![], attrs, regions)
}

// Builders used by the parser. Each takes already-built child operations
// and wraps them in the region layout documented on the enum.

pub fn program(m: &mut Module, defs: Vec<OpId>, stmts: Vec<OpId>) -> OpId {
    let defs = m.region_from_ops(defs);
    let stmts = m.region_from_ops(stmts);
    create(m, AstOp::Program, vec![], vec![defs, stmts])
}

pub fn func_def(
    m: &mut Module,
    name: &str,
    params: Vec<OpId>,
    return_type: OpId,
    body: Vec<OpId>,
) -> OpId {
    let params = m.region_from_ops(params);
    let return_type = m.region_from_ops(vec![return_type]);
    let body = m.region_from_ops(body);
    create(
        m,
        AstOp::FuncDef,
        vec![("func_name", Attribute::Str(name.to_string()))],
        vec![params, return_type, body],
    )
}

pub fn typed_var(m: &mut Module, name: &str, ty: OpId) -> OpId {
    let ty = m.region_from_ops(vec![ty]);
    create(
        m,
        AstOp::TypedVar,
        vec![("var_name", Attribute::Str(name.to_string()))],
        vec![ty],
    )
}

pub fn type_name(m: &mut Module, name: &str) -> OpId {
    create(
        m,
        AstOp::TypeName,
        vec![("type_name", Attribute::Str(name.to_string()))],
        vec![],
    )
}

pub fn list_type(m: &mut Module, elem: OpId) -> OpId {
    let elem = m.region_from_ops(vec![elem]);
    create(m, AstOp::ListType, vec![], vec![elem])
}

pub fn var_def(m: &mut Module, typed_var: OpId, literal: OpId) -> OpId {
    let typed_var = m.region_from_ops(vec![typed_var]);
    let literal = m.region_from_ops(vec![literal]);
    create(m, AstOp::VarDef, vec![], vec![typed_var, literal])
}

pub fn global_decl(m: &mut Module, name: &str) -> OpId {
    create(
        m,
        AstOp::GlobalDecl,
        vec![("decl_name", Attribute::Str(name.to_string()))],
        vec![],
    )
}

pub fn nonlocal_decl(m: &mut Module, name: &str) -> OpId {
    create(
        m,
        AstOp::NonlocalDecl,
        vec![("decl_name", Attribute::Str(name.to_string()))],
        vec![],
    )
}

pub fn if_stmt(m: &mut Module, cond: OpId, then: Vec<OpId>, orelse: Vec<OpId>) -> OpId {
    let cond = m.region_from_ops(vec![cond]);
    let then = m.region_from_ops(then);
    let orelse = m.region_from_ops(orelse);
    create(m, AstOp::If, vec![], vec![cond, then, orelse])
}

pub fn while_stmt(m: &mut Module, cond: OpId, body: Vec<OpId>) -> OpId {
    let cond = m.region_from_ops(vec![cond]);
    let body = m.region_from_ops(body);
    create(m, AstOp::While, vec![], vec![cond, body])
}

pub fn for_stmt(m: &mut Module, iter_name: &str, iterable: OpId, body: Vec<OpId>) -> OpId {
    let iterable = m.region_from_ops(vec![iterable]);
    let body = m.region_from_ops(body);
    create(
        m,
        AstOp::For,
        vec![("iter_name", Attribute::Str(iter_name.to_string()))],
        vec![iterable, body],
    )
}

pub fn pass_stmt(m: &mut Module) -> OpId {
    create(m, AstOp::Pass, vec![], vec![])
}

pub fn return_stmt(m: &mut Module, value: Option<OpId>) -> OpId {
    let value = m.region_from_ops(value.into_iter().collect());
    create(m, AstOp::Return, vec![], vec![value])
}

pub fn assign(m: &mut Module, target: OpId, value: OpId) -> OpId {
    let target = m.region_from_ops(vec![target]);
    let value = m.region_from_ops(vec![value]);
    create(m, AstOp::Assign, vec![], vec![target, value])
}

pub fn literal(m: &mut Module, value: Attribute) -> OpId {
    create(m, AstOp::Literal, vec![("value", value)], vec![])
}

pub fn expr_name(m: &mut Module, id: &str) -> OpId {
    create(
        m,
        AstOp::ExprName,
        vec![("id", Attribute::Str(id.to_string()))],
        vec![],
    )
}

pub fn unary_expr(m: &mut Module, op: &str, value: OpId) -> OpId {
    let value = m.region_from_ops(vec![value]);
    create(
        m,
        AstOp::UnaryExpr,
        vec![("op", Attribute::Str(op.to_string()))],
        vec![value],
    )
}

pub fn binary_expr(m: &mut Module, op: &str, lhs: OpId, rhs: OpId) -> OpId {
    let lhs = m.region_from_ops(vec![lhs]);
    let rhs = m.region_from_ops(vec![rhs]);
    create(
        m,
        AstOp::BinaryExpr,
        vec![("op", Attribute::Str(op.to_string()))],
        vec![lhs, rhs],
    )
}

pub fn if_expr(m: &mut Module, cond: OpId, then: OpId, or_else: OpId) -> OpId {
    let cond = m.region_from_ops(vec![cond]);
    let then = m.region_from_ops(vec![then]);
    let or_else = m.region_from_ops(vec![or_else]);
    create(m, AstOp::IfExpr, vec![], vec![cond, then, or_else])
}

pub fn list_expr(m: &mut Module, elems: Vec<OpId>) -> OpId {
    let elems = m.region_from_ops(elems);
    create(m, AstOp::ListExpr, vec![], vec![elems])
}

pub fn index_expr(m: &mut Module, value: OpId, index: OpId) -> OpId {
    let value = m.region_from_ops(vec![value]);
    let index = m.region_from_ops(vec![index]);
    create(m, AstOp::IndexExpr, vec![], vec![value, index])
}

pub fn call_expr(m: &mut Module, func: &str, args: Vec<OpId>) -> OpId {
    let args = m.region_from_ops(args);
    create(
        m,
        AstOp::CallExpr,
        vec![("func", Attribute::Str(func.to_string()))],
        vec![args],
    )
}

/// The kind of an AST op, if `op` is one.
pub fn ast_kind(m: &Module, op: OpId) -> Option<AstOp> {
    match m.kind(op) {
        OpKind::Ast(kind) => Some(kind),
        _ => None,
    }
}

/// The single operation inside region `index` of `op`.
pub fn region_only_op(m: &Module, op: OpId, index: usize) -> OpId {
    let block = m.region_block(m.region(op, index));
    let ops = m.block_ops(block);
    debug_assert_eq!(ops.len(), 1, "expected a single-op region");
    ops[0]
}

/// All operations inside region `index` of `op`.
pub fn region_ops(m: &Module, op: OpId, index: usize) -> Vec<OpId> {
    m.block_ops(m.region_block(m.region(op, index)))
}

pub fn verify(m: &Module, op: OpId, kind: AstOp) -> Result<(), VerifyError> {
    let child_kinds = |index: usize| -> Vec<AstOp> {
        region_ops(m, op, index)
            .iter()
            .filter_map(|o| ast_kind(m, *o))
            .collect()
    };
    match kind {
        AstOp::Program => {
            for def in child_kinds(0) {
                if !matches!(def, AstOp::VarDef | AstOp::FuncDef | AstOp::ClassDef) {
                    return Err(VerifyError::new(format!(
                        "program first region expects definitions, but got {}",
                        def.diag_name()
                    )));
                }
            }
            for stmt in child_kinds(1) {
                if !stmt.is_statement() {
                    return Err(VerifyError::new(format!(
                        "program second region expects statements, but got {}",
                        stmt.diag_name()
                    )));
                }
            }
        }
        AstOp::FuncDef => {
            for param in child_kinds(0) {
                if param != AstOp::TypedVar {
                    return Err(VerifyError::new(format!(
                        "func_def first region expects typed_var operations, but got {}",
                        param.diag_name()
                    )));
                }
            }
            let return_type = child_kinds(1);
            if return_type.len() != 1 || !return_type[0].is_type() {
                return Err(VerifyError::new("func_def expects a single return type"));
            }
            // Declarations first, then statements.
            let mut in_stmts = false;
            for child in child_kinds(2) {
                let is_decl = matches!(
                    child,
                    AstOp::GlobalDecl | AstOp::NonlocalDecl | AstOp::VarDef
                );
                if is_decl {
                    if in_stmts {
                        return Err(VerifyError::new(
                            "func_def body expects declarations before statements",
                        ));
                    }
                } else if child.is_statement() {
                    in_stmts = true;
                } else {
                    return Err(VerifyError::new(format!(
                        "func_def body expects declarations and statements, but got {}",
                        child.diag_name()
                    )));
                }
            }
        }
        AstOp::TypedVar | AstOp::ListType => {
            let inner = child_kinds(0);
            if inner.len() != 1 || !inner[0].is_type() {
                return Err(VerifyError::new(format!(
                    "{} expects a single type operation in its region",
                    kind.diag_name()
                )));
            }
        }
        AstOp::TypeName => {
            let legal = ["object", "int", "bool", "str", "<None>"];
            let name = m.attr(op, "type_name").and_then(|a| a.as_str().map(String::from));
            match name {
                Some(n) if legal.contains(&n.as_str()) => {}
                other => {
                    return Err(VerifyError::new(format!(
                        "type_name expects a type name, but got {:?}",
                        other
                    )));
                }
            }
        }
        AstOp::VarDef => {
            if child_kinds(0) != vec![AstOp::TypedVar] {
                return Err(VerifyError::new(
                    "var_def expects a single typed_var in its first region",
                ));
            }
            if child_kinds(1) != vec![AstOp::Literal] {
                return Err(VerifyError::new(
                    "var_def expects a single literal in its second region",
                ));
            }
        }
        _ => {}
    }
    Ok(())
}
