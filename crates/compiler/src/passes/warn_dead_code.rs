//! AST-level dead-code detection.
//!
//! Flags statements that can never execute: anything following a `return`
//! in the same block, and `if`/`while` bodies guarded by a literal
//! `False`. Reported as a warning that ends the pipeline when the driver
//! runs with the `warn` stopping point; full pipelines skip this pass so
//! the assembly output is not littered.

use crate::dialects::ast::{self, AstOp};
use crate::error::CompileError;
use crate::ir::{Attribute, Module, OpId};

pub fn warn_dead_code(m: &Module) -> Result<(), CompileError> {
    let top_ops = m.block_ops(m.top_block());
    let Some(program) = top_ops.first() else {
        return Ok(());
    };
    for def in ast::region_ops(m, *program, 0) {
        if ast::ast_kind(m, def) == Some(AstOp::FuncDef) {
            check_block(m, &ast::region_ops(m, def, 2))?;
        }
    }
    check_block(m, &ast::region_ops(m, *program, 1))
}

fn check_block(m: &Module, stmts: &[OpId]) -> Result<(), CompileError> {
    for (index, stmt) in stmts.iter().enumerate() {
        match ast::ast_kind(m, *stmt) {
            Some(AstOp::Return) => {
                if index + 1 < stmts.len() {
                    return Err(CompileError::DeadCode(
                        "unreachable statement after `return`".to_string(),
                    ));
                }
            }
            Some(AstOp::If) => {
                if is_false_literal(m, ast::region_only_op(m, *stmt, 0)) {
                    return Err(CompileError::DeadCode(
                        "`if False` branch is never executed".to_string(),
                    ));
                }
                check_block(m, &ast::region_ops(m, *stmt, 1))?;
                check_block(m, &ast::region_ops(m, *stmt, 2))?;
            }
            Some(AstOp::While) => {
                if is_false_literal(m, ast::region_only_op(m, *stmt, 0)) {
                    return Err(CompileError::DeadCode(
                        "`while False` body is never executed".to_string(),
                    ));
                }
                check_block(m, &ast::region_ops(m, *stmt, 1))?;
            }
            Some(AstOp::For) => check_block(m, &ast::region_ops(m, *stmt, 1))?,
            _ => {}
        }
    }
    Ok(())
}

fn is_false_literal(m: &Module, expr: OpId) -> bool {
    ast::ast_kind(m, expr) == Some(AstOp::Literal)
        && m.attr(expr, "value") == Some(Attribute::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn test_statement_after_return() {
        let source = "def f() -> int:\n    return 1\n    return 2\nprint(f())\n";
        let m = parse_program(source).unwrap();
        let err = warn_dead_code(&m).unwrap_err();
        assert!(matches!(err, CompileError::DeadCode(_)));
    }

    #[test]
    fn test_while_false() {
        let m = parse_program("while False:\n    pass\n").unwrap();
        assert!(warn_dead_code(&m).is_err());
    }

    #[test]
    fn test_live_code_passes() {
        let m = parse_program("x: int = 0\nwhile x < 3:\n    x = x + 1\n").unwrap();
        warn_dead_code(&m).unwrap();
    }
}
