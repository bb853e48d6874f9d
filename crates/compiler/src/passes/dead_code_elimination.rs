//! Dead-code elimination over the flat IR.
//!
//! Erases literals and side-effect-free binary expressions whose results
//! have no remaining uses. The walk is reverse order, so uses disappear
//! before their definitions and chains of dead values unravel in one
//! fixed-point run. Binary expressions anywhere inside a `while` are kept:
//! their operands may be observed indirectly through the loop.

use crate::dialects::flat::{FlatOp, flat_kind};
use crate::dialects::OpKind;
use crate::error::CompileError;
use crate::ir::rewriter::{PatternWalker, RewritePattern, Rewriter};
use crate::ir::{Module, OpId};

struct DeadLiteralPattern;

impl RewritePattern for DeadLiteralPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::Literal) {
            return Ok(false);
        }
        if rewriter.module.num_uses(rewriter.module.result(op, 0)) > 0 {
            return Ok(false);
        }
        rewriter.replace_op(op, &[], &[None])?;
        Ok(true)
    }
}

struct DeadBinaryExprPattern;

impl DeadBinaryExprPattern {
    fn inside_while(m: &Module, op: OpId) -> bool {
        let mut current = m.parent_op(op);
        while let Some(ancestor) = current {
            if m.kind(ancestor) == OpKind::Flat(FlatOp::While) {
                return true;
            }
            current = m.parent_op(ancestor);
        }
        false
    }
}

impl RewritePattern for DeadBinaryExprPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::BinaryExpr) {
            return Ok(false);
        }
        if Self::inside_while(rewriter.module, op) {
            return Ok(false);
        }
        if rewriter.module.num_uses(rewriter.module.result(op, 0)) > 0 {
            return Ok(false);
        }
        rewriter.replace_op(op, &[], &[None])?;
        Ok(true)
    }
}

pub fn dead_code_elimination(module: &mut Module) -> Result<(), CompileError> {
    PatternWalker::new()
        .reversed()
        .rewrite_module(module, &mut [&mut DeadLiteralPattern, &mut DeadBinaryExprPattern])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::verify_module;
    use crate::passes::ast_to_flat::ast_to_flat;
    use crate::passes::constant_folding::constant_folding;
    use crate::passes::introduce_library_calls::introduce_library_calls;
    use crate::parser::parse_program;
    use crate::typechecker::type_check;

    fn pipeline(source: &str) -> Module {
        let mut m = parse_program(source).unwrap();
        type_check(&mut m).unwrap();
        let mut flat = ast_to_flat(&m).unwrap();
        introduce_library_calls(&mut flat).unwrap();
        constant_folding(&mut flat).unwrap();
        dead_code_elimination(&mut flat).unwrap();
        verify_module(&flat).unwrap();
        flat
    }

    fn count(m: &Module, kind: FlatOp) -> usize {
        m.walk()
            .into_iter()
            .filter(|op| flat_kind(m, *op) == Some(kind))
            .count()
    }

    #[test]
    fn test_folded_operands_are_cleaned_up() {
        // After folding `1 + 2`, the original literals are unused.
        let m = pipeline("print(1 + 2)\n");
        assert_eq!(count(&m, FlatOp::Literal), 1);
        assert_eq!(count(&m, FlatOp::BinaryExpr), 0);
    }

    #[test]
    fn test_expression_statement_removed() {
        // A bare expression statement has no uses and no side effects.
        let m = pipeline("x: int = 1\nx + 2\nprint(x)\n");
        assert_eq!(count(&m, FlatOp::BinaryExpr), 0);
    }

    #[test]
    fn test_binary_in_while_body_kept() {
        let m = pipeline("x: int = 0\nwhile x < 3:\n    x + 1\n    x = x + 1\n");
        // Both the discarded `x + 1` and the assignment's `x + 1` survive,
        // along with the condition comparison.
        assert_eq!(count(&m, FlatOp::BinaryExpr), 3);
    }

    #[test]
    fn test_monotone() {
        let mut m = pipeline("print(1 + 2)\n");
        let before = m.op_count();
        dead_code_elimination(&mut m).unwrap();
        assert!(m.op_count() <= before);
    }
}
