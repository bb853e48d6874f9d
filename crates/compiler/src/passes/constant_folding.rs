//! Constant folding over the flat IR.
//!
//! Folds `+` of two integer literals into a single literal. Other
//! operators follow the same shape when they are needed; addition is the
//! one the pipeline relies on.

use crate::dialects::flat::{self, FlatOp, flat_kind};
use crate::error::CompileError;
use crate::ir::rewriter::{PatternWalker, RewritePattern, Rewriter};
use crate::ir::{Attribute, Module, OpId};

struct FoldAddPattern;

impl FoldAddPattern {
    /// The payload of an integer literal defining `value`, if any.
    fn integer_literal(m: &Module, value: crate::ir::ValueId) -> Option<i32> {
        let def = m.def_op(value)?;
        if flat_kind(m, def) != Some(FlatOp::Literal) {
            return None;
        }
        m.attr(def, "value")?.as_int()
    }
}

impl RewritePattern for FoldAddPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::BinaryExpr) {
            return Ok(false);
        }
        if rewriter.module.attr(op, "op") != Some(Attribute::Str("+".to_string())) {
            return Ok(false);
        }
        let lhs = Self::integer_literal(rewriter.module, rewriter.module.operand(op, 0));
        let rhs = Self::integer_literal(rewriter.module, rewriter.module.operand(op, 1));
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Ok(false);
        };
        let folded = flat::literal(rewriter.module, Attribute::Int(lhs.wrapping_add(rhs)));
        let result = rewriter.module.result(folded, 0);
        rewriter.replace_op(op, &[folded], &[Some(result)])?;
        Ok(true)
    }
}

pub fn constant_folding(module: &mut Module) -> Result<(), CompileError> {
    PatternWalker::new().rewrite_module(module, &mut [&mut FoldAddPattern])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::verify_module;
    use crate::passes::ast_to_flat::ast_to_flat;
    use crate::passes::introduce_library_calls::introduce_library_calls;
    use crate::parser::parse_program;
    use crate::typechecker::type_check;

    fn fold(source: &str) -> Module {
        let mut m = parse_program(source).unwrap();
        type_check(&mut m).unwrap();
        let mut flat = ast_to_flat(&m).unwrap();
        introduce_library_calls(&mut flat).unwrap();
        constant_folding(&mut flat).unwrap();
        verify_module(&flat).unwrap();
        flat
    }

    fn literal_values(m: &Module) -> Vec<i32> {
        m.walk()
            .into_iter()
            .filter(|op| flat_kind(m, *op) == Some(FlatOp::Literal))
            .filter_map(|op| m.attr(op, "value").and_then(|a| a.as_int()))
            .collect()
    }

    #[test]
    fn test_folds_addition() {
        let m = fold("print(1 + 2)\n");
        assert!(literal_values(&m).contains(&3));
        assert!(
            !m.walk()
                .into_iter()
                .any(|op| flat_kind(&m, op) == Some(FlatOp::BinaryExpr))
        );
    }

    #[test]
    fn test_folds_nested_chain() {
        let m = fold("print(1 + 2 + 3)\n");
        assert!(literal_values(&m).contains(&6));
    }

    #[test]
    fn test_leaves_non_literal_operands() {
        let m = fold("x: int = 1\nprint(x + 2)\n");
        assert!(
            m.walk()
                .into_iter()
                .any(|op| flat_kind(&m, op) == Some(FlatOp::BinaryExpr))
        );
    }

    #[test]
    fn test_idempotent() {
        let mut m = fold("print(1 + 2)\n");
        let once = crate::ir::printer::print_module(&m);
        constant_folding(&mut m).unwrap();
        assert_eq!(once, crate::ir::printer::print_module(&m));
    }
}
