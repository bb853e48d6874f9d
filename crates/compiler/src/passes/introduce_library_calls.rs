//! Replace polymorphic built-ins with concrete runtime-library calls.
//!
//! `print` dispatches on its argument type to `_print_bool` /
//! `_print_int` / `_print_str` (anything else is a compile-time error),
//! `input` becomes `_input`, `+` on lists and strings becomes
//! `_list_concat`, and string (in)equality becomes `_str_eq` (negated
//! through `not` for `!=`).

use crate::dialects::flat::{self, FlatOp, flat_kind};
use crate::dialects::types;
use crate::error::CompileError;
use crate::ir::rewriter::{PatternWalker, RewritePattern, Rewriter};
use crate::ir::{Module, OpId};

struct CallExprPattern;

impl RewritePattern for CallExprPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::CallExpr) {
            return Ok(false);
        }
        let name = rewriter
            .module
            .attr(op, "func_name")
            .and_then(|a| a.as_str().map(String::from))
            .unwrap_or_default();

        if name == "input" {
            let call = flat::call_expr(rewriter.module, "_input", &[], Some(types::str_type()));
            let result = rewriter.module.result(call, 0);
            let map: Vec<_> = (0..rewriter.module.num_results(op))
                .map(|_| Some(result))
                .collect();
            rewriter.replace_op(op, &[call], &map)?;
            return Ok(true);
        }

        if name != "print" {
            return Ok(false);
        }
        let arg_ty = rewriter.module.value_type(rewriter.module.operand(op, 0));
        let target = if arg_ty == types::bool_type() {
            "_print_bool"
        } else if arg_ty == types::int_type() {
            "_print_int"
        } else if arg_ty == types::str_type() {
            "_print_str"
        } else {
            return Err(CompileError::semantic(
                "Type Error: Cannot print an object of type different than bool, int, or str",
            ));
        };
        let operands = rewriter.module.operands(op);
        let had_result = rewriter.module.num_results(op) > 0;
        let call = flat::call_expr(
            rewriter.module,
            target,
            &operands,
            had_result.then(types::none_type),
        );
        let map: Vec<_> = (0..rewriter.module.num_results(op))
            .map(|_| Some(rewriter.module.result(call, 0)))
            .collect();
        rewriter.replace_op(op, &[call], &map)?;
        Ok(true)
    }
}

struct BinaryExprPattern;

impl RewritePattern for BinaryExprPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::BinaryExpr) {
            return Ok(false);
        }
        let operator = rewriter
            .module
            .attr(op, "op")
            .and_then(|a| a.as_str().map(String::from))
            .unwrap_or_default();
        let operands = rewriter.module.operands(op);
        let result_ty = rewriter.module.value_type(rewriter.module.result(op, 0));
        let lhs_ty = rewriter.module.value_type(operands[0]);

        if operator == "+" && (result_ty.is_list() || result_ty == types::str_type()) {
            let call = flat::call_expr(
                rewriter.module,
                "_list_concat",
                &operands,
                Some(result_ty),
            );
            let result = rewriter.module.result(call, 0);
            rewriter.replace_op(op, &[call], &[Some(result)])?;
            return Ok(true);
        }

        if operator == "==" && lhs_ty == types::str_type() {
            let call = flat::call_expr(rewriter.module, "_str_eq", &operands, Some(result_ty));
            let result = rewriter.module.result(call, 0);
            rewriter.replace_op(op, &[call], &[Some(result)])?;
            return Ok(true);
        }

        if operator == "!=" && lhs_ty == types::str_type() {
            let call = flat::call_expr(rewriter.module, "_str_eq", &operands, Some(result_ty));
            let call_result = rewriter.module.result(call, 0);
            let complement = flat::unary_expr(rewriter.module, "not", call_result);
            let result = rewriter.module.result(complement, 0);
            rewriter.replace_op(op, &[call, complement], &[Some(result)])?;
            return Ok(true);
        }

        Ok(false)
    }
}

pub fn introduce_library_calls(module: &mut Module) -> Result<(), CompileError> {
    PatternWalker::once().rewrite_module(
        module,
        &mut [&mut CallExprPattern, &mut BinaryExprPattern],
    )
}
