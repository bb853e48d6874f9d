//! Expand `for` loops into canonical indexed `while` iteration.
//!
//! `for x in xs: B` becomes
//!
//! ```text
//! i = alloc int; store i, 0
//! while load i < len(xs):
//!     store x, load (address of xs[load i])
//!     B
//!     store i, load i + 1
//! ```
//!
//! using `get_address` for lists and `index_string` for strings. The
//! `len` call lowers later to an inline length load with a None check.
//! Iterating `[]` (the `<Empty>` type) executes the body zero times, so
//! the whole loop is simply dropped.

use crate::dialects::flat::{self, FlatOp, flat_kind};
use crate::dialects::types;
use crate::error::CompileError;
use crate::ir::rewriter::{PatternWalker, RewritePattern, Rewriter};
use crate::ir::{Attribute, OpId};

struct ForPattern;

impl RewritePattern for ForPattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError> {
        if flat_kind(rewriter.module, op) != Some(FlatOp::For) {
            return Ok(false);
        }
        let iterator = rewriter.module.operand(op, 0);
        let iterable = rewriter.module.operand(op, 1);
        let iterable_ty = rewriter.module.value_type(iterable);

        if iterable_ty == types::empty_type() {
            // Iterating `[]` runs the body zero times.
            rewriter.replace_op(op, &[], &[])?;
            return Ok(true);
        }

        let m = &mut *rewriter.module;

        // Index variable.
        let index_alloc = flat::alloc(m, types::int_type());
        let index_loc = m.result(index_alloc, 0);
        let zero = flat::literal(m, Attribute::Int(0));
        let zero_value = m.result(zero, 0);
        let init_store = flat::store(m, index_loc, zero_value);

        // Condition: load i < len(xs).
        let cond_load = flat::load(m, index_loc);
        let cond_index = m.result(cond_load, 0);
        let len_call = flat::call_expr(m, "len", &[iterable], Some(types::int_type()));
        let len_value = m.result(len_call, 0);
        let cmp = flat::binary_expr(m, "<", cond_index, len_value, types::bool_type());
        let cmp_value = m.result(cmp, 0);
        let cond_yield = flat::yield_value(m, cmp_value);
        let cond_region = m.region_from_ops(vec![cond_load, len_call, cmp, cond_yield]);

        // Body: bind the loop variable, run the original body, bump the
        // index.
        let body_load = flat::load(m, index_loc);
        let body_index = m.result(body_load, 0);
        let address = if iterable_ty == types::str_type() {
            flat::index_string(m, iterable, body_index)
        } else if let Some(elem) = iterable_ty.list_elem() {
            let elem = elem.clone();
            flat::get_address(m, iterable, body_index, elem)
        } else {
            return Err(CompileError::semantic(format!(
                "cannot iterate over a value of type `{}`",
                iterable_ty
            )));
        };
        let elem_load = flat::load(m, m.result(address, 0));
        let elem_value = m.result(elem_load, 0);
        let bind_store = flat::store(m, iterator, elem_value);

        let original_body = m.block_ops(m.region_block(m.region(op, 0)));
        for body_op in &original_body {
            m.detach_op(*body_op);
        }

        let bump_load = flat::load(m, index_loc);
        let bump_index = m.result(bump_load, 0);
        let one = flat::literal(m, Attribute::Int(1));
        let one_value = m.result(one, 0);
        let bump_add = flat::binary_expr(m, "+", bump_index, one_value, types::int_type());
        let bump_value = m.result(bump_add, 0);
        let bump_store = flat::store(m, index_loc, bump_value);

        let mut body_ops = vec![body_load, address, elem_load, bind_store];
        body_ops.extend(original_body);
        body_ops.extend([bump_load, one, bump_add, bump_store]);
        let body_region = m.region_from_ops(body_ops);

        let while_op = flat::while_stmt(m, cond_region, body_region);
        rewriter.replace_op(op, &[index_alloc, zero, init_store, while_op], &[])?;
        Ok(true)
    }
}

pub fn for_to_while(module: &mut crate::ir::Module) -> Result<(), CompileError> {
    PatternWalker::new().rewrite_module(module, &mut [&mut ForPattern])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::verify_module;
    use crate::ir::Module;
    use crate::passes::ast_to_flat::ast_to_flat;
    use crate::passes::introduce_library_calls::introduce_library_calls;
    use crate::parser::parse_program;
    use crate::typechecker::type_check;

    fn pipeline(source: &str) -> Module {
        let mut m = parse_program(source).unwrap();
        type_check(&mut m).unwrap();
        let mut flat = ast_to_flat(&m).unwrap();
        introduce_library_calls(&mut flat).unwrap();
        for_to_while(&mut flat).unwrap();
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
    fn test_for_becomes_while_with_len() {
        let m = pipeline("x: int = 0\nxs: [int] = None\nfor x in xs:\n    print(x)\n");
        assert_eq!(count(&m, FlatOp::For), 0);
        assert_eq!(count(&m, FlatOp::While), 1);
        let len_calls = m
            .walk()
            .into_iter()
            .filter(|op| {
                flat_kind(&m, *op) == Some(FlatOp::CallExpr)
                    && m.attr(*op, "func_name") == Some(Attribute::Str("len".to_string()))
            })
            .count();
        assert_eq!(len_calls, 1);
        assert_eq!(count(&m, FlatOp::GetAddress), 1);
    }

    #[test]
    fn test_body_moves_into_while() {
        let m = pipeline("x: int = 0\nxs: [int] = None\nfor x in xs:\n    print(x)\n");
        let while_op = m
            .walk()
            .into_iter()
            .find(|op| flat_kind(&m, *op) == Some(FlatOp::While))
            .unwrap();
        let body_ops = m.block_ops(m.region_block(m.region(while_op, 1)));
        // Binding stores plus the original body plus the increment.
        assert!(body_ops.iter().any(|op| {
            flat_kind(&m, *op) == Some(FlatOp::CallExpr)
                && m.attr(*op, "func_name") == Some(Attribute::Str("_print_int".to_string()))
        }));
        // Last op is the index bump store.
        assert_eq!(flat_kind(&m, *body_ops.last().unwrap()), Some(FlatOp::Store));
    }

    #[test]
    fn test_string_iteration_uses_index_string() {
        let m = pipeline("c: str = \"\"\ns: str = \"hey\"\nfor c in s:\n    print(c)\n");
        assert_eq!(count(&m, FlatOp::IndexString), 1);
        assert_eq!(count(&m, FlatOp::For), 0);
    }

    #[test]
    fn test_empty_list_loop_dropped() {
        let m = pipeline("x: int = 0\nfor x in []:\n    print(x)\n");
        assert_eq!(count(&m, FlatOp::For), 0);
        assert_eq!(count(&m, FlatOp::While), 0);
    }
}
