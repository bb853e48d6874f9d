//! Check that every assignment target is assignable.
//!
//! The left-hand side of an assignment must be a variable name or an
//! index expression; anything else is reported with its operation kind.

use crate::dialects::ast::{self, AstOp};
use crate::error::CompileError;
use crate::ir::Module;

pub fn check_assign_target(m: &Module) -> Result<(), CompileError> {
    for op in m.walk() {
        if ast::ast_kind(m, op) != Some(AstOp::Assign) {
            continue;
        }
        let target = ast::region_only_op(m, op, 0);
        match ast::ast_kind(m, target) {
            Some(AstOp::ExprName) | Some(AstOp::IndexExpr) => {}
            Some(other) => {
                return Err(CompileError::semantic(format!(
                    "Found {} as the left-hand side of an assignment. \
                     Expected to find variable name or index expression only.",
                    other.diag_name()
                )));
            }
            None => {
                return Err(CompileError::semantic(
                    "Found a non-AST operation as the left-hand side of an assignment.",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn test_literal_target_rejected() {
        let m = parse_program("1 = x\n").unwrap();
        let err = check_assign_target(&m).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Found Literal as the left-hand side of an assignment."));
    }

    #[test]
    fn test_call_target_rejected() {
        let m = parse_program("f() = 1\n").unwrap();
        let err = check_assign_target(&m).unwrap_err();
        assert!(err.to_string().contains("CallExpr"));
    }

    #[test]
    fn test_name_and_index_targets_accepted() {
        let m = parse_program("x = 1\nxs[0] = 2\na = b = 3\n").unwrap();
        check_assign_target(&m).unwrap();
    }
}
