//! Greedy pattern-rewrite driver.
//!
//! A pass is a set of [`RewritePattern`]s applied by a [`PatternWalker`].
//! The walker visits every live operation, offers it to each pattern in
//! turn, and — when `apply_recursively` is set — restarts until a full
//! sweep makes no change. Termination relies on every rewrite strictly
//! shrinking some measure (ops that are not re-matched, or fewer uses);
//! a round cap catches patterns that violate that contract.

use crate::error::CompileError;

use super::{BlockId, Module, OpId, ValueId, VerifyError};

/// Mutation interface handed to patterns. All structural edits go through
/// here so the walker can tell whether a sweep changed anything.
pub struct Rewriter<'m> {
    pub module: &'m mut Module,
    changed: bool,
}

impl<'m> Rewriter<'m> {
    pub fn new(module: &'m mut Module) -> Rewriter<'m> {
        Rewriter {
            module,
            changed: false,
        }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Replace `old` with `new_ops`; `result_map` entries of `None` assert
    /// the corresponding result has no remaining uses.
    pub fn replace_op(
        &mut self,
        old: OpId,
        new_ops: &[OpId],
        result_map: &[Option<ValueId>],
    ) -> Result<(), VerifyError> {
        self.changed = true;
        self.module.replace_op(old, new_ops, result_map, true)
    }

    /// As [`Rewriter::replace_op`] but without the remaining-use check.
    pub fn replace_op_unchecked(
        &mut self,
        old: OpId,
        new_ops: &[OpId],
        result_map: &[Option<ValueId>],
    ) -> Result<(), VerifyError> {
        self.changed = true;
        self.module.replace_op(old, new_ops, result_map, false)
    }

    pub fn erase_op(&mut self, op: OpId) {
        self.changed = true;
        self.module.erase_op(op);
    }

    pub fn insert_before(&mut self, anchor: OpId, ops: &[OpId]) {
        self.changed = true;
        self.module.insert_before(anchor, ops);
    }

    pub fn insert_after(&mut self, anchor: OpId, ops: &[OpId]) {
        self.changed = true;
        self.module.insert_after(anchor, ops);
    }

    pub fn inline_block_after(&mut self, block: BlockId, anchor: OpId) {
        self.changed = true;
        self.module.inline_block_after(block, anchor);
    }
}

/// One rewrite rule. `match_and_rewrite` returns whether it fired; a
/// pattern that does not match must leave the module untouched.
pub trait RewritePattern {
    fn match_and_rewrite(
        &mut self,
        rewriter: &mut Rewriter<'_>,
        op: OpId,
    ) -> Result<bool, CompileError>;
}

/// Drives patterns over a module.
pub struct PatternWalker {
    /// Re-run the sweep until a fixed point (ops produced by rewrites are
    /// reconsidered).
    pub apply_recursively: bool,
    /// Visit operations from the last one backwards, so uses are seen
    /// before their definitions.
    pub walk_reverse: bool,
    /// Defensive cap on fixed-point rounds.
    pub max_rounds: usize,
}

impl Default for PatternWalker {
    fn default() -> Self {
        PatternWalker::new()
    }
}

impl PatternWalker {
    pub fn new() -> PatternWalker {
        PatternWalker {
            apply_recursively: true,
            walk_reverse: false,
            max_rounds: 1000,
        }
    }

    /// A single forward sweep, no fixed-point iteration.
    pub fn once() -> PatternWalker {
        PatternWalker {
            apply_recursively: false,
            ..PatternWalker::new()
        }
    }

    pub fn reversed(mut self) -> PatternWalker {
        self.walk_reverse = true;
        self
    }

    pub fn rewrite_module(
        &self,
        module: &mut Module,
        patterns: &mut [&mut dyn RewritePattern],
    ) -> Result<(), CompileError> {
        for _ in 0..self.max_rounds {
            let mut sweep_changed = false;
            let mut order = module.walk();
            if self.walk_reverse {
                order.reverse();
            }
            for op in order {
                // A previous rewrite in this sweep may have erased it.
                if module.is_erased(op) {
                    continue;
                }
                for pattern in patterns.iter_mut() {
                    let mut rewriter = Rewriter::new(module);
                    let matched = pattern.match_and_rewrite(&mut rewriter, op)?;
                    if matched || rewriter.changed() {
                        sweep_changed = true;
                        break;
                    }
                }
            }
            if !sweep_changed || !self.apply_recursively {
                return Ok(());
            }
        }
        Err(CompileError::Verify(VerifyError::new(
            "pattern rewriting did not reach a fixed point",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::flat::FlatOp;
    use crate::dialects::types;
    use crate::ir::{Attribute, OpKind};

    /// Rewrites `literal n` (n > 0) to `literal 0`, once per op.
    struct ZeroPattern;

    impl RewritePattern for ZeroPattern {
        fn match_and_rewrite(
            &mut self,
            rewriter: &mut Rewriter<'_>,
            op: OpId,
        ) -> Result<bool, CompileError> {
            if rewriter.module.kind(op) != OpKind::Flat(FlatOp::Literal) {
                return Ok(false);
            }
            let Some(Attribute::Int(v)) = rewriter.module.attr(op, "value") else {
                return Ok(false);
            };
            if v == 0 {
                return Ok(false);
            }
            let zero = rewriter.module.create_op(
                OpKind::Flat(FlatOp::Literal),
                &[],
                vec![types::int_type()],
                vec![("value", Attribute::Int(0))],
                vec![],
            );
            let zero_result = rewriter.module.result(zero, 0);
            rewriter.replace_op(op, &[zero], &[Some(zero_result)])?;
            Ok(true)
        }
    }

    #[test]
    fn test_fixed_point_rewrites_all() {
        let mut m = Module::new();
        let top = m.top_block();
        for v in 1..4 {
            let lit = m.create_op(
                OpKind::Flat(FlatOp::Literal),
                &[],
                vec![types::int_type()],
                vec![("value", Attribute::Int(v))],
                vec![],
            );
            m.append_op(top, lit);
        }
        PatternWalker::new()
            .rewrite_module(&mut m, &mut [&mut ZeroPattern])
            .unwrap();
        for op in m.walk() {
            assert_eq!(m.attr(op, "value"), Some(Attribute::Int(0)));
        }
        m.verify_structure().unwrap();
    }

    /// A pattern that keeps replacing an op with a re-matching clone; the
    /// walker must hit its round cap instead of spinning forever.
    struct SpinningPattern;

    impl RewritePattern for SpinningPattern {
        fn match_and_rewrite(
            &mut self,
            rewriter: &mut Rewriter<'_>,
            op: OpId,
        ) -> Result<bool, CompileError> {
            if rewriter.module.kind(op) != OpKind::Flat(FlatOp::Pass) {
                return Ok(false);
            }
            let clone =
                rewriter
                    .module
                    .create_op(OpKind::Flat(FlatOp::Pass), &[], vec![], vec![], vec![]);
            rewriter.replace_op(op, &[clone], &[])?;
            Ok(true)
        }
    }

    #[test]
    fn test_round_cap_terminates() {
        let mut m = Module::new();
        let top = m.top_block();
        let p = m.create_op(OpKind::Flat(FlatOp::Pass), &[], vec![], vec![], vec![]);
        m.append_op(top, p);
        let walker = PatternWalker {
            max_rounds: 16,
            ..PatternWalker::new()
        };
        assert!(walker.rewrite_module(&mut m, &mut [&mut SpinningPattern]).is_err());
    }
}
