//! Operation dialects.
//!
//! Each lowering stage has its own vocabulary of operations: the typed
//! source AST, the flat SSA IR, and the two RISC-V instruction sets
//! (virtual-register and physical-register). A uniform
//! [`crate::ir::Module`] record carries the common structure; the dialect
//! is the kind tag plus the verification predicate for it.

pub mod ast;
pub mod flat;
pub mod riscv;
pub mod types;

use crate::ir::{Module, OpId, VerifyError};

/// The kind tag of an operation: which dialect, which operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Ast(ast::AstOp),
    Flat(flat::FlatOp),
    /// RISC-V over virtual registers (SSA values).
    RiscvSsa(riscv::RvOp),
    /// RISC-V over physical registers (register attributes).
    Riscv(riscv::RvOp),
}

impl OpKind {
    /// Fully qualified operation name, e.g. `choco.ir.binary_expr` or
    /// `riscv_ssa.addi`.
    pub fn name(&self) -> String {
        match self {
            OpKind::Ast(op) => format!("choco.ast.{}", op.short_name()),
            OpKind::Flat(op) => format!("choco.ir.{}", op.short_name()),
            OpKind::RiscvSsa(op) => format!("riscv_ssa.{}", op.mnemonic()),
            OpKind::Riscv(op) => format!("riscv.{}", op.mnemonic()),
        }
    }
}

/// Verify the whole module: kernel invariants first, then each
/// operation's local predicate.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module.verify_structure()?;
    for op in module.walk() {
        verify_op(module, op)?;
    }
    Ok(())
}

fn verify_op(module: &Module, op: OpId) -> Result<(), VerifyError> {
    match module.kind(op) {
        OpKind::Ast(kind) => ast::verify(module, op, kind),
        OpKind::Flat(kind) => flat::verify(module, op, kind),
        // The RISC-V dialects carry no type structure beyond the kernel
        // invariants.
        OpKind::RiscvSsa(_) | OpKind::Riscv(_) => Ok(()),
    }
}
