//! Compilation passes, in pipeline order.
//!
//! Semantic analysis over the AST (`check_assign_target`,
//! `warn_dead_code`), the AST→flat lowering, the flat-IR transforms
//! (`introduce_library_calls`, `constant_folding`,
//! `dead_code_elimination`, `for_to_while`), and the flat→RISC-V SSA
//! lowering. The register allocator and emitter live in
//! [`crate::backend`].

pub mod ast_to_flat;
pub mod check_assign_target;
pub mod constant_folding;
pub mod dead_code_elimination;
pub mod flat_to_riscv;
pub mod for_to_while;
pub mod introduce_library_calls;
pub mod warn_dead_code;
