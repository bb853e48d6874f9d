//! The RISC-V backend: spill-everything register allocation, runtime
//! routine emission, and the assembly printer.

pub mod emit;
pub mod regalloc;
pub mod runtime;
