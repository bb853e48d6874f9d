//! Debug printer for IR modules.
//!
//! Prints each operation with its result values (`%N`), operand
//! references, attribute dictionary, and nested regions in braces. The
//! output is for humans and tests; it is not parsed back.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::{BlockId, Module, OpId, ValueId};

pub struct Printer<'m> {
    module: &'m Module,
    names: HashMap<ValueId, usize>,
    next_name: usize,
}

impl<'m> Printer<'m> {
    pub fn new(module: &'m Module) -> Printer<'m> {
        let mut p = Printer {
            module,
            names: HashMap::new(),
            next_name: 0,
        };
        p.assign_block_names(module.top_block());
        p
    }

    fn assign_block_names(&mut self, block: BlockId) {
        for arg in self.module.block_args(block) {
            self.name_of(arg);
        }
        for op in self.module.block_ops(block) {
            for result in self.module.results(op) {
                self.name_of(result);
            }
            for region in self.module.regions(op) {
                self.assign_block_names(self.module.region_block(region));
            }
        }
    }

    fn name_of(&mut self, value: ValueId) -> usize {
        if let Some(n) = self.names.get(&value) {
            return *n;
        }
        let n = self.next_name;
        self.next_name += 1;
        self.names.insert(value, n);
        n
    }

    /// The printed name of a value (`%N`), assigning one if needed.
    pub fn value_ref(&mut self, value: ValueId) -> String {
        format!("%{}", self.name_of(value))
    }

    /// Render one operation on a single line, nested regions elided to
    /// `{...}`. Used for assembly comments carrying the pre-allocation
    /// operation text.
    pub fn render_op_inline(&mut self, op: OpId) -> String {
        let mut line = String::new();
        self.write_op_head(&mut line, op);
        for _ in self.module.regions(op) {
            line.push_str(" {...}");
        }
        line
    }

    fn write_op_head(&mut self, out: &mut String, op: OpId) {
        let results = self.module.results(op);
        if !results.is_empty() {
            let rendered: Vec<String> = results
                .iter()
                .map(|r| format!("{} : {}", self.value_ref(*r), self.module.value_type(*r)))
                .collect();
            let _ = write!(out, "{} = ", rendered.join(", "));
        }
        let _ = write!(out, "{}", self.module.kind(op).name());
        let operands: Vec<String> = self
            .module
            .operands(op)
            .iter()
            .map(|v| self.value_ref(*v))
            .collect();
        let _ = write!(out, "({})", operands.join(", "));
        let attrs = self.module.attrs(op);
        if !attrs.is_empty() {
            let rendered: Vec<String> = attrs
                .iter()
                .map(|(name, attr)| format!("{:?} = {}", name, attr))
                .collect();
            let _ = write!(out, " [{}]", rendered.join(", "));
        }
    }

    fn print_op(&mut self, out: &mut String, op: OpId, indent: usize) {
        let pad = "  ".repeat(indent);
        let mut head = String::new();
        self.write_op_head(&mut head, op);
        let _ = write!(out, "{}{}", pad, head);
        for region in self.module.regions(op) {
            let _ = writeln!(out, " {{");
            self.print_block(out, self.module.region_block(region), indent + 1);
            let _ = write!(out, "{}}}", pad);
        }
        let _ = writeln!(out);
    }

    fn print_block(&mut self, out: &mut String, block: BlockId, indent: usize) {
        let args = self.module.block_args(block);
        if !args.is_empty() {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| format!("{} : {}", self.value_ref(*a), self.module.value_type(*a)))
                .collect();
            let _ = writeln!(out, "{}bb({}):", "  ".repeat(indent), rendered.join(", "));
        }
        for op in self.module.block_ops(block) {
            self.print_op(out, op, indent);
        }
    }

    pub fn print_module(&mut self) -> String {
        let mut out = String::new();
        self.print_block(&mut out, self.module.top_block(), 0);
        out
    }
}

/// Convenience entry point: print the whole module.
pub fn print_module(module: &Module) -> String {
    Printer::new(module).print_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::flat::FlatOp;
    use crate::dialects::types;
    use crate::ir::{Attribute, OpKind};

    #[test]
    fn test_print_flat_snippet() {
        let mut m = Module::new();
        let top = m.top_block();
        let lit = m.create_op(
            OpKind::Flat(FlatOp::Literal),
            &[],
            vec![types::int_type()],
            vec![("value", Attribute::Int(3))],
            vec![],
        );
        let call = m.create_op(
            OpKind::Flat(FlatOp::CallExpr),
            &[m.result(lit, 0)],
            vec![],
            vec![("func_name", Attribute::Str("_print_int".to_string()))],
            vec![],
        );
        m.append_ops(top, &[lit, call]);

        let text = print_module(&m);
        assert!(text.contains("%0 : !int = choco.ir.literal() [\"value\" = 3 : i32]"));
        assert!(text.contains("choco.ir.call_expr(%0) [\"func_name\" = \"_print_int\"]"));
    }

    #[test]
    fn test_print_nested_region() {
        let mut m = Module::new();
        let top = m.top_block();
        let cond = m.create_op(
            OpKind::Flat(FlatOp::Literal),
            &[],
            vec![types::bool_type()],
            vec![("value", Attribute::Bool(true))],
            vec![],
        );
        let then_region = m.region_from_ops(vec![]);
        let else_region = m.region_from_ops(vec![]);
        let if_op = m.create_op(
            OpKind::Flat(FlatOp::If),
            &[m.result(cond, 0)],
            vec![],
            vec![],
            vec![then_region, else_region],
        );
        m.append_ops(top, &[cond, if_op]);

        let text = print_module(&m);
        assert!(text.contains("choco.ir.if(%0) {"));

        let inline = Printer::new(&m).render_op_inline(if_op);
        assert_eq!(inline, "choco.ir.if(%0) {...} {...}");
    }
}
