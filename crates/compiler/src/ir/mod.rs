//! The IR kernel: operations, blocks, regions, and SSA values.
//!
//! The whole IR graph for one module lives in a [`Module`] arena. Entities
//! are addressed by copyable ids (`OpId`, `ValueId`, `BlockId`, `RegionId`)
//! instead of pointers, which keeps def-use edges cheap to rewrite and
//! avoids ownership cycles. Erased entities are tombstoned, never reused,
//! so a stale id can be detected instead of aliasing a new entity.
//!
//! Ownership follows the structure: a region owns its blocks, a block owns
//! its operations, an operation owns its regions and attributes. SSA values
//! are owned by their defining operation (or block, for arguments) and
//! referenced by operand slots; every operand slot is mirrored by a use
//! entry on the value, maintained eagerly on every mutation.
//!
//! Operations are created detached. They become live when appended to a
//! block and must be erased explicitly (severing their def-use edges) to go
//! away. [`Module::replace_op`] is the one-stop primitive the pattern
//! rewriter builds on.

pub mod attribute;
pub mod printer;
pub mod rewriter;

pub use attribute::{Attribute, NamedTy};

use std::fmt;

use crate::dialects::OpKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub(crate) u32);

/// A single use of an SSA value: which operation, at which operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub op: OpId,
    pub index: usize,
}

/// Where an SSA value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// Result `index` of an operation.
    OpResult { op: OpId, index: usize },
    /// Argument `index` of a block.
    BlockArg { block: BlockId, index: usize },
}

#[derive(Debug)]
struct OpData {
    kind: OpKind,
    operands: Vec<ValueId>,
    results: Vec<ValueId>,
    attrs: Vec<(String, Attribute)>,
    regions: Vec<RegionId>,
    parent: Option<BlockId>,
    erased: bool,
}

#[derive(Debug)]
struct ValueData {
    ty: Attribute,
    def: ValueDef,
    uses: Vec<Use>,
    erased: bool,
}

#[derive(Debug)]
struct BlockData {
    args: Vec<ValueId>,
    ops: Vec<OpId>,
    parent: RegionId,
}

#[derive(Debug)]
struct RegionData {
    blocks: Vec<BlockId>,
    parent: Option<OpId>,
}

/// Raised when an operation fails its verification predicate or an IR
/// mutation would break a kernel invariant.
#[derive(Debug)]
pub struct VerifyError {
    pub message: String,
}

impl VerifyError {
    pub fn new(message: impl Into<String>) -> VerifyError {
        VerifyError {
            message: message.into(),
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IR verification error: {}", self.message)
    }
}

impl std::error::Error for VerifyError {}

/// One IR module: the arena plus a distinguished top-level region holding a
/// single block. All passes operate on a `Module` they hold exclusively.
#[derive(Debug)]
pub struct Module {
    ops: Vec<OpData>,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    regions: Vec<RegionData>,
    top_region: RegionId,
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}

impl Module {
    pub fn new() -> Module {
        let mut m = Module {
            ops: Vec::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            regions: Vec::new(),
            top_region: RegionId(0),
        };
        let region = m.new_region(None);
        m.new_block_in(region, Vec::new());
        m.top_region = region;
        m
    }

    pub fn top_block(&self) -> BlockId {
        self.regions[self.top_region.0 as usize].blocks[0]
    }

    // ---- arena internals ----

    fn new_region(&mut self, parent: Option<OpId>) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(RegionData {
            blocks: Vec::new(),
            parent,
        });
        id
    }

    fn new_block_in(&mut self, region: RegionId, arg_types: Vec<Attribute>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let args = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.new_value(
                    ty,
                    ValueDef::BlockArg {
                        block: id,
                        index,
                    },
                )
            })
            .collect();
        self.blocks.push(BlockData {
            args,
            ops: Vec::new(),
            parent: region,
        });
        self.regions[region.0 as usize].blocks.push(id);
        id
    }

    fn new_value(&mut self, ty: Attribute, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData {
            ty,
            def,
            uses: Vec::new(),
            erased: false,
        });
        id
    }

    // ---- construction ----

    /// Create a detached operation. Operand uses are registered
    /// immediately; the regions must not already belong to another
    /// operation.
    pub fn create_op(
        &mut self,
        kind: OpKind,
        operands: &[ValueId],
        result_types: Vec<Attribute>,
        attrs: Vec<(&str, Attribute)>,
        regions: Vec<RegionId>,
    ) -> OpId {
        let id = OpId(self.ops.len() as u32);
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::OpResult { op: id, index }))
            .collect();
        for region in &regions {
            let slot = &mut self.regions[region.0 as usize];
            debug_assert!(slot.parent.is_none(), "region already has a parent op");
            slot.parent = Some(id);
        }
        self.ops.push(OpData {
            kind,
            operands: operands.to_vec(),
            results,
            attrs: attrs
                .into_iter()
                .map(|(name, attr)| (name.to_string(), attr))
                .collect(),
            regions,
            parent: None,
            erased: false,
        });
        for (index, value) in operands.iter().enumerate() {
            self.values[value.0 as usize].uses.push(Use { op: id, index });
        }
        id
    }

    /// Create a single-block region from an ordered list of detached
    /// operations.
    pub fn region_from_ops(&mut self, ops: Vec<OpId>) -> RegionId {
        let region = self.new_region(None);
        let block = self.new_block_in(region, Vec::new());
        for op in ops {
            self.append_op(block, op);
        }
        region
    }

    /// Create a region whose single block carries arguments of the given
    /// types (used for function entry blocks).
    pub fn region_with_args(&mut self, arg_types: Vec<Attribute>) -> (RegionId, BlockId) {
        let region = self.new_region(None);
        let block = self.new_block_in(region, arg_types);
        (region, block)
    }

    // ---- accessors ----

    pub fn kind(&self, op: OpId) -> OpKind {
        self.ops[op.0 as usize].kind
    }

    pub fn is_erased(&self, op: OpId) -> bool {
        self.ops[op.0 as usize].erased
    }

    pub fn operands(&self, op: OpId) -> Vec<ValueId> {
        self.ops[op.0 as usize].operands.clone()
    }

    pub fn operand(&self, op: OpId, index: usize) -> ValueId {
        self.ops[op.0 as usize].operands[index]
    }

    pub fn num_operands(&self, op: OpId) -> usize {
        self.ops[op.0 as usize].operands.len()
    }

    pub fn results(&self, op: OpId) -> Vec<ValueId> {
        self.ops[op.0 as usize].results.clone()
    }

    pub fn result(&self, op: OpId, index: usize) -> ValueId {
        self.ops[op.0 as usize].results[index]
    }

    pub fn num_results(&self, op: OpId) -> usize {
        self.ops[op.0 as usize].results.len()
    }

    pub fn attr(&self, op: OpId, name: &str) -> Option<Attribute> {
        self.ops[op.0 as usize]
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a.clone())
    }

    pub fn attrs(&self, op: OpId) -> Vec<(String, Attribute)> {
        self.ops[op.0 as usize].attrs.clone()
    }

    pub fn set_attr(&mut self, op: OpId, name: &str, attr: Attribute) {
        let attrs = &mut self.ops[op.0 as usize].attrs;
        if let Some(slot) = attrs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = attr;
        } else {
            attrs.push((name.to_string(), attr));
        }
    }

    pub fn regions(&self, op: OpId) -> Vec<RegionId> {
        self.ops[op.0 as usize].regions.clone()
    }

    pub fn region(&self, op: OpId, index: usize) -> RegionId {
        self.ops[op.0 as usize].regions[index]
    }

    /// The single block of a region (all regions here are single-block).
    pub fn region_block(&self, region: RegionId) -> BlockId {
        self.regions[region.0 as usize].blocks[0]
    }

    pub fn region_parent_op(&self, region: RegionId) -> Option<OpId> {
        self.regions[region.0 as usize].parent
    }

    pub fn block_ops(&self, block: BlockId) -> Vec<OpId> {
        self.blocks[block.0 as usize].ops.clone()
    }

    pub fn block_args(&self, block: BlockId) -> Vec<ValueId> {
        self.blocks[block.0 as usize].args.clone()
    }

    pub fn block_region(&self, block: BlockId) -> RegionId {
        self.blocks[block.0 as usize].parent
    }

    pub fn parent_block(&self, op: OpId) -> Option<BlockId> {
        self.ops[op.0 as usize].parent
    }

    /// The operation that encloses `op` (the parent of its block's region).
    pub fn parent_op(&self, op: OpId) -> Option<OpId> {
        let block = self.parent_block(op)?;
        self.region_parent_op(self.block_region(block))
    }

    pub fn value_type(&self, value: ValueId) -> Attribute {
        self.values[value.0 as usize].ty.clone()
    }

    pub fn value_def(&self, value: ValueId) -> ValueDef {
        self.values[value.0 as usize].def
    }

    /// The defining operation, if the value is an operation result.
    pub fn def_op(&self, value: ValueId) -> Option<OpId> {
        match self.value_def(value) {
            ValueDef::OpResult { op, .. } => Some(op),
            ValueDef::BlockArg { .. } => None,
        }
    }

    pub fn value_uses(&self, value: ValueId) -> Vec<Use> {
        self.values[value.0 as usize].uses.clone()
    }

    pub fn num_uses(&self, value: ValueId) -> usize {
        self.values[value.0 as usize].uses.len()
    }

    // ---- mutation ----

    pub fn append_op(&mut self, block: BlockId, op: OpId) {
        debug_assert!(self.ops[op.0 as usize].parent.is_none(), "op already attached");
        self.blocks[block.0 as usize].ops.push(op);
        self.ops[op.0 as usize].parent = Some(block);
    }

    pub fn append_ops(&mut self, block: BlockId, ops: &[OpId]) {
        for op in ops {
            self.append_op(block, *op);
        }
    }

    fn op_index(&self, block: BlockId, op: OpId) -> usize {
        self.blocks[block.0 as usize]
            .ops
            .iter()
            .position(|o| *o == op)
            .expect("op not found in its parent block")
    }

    pub fn insert_ops_at(&mut self, block: BlockId, index: usize, ops: &[OpId]) {
        for (offset, op) in ops.iter().enumerate() {
            debug_assert!(self.ops[op.0 as usize].parent.is_none(), "op already attached");
            self.blocks[block.0 as usize].ops.insert(index + offset, *op);
            self.ops[op.0 as usize].parent = Some(block);
        }
    }

    pub fn insert_before(&mut self, anchor: OpId, ops: &[OpId]) {
        let block = self.parent_block(anchor).expect("anchor is detached");
        let index = self.op_index(block, anchor);
        self.insert_ops_at(block, index, ops);
    }

    pub fn insert_after(&mut self, anchor: OpId, ops: &[OpId]) {
        let block = self.parent_block(anchor).expect("anchor is detached");
        let index = self.op_index(block, anchor);
        self.insert_ops_at(block, index + 1, ops);
    }

    /// Sever the operation from its block without touching def-use edges.
    pub fn detach_op(&mut self, op: OpId) {
        if let Some(block) = self.ops[op.0 as usize].parent {
            let index = self.op_index(block, op);
            self.blocks[block.0 as usize].ops.remove(index);
            self.ops[op.0 as usize].parent = None;
        }
    }

    fn unregister_use(&mut self, value: ValueId, op: OpId, index: usize) {
        let uses = &mut self.values[value.0 as usize].uses;
        if let Some(pos) = uses.iter().position(|u| u.op == op && u.index == index) {
            uses.remove(pos);
        }
    }

    /// Point operand `index` of `op` at a different value, keeping use
    /// lists consistent.
    pub fn replace_operand(&mut self, op: OpId, index: usize, new_value: ValueId) {
        let old = self.ops[op.0 as usize].operands[index];
        self.unregister_use(old, op, index);
        self.ops[op.0 as usize].operands[index] = new_value;
        self.values[new_value.0 as usize].uses.push(Use { op, index });
    }

    /// Rewrite every use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        let uses = std::mem::take(&mut self.values[old.0 as usize].uses);
        for u in &uses {
            self.ops[u.op.0 as usize].operands[u.index] = new;
        }
        self.values[new.0 as usize].uses.extend(uses);
    }

    /// Detach and destroy an operation, its nested regions, and its
    /// results, unregistering every operand use. Remaining uses of its
    /// results are not checked; use [`Module::replace_op`] for the checked
    /// path.
    pub fn erase_op(&mut self, op: OpId) {
        self.detach_op(op);
        for region in self.regions(op) {
            for block in self.regions[region.0 as usize].blocks.clone() {
                for nested in self.block_ops(block) {
                    self.erase_op(nested);
                }
            }
        }
        for (index, value) in self.operands(op).into_iter().enumerate() {
            self.unregister_use(value, op, index);
        }
        for result in self.results(op) {
            self.values[result.0 as usize].erased = true;
        }
        self.ops[op.0 as usize].erased = true;
    }

    /// Replace `old` with `new_ops`, inserted in order at `old`'s position.
    ///
    /// `result_map` maps each result of `old` either to a replacement value
    /// or to `None`, meaning the result must have no remaining uses. With
    /// `safe_erase` set, a `None` entry with surviving uses is an error;
    /// without it the uses are left dangling on the tombstoned value, which
    /// is the caller's problem.
    pub fn replace_op(
        &mut self,
        old: OpId,
        new_ops: &[OpId],
        result_map: &[Option<ValueId>],
        safe_erase: bool,
    ) -> Result<(), VerifyError> {
        debug_assert_eq!(result_map.len(), self.num_results(old));
        if self.parent_block(old).is_some() {
            self.insert_before(old, new_ops);
        }
        for (index, entry) in result_map.iter().enumerate() {
            let result = self.result(old, index);
            match entry {
                Some(new_value) => self.replace_all_uses(result, *new_value),
                None => {
                    if safe_erase && self.num_uses(result) > 0 {
                        return Err(VerifyError::new(format!(
                            "cannot erase {}: result {} still has {} use(s)",
                            self.kind(old).name(),
                            index,
                            self.num_uses(result)
                        )));
                    }
                }
            }
        }
        self.erase_op(old);
        Ok(())
    }

    /// Move every operation of `src` after `anchor` in `anchor`'s block,
    /// leaving `src` empty.
    pub fn inline_block_after(&mut self, src: BlockId, anchor: OpId) {
        let ops = self.block_ops(src);
        for op in &ops {
            let index = self.op_index(src, *op);
            self.blocks[src.0 as usize].ops.remove(index);
            self.ops[op.0 as usize].parent = None;
        }
        self.insert_after(anchor, &ops);
    }

    // ---- traversal ----

    /// Every live operation, pre-order: an op before the contents of its
    /// regions, block by block.
    pub fn walk(&self) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_block(self.top_block(), &mut out);
        out
    }

    fn walk_block(&self, block: BlockId, out: &mut Vec<OpId>) {
        for op in &self.blocks[block.0 as usize].ops {
            out.push(*op);
            for region in &self.ops[op.0 as usize].regions {
                for nested in &self.regions[region.0 as usize].blocks {
                    self.walk_block(*nested, out);
                }
            }
        }
    }

    /// Number of live operations in the module.
    pub fn op_count(&self) -> usize {
        self.walk().len()
    }

    /// True if `ancestor` encloses `op` (or is `op` itself).
    pub fn is_ancestor(&self, ancestor: OpId, op: OpId) -> bool {
        let mut current = Some(op);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent_op(c);
        }
        false
    }

    // ---- structural verification ----

    /// Check the kernel invariants: use-list consistency and dominance.
    /// Dialect-level predicates live with the dialects.
    pub fn verify_structure(&self) -> Result<(), VerifyError> {
        let live = self.walk();
        // Use-list consistency: scanning all operand slots must yield
        // exactly the recorded uses.
        let mut seen: Vec<Vec<Use>> = vec![Vec::new(); self.values.len()];
        for op in &live {
            for (index, value) in self.operands(*op).into_iter().enumerate() {
                seen[value.0 as usize].push(Use { op: *op, index });
            }
        }
        for (i, value) in self.values.iter().enumerate() {
            if value.erased {
                continue;
            }
            let mut recorded = value.uses.clone();
            let mut scanned = seen[i].clone();
            recorded.sort_by_key(|u| (u.op, u.index));
            scanned.sort_by_key(|u| (u.op, u.index));
            if recorded != scanned {
                return Err(VerifyError::new(format!(
                    "use list of %{} disagrees with operand scan ({} recorded, {} scanned)",
                    i,
                    recorded.len(),
                    scanned.len()
                )));
            }
        }
        // Dominance: every operand is defined textually earlier in the same
        // block, or in an enclosing region.
        for op in &live {
            for (slot, value) in self.operands(*op).into_iter().enumerate() {
                if !self.dominates(value, *op) {
                    return Err(VerifyError::new(format!(
                        "operand {} of {} does not dominate its use",
                        slot,
                        self.kind(*op).name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `value`'s definition dominates `user` in the nested
    /// single-block region structure.
    pub fn dominates(&self, value: ValueId, user: OpId) -> bool {
        match self.value_def(value) {
            ValueDef::BlockArg { block, .. } => {
                // Visible to everything nested inside that block.
                let mut current = Some(user);
                while let Some(c) = current {
                    if self.parent_block(c) == Some(block) {
                        return true;
                    }
                    current = self.parent_op(c);
                }
                false
            }
            ValueDef::OpResult { op: def, .. } => {
                let Some(def_block) = self.parent_block(def) else {
                    return false;
                };
                let def_index = self.op_index(def_block, def);
                let mut current = Some(user);
                while let Some(c) = current {
                    if self.parent_block(c) == Some(def_block) {
                        return self.op_index(def_block, c) > def_index;
                    }
                    current = self.parent_op(c);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::flat::FlatOp;
    use crate::dialects::types;

    fn literal(m: &mut Module, v: i32) -> OpId {
        m.create_op(
            OpKind::Flat(FlatOp::Literal),
            &[],
            vec![types::int_type()],
            vec![("value", Attribute::Int(v))],
            vec![],
        )
    }

    #[test]
    fn test_create_and_append() {
        let mut m = Module::new();
        let top = m.top_block();
        let lit = literal(&mut m, 7);
        assert!(m.parent_block(lit).is_none());
        m.append_op(top, lit);
        assert_eq!(m.parent_block(lit), Some(top));
        assert_eq!(m.walk(), vec![lit]);
        assert_eq!(m.attr(lit, "value"), Some(Attribute::Int(7)));
    }

    #[test]
    fn test_use_lists_track_operands() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = literal(&mut m, 1);
        let b = literal(&mut m, 2);
        let add = m.create_op(
            OpKind::Flat(FlatOp::BinaryExpr),
            &[m.result(a, 0), m.result(b, 0)],
            vec![types::int_type()],
            vec![("op", Attribute::Str("+".to_string()))],
            vec![],
        );
        m.append_ops(top, &[a, b, add]);
        assert_eq!(m.num_uses(m.result(a, 0)), 1);
        assert_eq!(m.num_uses(m.result(b, 0)), 1);
        m.verify_structure().unwrap();

        // Redirect the first operand; use lists must follow.
        m.replace_operand(add, 0, m.result(b, 0));
        assert_eq!(m.num_uses(m.result(a, 0)), 0);
        assert_eq!(m.num_uses(m.result(b, 0)), 2);
        m.verify_structure().unwrap();
    }

    #[test]
    fn test_replace_op_rewires_uses() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = literal(&mut m, 1);
        let b = literal(&mut m, 2);
        let add = m.create_op(
            OpKind::Flat(FlatOp::BinaryExpr),
            &[m.result(a, 0), m.result(b, 0)],
            vec![types::int_type()],
            vec![("op", Attribute::Str("+".to_string()))],
            vec![],
        );
        let ret = m.create_op(
            OpKind::Flat(FlatOp::Return),
            &[m.result(add, 0)],
            vec![],
            vec![],
            vec![],
        );
        m.append_ops(top, &[a, b, add, ret]);

        let folded = literal(&mut m, 3);
        let folded_result = m.result(folded, 0);
        m.replace_op(add, &[folded], &[Some(folded_result)], true)
            .unwrap();

        assert!(m.is_erased(add));
        assert_eq!(m.operand(ret, 0), folded_result);
        assert_eq!(m.num_uses(folded_result), 1);
        m.verify_structure().unwrap();
    }

    #[test]
    fn test_replace_op_refuses_live_uses() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = literal(&mut m, 1);
        let ret = m.create_op(
            OpKind::Flat(FlatOp::Return),
            &[m.result(a, 0)],
            vec![],
            vec![],
            vec![],
        );
        m.append_ops(top, &[a, ret]);
        let err = m.replace_op(a, &[], &[None], true);
        assert!(err.is_err());
    }

    #[test]
    fn test_erase_op_unregisters_uses() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = literal(&mut m, 1);
        let neg = m.create_op(
            OpKind::Flat(FlatOp::UnaryExpr),
            &[m.result(a, 0)],
            vec![types::int_type()],
            vec![("op", Attribute::Str("-".to_string()))],
            vec![],
        );
        m.append_ops(top, &[a, neg]);
        m.erase_op(neg);
        assert_eq!(m.num_uses(m.result(a, 0)), 0);
        assert_eq!(m.walk(), vec![a]);
        m.verify_structure().unwrap();
    }

    #[test]
    fn test_dominance_rejects_use_before_def() {
        let mut m = Module::new();
        let top = m.top_block();
        let a = literal(&mut m, 1);
        let ret = m.create_op(
            OpKind::Flat(FlatOp::Return),
            &[m.result(a, 0)],
            vec![],
            vec![],
            vec![],
        );
        // Use first, definition second.
        m.append_ops(top, &[ret, a]);
        assert!(m.verify_structure().is_err());
    }

    #[test]
    fn test_region_values_visible_in_nested_regions() {
        let mut m = Module::new();
        let top = m.top_block();
        let cond = literal(&mut m, 1);
        let inner = literal(&mut m, 5);
        let yield_inner = m.create_op(
            OpKind::Flat(FlatOp::Yield),
            &[m.result(inner, 0)],
            vec![],
            vec![],
            vec![],
        );
        // The nested region also references `cond`, defined outside.
        let outer_use = m.create_op(
            OpKind::Flat(FlatOp::Yield),
            &[m.result(cond, 0)],
            vec![],
            vec![],
            vec![],
        );
        let then_region = m.region_from_ops(vec![inner, yield_inner]);
        let else_region = m.region_from_ops(vec![outer_use]);
        let if_op = m.create_op(
            OpKind::Flat(FlatOp::If),
            &[m.result(cond, 0)],
            vec![],
            vec![],
            vec![then_region, else_region],
        );
        m.append_ops(top, &[cond, if_op]);
        m.verify_structure().unwrap();
        assert_eq!(m.op_count(), 5);
    }

    #[test]
    fn test_inline_block_after() {
        let mut m = Module::new();
        let top = m.top_block();
        let anchor = literal(&mut m, 0);
        m.append_op(top, anchor);
        let x = literal(&mut m, 1);
        let y = literal(&mut m, 2);
        let region = m.region_from_ops(vec![x, y]);
        let block = m.region_block(region);
        m.inline_block_after(block, anchor);
        assert_eq!(m.block_ops(top), vec![anchor, x, y]);
        assert!(m.block_ops(block).is_empty());
    }
}
