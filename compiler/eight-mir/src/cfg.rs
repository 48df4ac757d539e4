//! Control flow graph queries over the blocks of a single function.

use crate::fun::{MirBlockId, MirFunctionId};
use crate::module::MirModule;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The blocks the terminator of a block may jump to.
///
/// Blocks without a terminator have no successors. Targets that do not exist in the module, or
/// belong to another function, are left out.
pub fn successors(module: &MirModule, block: MirBlockId) -> Vec<MirBlockId> {
    let Some(b) = module.block(block) else {
        return Vec::new();
    };
    let Some(terminator) = b
        .last_instruction()
        .and_then(|i| module.instruction(i))
        .filter(|i| i.is_terminator())
    else {
        return Vec::new();
    };
    terminator
        .successors()
        .filter(|target| module.block(*target).is_some_and(|t| t.parent == b.parent))
        .collect()
}

/// All blocks reachable from the entry block of a function, including the entry block itself.
pub fn reachable_blocks(module: &MirModule, function: MirFunctionId) -> BTreeSet<MirBlockId> {
    let mut reachable = BTreeSet::new();
    let Some(entry) = module.function(function).and_then(|f| f.entry_block()) else {
        return reachable;
    };
    let mut queue = VecDeque::from([entry]);
    reachable.insert(entry);
    while let Some(block) = queue.pop_front() {
        for successor in successors(module, block) {
            if reachable.insert(successor) {
                queue.push_back(successor);
            }
        }
    }
    reachable
}

/// Dominator sets of the reachable blocks of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirDominators {
    sets: BTreeMap<MirBlockId, BTreeSet<MirBlockId>>,
}

impl MirDominators {
    /// Compute the dominators with the iterative data-flow algorithm.
    ///
    /// The entry block is dominated only by itself. Every other reachable block is dominated by
    /// itself and by the blocks dominating all of its reachable predecessors. The sets shrink until
    /// a fixed point is reached, which also handles loops.
    pub fn compute(module: &MirModule, function: MirFunctionId) -> Self {
        let reachable = reachable_blocks(module, function);
        let mut sets = BTreeMap::new();
        let Some(entry) = module.function(function).and_then(|f| f.entry_block()) else {
            return Self { sets };
        };

        let mut predecessors: BTreeMap<MirBlockId, Vec<MirBlockId>> = BTreeMap::new();
        for block in &reachable {
            for successor in successors(module, *block) {
                predecessors.entry(successor).or_default().push(*block);
            }
        }

        for block in &reachable {
            let initial = if *block == entry {
                BTreeSet::from([entry])
            } else {
                reachable.clone()
            };
            sets.insert(*block, initial);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for block in reachable.iter().filter(|b| **b != entry) {
                let mut next: Option<BTreeSet<MirBlockId>> = None;
                for predecessor in predecessors.get(block).into_iter().flatten() {
                    let Some(dominators) = sets.get(predecessor) else {
                        continue;
                    };
                    next = Some(match next {
                        None => dominators.clone(),
                        Some(acc) => acc.intersection(dominators).copied().collect(),
                    });
                }
                let mut next = next.unwrap_or_default();
                next.insert(*block);
                if sets.get(block) != Some(&next) {
                    sets.insert(*block, next);
                    changed = true;
                }
            }
        }
        log::trace!(
            "computed dominators of {} for {} blocks",
            module.describe_function(function),
            sets.len()
        );
        Self { sets }
    }

    /// Does `dominator` dominate `block`? Every block dominates itself. Unreachable blocks neither
    /// dominate nor are dominated.
    pub fn dominates(&self, dominator: MirBlockId, block: MirBlockId) -> bool {
        self.sets
            .get(&block)
            .is_some_and(|set| set.contains(&dominator))
    }

    pub fn is_reachable(&self, block: MirBlockId) -> bool {
        self.sets.contains_key(&block)
    }
}

#[cfg(test)]
mod tests {
    use super::{reachable_blocks, successors, MirDominators};
    use crate::builder::MirBuilder;
    use crate::layout::MirTargetLayout;
    use crate::min_function::{build_min_module, DEFAULT_TARGET_TRIPLE};
    use crate::module::{MirFunctionOptions, MirModule};
    use eight_macros::{assert_ok, assert_some};

    #[test]
    fn test_diamond_dominators() {
        let module = assert_ok!(build_min_module(
            MirTargetLayout::default(),
            DEFAULT_TARGET_TRIPLE
        ));
        let (min, _) = assert_some!(module.function_by_name("min"));
        let block = |name| assert_some!(module.find_block(min, name));
        let (entry, then, otherwise, exit) = (
            block("entry"),
            block("if.then"),
            block("if.else"),
            block("return"),
        );
        assert_eq!(successors(&module, entry), vec![then, otherwise]);
        assert_eq!(successors(&module, then), vec![exit]);

        let dominators = MirDominators::compute(&module, min);
        assert!(dominators.dominates(entry, exit));
        assert!(dominators.dominates(entry, then));
        assert!(dominators.dominates(exit, exit));
        assert!(!dominators.dominates(then, exit));
        assert!(!dominators.dominates(otherwise, exit));
        assert!(!dominators.dominates(then, otherwise));
    }

    #[test]
    fn test_loops_and_unreachable_blocks() {
        let mut module = MirModule::new("loop", MirTargetLayout::default());
        let void = module.get_void_ty();
        let i1 = assert_ok!(module.get_boolean_ty());
        let ty = assert_ok!(module.get_function_ty(void, vec![i1], false));
        let mut builder = MirBuilder::new(&mut module);
        let f = assert_ok!(builder.create_function("f", ty, &["c"], MirFunctionOptions::default()));
        let entry = assert_ok!(builder.create_block(f, "entry"));
        let header = assert_ok!(builder.create_block(f, "header"));
        let body = assert_ok!(builder.create_block(f, "body"));
        let exit = assert_ok!(builder.create_block(f, "exit"));
        let dead = assert_ok!(builder.create_block(f, "dead"));
        let c = assert_ok!(builder.argument(f, 0));
        assert_ok!(builder.append_br(entry, header));
        assert_ok!(builder.append_cond_br(header, c, body, exit));
        assert_ok!(builder.append_br(body, header));
        assert_ok!(builder.append_ret(exit, None));
        assert_ok!(builder.append_br(dead, body));

        let reachable = reachable_blocks(&module, f);
        assert_eq!(reachable.len(), 4);
        assert!(!reachable.contains(&dead));

        let dominators = MirDominators::compute(&module, f);
        assert!(dominators.dominates(header, body));
        assert!(dominators.dominates(header, exit));
        assert!(!dominators.dominates(body, header));
        assert!(!dominators.is_reachable(dead));
        assert!(!dominators.dominates(dead, body));
    }
}
