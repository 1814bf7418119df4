// This module implements the liveness analysis the register allocator relies on. The IR has no
// control flow, so liveness is a single linear scan: for every temporary it records the
// position of its defining instruction and the sorted positions of every instruction reading
// it. Positions index the list of instructions the code generator actually lowers, so print
// context instructions must be filtered out before the scan; a temporary read only by a print
// is dead as far as machine code is concerned. The next-use query answers "how many
// instructions until this temporary is read again" with a binary search over the use list,
// returning None once the last use is behind the current position.

use crate::tac::{Instruction, OperandKind};

/// Definition and use positions of one temporary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LivenessInfo {
    /// Position of the defining instruction.
    pub def: Option<usize>,
    /// Positions of reading instructions, ascending.
    pub uses: Vec<usize>,
}

impl LivenessInfo {
    pub fn last_use(&self) -> Option<usize> {
        self.uses.last().copied()
    }
}

/// Per-temporary liveness over a linear instruction list.
#[derive(Debug, Default, Clone)]
pub struct Liveness {
    info: Vec<LivenessInfo>,
}

impl Liveness {
    /// Scan `instrs`, which must already exclude print context instructions.
    pub fn compute(instrs: &[&Instruction], temp_count: u32) -> Self {
        let mut info = vec![LivenessInfo::default(); temp_count as usize];

        for (pos, instr) in instrs.iter().enumerate() {
            for arg in instr.args() {
                if let OperandKind::Temporary(id) = arg.kind {
                    if let Some(entry) = info.get_mut(id as usize) {
                        // Both arguments may name the same temporary.
                        if entry.uses.last() != Some(&pos) {
                            entry.uses.push(pos);
                        }
                    }
                }
            }
            if let OperandKind::Temporary(id) = instr.result.kind {
                if let Some(entry) = info.get_mut(id as usize) {
                    entry.def = Some(pos);
                }
            }
        }

        log::trace!(
            "liveness: {} temporaries over {} instructions",
            info.len(),
            instrs.len()
        );
        Self { info }
    }

    pub fn info(&self, temp: u32) -> Option<&LivenessInfo> {
        self.info.get(temp as usize)
    }

    /// Instructions from `pos` until `temp` is next read, looking strictly
    /// after `pos`. `None` means the temporary is never read again.
    pub fn next_use(&self, temp: u32, pos: usize) -> Option<usize> {
        let uses = &self.info(temp)?.uses;
        let k = uses.partition_point(|&u| u <= pos);
        uses.get(k).map(|&u| u - pos)
    }

    /// Like [`Liveness::next_use`] but counting a read at `pos` itself as
    /// distance zero.
    pub fn next_use_from(&self, temp: u32, pos: usize) -> Option<usize> {
        let uses = &self.info(temp)?.uses;
        let k = uses.partition_point(|&u| u < pos);
        uses.get(k).map(|&u| u - pos)
    }

    /// True when `temp` has no read after `pos`.
    pub fn dies_at(&self, temp: u32, pos: usize) -> bool {
        self.next_use(temp, pos).is_none()
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tac::{Opcode, Operand};

    fn instr(opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) -> Instruction {
        Instruction {
            opcode,
            result,
            arg1,
            arg2,
            line: 1,
            in_print_context: false,
            result_is_char: false,
        }
    }

    fn sample() -> Vec<Instruction> {
        vec![
            instr(Opcode::LoadInt, Operand::temp(0), Operand::int(1), Operand::none()),
            instr(Opcode::LoadInt, Operand::temp(1), Operand::int(2), Operand::none()),
            instr(Opcode::Add, Operand::temp(2), Operand::temp(0), Operand::temp(1)),
            instr(Opcode::Mul, Operand::temp(3), Operand::temp(2), Operand::temp(0)),
            instr(Opcode::Copy, Operand::var("x"), Operand::temp(3), Operand::none()),
        ]
    }

    #[test]
    fn test_def_and_uses() {
        let instrs = sample();
        let refs: Vec<&Instruction> = instrs.iter().collect();
        let live = Liveness::compute(&refs, 4);

        assert_eq!(live.len(), 4);
        let t0 = live.info(0).unwrap();
        assert_eq!(t0.def, Some(0));
        assert_eq!(t0.uses, vec![2, 3]);
        assert_eq!(t0.last_use(), Some(3));
        assert_eq!(live.info(3).unwrap().uses, vec![4]);
    }

    #[test]
    fn test_next_use_distance() {
        let instrs = sample();
        let refs: Vec<&Instruction> = instrs.iter().collect();
        let live = Liveness::compute(&refs, 4);

        assert_eq!(live.next_use(0, 0), Some(2));
        assert_eq!(live.next_use(0, 2), Some(1));
        assert_eq!(live.next_use(0, 3), None);
        assert_eq!(live.next_use_from(0, 3), Some(0));
        assert_eq!(live.next_use_from(0, 4), None);
        assert!(live.dies_at(1, 2));
        assert!(!live.dies_at(2, 2));
        assert_eq!(live.next_use(99, 0), None);
    }

    #[test]
    fn test_same_temp_twice_counts_once() {
        let instrs = vec![
            instr(Opcode::LoadInt, Operand::temp(0), Operand::int(3), Operand::none()),
            instr(Opcode::Mul, Operand::temp(1), Operand::temp(0), Operand::temp(0)),
        ];
        let refs: Vec<&Instruction> = instrs.iter().collect();
        let live = Liveness::compute(&refs, 2);
        assert_eq!(live.info(0).unwrap().uses, vec![1]);
        assert_eq!(live.info(1).unwrap().uses, Vec::<usize>::new());
    }
}
