// This module implements the peephole optimizer over TAC. Lowering produces many
// `compute into t` / `copy t into x` pairs; when the temporary has no other reader anywhere
// later in the program the pair collapses into a single `compute into x`. Two passes run in a
// fixed order: the first fuses `LoadInt` followed by `Copy`, the second fuses an arithmetic
// instruction followed by `Copy`. Only adjacent pairs are considered and instructions are never
// reordered. After a fusion the scan stays at the same position, since the fused instruction
// may form a new pair with its new successor. The liveness check scans forward to the end of
// the program, not just the next instruction, because fusing a temporary that is read again
// would drop its only definition.

//! Copy-fusion peephole passes.

use super::{Instruction, Opcode, Program};

/// Run both fusion passes in place. Returns the number of fused pairs.
pub fn optimize(program: &mut Program) -> usize {
    let loads = fuse_pass(program, |op| op == Opcode::LoadInt);
    let arith = fuse_pass(program, Opcode::is_arithmetic);
    log::debug!("peephole: fused {loads} load/copy and {arith} arithmetic/copy pairs");
    loads + arith
}

fn fuse_pass(program: &mut Program, producer: impl Fn(Opcode) -> bool) -> usize {
    let instrs = program.instructions_mut();
    let mut fused = 0;
    let mut i = 0;

    while i + 1 < instrs.len() {
        if can_fuse(instrs, i, &producer) {
            let copy = instrs.remove(i + 1);
            log::trace!("fusing '{}' with '{}'", instrs[i], copy);
            let head = &mut instrs[i];
            head.result = copy.result;
            fused += 1;
            // Retry at the same position: the fused instruction has a new successor.
            continue;
        }
        i += 1;
    }

    fused
}

fn can_fuse(instrs: &[Instruction], i: usize, producer: &impl Fn(Opcode) -> bool) -> bool {
    let (head, next) = (&instrs[i], &instrs[i + 1]);
    if !producer(head.opcode) || next.opcode != Opcode::Copy {
        return false;
    }
    if head.in_print_context || next.in_print_context {
        return false;
    }
    let Some(temp) = head.result.as_temp() else {
        return false;
    };
    if next.arg1.as_temp() != Some(temp) || next.result.is_none() {
        return false;
    }
    !instrs[i + 2..].iter().any(|later| later.reads_temp(temp))
}
