//! Register allocation state.
//!
//! This module implements the RegisterFile that tracks which temporary occupies each working
//! register, how far away its next use is, and whether the register holds a value that has not
//! been written to memory yet. Allocation follows a fixed priority: reuse the register already
//! holding the temporary, take an empty register, reclaim a register whose occupant is never
//! used again, and otherwise evict the occupant with the furthest next use (Belady's
//! replacement rule). Eviction of a dirty occupant is reported to the caller, which emits the
//! spill store; the register file itself never generates code.

use thiserror::Error;

/// Hardware register number (0-31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u8);

/// What occupies a working register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Temporary id held by the register.
    pub temp: u32,
    /// Instructions until the temporary is read again; `None` means never.
    pub next_use: Option<usize>,
    /// Value not yet written to temporary storage.
    pub dirty: bool,
}

/// How a register was obtained by [`RegisterFile::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// The temporary was already resident.
    Resident(Reg),
    /// An empty register was taken.
    Empty(Reg),
    /// The previous occupant was dead and was dropped without a store.
    Reclaimed { reg: Reg, victim: u32 },
    /// A live occupant was evicted; `spill` is set when it was dirty and must be stored.
    Evicted { reg: Reg, victim: u32, spill: bool },
}

impl Allocation {
    pub fn reg(self) -> Reg {
        match self {
            Allocation::Resident(reg)
            | Allocation::Empty(reg)
            | Allocation::Reclaimed { reg, .. }
            | Allocation::Evicted { reg, .. } => reg,
        }
    }
}

/// Error types for register allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegAllocError {
    /// Every working register is excluded for this request.
    #[error("no working register available")]
    NoRegistersAvailable,
    /// The register is not part of the working pool.
    #[error("register {0:?} is not a working register")]
    NotWorkingRegister(Reg),
}

/// Fixed-size file of working registers.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: Vec<Reg>,
    slots: Vec<Option<Slot>>,
}

impl RegisterFile {
    /// Create a register file over the given working registers.
    pub fn new(regs: Vec<Reg>) -> Self {
        let slots = vec![None; regs.len()];
        Self { regs, slots }
    }

    /// Forget every occupant.
    pub fn reset(&mut self) {
        self.slots.fill(None);
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    fn index_of(&self, reg: Reg) -> Result<usize, RegAllocError> {
        self.regs
            .iter()
            .position(|&r| r == reg)
            .ok_or(RegAllocError::NotWorkingRegister(reg))
    }

    /// Register currently holding `temp`.
    pub fn find(&self, temp: u32) -> Option<Reg> {
        self.slots
            .iter()
            .position(|s| s.is_some_and(|s| s.temp == temp))
            .map(|i| self.regs[i])
    }

    pub fn occupant(&self, reg: Reg) -> Option<Slot> {
        self.index_of(reg).ok().and_then(|i| self.slots[i])
    }

    /// Recompute every occupant's next-use distance.
    pub fn refresh(&mut self, next_use: impl Fn(u32) -> Option<usize>) {
        for slot in self.slots.iter_mut().flatten() {
            slot.next_use = next_use(slot.temp);
        }
    }

    /// Obtain a register for `temp`, never choosing one in `exclude`.
    ///
    /// The new occupant starts clean; the caller marks it dirty once it
    /// writes a computed value.
    pub fn allocate(&mut self, temp: u32, exclude: &[Reg]) -> Result<Allocation, RegAllocError> {
        if let Some(reg) = self.find(temp) {
            return Ok(Allocation::Resident(reg));
        }

        let candidates: Vec<usize> = (0..self.regs.len())
            .filter(|&i| !exclude.contains(&self.regs[i]))
            .collect();

        let (idx, alloc) = if let Some(&i) = candidates.iter().find(|&&i| self.slots[i].is_none()) {
            (i, Allocation::Empty(self.regs[i]))
        } else if let Some(&i) = candidates
            .iter()
            .find(|&&i| self.slots[i].is_some_and(|s| s.next_use.is_none()))
        {
            let victim = self.slots[i].map_or(0, |s| s.temp);
            (i, Allocation::Reclaimed { reg: self.regs[i], victim })
        } else {
            // Furthest next use wins; the first register wins ties.
            let mut best: Option<(usize, usize)> = None;
            for &i in &candidates {
                let dist = self.slots[i].and_then(|s| s.next_use).unwrap_or(usize::MAX);
                if best.map_or(true, |(_, d)| dist > d) {
                    best = Some((i, dist));
                }
            }
            let (i, _) = best.ok_or(RegAllocError::NoRegistersAvailable)?;
            let (victim, spill) = self.slots[i].map_or((0, false), |s| (s.temp, s.dirty));
            (i, Allocation::Evicted { reg: self.regs[i], victim, spill })
        };

        self.slots[idx] = Some(Slot {
            temp,
            next_use: None,
            dirty: false,
        });
        Ok(alloc)
    }

    /// Hand `reg` to `temp` directly, replacing whatever it held.
    pub fn assign(&mut self, reg: Reg, temp: u32) -> Result<(), RegAllocError> {
        let i = self.index_of(reg)?;
        self.slots[i] = Some(Slot {
            temp,
            next_use: None,
            dirty: false,
        });
        Ok(())
    }

    pub fn mark_dirty(&mut self, reg: Reg) {
        if let Ok(i) = self.index_of(reg) {
            if let Some(slot) = self.slots[i].as_mut() {
                slot.dirty = true;
            }
        }
    }

    /// Release the register holding `temp`, if any.
    pub fn free_temp(&mut self, temp: u32) -> Option<Reg> {
        let i = self
            .slots
            .iter()
            .position(|s| s.is_some_and(|s| s.temp == temp))?;
        self.slots[i] = None;
        Some(self.regs[i])
    }

    /// Number of occupied registers and pool size.
    pub fn usage(&self) -> (usize, usize) {
        let used = self.slots.iter().filter(|s| s.is_some()).count();
        (used, self.regs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_regfile(n: u8) -> RegisterFile {
        RegisterFile::new((0..n).map(|i| Reg(8 + i)).collect())
    }

    #[test]
    fn test_register_allocation() {
        let mut regfile = create_test_regfile(4);

        let a = regfile.allocate(100, &[]).unwrap();
        let b = regfile.allocate(101, &[]).unwrap();
        assert_eq!(a, Allocation::Empty(Reg(8)));
        assert_eq!(b, Allocation::Empty(Reg(9)));
        assert_eq!(regfile.allocate(100, &[]).unwrap(), Allocation::Resident(Reg(8)));
        assert_eq!(regfile.find(101), Some(Reg(9)));
        assert_eq!(regfile.usage(), (2, 4));
    }

    #[test]
    fn test_exclude_is_respected() {
        let mut regfile = create_test_regfile(2);
        let alloc = regfile.allocate(1, &[Reg(8)]).unwrap();
        assert_eq!(alloc.reg(), Reg(9));
        assert_eq!(
            regfile.allocate(2, &[Reg(8), Reg(9)]),
            Err(RegAllocError::NoRegistersAvailable)
        );
    }

    #[test]
    fn test_dead_occupant_reclaimed_before_eviction() {
        let mut regfile = create_test_regfile(2);
        regfile.allocate(1, &[]).unwrap();
        regfile.allocate(2, &[]).unwrap();
        regfile.mark_dirty(Reg(8));
        regfile.mark_dirty(Reg(9));
        regfile.refresh(|t| if t == 1 { Some(3) } else { None });

        let alloc = regfile.allocate(3, &[]).unwrap();
        assert_eq!(alloc, Allocation::Reclaimed { reg: Reg(9), victim: 2 });
        assert_eq!(regfile.find(2), None);
    }

    #[test]
    fn test_furthest_next_use_is_evicted() {
        let mut regfile = create_test_regfile(3);
        for t in 0..3 {
            regfile.allocate(t, &[]).unwrap();
        }
        regfile.mark_dirty(Reg(9));
        regfile.refresh(|t| Some([2, 9, 4][t as usize]));

        let alloc = regfile.allocate(7, &[]).unwrap();
        assert_eq!(alloc, Allocation::Evicted { reg: Reg(9), victim: 1, spill: true });
        assert_eq!(regfile.find(7), Some(Reg(9)));
        assert!(!regfile.occupant(Reg(9)).unwrap().dirty);

        // A clean victim needs no spill.
        regfile.refresh(|t| match t {
            0 => Some(1),
            2 => Some(5),
            _ => Some(2),
        });
        let alloc = regfile.allocate(8, &[]).unwrap();
        assert_eq!(alloc, Allocation::Evicted { reg: Reg(10), victim: 2, spill: false });
    }

    #[test]
    fn test_assign_and_free() {
        let mut regfile = create_test_regfile(2);
        regfile.allocate(5, &[]).unwrap();
        regfile.assign(Reg(8), 6).unwrap();
        assert_eq!(regfile.find(5), None);
        assert_eq!(regfile.find(6), Some(Reg(8)));
        assert_eq!(regfile.free_temp(6), Some(Reg(8)));
        assert_eq!(regfile.free_temp(6), None);
        assert_eq!(regfile.assign(Reg(3), 1), Err(RegAllocError::NotWorkingRegister(Reg(3))));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut regfile = create_test_regfile(2);
        regfile.allocate(1, &[]).unwrap();
        regfile.allocate(2, &[]).unwrap();
        regfile.reset();
        assert_eq!(regfile.usage(), (0, 2));
    }
}
