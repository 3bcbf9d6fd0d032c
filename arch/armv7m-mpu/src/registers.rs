// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Access to the System Control Space registers used by the MPU.
//!
//! Everything the MPU interface touches lives in one 4 KiB page of the
//! System Control Space starting at `0xE000_ED00`: the SCB's System Handler
//! Control and State Register and the PMSAv7 MPU block. Drivers reach it
//! through the [`RegisterBank`] trait, which addresses 32-bit registers by
//! byte offset from the bank's base. [`SystemControlSpace`] implements it on
//! top of the typed [`ScsRegisters`] block; tests substitute an in-memory
//! bank.

use core::ops::Deref;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::register_structs;
use tock_registers::registers::{ReadOnly, ReadWrite};

use crate::mpu::{Control, RegionNumber, Type};
use crate::scb::SystemHandlerControlAndState;
use crate::support;

/// Base address of the System Control Block within the System Control Space.
pub const SCS_BASE: usize = 0xE000_ED00;

/// System Handler Control and State Register
pub const SHCSR: usize = 0x24;

/// MPU Type Register
pub const MPU_TYPE: usize = 0x90;
/// MPU Control Register
pub const MPU_CTRL: usize = 0x94;
/// MPU Region Number Register
pub const MPU_RNR: usize = 0x98;
/// MPU Region Base Address Register
pub const MPU_RBAR: usize = 0x9C;
/// MPU Region Attribute and Size Register
pub const MPU_RASR: usize = 0xA0;
/// Alias 1 of RBAR
pub const MPU_RBAR_A1: usize = 0xA4;
/// Alias 1 of RASR
pub const MPU_RASR_A1: usize = 0xA8;
/// Alias 2 of RBAR
pub const MPU_RBAR_A2: usize = 0xAC;
/// Alias 2 of RASR
pub const MPU_RASR_A2: usize = 0xB0;
/// Alias 3 of RBAR
pub const MPU_RBAR_A3: usize = 0xB4;
/// Alias 3 of RASR
pub const MPU_RASR_A3: usize = 0xB8;

/// Regions reachable with consecutive word writes starting at RBAR: the
/// primary pair plus its three aliases.
pub const MPU_ALIAS_WINDOW_REGIONS: usize = 4;

register_structs! {
    /// The part of the System Control Space used by the MPU interface,
    /// starting at the System Control Block.
    pub ScsRegisters {
        /// CPUID through CCR and SHPR1-3, not used here.
        (0x00 => _reserved0),

        /// System Handler Control and State Register
        (0x24 => shcsr: ReadWrite<u32, SystemHandlerControlAndState::Register>),

        /// Fault status and address registers, CPUID features, CPACR.
        (0x28 => _reserved1),

        /// Indicates whether the MPU is present and, if so, how many regions
        /// it supports.
        (0x90 => mpu_type: ReadOnly<u32, Type::Register>),

        /// The control register:
        ///   * Enables the MPU (bit 0).
        ///   * Enables MPU in hard-fault, non-maskable interrupt (NMI).
        ///   * Enables the default memory map background region in privileged mode.
        (0x94 => ctrl: ReadWrite<u32, Control::Register>),

        /// Selects the region number (zero-indexed) referenced by the region
        /// base address and region attribute and size registers.
        (0x98 => rnr: ReadWrite<u32, RegionNumber::Register>),

        /// RBAR, RASR and their three alias pairs, in address order.
        (0x9C => window: [ReadWrite<u32>; 2 * MPU_ALIAS_WINDOW_REGIONS]),

        (0xBC => @END),
    }
}

/// A pointer to statically allocated memory-mapped registers.
pub struct StaticRef<T> {
    ptr: *const T,
}

impl<T> StaticRef<T> {
    /// # Safety
    ///
    /// `ptr` must be aligned, non-null and dereferencable as `T` for the
    /// lifetime of the program. `*ptr` must be valid for volatile reads and
    /// writes of every register in `T`.
    pub const unsafe fn new(ptr: *const T) -> StaticRef<T> {
        StaticRef { ptr }
    }
}

impl<T> Clone for StaticRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticRef<T> {}

impl<T> Deref for StaticRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: guaranteed by the caller of `StaticRef::new`.
        unsafe { &*self.ptr }
    }
}

const SCS_BASE_ADDRESS: StaticRef<ScsRegisters> =
    unsafe { StaticRef::new(SCS_BASE as *const ScsRegisters) };

/// A bank of 32-bit memory-mapped registers.
///
/// Implementations must perform every `set` individually and in program
/// order: no merging, no reordering, no elision of repeated writes.
pub trait RegisterBank {
    /// Read the register at `offset` bytes from the bank's base.
    fn get(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset` bytes from the bank's base.
    fn set(&self, offset: usize, value: u32);

    /// Data synchronization barrier.
    fn dsb(&self) {
        support::dsb();
    }

    /// Instruction synchronization barrier.
    fn isb(&self) {
        support::isb();
    }
}

impl<B: RegisterBank + ?Sized> RegisterBank for &B {
    fn get(&self, offset: usize) -> u32 {
        (**self).get(offset)
    }

    fn set(&self, offset: usize, value: u32) {
        (**self).set(offset, value);
    }

    fn dsb(&self) {
        (**self).dsb();
    }

    fn isb(&self) {
        (**self).isb();
    }
}

/// The memory-mapped System Control Space of the running core.
///
/// There should only be one instantiation of this object as it represents
/// real hardware.
pub struct SystemControlSpace {
    registers: StaticRef<ScsRegisters>,
}

impl SystemControlSpace {
    /// Bank at the architectural address `0xE000_ED00`.
    ///
    /// # Safety
    ///
    /// Must only be used on an ARMv7-M core, and the caller must ensure no
    /// other code concurrently reconfigures the MPU or SHCSR.
    pub const unsafe fn new() -> SystemControlSpace {
        SystemControlSpace {
            registers: SCS_BASE_ADDRESS,
        }
    }

    /// Bank over an arbitrary register block.
    ///
    /// # Safety
    ///
    /// See [`StaticRef::new`].
    pub const unsafe fn at(registers: StaticRef<ScsRegisters>) -> SystemControlSpace {
        SystemControlSpace { registers }
    }
}

impl RegisterBank for SystemControlSpace {
    /// Offsets outside the register block read as zero.
    fn get(&self, offset: usize) -> u32 {
        let regs = &*self.registers;
        match offset {
            SHCSR => regs.shcsr.get(),
            MPU_TYPE => regs.mpu_type.get(),
            MPU_CTRL => regs.ctrl.get(),
            MPU_RNR => regs.rnr.get(),
            MPU_RBAR..=MPU_RASR_A3 => regs.window[(offset - MPU_RBAR) / 4].get(),
            _ => 0,
        }
    }

    /// Writes to MPU_TYPE and to offsets outside the register block are
    /// dropped.
    fn set(&self, offset: usize, value: u32) {
        let regs = &*self.registers;
        match offset {
            SHCSR => regs.shcsr.set(value),
            MPU_CTRL => regs.ctrl.set(value),
            MPU_RNR => regs.rnr.set(value),
            MPU_RBAR..=MPU_RASR_A3 => regs.window[(offset - MPU_RBAR) / 4].set(value),
            _ => {}
        }
    }
}

/// In-memory register bank which records every write and barrier.
#[cfg(test)]
pub(crate) mod fake {
    extern crate std;

    use core::cell::RefCell;
    use std::vec::Vec;

    use super::{RegisterBank, MPU_RASR_A3};

    const WORDS: usize = MPU_RASR_A3 / 4 + 1;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Access {
        Write { offset: usize, value: u32 },
        Dsb,
        Isb,
    }

    pub(crate) struct FakeBank {
        words: RefCell<[u32; WORDS]>,
        log: RefCell<Vec<Access>>,
    }

    impl FakeBank {
        pub(crate) fn new() -> FakeBank {
            FakeBank {
                words: RefCell::new([0; WORDS]),
                log: RefCell::new(Vec::new()),
            }
        }

        /// Set a register's contents without recording a write, e.g. to
        /// model a read-only register or a reset value.
        pub(crate) fn preset(&self, offset: usize, value: u32) {
            self.words.borrow_mut()[offset / 4] = value;
        }

        pub(crate) fn word(&self, offset: usize) -> u32 {
            self.words.borrow()[offset / 4]
        }

        pub(crate) fn accesses(&self) -> Vec<Access> {
            self.log.borrow().clone()
        }

        pub(crate) fn writes(&self) -> Vec<(usize, u32)> {
            self.log
                .borrow()
                .iter()
                .filter_map(|access| match *access {
                    Access::Write { offset, value } => Some((offset, value)),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn clear_log(&self) {
            self.log.borrow_mut().clear();
        }
    }

    impl RegisterBank for FakeBank {
        fn get(&self, offset: usize) -> u32 {
            self.word(offset)
        }

        fn set(&self, offset: usize, value: u32) {
            self.words.borrow_mut()[offset / 4] = value;
            self.log.borrow_mut().push(Access::Write { offset, value });
        }

        fn dsb(&self) {
            self.log.borrow_mut().push(Access::Dsb);
        }

        fn isb(&self) {
            self.log.borrow_mut().push(Access::Isb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Access, FakeBank};
    use super::*;

    #[test]
    fn scb_and_mpu_share_one_page() {
        assert_eq!(SCS_BASE + MPU_TYPE, 0xE000_ED90);
        assert_eq!(SCS_BASE + MPU_RASR_A3, 0xE000_EDB8);
        assert_eq!(SCS_BASE + SHCSR, 0xE000_ED24);
    }

    #[test]
    fn alias_window_is_contiguous() {
        let window = [
            MPU_RBAR,
            MPU_RASR,
            MPU_RBAR_A1,
            MPU_RASR_A1,
            MPU_RBAR_A2,
            MPU_RASR_A2,
            MPU_RBAR_A3,
            MPU_RASR_A3,
        ];
        assert_eq!(window.len(), 2 * MPU_ALIAS_WINDOW_REGIONS);
        for (i, offset) in window.iter().enumerate() {
            assert_eq!(*offset, MPU_RBAR + 4 * i);
        }
    }

    #[test]
    fn fake_records_through_reference() {
        let bank = FakeBank::new();
        let by_ref = &bank;
        by_ref.dsb();
        by_ref.set(MPU_CTRL, 5);
        by_ref.isb();

        assert_eq!(by_ref.get(MPU_CTRL), 5);
        assert_eq!(
            bank.accesses(),
            [
                Access::Dsb,
                Access::Write {
                    offset: MPU_CTRL,
                    value: 5
                },
                Access::Isb,
            ]
        );
    }

    #[test]
    fn typed_block_matches_offsets() {
        let mut words = [0u32; MPU_RASR_A3 / 4 + 1];
        assert_eq!(core::mem::size_of::<ScsRegisters>(), words.len() * 4);

        let bank = unsafe {
            SystemControlSpace::at(StaticRef::new(words.as_mut_ptr() as *const ScsRegisters))
        };
        let writable = [
            SHCSR,
            MPU_CTRL,
            MPU_RNR,
            MPU_RBAR,
            MPU_RASR,
            MPU_RBAR_A1,
            MPU_RASR_A1,
            MPU_RBAR_A2,
            MPU_RASR_A2,
            MPU_RBAR_A3,
            MPU_RASR_A3,
        ];
        for (i, offset) in writable.iter().enumerate() {
            bank.set(*offset, 0x100 + i as u32);
        }
        bank.set(MPU_TYPE, 0xFFFF_FFFF);
        for (i, offset) in writable.iter().enumerate() {
            assert_eq!(bank.get(*offset), 0x100 + i as u32);
        }
        assert_eq!(bank.get(MPU_TYPE), 0);

        for (i, offset) in writable.iter().enumerate() {
            assert_eq!(words[offset / 4], 0x100 + i as u32);
        }
        assert_eq!(words[MPU_TYPE / 4], 0);
    }

    #[test]
    fn preset_is_not_a_write() {
        let bank = FakeBank::new();
        bank.preset(MPU_TYPE, 0x0000_0800);
        assert_eq!(bank.get(MPU_TYPE), 0x0000_0800);
        assert!(bank.writes().is_empty());
    }
}
