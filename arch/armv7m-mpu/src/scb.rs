// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! ARM System Control Block: the pieces the MPU depends on.
//!
//! MPU violations are only reported as MemManage faults while
//! `SHCSR.MEMFAULTENA` is set; otherwise they escalate to HardFault.
//!
//! <https://developer.arm.com/documentation/dui0553/a/cortex-m4-peripherals/system-control-block/system-handler-control-and-state-register>

use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

use crate::registers::{RegisterBank, SHCSR};

register_bitfields![u32,
    pub SystemHandlerControlAndState [
        USGFAULTENA     OFFSET(18)  NUMBITS(1),
        BUSFAULTENA     OFFSET(17)  NUMBITS(1),
        /// MemManage exception enable. When clear, MPU faults escalate to
        /// HardFault.
        MEMFAULTENA     OFFSET(16)  NUMBITS(1),
        SVCALLPENDED    OFFSET(15)  NUMBITS(1),
        BUSFAULTPENDED  OFFSET(14)  NUMBITS(1),
        MEMFAULTPENDED  OFFSET(13)  NUMBITS(1),
        USGFAULTPENDED  OFFSET(12)  NUMBITS(1),
        SYSTICKACT      OFFSET(11)  NUMBITS(1),
        PENDSVACT       OFFSET(10)  NUMBITS(1),
        MONITORACT      OFFSET(8)   NUMBITS(1),
        SVCALLACT       OFFSET(7)   NUMBITS(1),
        USGFAULTACT     OFFSET(3)   NUMBITS(1),
        BUSFAULTACT     OFFSET(1)   NUMBITS(1),
        MEMFAULTACT     OFFSET(0)   NUMBITS(1)
    ]
];

fn shcsr<B: RegisterBank>(
    bank: &B,
) -> LocalRegisterCopy<u32, SystemHandlerControlAndState::Register> {
    LocalRegisterCopy::new(bank.get(SHCSR))
}

/// Route MPU violations to the MemManage handler.
pub fn enable_memfault<B: RegisterBank>(bank: &B) {
    let mut reg = shcsr(bank);
    reg.modify(SystemHandlerControlAndState::MEMFAULTENA::SET);
    bank.set(SHCSR, reg.get());
}

/// Stop reporting MPU violations as MemManage faults.
pub fn disable_memfault<B: RegisterBank>(bank: &B) {
    let mut reg = shcsr(bank);
    reg.modify(SystemHandlerControlAndState::MEMFAULTENA::CLEAR);
    bank.set(SHCSR, reg.get());
}

/// Whether MemManage faults are currently enabled.
pub fn memfault_enabled<B: RegisterBank>(bank: &B) -> bool {
    shcsr(bank).is_set(SystemHandlerControlAndState::MEMFAULTENA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::fake::FakeBank;

    #[test]
    fn enable_preserves_other_handlers() {
        let bank = FakeBank::new();
        // Bus and usage faults already enabled, SysTick active.
        bank.preset(SHCSR, 0x0006_0800);

        enable_memfault(&bank);

        assert_eq!(bank.writes(), [(SHCSR, 0x0007_0800)]);
        assert!(memfault_enabled(&bank));
    }

    #[test]
    fn disable_clears_only_memfaultena() {
        let bank = FakeBank::new();
        bank.preset(SHCSR, 0x0007_0001);

        disable_memfault(&bank);

        assert_eq!(bank.word(SHCSR), 0x0006_0001);
        assert!(!memfault_enabled(&bank));
    }
}
