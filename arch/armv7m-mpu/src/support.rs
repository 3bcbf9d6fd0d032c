// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Synchronization barriers for the Cortex-M architecture.

/// DSB instruction
///
/// Completes all explicit memory accesses issued before it.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn dsb() {
    use core::arch::asm;
    unsafe {
        asm!("dsb 0xF", options(nostack, preserves_flags));
    }
}

/// ISB instruction
///
/// Flushes the pipeline so later instructions are fetched after all context
/// changing operations before it have completed.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn isb() {
    use core::arch::asm;
    unsafe {
        asm!("isb 0xF", options(nostack, preserves_flags));
    }
}

/// DSB instruction (mock)
// Host builds have no memory-mapped MPU; keep the ordering guarantee only.
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn dsb() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// ISB instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn isb() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}
