// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Compile-time configuration options for the MPU interface.
//!
//! Options live in a typed `const` object rather than behind `#[cfg]` blocks
//! so that every code path is type-checked regardless of which options are
//! enabled. Disabled paths are folded away by the compiler.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether every register write made by [`crate::mpu::Mpu`] is emitted
    /// at `trace` level through the `log` facade.
    ///
    /// Useful when bringing up a new board to see exactly which words land
    /// in the RBAR/RASR window and in which order.
    pub(crate) trace_register_writes: bool,
}

/// The unique instance of `Config`. This is the only location in the crate
/// where Cargo features are consulted.
pub(crate) const CONFIG: Config = Config {
    trace_register_writes: cfg!(feature = "trace_register_writes"),
};
