// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Register interface for the ARMv7-M memory protection unit.
//!
//! Board startup code owns the region table and decides when to call into
//! [`mpu::Mpu`]; this crate only encodes the registers and writes them.

#![no_std]

mod config;

pub mod mpu;
pub mod registers;
pub mod scb;
pub mod support;

pub use mpu::{AccessPermission, Attributes, Mpu, Region, RegionError, RegionSize};
pub use registers::{RegisterBank, SystemControlSpace};
