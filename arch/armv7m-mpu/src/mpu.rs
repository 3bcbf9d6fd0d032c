// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Register interface for the ARMv7-M (PMSAv7) memory protection unit found
//! on the Cortex-M3, Cortex-M4 and Cortex-M7.
//!
//! The MPU divides the address space into up to 8 or 16 regions, each
//! described by a Region Base Address Register (RBAR) and a Region Attribute
//! and Size Register (RASR). This module provides:
//!
//! - the field layout of every MPU register,
//! - the region size and access permission encodings,
//! - `const` packing of RBAR/RASR words so region tables can live in flash,
//! - [`Mpu`], which writes those words to the hardware.
//!
//! Nothing here validates what it is asked to write, with the exception of
//! [`Region::checked`]. Region numbers, sizes and alignments are the caller's
//! responsibility; getting them wrong produces wrong protection, not an error.
//!
//! Described in section 4.5 of
//! <http://infocenter.arm.com/help/topic/com.arm.doc.dui0553a/DUI0553A_cortex_m4_dgug.pdf>
//!
//! ```rust,ignore
//! use armv7m_mpu::mpu::{AccessPermission, Attributes, Control, Mpu, Region, RegionSize};
//!
//! static REGIONS: [Region; 2] = [
//!     Region::new(0, 0x0000_0000, Attributes {
//!         cacheable: true,
//!         ..Attributes::new(AccessPermission::ReadOnly, RegionSize::Size512KB)
//!     }),
//!     Region::new(1, 0x2000_0000, Attributes {
//!         execute_never: true,
//!         ..Attributes::new(AccessPermission::Full, RegionSize::Size128KB)
//!     }),
//! ];
//!
//! let mpu = unsafe { Mpu::from_hardware() };
//! mpu.disable();
//! mpu.load(&REGIONS);
//! mpu.enable(Control::PRIVDEFENA::SET);
//! ```

use core::fmt;

use log::{debug, trace};
use tock_registers::fields::{Field, FieldValue};
use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName};

use crate::config::CONFIG;
use crate::registers::{
    RegisterBank, SystemControlSpace, MPU_ALIAS_WINDOW_REGIONS, MPU_CTRL, MPU_RASR, MPU_RBAR,
    MPU_RNR, MPU_TYPE,
};
use crate::scb;

register_bitfields![u32,
    pub Type [
        /// The number of MPU instructions regions supported. Always reads 0.
        IREGION OFFSET(16) NUMBITS(8) [],
        /// The number of data regions supported. If this field reads-as-zero
        /// the processor does not implement an MPU.
        DREGION OFFSET(8) NUMBITS(8) [],
        /// Unified (0) or separate (1) instruction and data regions.
        SEPARATE OFFSET(0) NUMBITS(1) []
    ],

    pub Control [
        /// Use the default memory map as a background region for privileged
        /// accesses that hit no enabled region.
        PRIVDEFENA OFFSET(2) NUMBITS(1) [],
        /// Keep the MPU enabled in HardFault, NMI and FAULTMASK handlers.
        HFNMIENA OFFSET(1) NUMBITS(1) [],
        /// Enables the MPU
        ENABLE OFFSET(0) NUMBITS(1) []
    ],

    pub RegionNumber [
        /// Region referenced by RBAR and RASR.
        REGION OFFSET(0) NUMBITS(8) []
    ],

    pub RegionBaseAddress [
        /// Base address of the region, bits [31:5]. Must be aligned to the
        /// region size.
        ADDR OFFSET(5) NUMBITS(27) [],
        /// MPU Region Number valid bit.
        VALID OFFSET(4) NUMBITS(1) [
            /// Write the region selected in RNR
            UseRNR = 0,
            /// Write the region in REGION and update RNR
            UseRBAR = 1
        ],
        /// Specifies which MPU region to set if VALID is set to 1.
        REGION OFFSET(0) NUMBITS(4) []
    ],

    pub RegionAttributes [
        /// Instruction access disable
        XN OFFSET(28) NUMBITS(1) [],
        /// Data access permissions
        AP OFFSET(24) NUMBITS(3) [
            //                             Privileged  Unprivileged
            NoAccess = 0b000,           // --          --
            PrivilegedOnly = 0b001,     // RW          --
            UnprivilegedReadOnly = 0b010, // RW        R-
            Full = 0b011,               // RW          RW
            PrivilegedReadOnly = 0b101, // R-          --
            ReadOnly = 0b110            // R-          R-
        ],
        /// Type extension, together with C and B selects the memory type
        TEX OFFSET(19) NUMBITS(3) [],
        /// Shareable
        S OFFSET(18) NUMBITS(1) [],
        /// Cacheable
        C OFFSET(17) NUMBITS(1) [],
        /// Bufferable
        B OFFSET(16) NUMBITS(1) [],
        /// Subregion disable bits, one per eighth of the region
        SRD OFFSET(8) NUMBITS(8) [],
        /// Region size is 2^(SIZE+1) bytes
        SIZE OFFSET(1) NUMBITS(5) [],
        /// Enables the region
        ENABLE OFFSET(0) NUMBITS(1) []
    ]
];

/// Encodings of the RASR.SIZE field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RegionSize {
    Size32B = 0x04,
    Size64B = 0x05,
    Size128B = 0x06,
    Size256B = 0x07,
    Size512B = 0x08,
    Size1KB = 0x09,
    Size2KB = 0x0A,
    Size4KB = 0x0B,
    Size8KB = 0x0C,
    Size16KB = 0x0D,
    Size32KB = 0x0E,
    Size64KB = 0x0F,
    Size128KB = 0x10,
    Size256KB = 0x11,
    Size512KB = 0x12,
    Size1MB = 0x13,
    Size2MB = 0x14,
    Size4MB = 0x15,
    Size8MB = 0x16,
    Size16MB = 0x17,
    Size32MB = 0x18,
    Size64MB = 0x19,
    Size128MB = 0x1A,
    Size256MB = 0x1B,
    Size512MB = 0x1C,
    Size1GB = 0x1D,
    Size2GB = 0x1E,
    Size4GB = 0x1F,
}

impl RegionSize {
    /// Every legal size, smallest first.
    pub const ALL: [RegionSize; 28] = [
        RegionSize::Size32B,
        RegionSize::Size64B,
        RegionSize::Size128B,
        RegionSize::Size256B,
        RegionSize::Size512B,
        RegionSize::Size1KB,
        RegionSize::Size2KB,
        RegionSize::Size4KB,
        RegionSize::Size8KB,
        RegionSize::Size16KB,
        RegionSize::Size32KB,
        RegionSize::Size64KB,
        RegionSize::Size128KB,
        RegionSize::Size256KB,
        RegionSize::Size512KB,
        RegionSize::Size1MB,
        RegionSize::Size2MB,
        RegionSize::Size4MB,
        RegionSize::Size8MB,
        RegionSize::Size16MB,
        RegionSize::Size32MB,
        RegionSize::Size64MB,
        RegionSize::Size128MB,
        RegionSize::Size256MB,
        RegionSize::Size512MB,
        RegionSize::Size1GB,
        RegionSize::Size2GB,
        RegionSize::Size4GB,
    ];

    /// Value of the 5-bit SIZE field.
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    /// Size of the region in bytes.
    pub const fn bytes(self) -> u64 {
        1 << (self as u8 + 1)
    }

    pub fn from_encoding(encoding: u8) -> Option<RegionSize> {
        RegionSize::ALL
            .get(encoding.wrapping_sub(RegionSize::Size32B as u8) as usize)
            .copied()
    }

    /// The size encoding for exactly `bytes` bytes.
    pub fn from_bytes(bytes: u64) -> Result<RegionSize, RegionError> {
        if !bytes.is_power_of_two()
            || bytes < RegionSize::Size32B.bytes()
            || bytes > RegionSize::Size4GB.bytes()
        {
            return Err(RegionError::InvalidSize);
        }
        RegionSize::from_encoding((bytes.trailing_zeros() - 1) as u8)
            .ok_or(RegionError::InvalidSize)
    }
}

/// Encodings of the RASR.AP field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessPermission {
    NoAccess = 0b000,
    PrivilegedOnly = 0b001,
    UnprivilegedReadOnly = 0b010,
    Full = 0b011,
    PrivilegedReadOnly = 0b101,
    ReadOnly = 0b110,
}

impl AccessPermission {
    /// Decode an AP field. `0b100` is reserved; `0b111` behaves as
    /// `ReadOnly`.
    pub fn from_bits(bits: u8) -> Option<AccessPermission> {
        match bits {
            0b000 => Some(AccessPermission::NoAccess),
            0b001 => Some(AccessPermission::PrivilegedOnly),
            0b010 => Some(AccessPermission::UnprivilegedReadOnly),
            0b011 => Some(AccessPermission::Full),
            0b101 => Some(AccessPermission::PrivilegedReadOnly),
            0b110 | 0b111 => Some(AccessPermission::ReadOnly),
            _ => None,
        }
    }
}

/// Reasons [`Region::checked`] or [`RegionSize::from_bytes`] reject a
/// region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionError {
    /// Region number does not fit the 4-bit RBAR.REGION field.
    InvalidRegionNumber,
    /// Not a power of two between 32 bytes and 4 GiB.
    InvalidSize,
    /// Base address is not a multiple of the region size.
    MisalignedBase,
    /// Regions below 256 bytes have no subregions.
    SubregionsUnsupported,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RegionError::InvalidRegionNumber => "region number out of range",
            RegionError::InvalidSize => "invalid region size",
            RegionError::MisalignedBase => "base address not aligned to region size",
            RegionError::SubregionsUnsupported => {
                "subregions require a region of at least 256 bytes"
            }
        };
        f.write_str(msg)
    }
}

const fn pack<R: RegisterLongName>(field: &Field<u32, R>, value: u32) -> u32 {
    (value & field.mask) << field.shift
}

const fn in_place<R: RegisterLongName>(field: &Field<u32, R>) -> u32 {
    field.mask << field.shift
}

/// RBAR value selecting `region` and placing it at `base_address`.
///
/// The VALID bit is set, so writing this value to RBAR also updates RNR.
/// Low address bits below the 32-byte granule are dropped; alignment to the
/// actual region size is not checked.
pub const fn rbar(region: u32, base_address: u32) -> u32 {
    (base_address & in_place(&RegionBaseAddress::ADDR))
        | pack(&RegionBaseAddress::REGION, region)
        | pack(&RegionBaseAddress::VALID, 1)
}

/// RASR value for an enabled region.
///
/// Each argument is masked to its field width.
pub const fn rasr(
    disable_exec: bool,
    access: AccessPermission,
    type_extension: u8,
    shareable: bool,
    cacheable: bool,
    bufferable: bool,
    subregion_disable: u8,
    size: RegionSize,
) -> u32 {
    pack(&RegionAttributes::XN, disable_exec as u32)
        | pack(&RegionAttributes::AP, access as u32)
        | pack(&RegionAttributes::TEX, type_extension as u32)
        | pack(&RegionAttributes::S, shareable as u32)
        | pack(&RegionAttributes::C, cacheable as u32)
        | pack(&RegionAttributes::B, bufferable as u32)
        | pack(&RegionAttributes::SRD, subregion_disable as u32)
        | pack(&RegionAttributes::SIZE, size as u32)
        | pack(&RegionAttributes::ENABLE, 1)
}

/// Named RASR fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Attributes {
    pub execute_never: bool,
    pub access: AccessPermission,
    pub type_extension: u8,
    pub shareable: bool,
    pub cacheable: bool,
    pub bufferable: bool,
    /// Bit `n` disables the `n`th eighth of the region.
    pub subregion_disable: u8,
    pub size: RegionSize,
}

impl Attributes {
    /// Strongly-ordered, executable, no subregions disabled.
    pub const fn new(access: AccessPermission, size: RegionSize) -> Attributes {
        Attributes {
            execute_never: false,
            access,
            type_extension: 0,
            shareable: false,
            cacheable: false,
            bufferable: false,
            subregion_disable: 0,
            size,
        }
    }

    pub const fn rasr(&self) -> u32 {
        rasr(
            self.execute_never,
            self.access,
            self.type_extension,
            self.shareable,
            self.cacheable,
            self.bufferable,
            self.subregion_disable,
            self.size,
        )
    }
}

/// The register values describing one MPU region.
///
/// Laid out as the RBAR word followed by the RASR word, which is the order
/// [`Mpu::load`] writes them in.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    rbar: u32,
    rasr: u32,
}

impl Region {
    pub const fn from_raw(rbar: u32, rasr: u32) -> Region {
        Region { rbar, rasr }
    }

    pub const fn new(number: u32, base_address: u32, attributes: Attributes) -> Region {
        Region {
            rbar: rbar(number, base_address),
            rasr: attributes.rasr(),
        }
    }

    /// A table entry which turns region `number` off.
    pub const fn disabled(number: u32) -> Region {
        Region {
            rbar: rbar(number, 0),
            rasr: 0,
        }
    }

    /// Like [`Region::new`], but rejects descriptors the hardware would
    /// silently misinterpret.
    pub fn checked(
        number: u32,
        base_address: u32,
        attributes: Attributes,
    ) -> Result<Region, RegionError> {
        if number > RegionBaseAddress::REGION.mask {
            return Err(RegionError::InvalidRegionNumber);
        }
        let size = attributes.size.bytes();
        if u64::from(base_address) % size != 0 {
            return Err(RegionError::MisalignedBase);
        }
        if attributes.subregion_disable != 0 && size < RegionSize::Size256B.bytes() {
            return Err(RegionError::SubregionsUnsupported);
        }
        Ok(Region::new(number, base_address, attributes))
    }

    pub const fn rbar(&self) -> u32 {
        self.rbar
    }

    pub const fn rasr(&self) -> u32 {
        self.rasr
    }

    fn base_register(&self) -> LocalRegisterCopy<u32, RegionBaseAddress::Register> {
        LocalRegisterCopy::new(self.rbar)
    }

    fn attribute_register(&self) -> LocalRegisterCopy<u32, RegionAttributes::Register> {
        LocalRegisterCopy::new(self.rasr)
    }

    pub fn number(&self) -> u32 {
        self.base_register().read(RegionBaseAddress::REGION)
    }

    pub fn base_address(&self) -> u32 {
        self.base_register().read(RegionBaseAddress::ADDR) << RegionBaseAddress::ADDR.shift
    }

    /// Whether RBAR selects the region itself rather than relying on RNR.
    pub fn is_valid(&self) -> bool {
        self.base_register().is_set(RegionBaseAddress::VALID)
    }

    pub fn is_enabled(&self) -> bool {
        self.attribute_register().is_set(RegionAttributes::ENABLE)
    }

    pub fn size(&self) -> Option<RegionSize> {
        RegionSize::from_encoding(self.attribute_register().read(RegionAttributes::SIZE) as u8)
    }

    pub fn access(&self) -> Option<AccessPermission> {
        AccessPermission::from_bits(self.attribute_register().read(RegionAttributes::AP) as u8)
    }

    pub fn execute_never(&self) -> bool {
        self.attribute_register().is_set(RegionAttributes::XN)
    }

    pub fn subregion_disable(&self) -> u8 {
        self.attribute_register().read(RegionAttributes::SRD) as u8
    }
}

/// Driver for the MPU registers.
///
/// `Mpu` performs unconditional register writes. It does not serialize
/// access: callers configuring the MPU from more than one context must
/// disable interrupts or otherwise ensure only one configuration sequence
/// runs at a time.
pub struct Mpu<B: RegisterBank = SystemControlSpace> {
    bank: B,
}

impl Mpu<SystemControlSpace> {
    /// The MPU of the running core.
    ///
    /// # Safety
    ///
    /// See [`SystemControlSpace::new`]. There should only be one instance.
    pub const unsafe fn from_hardware() -> Mpu<SystemControlSpace> {
        Mpu::new(SystemControlSpace::new())
    }
}

impl<B: RegisterBank> Mpu<B> {
    pub const fn new(bank: B) -> Mpu<B> {
        Mpu { bank }
    }

    fn write(&self, offset: usize, value: u32) {
        if CONFIG.trace_register_writes {
            trace!("mpu: [{:#04x}] <- {:#010x}", offset, value);
        }
        self.bank.set(offset, value);
    }

    /// Enable the MPU.
    ///
    /// `default_access` is merged into CTRL alongside ENABLE; pass
    /// `Control::PRIVDEFENA::SET` to keep the default memory map as a
    /// privileged background region, or `Control::ENABLE::SET` alone for
    /// none. MemManage faults are enabled afterwards so that violations are
    /// reported as such rather than escalating to HardFault.
    pub fn enable(&self, default_access: FieldValue<u32, Control::Register>) {
        let ctrl = default_access + Control::ENABLE::SET;
        debug!("mpu: enable, ctrl {:#x}", ctrl.value);

        self.bank.dsb();
        self.bank.isb();
        self.write(MPU_CTRL, ctrl.value);
        scb::enable_memfault(&self.bank);
    }

    /// Disable the MPU.
    ///
    /// MemManage faults are disabled before the MPU itself. Other CTRL bits
    /// are left as they are.
    pub fn disable(&self) {
        debug!("mpu: disable");

        self.bank.dsb();
        self.bank.isb();
        scb::disable_memfault(&self.bank);
        let mut ctrl = LocalRegisterCopy::<u32, Control::Register>::new(self.bank.get(MPU_CTRL));
        ctrl.modify(Control::ENABLE::CLEAR);
        self.write(MPU_CTRL, ctrl.get());
    }

    /// Disable region `rnr` by selecting it and zeroing its RASR.
    ///
    /// RBAR keeps its previous contents.
    pub fn clear_region(&self, rnr: u32) {
        self.write(MPU_RNR, rnr);
        self.write(MPU_RASR, 0);
    }

    /// Write RBAR then RASR.
    ///
    /// The region is chosen by the REGION/VALID bits embedded in `rbar`
    /// (see [`rbar`]); with VALID clear, the region currently in RNR is
    /// written instead.
    pub fn set_region(&self, rbar: u32, rasr: u32) {
        self.write(MPU_RBAR, rbar);
        self.write(MPU_RASR, rasr);
    }

    /// Select region `rnr` through RNR, then write RBAR and RASR.
    pub fn set_region_ex(&self, rnr: u32, rbar: u32, rasr: u32) {
        self.write(MPU_RNR, rnr);
        self.write(MPU_RBAR, rbar);
        self.write(MPU_RASR, rasr);
    }

    /// Program every region in `table`, in table order.
    ///
    /// The words are copied one at a time into the RBAR/RASR window (the
    /// primary pair and its three aliases), four regions per pass. Which
    /// region each pair lands in is decided by the RBAR values themselves:
    /// entries should carry VALID and their region number (see [`rbar`]), or
    /// RNR must already select the intended first region. `table` must not
    /// be longer than the number of hardware regions.
    pub fn load(&self, table: &[Region]) {
        debug!("mpu: loading {} regions", table.len());

        for chunk in table.chunks(MPU_ALIAS_WINDOW_REGIONS) {
            self.ordered_copy(MPU_RBAR, chunk);
        }
    }

    fn ordered_copy(&self, offset: usize, regions: &[Region]) {
        let mut offset = offset;
        for region in regions {
            self.write(offset, region.rbar);
            self.write(offset + 4, region.rasr);
            offset += 8;
        }
    }

    /// Number of regions the MPU implements, 0 if there is no MPU.
    pub fn region_count(&self) -> usize {
        let mpu_type = LocalRegisterCopy::<u32, Type::Register>::new(self.bank.get(MPU_TYPE));
        mpu_type.read(Type::DREGION) as usize
    }

    pub fn is_present(&self) -> bool {
        self.region_count() > 0
    }

    pub fn is_enabled(&self) -> bool {
        LocalRegisterCopy::<u32, Control::Register>::new(self.bank.get(MPU_CTRL))
            .is_set(Control::ENABLE)
    }

    /// Read back the configuration of region `rnr`.
    ///
    /// Leaves `rnr` selected. The hardware reports VALID as zero.
    pub fn region(&self, rnr: u32) -> Region {
        self.write(MPU_RNR, rnr);
        Region::from_raw(self.bank.get(MPU_RBAR), self.bank.get(MPU_RASR))
    }
}
