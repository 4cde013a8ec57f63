//! Memory-space tags.
//!
//! Every view and owned array carries one of three zero-sized tags in its type:
//!
//! | Tag         | Host code may touch it | Accelerator code may touch it |
//! |-------------|------------------------|-------------------------------|
//! | [`Host`]    | yes                    | no                            |
//! | [`Device`]  | no                     | yes                           |
//! | [`Managed`] | yes                    | yes (with migration)          |
//!
//! Accessibility is expressed as two marker traits, [`HostAccessible`] and
//! [`DeviceAccessible`]. Element access on a view is only implemented when the
//! tag satisfies the matching trait, so dereferencing accelerator memory from
//! host code fails to compile rather than at runtime.
//!
//! The set of spaces is closed: [`MemorySpace`] is sealed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime mirror of a memory-space tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    /// Ordinary host memory.
    Host,
    /// Accelerator-resident memory.
    Device,
    /// Memory migrated on demand between host and accelerator.
    Managed,
}

impl MemoryType {
    /// Whether host code may dereference memory of this type.
    #[inline]
    #[must_use]
    pub const fn is_host_accessible(self) -> bool {
        matches!(self, MemoryType::Host | MemoryType::Managed)
    }

    /// Whether accelerator code may dereference memory of this type.
    #[inline]
    #[must_use]
    pub const fn is_device_accessible(self) -> bool {
        matches!(self, MemoryType::Device | MemoryType::Managed)
    }

    pub const fn name(self) -> &'static str {
        match self {
            MemoryType::Host => "host",
            MemoryType::Device => "device",
            MemoryType::Managed => "managed",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Host {}
    impl Sealed for super::Device {}
    impl Sealed for super::Managed {}
}

/// A memory space tag. Implemented only by [`Host`], [`Device`] and [`Managed`].
pub trait MemorySpace:
    sealed::Sealed + Copy + Default + fmt::Debug + Send + Sync + 'static
{
    /// The runtime value of this tag.
    const TYPE: MemoryType;
}

/// Spaces whose memory host code may read and write.
pub trait HostAccessible: MemorySpace {}

/// Spaces whose memory accelerator code may read and write.
pub trait DeviceAccessible: MemorySpace {}

/// Host-only memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Host;

/// Accelerator-resident memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Device;

/// Managed (migratable) memory, accessible from both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Managed;

impl MemorySpace for Host {
    const TYPE: MemoryType = MemoryType::Host;
}

impl MemorySpace for Device {
    const TYPE: MemoryType = MemoryType::Device;
}

impl MemorySpace for Managed {
    const TYPE: MemoryType = MemoryType::Managed;
}

impl HostAccessible for Host {}
impl HostAccessible for Managed {}

impl DeviceAccessible for Device {}
impl DeviceAccessible for Managed {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_is_accessible_from_both_sides() {
        assert!(MemoryType::Managed.is_host_accessible());
        assert!(MemoryType::Managed.is_device_accessible());
        assert!(MemoryType::Host.is_host_accessible());
        assert!(!MemoryType::Host.is_device_accessible());
        assert!(MemoryType::Device.is_device_accessible());
        assert!(!MemoryType::Device.is_host_accessible());
    }

    #[test]
    fn tags_report_their_runtime_type() {
        assert_eq!(Host::TYPE, MemoryType::Host);
        assert_eq!(Device::TYPE, MemoryType::Device);
        assert_eq!(Managed::TYPE, MemoryType::Managed);
        assert_eq!(Device::TYPE.to_string(), "device");
    }
}
