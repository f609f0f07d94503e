//! Concrete [`kiln_core::fs_driver::FileSystemDriver`] implementations.
//!
//! [`PlainDriver`] uses ordinary directory copies and is the default for
//! development and for filesystems without reflink support. [`BtrfsDriver`]
//! uses btrfs subvolumes so `Clone` is a cheap copy-on-write snapshot
//! instead of a full copy, matching spec.md §4's recommendation that the
//! staging step be "cheap enough to happen on every build".

pub mod btrfs;
pub mod plain;

pub use btrfs::BtrfsDriver;
pub use plain::PlainDriver;
