// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MCAP backend constants.
//!
//! Magic bytes as defined by the [MCAP specification](https://mcap.dev/spec),
//! plus the names this backend stores in schema and channel records.

/// MCAP file magic bytes (at start and end of file).
pub const MCAP_MAGIC: [u8; 8] = [0x89, 0x4D, 0x43, 0x41, 0x50, 0x30, 0x0D, 0x0A];

/// Storage identifier of the MCAP backend.
pub const STORAGE_ID: &str = "mcap";

/// Data file extension of the MCAP backend.
pub const FILE_EXTENSION: &str = "mcap";

/// Header profile written to every data file.
pub const PROFILE: &str = "ros2";

/// Library name written to every data file header.
pub const LIBRARY: &str = concat!("robobag ", env!("CARGO_PKG_VERSION"));

/// Schema encoding used for type-name-only schemas.
pub const SCHEMA_ENCODING: &str = "ros2msg";

/// Channel metadata key holding the offered QoS profile.
pub const QOS_METADATA_KEY: &str = "offered_qos_profiles";
