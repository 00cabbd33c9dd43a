//! ZIP on-disk format definitions.
//!
//! Signatures, fixed record lengths, flag bits, and the version and
//! sentinel constants shared by the reader and writer, together with the
//! [`EntryHeader`] data model and the record encode/decode routines.
//!
//! Field layouts follow the public ZIP application note: little-endian
//! fields, `PK`-prefixed record signatures, 32-bit size/offset fields
//! promoted to the zip64 layouts when a value reaches the sentinel range.

mod entry;
pub(crate) mod records;

pub use entry::EntryHeader;

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;

/// Central directory header signature (`PK\x01\x02`).
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;

/// End-of-central-directory record signature (`PK\x05\x06`).
pub const EOCD_SIGNATURE: u32 = 0x0605_4B50;

/// zip64 end-of-central-directory record signature (`PK\x06\x06`).
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4B50;

/// zip64 end-of-central-directory locator signature (`PK\x06\x07`).
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4B50;

/// Data descriptor signature (`PK\x07\x08`).
pub const DESCRIPTOR_SIGNATURE: u32 = 0x0807_4B50;

/// Fixed size of a local file header, before the name and extra fields.
pub const LOCAL_HEADER_LEN: u64 = 30;

/// Fixed size of a central directory header, before its variable fields.
pub const CENTRAL_HEADER_LEN: u64 = 46;

/// Fixed size of the end-of-central-directory record, before the comment.
pub const EOCD_LEN: u64 = 22;

/// Size of the zip64 end-of-central-directory record as this crate writes
/// it (no extensible data sector).
pub const ZIP64_EOCD_LEN: u64 = 56;

/// Size of the zip64 end-of-central-directory locator.
pub const ZIP64_LOCATOR_LEN: u64 = 20;

/// General purpose flag bit 3: sizes and CRC follow the body in a trailing
/// data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose flag bit 11: the name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Header id of the zip64 extended information extra field.
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;

/// "Version needed to extract" for ordinary entries (2.0).
pub const VERSION_DEFAULT: u16 = 20;

/// "Version needed to extract" for entries using zip64 layouts (4.5).
pub const VERSION_ZIP64: u16 = 45;

/// "Version made by" stamped on central directory headers.
pub const VERSION_MADE_BY: u16 = VERSION_DEFAULT;

/// Sentinel marking a 16-bit count field as promoted to zip64.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;

/// Sentinel marking a 32-bit size/offset field as promoted to zip64.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;

/// Maximum byte length of names and comments (their length fields are u16).
pub const MAX_VARIABLE_FIELD_LEN: usize = u16::MAX as usize;

/// Path separator that marks directory entries.
pub const PATH_SEPARATOR: char = '/';

/// MS-DOS directory attribute bit, set in external attributes for
/// directory entries.
pub(crate) const DOS_DIRECTORY_ATTR: u32 = 0x10;
