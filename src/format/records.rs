//! On-disk record encoding and decoding.
//!
//! Each routine here reads or writes exactly one record type. Offsets and
//! bounds policy live with the callers (`read`/`write`); this module only
//! knows field layouts.

use std::io::{Read, Write};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

use super::{
    CENTRAL_HEADER_SIGNATURE, DESCRIPTOR_SIGNATURE, DOS_DIRECTORY_ATTR, EOCD_SIGNATURE,
    EntryHeader, LOCAL_HEADER_SIGNATURE, MAX_VARIABLE_FIELD_LEN, VERSION_DEFAULT, VERSION_MADE_BY,
    VERSION_ZIP64, ZIP64_EOCD_SIGNATURE, ZIP64_EXTRA_TAG, ZIP64_LOCATOR_SIGNATURE,
    ZIP64_SENTINEL_U16, ZIP64_SENTINEL_U32,
};

/// Maps a short read inside a record to a format error.
fn truncated(what: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::MalformedArchive(format!("truncated {what}"))
        } else {
            Error::Io(e)
        }
    }
}

fn check_name_len(name: &str) -> Result<()> {
    if name.len() > MAX_VARIABLE_FIELD_LEN {
        return Err(Error::NameTooLong { len: name.len() });
    }
    Ok(())
}

fn check_comment_len(comment: &str) -> Result<()> {
    if comment.len() > MAX_VARIABLE_FIELD_LEN {
        return Err(Error::CommentTooLong {
            len: comment.len(),
        });
    }
    Ok(())
}

/// Caps a 64-bit value at the 32-bit zip64 sentinel.
fn cap_u32(value: u64) -> u32 {
    if value >= u64::from(ZIP64_SENTINEL_U32) {
        ZIP64_SENTINEL_U32
    } else {
        value as u32
    }
}

/// Caps a 64-bit count at the 16-bit zip64 sentinel.
fn cap_u16(value: u64) -> u16 {
    if value >= u64::from(ZIP64_SENTINEL_U16) {
        ZIP64_SENTINEL_U16
    } else {
        value as u16
    }
}

/// Writes a local file header.
///
/// With `streaming` set, the size and CRC fields are zeroed because the
/// true values follow the body in a data descriptor; otherwise the
/// header's declared values are written, with zip64 promotion of the size
/// fields when either exceeds the 32-bit-safe range.
pub(crate) fn write_local_header<W: Write>(
    w: &mut W,
    header: &EntryHeader,
    streaming: bool,
) -> Result<()> {
    check_name_len(&header.name)?;

    let zip64 = !streaming && header.requires_zip64();
    let version = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };
    let (crc, compressed, uncompressed) = if streaming {
        (0, 0, 0)
    } else if zip64 {
        (header.crc32, ZIP64_SENTINEL_U32, ZIP64_SENTINEL_U32)
    } else {
        (
            header.crc32,
            header.compressed_size as u32,
            header.uncompressed_size as u32,
        )
    };
    let extra_len: u16 = if zip64 { 20 } else { 0 };

    w.write_u32::<LE>(LOCAL_HEADER_SIGNATURE)?;
    w.write_u16::<LE>(version)?;
    w.write_u16::<LE>(header.flags)?;
    w.write_u16::<LE>(header.method)?;
    w.write_u16::<LE>(header.modified.dos_time())?;
    w.write_u16::<LE>(header.modified.dos_date())?;
    w.write_u32::<LE>(crc)?;
    w.write_u32::<LE>(compressed)?;
    w.write_u32::<LE>(uncompressed)?;
    w.write_u16::<LE>(header.name.len() as u16)?;
    w.write_u16::<LE>(extra_len)?;
    w.write_all(header.name.as_bytes())?;
    if zip64 {
        w.write_u16::<LE>(ZIP64_EXTRA_TAG)?;
        w.write_u16::<LE>(16)?;
        w.write_u64::<LE>(header.uncompressed_size)?;
        w.write_u64::<LE>(header.compressed_size)?;
    }
    Ok(())
}

/// Extracts the name and extra-field lengths from a raw local header.
///
/// `buf` must hold the fixed 30-byte prefix.
pub(crate) fn parse_local_header_lengths(buf: &[u8]) -> Result<(u16, u16)> {
    if (buf.len() as u64) < super::LOCAL_HEADER_LEN {
        return Err(Error::MalformedArchive("truncated local header".into()));
    }
    let mut r = buf;
    let sig = r.read_u32::<LE>().map_err(truncated("local header"))?;
    if sig != LOCAL_HEADER_SIGNATURE {
        return Err(Error::MalformedArchive(format!(
            "bad local header signature {sig:#010x}"
        )));
    }
    // Skip to the length fields at offsets 26 and 28.
    let mut r = &buf[26..];
    let name_len = r.read_u16::<LE>().map_err(truncated("local header"))?;
    let extra_len = r.read_u16::<LE>().map_err(truncated("local header"))?;
    Ok((name_len, extra_len))
}

/// Writes a trailing data descriptor, in the 64-bit layout when `zip64`.
pub(crate) fn write_data_descriptor<W: Write>(
    w: &mut W,
    crc32: u32,
    compressed: u64,
    uncompressed: u64,
    zip64: bool,
) -> Result<()> {
    w.write_u32::<LE>(DESCRIPTOR_SIGNATURE)?;
    w.write_u32::<LE>(crc32)?;
    if zip64 {
        w.write_u64::<LE>(compressed)?;
        w.write_u64::<LE>(uncompressed)?;
    } else {
        w.write_u32::<LE>(compressed as u32)?;
        w.write_u32::<LE>(uncompressed as u32)?;
    }
    Ok(())
}

/// Writes one central directory header for an entry recorded at
/// `local_offset`.
pub(crate) fn write_central_header<W: Write>(
    w: &mut W,
    header: &EntryHeader,
    local_offset: u64,
) -> Result<()> {
    check_name_len(&header.name)?;
    check_comment_len(&header.comment)?;

    // zip64 extra field: one u64 per promoted field, in this fixed order.
    let mut extra = Vec::new();
    for value in [header.uncompressed_size, header.compressed_size, local_offset] {
        if value >= u64::from(ZIP64_SENTINEL_U32) {
            extra.extend_from_slice(&value.to_le_bytes());
        }
    }
    let zip64 = !extra.is_empty();
    let version = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };
    let external_attrs = if header.is_directory() {
        DOS_DIRECTORY_ATTR
    } else {
        0
    };

    w.write_u32::<LE>(CENTRAL_HEADER_SIGNATURE)?;
    w.write_u16::<LE>(VERSION_MADE_BY)?;
    w.write_u16::<LE>(version)?;
    w.write_u16::<LE>(header.flags)?;
    w.write_u16::<LE>(header.method)?;
    w.write_u16::<LE>(header.modified.dos_time())?;
    w.write_u16::<LE>(header.modified.dos_date())?;
    w.write_u32::<LE>(header.crc32)?;
    w.write_u32::<LE>(cap_u32(header.compressed_size))?;
    w.write_u32::<LE>(cap_u32(header.uncompressed_size))?;
    w.write_u16::<LE>(header.name.len() as u16)?;
    let extra_len = if zip64 { 4 + extra.len() } else { 0 };
    w.write_u16::<LE>(extra_len as u16)?;
    w.write_u16::<LE>(header.comment.len() as u16)?;
    w.write_u16::<LE>(0)?; // disk number start
    w.write_u16::<LE>(0)?; // internal attributes
    w.write_u32::<LE>(external_attrs)?;
    w.write_u32::<LE>(cap_u32(local_offset))?;
    w.write_all(header.name.as_bytes())?;
    if zip64 {
        w.write_u16::<LE>(ZIP64_EXTRA_TAG)?;
        w.write_u16::<LE>(extra.len() as u16)?;
        w.write_all(&extra)?;
    }
    w.write_all(header.comment.as_bytes())?;
    Ok(())
}

/// Reads one central directory header, returning the entry metadata and
/// the recorded local header offset.
pub(crate) fn read_central_header<R: Read>(r: &mut R) -> Result<(EntryHeader, u64)> {
    let e = || truncated("central directory header");
    let sig = r.read_u32::<LE>().map_err(e())?;
    if sig != CENTRAL_HEADER_SIGNATURE {
        return Err(Error::MalformedArchive(format!(
            "bad central directory signature {sig:#010x}"
        )));
    }
    let _version_made_by = r.read_u16::<LE>().map_err(e())?;
    let _version_needed = r.read_u16::<LE>().map_err(e())?;
    let flags = r.read_u16::<LE>().map_err(e())?;
    let method = r.read_u16::<LE>().map_err(e())?;
    let dos_time = r.read_u16::<LE>().map_err(e())?;
    let dos_date = r.read_u16::<LE>().map_err(e())?;
    let crc32 = r.read_u32::<LE>().map_err(e())?;
    let compressed32 = r.read_u32::<LE>().map_err(e())?;
    let uncompressed32 = r.read_u32::<LE>().map_err(e())?;
    let name_len = r.read_u16::<LE>().map_err(e())? as usize;
    let extra_len = r.read_u16::<LE>().map_err(e())? as usize;
    let comment_len = r.read_u16::<LE>().map_err(e())? as usize;
    let _disk_start = r.read_u16::<LE>().map_err(e())?;
    let _internal_attrs = r.read_u16::<LE>().map_err(e())?;
    let _external_attrs = r.read_u32::<LE>().map_err(e())?;
    let offset32 = r.read_u32::<LE>().map_err(e())?;

    let mut name = vec![0u8; name_len];
    r.read_exact(&mut name).map_err(e())?;
    let mut extra = vec![0u8; extra_len];
    r.read_exact(&mut extra).map_err(e())?;
    let mut comment = vec![0u8; comment_len];
    r.read_exact(&mut comment).map_err(e())?;

    let mut uncompressed_size = u64::from(uncompressed32);
    let mut compressed_size = u64::from(compressed32);
    let mut local_offset = u64::from(offset32);
    parse_zip64_extra(
        &extra,
        uncompressed32 == ZIP64_SENTINEL_U32,
        compressed32 == ZIP64_SENTINEL_U32,
        offset32 == ZIP64_SENTINEL_U32,
        &mut uncompressed_size,
        &mut compressed_size,
        &mut local_offset,
    )?;

    let header = EntryHeader {
        name: String::from_utf8_lossy(&name).into_owned(),
        comment: String::from_utf8_lossy(&comment).into_owned(),
        method,
        flags,
        modified: crate::Timestamp::from_dos(dos_date, dos_time),
        crc32,
        compressed_size,
        uncompressed_size,
    };
    Ok((header, local_offset))
}

/// Applies the zip64 extended information extra field, if present.
///
/// The field carries one u64 per promoted value, in the fixed order
/// uncompressed size, compressed size, local offset — each present only
/// when the corresponding 32-bit field holds the sentinel. Unknown extra
/// blocks are skipped; a malformed block terminates the walk the way
/// tolerant readers do.
fn parse_zip64_extra(
    extra: &[u8],
    want_uncompressed: bool,
    want_compressed: bool,
    want_offset: bool,
    uncompressed_size: &mut u64,
    compressed_size: &mut u64,
    local_offset: &mut u64,
) -> Result<()> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let tag = u16::from_le_bytes([rest[0], rest[1]]);
        let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if size > rest.len() {
            break;
        }
        let body = &rest[..size];
        rest = &rest[size..];
        if tag != ZIP64_EXTRA_TAG {
            continue;
        }

        let mut r = body;
        let e = || truncated("zip64 extra field");
        if want_uncompressed {
            *uncompressed_size = r.read_u64::<LE>().map_err(e())?;
        }
        if want_compressed {
            *compressed_size = r.read_u64::<LE>().map_err(e())?;
        }
        if want_offset {
            *local_offset = r.read_u64::<LE>().map_err(e())?;
        }
        return Ok(());
    }
    if want_uncompressed || want_compressed || want_offset {
        return Err(Error::MalformedArchive(
            "zip64 sentinel present but no zip64 extra field".into(),
        ));
    }
    Ok(())
}

/// Parsed end-of-central-directory values, already widened past any zip64
/// indirection the caller resolves afterwards.
#[derive(Debug)]
pub(crate) struct EndRecord {
    /// Total number of central directory entries.
    pub entry_count: u64,
    /// Size of the central directory in bytes.
    pub cd_size: u64,
    /// Offset of the start of the central directory.
    pub cd_offset: u64,
    /// Archive comment bytes.
    pub comment: Vec<u8>,
}

impl EndRecord {
    /// Returns whether any field holds a zip64 sentinel value.
    pub fn has_zip64_sentinels(&self) -> bool {
        self.entry_count == u64::from(ZIP64_SENTINEL_U16)
            || self.cd_size == u64::from(ZIP64_SENTINEL_U32)
            || self.cd_offset == u64::from(ZIP64_SENTINEL_U32)
    }
}

/// Parses an end-of-central-directory record starting at `buf[0]`.
///
/// `buf` must begin at the signature and extend to the end of the scanned
/// tail, so the comment can be captured.
pub(crate) fn parse_end_record(buf: &[u8]) -> Result<EndRecord> {
    let e = || truncated("end of central directory record");
    let mut r = buf;
    let sig = r.read_u32::<LE>().map_err(e())?;
    if sig != EOCD_SIGNATURE {
        return Err(Error::MalformedArchive(format!(
            "bad end record signature {sig:#010x}"
        )));
    }
    let _disk = r.read_u16::<LE>().map_err(e())?;
    let _cd_disk = r.read_u16::<LE>().map_err(e())?;
    let _count_this_disk = r.read_u16::<LE>().map_err(e())?;
    let entry_count = r.read_u16::<LE>().map_err(e())?;
    let cd_size = r.read_u32::<LE>().map_err(e())?;
    let cd_offset = r.read_u32::<LE>().map_err(e())?;
    let comment_len = r.read_u16::<LE>().map_err(e())? as usize;
    let comment = r.get(..comment_len).ok_or_else(|| {
        Error::MalformedArchive("end record comment extends past end of archive".into())
    })?;
    Ok(EndRecord {
        entry_count: u64::from(entry_count),
        cd_size: u64::from(cd_size),
        cd_offset: u64::from(cd_offset),
        comment: comment.to_vec(),
    })
}

/// Parses a zip64 end-of-central-directory locator, returning the offset
/// of the zip64 end record, or `None` if the signature does not match.
pub(crate) fn parse_zip64_locator(buf: &[u8]) -> Result<Option<u64>> {
    let e = || truncated("zip64 end record locator");
    let mut r = buf;
    let sig = r.read_u32::<LE>().map_err(e())?;
    if sig != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    let _disk = r.read_u32::<LE>().map_err(e())?;
    let offset = r.read_u64::<LE>().map_err(e())?;
    let _total_disks = r.read_u32::<LE>().map_err(e())?;
    Ok(Some(offset))
}

/// Parses a zip64 end-of-central-directory record.
pub(crate) fn parse_zip64_end_record(buf: &[u8]) -> Result<(u64, u64, u64)> {
    let e = || truncated("zip64 end of central directory record");
    let mut r = buf;
    let sig = r.read_u32::<LE>().map_err(e())?;
    if sig != ZIP64_EOCD_SIGNATURE {
        return Err(Error::MalformedArchive(format!(
            "bad zip64 end record signature {sig:#010x}"
        )));
    }
    let _record_size = r.read_u64::<LE>().map_err(e())?;
    let _version_made_by = r.read_u16::<LE>().map_err(e())?;
    let _version_needed = r.read_u16::<LE>().map_err(e())?;
    let _disk = r.read_u32::<LE>().map_err(e())?;
    let _cd_disk = r.read_u32::<LE>().map_err(e())?;
    let _count_this_disk = r.read_u64::<LE>().map_err(e())?;
    let entry_count = r.read_u64::<LE>().map_err(e())?;
    let cd_size = r.read_u64::<LE>().map_err(e())?;
    let cd_offset = r.read_u64::<LE>().map_err(e())?;
    Ok((entry_count, cd_size, cd_offset))
}

/// Writes the end-of-central-directory record, preceded by the zip64 end
/// record and locator when any value exceeds its 32-bit-safe range.
pub(crate) fn write_end_records<W: Write>(
    w: &mut W,
    entry_count: u64,
    cd_size: u64,
    cd_offset: u64,
    zip64_eocd_offset: u64,
    comment: &str,
) -> Result<()> {
    check_comment_len(comment)?;

    let needs_zip64 = entry_count >= u64::from(ZIP64_SENTINEL_U16)
        || cd_size >= u64::from(ZIP64_SENTINEL_U32)
        || cd_offset >= u64::from(ZIP64_SENTINEL_U32);
    if needs_zip64 {
        // zip64 end of central directory record.
        w.write_u32::<LE>(ZIP64_EOCD_SIGNATURE)?;
        w.write_u64::<LE>(44)?; // record size, excluding signature and itself
        w.write_u16::<LE>(VERSION_MADE_BY)?;
        w.write_u16::<LE>(VERSION_ZIP64)?;
        w.write_u32::<LE>(0)?; // this disk
        w.write_u32::<LE>(0)?; // central directory disk
        w.write_u64::<LE>(entry_count)?;
        w.write_u64::<LE>(entry_count)?;
        w.write_u64::<LE>(cd_size)?;
        w.write_u64::<LE>(cd_offset)?;

        // zip64 end of central directory locator.
        w.write_u32::<LE>(ZIP64_LOCATOR_SIGNATURE)?;
        w.write_u32::<LE>(0)?; // disk holding the zip64 end record
        w.write_u64::<LE>(zip64_eocd_offset)?;
        w.write_u32::<LE>(1)?; // total disks
    }

    w.write_u32::<LE>(EOCD_SIGNATURE)?;
    w.write_u16::<LE>(0)?; // this disk
    w.write_u16::<LE>(0)?; // central directory disk
    w.write_u16::<LE>(cap_u16(entry_count))?;
    w.write_u16::<LE>(cap_u16(entry_count))?;
    w.write_u32::<LE>(cap_u32(cd_size))?;
    w.write_u32::<LE>(cap_u32(cd_offset))?;
    w.write_u16::<LE>(comment.len() as u16)?;
    w.write_all(comment.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn sample_header() -> EntryHeader {
        EntryHeader {
            name: "dir/file.txt".into(),
            comment: "entry comment".into(),
            method: 8,
            flags: 0,
            modified: Timestamp::from_parts(2021, 3, 14, 15, 9, 26).unwrap(),
            crc32: 0xCAFEBABE,
            compressed_size: 1234,
            uncompressed_size: 5678,
        }
    }

    #[test]
    fn test_central_header_round_trip() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_central_header(&mut buf, &header, 42).unwrap();
        assert_eq!(buf.len() as u64, super::super::CENTRAL_HEADER_LEN + 12 + 13);

        let (decoded, offset) = read_central_header(&mut buf.as_slice()).unwrap();
        assert_eq!(offset, 42);
        assert_eq!(decoded.name, header.name);
        assert_eq!(decoded.comment, header.comment);
        assert_eq!(decoded.method, header.method);
        assert_eq!(decoded.crc32, header.crc32);
        assert_eq!(decoded.compressed_size, header.compressed_size);
        assert_eq!(decoded.uncompressed_size, header.uncompressed_size);
        assert_eq!(decoded.modified, header.modified);
    }

    #[test]
    fn test_central_header_zip64_sizes() {
        let mut header = sample_header();
        header.uncompressed_size = 5 * 1024 * 1024 * 1024; // 5 GiB
        header.compressed_size = u64::from(u32::MAX) + 7;

        let mut buf = Vec::new();
        write_central_header(&mut buf, &header, 9).unwrap();
        let (decoded, offset) = read_central_header(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded.uncompressed_size, header.uncompressed_size);
        assert_eq!(decoded.compressed_size, header.compressed_size);
        assert_eq!(offset, 9);
    }

    #[test]
    fn test_central_header_zip64_offset() {
        let header = sample_header();
        let big_offset = u64::from(u32::MAX) + 100;
        let mut buf = Vec::new();
        write_central_header(&mut buf, &header, big_offset).unwrap();
        let (_, offset) = read_central_header(&mut buf.as_slice()).unwrap();
        assert_eq!(offset, big_offset);
    }

    #[test]
    fn test_central_header_bad_signature() {
        let mut buf = Vec::new();
        write_central_header(&mut buf, &sample_header(), 0).unwrap();
        buf[0] ^= 0xFF;
        let err = read_central_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::MalformedArchive(_)));
    }

    #[test]
    fn test_zip64_sentinel_without_extra_is_malformed() {
        let mut buf = Vec::new();
        write_central_header(&mut buf, &sample_header(), 0).unwrap();
        // Corrupt the compressed size field (offset 20) to the sentinel.
        buf[20..24].copy_from_slice(&ZIP64_SENTINEL_U32.to_le_bytes());
        let err = read_central_header(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::MalformedArchive(_)));
    }

    #[test]
    fn test_local_header_lengths() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_local_header(&mut buf, &header, false).unwrap();
        let (name_len, extra_len) = parse_local_header_lengths(&buf).unwrap();
        assert_eq!(name_len as usize, header.name.len());
        assert_eq!(extra_len, 0);
    }

    #[test]
    fn test_local_header_zip64_extra() {
        let mut header = sample_header();
        header.compressed_size = u64::from(u32::MAX) + 1;
        let mut buf = Vec::new();
        write_local_header(&mut buf, &header, false).unwrap();
        let (_, extra_len) = parse_local_header_lengths(&buf).unwrap();
        assert_eq!(extra_len, 20);
    }

    #[test]
    fn test_streaming_local_header_zeroes_sizes() {
        let header = sample_header();
        let mut buf = Vec::new();
        write_local_header(&mut buf, &header, true).unwrap();
        // CRC and both size fields (offsets 14..26) must be zero.
        assert!(buf[14..26].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_end_record_round_trip() {
        let mut buf = Vec::new();
        write_end_records(&mut buf, 3, 200, 1000, 0, "archive comment").unwrap();
        let record = parse_end_record(&buf).unwrap();
        assert_eq!(record.entry_count, 3);
        assert_eq!(record.cd_size, 200);
        assert_eq!(record.cd_offset, 1000);
        assert_eq!(record.comment, b"archive comment");
        assert!(!record.has_zip64_sentinels());
    }

    #[test]
    fn test_end_record_zip64_promotion() {
        let mut buf = Vec::new();
        let big = u64::from(u32::MAX) + 10;
        write_end_records(&mut buf, 70_000, 5_000_000, big, big - 100, "").unwrap();

        // The plain end record sits after the zip64 record and locator.
        let eocd_start = buf.len() - 22;
        let record = parse_end_record(&buf[eocd_start..]).unwrap();
        assert!(record.has_zip64_sentinels());

        let locator_start = eocd_start - 20;
        let zip64_offset = parse_zip64_locator(&buf[locator_start..]).unwrap().unwrap();
        assert_eq!(zip64_offset, big - 100);

        let (count, size, offset) = parse_zip64_end_record(&buf).unwrap();
        assert_eq!(count, 70_000);
        assert_eq!(size, 5_000_000);
        assert_eq!(offset, big);
    }

    #[test]
    fn test_data_descriptor_layouts() {
        let mut small = Vec::new();
        write_data_descriptor(&mut small, 1, 2, 3, false).unwrap();
        assert_eq!(small.len(), 16);

        let mut large = Vec::new();
        write_data_descriptor(&mut large, 1, 2, 3, true).unwrap();
        assert_eq!(large.len(), 24);
    }

    #[test]
    fn test_comment_too_long_rejected() {
        let mut buf = Vec::new();
        let long = "x".repeat(MAX_VARIABLE_FIELD_LEN + 1);
        let err = write_end_records(&mut buf, 0, 0, 0, 0, &long).unwrap_err();
        assert!(matches!(err, Error::CommentTooLong { .. }));
    }
}
