use byteorder::{ByteOrder, LittleEndian};

/// ZIP 2.0: no features beyond what stored entries need.
pub const VERSION_NEEDED: u16 = 20;
pub const VERSION_MADE_BY: u16 = 20;

/// ZIP compression methods
///
/// Only `Stored` is ever written: CBZ payloads are already-compressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
        }
    }
}

/// Local File Header (LFH) - 30 bytes, followed by the file name
#[derive(Debug, Clone, Copy)]
pub struct LocalFileHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: &'a [u8],
}

impl<'a> LocalFileHeader<'a> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    /// Header for a stored entry with a zeroed (MS-DOS epoch) timestamp.
    pub fn stored(file_name: &'a [u8], crc32: u32, size: u32) -> Self {
        Self {
            version_needed: VERSION_NEEDED,
            flags: 0,
            compression_method: CompressionMethod::Stored,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32,
            compressed_size: size,
            uncompressed_size: size,
            file_name,
        }
    }

    /// Bytes taken by the header and its name, excluding the entry data.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    /// Append the encoded header and name to `out`.
    ///
    /// The name length must already be known to fit in a `u16`.
    pub fn append_to(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.version_needed);
        LittleEndian::write_u16(&mut buf[6..8], self.flags);
        LittleEndian::write_u16(&mut buf[8..10], self.compression_method.as_u16());
        LittleEndian::write_u16(&mut buf[10..12], self.last_mod_time);
        LittleEndian::write_u16(&mut buf[12..14], self.last_mod_date);
        LittleEndian::write_u32(&mut buf[14..18], self.crc32);
        LittleEndian::write_u32(&mut buf[18..22], self.compressed_size);
        LittleEndian::write_u32(&mut buf[22..26], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[26..28], self.file_name.len() as u16);
        // extra field length stays 0

        out.extend_from_slice(&buf);
        out.extend_from_slice(self.file_name);
    }
}

/// Central Directory File Header (CDFH) - 46 bytes, followed by the file name
#[derive(Debug, Clone, Copy)]
pub struct CentralDirectoryEntry<'a> {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: &'a [u8],
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

impl<'a> CentralDirectoryEntry<'a> {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: usize = 46;

    /// Directory record mirroring `local`, whose header starts at `lfh_offset`.
    pub fn for_local(local: &LocalFileHeader<'a>, lfh_offset: u32) -> Self {
        Self {
            version_made_by: VERSION_MADE_BY,
            version_needed: local.version_needed,
            flags: local.flags,
            compression_method: local.compression_method,
            last_mod_time: local.last_mod_time,
            last_mod_date: local.last_mod_date,
            crc32: local.crc32,
            compressed_size: local.compressed_size,
            uncompressed_size: local.uncompressed_size,
            file_name: local.file_name,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            lfh_offset,
        }
    }

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len()
    }

    /// Append the encoded record and name to `out`.
    pub fn append_to(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.version_made_by);
        LittleEndian::write_u16(&mut buf[6..8], self.version_needed);
        LittleEndian::write_u16(&mut buf[8..10], self.flags);
        LittleEndian::write_u16(&mut buf[10..12], self.compression_method.as_u16());
        LittleEndian::write_u16(&mut buf[12..14], self.last_mod_time);
        LittleEndian::write_u16(&mut buf[14..16], self.last_mod_date);
        LittleEndian::write_u32(&mut buf[16..20], self.crc32);
        LittleEndian::write_u32(&mut buf[20..24], self.compressed_size);
        LittleEndian::write_u32(&mut buf[24..28], self.uncompressed_size);
        LittleEndian::write_u16(&mut buf[28..30], self.file_name.len() as u16);
        // extra field length (30..32) and file comment length (32..34) stay 0
        LittleEndian::write_u16(&mut buf[34..36], self.disk_number_start);
        LittleEndian::write_u16(&mut buf[36..38], self.internal_attrs);
        LittleEndian::write_u32(&mut buf[38..42], self.external_attrs);
        LittleEndian::write_u32(&mut buf[42..46], self.lfh_offset);

        out.extend_from_slice(&buf);
        out.extend_from_slice(self.file_name);
    }
}

/// End of Central Directory (EOCD) - 22 bytes, written without a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Trailer for a single-disk archive.
    pub fn single_disk(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(Self::SIGNATURE);
        LittleEndian::write_u16(&mut buf[4..6], self.disk_number);
        LittleEndian::write_u16(&mut buf[6..8], self.disk_with_cd);
        LittleEndian::write_u16(&mut buf[8..10], self.disk_entries);
        LittleEndian::write_u16(&mut buf[10..12], self.total_entries);
        LittleEndian::write_u32(&mut buf[12..16], self.cd_size);
        LittleEndian::write_u32(&mut buf[16..20], self.cd_offset);
        LittleEndian::write_u16(&mut buf[20..22], self.comment_len);
        buf
    }
}
