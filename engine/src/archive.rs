// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bare bones file packages for distributing game assets as a single file.
//!
//! The format is little-endian with a trailer-first layout, so a package can
//! be appended to another file (like the game executable itself):
//!
//! ```text
//! struct {
//!     // Path string and data of all files in this archive
//!     struct {
//!         u8 path[path_len]; // NUL terminated
//!         u8 bytes[size];
//!     } file_data[];
//!
//!     // The index, one entry per file
//!     struct {
//!         u64 path_hash;
//!         u32 offset;
//!         u32 size;
//!         u16 path_len;
//!         u16 flags;
//!     } index[];
//!
//!     u32 index_len;    // number of files
//!     u32 archive_size; // size of the whole archive
//!     u32 magic;        // "qopf"
//! }
//! ```

const MAGIC: u32 =
    (b'q' as u32) | (b'o' as u32) << 8 | (b'p' as u32) << 16 | (b'f' as u32) << 24;
const TRAILER_SIZE: usize = 12;
const INDEX_ENTRY_SIZE: usize = 20;

/// The file's bytes are zstd compressed.
pub const ARCHIVE_FLAG_COMPRESSED_ZSTD: u16 = 1 << 0;
/// The file's bytes are deflate compressed.
pub const ARCHIVE_FLAG_COMPRESSED_DEFLATE: u16 = 1 << 1;
/// The file's bytes are encrypted.
pub const ARCHIVE_FLAG_ENCRYPTED: u16 = 1 << 8;

/// One file in an [`Archive`]'s index.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveFile {
    pub hash: u64,
    /// Offset of the file's path (the data follows it) from the start of the
    /// archive's data section.
    pub offset: u32,
    /// Size of the file's data in bytes.
    pub size: u32,
    /// Length of the path, including its NUL terminator.
    pub path_len: u16,
    pub flags: u16,
}

/// An opened archive over a borrowed byte buffer, with a hashmap index for
/// path lookups.
pub struct Archive<'a> {
    data: &'a [u8],
    files_offset: usize,
    index_len: u32,
    hashmap: Vec<ArchiveFile>,
}

/// MurmurOAAT64, the path hash used by the archive index.
pub fn archive_hash(path: &str) -> u64 {
    let mut h: u64 = 0x0747_f2e5_c8ea_3f57;
    for b in path.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x5bd1_e995_5bd1_e995);
        h ^= h >> 47;
    }
    h
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}

impl<'a> Archive<'a> {
    /// Opens the archive at the end of `data` and reads its index. Returns
    /// None if the trailer or index is invalid.
    pub fn open(data: &'a [u8]) -> Option<Archive<'a>> {
        if data.len() <= TRAILER_SIZE {
            return None;
        }
        let trailer = data.len() - TRAILER_SIZE;
        let index_len = read_u32(data, trailer);
        let archive_size = read_u32(data, trailer + 4);
        let magic = read_u32(data, trailer + 8);

        // Check the magic, make sure index_len is possible with the size.
        if magic != MAGIC
            || index_len as usize * INDEX_ENTRY_SIZE > data.len() - TRAILER_SIZE
            || archive_size as usize > data.len()
        {
            return None;
        }

        // Find a good size for the hashmap: a power of two, at least 1.5x
        // the number of entries.
        let mut hashmap_len: usize = 1;
        let min_hashmap_len = (index_len as usize * 3).div_ceil(2);
        while hashmap_len < min_hashmap_len {
            hashmap_len <<= 1;
        }
        assert!(hashmap_len.is_power_of_two(), "archive hashmap misaligned");
        let mask = hashmap_len - 1;

        let files_offset = data.len() - archive_size as usize;
        let index_offset = data.len() - index_len as usize * INDEX_ENTRY_SIZE - TRAILER_SIZE;

        let mut hashmap = vec![ArchiveFile::default(); hashmap_len];
        for i in 0..index_len as usize {
            let entry = index_offset + i * INDEX_ENTRY_SIZE;
            let hash = read_u64(data, entry);

            let mut idx = hash as usize & mask;
            while hashmap[idx].size > 0 {
                idx = (idx + 1) & mask;
            }
            hashmap[idx] = ArchiveFile {
                hash,
                offset: read_u32(data, entry + 8),
                size: read_u32(data, entry + 12),
                path_len: read_u16(data, entry + 16),
                flags: read_u16(data, entry + 18),
            };
        }

        Some(Archive {
            data,
            files_offset,
            index_len,
            hashmap,
        })
    }

    /// The number of files in the archive.
    pub fn len(&self) -> u32 {
        self.index_len
    }

    pub fn is_empty(&self) -> bool {
        self.index_len == 0
    }

    /// The capacity of the lookup hashmap.
    pub fn hashmap_len(&self) -> usize {
        self.hashmap.len()
    }

    /// Find a file by its path. Returns None if the archive has no such
    /// file.
    pub fn find(&self, path: &str) -> Option<&ArchiveFile> {
        let mask = self.hashmap.len() - 1;
        let hash = archive_hash(path);
        let mut idx = hash as usize & mask;
        while self.hashmap[idx].size > 0 {
            if self.hashmap[idx].hash == hash {
                return Some(&self.hashmap[idx]);
            }
            idx = (idx + 1) & mask;
        }
        None
    }

    /// The file's path, as stored in the data section.
    pub fn path(&self, file: &ArchiveFile) -> &'a str {
        let start = self.files_offset + file.offset as usize;
        // Don't include the NUL terminator.
        let bytes = &self.data[start..start + file.path_len as usize - 1];
        core::str::from_utf8(bytes).unwrap_or("")
    }

    /// The file's bytes.
    pub fn read(&self, file: &ArchiveFile) -> &'a [u8] {
        let start = self.files_offset + file.offset as usize + file.path_len as usize;
        &self.data[start..start + file.size as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::{archive_hash, Archive, INDEX_ENTRY_SIZE};

    /// Builds an archive the same way the asset packer does: blobs first,
    /// then the index, then the trailer.
    fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut index = Vec::new();

        for (path, bytes) in files {
            let offset = data.len() as u32;
            let path_len = (path.len() + 1) as u16;
            data.extend_from_slice(path.as_bytes());
            data.push(0);
            data.extend_from_slice(bytes);

            index.extend_from_slice(&archive_hash(path).to_le_bytes());
            index.extend_from_slice(&offset.to_le_bytes());
            index.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            index.extend_from_slice(&path_len.to_le_bytes());
            index.extend_from_slice(&0u16.to_le_bytes());
        }

        data.extend_from_slice(&index);
        let archive_size = (data.len() + 12) as u32;
        data.extend_from_slice(&(files.len() as u32).to_le_bytes());
        data.extend_from_slice(&archive_size.to_le_bytes());
        data.extend_from_slice(b"qopf");
        data
    }

    #[test]
    fn open_find_read() {
        let data = build_archive(&[("a", b"X"), ("bb", b"YY"), ("ccc", b"ZZZ")]);
        let archive = Archive::open(&data).unwrap();

        assert_eq!(3, archive.len());
        assert!(archive.hashmap_len() >= 4);

        let file = archive.find("bb").unwrap();
        assert_eq!(2, file.size);
        assert_eq!(b"YY", archive.read(file));
        assert_eq!("bb", archive.path(file));

        assert_eq!(b"X", archive.read(archive.find("a").unwrap()));
        assert_eq!(b"ZZZ", archive.read(archive.find("ccc").unwrap()));
    }

    #[test]
    fn missing_files_are_not_found() {
        let data = build_archive(&[("a", b"X")]);
        let archive = Archive::open(&data).unwrap();
        assert!(archive.find("b").is_none());
        assert!(archive.find("").is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = build_archive(&[("a", b"X")]);
        let len = data.len();
        data[len - 1] = b'x';
        assert!(Archive::open(&data).is_none());
    }

    #[test]
    fn truncated_trailer_is_rejected() {
        assert!(Archive::open(b"qopf").is_none());
    }

    #[test]
    fn index_len_must_fit_the_file() {
        let mut data = build_archive(&[("a", b"X")]);
        let trailer = data.len() - 12;
        // Claim an absurd file count.
        data[trailer..trailer + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(Archive::open(&data).is_none());
    }

    #[test]
    fn probing_resolves_bucket_collisions() {
        // Plenty of files so some of them land in the same bucket.
        let names: Vec<String> = (0..64).map(|i| format!("file-{i}")).collect();
        let contents: Vec<Vec<u8>> = (0..64).map(|i| vec![i as u8; i + 1]).collect();
        let files: Vec<(&str, &[u8])> = names
            .iter()
            .map(|n| n.as_str())
            .zip(contents.iter().map(|c| c.as_slice()))
            .collect();

        let data = build_archive(&files);
        let archive = Archive::open(&data).unwrap();
        assert_eq!(64, archive.len());
        for (name, content) in &files {
            let file = archive.find(name).unwrap();
            assert_eq!(*content, archive.read(file));
        }
    }

    #[test]
    fn entry_size_matches_the_format() {
        // The on-disk index entry is u64 + u32 + u32 + u16 + u16.
        assert_eq!(20, INDEX_ENTRY_SIZE);
    }
}
