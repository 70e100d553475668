//! The backup log: append-only pre-images of dirty tiles (spec.md §3
//! "Backup horizon `H`", §4.1 "Backup log and checkpoint").
//!
//! Format (little-endian, following the teacher's MANIFEST convention —
//! spec.md does not mandate a byte-exact layout for this file, only the
//! logical record it carries: `(file_id, byte_offset, original_bytes)`):
//!
//! ```text
//! Header: magic "GBKL" (4) | format version u32 | horizon_epoch u64
//! Record: horizon_epoch u64 | file_id u32 | byte_offset u64
//!       | data_len u32 | data[data_len] | crc32 u32 (over everything above)
//! ```

use crate::error::{DurabilityError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"GBKL";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: u64 = 16;

/// One pre-image: the bytes a tile held at `byte_offset` in partition
/// `file_id` before being overwritten, tagged with the horizon epoch that
/// was live when it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// The horizon active when this pre-image was captured. Records are
    /// discarded once the horizon advances past their epoch (spec.md
    /// §4.1 `backup_truncate`).
    pub horizon_epoch: u64,
    /// Identifies the partition file the tile belongs to.
    pub file_id: u32,
    /// Byte offset within that file.
    pub byte_offset: u64,
    /// The bytes as they were before the write that triggered this
    /// record.
    pub original_bytes: Vec<u8>,
}

/// An append-only, crash-safe log of [`BackupRecord`]s.
///
/// Every writable tile acquisition that touches a tile for the first time
/// since the current horizon records its pre-image here before the
/// caller is allowed to mutate the tile (spec.md §4.1). Rollback replays
/// the log in reverse.
pub struct BackupLog {
    path: PathBuf,
    file: File,
    records: Vec<BackupRecord>,
}

impl BackupLog {
    /// Create a fresh backup log at `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>, horizon_epoch: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&path)?;
        write_header(&mut file, horizon_epoch)?;
        file.sync_all()?;
        Ok(BackupLog {
            path,
            file,
            records: Vec::new(),
        })
    }

    /// Open and replay an existing backup log (e.g. after a restart that
    /// interrupted a checkpoint between `horizon_write_start` and
    /// `horizon_write_finish`).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let records = read_records(&mut file)?;
        Ok(BackupLog {
            path,
            file,
            records,
        })
    }

    /// Path of the backup log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if there are no live records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a pre-image, fsyncing before returning so a crash
    /// immediately after cannot lose it without also losing the write it
    /// guards.
    pub fn record(
        &mut self,
        horizon_epoch: u64,
        file_id: u32,
        byte_offset: u64,
        original_bytes: &[u8],
    ) -> Result<()> {
        self.file.seek(SeekFrom::End(0))?;
        write_record(
            &mut self.file,
            horizon_epoch,
            file_id,
            byte_offset,
            original_bytes,
        )?;
        self.file.sync_data()?;
        self.records.push(BackupRecord {
            horizon_epoch,
            file_id,
            byte_offset,
            original_bytes: original_bytes.to_vec(),
        });
        Ok(())
    }

    /// Drop every record captured at or before `horizon` — once the
    /// checkpoint at `horizon` is durable, those pre-images can never be
    /// needed again (spec.md §4.1 `backup_truncate`). Rewrites the file
    /// from scratch with only the surviving records.
    pub fn truncate_older_than(&mut self, horizon: u64) -> Result<()> {
        self.records.retain(|r| r.horizon_epoch >= horizon);
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        write_header(&mut self.file, horizon)?;
        for r in &self.records {
            write_record(
                &mut self.file,
                r.horizon_epoch,
                r.file_id,
                r.byte_offset,
                &r.original_bytes,
            )?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Restore every live record in reverse order (last written first),
    /// invoking `apply` for each, then clear the log. Used by
    /// `rollback_to(H)` (spec.md §3 "Rollback correctness").
    pub fn rollback<F>(&mut self, mut apply: F) -> Result<()>
    where
        F: FnMut(u32, u64, &[u8]) -> Result<()>,
    {
        for r in self.records.iter().rev() {
            apply(r.file_id, r.byte_offset, &r.original_bytes)?;
        }
        let epoch = self.records.first().map(|r| r.horizon_epoch).unwrap_or(0);
        self.records.clear();
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        write_header(&mut self.file, epoch)?;
        self.file.sync_all()?;
        Ok(())
    }
}

fn write_header(file: &mut File, horizon_epoch: u64) -> Result<()> {
    file.write_all(MAGIC)?;
    file.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    file.write_u64::<LittleEndian>(horizon_epoch)?;
    Ok(())
}

fn write_record(
    file: &mut File,
    horizon_epoch: u64,
    file_id: u32,
    byte_offset: u64,
    data: &[u8],
) -> Result<()> {
    let mut buf = Vec::with_capacity(24 + data.len());
    buf.write_u64::<LittleEndian>(horizon_epoch)?;
    buf.write_u32::<LittleEndian>(file_id)?;
    buf.write_u64::<LittleEndian>(byte_offset)?;
    buf.write_u32::<LittleEndian>(data.len() as u32)?;
    buf.extend_from_slice(data);
    let crc = crc32fast::hash(&buf);
    buf.write_u32::<LittleEndian>(crc)?;
    file.write_all(&buf)?;
    Ok(())
}

fn read_records(file: &mut File) -> Result<Vec<BackupRecord>> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&mut *file);

    let mut magic = [0u8; 4];
    if reader.read_exact(&mut magic).is_err() {
        return Err(DurabilityError::Corrupt("truncated header".into()));
    }
    if &magic != MAGIC {
        return Err(DurabilityError::Corrupt("bad magic".into()));
    }
    let _version = reader.read_u32::<LittleEndian>()?;
    let _epoch = reader.read_u64::<LittleEndian>()?;

    let mut records = Vec::new();
    loop {
        let horizon_epoch = match reader.read_u64::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let file_id = reader.read_u32::<LittleEndian>()?;
        let byte_offset = reader.read_u64::<LittleEndian>()?;
        let data_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data)?;
        let stored_crc = reader.read_u32::<LittleEndian>()?;

        let mut check = Vec::with_capacity(24 + data_len);
        check.write_u64::<LittleEndian>(horizon_epoch)?;
        check.write_u32::<LittleEndian>(file_id)?;
        check.write_u64::<LittleEndian>(byte_offset)?;
        check.write_u32::<LittleEndian>(data_len as u32)?;
        check.extend_from_slice(&data);
        if crc32fast::hash(&check) != stored_crc {
            return Err(DurabilityError::Corrupt(format!(
                "checksum mismatch in record at offset {byte_offset}"
            )));
        }

        records.push(BackupRecord {
            horizon_epoch,
            file_id,
            byte_offset,
            original_bytes: data,
        });
    }
    Ok(records)
}
