use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::tensor::{DType, TensorBuffer};

use super::StagedFile;

const MAGIC: &[u8; 8] = b"TLWEIGHT";
const VERSION: u32 = 1;

/// Location of one named array inside an archive file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightArchiveEntry {
    pub name: String,
    pub dims: Vec<usize>,
    pub dtype: DType,
    pub offset: u64,
    pub len: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WeightArchiveIndex {
    entries: Vec<WeightArchiveIndexEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WeightArchiveIndexEntry {
    name: String,
    dims: Vec<u64>,
    dtype_tag: u32,
    offset: u64,
    len: u64,
}

/// Named constant arrays collected while lowering, written as one blob.
///
/// Entries are kept sorted by name so the written file only depends on the contents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightArchive {
    entries: BTreeMap<String, TensorBuffer>,
}

impl WeightArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an array, returning the one previously stored under `name`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        buffer: TensorBuffer,
    ) -> Option<TensorBuffer> {
        self.entries.insert(name.into(), buffer)
    }

    pub fn get(&self, name: &str) -> Option<&TensorBuffer> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorBuffer)> {
        self.entries
            .iter()
            .map(|(name, buffer)| (name.as_str(), buffer))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = WeightArchiveReader::open(path)?;
        let entries = reader.entries().to_vec();
        let mut archive = WeightArchive::new();
        for entry in entries {
            let buffer = reader.get_entry(&entry)?;
            archive.insert(entry.name, buffer);
        }
        Ok(archive)
    }

    /// Writes the archive to `path`; the file only appears once it is complete.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.stage(path.as_ref())?.persist()
    }

    pub(crate) fn stage(&self, path: &Path) -> Result<StagedFile> {
        super::stage(path, |writer| self.write_to(writer))
    }

    /// Serializes the archive: magic, version, index length, bincode index, raw data.
    pub fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
        let mut index_entries = Vec::with_capacity(self.entries.len());
        let mut running_offset: u64 = 0;
        for (name, buffer) in &self.entries {
            let len = buffer.bytes().len() as u64;
            index_entries.push(WeightArchiveIndexEntry {
                name: name.clone(),
                dims: buffer.dims().iter().map(|&d| d as u64).collect(),
                dtype_tag: buffer.dtype().tag(),
                offset: running_offset,
                len,
            });
            running_offset = running_offset
                .checked_add(len)
                .ok_or_else(|| anyhow!("weight archive data offset overflow"))?;
        }

        let mut index = WeightArchiveIndex {
            entries: index_entries,
        };
        let index_len = bincode::serialized_size(&index)? as usize;
        ensure!(
            index_len <= u32::MAX as usize,
            "weight archive index too large"
        );

        // Offsets are fixed-width in bincode, so rebasing keeps the index length.
        let data_start = (MAGIC.len() + 4 + 4 + index_len) as u64;
        for entry in index.entries.iter_mut() {
            entry.offset = entry
                .offset
                .checked_add(data_start)
                .ok_or_else(|| anyhow!("weight archive offset overflow"))?;
        }
        let index_bytes = bincode::serialize(&index)?;
        ensure!(
            index_bytes.len() == index_len,
            "weight archive index length mismatch after offset fixup"
        );

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(index_len as u32).to_le_bytes())?;
        writer.write_all(&index_bytes)?;
        for buffer in self.entries.values() {
            writer.write_all(buffer.bytes())?;
        }
        Ok(())
    }

    pub fn reader(path: impl AsRef<Path>) -> Result<WeightArchiveReader> {
        WeightArchiveReader::open(path)
    }
}

/// Random-access reader over an archive file.
pub struct WeightArchiveReader {
    file: File,
    entries: Vec<WeightArchiveEntry>,
    by_name: HashMap<String, usize>,
}

impl WeightArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .with_context(|| format!("failed to open weight archive {}", path.display()))?;

        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("invalid weight archive magic header");
        }
        let version = read_u32(&mut file)?;
        if version != VERSION {
            bail!("unsupported weight archive version {}", version);
        }

        let index_len = read_u32(&mut file)? as usize;
        let mut index_bytes = vec![0u8; index_len];
        file.read_exact(&mut index_bytes)?;
        let index: WeightArchiveIndex = bincode::deserialize(&index_bytes)?;

        let mut entries = Vec::with_capacity(index.entries.len());
        let mut by_name = HashMap::with_capacity(index.entries.len());
        for (i, e) in index.entries.into_iter().enumerate() {
            let dtype = DType::from_tag(e.dtype_tag)
                .ok_or_else(|| anyhow!("unknown dtype tag {} in weight archive", e.dtype_tag))?;
            let dims = e
                .dims
                .into_iter()
                .map(|d| usize::try_from(d).map_err(|_| anyhow!("weight {} dim overflow", e.name)))
                .collect::<Result<Vec<_>>>()?;
            by_name.insert(e.name.clone(), i);
            entries.push(WeightArchiveEntry {
                name: e.name,
                dims,
                dtype,
                offset: e.offset,
                len: e.len,
            });
        }

        Ok(Self {
            file,
            entries,
            by_name,
        })
    }

    pub fn entries(&self) -> &[WeightArchiveEntry] {
        &self.entries
    }

    pub fn get(&mut self, name: &str) -> Result<TensorBuffer> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| anyhow!("weight '{}' not found in archive", name))?;
        let entry = self
            .entries
            .get(idx)
            .cloned()
            .ok_or_else(|| anyhow!("weight '{}' index out of range", name))?;
        self.get_entry(&entry)
    }

    pub fn get_entry(&mut self, entry: &WeightArchiveEntry) -> Result<TensorBuffer> {
        self.file.seek(SeekFrom::Start(entry.offset))?;
        let byte_len = usize::try_from(entry.len)
            .map_err(|_| anyhow!("weight {} data length {} out of range", entry.name, entry.len))?;
        let mut raw = vec![0u8; byte_len];
        self.file.read_exact(&mut raw)?;
        TensorBuffer::from_raw(entry.dims.clone(), entry.dtype, raw)
            .with_context(|| format!("weight {} data size does not match its dims", entry.name))
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
