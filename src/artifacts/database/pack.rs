//! Read-only pack backend
//!
//! Every `objects/pack/*.idx` (version 2) is loaded together with its `.pack`
//! (version 2 or 3) when the backend is opened. Whole objects and both delta
//! encodings (offset and reference deltas) are supported; a reference delta must
//! find its base in the same pack.
//!
//! ## Index layout
//!
//! ```text
//! \377tOc | version | fan-out[256] | oids[n] | crc32[n] | offsets[n] | large offsets | checksums
//! ```

use crate::artifacts::database::backend::OdbBackend;
use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::objects::object_id::{ObjectId, OidPrefix};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::errors::{Error, IoContext, Result};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};

const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const PACK_MAGIC: &[u8; 4] = b"PACK";
const FAN_OUT_SIZE: usize = 256 * 4;
const IDX_HEADER_SIZE: usize = 8;
const PACK_HEADER_SIZE: usize = 12;

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// Longest delta chain followed before the pack is declared corrupt
const MAX_DELTA_CHAIN: usize = 4096;

#[derive(Debug)]
struct PackIndex {
    oids: Vec<ObjectId>,
    offsets: Vec<u64>,
}

impl PackIndex {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < IDX_HEADER_SIZE + FAN_OUT_SIZE || data[..4] != IDX_MAGIC {
            return Err(Error::malformed("pack index", "not a version 2 index"));
        }
        let version = BigEndian::read_u32(&data[4..8]);
        if version != 2 {
            return Err(Error::malformed(
                "pack index",
                format!("unsupported version {version}"),
            ));
        }

        let fan_out = &data[IDX_HEADER_SIZE..IDX_HEADER_SIZE + FAN_OUT_SIZE];
        let count = BigEndian::read_u32(&fan_out[FAN_OUT_SIZE - 4..]) as usize;

        let oids_start = IDX_HEADER_SIZE + FAN_OUT_SIZE;
        let crc_start = oids_start + OBJECT_ID_RAW_LENGTH * count;
        let offsets_start = crc_start + 4 * count;
        let large_start = offsets_start + 4 * count;
        if data.len() < large_start + 2 * OBJECT_ID_RAW_LENGTH {
            return Err(Error::malformed("pack index", "truncated"));
        }

        let mut oids = Vec::with_capacity(count);
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let start = oids_start + OBJECT_ID_RAW_LENGTH * i;
            oids.push(ObjectId::from_slice(
                &data[start..start + OBJECT_ID_RAW_LENGTH],
            )?);

            let offset = BigEndian::read_u32(&data[offsets_start + 4 * i..]);
            let offset = if offset & 0x8000_0000 != 0 {
                let position = large_start + 8 * (offset & 0x7fff_ffff) as usize;
                if data.len() < position + 8 {
                    return Err(Error::malformed("pack index", "large offset out of range"));
                }
                BigEndian::read_u64(&data[position..])
            } else {
                offset as u64
            };
            offsets.push(offset);
        }

        Ok(PackIndex { oids, offsets })
    }

    fn find(&self, oid: &ObjectId) -> Option<usize> {
        self.oids
            .binary_search(oid)
            .ok()
            .map(|position| self.offsets[position] as usize)
    }
}

#[derive(Debug)]
struct PackFile {
    path: PathBuf,
    index: PackIndex,
    data: Bytes,
}

impl PackFile {
    fn open(idx_path: &Path) -> Result<Self> {
        let path = idx_path.with_extension("pack");
        let index = PackIndex::parse(&std::fs::read(idx_path).at(idx_path)?)?;
        let data = Bytes::from(std::fs::read(&path).at(&path)?);

        if data.len() < PACK_HEADER_SIZE || &data[..4] != PACK_MAGIC {
            return Err(Error::malformed("pack", format!("{} has no PACK header", path.display())));
        }
        let version = BigEndian::read_u32(&data[4..8]);
        if version != 2 && version != 3 {
            return Err(Error::malformed("pack", format!("unsupported version {version}")));
        }

        Ok(PackFile { path, index, data })
    }

    fn byte(&self, position: usize) -> Result<u8> {
        self.data
            .get(position)
            .copied()
            .ok_or_else(|| Error::malformed("pack", format!("truncated at {position}")))
    }

    /// Type code, inflated size and start of the data of the entry at `offset`
    fn entry_header(&self, offset: usize) -> Result<(u8, usize, usize)> {
        let mut position = offset;
        let mut byte = self.byte(position)?;
        position += 1;

        let kind = (byte >> 4) & 0x07;
        let mut size = (byte & 0x0f) as usize;
        let mut shift = 4;
        while byte & 0x80 != 0 {
            if shift > 57 {
                return Err(Error::malformed("pack", "entry size overflows"));
            }
            byte = self.byte(position)?;
            position += 1;
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
        }

        Ok((kind, size, position))
    }

    /// Distance back to an offset delta's base
    fn base_distance(&self, mut position: usize) -> Result<(usize, usize)> {
        let mut byte = self.byte(position)?;
        position += 1;

        let mut distance = (byte & 0x7f) as usize;
        while byte & 0x80 != 0 {
            byte = self.byte(position)?;
            position += 1;
            let shifted = distance
                .checked_add(1)
                .and_then(|distance| distance.checked_mul(1 << 7))
                .ok_or_else(|| Error::malformed("pack", format!("base distance overflows at {position}")))?;
            distance = shifted | (byte & 0x7f) as usize;
        }

        Ok((distance, position))
    }

    fn inflate(&self, start: usize, size: usize) -> Result<Vec<u8>> {
        let compressed = self
            .data
            .get(start..)
            .ok_or_else(|| Error::malformed("pack", format!("truncated at {start}")))?;

        let mut inflated = Vec::with_capacity(size);
        ZlibDecoder::new(compressed)
            .take(size as u64 + 1)
            .read_to_end(&mut inflated)
            .at(&self.path)?;

        if inflated.len() != size {
            return Err(Error::malformed(
                "pack",
                format!("entry at {start} inflates to {} bytes, expected {size}", inflated.len()),
            ));
        }

        Ok(inflated)
    }

    fn read_at(&self, mut offset: usize) -> Result<(ObjectType, Vec<u8>)> {
        let mut deltas = Vec::new();

        loop {
            if deltas.len() > MAX_DELTA_CHAIN {
                return Err(Error::malformed("pack", "delta chain too long"));
            }

            let (kind, size, position) = self.entry_header(offset)?;
            match kind {
                OFS_DELTA => {
                    let (distance, position) = self.base_distance(position)?;
                    deltas.push(self.inflate(position, size)?);
                    offset = offset
                        .checked_sub(distance)
                        .filter(|base| *base >= PACK_HEADER_SIZE)
                        .ok_or_else(|| Error::malformed("pack", "delta base before pack start"))?;
                }
                REF_DELTA => {
                    let base = self
                        .data
                        .get(position..position + OBJECT_ID_RAW_LENGTH)
                        .ok_or_else(|| Error::malformed("pack", "truncated base id"))?;
                    let base = ObjectId::from_slice(base)?;
                    deltas.push(self.inflate(position + OBJECT_ID_RAW_LENGTH, size)?);
                    offset = self.index.find(&base).ok_or_else(|| {
                        Error::malformed("pack", format!("delta base {base} is not in the pack"))
                    })?;
                }
                code => {
                    let object_type = ObjectType::from_pack_code(code)
                        .ok_or_else(|| Error::malformed("pack", format!("entry type {code}")))?;
                    let mut data = self.inflate(position, size)?;
                    for delta in deltas.iter().rev() {
                        data = apply_delta(&data, delta)?;
                    }

                    return Ok((object_type, data));
                }
            }
        }
    }
}

fn read_varint(delta: &[u8], position: &mut usize) -> Result<usize> {
    let mut value = 0usize;
    let mut shift = 0;

    loop {
        let byte = *delta
            .get(*position)
            .ok_or_else(|| Error::malformed("delta", "truncated size"))?;
        *position += 1;
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::malformed("delta", "size overflows"));
        }
    }
}

/// Rebuild an object from its base and a copy/insert instruction stream
pub(crate) fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut position = 0;
    let source_size = read_varint(delta, &mut position)?;
    if source_size != base.len() {
        return Err(Error::malformed(
            "delta",
            format!("expects a {source_size} byte base, got {}", base.len()),
        ));
    }
    let target_size = read_varint(delta, &mut position)?;
    let mut target = Vec::with_capacity(target_size);

    let byte = |position: &mut usize| -> Result<usize> {
        let value = delta
            .get(*position)
            .copied()
            .ok_or_else(|| Error::malformed("delta", "truncated copy instruction"))?;
        *position += 1;
        Ok(value as usize)
    };

    while position < delta.len() {
        let opcode = delta[position];
        position += 1;

        if opcode & 0x80 != 0 {
            let mut offset = 0;
            for i in 0..4 {
                if opcode & (1 << i) != 0 {
                    offset |= byte(&mut position)? << (8 * i);
                }
            }
            let mut size = 0;
            for i in 0..3 {
                if opcode & (0x10 << i) != 0 {
                    size |= byte(&mut position)? << (8 * i);
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let copied = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| Error::malformed("delta", "copy outside the base"))?;
            target.extend_from_slice(copied);
        } else if opcode != 0 {
            let end = position + opcode as usize;
            let inserted = delta
                .get(position..end)
                .ok_or_else(|| Error::malformed("delta", "truncated insert"))?;
            target.extend_from_slice(inserted);
            position = end;
        } else {
            return Err(Error::malformed("delta", "reserved opcode 0"));
        }
    }

    if target.len() != target_size {
        return Err(Error::malformed(
            "delta",
            format!("produced {} bytes, expected {target_size}", target.len()),
        ));
    }

    Ok(target)
}

#[derive(Debug, Default)]
pub struct PackBackend {
    packs: Vec<PackFile>,
}

impl PackBackend {
    /// Load every pack under `<objects_dir>/pack`
    ///
    /// Packs that fail to load are skipped with a warning.
    pub fn open(objects_dir: &Path) -> Result<Self> {
        let pack_dir = objects_dir.join("pack");
        if !pack_dir.is_dir() {
            return Ok(Self::default());
        }

        let mut idx_paths = Vec::new();
        for entry in std::fs::read_dir(&pack_dir).at(&pack_dir)? {
            let path = entry.at(&pack_dir)?.path();
            if path.extension().is_some_and(|extension| extension == "idx") {
                idx_paths.push(path);
            }
        }
        idx_paths.sort();

        let mut packs = Vec::new();
        for idx_path in idx_paths {
            match PackFile::open(&idx_path) {
                Ok(pack) => {
                    tracing::debug!(pack = %pack.path.display(), objects = pack.index.oids.len(), "pack loaded");
                    packs.push(pack);
                }
                Err(error) => {
                    tracing::warn!(index = %idx_path.display(), %error, "skipping unreadable pack");
                }
            }
        }

        Ok(PackBackend { packs })
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    pub fn object_count(&self) -> usize {
        self.packs.iter().map(|pack| pack.index.oids.len()).sum()
    }
}

impl OdbBackend for PackBackend {
    fn name(&self) -> &'static str {
        "pack"
    }

    fn exists(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.packs.iter().any(|pack| pack.index.find(oid).is_some()))
    }

    fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>> {
        for pack in &self.packs {
            if let Some(offset) = pack.index.find(oid) {
                let (object_type, data) = pack.read_at(offset)?;
                tracing::trace!(%oid, pack = %pack.path.display(), "packed object read");

                return Ok(Some(RawObject::new(*oid, object_type, Bytes::from(data))));
            }
        }

        Ok(None)
    }

    fn prefix_matches(&self, prefix: &OidPrefix) -> Result<Vec<ObjectId>> {
        Ok(self
            .packs
            .iter()
            .flat_map(|pack| pack.index.oids.iter())
            .filter(|oid| oid.starts_with(prefix))
            .copied()
            .collect())
    }
}
