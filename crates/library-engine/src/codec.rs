//! Codec (C2)
//!
//! Two responsibilities: quantizing embeddings to a compact int8 form with a
//! per-vector scale header (mirroring the teacher's `ScalarKind::I8`
//! quantization in `search::vector::VectorIndex`, just without the HNSW
//! index wrapped around it), and encoding/decoding the full store snapshot
//! into the key -> bytes map the storage backend (C1) persists.
//!
//! Deserialize is defensive: a corrupt individual record is skipped and
//! counted rather than failing the whole load, per the spec's corruption
//! recovery contract.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::volume::{AccessStats, Volume};

// ============================================================================
// EMBEDDING CODEC
// ============================================================================

/// Quantize a float32 embedding to int8 with a per-vector scale.
///
/// Layout: `[f32 scale LE][i8 * len]`. Decoding multiplies each int8 by the
/// scale to recover the original magnitude direction within quantization
/// error (the scale is chosen so the largest-magnitude component maps to
/// +/-127).
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let max_abs = embedding.iter().fold(0f32, |acc, x| acc.max(x.abs()));
    let scale = if max_abs > 0.0 { max_abs / 127.0 } else { 1.0 };

    let mut out = Vec::with_capacity(4 + embedding.len());
    out.extend_from_slice(&scale.to_le_bytes());
    for &v in embedding {
        let q = if scale > 0.0 { (v / scale).round() } else { 0.0 };
        let q = q.clamp(-127.0, 127.0) as i8;
        out.push(q as u8);
    }
    out
}

/// Decode a quantized embedding produced by [`encode_embedding`].
///
/// Returns `None` if the blob is shorter than the 4-byte scale header.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < 4 {
        return None;
    }
    let scale = f32::from_le_bytes(bytes[0..4].try_into().ok()?);
    let values = bytes[4..]
        .iter()
        .map(|&b| (b as i8) as f32 * scale)
        .collect();
    Some(values)
}

// ============================================================================
// SNAPSHOT KEYS
// ============================================================================

/// Key under which the volume records blob is stored.
pub const KEY_VOLUMES: &str = "volumes";
/// Key under which the access-stats blob is stored.
pub const KEY_ACCESS_STATS: &str = "access_stats";
/// Key under which the optional learning-engine state blob is stored.
pub const KEY_LEARNING: &str = "learning";

// ============================================================================
// LOW-LEVEL LENGTH-PREFIXED PRIMITIVES
// ============================================================================

pub(crate) fn push_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Reads a `u32`-length-prefixed byte slice, advancing `pos`.
/// Returns `None` on truncation (defensive decode).
pub(crate) fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *pos + 4 > buf.len() {
        return None;
    }
    let len = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().ok()?) as usize;
    *pos += 4;
    if *pos + len > buf.len() {
        return None;
    }
    let slice = &buf[*pos..*pos + len];
    *pos += len;
    Some(slice)
}

pub(crate) fn read_str(buf: &[u8], pos: &mut usize) -> Option<String> {
    let bytes = read_bytes(buf, pos)?;
    std::str::from_utf8(bytes).ok().map(|s| s.to_string())
}

fn read_i64(buf: &[u8], pos: &mut usize) -> Option<i64> {
    if *pos + 8 > buf.len() {
        return None;
    }
    let v = i64::from_le_bytes(buf[*pos..*pos + 8].try_into().ok()?);
    *pos += 8;
    Some(v)
}

pub(crate) fn read_u64(buf: &[u8], pos: &mut usize) -> Option<u64> {
    if *pos + 8 > buf.len() {
        return None;
    }
    let v = u64::from_le_bytes(buf[*pos..*pos + 8].try_into().ok()?);
    *pos += 8;
    Some(v)
}

pub(crate) fn read_u16(buf: &[u8], pos: &mut usize) -> Option<u16> {
    if *pos + 2 > buf.len() {
        return None;
    }
    let v = u16::from_le_bytes(buf[*pos..*pos + 2].try_into().ok()?);
    *pos += 2;
    Some(v)
}

pub(crate) fn read_f32(buf: &[u8], pos: &mut usize) -> Option<f32> {
    if *pos + 4 > buf.len() {
        return None;
    }
    let v = f32::from_le_bytes(buf[*pos..*pos + 4].try_into().ok()?);
    *pos += 4;
    Some(v)
}

// ============================================================================
// VOLUME RECORDS
// ============================================================================

fn encode_volume_record(volume: &Volume) -> Vec<u8> {
    let mut rec = Vec::new();
    push_bytes(&mut rec, volume.id.as_bytes());
    push_bytes(&mut rec, volume.text.as_bytes());
    push_bytes(&mut rec, &encode_embedding(&volume.embedding));
    rec.extend_from_slice(&(volume.metadata.len() as u16).to_le_bytes());
    for (k, v) in &volume.metadata {
        push_bytes(&mut rec, k.as_bytes());
        push_bytes(&mut rec, v.as_bytes());
    }
    rec.extend_from_slice(&volume.timestamp.timestamp_millis().to_le_bytes());
    rec
}

/// Decode a single volume record. Returns `None` on any truncation/parse
/// failure so the caller can skip-and-count rather than abort the load.
fn decode_volume_record(rec: &[u8]) -> Option<Volume> {
    let mut pos = 0usize;
    let id = read_str(rec, &mut pos)?;
    let text = read_str(rec, &mut pos)?;
    let embedding_bytes = read_bytes(rec, &mut pos)?;
    let embedding = decode_embedding(embedding_bytes)?;
    if embedding.is_empty() || text.is_empty() {
        return None;
    }

    let meta_count = read_u16(rec, &mut pos)?;
    let mut metadata = HashMap::with_capacity(meta_count as usize);
    for _ in 0..meta_count {
        let k = read_str(rec, &mut pos)?;
        let v = read_str(rec, &mut pos)?;
        metadata.insert(k, v);
    }

    let ts_ms = read_i64(rec, &mut pos)?;
    let timestamp = Utc.timestamp_millis_opt(ts_ms).single()?;

    Some(Volume {
        id,
        text,
        embedding,
        metadata,
        timestamp,
    })
}

/// Encode all volumes into the `volumes` blob.
pub fn encode_volumes(volumes: &[Volume]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in volumes {
        push_bytes(&mut out, &encode_volume_record(v));
    }
    out
}

/// Result of a defensive snapshot decode: the recovered items plus a count
/// of records that were skipped because they were malformed.
pub struct DecodeReport<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

/// Decode the `volumes` blob, skipping and counting corrupt records.
pub fn decode_volumes(bytes: &[u8]) -> DecodeReport<Volume> {
    let mut pos = 0usize;
    let mut items = Vec::new();
    let mut skipped = 0usize;
    while pos < bytes.len() {
        let Some(rec) = read_bytes(bytes, &mut pos) else {
            // Truncated length prefix: nothing more can be recovered.
            skipped += 1;
            break;
        };
        match decode_volume_record(rec) {
            Some(v) => items.push(v),
            None => skipped += 1,
        }
    }
    DecodeReport { items, skipped }
}

// ============================================================================
// ACCESS STATS
// ============================================================================

pub fn encode_access_stats(stats: &HashMap<String, AccessStats>) -> Vec<u8> {
    let mut out = Vec::new();
    for (id, s) in stats {
        let mut rec = Vec::new();
        push_bytes(&mut rec, id.as_bytes());
        rec.extend_from_slice(&s.access_count.to_le_bytes());
        rec.extend_from_slice(&s.last_accessed.to_le_bytes());
        push_bytes(&mut out, &rec);
    }
    out
}

pub fn decode_access_stats(bytes: &[u8]) -> DecodeReport<(String, AccessStats)> {
    let mut pos = 0usize;
    let mut items = Vec::new();
    let mut skipped = 0usize;
    while pos < bytes.len() {
        let Some(rec) = read_bytes(bytes, &mut pos) else {
            skipped += 1;
            break;
        };
        let mut rpos = 0usize;
        let parsed = (|| {
            let id = read_str(rec, &mut rpos)?;
            let access_count = read_u64(rec, &mut rpos)?;
            let last_accessed = read_i64(rec, &mut rpos)?;
            Some((
                id,
                AccessStats {
                    access_count,
                    last_accessed,
                },
            ))
        })();
        match parsed {
            Some(pair) => items.push(pair),
            None => skipped += 1,
        }
    }
    DecodeReport { items, skipped }
}
