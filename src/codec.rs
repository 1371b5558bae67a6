//! C6 — Codec: header framing, dense LZ compression, sparse group-varint
//! compression, version check and upgrade.
//!
//! The bytes this module produces/consumes are the **core**'s bytes only —
//! `version`, `b`, `binbits`, `idx`, `data[]`. The outer variable-length-
//! object length prefix is a storage/host concern and is the caller's
//! responsibility to prepend/strip.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::dense::DenseStore;
use crate::error::HllError;
use crate::params::{Params, HEADER_SIZE, MAX_B};
use crate::sparse::SparseStore;
use crate::varint;
use crate::Representation;

/// Current on-disk layout version. Bumped when group-varint sparse
/// compression was introduced.
pub const STRUCT_VERSION: u8 = 2;
/// Prior layout version: sparse compression had only the dedupe+shrink
/// form (no group-varint branch), per `original_source/src/legacy.c`.
pub const LEGACY_VERSION: u8 = 1;

struct Header {
    version: u8,
    b_raw: i32,
    binbits: u8,
    idx: i32,
}

fn write_header(out: &mut Vec<u8>, h: &Header) {
    out.push(h.version);
    out.push(h.b_raw as i8 as u8);
    out.push(h.binbits);
    out.extend_from_slice(&h.idx.to_le_bytes());
}

fn read_header(buf: &[u8]) -> Result<(Header, &[u8]), HllError> {
    if buf.len() < HEADER_SIZE {
        return Err(HllError::MalformedHeader("buffer shorter than core header"));
    }
    let version = buf[0];
    let b_raw = buf[1] as i8 as i32;
    let binbits = buf[2];
    let idx = i32::from_le_bytes(buf[3..7].try_into().unwrap());
    Ok((Header { version, b_raw, binbits, idx }, &buf[7..]))
}

/// Serializes a counter's current representation to its compressed wire
/// form: dense bodies are LZ-compressed, sparse bodies are group-varint-
/// compressed, both falling back to an uncompressed tag when compression
/// does not shrink the body.
pub fn serialize(params: Params, repr: &Representation) -> Vec<u8> {
    let mut out = Vec::new();

    match repr {
        Representation::Dense(store) => {
            let unpacked: Vec<u8> = store.iter_registers().collect();
            let compressed = deflate(&unpacked);

            if compressed.len() < store.bytes().len() {
                write_header(
                    &mut out,
                    &Header { version: STRUCT_VERSION, b_raw: -(params.b as i32), binbits: params.binbits, idx: -1 },
                );
                out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
                out.extend_from_slice(&compressed);
            } else {
                write_header(
                    &mut out,
                    &Header { version: STRUCT_VERSION, b_raw: params.b as i32, binbits: params.binbits, idx: -1 },
                );
                out.extend_from_slice(store.bytes());
            }
        }
        Representation::Sparse(store) => {
            let mut deduped = store.clone();
            deduped.dedupe();
            let entries = deduped.entries();
            let n = entries.len();

            let varint_body = varint::encode(entries);
            if varint_body.len() < 4 * n {
                write_header(
                    &mut out,
                    &Header { version: STRUCT_VERSION, b_raw: -(params.b as i32), binbits: params.binbits, idx: n as i32 },
                );
                out.extend_from_slice(&varint_body);
            } else {
                write_header(
                    &mut out,
                    &Header {
                        version: STRUCT_VERSION,
                        b_raw: -(params.b as i32 + MAX_B),
                        binbits: params.binbits,
                        idx: n as i32,
                    },
                );
                for &e in entries {
                    out.extend_from_slice(&e.to_le_bytes());
                }
            }
        }
    }

    out
}

/// Parses wire bytes produced by [`serialize`], fully decompressing into a
/// live, operable representation. Rejects bytes stamped with a version
/// other than [`STRUCT_VERSION`]; callers should invoke [`upgrade`] first
/// in that case.
pub fn deserialize(bytes: &[u8]) -> Result<(Params, Representation), HllError> {
    let (header, rest) = read_header(bytes)?;
    if header.version != STRUCT_VERSION {
        return Err(HllError::VersionMismatch { found: header.version, expected: STRUCT_VERSION });
    }
    parse_body(&header, rest)
}

/// Core parse shared by [`deserialize`] and [`upgrade`]; tolerant of any
/// version since `upgrade` must read a prior layout.
fn parse_body(header: &Header, rest: &[u8]) -> Result<(Params, Representation), HllError> {
    if header.idx == -1 {
        parse_dense(header, rest)
    } else {
        parse_sparse(header, rest)
    }
}

fn parse_dense(header: &Header, rest: &[u8]) -> Result<(Params, Representation), HllError> {
    let compressed = header.b_raw < 0;
    let b = header.b_raw.unsigned_abs() as u8;
    let params = Params::new(b, header.binbits)?;
    let body_len = params.dense_body_len();

    if compressed {
        if rest.len() < 4 {
            return Err(HllError::MalformedBody("missing dense compressed-length prefix"));
        }
        let len = u32::from_le_bytes(rest[..4].try_into().unwrap()) as usize;
        let compressed_body = rest
            .get(4..4 + len)
            .ok_or(HllError::MalformedBody("dense compressed body truncated"))?;
        let unpacked = inflate(compressed_body, params.m() as usize)?;

        let mut store = DenseStore::new(params);
        for (i, v) in unpacked.into_iter().enumerate() {
            store.set(i, v);
        }
        Ok((params, Representation::Dense(store)))
    } else {
        let body = rest
            .get(..body_len)
            .ok_or(HllError::MalformedBody("dense body truncated"))?;
        Ok((params, Representation::Dense(DenseStore::from_bytes(params, body.to_vec()))))
    }
}

fn parse_sparse(header: &Header, rest: &[u8]) -> Result<(Params, Representation), HllError> {
    let n = header.idx as usize;

    if header.b_raw > MAX_B {
        return Err(HllError::MalformedHeader("b exceeds MAX_B in sparse header"));
    }

    if header.b_raw < -MAX_B {
        // sparse-raw: b <- -(b + MAX_B), deduped+shrunk only, no varint.
        let b = (-header.b_raw - MAX_B) as u8;
        let params = Params::new(b, header.binbits)?;
        let entries = read_raw_u32s(rest, n)?;
        Ok((params, Representation::Sparse(SparseStore::from_entries(entries))))
    } else if header.b_raw < 0 {
        let b = (-header.b_raw) as u8;
        let params = Params::new(b, header.binbits)?;
        let entries = varint::decode(rest, n);
        Ok((params, Representation::Sparse(SparseStore::from_entries(entries))))
    } else {
        let b = header.b_raw as u8;
        let params = Params::new(b, header.binbits)?;
        let entries = read_raw_u32s(rest, n)?;
        Ok((params, Representation::Sparse(SparseStore::from_entries(entries))))
    }
}

fn read_raw_u32s(rest: &[u8], n: usize) -> Result<Vec<u32>, HllError> {
    if rest.len() < n * 4 {
        return Err(HllError::MalformedBody("sparse raw body truncated"));
    }
    Ok((0..n)
        .map(|i| u32::from_le_bytes(rest[i * 4..i * 4 + 4].try_into().unwrap()))
        .collect())
}

/// Converts bytes written under [`LEGACY_VERSION`] (dedupe+shrink-only
/// sparse compression, no group-varint) into current-version bytes,
/// decompressing fully and leaving the result uncompressed so the next
/// `compress` call applies the current codec.
pub fn upgrade(bytes: &[u8]) -> Result<Vec<u8>, HllError> {
    let (header, rest) = read_header(bytes)?;

    if header.version == STRUCT_VERSION {
        return Ok(bytes.to_vec());
    }
    if header.version != LEGACY_VERSION {
        return Err(HllError::VersionMismatch { found: header.version, expected: STRUCT_VERSION });
    }

    let (params, repr) = parse_body(&header, rest)?;
    Ok(serialize_uncompressed(params, &repr))
}

/// Writes a counter's representation verbatim, never attempting
/// compression — used by `upgrade` to restamp a legacy body at the
/// current version without invoking the compressor.
fn serialize_uncompressed(params: Params, repr: &Representation) -> Vec<u8> {
    let mut out = Vec::new();
    match repr {
        Representation::Dense(store) => {
            write_header(
                &mut out,
                &Header { version: STRUCT_VERSION, b_raw: params.b as i32, binbits: params.binbits, idx: -1 },
            );
            out.extend_from_slice(store.bytes());
        }
        Representation::Sparse(store) => {
            write_header(
                &mut out,
                &Header {
                    version: STRUCT_VERSION,
                    b_raw: params.b as i32,
                    binbits: params.binbits,
                    idx: store.len() as i32,
                },
            );
            for &e in store.entries() {
                out.extend_from_slice(&e.to_le_bytes());
            }
        }
    }
    out
}

fn deflate(unpacked: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(unpacked).expect("in-memory compression cannot fail");
    encoder.finish().expect("in-memory compression cannot fail")
}

fn inflate(compressed: &[u8], m: usize) -> Result<Vec<u8>, HllError> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut unpacked = Vec::with_capacity(m);
    decoder
        .read_to_end(&mut unpacked)
        .map_err(|_| HllError::MalformedBody("dense compressed body corrupt"))?;
    if unpacked.len() != m {
        return Err(HllError::MalformedBody("dense decompressed length mismatch"));
    }
    Ok(unpacked)
}
