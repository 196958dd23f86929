//! Flat vector index with exact nearest-neighbor search.
//!
//! Brute-force squared-L2 distance over all vectors, appropriate at
//! corpus sizes in the hundreds to thousands. Insertion order defines
//! the index's ordinal space and must equal the corpus ordinal space
//! for correct text recovery. No normalization is applied; callers
//! relying on cosine similarity must normalize upstream.

use crate::corpus::CorpusFingerprint;
use medrag_core::{AppError, AppResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Artifact header magic.
const INDEX_MAGIC: &[u8; 8] = b"MEDRAGIX";

/// Artifact format version.
const INDEX_VERSION: u32 = 1;

/// Artifact header size in bytes: magic, version, fingerprint,
/// dimension, vector count.
const HEADER_LEN: u64 = 8 + 4 + 32 + 4 + 8;

/// In-memory flat index over fixed-dimension embedding vectors.
///
/// Lifecycle: constructed empty with a declared dimension, populated
/// exactly once via [`FlatIndex::insert_all`], read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index of dimension `dim`.
    pub fn new(dim: usize) -> AppResult<Self> {
        if dim == 0 {
            return Err(AppError::Index(
                "Index dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dim,
            data: Vec::new(),
        })
    }

    /// Declared vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bulk-insert the full vector set.
    ///
    /// Insertion order becomes the internal ordinal space. May be
    /// called at most once; the index is read-only afterwards.
    pub fn insert_all(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        if !self.is_empty() {
            return Err(AppError::Index(
                "Index is already populated; insert_all may be called only once".to_string(),
            ));
        }

        self.data.reserve(vectors.len() * self.dim);
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dim {
                self.data.clear();
                return Err(AppError::Index(format!(
                    "Vector {} has dimension {}, expected {}",
                    i,
                    vector.len(),
                    self.dim
                )));
            }
            self.data.extend_from_slice(vector);
        }

        tracing::debug!("Indexed {} vectors of dimension {}", self.len(), self.dim);
        Ok(())
    }

    /// Find the `k` nearest vectors to `query` by squared Euclidean
    /// distance.
    ///
    /// Returns `(distance, ordinal)` pairs ordered nearest-first, at
    /// most `min(k, len)` of them. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(f32, usize)>> {
        if query.len() != self.dim {
            return Err(AppError::Index(format!(
                "Query has dimension {}, expected {}",
                query.len(),
                self.dim
            )));
        }

        let mut results: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(ordinal, row)| (squared_l2(query, row), ordinal))
            .collect();

        // Stable sort keeps insertion order on equal distances
        results.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    /// Write the index and the corpus fingerprint it was built against
    /// to one durable artifact file.
    ///
    /// Layout, all integers little-endian: magic, version (u32),
    /// fingerprint (32 bytes), dimension (u32), vector count (u64),
    /// then the vector data as f32 values in insertion order.
    pub fn save(&self, path: &Path, fingerprint: &CorpusFingerprint) -> AppResult<()> {
        let file = File::create(path)
            .map_err(|e| AppError::Index(format!("Failed to create {:?}: {}", path, e)))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(INDEX_MAGIC)?;
        writer.write_all(&INDEX_VERSION.to_le_bytes())?;
        writer.write_all(fingerprint.as_bytes())?;
        writer.write_all(&(self.dim as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;

        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }

        writer.flush()?;
        tracing::info!(
            "Saved index artifact to {:?} ({} vectors, dimension {})",
            path,
            self.len(),
            self.dim
        );
        Ok(())
    }

    /// Load an index artifact written by [`FlatIndex::save`].
    ///
    /// A reconstructed index is behaviorally identical to a freshly
    /// built one: same vectors, same dimension, same ordinal order.
    pub fn load(path: &Path) -> AppResult<(Self, CorpusFingerprint)> {
        let file = File::open(path)
            .map_err(|e| AppError::Index(format!("Failed to open {:?}: {}", path, e)))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(AppError::Index(format!(
                "{:?} is not an index artifact (bad magic)",
                path
            )));
        }

        let version = read_u32(&mut reader)?;
        if version != INDEX_VERSION {
            return Err(AppError::Index(format!(
                "Unsupported index artifact version {} in {:?}",
                version, path
            )));
        }

        let mut fingerprint = [0u8; 32];
        reader.read_exact(&mut fingerprint)?;

        let dim = read_u32(&mut reader)? as usize;
        let count = read_u64(&mut reader)?;

        if dim == 0 {
            return Err(AppError::Index(format!(
                "Corrupt index artifact {:?}: zero dimension",
                path
            )));
        }

        // The header must agree with the file's actual size before any
        // allocation is sized from it.
        let expected_len = count
            .checked_mul(dim as u64)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                AppError::Index(format!(
                    "Corrupt index artifact {:?}: implausible vector count {}",
                    path, count
                ))
            })?;
        let actual_len = std::fs::metadata(path)?.len();
        if actual_len != expected_len {
            return Err(AppError::Index(format!(
                "Corrupt index artifact {:?}: header claims {} bytes, file has {}",
                path, expected_len, actual_len
            )));
        }

        let count = count as usize;
        let mut data = Vec::with_capacity(count * dim);
        let mut buf = [0u8; 4];
        for _ in 0..count * dim {
            reader.read_exact(&mut buf)?;
            data.push(f32::from_le_bytes(buf));
        }

        tracing::info!(
            "Loaded index artifact from {:?} ({} vectors, dimension {})",
            path,
            count,
            dim
        );

        Ok((Self { dim, data }, CorpusFingerprint(fingerprint)))
    }
}

fn read_u32(reader: &mut impl Read) -> AppResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> AppResult<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Squared Euclidean distance between two equal-length vectors.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
