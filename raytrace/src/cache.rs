use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    Bvh, BvhNode, CacheConfig, CacheError, ContentHash, ContentHasher,
};

/// Version of the on-disk layout, and of everything else that affects what
/// gets stored (triangle winding, builder output etc.); bumping it makes all
/// previously cached trees unreachable.
pub const CACHE_FORMAT_VERSION: u32 = 1;

const MAGIC: [u8; 4] = *b"RTBV";
const HEADER_LEN: usize = 16;

/// Name of a cache entry: geometry's content hash mixed with
/// [`CACHE_FORMAT_VERSION`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(hash: ContentHash) -> Self {
        let mut hasher = ContentHasher::new();

        hasher.write(&CACHE_FORMAT_VERSION.to_le_bytes());
        hasher.write(&hash.get().to_le_bytes());

        Self(hasher.finish())
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn file_name(self) -> String {
        format!("{:016x}.bvh", self.0)
    }
}

/// Directory of built trees, one file per [`CacheKey`].
///
/// Entry layout:
///
/// ```text
/// magic         [u8; 4]  "RTBV"
/// version       u32 LE
/// node count    u32 LE
/// prim count    u32 LE
/// nodes         [BvhNode; node count]  (native endianness)
/// prim ids      [u32; prim count]      (native endianness)
/// ```
///
/// Entries are meant to stay on the machine that wrote them.
#[derive(Clone, Debug)]
pub struct BvhCache {
    dir: PathBuf,
}

impl BvhCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(&config.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Writes the tree and returns path of the created entry.
    ///
    /// The entry is written under a temporary name first and then renamed,
    /// so concurrent readers never observe a partially written file.
    pub fn save(
        &self,
        key: CacheKey,
        bvh: &Bvh,
    ) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path(key);
        let tmp_path = self.tmp_path(key);

        let result = Self::write(&tmp_path, bvh)
            .and_then(|_| fs::rename(&tmp_path, &path));

        if let Err(err) = result {
            _ = fs::remove_file(&tmp_path);

            return Err(err.into());
        }

        log::trace!(
            "Saved BVH; path = {}, nodes = {}",
            path.display(),
            bvh.nodes().len()
        );

        Ok(path)
    }

    /// Returns a fresh path for writing the entry, unique across processes
    /// and threads saving the same key at once.
    fn tmp_path(&self, key: CacheKey) -> PathBuf {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        self.dir
            .join(format!("{:016x}.{}-{id}.tmp", key.0, process::id()))
    }

    fn write(path: &Path, bvh: &Bvh) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);

        out.write_all(&MAGIC)?;
        out.write_all(&CACHE_FORMAT_VERSION.to_le_bytes())?;
        out.write_all(&len_u32(bvh.nodes().len())?.to_le_bytes())?;
        out.write_all(&len_u32(bvh.prim_ids().len())?.to_le_bytes())?;
        out.write_all(bytemuck::cast_slice(bvh.nodes()))?;
        out.write_all(bytemuck::cast_slice(bvh.prim_ids()))?;

        out.into_inner().map_err(|err| err.into_error())?.sync_all()
    }

    /// Reads a tree built over `primitive_count` primitives.
    ///
    /// Returns `Ok(None)` if there's no such entry; entries that exist but
    /// can't be used (corrupted, written by another version, built for
    /// different geometry, failing validation) yield an error.
    pub fn load(
        &self,
        key: CacheKey,
        primitive_count: usize,
    ) -> Result<Option<Bvh>, CacheError> {
        let bytes = match fs::read(self.path(key)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => {
                return Err(err.into());
            }
        };

        let bvh = Self::parse(&bytes)?;

        if bvh.len() != primitive_count {
            return Err(CacheError::PrimitiveCount {
                found: bvh.len(),
                expected: primitive_count,
            });
        }

        bvh.validate()?;

        Ok(Some(bvh))
    }

    fn parse(bytes: &[u8]) -> Result<Bvh, CacheError> {
        let header = bytes.get(..HEADER_LEN).ok_or(CacheError::Truncated)?;
        let word = |idx: usize| {
            let mut word = [0; 4];

            word.copy_from_slice(&header[4 * idx..4 * (idx + 1)]);
            u32::from_le_bytes(word)
        };

        if header[..4] != MAGIC {
            return Err(CacheError::BadMagic);
        }

        let version = word(1);

        if version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: version,
                expected: CACHE_FORMAT_VERSION,
            });
        }

        let node_count = word(2) as usize;
        let prim_count = word(3) as usize;

        let nodes_len = node_count
            .checked_mul(mem::size_of::<BvhNode>())
            .ok_or(CacheError::Truncated)?;

        let prims_len = prim_count
            .checked_mul(mem::size_of::<u32>())
            .ok_or(CacheError::Truncated)?;

        let body = &bytes[HEADER_LEN..];

        if Some(body.len()) != nodes_len.checked_add(prims_len) {
            return Err(CacheError::Truncated);
        }

        let (nodes, prim_ids) = body.split_at(nodes_len);

        let nodes = nodes
            .chunks_exact(mem::size_of::<BvhNode>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        let prim_ids = prim_ids
            .chunks_exact(mem::size_of::<u32>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        Ok(Bvh::from_parts(nodes, prim_ids))
    }

    /// Removes all entries; missing directory is not an error.
    pub fn clear(&self) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(());
            }
            Err(err) => {
                return Err(err.into());
            }
        };

        for entry in entries {
            let path = entry?.path();
            let is_entry = path
                .extension()
                .map_or(false, |ext| ext == "bvh" || ext == "tmp");

            if is_entry {
                fs::remove_file(path)?;
            }
        }

        Ok(())
    }
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "tree is too large")
    })
}
