use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, process};

use glam::Vec3;

use crate::{BufferInfo, BufferType, CpuBuffer, Format};

pub fn init_logging() {
    _ = env_logger::builder().is_test(true).try_init();
}

/// Unique directory under the system's temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "raytrace-{}-{:016x}",
            process::id(),
            rand::random::<u64>()
        ));

        fs::create_dir_all(&path).unwrap();

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        _ = fs::remove_dir_all(&self.path);
    }
}

/// Returns index and vertex buffers describing given triangles, with every
/// triangle using its own three vertices.
pub fn triangle_buffers(triangles: &[[Vec3; 3]]) -> [BufferInfo; 2] {
    let indices: Vec<[u32; 3]> = (0..triangles.len() as u32)
        .map(|idx| [3 * idx, 3 * idx + 1, 3 * idx + 2])
        .collect();

    let vertices: Vec<[f32; 3]> = triangles
        .iter()
        .flatten()
        .map(|vertex| vertex.to_array())
        .collect();

    [
        BufferInfo::new(
            BufferType::Index,
            Format::Vec3U32,
            Arc::new(CpuBuffer::from_pod(&indices)),
        ),
        BufferInfo::new(
            BufferType::Vertex,
            Format::Vec3F32,
            Arc::new(CpuBuffer::from_pod(&vertices)),
        ),
    ]
}
