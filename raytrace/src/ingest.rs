use glam::Vec3;

use crate::{
    BoundingBox, BufferInfo, BufferType, ContentHash, ContentHasher, Format,
    IngestError, Triangle,
};

/// Triangles extracted from a geometry's buffers, together with everything
/// the builder needs to know about them.
#[derive(Clone, Debug, Default)]
pub struct TriangleSoup {
    pub triangles: Vec<Triangle>,
    pub bounds: Vec<BoundingBox>,
    pub centers: Vec<Vec3>,
    pub hash: ContentHash,
}

impl TriangleSoup {
    /// Reads triangles out of the most recently registered index and vertex
    /// buffers.
    ///
    /// Triangles get stored with reversed winding (`p2, p1, p0`), while the
    /// content hash is computed over the original order.
    pub fn ingest(buffers: &[BufferInfo]) -> Result<Self, IngestError> {
        let index_info = find(buffers, BufferType::Index, Format::Vec3U32)?;
        let vertex_info = find(buffers, BufferType::Vertex, Format::Vec3F32)?;

        let count = index_info.item_count;
        let mut hasher = ContentHasher::new();
        let mut triangles = Vec::with_capacity(count);
        let mut bounds = Vec::with_capacity(count);
        let mut centers = Vec::with_capacity(count);

        for triangle_idx in 0..count {
            let [i0, i1, i2] = read::<[u32; 3]>(index_info, triangle_idx)?;

            let p0 = read_vertex(vertex_info, i0)?;
            let p1 = read_vertex(vertex_info, i1)?;
            let p2 = read_vertex(vertex_info, i2)?;

            hasher.write_triangle([p0, p1, p2]);

            let triangle = Triangle::new([p2, p1, p0]);

            bounds.push(triangle.bounds());
            centers.push(triangle.center());
            triangles.push(triangle);
        }

        Ok(Self {
            triangles,
            bounds,
            centers,
            hash: hasher.hash(),
        })
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

fn find(
    buffers: &[BufferInfo],
    ty: BufferType,
    format: Format,
) -> Result<&BufferInfo, IngestError> {
    let info = buffers
        .iter()
        .rev()
        .find(|info| info.ty == ty)
        .ok_or(IngestError::MissingBuffer(ty))?;

    if info.format == format {
        Ok(info)
    } else {
        Err(IngestError::UnsupportedFormat {
            ty,
            format: info.format,
        })
    }
}

fn read<T>(info: &BufferInfo, item: usize) -> Result<T, IngestError>
where
    T: bytemuck::Pod,
{
    info.item_offset(item)
        .and_then(|offset| info.buffer.read(offset))
        .ok_or(IngestError::OutOfBounds {
            ty: info.ty,
            item,
            size: info.buffer.len(),
        })
}

fn read_vertex(info: &BufferInfo, index: u32) -> Result<Vec3, IngestError> {
    read::<[f32; 3]>(info, index as usize).map(Vec3::from)
}
