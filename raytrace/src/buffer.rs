use std::fmt;
use std::mem;
use std::sync::Arc;

use bytemuck::Pod;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferType {
    Index,
    Vertex,
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferType::Index => write!(f, "index"),
            BufferType::Vertex => write!(f, "vertex"),
        }
    }
}

/// Layout of a single buffer item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    U16,
    U32,
    Vec3U16,
    Vec3U32,
    Vec2F32,
    Vec3F32,
    Vec4F32,
}

impl Format {
    /// Size of one item, in bytes.
    pub fn size(self) -> usize {
        match self {
            Format::U16 => 2,
            Format::U32 => 4,
            Format::Vec3U16 => 6,
            Format::Vec3U32 => 12,
            Format::Vec2F32 => 8,
            Format::Vec3F32 => 12,
            Format::Vec4F32 => 16,
        }
    }
}

/// CPU-side copy of a vertex or index buffer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CpuBuffer {
    data: Vec<u8>,
}

impl CpuBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn from_pod<T>(items: &[T]) -> Self
    where
        T: Pod,
    {
        Self::new(bytemuck::cast_slice(items).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads a value at given byte offset; the offset doesn't have to be
    /// aligned.
    pub fn read<T>(&self, offset: usize) -> Option<T>
    where
        T: Pod,
    {
        let end = offset.checked_add(mem::size_of::<T>())?;
        let bytes = self.data.get(offset..end)?;

        Some(bytemuck::pod_read_unaligned(bytes))
    }
}

impl fmt::Debug for CpuBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Describes where a geometry finds its indices or vertices inside a
/// [`CpuBuffer`].
#[derive(Clone, Debug)]
pub struct BufferInfo {
    pub ty: BufferType,
    pub slot: u32,
    pub format: Format,
    pub buffer: Arc<CpuBuffer>,
    pub byte_offset: usize,

    /// Distance between consecutive items; zero means tightly packed.
    pub byte_stride: usize,

    pub item_count: usize,
}

impl BufferInfo {
    pub fn new(ty: BufferType, format: Format, buffer: Arc<CpuBuffer>) -> Self {
        let item_count = buffer.len() / format.size();

        Self {
            ty,
            slot: 0,
            format,
            buffer,
            byte_offset: 0,
            byte_stride: format.size(),
            item_count,
        }
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_byte_offset(mut self, byte_offset: usize) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    pub fn with_byte_stride(mut self, byte_stride: usize) -> Self {
        self.byte_stride = byte_stride;
        self
    }

    pub fn with_item_count(mut self, item_count: usize) -> Self {
        self.item_count = item_count;
        self
    }

    pub fn stride(&self) -> usize {
        if self.byte_stride == 0 {
            self.format.size()
        } else {
            self.byte_stride
        }
    }

    /// Returns the byte offset of given item.
    pub fn item_offset(&self, item: usize) -> Option<usize> {
        item.checked_mul(self.stride())?.checked_add(self.byte_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_unaligned() {
        let mut data = vec![0xff];

        data.extend_from_slice(&1.5f32.to_ne_bytes());
        data.extend_from_slice(&7u32.to_ne_bytes());

        let target = CpuBuffer::new(data);

        assert_eq!(Some(1.5f32), target.read(1));
        assert_eq!(Some(7u32), target.read(5));
        assert_eq!(None, target.read::<u32>(6));
        assert_eq!(None, target.read::<u32>(usize::MAX));
    }

    #[test]
    fn buffer_info() {
        let buffer = Arc::new(CpuBuffer::from_pod(&[0.0f32; 9]));
        let target =
            BufferInfo::new(BufferType::Vertex, Format::Vec3F32, buffer);

        assert_eq!(3, target.item_count);
        assert_eq!(12, target.stride());
        assert_eq!(Some(24), target.item_offset(2));

        let target = target.with_byte_stride(0).with_byte_offset(4);

        assert_eq!(12, target.stride());
        assert_eq!(Some(28), target.item_offset(2));
    }
}
