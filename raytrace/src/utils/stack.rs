/// Fixed-capacity stack used when traversing the BVH.
///
/// Lives entirely on the (call) stack, so tracing a ray doesn't allocate;
/// the builder limits tree depth to [`Stack::CAPACITY`] which makes an
/// overflow impossible for trees that passed validation.
#[derive(Clone, Debug)]
pub struct Stack {
    items: [u32; Self::CAPACITY],
    len: usize,
}

impl Stack {
    pub const CAPACITY: usize = 64;

    pub fn push(&mut self, item: u32) {
        debug_assert!(self.len < Self::CAPACITY, "traversal stack overflow");

        if let Some(slot) = self.items.get_mut(self.len) {
            *slot = item;
            self.len += 1;
        }
    }

    pub fn pop(&mut self) -> Option<u32> {
        self.len = self.len.checked_sub(1)?;

        Some(self.items[self.len])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            items: [0; Self::CAPACITY],
            len: 0,
        }
    }
}
