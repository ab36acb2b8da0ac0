mod axis;
mod bounding_box;
mod stack;

pub use self::axis::*;
pub use self::bounding_box::*;
pub use self::stack::*;
