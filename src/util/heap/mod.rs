mod arena;
mod linear_memory;

pub use self::arena::Arena;
pub use self::linear_memory::LinearMemory;
