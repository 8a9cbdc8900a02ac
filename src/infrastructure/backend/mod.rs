pub mod memory_backend;
pub mod seed;

pub use memory_backend::MemoryDocumentBackend;
pub use seed::load_seed_file;
