//! In-memory stand-ins for every cloud port and the HE engine.
//!
//! Used by the `memory` backend to run the whole workflow in-process, and as
//! test doubles. Thread-safe via `RwLock`. Not persistent; data is lost on
//! drop.

mod functions;
mod he;
mod kms;
mod registry;
mod resources;
mod storage;

pub use functions::MemoryFunctionHost;
pub use he::MemoryHeEngine;
pub use kms::MemoryKms;
pub use registry::{MemoryRegistry, RecordingImageBuilder};
pub use resources::MemoryResourceManager;
pub use storage::MemoryStorage;
