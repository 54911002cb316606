//! Local video storage.
//!
//! ```text
//! ┌────────────┐  save/verify   ┌──────────────────────┐
//! │ SyncEngine │ ─────────────► │ dyn LocalCache       │
//! └────────────┘                │  ├─ DiskCache        │
//!                               │  └─ MemoryCache      │
//!                               └──────────────────────┘
//! ```
//!
//! The engine only ever talks to [`LocalCache`]; the CLI picks the backend
//! (disk for `run`/`sync`, memory for dry runs).

mod disk;
mod memory;
pub(crate) mod probe;
mod traits;

pub use disk::DiskCache;
pub use memory::{MemoryCache, DEFAULT_MEMORY_CAPACITY_BYTES};
pub use probe::{detect, Container, PROBE_LEN};
pub use traits::{CacheError, CacheResult, CacheUsage, CachedVideo, LocalCache};
