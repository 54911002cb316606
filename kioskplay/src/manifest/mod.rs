//! Remote manifest model and retrieval.
//!
//! - [`model`]: canonical `VideoDescriptor`, `Playlist` and `ManifestVersion`
//! - [`wire`]: normalization of every manifest shape seen in the field
//! - [`source`]: the `ManifestSource` trait and its HTTP implementation

mod error;
mod model;
mod source;
mod wire;

pub use error::{ManifestError, ManifestResult};
pub use model::{
    is_valid_filename, LocalRef, Manifest, ManifestVersion, PlaybackSource, Playlist,
    VideoDescriptor,
};
pub use source::{HttpManifestSource, ManifestSource};
pub use wire::{infer_mime_type, parse_manifest};
