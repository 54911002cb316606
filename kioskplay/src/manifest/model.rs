//! Canonical playlist types.
//!
//! Every manifest shape is normalized into these types once, at ingestion,
//! by [`super::wire`]. Nothing downstream looks at raw manifest JSON.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Reference to a cached copy of a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalRef {
    /// A file on local disk.
    File(PathBuf),
    /// An entry in an in-memory cache, keyed by filename.
    Memory(String),
}

impl LocalRef {
    /// Location string handed to an output sink.
    pub fn location(&self) -> String {
        match self {
            LocalRef::File(path) => path.display().to_string(),
            LocalRef::Memory(name) => format!("memory://{}", name),
        }
    }
}

impl fmt::Display for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}

/// What an output sink should play for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource<'a> {
    /// Play the cached copy.
    Cached(&'a LocalRef),
    /// Stream directly from the remote URL.
    Remote(&'a str),
}

impl PlaybackSource<'_> {
    /// Location string handed to an output sink.
    pub fn location(&self) -> String {
        match self {
            PlaybackSource::Cached(local) => local.location(),
            PlaybackSource::Remote(url) => (*url).to_string(),
        }
    }

    /// Whether this source is served from the local cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, PlaybackSource::Cached(_))
    }
}

/// One entry in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoDescriptor {
    /// Unique basename within a manifest.
    pub filename: String,
    /// Remote location of the bytes.
    pub source_url: String,
    /// Cached copy, set only after a verified cache write.
    pub local_ref: Option<LocalRef>,
    /// Declared or inferred content type (always `video/*`).
    pub mime_type: String,
    /// Size reported by the manifest.
    pub size_bytes: Option<u64>,
    /// Modification time reported by the manifest (unix seconds).
    pub modified_at: Option<i64>,
}

impl VideoDescriptor {
    /// Creates a descriptor with no cached copy and no provenance metadata.
    pub fn new(
        filename: impl Into<String>,
        source_url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            source_url: source_url.into(),
            local_ref: None,
            mime_type: mime_type.into(),
            size_bytes: None,
            modified_at: None,
        }
    }

    /// Returns a copy pointing at the given cached copy.
    pub fn with_local_ref(mut self, local_ref: LocalRef) -> Self {
        self.local_ref = Some(local_ref);
        self
    }

    /// The source playback should use; the cached copy always wins.
    pub fn playback_source(&self) -> PlaybackSource<'_> {
        match &self.local_ref {
            Some(local) => PlaybackSource::Cached(local),
            None => PlaybackSource::Remote(&self.source_url),
        }
    }

    /// Whether a cached copy is available.
    pub fn is_cached(&self) -> bool {
        self.local_ref.is_some()
    }
}

/// Ordered sequence of descriptors, in manifest order.
///
/// Playlists are immutable once built; the sync engine publishes them as
/// `Arc<Playlist>` snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    entries: Vec<VideoDescriptor>,
}

impl Playlist {
    /// Creates a playlist preserving the given order.
    pub fn new(entries: Vec<VideoDescriptor>) -> Self {
        Self { entries }
    }

    /// An empty playlist.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VideoDescriptor> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoDescriptor> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[VideoDescriptor] {
        &self.entries
    }

    /// Index of the entry with the given filename.
    pub fn position(&self, filename: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.filename == filename)
    }

    /// Whether an entry with the given filename exists.
    pub fn contains(&self, filename: &str) -> bool {
        self.position(filename).is_some()
    }

    /// Filenames in playlist order.
    pub fn filenames(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.filename.as_str()).collect()
    }

    /// Number of entries served from the local cache.
    pub fn cached_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_cached()).count()
    }

    /// Clamps an index into range via modulo; `None` for an empty playlist.
    pub fn wrap_index(&self, index: usize) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(index % self.entries.len())
        }
    }
}

/// Opaque token identifying a manifest's content state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestVersion(String);

impl ManifestVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Derives a token from the ordered entry list, for manifests that carry
    /// no version of their own.
    pub fn from_content(videos: &[VideoDescriptor]) -> Self {
        let mut hasher = DefaultHasher::new();
        for video in videos {
            video.filename.hash(&mut hasher);
            video.source_url.hash(&mut hasher);
            video.size_bytes.hash(&mut hasher);
            video.modified_at.hash(&mut hasher);
        }
        Self(format!("content:{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Version token declared by the server, if any.
    pub version: Option<ManifestVersion>,
    /// Accepted videos in manifest order.
    pub videos: Vec<VideoDescriptor>,
}

impl Manifest {
    /// The declared version, or one derived from the content.
    pub fn effective_version(&self) -> ManifestVersion {
        self.version
            .clone()
            .unwrap_or_else(|| ManifestVersion::from_content(&self.videos))
    }
}

/// Whether `name` is usable as a cache filename.
///
/// Rejects empty names, path separators, `.`/`..` and hidden files (the
/// cache uses dot-prefixed names for in-progress writes).
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
