//! Filename classification.
//!
//! The ingest and download paths both dispatch on what a filename looks like.
//! The rules are suffix/prefix checks on independent axes:
//!
//! - `*.m4s` is a media segment
//! - `*.mpd` is a DASH playlist, always replaced wholesale on upload
//! - `chunk*` is temp-cached and evicted some time after its upload completes

const SEGMENT_SUFFIX: &str = ".m4s";
const PLAYLIST_SUFFIX: &str = ".mpd";
const TEMP_CACHED_PREFIX: &str = "chunk";

const SEGMENT_CONTENT_TYPE: &str = "video/mp4";
const PLAYLIST_CONTENT_TYPE: &str = "application/dash+xml";
const SEGMENT_CACHE_CONTROL: &str = "max-age=31536000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Segment,
    Playlist,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileClass {
    pub kind: FileKind,
    pub temp_cached: bool,
}

impl FileClass {
    pub fn is_segment(&self) -> bool {
        self.kind == FileKind::Segment
    }

    pub fn is_playlist(&self) -> bool {
        self.kind == FileKind::Playlist
    }

    /// Content type for downloads, if the kind has one.
    pub fn content_type(&self) -> Option<&'static str> {
        match self.kind {
            FileKind::Segment => Some(SEGMENT_CONTENT_TYPE),
            FileKind::Playlist => Some(PLAYLIST_CONTENT_TYPE),
            FileKind::Generic => None,
        }
    }

    /// Cache-Control value for downloads. Segments are immutable once named.
    pub fn cache_control(&self) -> Option<&'static str> {
        match self.kind {
            FileKind::Segment => Some(SEGMENT_CACHE_CONTROL),
            FileKind::Playlist | FileKind::Generic => None,
        }
    }
}

pub fn classify(filename: &str) -> FileClass {
    let kind = if filename.ends_with(SEGMENT_SUFFIX) {
        FileKind::Segment
    } else if filename.ends_with(PLAYLIST_SUFFIX) {
        FileKind::Playlist
    } else {
        FileKind::Generic
    };

    FileClass {
        kind,
        temp_cached: filename.starts_with(TEMP_CACHED_PREFIX),
    }
}
