//! Media resolution, format selection and fetching

pub mod catalog;
pub mod error;
pub mod estimate;
pub mod fetcher;
pub mod mux;
pub mod platform;
pub mod progress;
pub mod temp;
pub mod ytdlp;

// Re-exports for convenience
pub use error::DownloadError;
pub use fetcher::{FetcherSettings, MediaFetcher};
pub use mux::{FfmpegMuxer, Muxer};
pub use platform::{MediaKind, MediaSource, Playlist, PlaylistEntry, RawEncoding, VideoPlatform};
pub use temp::TempFile;
pub use ytdlp::YtDlpPlatform;
