/// Upstream token sources used to authorize the cloud backends.
pub mod metadata;
