//! Built-in defaults for settings not present in config.yml.

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_SESSION_CAPACITY: u64 = 256;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBED_MODEL: &str = "embedding-001";
pub const DEFAULT_GENERATE_MODEL: &str = "gemini-1.5-flash";
