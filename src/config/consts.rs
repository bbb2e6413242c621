/// Default fuel level for each entry into the module (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel level (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Number of slots the handle table grows by when the host free list runs dry
pub const DEFAULT_HANDLE_CHUNK: u32 = 128;
/// Largest string or byte payload copied across the boundary (16 MB)
pub const DEFAULT_MAX_TRANSFER_BYTES: usize = 16 * 1024 * 1024;
/// Cumulative decoded bytes after which the UTF-8 decoder is reinitialised
pub const DEFAULT_DECODER_RESET_THRESHOLD: u64 = 2_146_435_072;

/// Seconds to wait for the next network completion before giving up
pub const DEFAULT_NETWORK_TIMEOUT_SECONDS: u64 = 30;
/// Environment variable holding the API key passed to `configure`
pub const DEFAULT_API_KEY_ENV: &str = "VALIDATION_API_KEY";
