//! Tracing target constants for structured logging.
//!
//! Filter on these with `RUST_LOG`, e.g. `flare_server::handler::images=debug`.

/// Image lookups, uploads, deletions and on-demand fetch hand-off.
pub const IMAGES: &str = "flare_server::handler::images";

/// Platform logo lookups and fallbacks.
pub const LOGOS: &str = "flare_server::handler::logos";

/// Theme, extension icon and extension data files.
pub const EXTENSIONS: &str = "flare_server::handler::extensions";

/// Curation file reads and queued writes.
pub const CURATIONS: &str = "flare_server::handler::curations";

/// Response construction for file bodies.
pub const FILES: &str = "flare_server::handler::files";

/// Control channel connections and event forwarding.
pub const CONTROL: &str = "flare_server::control";

/// Request timing.
pub const METRICS: &str = "flare_server::metrics";

/// Error recovery including middleware errors and request failures.
pub const RECOVERY_ERROR: &str = "flare_server::recovery::error";

/// Panic recovery including handler panics.
pub const RECOVERY_PANIC: &str = "flare_server::recovery::panic";
