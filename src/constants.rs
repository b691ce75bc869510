// Default values for the streaming connection and list screens - these are the single source of truth for defaults

// Event stream
pub const DEFAULT_RECONNECT_DELAY_MS: u32 = 5_000;
pub const STREAM_PATH: &str = "/events/stream";
pub const EVENT_LOG_CAPACITY: usize = 50;
// Terminal generation ids remembered per store
pub const FINISHED_GENERATION_CAPACITY: usize = 64;
pub const GENERIC_CONNECTION_ERROR: &str = "Connection to the event stream was lost";

// REST requests
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 300_000; // 5 minutes, image generation can be slow

// Paginated lists
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const FILTER_ALL: &str = "all";
pub const DEFAULT_SORT: &str = "newest";
pub const MONSTERS_ITEMS_KEY: &str = "monsters";

// Status bar
pub const ACTIVITY_PREVIEW_GRAPHEMES: usize = 80;
