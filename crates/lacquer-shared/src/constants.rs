/// Application name
pub const APP_NAME: &str = "Lacquer";

/// Storage key of the persisted state document
pub const STATE_STORAGE_KEY: &str = "lacquer.state.v1";

/// Remote namespace holding one room per sync key
pub const REMOTE_ROOT: &str = "rooms";

/// Remote sub-collection holding the settings document
pub const REMOTE_META: &str = "meta";

/// Document id of the settings document inside `meta`
pub const REMOTE_SETTINGS_DOC: &str = "settings";

/// Server-assigned timestamp field added to every remote document
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Default layout: two walls of eight shelves with 21 slots each
pub const DEFAULT_WALL_COUNT: u32 = 2;
pub const DEFAULT_SHELVES_PER_WALL: u32 = 8;
pub const DEFAULT_SLOTS_PER_SHELF: u32 = 21;

/// Default color theme tag
pub const DEFAULT_COLOR_THEME: &str = "vivid";

/// Manicure rating bounds
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Upper bound applied to wall, shelf and slot counts
pub const MAX_LAYOUT_COUNT: u32 = 1_000;

/// Maximum size of an embedded image in bytes (8 MiB)
pub const MAX_IMAGE_SIZE: u64 = 8 * 1024 * 1024;
