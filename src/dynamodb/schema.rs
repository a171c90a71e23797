//! Attribute names of a stored context record
//!
//! ```text
//! Table: smartapp (configurable)
//!
//! Primary Key:
//!   - id (String, Partition Key): "<prefix><installedAppId>", e.g. "ctx:5f6e..."
//!   - optional constant sort key (name, type and value configurable)
//!
//! Attributes:
//!   - installedAppId: String
//!   - locationId: String (optional)
//!   - locale: String (optional)
//!   - authToken: String (optional)
//!   - refreshToken: String (optional)
//!   - config: any value (optional); older records hold a JSON-encoded String
//!   - state: Map of named items; absent on records written before it existed
//! ```

pub const ATTR_INSTALLED_APP_ID: &str = "installedAppId";
pub const ATTR_LOCATION_ID: &str = "locationId";
pub const ATTR_LOCALE: &str = "locale";
pub const ATTR_AUTH_TOKEN: &str = "authToken";
pub const ATTR_REFRESH_TOKEN: &str = "refreshToken";
pub const ATTR_CONFIG: &str = "config";

/// Map holding the named items
pub const ATTR_STATE: &str = "state";

/// Every attribute written from a record field. Key attributes must not use
/// any of these names.
pub const RECORD_ATTRIBUTES: [&str; 7] = [
    ATTR_INSTALLED_APP_ID,
    ATTR_LOCATION_ID,
    ATTR_LOCALE,
    ATTR_AUTH_TOKEN,
    ATTR_REFRESH_TOKEN,
    ATTR_CONFIG,
    ATTR_STATE,
];
