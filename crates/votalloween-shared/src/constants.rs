/// Application name
pub const APP_NAME: &str = "VotAlloween";

/// Number of voting categories a device must fill in a single batch
pub const CATEGORY_COUNT: usize = 4;

/// Maximum accepted image size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Extra body allowance for the text fields of a multipart upload (1 MiB)
pub const MULTIPART_FORM_SLACK: usize = 1024 * 1024;

/// URL prefix under which stored images are served
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Multipart field names used by the costume upload form
pub const FIELD_IMAGE: &str = "image";
pub const FIELD_PARTICIPANT_NAME: &str = "participantName";
pub const FIELD_COSTUME_NAME: &str = "costumeName";
pub const FIELD_DEVICE_ID: &str = "deviceId";
