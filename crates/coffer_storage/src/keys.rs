//! Store property keys understood by the built-in backends.

pub use coffer_core::COMPRESS_PROPERTY as COMPRESS;

// Filesystem

/// Root directory of the store.
pub const BASE_NAME: &str = "base-name";
/// Filesystem driver; only the local provider (`file` or `local`) is supported.
pub const PROVIDER: &str = "provider";
/// Number of bucket directories objects are spread over.
pub const NUMBER_OF_SUBDIRECTORIES: &str = "number-of-subdirectories";
/// Prefix paths with the object's type id.
pub const USE_TYPE_IN_PATH: &str = "use-type-in-path";
/// Retained backup generations; 0 disables backups.
pub const NUMBER_OF_BACKUPS: &str = "number-of-backups";

// Content repository

/// Workspace the session logs into.
pub const WORKSPACE_NAME: &str = "workspace-name";
/// Folder under which date buckets are created.
pub const BASE_FOLDER: &str = "base-folder";
/// Whether `delete` actually removes nodes.
pub const ENABLE_DELETION: &str = "enable-deletion";
/// Repository user.
pub const USER_NAME: &str = "user-name";
/// Repository password.
pub const PASSWORD: &str = "password";
/// Name under which the repository was registered with the backend context.
pub const REPOSITORY_NAME: &str = "repository-name";

// Object storage

/// Region of the object storage service.
pub const REGION: &str = "region";
/// Endpoint URL, for S3-compatible services.
pub const ENDPOINT: &str = "endpoint";
/// Access key id.
pub const ACCESS_KEY: &str = "access-key";
/// Secret access key.
pub const SECRET_KEY: &str = "secret-key";
/// Bucket holding the objects.
pub const BUCKET_NAME: &str = "bucket-name";
