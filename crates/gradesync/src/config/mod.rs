//! Declared gradebook files: loading, typed schema and the `init` template.

pub mod loader;
pub mod schema;
pub mod template;

pub use loader::{find_config_file, load_config, load_config_from_str, DEFAULT_CONFIG_FILE};
pub use schema::{ChildCategory, GradebookConfig, ItemEntry, ItemSpec, SyncSettings};
pub use template::{skeleton, write_skeleton, SkeletonOptions};
