pub mod superblock;
pub mod codec;
pub mod tree;
pub mod file;
pub mod version;
pub mod error;
pub mod registry;
pub mod objects;
pub mod metadata;
pub mod topgroup;
pub mod index;
pub mod append;
pub mod read;
pub mod manifest;

pub use superblock::Superblock;
pub use codec::{CodecId, get_codec};
pub use error::{Result, StemError};
pub use file::{Mode, StemFile, WriteOptions};
pub use version::Version;
pub use registry::ObjectType;
pub use objects::{DataObject, DecodeOptions, MemMode};
pub use metadata::Metadata;
pub use topgroup::{create_container, create_topgroup, list_topgroups, resolve_topgroup, Resolved, DEFAULT_TOPGROUP};
pub use index::{count_objects, resolve_by_index, resolve_by_name, resolve_by_selector, AddressIndex, Key, Selection, Selector};
pub use append::{append, AppendItem, AppendOptions, AppendOutcome, ConflictOutcome, Overwrite};
pub use read::{read, ObjectInfo, ReadOptions, ReadOutcome, ReadRequest, Summary};
