pub mod codec;
pub mod storage;
pub mod store;

pub use codec::{decode, encode, CodecError, SCHEMA_VERSION};
pub use storage::{CacheStorage, FileStorage, MemoryStorage, RedisStorage, StorageError};
pub use store::{storage_key, PendingStore, Stored};
