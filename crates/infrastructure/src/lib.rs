pub mod database;
pub mod device_directory;
pub mod error_handling;
pub mod lock;
pub mod observability;

pub use database::*;
pub use device_directory::HttpDeviceDirectory;
pub use lock::{
    build_lock, generate_lock_token, strategy_lock_key, sweep_lock_key, LocalDistributedLock,
    LockGuard, RedisDistributedLock,
};
pub use observability::*;
