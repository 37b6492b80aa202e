//! # Scaler Testing Utils
//!
//! 弹性伸缩服务各 crate 共用的测试工具。
//!
//! - **Mock Repositories**: 所有仓储接口的内存实现
//! - **In-memory Device Directory**: 按查询模板条件过滤的设备目录
//! - **Mock Lock**: 可模拟锁竞争的分布式锁
//! - **Test Data Builders**: 策略、快照、设备、查询模板构建器
//! - **Test Containers**: PostgreSQL / Redis 容器
//!
//! ```toml
//! [dev-dependencies]
//! scaler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
