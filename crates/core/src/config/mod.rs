//! 弹性伸缩服务配置
//!
//! 配置加载顺序：内置默认值 → TOML配置文件 → 环境变量（前缀 `SCALER_`，层级分隔符 `__`）。
//! 每个配置段都提供 `validate()`，加载完成后统一校验。

pub mod models;

pub use models::*;
