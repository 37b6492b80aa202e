//! 弹性伸缩领域实体

/// 为以文本形式持久化的枚举生成 `as_str` / `Display` / `FromStr`
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = scaler_core::ScalingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(scaler_core::ScalingError::Serialization(format!(
                        "无效的{}取值: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod device;
pub mod history;
pub mod order;
pub mod query_template;
pub mod snapshot;
pub mod strategy;

pub use device::*;
pub use history::*;
pub use order::*;
pub use query_template::*;
pub use snapshot::*;
pub use strategy::*;
