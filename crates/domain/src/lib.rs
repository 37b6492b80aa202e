pub mod entities;
pub mod repositories;
pub mod services;

pub use entities::*;
pub use repositories::*;
pub use scaler_core::{ScalingError, ScalingResult};
pub use services::*;
