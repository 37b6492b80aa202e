pub mod health;
pub mod maintenance;
pub mod orders;
pub mod strategies;
