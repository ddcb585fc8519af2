pub mod health;
pub mod photos;
