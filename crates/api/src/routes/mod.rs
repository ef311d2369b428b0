pub mod health;
pub mod invoke;
pub mod sql;
