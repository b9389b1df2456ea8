pub mod health;
pub mod research;
