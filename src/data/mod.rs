pub mod course;
pub mod lecture;
pub mod unit;
pub mod user;
pub mod whitelist;
