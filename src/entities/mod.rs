pub mod history;
pub mod user;
pub mod wine;
