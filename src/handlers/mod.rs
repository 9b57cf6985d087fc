pub mod history;
pub mod wine;
