pub mod history;
pub mod wine;

pub use history::HistoryService;
pub use wine::WineService;
