pub mod card;
pub mod config;
pub mod page;
pub mod storage;
