pub mod category;
pub mod character;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod engine;
pub mod indicator;
pub mod notification;
pub mod paths;
pub mod reminder;
pub mod store;
