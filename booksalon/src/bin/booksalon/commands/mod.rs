pub mod books;
pub mod config;
pub mod forums;
pub mod jobs;
pub mod stats;
