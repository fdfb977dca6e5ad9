pub mod capture;
pub mod cli;
pub mod config;
pub mod demo;
pub mod events;
pub mod input;
pub mod logging;
pub mod render;
pub mod replay;
pub mod tracker;
