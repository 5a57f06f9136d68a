pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod executor;
pub mod jobs;
pub mod output;
pub mod repos_file;
