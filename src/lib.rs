pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod editor;
pub mod errors;
pub mod keyring;
pub mod launcher;
pub mod policy;
pub mod process;
pub mod store;
