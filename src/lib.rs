#[macro_use]
extern crate log;

pub mod addr;
pub mod chip;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod network;
pub mod request;
pub mod sync;
pub mod system;
