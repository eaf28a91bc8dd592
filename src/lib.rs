// src/lib.rs — Library root for xeerchat

pub mod attachments;
pub mod backend;
pub mod catalog;
pub mod cli;
pub mod infra;
pub mod session;
pub mod stream;
pub mod usage;
pub mod util;
pub mod view;
