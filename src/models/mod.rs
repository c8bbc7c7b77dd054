// src/models/mod.rs

pub mod placement;
pub mod question;
pub mod session;
