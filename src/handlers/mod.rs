// src/handlers/mod.rs
pub mod channels;
pub mod oauth;
