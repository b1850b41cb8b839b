// src/handlers/mod.rs

pub mod answer;
pub mod daily;
pub mod profile;
