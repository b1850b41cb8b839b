// src/models/mod.rs

pub mod achievement;
pub mod challenge;
pub mod profile;
