pub mod config;
pub mod detection;
pub mod detector;
pub mod geometry;
pub mod input;
pub mod menu;
pub mod presentation;
pub mod region_mask;
pub mod target_selector;
pub mod track;
pub mod tracker;
