pub mod assets;
pub mod dashboard;
pub mod data;
pub mod focus;
pub mod monitor;
pub mod reclassify;
pub mod rules;
pub mod settings;
pub mod tags;
pub mod timeline;
