//! Extended M3U playlist for Tvheadend

pub mod generator;

pub use generator::PlaylistGenerator;
