//! Upstream EPG sources
//!
//! [`MovistarClient`] downloads the export over HTTP; [`LocalExport`]
//! replays the saved raw artifact when running in developer mode.

pub mod local;
pub mod movistar;
pub mod traits;

pub use local::LocalExport;
pub use movistar::MovistarClient;
pub use traits::EpgFetcher;
