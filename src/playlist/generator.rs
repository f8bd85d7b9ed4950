use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::models::ChannelCatalog;

/// Renders the channel catalog as an extended M3U playlist
///
/// Tvheadend reads the `tvh-*` attributes; EPG matching is disabled per
/// entry because the guide comes from the XMLTV output instead.
#[derive(Debug, Clone)]
pub struct PlaylistGenerator {
    catalog: Arc<ChannelCatalog>,
    uri_prefix: String,
    tags: String,
    path: PathBuf,
}

impl PlaylistGenerator {
    pub fn new(
        catalog: Arc<ChannelCatalog>,
        uri_prefix: impl Into<String>,
        tags: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            uri_prefix: uri_prefix.into(),
            tags: tags.into(),
            path: path.into(),
        }
    }

    /// Playlist text in catalog order; identical input gives identical output
    pub fn render(&self) -> String {
        let mut m3u = String::from("#EXTM3U\n");

        for channel in self.catalog.iter().filter(|c| c.include_in_playlist) {
            m3u.push_str(&format!(
                "#EXTINF:-1 tvh-epg=\"disable\" tvh-chnum=\"{}\" tvh-tags=\"{}\",{}\n",
                channel.number, self.tags, channel.name
            ));
            m3u.push_str(&channel.resolve_stream_uri(&self.uri_prefix));
            m3u.push('\n');
        }

        m3u
    }

    /// Render and write the playlist, replacing any previous file
    pub fn write(&self) -> AppResult<usize> {
        let m3u = self.render();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }
        std::fs::write(&self.path, &m3u).map_err(|e| AppError::io(&self.path, e))?;

        let entries = self
            .catalog
            .iter()
            .filter(|c| c.include_in_playlist)
            .count();
        debug!("Playlist is {} bytes", m3u.len());
        info!(
            "Playlist with {} channels written to {}",
            entries,
            self.path.display()
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use tempfile::TempDir;

    fn channel(number: u32, name: &str, source: &str) -> Channel {
        Channel {
            number,
            name: name.to_string(),
            epg_id: name.to_uppercase(),
            source: source.to_string(),
            stream_uri: None,
            include_in_playlist: true,
        }
    }

    fn generator(channels: Vec<Channel>, path: PathBuf) -> PlaylistGenerator {
        PlaylistGenerator::new(Arc::new(ChannelCatalog::new(channels)), "http://h/", "tv", path)
    }

    #[test]
    fn test_render_single_channel() {
        let generator = generator(
            vec![channel(1, "Canal 1", "239.0.0.1:1234")],
            PathBuf::from("tv.m3u"),
        );
        assert_eq!(
            generator.render(),
            "#EXTM3U\n#EXTINF:-1 tvh-epg=\"disable\" tvh-chnum=\"1\" tvh-tags=\"tv\",Canal 1\nhttp://h/239.0.0.1:1234\n"
        );
    }

    #[test]
    fn test_render_empty_catalog() {
        let generator = generator(Vec::new(), PathBuf::from("tv.m3u"));
        assert_eq!(generator.render(), "#EXTM3U\n");
    }

    #[test]
    fn test_render_keeps_catalog_order_and_filters() {
        let mut hidden = channel(3, "Hidden", "239.0.0.3:1234");
        hidden.include_in_playlist = false;
        let mut custom = channel(2, "Custom", "unused");
        custom.stream_uri = Some("rtp://10.0.0.2:5000".to_string());

        let generator = generator(
            vec![channel(10, "Ten", "239.0.0.10:1234"), hidden, custom],
            PathBuf::from("tv.m3u"),
        );
        let lines: Vec<String> = generator.render().lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].ends_with(",Ten"));
        assert_eq!(lines[2], "http://h/239.0.0.10:1234");
        assert!(lines[3].contains("tvh-chnum=\"2\""));
        assert_eq!(lines[4], "rtp://10.0.0.2:5000");
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lists/tv.m3u");
        let generator = generator(
            vec![channel(1, "A", "239.0.0.1:1234"), channel(2, "B", "239.0.0.2:1234")],
            path.clone(),
        );

        assert_eq!(generator.write().unwrap(), 2);
        let first = std::fs::read(&path).unwrap();
        generator.write().unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_reports_io_errors() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be
        let generator = generator(vec![channel(1, "A", "x")], dir.path().to_path_buf());
        assert!(matches!(generator.write(), Err(AppError::Io { .. })));
    }
}
