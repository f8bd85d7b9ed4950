/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Upstream defaults
pub const DEFAULT_UPSTREAM_URL: &str = "http://comunicacion.movistarplus.es/guiaProgramacion/exportar";
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;
pub const DEFAULT_CONNECT_TIMEOUT: &str = "10s";

// Schedule defaults: a random instant between 02:00 and 06:00 tomorrow
pub const DEFAULT_START_HOUR: u32 = 2;
pub const DEFAULT_END_HOUR: u32 = 6;
pub const DEFAULT_TIMEZONE: &str = "Europe/Madrid";

// Playlist defaults
pub const DEFAULT_PLAYLIST_PATH: &str = "./tv.m3u";
pub const DEFAULT_URI_PREFIX: &str = "http://192.168.100.1:4022/udp/";
pub const DEFAULT_PLAYLIST_TAGS: &str = "tv";

// Artifact defaults: XML(provider) -> JSON(provider) -> JSON(xmltv) -> XML(xmltv)
pub const DEFAULT_RAW_PATH: &str = "./guia.movistar-xml.xml";
pub const DEFAULT_INTERMEDIATE_PATH: &str = "./guia.movistar-xml.json";
pub const DEFAULT_NORMALIZED_PATH: &str = "./guia.movistar-xmltv.json";
pub const DEFAULT_OUTPUT_PATH: &str = "./guia.movistar-xmltv.xml";

// XMLTV defaults
pub const DEFAULT_GENERATOR_NAME: &str = "movistar-xmltv";
pub const DEFAULT_LANGUAGE: &str = "es";

// Environment variable prefix for overrides, e.g. MOVISTAR_XMLTV_SCHEDULE__START_HOUR=3
pub const ENV_PREFIX: &str = "MOVISTAR_XMLTV_";

/// Sample catalog used when the config file declares no `[[channels]]`
///
/// (number, name, provider code, multicast source)
pub const DEFAULT_CHANNELS: &[(u32, &str, &str, &str)] = &[
    (1, "La 1", "TVE", "239.0.0.1:8208"),
    (2, "La 2", "LA2", "239.0.0.2:8208"),
    (3, "Antena 3", "A3", "239.0.0.3:8208"),
    (4, "Cuatro", "CUATRO", "239.0.0.4:8208"),
    (5, "Telecinco", "T5", "239.0.0.5:8208"),
    (6, "laSexta", "SEXTA", "239.0.0.6:8208"),
];
