//! Normalize stage: provider tree into an XMLTV-shaped tree
//!
//! Every `<pase>` of the provider export becomes exactly one `<programme>`.
//! Channels are emitted in catalog numbering order, followed by channels
//! the catalog does not know about (sorted by id).

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::parse::{ATTRIBUTES_KEY, TEXT_KEY};
use crate::models::{ChannelCatalog, Metrics};
use crate::pipeline::error::StageError;
use crate::utils::time::{format_xmltv_time, parse_provider_date, parse_provider_time, resolve_naive};

pub const PROVIDER_ROOT: &str = "export";
pub const PROVIDER_PROGRAMME: &str = "pase";

/// Fallback length of the last programme of a channel when the provider gives none
pub const DEFAULT_LAST_PROGRAMME_MINUTES: i64 = 60;

/// Longest `<duracion>` accepted, in minutes
pub const MAX_PROGRAMME_MINUTES: i64 = 24 * 60;

/// Settings that shape the normalized tree
#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    pub timezone: Tz,
    pub language: String,
    pub generator_name: String,
    pub source_url: String,
}

#[derive(Debug)]
struct ProviderProgramme {
    channel: String,
    start: DateTime<Tz>,
    title: String,
    description: Option<String>,
    category: Option<String>,
    duration_minutes: Option<i64>,
}

/// Map the intermediate tree onto the XMLTV schema
pub fn normalize_document(
    tree: &Value,
    catalog: &ChannelCatalog,
    settings: &NormalizeSettings,
) -> Result<(Value, Metrics), StageError> {
    let root = tree
        .get(PROVIDER_ROOT)
        .ok_or_else(|| StageError::normalize(format!("Missing <{PROVIDER_ROOT}> root element")))?;

    let entries: &[Value] = match root.get(PROVIDER_PROGRAMME) {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(StageError::normalize(format!(
                "<{PROVIDER_PROGRAMME}> entries are not a list"
            )));
        }
        None => &[],
    };

    let mut programmes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        programmes.push(read_programme(index, entry, settings.timezone)?);
    }

    // Group by channel, keeping each channel's programmes in start order
    let mut by_channel: HashMap<&str, Vec<&ProviderProgramme>> = HashMap::new();
    for programme in &programmes {
        by_channel
            .entry(programme.channel.as_str())
            .or_default()
            .push(programme);
    }
    for list in by_channel.values_mut() {
        list.sort_by_key(|p| p.start);
    }

    let channel_order = channel_order(&by_channel, catalog);

    let mut channel_nodes = Vec::with_capacity(channel_order.len());
    let mut programme_nodes = Vec::with_capacity(programmes.len());

    for channel_id in &channel_order {
        let display_name = match catalog.find_by_epg_id(channel_id) {
            Some(channel) => channel.name.clone(),
            None => channel_id.to_string(),
        };
        channel_nodes.push(json!({
            "$": { "id": channel_id },
            "display-name": [ localized(&display_name, &settings.language) ],
        }));

        let list = by_channel.get(channel_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        for (position, programme) in list.iter().enumerate() {
            let stop = stop_time(programme, list.get(position + 1).copied())?;
            programme_nodes.push(programme_node(programme, &stop, &settings.language));
        }
    }

    let metrics = Metrics {
        channel_count: channel_nodes.len(),
        programme_count: programme_nodes.len(),
    };
    debug!(
        "Normalized {} channels and {} programmes",
        metrics.channel_count, metrics.programme_count
    );

    let mut tv = Map::new();
    tv.insert(
        ATTRIBUTES_KEY.to_string(),
        json!({
            "generator-info-name": settings.generator_name,
            "source-info-url": settings.source_url,
            "source-info-name": "Movistar+",
        }),
    );
    tv.insert("channel".to_string(), Value::Array(channel_nodes));
    tv.insert("programme".to_string(), Value::Array(programme_nodes));

    let mut document = Map::new();
    document.insert("tv".to_string(), Value::Object(tv));
    Ok((Value::Object(document), metrics))
}

fn channel_order(
    by_channel: &HashMap<&str, Vec<&ProviderProgramme>>,
    catalog: &ChannelCatalog,
) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(by_channel.len());
    for channel in catalog.by_number() {
        if by_channel.contains_key(channel.epg_id.as_str()) && !order.contains(&channel.epg_id) {
            order.push(channel.epg_id.clone());
        }
    }

    let mut unknown: Vec<&str> = by_channel
        .keys()
        .copied()
        .filter(|id| catalog.find_by_epg_id(id).is_none())
        .collect();
    unknown.sort_unstable();
    if !unknown.is_empty() {
        warn!(
            "{} channel(s) in the EPG are not in the catalog: {}",
            unknown.len(),
            unknown.join(", ")
        );
    }
    order.extend(unknown.into_iter().map(str::to_string));
    order
}

fn read_programme(index: usize, entry: &Value, tz: Tz) -> Result<ProviderProgramme, StageError> {
    let attributes = entry.get(ATTRIBUTES_KEY);
    let attribute = |name: &str| {
        attributes
            .and_then(|a| a.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let missing =
        |field: &str| StageError::normalize(format!("{PROVIDER_PROGRAMME} #{index}: missing required field '{field}'"));

    let channel = attribute("cadena").ok_or_else(|| missing("cadena"))?;
    let date_text = attribute("fecha").ok_or_else(|| missing("fecha"))?;
    let time_text = child_text(entry, "hora").ok_or_else(|| missing("hora"))?;
    let title = child_text(entry, "titulo").ok_or_else(|| missing("titulo"))?;

    let date = parse_provider_date(date_text).ok_or_else(|| {
        StageError::normalize(format!("{PROVIDER_PROGRAMME} #{index}: invalid date '{date_text}'"))
    })?;
    let time = parse_provider_time(&time_text).ok_or_else(|| {
        StageError::normalize(format!("{PROVIDER_PROGRAMME} #{index}: invalid time '{time_text}'"))
    })?;

    let duration_minutes = match child_text(entry, "duracion") {
        Some(text) => Some(
            text.parse::<i64>()
                .ok()
                .filter(|m| (1..=MAX_PROGRAMME_MINUTES).contains(m))
                .ok_or_else(|| {
                    StageError::normalize(format!(
                        "{PROVIDER_PROGRAMME} #{index}: invalid duration '{text}'"
                    ))
                })?,
        ),
        None => None,
    };

    Ok(ProviderProgramme {
        channel: channel.to_string(),
        start: resolve_naive(tz, date.and_time(time)),
        title,
        description: child_text(entry, "descripcion_corta"),
        category: child_text(entry, "tipo"),
        duration_minutes,
    })
}

/// First text value of a child element, whether collapsed or under `"_"`
fn child_text(entry: &Value, name: &str) -> Option<String> {
    let first = entry.get(name)?.as_array()?.first()?;
    let text = match first {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get(TEXT_KEY)?.as_str()?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn stop_time(
    programme: &ProviderProgramme,
    next: Option<&ProviderProgramme>,
) -> Result<DateTime<Tz>, StageError> {
    if let Some(next) = next {
        if next.start > programme.start {
            return Ok(next.start);
        }
    }
    let minutes = programme
        .duration_minutes
        .unwrap_or(DEFAULT_LAST_PROGRAMME_MINUTES);
    TimeDelta::try_minutes(minutes)
        .and_then(|length| programme.start.checked_add_signed(length))
        .ok_or_else(|| {
            StageError::normalize(format!(
                "{} at {}: stop time out of range",
                programme.channel, programme.start
            ))
        })
}

fn localized(text: &str, language: &str) -> Value {
    json!({ "$": { "lang": language }, "_": text })
}

fn programme_node(programme: &ProviderProgramme, stop: &DateTime<Tz>, language: &str) -> Value {
    let mut node = Map::new();
    node.insert(
        ATTRIBUTES_KEY.to_string(),
        json!({
            "start": format_xmltv_time(&programme.start),
            "stop": format_xmltv_time(stop),
            "channel": programme.channel,
        }),
    );
    node.insert("title".to_string(), json!([localized(&programme.title, language)]));
    if let Some(description) = &programme.description {
        node.insert("desc".to_string(), json!([localized(description, language)]));
    }
    if let Some(category) = &programme.category {
        node.insert("category".to_string(), json!([localized(category, language)]));
    }
    Value::Object(node)
}
