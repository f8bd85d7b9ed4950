use serde_json::Value;

use super::error::StageError;
use super::stages::{
    NormalizeSettings, XMLTV_DTD, count_root_children, normalize_document, parse_document,
    serialize_document,
};
use super::stages::normalize::PROVIDER_PROGRAMME;
use crate::models::{ChannelCatalog, Metrics};

/// Documents of one conversion, filled stage by stage
///
/// Lives only for the duration of a single pipeline run.
#[derive(Debug)]
pub struct ConversionJob {
    raw: String,
    intermediate: Option<Value>,
    normalized: Option<Value>,
    output: Option<String>,
}

impl ConversionJob {
    pub fn new(raw: String) -> Self {
        Self {
            raw,
            intermediate: None,
            normalized: None,
            output: None,
        }
    }

    /// Parse the raw provider document; returns the number of provider programmes
    pub fn parse(&mut self) -> Result<usize, StageError> {
        let tree = parse_document(&self.raw)?;
        let count = count_root_children(&tree, PROVIDER_PROGRAMME);
        self.intermediate = Some(tree);
        Ok(count)
    }

    pub fn normalize(
        &mut self,
        catalog: &ChannelCatalog,
        settings: &NormalizeSettings,
    ) -> Result<Metrics, StageError> {
        let intermediate = self
            .intermediate
            .as_ref()
            .ok_or_else(|| StageError::normalize("Intermediate tree is not available"))?;
        let (normalized, metrics) = normalize_document(intermediate, catalog, settings)?;
        self.normalized = Some(normalized);
        Ok(metrics)
    }

    pub fn serialize(&mut self) -> Result<&str, StageError> {
        let normalized = self
            .normalized
            .as_ref()
            .ok_or_else(|| StageError::serialize("Normalized tree is not available"))?;
        let output = serialize_document(normalized, XMLTV_DTD)?;
        Ok(self.output.insert(output).as_str())
    }

    pub fn intermediate(&self) -> Option<&Value> {
        self.intermediate.as_ref()
    }

    pub fn normalized(&self) -> Option<&Value> {
        self.normalized.as_ref()
    }
}
