//! LLM-assisted extraction placeholder.
//!
//! Reserved for sources whose listings resist the hardcoded strategies.
//! The model plumbing (`ExtractionMethod::Llm`) and settings exist; the
//! extraction itself is not implemented.

use anyhow::{bail, Result};

use super::ExtractedActivity;
use crate::config::Settings;

/// Whether LLM extraction is configured and switched on.
pub fn is_enabled(settings: &Settings) -> bool {
    settings.llm_enabled && settings.llm_api_key.is_some()
}

/// Extract activities from raw page text with an LLM.
pub fn extract_activities(_raw_text: &str) -> Result<Vec<ExtractedActivity>> {
    bail!("LLM extraction is not implemented")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unimplemented() {
        assert!(extract_activities("anything").is_err());
    }
}
