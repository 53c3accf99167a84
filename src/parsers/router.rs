//! Fallback router over parser adapters.
//!
//! Maintains one ordered adapter chain per MIME category and tries each
//! adapter in turn. Adapter failures and per-adapter timeouts advance the
//! chain; exhausting the chain surfaces the last error to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{DocParser, LayoutParser, ParseResult, ParserAdapter, ParserError, PlainTextParser};
use crate::config::PipelineSettings;

/// Routes a document to an ordered chain of adapters by MIME category.
pub struct ParserRouter {
    chains: HashMap<String, Vec<Arc<dyn ParserAdapter>>>,
    adapter_timeout: Duration,
}

impl ParserRouter {
    /// Build chains from configured adapter names.
    ///
    /// Unknown names are logged and skipped; adapters without credentials
    /// are skipped so the chain only holds engines that can run. A category
    /// that ends up empty gets the plain-text parser as a backstop.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let mut chains: HashMap<String, Vec<Arc<dyn ParserAdapter>>> = HashMap::new();

        for (category, names) in &settings.chains {
            let mut chain: Vec<Arc<dyn ParserAdapter>> = Vec::new();
            for name in names {
                let Some(adapter) = Self::create_adapter(name, settings) else {
                    warn!(category = %category, adapter = %name, "unknown parser adapter in chain");
                    continue;
                };
                if adapter.is_available() {
                    debug!(category = %category, adapter = %name, "added parser to chain");
                    chain.push(adapter);
                } else {
                    debug!(
                        category = %category,
                        adapter = %name,
                        hint = %adapter.availability_hint(),
                        "parser not available, skipping"
                    );
                }
            }
            if chain.is_empty() {
                chain.push(Arc::new(PlainTextParser::new()));
            }
            chains.insert(category.clone(), chain);
        }

        info!(categories = chains.len(), "parser router initialized");

        Self {
            chains,
            adapter_timeout: Duration::from_secs(settings.adapter_timeout_secs),
        }
    }

    /// Build a router from explicit chains, used by tests and embedders.
    pub fn with_chains(
        chains: HashMap<String, Vec<Arc<dyn ParserAdapter>>>,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            chains,
            adapter_timeout,
        }
    }

    fn create_adapter(name: &str, settings: &PipelineSettings) -> Option<Arc<dyn ParserAdapter>> {
        match name.to_lowercase().as_str() {
            "layout" => Some(Arc::new(LayoutParser::new(settings.layout_endpoint.clone()))),
            "docparse" => Some(Arc::new(DocParser::new(
                settings.docparse_endpoint.clone(),
            ))),
            "plaintext" => Some(Arc::new(PlainTextParser::new())),
            _ => None,
        }
    }

    /// Map a MIME type to its chain category.
    pub fn mime_category(mime_type: &str) -> &'static str {
        match mime_type {
            "application/pdf" => "pdf",
            m if m.contains("spreadsheet") || m.contains("excel") || m == "text/csv" => {
                "spreadsheet"
            }
            m if m.starts_with("image/") => "image",
            _ => "text",
        }
    }

    fn chain_for(&self, mime_type: &str) -> &[Arc<dyn ParserAdapter>] {
        let category = Self::mime_category(mime_type);
        self.chains
            .get(category)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// List adapter names in the chain for a MIME type, in try order.
    pub fn chain_names(&self, mime_type: &str) -> Vec<&'static str> {
        self.chain_for(mime_type).iter().map(|a| a.name()).collect()
    }

    /// All distinct adapters across chains, for availability reporting.
    pub fn all_adapters(&self) -> Vec<Arc<dyn ParserAdapter>> {
        let mut seen: Vec<Arc<dyn ParserAdapter>> = Vec::new();
        for chain in self.chains.values() {
            for adapter in chain {
                if !seen.iter().any(|a| a.name() == adapter.name()) {
                    seen.push(adapter.clone());
                }
            }
        }
        seen
    }

    /// Parse with fallback: try each adapter in the chain under the
    /// per-adapter deadline. Returns the result and the name of the adapter
    /// that produced it, or the last error once the chain is exhausted.
    pub async fn parse(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> Result<(ParseResult, String), ParserError> {
        let chain = self.chain_for(mime_type);
        let mut last_error: Option<ParserError> = None;

        for adapter in chain {
            if !adapter.supports(mime_type) {
                debug!(adapter = adapter.name(), mime = mime_type, "adapter skipped, unsupported mime");
                continue;
            }

            let attempt = tokio::time::timeout(self.adapter_timeout, adapter.parse(content, mime_type));
            match attempt.await {
                Ok(Ok(result)) => {
                    debug!(adapter = adapter.name(), "parse succeeded");
                    return Ok((result, adapter.name().to_string()));
                }
                Ok(Err(e)) => {
                    warn!(adapter = adapter.name(), error = %e, "parser failed, trying next");
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        adapter = adapter.name(),
                        timeout_secs = self.adapter_timeout.as_secs(),
                        "parser timed out, trying next"
                    );
                    last_error = Some(ParserError::Timeout {
                        parser: adapter.name().to_string(),
                        elapsed_secs: self.adapter_timeout.as_secs(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ParserError::Unavailable {
            parser: "router".to_string(),
            hint: format!("no adapter in chain supports {mime_type}"),
        }))
    }
}
