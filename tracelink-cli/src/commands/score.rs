//! Offline scoring of a recorded scenario
//!
//! A fixture holds the clicks and page views that were seen before a
//! conversion. They are loaded into an in-memory store and the conversion is
//! run through the same engine the server uses. Records without an `owner`
//! belong to the local account, and only records sharing the conversion's
//! owner can match it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use tracelink_core::{
    AttributionConfig, AttributionEngine, AttributionResult, ClickEvent, ConversionEvent,
    MemoryRecordStore, PageView, RecordStore,
};

use crate::config::ConfigLoader;

/// Arguments for the score command
#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// JSON fixture with `clicks`, `page_views` and a `conversion`
    pub fixture: PathBuf,
}

/// Recorded scenario to attribute
#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub clicks: Vec<ClickEvent>,
    #[serde(default)]
    pub page_views: Vec<PageView>,
    pub conversion: ConversionEvent,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid fixture {}", path.display()))
    }
}

/// Run the score command
pub async fn run(args: ScoreArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let fixture = Fixture::from_path(&args.fixture)?;

    let result = score_fixture(fixture, &config.attribution).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Attribute the fixture's conversion against its own records
pub async fn score_fixture(
    fixture: Fixture,
    config: &AttributionConfig,
) -> Result<AttributionResult> {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    for click in &fixture.clicks {
        store.insert_click(click).await?;
    }
    for view in &fixture.page_views {
        store.insert_page_view(view).await?;
    }

    let engine = AttributionEngine::new(store, config)?;
    Ok(engine.process(fixture.conversion).await?)
}
