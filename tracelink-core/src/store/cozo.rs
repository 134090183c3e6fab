//! CozoDB-backed record store

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cozo::{DataValue, DbInstance, NamedRows, ScriptMutability};
use tokio::sync::Mutex;
use tracing::debug;

use super::{RecordStore, offload};
use crate::error::{Result, TracelinkError};
use crate::types::{
    AttributionId, AttributionResult, ClickEvent, ClickId, ConversionEvent, ConversionId,
    FeedbackStatus, LinkId, OwnerId, PageView, Signal, TrackerId,
};

/// CozoDB schema for record tables
pub const RECORD_SCHEMA: &str = r#"
{
    :create click {
        id: String =>
        owner: String,
        link_id: String,
        ip_address: String,
        tracker_id: String?,
        clicked_at: Int
    }
}
{
    :create page_view {
        id: String =>
        owner: String,
        tracker_id: String,
        link_id: String?,
        viewed_at: Int
    }
}
{
    :create conversion {
        id: String =>
        owner: String,
        page_url: String,
        tracker_id: String?,
        link_id: String?,
        fingerprint: String?,
        ip_address: String?,
        form_json: String,
        metadata_json: String?,
        created_at: Int
    }
}
{
    :create attribution {
        id: String =>
        conversion_id: String,
        owner: String,
        click_id: String?,
        link_id: String?,
        confidence: Float,
        signals_json: String,
        elapsed_minutes: Int?,
        feedback_status: String,
        created_at: Int
    }
}
{
    ::index create click:by_link { owner, link_id, clicked_at }
}
{
    ::index create click:by_ip { owner, ip_address, clicked_at }
}
{
    ::index create page_view:by_tracker { owner, tracker_id, viewed_at }
}
"#;

const CLICK_COLUMNS: &str = "id, owner, link_id, ip_address, tracker_id, clicked_at";
const PAGE_VIEW_COLUMNS: &str = "id, owner, tracker_id, link_id, viewed_at";
const CONVERSION_COLUMNS: &str = "id, owner, page_url, tracker_id, link_id, fingerprint, \
     ip_address, form_json, metadata_json, created_at";
const ATTRIBUTION_COLUMNS: &str = "id, conversion_id, owner, click_id, link_id, confidence, \
     signals_json, elapsed_minutes, feedback_status, created_at";

// Moves the feedback status only while it still holds `$expected`; the
// check and the write share one transaction.
const FEEDBACK_CAS: &str = r#"
?[id, feedback_status] := *attribution{ id, feedback_status: current },
    id = $id, current = $expected, feedback_status = $status
:update attribution { id => feedback_status }
:returning
"#;

/// CozoDB-backed record store
///
/// Scripts run on tokio's blocking pool. Feedback updates are also
/// serialized in-process so concurrent verdicts never race at the storage
/// layer.
pub struct CozoRecordStore {
    db: Arc<DbInstance>,
    feedback_lock: Mutex<()>,
}

impl CozoRecordStore {
    /// Wrap an existing database, creating the schema when missing
    pub fn new(db: DbInstance) -> Result<Self> {
        Self::init_schema(&db)?;
        Ok(Self {
            db: Arc::new(db),
            feedback_lock: Mutex::new(()),
        })
    }

    /// Open a non-persistent database
    pub fn open_in_memory() -> Result<Self> {
        let db = DbInstance::new("mem", "", Default::default())
            .map_err(|e| TracelinkError::Database(format!("Failed to open database: {e}")))?;
        Self::new(db)
    }

    /// Open (or create) a RocksDB database at `path`
    pub fn open_rocksdb(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let db = DbInstance::new("rocksdb", path, "")
            .map_err(|e| TracelinkError::Database(format!("Failed to open database: {e}")))?;
        Self::new(db)
    }

    /// Create the record relations unless they already exist
    pub fn init_schema(db: &DbInstance) -> Result<()> {
        let relations = db
            .run_script("::relations", Default::default(), ScriptMutability::Immutable)
            .map_err(|e| TracelinkError::Database(format!("Listing relations failed: {e}")))?;
        let exists = relations
            .rows
            .iter()
            .any(|row| row.first().and_then(DataValue::get_str) == Some("attribution"));
        if exists {
            debug!("Record schema already present");
            return Ok(());
        }

        db.run_script(RECORD_SCHEMA, Default::default(), ScriptMutability::Mutable)
            .map_err(|e| TracelinkError::Database(format!("Schema init failed: {e}")))?;
        Ok(())
    }

    async fn run_script(
        &self,
        query: &str,
        params: BTreeMap<String, DataValue>,
        mutability: ScriptMutability,
    ) -> Result<NamedRows> {
        let db = Arc::clone(&self.db);
        let query = query.to_string();
        let label = match &mutability {
            ScriptMutability::Immutable => "Query",
            ScriptMutability::Mutable => "Mutation",
        };
        offload(move || {
            db.run_script(&query, params, mutability)
                .map_err(|e| TracelinkError::Database(format!("{label} failed: {e}")))
        })
        .await
    }

    async fn run_query(
        &self,
        query: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows> {
        self.run_script(query, params, ScriptMutability::Immutable).await
    }

    async fn run_mutation(
        &self,
        query: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows> {
        self.run_script(query, params, ScriptMutability::Mutable).await
    }

    async fn put_attribution(&self, result: &AttributionResult) -> Result<()> {
        let signals_json = serde_json::to_string(&result.signals)?;
        let query = format!(
            r#"?[{ATTRIBUTION_COLUMNS}] <- [[
                $id, $conversion_id, $owner, $click_id, $link_id, $confidence,
                $signals_json, $elapsed_minutes, $feedback_status, $created_at
            ]]
            :put attribution {{
                id => conversion_id, owner, click_id, link_id, confidence,
                signals_json, elapsed_minutes, feedback_status, created_at
            }}"#
        );
        let params = params([
            ("id", DataValue::from(result.id.to_string())),
            ("conversion_id", DataValue::from(result.conversion_id.to_string())),
            ("owner", DataValue::from(result.owner.as_str())),
            ("click_id", opt_value(result.click_id.map(|id| id.to_string()))),
            ("link_id", opt_value(result.link_id.as_ref().map(|l| l.as_str()))),
            ("confidence", DataValue::from(result.confidence)),
            ("signals_json", DataValue::from(signals_json)),
            ("elapsed_minutes", opt_value(result.elapsed_minutes)),
            ("feedback_status", DataValue::from(result.feedback_status.as_str())),
            ("created_at", DataValue::from(result.created_at.timestamp_millis())),
        ]);
        self.run_mutation(&query, params).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CozoRecordStore {
    async fn insert_click(&self, click: &ClickEvent) -> Result<()> {
        let query = format!(
            r#"?[{CLICK_COLUMNS}] <- [[$id, $owner, $link_id, $ip_address, $tracker_id, $clicked_at]]
            :put click {{ id => owner, link_id, ip_address, tracker_id, clicked_at }}"#
        );
        let params = params([
            ("id", DataValue::from(click.id.to_string())),
            ("owner", DataValue::from(click.owner.as_str())),
            ("link_id", DataValue::from(click.link_id.as_str())),
            ("ip_address", DataValue::from(click.ip_address.to_string())),
            ("tracker_id", opt_value(click.tracker_id.as_ref().map(|t| t.as_str()))),
            ("clicked_at", DataValue::from(click.clicked_at.timestamp_millis())),
        ]);
        self.run_mutation(&query, params).await?;
        Ok(())
    }

    async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        let query = format!(
            r#"?[{PAGE_VIEW_COLUMNS}] <- [[$id, $owner, $tracker_id, $link_id, $viewed_at]]
            :put page_view {{ id => owner, tracker_id, link_id, viewed_at }}"#
        );
        let params = params([
            ("id", DataValue::from(view.id.to_string())),
            ("owner", DataValue::from(view.owner.as_str())),
            ("tracker_id", DataValue::from(view.tracker_id.as_str())),
            ("link_id", opt_value(view.link_id.as_ref().map(|l| l.as_str()))),
            ("viewed_at", DataValue::from(view.viewed_at.timestamp_millis())),
        ]);
        self.run_mutation(&query, params).await?;
        Ok(())
    }

    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()> {
        let form_json = serde_json::to_string(&conversion.form)?;
        let metadata_json = conversion
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let query = format!(
            r#"?[{CONVERSION_COLUMNS}] <- [[
                $id, $owner, $page_url, $tracker_id, $link_id, $fingerprint,
                $ip_address, $form_json, $metadata_json, $created_at
            ]]
            :put conversion {{
                id => owner, page_url, tracker_id, link_id, fingerprint,
                ip_address, form_json, metadata_json, created_at
            }}"#
        );
        let params = params([
            ("id", DataValue::from(conversion.id.to_string())),
            ("owner", DataValue::from(conversion.owner.as_str())),
            ("page_url", DataValue::from(conversion.page_url.as_str())),
            ("tracker_id", opt_value(conversion.tracker_id.as_ref().map(|t| t.as_str()))),
            ("link_id", opt_value(conversion.link_id.as_ref().map(|l| l.as_str()))),
            ("fingerprint", opt_value(conversion.fingerprint.as_deref())),
            ("ip_address", opt_value(conversion.ip_address.map(|ip| ip.to_string()))),
            ("form_json", DataValue::from(form_json)),
            ("metadata_json", opt_value(metadata_json)),
            ("created_at", DataValue::from(conversion.created_at.timestamp_millis())),
        ]);
        self.run_mutation(&query, params).await?;
        Ok(())
    }

    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()> {
        self.put_attribution(result).await
    }

    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>> {
        let query = format!(
            r#"?[{CLICK_COLUMNS}] := *click{{ {CLICK_COLUMNS} }}, id = $id"#
        );
        let rows = self
            .run_query(&query, params([("id", DataValue::from(id.to_string()))]))
            .await?;
        rows.rows.first().map(|row| parse_click_row(row)).transpose()
    }

    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>> {
        let query = format!(
            r#"?[{CONVERSION_COLUMNS}] := *conversion{{ {CONVERSION_COLUMNS} }}, id = $id"#
        );
        let rows = self
            .run_query(&query, params([("id", DataValue::from(id.to_string()))]))
            .await?;
        rows.rows
            .first()
            .map(|row| parse_conversion_row(row))
            .transpose()
    }

    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>> {
        let query = format!(
            r#"?[{ATTRIBUTION_COLUMNS}] := *attribution{{ {ATTRIBUTION_COLUMNS} }}, id = $id"#
        );
        let rows = self
            .run_query(&query, params([("id", DataValue::from(id.to_string()))]))
            .await?;
        rows.rows
            .first()
            .map(|row| parse_attribution_row(row))
            .transpose()
    }

    async fn latest_page_view_for_tracker(
        &self,
        owner: &OwnerId,
        tracker_id: &TrackerId,
        until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        let query = format!(
            r#"?[{PAGE_VIEW_COLUMNS}] := *page_view{{ {PAGE_VIEW_COLUMNS} }},
               owner = $owner, tracker_id = $tracker_id, viewed_at <= $until
            :order -viewed_at, -id
            :limit 1"#
        );
        let params = params([
            ("owner", DataValue::from(owner.as_str())),
            ("tracker_id", DataValue::from(tracker_id.as_str())),
            ("until", DataValue::from(until.timestamp_millis())),
        ]);
        let rows = self.run_query(&query, params).await?;
        rows.rows
            .first()
            .map(|row| parse_page_view_row(row))
            .transpose()
    }

    async fn latest_click_for_link(
        &self,
        owner: &OwnerId,
        link_id: &LinkId,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        let query = format!(
            r#"?[{CLICK_COLUMNS}] := *click{{ {CLICK_COLUMNS} }},
               owner = $owner, link_id = $link_id, clicked_at <= $until
            :order -clicked_at, -id
            :limit 1"#
        );
        let params = params([
            ("owner", DataValue::from(owner.as_str())),
            ("link_id", DataValue::from(link_id.as_str())),
            ("until", DataValue::from(until.timestamp_millis())),
        ]);
        let rows = self.run_query(&query, params).await?;
        rows.rows.first().map(|row| parse_click_row(row)).transpose()
    }

    async fn latest_click_from_ip(
        &self,
        owner: &OwnerId,
        ip_address: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        let query = format!(
            r#"?[{CLICK_COLUMNS}] := *click{{ {CLICK_COLUMNS} }},
               owner = $owner, ip_address = $ip_address,
               clicked_at >= $since, clicked_at <= $until
            :order -clicked_at, -id
            :limit 1"#
        );
        let params = params([
            ("owner", DataValue::from(owner.as_str())),
            ("ip_address", DataValue::from(ip_address.to_string())),
            ("since", DataValue::from(since.timestamp_millis())),
            ("until", DataValue::from(until.timestamp_millis())),
        ]);
        let rows = self.run_query(&query, params).await?;
        rows.rows.first().map(|row| parse_click_row(row)).transpose()
    }

    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool> {
        let _guard = self.feedback_lock.lock().await;
        let params = params([
            ("id", DataValue::from(id.to_string())),
            ("expected", DataValue::from(expected.as_str())),
            ("status", DataValue::from(status.as_str())),
        ]);
        let rows = self.run_mutation(FEEDBACK_CAS, params).await?;
        let moved = !rows.rows.is_empty();
        debug!(%id, %expected, %status, moved, "Feedback compare-and-set");
        Ok(moved)
    }
}

fn params<const N: usize>(pairs: [(&str, DataValue); N]) -> BTreeMap<String, DataValue> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn opt_value<T: Into<DataValue>>(value: Option<T>) -> DataValue {
    value.map(Into::into).unwrap_or(DataValue::Null)
}

// Helper functions for parsing CozoDB rows

fn get_str<'a>(row: &'a [DataValue], idx: usize, column: &str) -> Result<&'a str> {
    row.get(idx)
        .and_then(DataValue::get_str)
        .ok_or_else(|| TracelinkError::Database(format!("Invalid {column}")))
}

fn get_opt_str(row: &[DataValue], idx: usize) -> Option<&str> {
    row.get(idx).and_then(DataValue::get_str)
}

fn get_timestamp(row: &[DataValue], idx: usize, column: &str) -> Result<DateTime<Utc>> {
    let millis = row
        .get(idx)
        .and_then(DataValue::get_int)
        .ok_or_else(|| TracelinkError::Database(format!("Invalid {column}")))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| TracelinkError::Database(format!("Invalid {column}")))
}

fn parse_uuid(value: &str) -> Result<uuid::Uuid> {
    value
        .parse()
        .map_err(|e| TracelinkError::Database(format!("Invalid UUID: {e}")))
}

fn parse_ip(value: &str) -> Result<IpAddr> {
    value
        .parse()
        .map_err(|e| TracelinkError::Database(format!("Invalid IP address: {e}")))
}

fn parse_click_row(row: &[DataValue]) -> Result<ClickEvent> {
    Ok(ClickEvent {
        id: parse_uuid(get_str(row, 0, "click id")?)?,
        owner: OwnerId::new(get_str(row, 1, "owner")?),
        link_id: LinkId::new(get_str(row, 2, "link_id")?),
        ip_address: parse_ip(get_str(row, 3, "ip_address")?)?,
        tracker_id: get_opt_str(row, 4).map(TrackerId::from),
        clicked_at: get_timestamp(row, 5, "clicked_at")?,
    })
}

fn parse_page_view_row(row: &[DataValue]) -> Result<PageView> {
    Ok(PageView {
        id: parse_uuid(get_str(row, 0, "page view id")?)?,
        owner: OwnerId::new(get_str(row, 1, "owner")?),
        tracker_id: TrackerId::new(get_str(row, 2, "tracker_id")?),
        link_id: get_opt_str(row, 3).map(LinkId::from),
        viewed_at: get_timestamp(row, 4, "viewed_at")?,
    })
}

fn parse_conversion_row(row: &[DataValue]) -> Result<ConversionEvent> {
    let metadata = get_opt_str(row, 8)
        .map(serde_json::from_str)
        .transpose()?;
    Ok(ConversionEvent {
        id: parse_uuid(get_str(row, 0, "conversion id")?)?,
        owner: OwnerId::new(get_str(row, 1, "owner")?),
        page_url: get_str(row, 2, "page_url")?.to_string(),
        tracker_id: get_opt_str(row, 3).map(TrackerId::from),
        link_id: get_opt_str(row, 4).map(LinkId::from),
        fingerprint: get_opt_str(row, 5).map(str::to_string),
        ip_address: get_opt_str(row, 6).map(parse_ip).transpose()?,
        form: serde_json::from_str(get_str(row, 7, "form_json")?)?,
        metadata,
        created_at: get_timestamp(row, 9, "created_at")?,
    })
}

fn parse_attribution_row(row: &[DataValue]) -> Result<AttributionResult> {
    let signals: BTreeSet<Signal> = serde_json::from_str(get_str(row, 6, "signals_json")?)?;
    Ok(AttributionResult {
        id: parse_uuid(get_str(row, 0, "attribution id")?)?,
        conversion_id: parse_uuid(get_str(row, 1, "conversion_id")?)?,
        owner: OwnerId::new(get_str(row, 2, "owner")?),
        click_id: get_opt_str(row, 3).map(parse_uuid).transpose()?,
        link_id: get_opt_str(row, 4).map(LinkId::from),
        confidence: row.get(5).and_then(DataValue::get_float).unwrap_or(0.0),
        signals,
        elapsed_minutes: row.get(7).and_then(DataValue::get_int),
        feedback_status: FeedbackStatus::from_str_or_unset(get_str(row, 8, "feedback_status")?),
        created_at: get_timestamp(row, 9, "created_at")?,
    })
}
