//! Record types for clicks, page views, conversions and attribution results
//!
//! Clicks, page views and conversions are immutable once written. An
//! [`AttributionResult`] is written once by the recorder; afterwards only its
//! feedback status changes.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a recorded click
pub type ClickId = Uuid;
/// Identifier of a recorded page view
pub type PageViewId = Uuid;
/// Identifier of a recorded conversion
pub type ConversionId = Uuid;
/// Identifier of an attribution result
pub type AttributionId = Uuid;

fn new_id() -> Uuid {
    Uuid::now_v7()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a tracked link
    LinkId
);
string_id!(
    /// Tracker cookie identifier bridging page views to conversions
    TrackerId
);
string_id!(
    /// Account that owns conversions and their attribution results
    OwnerId
);

impl OwnerId {
    /// Owner used when authentication is disabled
    pub fn local() -> Self {
        Self::new("local")
    }
}

/// A recorded click on a tracked link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default = "new_id")]
    pub id: ClickId,
    /// Account whose key ingested the click; only its conversions can match it
    #[serde(default = "OwnerId::local")]
    pub owner: OwnerId,
    pub link_id: LinkId,
    pub ip_address: IpAddr,
    #[serde(default)]
    pub tracker_id: Option<TrackerId>,
    pub clicked_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(owner: impl Into<OwnerId>, link_id: impl Into<LinkId>, ip_address: IpAddr) -> Self {
        Self {
            id: new_id(),
            owner: owner.into(),
            link_id: link_id.into(),
            ip_address,
            tracker_id: None,
            clicked_at: Utc::now(),
        }
    }

    pub fn with_tracker(mut self, tracker_id: impl Into<TrackerId>) -> Self {
        self.tracker_id = Some(tracker_id.into());
        self
    }

    pub fn at(mut self, clicked_at: DateTime<Utc>) -> Self {
        self.clicked_at = clicked_at;
        self
    }
}

/// A page visit correlating a tracker cookie with a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    #[serde(default = "new_id")]
    pub id: PageViewId,
    #[serde(default = "OwnerId::local")]
    pub owner: OwnerId,
    pub tracker_id: TrackerId,
    #[serde(default)]
    pub link_id: Option<LinkId>,
    pub viewed_at: DateTime<Utc>,
}

impl PageView {
    pub fn new(
        owner: impl Into<OwnerId>,
        tracker_id: impl Into<TrackerId>,
        link_id: Option<LinkId>,
    ) -> Self {
        Self {
            id: new_id(),
            owner: owner.into(),
            tracker_id: tracker_id.into(),
            link_id,
            viewed_at: Utc::now(),
        }
    }

    pub fn at(mut self, viewed_at: DateTime<Utc>) -> Self {
        self.viewed_at = viewed_at;
        self
    }
}

/// Form fields captured alongside a conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormMetadata {
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub form_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A down-funnel action that attribution tries to explain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionEvent {
    #[serde(default = "new_id")]
    pub id: ConversionId,
    #[serde(default = "OwnerId::local")]
    pub owner: OwnerId,
    pub page_url: String,
    #[serde(default)]
    pub tracker_id: Option<TrackerId>,
    #[serde(default)]
    pub link_id: Option<LinkId>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
    #[serde(default)]
    pub form: FormMetadata,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ConversionEvent {
    pub fn new(owner: impl Into<OwnerId>, page_url: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            owner: owner.into(),
            page_url: page_url.into(),
            tracker_id: None,
            link_id: None,
            fingerprint: None,
            ip_address: None,
            form: FormMetadata::default(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_tracker(mut self, tracker_id: impl Into<TrackerId>) -> Self {
        self.tracker_id = Some(tracker_id.into());
        self
    }

    pub fn with_link(mut self, link_id: impl Into<LinkId>) -> Self {
        self.link_id = Some(link_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: IpAddr) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_form(mut self, form: FormMetadata) -> Self {
        self.form = form;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Which matching strategy produced an attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Tracker cookie bridged to a link through a page view
    TrackerIdentity,
    /// Caller named the link explicitly
    ExplicitLink,
    /// Same origin IP clicked recently
    IpFallback,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackerIdentity => "tracker_identity",
            Self::ExplicitLink => "explicit_link",
            Self::IpFallback => "ip_fallback",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human verdict on an attribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Unset,
    Confirmed,
    Rejected,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str_or_unset(s: &str) -> Self {
        match s {
            "confirmed" => Self::Confirmed,
            "rejected" => Self::Rejected,
            _ => Self::Unset,
        }
    }

    /// Confirmed and rejected never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of attributing one conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub id: AttributionId,
    pub conversion_id: ConversionId,
    pub owner: OwnerId,
    pub click_id: Option<ClickId>,
    pub link_id: Option<LinkId>,
    pub confidence: f64,
    pub signals: BTreeSet<Signal>,
    pub elapsed_minutes: Option<i64>,
    pub feedback_status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

impl AttributionResult {
    pub fn is_attributed(&self) -> bool {
        self.click_id.is_some()
    }
}
