use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::db::Database;
use crate::http::{get_text_with_retries, post_json};

const DEFAULT_API_URL: &str = "https://api.aniryx.app";
pub(crate) const SESSION_TOKEN_KEY: &str = "session_token";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_TIMEOUT: Duration = Duration::from_secs(6);
const ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Manager,
    Admin,
    Superadmin,
}

impl Role {
    fn parse(raw: &str) -> Self {
        match raw {
            "manager" => Self::Manager,
            "admin" => Self::Admin,
            "superadmin" => Self::Superadmin,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub email: String,
    pub role: Role,
    pub paid: bool,
}

impl Viewer {
    /// Roles allowed to see unpublished content.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager | Role::Superadmin)
    }

    /// Premium/admin entitlements are exempt from pre-roll ads.
    pub fn exempt_from_ads(&self) -> bool {
        self.paid || matches!(self.role, Role::Admin | Role::Superadmin)
    }

    pub fn can_watch(&self, premium: bool) -> bool {
        self.paid || self.role == Role::Superadmin || !premium
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRef {
    pub id: String,
    pub title: String,
    pub number: u32,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkipWindows {
    pub intro_start: f64,
    pub intro_end: f64,
    pub outro_start: f64,
    pub outro_end: f64,
}

#[derive(Debug, Clone)]
pub struct Title {
    pub id: String,
    pub title: String,
    pub description: String,
    pub premium: bool,
    pub published: bool,
    pub source_url: Option<String>,
    pub download_url: Option<String>,
    pub episodes: Vec<EpisodeRef>,
    pub skip: SkipWindows,
    pub tags: Vec<String>,
}

impl Title {
    /// Source for a given episode index; movies use the title-level URL.
    pub fn episode_source(&self, index: usize) -> Option<&str> {
        if self.episodes.is_empty() {
            self.source_url.as_deref()
        } else {
            self.episodes.get(index).map(|ep| ep.source_url.as_str())
        }
    }

    pub fn episode_label(&self, index: usize) -> String {
        match self.episodes.get(index) {
            Some(ep) => format!("{} - {}", self.title, ep.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdCreative {
    pub id: String,
    pub video_url: String,
    pub link_url: Option<String>,
    pub skippable: bool,
    pub skip_after_seconds: u32,
    pub weight: u32,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
}

pub struct ProviderClient {
    base_url: String,
    session_token: Option<String>,
}

impl ProviderClient {
    pub fn new(db: &Database) -> Self {
        let base_url = env::var("ANIRYX_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let session_token = db.get_state(SESSION_TOKEN_KEY).ok().flatten();
        Self {
            base_url,
            session_token,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = &self.session_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    pub fn fetch_catalog(&self) -> Result<Vec<Title>> {
        let url = format!("{}/v1/catalog", self.base_url);
        let raw = get_text_with_retries(
            &url,
            &self.headers(),
            &[],
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
            ATTEMPTS,
            RETRY_DELAY,
        )
        .map_err(|err| anyhow!("catalog fetch failed: {err}"))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| anyhow!("catalog parse failed: {err}"))?;
        Ok(parse_titles(&value))
    }

    /// Active campaigns, date-filtered and ranked by descending weight.
    pub fn fetch_active_ads(&self) -> Result<Vec<AdCreative>> {
        let url = format!("{}/v1/ads", self.base_url);
        let query = vec![("active".to_string(), "true".to_string())];
        let raw = get_text_with_retries(
            &url,
            &self.headers(),
            &query,
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
            ATTEMPTS,
            RETRY_DELAY,
        )
        .map_err(|err| anyhow!("ad fetch failed: {err}"))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| anyhow!("ad list parse failed: {err}"))?;
        Ok(filter_and_rank_ads(parse_ads(&value), Utc::now()))
    }

    pub fn fetch_viewer(&self) -> Result<Option<Viewer>> {
        if self.session_token.is_none() {
            return Ok(None);
        }
        let url = format!("{}/v1/me", self.base_url);
        let raw = get_text_with_retries(
            &url,
            &self.headers(),
            &[],
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
            ATTEMPTS,
            RETRY_DELAY,
        )
        .map_err(|err| anyhow!("profile fetch failed: {err}"))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| anyhow!("profile parse failed: {err}"))?;
        Ok(parse_viewer(&value))
    }

    /// View/click counters are best-effort: sent on a background thread and
    /// never allowed to delay or fail playback.
    pub fn track_ad_view(&self, ad_id: &str) {
        self.track_ad_event(ad_id, "view");
    }

    pub fn track_ad_click(&self, ad_id: &str) {
        self.track_ad_event(ad_id, "click");
    }

    fn track_ad_event(&self, ad_id: &str, kind: &str) {
        let url = format!("{}/v1/ads/{}/events", self.base_url, ad_id);
        let headers = self.headers();
        let body = serde_json::json!({ "kind": kind });
        thread::spawn(move || {
            let _ = post_json(&url, &headers, &body, CONNECT_TIMEOUT, READ_TIMEOUT);
        });
    }

    pub fn login(&self, email: &str, password: &str) -> Result<String, String> {
        let url = format!("{}/v1/auth/login", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });
        let raw = post_json(&url, &self.headers(), &body, CONNECT_TIMEOUT, READ_TIMEOUT)?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| format!("login response invalid: {err}"))?;
        value
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| "login response missing session token".to_string())
    }

    pub fn logout(&self) {
        if self.session_token.is_none() {
            return;
        }
        let url = format!("{}/v1/auth/logout", self.base_url);
        let _ = post_json(
            &url,
            &self.headers(),
            &serde_json::json!({}),
            CONNECT_TIMEOUT,
            READ_TIMEOUT,
        );
    }

    pub fn register(&self, email: &str, password: &str) -> Result<(), String> {
        let url = format!("{}/v1/auth/register", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });
        post_json(&url, &self.headers(), &body, CONNECT_TIMEOUT, READ_TIMEOUT).map(|_| ())
    }

    pub fn reset_password(&self, email: &str) -> Result<(), String> {
        let url = format!("{}/v1/auth/reset-password", self.base_url);
        let body = serde_json::json!({ "email": email });
        post_json(&url, &self.headers(), &body, CONNECT_TIMEOUT, READ_TIMEOUT).map(|_| ())
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn f64_field(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn parse_titles(value: &Value) -> Vec<Title> {
    let Some(items) = value.get("titles").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut titles = Vec::new();
    for item in items {
        let Some(id) = string_field(item, "id") else {
            continue;
        };
        let Some(name) = string_field(item, "title") else {
            continue;
        };

        let episodes = item
            .get("episodes")
            .and_then(Value::as_array)
            .map(|eps| {
                eps.iter()
                    .filter_map(|ep| {
                        Some(EpisodeRef {
                            id: string_field(ep, "id")?,
                            title: string_field(ep, "title")?,
                            number: ep.get("number").and_then(Value::as_u64).unwrap_or(0) as u32,
                            source_url: string_field(ep, "videoUrl")?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let tags = item
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        titles.push(Title {
            id,
            title: name,
            description: string_field(item, "description").unwrap_or_default(),
            premium: bool_field(item, "isPremium"),
            published: bool_field(item, "published")
                || string_field(item, "status").as_deref() == Some("published"),
            source_url: string_field(item, "videoUrl"),
            download_url: string_field(item, "downloadUrl"),
            episodes,
            skip: SkipWindows {
                intro_start: f64_field(item, "introStart"),
                intro_end: f64_field(item, "introEnd"),
                outro_start: f64_field(item, "outroStart"),
                outro_end: f64_field(item, "outroEnd"),
            },
            tags,
        });
    }
    titles
}

pub(crate) fn parse_ads(value: &Value) -> Vec<AdCreative> {
    let Some(items) = value.get("ads").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut ads = Vec::new();
    for item in items {
        let Some(id) = string_field(item, "id") else {
            continue;
        };
        let Some(video_url) = string_field(item, "videoUrl") else {
            continue;
        };
        if !bool_field(item, "active") {
            continue;
        }
        ads.push(AdCreative {
            id,
            video_url,
            link_url: string_field(item, "linkUrl"),
            skippable: bool_field(item, "isSkippable"),
            skip_after_seconds: item
                .get("skipAfter")
                .and_then(Value::as_u64)
                .unwrap_or(crate::player::sequencer::DEFAULT_AD_SKIP_SECONDS as u64)
                as u32,
            weight: item.get("frequency").and_then(Value::as_u64).unwrap_or(1) as u32,
            starts_at: string_field(item, "startDate"),
            ends_at: string_field(item, "endDate"),
        });
    }
    ads
}

fn parse_viewer(value: &Value) -> Option<Viewer> {
    let email = string_field(value, "email")?;
    let role = Role::parse(string_field(value, "role").as_deref().unwrap_or("user"));
    Some(Viewer {
        email,
        role,
        paid: bool_field(value, "paidUser"),
    })
}

/// Drop campaigns outside their date window and rank the rest high-to-low by
/// weight. Unparseable dates are treated as absent rather than excluding the
/// campaign.
pub(crate) fn filter_and_rank_ads(ads: Vec<AdCreative>, now: DateTime<Utc>) -> Vec<AdCreative> {
    let mut live: Vec<AdCreative> = ads
        .into_iter()
        .filter(|ad| {
            let started = match ad.starts_at.as_deref().and_then(parse_rfc3339) {
                Some(start) => start <= now,
                None => true,
            };
            let not_ended = match ad.ends_at.as_deref().and_then(parse_rfc3339) {
                Some(end) => end >= now,
                None => true,
            };
            started && not_ended
        })
        .collect();
    live.sort_by(|a, b| b.weight.cmp(&a.weight));
    live
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ad(id: &str, weight: u32, starts_at: Option<&str>, ends_at: Option<&str>) -> AdCreative {
        AdCreative {
            id: id.to_string(),
            video_url: format!("https://cdn.example.test/{id}.mp4"),
            link_url: None,
            skippable: true,
            skip_after_seconds: 5,
            weight,
            starts_at: starts_at.map(str::to_string),
            ends_at: ends_at.map(str::to_string),
        }
    }

    #[test]
    fn parse_titles_reads_episodes_and_skip_windows() {
        let raw = serde_json::json!({
            "titles": [{
                "id": "show-1",
                "title": "Living With Dying",
                "description": "A story.",
                "isPremium": true,
                "published": true,
                "introStart": 10.0,
                "introEnd": 90.0,
                "outroStart": 1300.0,
                "outroEnd": 1400.0,
                "tags": ["drama"],
                "episodes": [
                    { "id": "ep-1", "title": "Beginnings", "number": 1,
                      "videoUrl": "https://drive.google.com/file/d/abc123/view" }
                ]
            }]
        });

        let titles = parse_titles(&raw);
        assert_eq!(titles.len(), 1);
        let title = &titles[0];
        assert!(title.premium);
        assert_eq!(title.episodes.len(), 1);
        assert_eq!(title.episodes[0].number, 1);
        assert_eq!(title.skip.intro_end, 90.0);
        assert_eq!(
            title.episode_source(0),
            Some("https://drive.google.com/file/d/abc123/view")
        );
    }

    #[test]
    fn parse_titles_skips_malformed_entries() {
        let raw = serde_json::json!({
            "titles": [
                { "title": "No id" },
                { "id": "ok", "title": "Has both" }
            ]
        });
        let titles = parse_titles(&raw);
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].id, "ok");
    }

    #[test]
    fn parse_ads_drops_inactive_campaigns() {
        let raw = serde_json::json!({
            "ads": [
                { "id": "a", "videoUrl": "https://x.test/a.mp4", "active": true, "frequency": 3 },
                { "id": "b", "videoUrl": "https://x.test/b.mp4", "active": false, "frequency": 9 }
            ]
        });
        let ads = parse_ads(&raw);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].id, "a");
        assert_eq!(ads[0].weight, 3);
    }

    #[test]
    fn filter_and_rank_ads_sorts_by_descending_weight() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let ranked = filter_and_rank_ads(
            vec![ad("low", 5, None, None), ad("high", 20, None, None), ad("min", 1, None, None)],
            now,
        );
        let ids: Vec<&str> = ranked.iter().map(|ad| ad.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low", "min"]);
    }

    #[test]
    fn filter_and_rank_ads_applies_date_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let ranked = filter_and_rank_ads(
            vec![
                ad("future", 9, Some("2026-02-01T00:00:00Z"), None),
                ad("expired", 9, None, Some("2026-01-01T00:00:00Z")),
                ad("live", 2, Some("2026-01-01T00:00:00Z"), Some("2026-02-01T00:00:00Z")),
                ad("undated", 1, None, None),
            ],
            now,
        );
        let ids: Vec<&str> = ranked.iter().map(|ad| ad.id.as_str()).collect();
        assert_eq!(ids, vec!["live", "undated"]);
    }

    #[test]
    fn viewer_entitlements_follow_role_and_payment() {
        let free = Viewer {
            email: "a@b.test".to_string(),
            role: Role::User,
            paid: false,
        };
        assert!(!free.exempt_from_ads());
        assert!(!free.can_watch(true));
        assert!(free.can_watch(false));

        let paid = Viewer { paid: true, ..free.clone() };
        assert!(paid.exempt_from_ads());
        assert!(paid.can_watch(true));

        let manager = Viewer {
            role: Role::Manager,
            ..free.clone()
        };
        assert!(manager.is_privileged());
        assert!(!manager.exempt_from_ads());

        let superadmin = Viewer {
            role: Role::Superadmin,
            ..free
        };
        assert!(superadmin.exempt_from_ads());
        assert!(superadmin.can_watch(true));
    }
}
