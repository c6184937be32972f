//! Collaborator contracts consumed by the core pipeline.
//!
//! SLA checking, answer retrieval, ticket classification, and the
//! external ticketing system all live behind these traits. The core
//! treats every one of them as fallible and slow: failures are
//! absorbed into defaulted results at the call site, and no call is
//! made while holding a lane or timeline mutex.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use desk_common::ticket::{Ticket, DEFAULT_CATEGORY};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TrackerConfig;

// ============================================================================
// Contracts
// ============================================================================

/// SLA coverage verdict for a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaResult {
    pub covered: bool,
    pub explanation: String,
    #[serde(default)]
    pub relevant_section: Option<String>,
}

impl SlaResult {
    /// Defensive default used when the checker fails.
    pub fn not_covered(explanation: &str) -> Self {
        Self {
            covered: false,
            explanation: explanation.to_string(),
            relevant_section: None,
        }
    }
}

/// Result of an answer lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    /// "found" or "not_found"
    pub status: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl LookupResult {
    pub fn not_found() -> Self {
        Self {
            status: "not_found".to_string(),
            answer: None,
            sources: Vec::new(),
        }
    }
}

/// SLA checker collaborator.
#[async_trait]
pub trait SlaCheck: Send + Sync {
    async fn check(&self, ticket: &Ticket) -> Result<SlaResult>;
}

/// Answer retrieval collaborator.
#[async_trait]
pub trait AnswerLookup: Send + Sync {
    async fn lookup(&self, text: &str, k: usize) -> Result<LookupResult>;
}

/// Ticket classification collaborator. Implementations may return
/// anything; the assignment engine normalizes to the fixed set.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, ticket: &Ticket) -> Result<String>;
}

/// External ticketing system. Best-effort: failures are logged by the
/// caller and never roll back local state.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, ticket: &Ticket) -> Result<String>;
    async fn assign_issue(&self, issue_key: &str, account_id: &str) -> Result<bool>;
}

// ============================================================================
// HTTP SLA checker
// ============================================================================

/// SLA checker over HTTP. Posts the ticket text, expects an
/// [`SlaResult`] JSON body.
pub struct HttpSlaChecker {
    client: reqwest::Client,
    url: String,
}

impl HttpSlaChecker {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building SLA checker client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SlaCheck for HttpSlaChecker {
    async fn check(&self, ticket: &Ticket) -> Result<SlaResult> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "title": ticket.title,
                "description": ticket.description,
            }))
            .send()
            .await?
            .error_for_status()?;

        let result: SlaResult = response.json().await?;
        Ok(result)
    }
}

/// Checker used when no SLA endpoint is configured: nothing is
/// covered, so every ticket terminates at the SLA stage.
pub struct DisabledSlaChecker;

#[async_trait]
impl SlaCheck for DisabledSlaChecker {
    async fn check(&self, _ticket: &Ticket) -> Result<SlaResult> {
        Ok(SlaResult::not_covered("no SLA checker configured"))
    }
}

// ============================================================================
// HTTP answer retrieval
// ============================================================================

/// Retrieval client over HTTP. Posts `{text, k}`, expects a
/// [`LookupResult`] JSON body.
pub struct HttpAnswerLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpAnswerLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building retrieval client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AnswerLookup for HttpAnswerLookup {
    async fn lookup(&self, text: &str, k: usize) -> Result<LookupResult> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text, "k": k }))
            .send()
            .await?
            .error_for_status()?;

        let result: LookupResult = response.json().await?;
        Ok(result)
    }
}

/// Lookup used when no retrieval endpoint is configured.
pub struct DisabledAnswerLookup;

#[async_trait]
impl AnswerLookup for DisabledAnswerLookup {
    async fn lookup(&self, _text: &str, _k: usize) -> Result<LookupResult> {
        Ok(LookupResult::not_found())
    }
}

// ============================================================================
// Keyword classifier
// ============================================================================

/// Deterministic in-process classifier: scores each category by
/// keyword hits over the ticket text and picks the best match,
/// falling back to the catch-all when nothing matches.
pub struct KeywordClassifier;

const CATEGORY_KEYWORDS: [(&str, &[&str]); 11] = [
    (
        "Network & Connectivity Support",
        &["network", "wifi", "internet", "dns", "ethernet", "connectivity", "lan", "switch"],
    ),
    (
        "Email & Collaboration Tools Support",
        &["email", "outlook", "mailbox", "calendar", "teams", "slack", "collaboration"],
    ),
    (
        "Hardware Maintenance & Repair",
        &["hardware", "laptop", "screen", "keyboard", "battery", "motherboard", "repair"],
    ),
    (
        "Software Installation & Configuration",
        &["install", "installation", "software", "configure", "configuration", "upgrade"],
    ),
    (
        "Security & Malware Response",
        &["malware", "virus", "phishing", "ransomware", "security", "breach", "suspicious"],
    ),
    (
        "Access Control & Permissions",
        &["access", "permission", "denied", "authorization", "group policy", "admin rights"],
    ),
    (
        "VPN & Remote Access Support",
        &["vpn", "remote access", "remote desktop", "rdp", "tunnel"],
    ),
    (
        "Printer & Peripheral Support",
        &["printer", "print", "scanner", "peripheral", "toner", "usb device"],
    ),
    (
        "Account & Password Management",
        &["password", "account locked", "reset", "login", "credentials", "mfa"],
    ),
    (
        "Application Performance Troubleshooting",
        &["slow", "crash", "freezing", "performance", "hangs", "unresponsive"],
    ),
    (
        "New User Onboarding",
        &["onboarding", "new hire", "new user", "new employee", "provisioning"],
    ),
];

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, ticket: &Ticket) -> Result<String> {
        let text = ticket.text().to_lowercase();

        let mut best = DEFAULT_CATEGORY;
        let mut best_count = 0;
        for (category, keywords) in CATEGORY_KEYWORDS {
            let count = keywords.iter().filter(|kw| text.contains(*kw)).count();
            if count > best_count {
                best_count = count;
                best = category;
            }
        }

        info!("Classified ticket {} as: {}", ticket.ticket_id, best);
        Ok(best.to_string())
    }
}

// ============================================================================
// External ticketing system
// ============================================================================

/// Jira-style tracker client. `create_issue` posts a new issue under
/// the configured project; `assign_issue` sets the assignee by
/// external account id.
pub struct JiraTracker {
    client: reqwest::Client,
    config: TrackerConfig,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraTracker {
    pub fn new(config: TrackerConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building tracker client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IssueTracker for JiraTracker {
    async fn create_issue(&self, ticket: &Ticket) -> Result<String> {
        let url = format!("{}/rest/api/3/issue", self.config.base_url);
        let description = if ticket.description.is_empty() {
            "No description provided."
        } else {
            &ticket.description
        };

        let payload = json!({
            "fields": {
                "project": { "key": self.config.project_key },
                "summary": ticket.title,
                "description": {
                    "type": "doc",
                    "version": 1,
                    "content": [{
                        "type": "paragraph",
                        "content": [{ "type": "text", "text": description }]
                    }]
                },
                "issuetype": { "name": "Task" },
                "priority": { "name": capitalize(ticket.priority.as_str()) },
            }
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let created: CreatedIssue = response.json().await?;
        info!(
            "Created external issue {} for ticket '{}'",
            created.key, ticket.title
        );
        Ok(created.key)
    }

    async fn assign_issue(&self, issue_key: &str, account_id: &str) -> Result<bool> {
        let url = format!(
            "{}/rest/api/3/issue/{}/assignee",
            self.config.base_url, issue_key
        );

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .json(&json!({ "accountId": account_id }))
            .send()
            .await?;

        if response.status().is_success() {
            info!("Assigned external issue {} to account {}", issue_key, account_id);
            Ok(true)
        } else {
            warn!(
                "Failed to assign external issue {}: {}",
                issue_key,
                response.status()
            );
            Ok(false)
        }
    }
}

/// Tracker used when no tracker section is configured; assignment
/// stays local-only.
pub struct DisabledTracker;

#[async_trait]
impl IssueTracker for DisabledTracker {
    async fn create_issue(&self, _ticket: &Ticket) -> Result<String> {
        Err(anyhow!("external tracker not configured"))
    }

    async fn assign_issue(&self, _issue_key: &str, _account_id: &str) -> Result<bool> {
        Err(anyhow!("external tracker not configured"))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
