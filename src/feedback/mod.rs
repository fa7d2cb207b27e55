//! Feedback forwarding to a GitHub issue tracker.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use ts_rs::TS;

/// Settings for the GitHub forwarder. All three environment variables must
/// be present for the feedback endpoint to be available.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub repo_owner: String,
    pub repo_name: String,
}

impl GithubConfig {
    /// Assemble from the environment, returning `None` when unconfigured.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            token: std::env::var("GITHUB_TOKEN").ok()?,
            repo_owner: std::env::var("GITHUB_REPO_OWNER").ok()?,
            repo_name: std::env::var("GITHUB_REPO_NAME").ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum FeedbackCategory {
    Bug,
    Feature,
    Improvement,
}

impl FeedbackCategory {
    fn label(&self) -> &'static str {
        match self {
            FeedbackCategory::Bug => "bug",
            FeedbackCategory::Feature => "feature",
            FeedbackCategory::Improvement => "improvement",
        }
    }
}

/// A validated feedback submission.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub title: String,
    pub description: String,
    pub category: FeedbackCategory,
}

/// Forwards feedback submissions as GitHub issues.
pub struct FeedbackForwarder {
    client: reqwest::Client,
    config: GithubConfig,
}

#[derive(Deserialize)]
struct CreatedIssue {
    number: u64,
    html_url: String,
}

impl FeedbackForwarder {
    pub fn new(config: GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Open an issue for a feedback submission, returning its URL.
    pub async fn forward(&self, feedback: &Feedback) -> anyhow::Result<String> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/issues",
            self.config.repo_owner, self.config.repo_name
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("User-Agent", "breakoutglobe-feedback")
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "title": feedback.title,
                "body": feedback.description,
                "labels": ["feedback", feedback.category.label()],
            }))
            .send()
            .await
            .context("failed to reach GitHub")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub issue creation returned {status}: {body}");
        }

        let issue: CreatedIssue = response
            .json()
            .await
            .context("failed to parse GitHub issue response")?;

        info!(
            issue = issue.number,
            category = feedback.category.label(),
            "feedback forwarded to GitHub"
        );
        Ok(issue.html_url)
    }
}
