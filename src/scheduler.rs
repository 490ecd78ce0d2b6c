use chrono::{ Local, NaiveDateTime };
use log::{ info, warn };
use reqwest::Client as HttpClient;
use thiserror::Error;
use crate::auth::AuthToken;
use crate::config::ClientConfig;
use crate::models::api::{
    HealthStatus,
    ScheduleRequest,
    ScheduleResponse,
    ScheduledPost,
    ScheduledPostsResponse,
};
use crate::transport::http::{ authorize, build_http_client, failure_from_response, read_json };
use crate::transport::TransportError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Schedule time must be in the future")]
    ScheduleTimeInPast,

    #[error("There is no post waiting to be published")]
    NothingToPublish,
}

/// Client for the backend's post scheduling and health endpoints.
pub struct PostScheduler {
    http: HttpClient,
    config: ClientConfig,
    token: AuthToken,
}

impl PostScheduler {
    pub fn new(config: &ClientConfig, token: AuthToken) -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client(config)?,
            config: config.clone(),
            token,
        })
    }

    pub async fn schedule(
        &self,
        session_id: &str,
        content: &str,
        at: NaiveDateTime
    ) -> Result<ScheduledPost, SchedulerError> {
        if at <= Local::now().naive_local() {
            return Err(SchedulerError::ScheduleTimeInPast);
        }

        let body = ScheduleRequest {
            session_id: session_id.to_string(),
            post_content: content.to_string(),
            schedule_time: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        };
        let req = self.http.post(self.config.endpoint("/schedule-post")).json(&body);
        let resp = authorize(req, &self.token).await.send().await.map_err(TransportError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(failure_from_response(resp, &self.token).await.into());
        }

        let parsed: ScheduleResponse = read_json(resp).await?;
        if parsed.status != "success" {
            warn!("Scheduling rejected: {}", parsed.message);
            return Err(
                TransportError::ServerError { status: status.as_u16(), body: parsed.message }.into()
            );
        }
        info!("{}", parsed.message);
        Ok(
            parsed.scheduled_post.unwrap_or_else(|| ScheduledPost {
                content: body.post_content,
                schedule_time: body.schedule_time,
                created_at: None,
                status: Some("scheduled".to_string()),
            })
        )
    }

    pub async fn list(&self, session_id: &str) -> Result<Vec<ScheduledPost>, TransportError> {
        let url = self.config.endpoint(&format!("/scheduled-posts/{}", session_id));
        let resp = authorize(self.http.get(url), &self.token).await.send().await?;
        if !resp.status().is_success() {
            return Err(failure_from_response(resp, &self.token).await);
        }
        let parsed: ScheduledPostsResponse = read_json(resp).await?;
        Ok(parsed.posts)
    }

    pub async fn health(&self) -> Result<HealthStatus, TransportError> {
        let resp = self.http.get(self.config.endpoint("/health")).send().await?;
        if !resp.status().is_success() {
            return Err(failure_from_response(resp, &self.token).await);
        }
        read_json(resp).await
    }
}

/// Accepts `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM[:SS]` (local time) or RFC 3339.
pub fn parse_schedule_time(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}
