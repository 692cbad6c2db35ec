//! REST client for the Tutorly API.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use tutorly_common::{GoalStatus, NotificationKind};
use tutorly_db::{
    CompleteSession, DashboardPreferences, Goal, GoalProgress, JournalEntry, JournalQuery,
    JournalUpdate, LinkCode, MoodCount, NewGoal, NewJournalEntry, NewSession, NewStep, Notification,
    NotificationPreference, ParentOverview, ProblemSession, RecommendationOutcome, SessionFilter,
    StudentOverview, TeacherOverview, User,
};

use crate::error::{ClientError, Result};
use crate::models::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed access to every REST endpoint.
///
/// `register` and `login` keep the issued token; later calls send it as a
/// bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Url(base_url));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tutorly-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url, token: None })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL for the notification stream, carrying the current token.
    pub fn notification_socket_url(&self) -> Result<String> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthorized)?;
        let bad_url = || ClientError::Url(self.base_url.clone());
        let mut url = Url::parse(&format!("{}/ws/notifications", self.base_url)).map_err(|_| bad_url())?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            _ => return Err(bad_url()),
        };
        url.set_scheme(scheme).map_err(|_| bad_url())?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }

    // ── plumbing ───────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map non-success statuses onto `ClientError`.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        debug!(status = status.as_u16(), %message, "API error");
        Err(ClientError::Api { status: status.as_u16(), message })
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = Self::check(builder.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    // ── auth ───────────────────────────────────────────────────────────────

    pub async fn register(&mut self, req: &RegisterRequest) -> Result<AuthResponse> {
        let auth: AuthResponse = self.send(self.request(Method::POST, "/api/auth/register").json(req)).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let auth: AuthResponse = self.send(self.request(Method::POST, "/api/auth/login").json(&body)).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// Revokes the token server-side and forgets it locally.
    pub async fn logout(&mut self) -> Result<()> {
        if self.token.is_none() {
            return Ok(());
        }
        let result = self.send_empty(self.request(Method::POST, "/api/auth/logout")).await;
        self.token = None;
        match result {
            Err(ClientError::Unauthorized) => Ok(()),
            other => other,
        }
    }

    pub async fn me(&self) -> Result<User> {
        self.send(self.request(Method::GET, "/api/auth/me")).await
    }

    pub async fn linked_students(&self) -> Result<Vec<User>> {
        self.send(self.request(Method::GET, "/api/auth/students")).await
    }

    /// Students only. Hand the returned code to a parent or teacher.
    pub async fn issue_link_code(&self) -> Result<LinkCode> {
        self.send(self.request(Method::POST, "/api/auth/link-codes")).await
    }

    /// Parents and teachers redeem a student's code; returns the student.
    pub async fn link_student(&self, req: &LinkRequest) -> Result<User> {
        self.send(self.request(Method::POST, "/api/auth/students").json(req)).await
    }

    // ── journal ────────────────────────────────────────────────────────────

    pub async fn journal_entries(&self, query: &JournalQuery) -> Result<Vec<JournalEntry>> {
        self.send(self.request(Method::GET, "/api/journal/entries").query(query)).await
    }

    pub async fn create_entry(&self, entry: &NewJournalEntry) -> Result<JournalEntry> {
        self.send(self.request(Method::POST, "/api/journal/entries").json(entry)).await
    }

    pub async fn journal_entry(&self, id: Uuid) -> Result<JournalEntry> {
        self.send(self.request(Method::GET, &format!("/api/journal/entries/{id}"))).await
    }

    pub async fn update_entry(&self, id: Uuid, update: &JournalUpdate) -> Result<JournalEntry> {
        self.send(self.request(Method::PUT, &format!("/api/journal/entries/{id}")).json(update)).await
    }

    pub async fn delete_entry(&self, id: Uuid) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/api/journal/entries/{id}"))).await
    }

    /// Never fails: any error yields an empty list.
    pub async fn tag_suggestions(&self, prefix: &str) -> Vec<String> {
        self.suggestions("/api/journal/tags/suggestions", prefix).await
    }

    /// Never fails: any error yields an empty list.
    pub async fn search_suggestions(&self, prefix: &str) -> Vec<String> {
        self.suggestions("/api/journal/search/suggestions", prefix).await
    }

    async fn suggestions(&self, path: &str, prefix: &str) -> Vec<String> {
        let req = self.request(Method::GET, path).query(&[("q", prefix)]);
        match self.send::<Vec<String>>(req).await {
            Ok(items) => items,
            Err(e) => {
                warn!(%path, error = %e, "suggestions unavailable");
                Vec::new()
            }
        }
    }

    pub async fn mood_summary(&self, days: i64) -> Result<Vec<MoodCount>> {
        self.send(self.request(Method::GET, "/api/journal/mood-summary").query(&[("days", days)])).await
    }

    // ── problem sessions ───────────────────────────────────────────────────

    pub async fn sessions(&self, filter: &SessionFilter) -> Result<Vec<ProblemSession>> {
        self.send(self.request(Method::GET, "/api/problems/sessions").query(filter)).await
    }

    pub async fn start_session(&self, new: &NewSession) -> Result<ProblemSession> {
        self.send(self.request(Method::POST, "/api/problems/sessions").json(new)).await
    }

    pub async fn session(&self, id: Uuid) -> Result<SessionDetail> {
        self.send(self.request(Method::GET, &format!("/api/problems/sessions/{id}"))).await
    }

    pub async fn record_step(&self, id: Uuid, step: &NewStep) -> Result<StepRecorded> {
        self.send(self.request(Method::POST, &format!("/api/problems/sessions/{id}/steps")).json(step)).await
    }

    pub async fn use_hint(&self, id: Uuid) -> Result<HintGranted> {
        self.send(self.request(Method::POST, &format!("/api/problems/sessions/{id}/hint"))).await
    }

    pub async fn complete_session(&self, id: Uuid, body: &CompleteSession) -> Result<CompletionResult> {
        self.send(self.request(Method::POST, &format!("/api/problems/sessions/{id}/complete")).json(body)).await
    }

    pub async fn abandon_session(&self, id: Uuid) -> Result<ProblemSession> {
        self.send(self.request(Method::POST, &format!("/api/problems/sessions/{id}/abandon"))).await
    }

    pub async fn recommendation(&self, subject: &str) -> Result<RecommendationOutcome> {
        self.send(self.request(Method::GET, "/api/problems/recommendation").query(&[("subject", subject)])).await
    }

    pub async fn analytics(&self, subject: Option<&str>) -> Result<SessionAnalytics> {
        let mut req = self.request(Method::GET, "/api/problems/analytics");
        if let Some(subject) = subject {
            req = req.query(&[("subject", subject)]);
        }
        self.send(req).await
    }

    // ── dashboards ─────────────────────────────────────────────────────────

    /// The caller's own overview, or a linked student's when `student_id` is given.
    pub async fn student_dashboard(&self, student_id: Option<Uuid>) -> Result<StudentOverview> {
        let mut req = self.request(Method::GET, "/api/dashboard/student");
        if let Some(id) = student_id {
            req = req.query(&[("student_id", id)]);
        }
        self.send(req).await
    }

    pub async fn teacher_dashboard(&self) -> Result<TeacherOverview> {
        self.send(self.request(Method::GET, "/api/dashboard/teacher")).await
    }

    pub async fn parent_dashboard(&self) -> Result<ParentOverview> {
        self.send(self.request(Method::GET, "/api/dashboard/parent")).await
    }

    pub async fn dashboard_layout(&self) -> Result<LayoutView> {
        self.send(self.request(Method::GET, "/api/dashboard/preferences")).await
    }

    pub async fn save_dashboard_layout(&self, layout: &Value) -> Result<DashboardPreferences> {
        let body = json!({ "layout": layout });
        self.send(self.request(Method::PUT, "/api/dashboard/preferences").json(&body)).await
    }

    // ── goals & achievements ───────────────────────────────────────────────

    pub async fn goals(&self, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        let mut req = self.request(Method::GET, "/api/goals");
        if let Some(status) = status {
            req = req.query(&[("status", status)]);
        }
        self.send(req).await
    }

    pub async fn create_goal(&self, goal: &NewGoal) -> Result<Goal> {
        self.send(self.request(Method::POST, "/api/goals").json(goal)).await
    }

    pub async fn set_goal_status(&self, id: Uuid, status: GoalStatus) -> Result<Goal> {
        let body = json!({ "status": status });
        self.send(self.request(Method::PATCH, &format!("/api/goals/{id}")).json(&body)).await
    }

    pub async fn delete_goal(&self, id: Uuid) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/api/goals/{id}"))).await
    }

    pub async fn goal_progress(&self, id: Uuid, delta: i32) -> Result<GoalProgress> {
        let body = json!({ "delta": delta });
        self.send(self.request(Method::POST, &format!("/api/goals/{id}/progress")).json(&body)).await
    }

    pub async fn achievements(&self) -> Result<AchievementsView> {
        self.send(self.request(Method::GET, "/api/achievements")).await
    }

    // ── notifications ──────────────────────────────────────────────────────

    pub async fn notifications(&self, unread_only: bool, limit: i64, offset: i64) -> Result<Vec<Notification>> {
        let req = self
            .request(Method::GET, "/api/notifications")
            .query(&[("unread_only", unread_only.to_string()), ("limit", limit.to_string()), ("offset", offset.to_string())]);
        self.send(req).await
    }

    pub async fn unread_count(&self) -> Result<i64> {
        let count: UnreadCount = self.send(self.request(Method::GET, "/api/notifications/unread-count")).await?;
        Ok(count.count)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<MarkReadResult> {
        self.send(self.request(Method::POST, &format!("/api/notifications/{id}/read"))).await
    }

    pub async fn mark_all_read(&self) -> Result<u64> {
        let result: MarkAllResult = self.send(self.request(Method::POST, "/api/notifications/read-all")).await?;
        Ok(result.updated)
    }

    pub async fn delete_notification(&self, id: Uuid) -> Result<()> {
        self.send_empty(self.request(Method::DELETE, &format!("/api/notifications/{id}"))).await
    }

    pub async fn notification_preferences(&self) -> Result<Vec<NotificationPreference>> {
        self.send(self.request(Method::GET, "/api/notifications/preferences")).await
    }

    pub async fn set_notification_preference(&self, kind: NotificationKind, enabled: bool) -> Result<Vec<NotificationPreference>> {
        let body = vec![NotificationPreference { kind, enabled }];
        self.send(self.request(Method::PUT, "/api/notifications/preferences").json(&body)).await
    }

    /// Teacher or parent message to a linked student. `None` when the
    /// student has turned these messages off.
    pub async fn send_message(&self, student_id: Uuid, message: &str) -> Result<Option<Notification>> {
        let body = json!({ "student_id": student_id, "message": message });
        self.send(self.request(Method::POST, "/api/notifications/messages").json(&body)).await
    }

    // ── system ─────────────────────────────────────────────────────────────

    /// Liveness. A degraded server answers 503 with the same body.
    pub async fn health(&self) -> Result<Health> {
        let resp = self.request(Method::GET, "/api/health").send().await?;
        Ok(resp.json::<Health>().await?)
    }
}
