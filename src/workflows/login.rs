use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::WorkflowContext;
use super::nav::join_url;
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::locator::LocatorCandidates;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Opaque tokens captured by the host driver, persisted verbatim on
    /// success. The engine never inspects their shape.
    #[serde(default)]
    pub session_tokens: Vec<Value>,
}

/// Caller-side validation companion; the orchestrator assumes it passed.
pub fn validate_login_request(request: &LoginRequest) -> bool {
    !request.email.trim().is_empty()
        && request.email.contains('@')
        && !request.password.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    SignedIn,
    SessionReused,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub status: LoginStatus,
    pub identity: String,
}

fn email_field() -> LocatorCandidates {
    LocatorCandidates::new(
        "email field",
        [
            "[data-testid='login-email']",
            "input[type='email']",
            "input[name='email']",
        ],
    )
}

fn password_field() -> LocatorCandidates {
    LocatorCandidates::new(
        "password field",
        [
            "[data-testid='login-password']",
            "input[type='password']",
            "input[name='password']",
        ],
    )
}

fn submit_button() -> LocatorCandidates {
    LocatorCandidates::new(
        "sign-in button",
        [
            "[data-testid='login-submit']",
            "button[type='submit']",
            "text=Sign in",
        ],
    )
}

fn authenticated_markers() -> LocatorCandidates {
    LocatorCandidates::new(
        "authenticated surface",
        [
            "[data-testid='workspace-nav']",
            ".dashboard-shell",
            "[data-testid='user-menu']",
        ],
    )
}

/// Authenticate against the target application, preferring a stored
/// session over driving the sign-in form.
pub async fn login(ctx: &WorkflowContext, request: &LoginRequest) -> Result<LoginOutcome> {
    ctx.sessions.ensure_profile_dir()?;

    if ctx.sessions.load_session().is_some() {
        ctx.log.info("stored session found; checking whether it still works");
        let dashboard = join_url(&ctx.config.base_url, "dashboard")?;
        ctx.driver.navigate(&dashboard).await?;
        let authed = ctx
            .driver
            .current_url()
            .map(|url| ctx.sessions.is_authenticated(&url))
            .unwrap_or(false);
        if authed {
            let identity = ctx
                .sessions
                .session_info()
                .identity
                .unwrap_or_else(|| request.email.clone());
            ctx.log.success(format!("existing session accepted for {identity}"));
            return Ok(LoginOutcome {
                success: true,
                status: LoginStatus::SessionReused,
                identity,
            });
        }
        ctx.log.warn("stored session no longer authenticates; signing in again");
    }

    let login_url = join_url(&ctx.config.base_url, "login")?;
    ctx.driver.navigate(&login_url).await?;

    let prober = ctx.prober();
    prober.fill(&email_field(), &request.email).await?;
    prober.fill(&password_field(), &request.password).await?;
    prober.click(&submit_button()).await?;

    if let Err(err) = ctx.driver.wait_for_navigation(None).await {
        ctx.log.warn(format!("post-login navigation not observed: {err}"));
    }

    let marker_seen = prober.wait_visible(&authenticated_markers()).await.is_ok();
    let url_authenticated = ctx
        .driver
        .current_url()
        .map(|url| ctx.sessions.is_authenticated(&url))
        .unwrap_or(false);
    if !marker_seen && !url_authenticated {
        let screenshot = ctx.driver.screenshot_on_error("login-failed").await;
        let mut err = AutomationError::fatal(
            ErrorKind::AuthFailed,
            format!("could not verify sign-in for {}", request.email),
        );
        if let Some(path) = screenshot {
            err = err.with_screenshot(path);
        }
        return Err(err);
    }

    ctx.sessions
        .save_session(request.session_tokens.clone(), Some(&request.email))?;
    ctx.log.success(format!("signed in as {}", request.email));
    Ok(LoginOutcome {
        success: true,
        status: LoginStatus::SignedIn,
        identity: request.email.clone(),
    })
}
