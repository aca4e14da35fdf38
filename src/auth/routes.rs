//! Thin HTTP handlers over the session issuer. Marshaling only: every
//! decision lives in [`crate::auth::service::SessionService`], and failures
//! surface as stable error codes with the status mapping from
//! [`crate::auth::error::AuthError`].

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Request, State};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;

use crate::auth::guards::{AuthUser, GuardFailure};
use crate::auth::responses::{
    GoogleSignInRequest, MeResponse, RefreshRequest, SessionResponse, SignInRequest,
    SignUpRequest,
};
use crate::auth::{AuthError, AuthState};

type AuthRouteResult<T> = Result<Json<T>, status::Custom<Json<AuthErrorResponse>>>;

#[derive(Debug, serde::Serialize, serde::Deserialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub error: String,
    /// Remaining lock time, present only for `account_locked`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
}

#[openapi(tag = "Auth")]
#[post("/auth/signup", data = "<payload>")]
pub async fn sign_up(
    state: &State<AuthState>,
    payload: Json<SignUpRequest>,
) -> Result<status::Custom<Json<SessionResponse>>, status::Custom<Json<AuthErrorResponse>>> {
    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let tokens = state
        .sessions
        .sign_up(&payload.email, &payload.password, username)
        .await
        .map_err(respond_error)?;

    Ok(status::Custom(Status::Created, Json(tokens.into())))
}

#[openapi(tag = "Auth")]
#[post("/auth/signin", data = "<payload>")]
pub async fn sign_in(
    state: &State<AuthState>,
    payload: Json<SignInRequest>,
) -> AuthRouteResult<SessionResponse> {
    let tokens = state
        .sessions
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(respond_error)?;

    Ok(Json(tokens.into()))
}

#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<payload>")]
pub async fn refresh(
    state: &State<AuthState>,
    payload: Json<RefreshRequest>,
) -> AuthRouteResult<SessionResponse> {
    let tokens = state
        .sessions
        .refresh(&payload.refresh_token)
        .await
        .map_err(respond_error)?;

    Ok(Json(tokens.into()))
}

#[openapi(tag = "Auth")]
#[post("/auth/logout", data = "<payload>")]
pub async fn logout(
    state: &State<AuthState>,
    payload: Json<RefreshRequest>,
) -> Result<Status, status::Custom<Json<AuthErrorResponse>>> {
    state
        .sessions
        .logout(&payload.refresh_token)
        .await
        .map_err(respond_error)?;

    Ok(Status::NoContent)
}

#[openapi(tag = "Auth")]
#[post("/auth/google", data = "<payload>")]
pub async fn google_sign_in(
    state: &State<AuthState>,
    payload: Json<GoogleSignInRequest>,
) -> AuthRouteResult<SessionResponse> {
    let tokens = state
        .sessions
        .external_sign_in(&payload.id_token)
        .await
        .map_err(respond_error)?;

    Ok(Json(tokens.into()))
}

/// Sample protected endpoint: anything behind [`AuthUser`] sees only the
/// canonical subject id resolved by the guard.
#[openapi(tag = "Auth")]
#[get("/me")]
pub fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse { user_id: user.id })
}

/// Catcher for guard rejections. A failed request guard never reaches a
/// handler, so without this the client would see Rocket's default 401 page
/// instead of the error body every other failure carries.
#[catch(401)]
fn guard_unauthorized(request: &Request<'_>) -> Json<AuthErrorResponse> {
    let code = request
        .local_cache(GuardFailure::default)
        .0
        .unwrap_or("invalid_token");
    Json(AuthErrorResponse {
        error: code.to_string(),
        minutes: None,
    })
}

/// Catchers backing the auth guard; register alongside the route mounts.
pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![guard_unauthorized]
}

fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    let status = err.status();
    if status.code >= 500 {
        log::error!("auth operation failed: {err}");
    }

    let minutes = match &err {
        AuthError::AccountLocked { minutes } => Some(*minutes),
        _ => None,
    };

    status::Custom(
        status,
        Json(AuthErrorResponse {
            error: err.code().to_string(),
            minutes,
        }),
    )
}
