use tutera_axum::cookies::{parse_cookie, DRAFT_SESSION};
use tutera_axum::{FromRestParams, RestParams};
use tutera_core::TuteraError;

pub const SESSION_ID_HEADER: &str = "x-session-id";

const MAX_ID_LEN: usize = 64;

/// Session ids name files on disk, so only `[A-Za-z0-9-]` is accepted.
pub fn validate_session_id(id: &str) -> Result<(), TuteraError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(TuteraError::bad_request("Invalid draft session id")
            .with_errors(serde_json::json!({"session": ["must be 1-64 characters of [A-Za-z0-9-]"]})))
    }
}

/// Params for the authoring services: which draft session the call is for.
#[derive(Debug, Clone)]
pub struct DraftParams {
    pub session: String,
    /// `?keepStep=true`: leave the wizard where it is after `create`.
    pub keep_step: bool,
    pub rest: RestParams,
}

/// The draft session: the `x-session-id` header if set, else the
/// `tutera_session` cookie.
pub fn resolve_session(header: Option<&str>, cookie: Option<String>) -> Result<String, TuteraError> {
    let session = header
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or(cookie);

    let Some(session) = session else {
        return Err(TuteraError::bad_request(
            "Missing draft session; call POST /api/drafts/session first",
        ));
    };
    validate_session_id(&session)?;
    Ok(session)
}

impl FromRestParams for DraftParams {
    fn from_rest_params(rest: RestParams) -> anyhow::Result<Self> {
        let cookie = rest.header("cookie").and_then(|raw| parse_cookie(raw, DRAFT_SESSION));
        let session = resolve_session(rest.header(SESSION_ID_HEADER), cookie).map_err(TuteraError::into_anyhow)?;
        Ok(Self {
            session,
            keep_step: rest.query_flag("keepStep"),
            rest,
        })
    }
}
