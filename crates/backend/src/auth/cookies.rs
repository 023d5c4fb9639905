//! Session and display cookies.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cookie::{Cookie, SameSite};
use record_types::UserDisplayData;

/// Cookie holding the signed session token.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie holding base64(JSON) display data for the frontend. Not a
/// security boundary.
pub const USER_DATA_COOKIE: &str = "user_data";

fn base(name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .secure(true)
        .same_site(SameSite::Strict)
        .build()
}

/// Cookies set on successful login.
pub fn session_cookies(
    token: &str,
    user: &UserDisplayData,
    max_age_secs: i64,
) -> Result<[Cookie<'static>; 2], serde_json::Error> {
    let encoded_user = URL_SAFE.encode(serde_json::to_vec(user)?);
    let max_age = time::Duration::seconds(max_age_secs);

    let mut token_cookie = base(TOKEN_COOKIE, token.to_string(), true);
    token_cookie.set_max_age(max_age);

    let mut user_cookie = base(USER_DATA_COOKIE, encoded_user, false);
    user_cookie.set_max_age(max_age);

    Ok([token_cookie, user_cookie])
}

/// Cookies that make the client drop both session cookies immediately.
pub fn removal_cookies() -> [Cookie<'static>; 2] {
    [TOKEN_COOKIE, USER_DATA_COOKIE].map(|name| {
        let mut cookie = base(name, String::new(), true);
        cookie.make_removal();
        cookie
    })
}

/// Append one `Set-Cookie` header per cookie.
pub fn append_set_cookies<'c>(
    headers: &mut HeaderMap,
    cookies: impl IntoIterator<Item = Cookie<'c>>,
) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Unencodable cookie {}: {}", cookie.name(), e),
        }
    }
}

/// Value of the named cookie from the request's `Cookie` headers, if
/// present and non-empty.
pub fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| Cookie::parse(pair.trim()).ok())
        .find(|cookie| cookie.name() == cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
