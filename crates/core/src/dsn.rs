//! Connection string helpers.

use url::Url;

/// Returns the URL with any password replaced by `***`.
///
/// Unparseable input is returned as `<invalid url>` so credentials never leak
/// into logs through a malformed string.
pub fn redact(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
