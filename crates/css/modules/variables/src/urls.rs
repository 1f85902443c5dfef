//! `url()` resolution against the base URL of the active expansion frame.
//! Spec: <https://www.w3.org/TR/css-values-4/#relative-urls>

use cssparser::serialize_string;
use log::debug;
use url::Url;

/// Append `url("<absolute>")` for `raw` resolved against `base`.
///
/// Nothing is fetched. A reference that cannot be joined is written back
/// unresolved.
pub fn write_resolved_url(base: &Url, raw: &str, out: &mut String) {
    let resolved = match base.join(raw) {
        Ok(joined) => joined.to_string(),
        Err(err) => {
            debug!("Leaving url({raw:?}) unresolved against {base}: {err}");
            raw.to_owned()
        }
    };
    out.push_str("url(");
    if serialize_string(&resolved, out).is_err() {
        out.push_str(&resolved);
    }
    out.push(')');
}
