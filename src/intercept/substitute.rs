//! Offline substitutes: what to serve when the network is down and the
//! cache has nothing.

use bytes::Bytes;

use crate::cache::CachedResponse;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 300">
  <rect width="400" height="300" fill="#f0f0f0"/>
  <text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle"
        font-family="sans-serif" font-size="24" fill="#666">
    Offline Image
  </text>
</svg>"##;

/// True when the Accept header admits an HTML document.
pub fn accepts_html(accept: Option<&str>) -> bool {
    accepts_type(accept, mime::TEXT, Some(mime::HTML))
}

/// True when the Accept header admits any image type.
pub fn accepts_image(accept: Option<&str>) -> bool {
    accepts_type(accept, mime::IMAGE, None)
}

fn accepts_type(accept: Option<&str>, wanted: mime::Name<'_>, subtype: Option<mime::Name<'_>>) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    accept
        .split(',')
        .filter_map(|part| part.trim().parse::<mime::Mime>().ok())
        .any(|m| m.type_() == wanted && subtype.is_none_or(|s| m.subtype() == s))
}

/// Locally generated placeholder for image requests.
pub fn placeholder_image() -> CachedResponse {
    CachedResponse::with_content_type(200, "image/svg+xml", Bytes::from_static(PLACEHOLDER_SVG.as_bytes()))
}

/// Generic failure response for anything we cannot substitute.
pub fn generic_failure() -> CachedResponse {
    CachedResponse::with_content_type(503, "text/plain", Bytes::from_static(b"Offline"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_accept_detection() {
        assert!(accepts_html(Some(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
        )));
        assert!(!accepts_html(Some("application/json")));
        assert!(!accepts_html(None));
    }

    #[test]
    fn image_accept_detection() {
        assert!(accepts_image(Some("image/avif,image/webp,*/*;q=0.8")));
        assert!(!accepts_image(Some("text/html")));
    }

    #[test]
    fn placeholder_is_an_svg() {
        let response = placeholder_image();
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers[0],
            ("content-type".to_string(), "image/svg+xml".to_string())
        );
        assert!(std::str::from_utf8(&response.body).unwrap().contains("Offline Image"));
    }

    #[test]
    fn generic_failure_is_503() {
        assert_eq!(generic_failure().status, 503);
    }
}
