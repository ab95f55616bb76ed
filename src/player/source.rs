/// Catalog entries reference hosted files by share link. The native backend
/// needs the raw download URL while the embedded fallback wants the preview
/// page, so both are derived from the same share id.

pub(crate) fn extract_share_id(url: &str) -> Option<String> {
    if !url.contains("drive.google.com") {
        return None;
    }

    if let Some(start) = url.find("/d/") {
        let rest = &url[start + 3..];
        let end = rest
            .find(|c| c == '/' || c == '?' || c == '#')
            .unwrap_or(rest.len());
        if end > 0 {
            return Some(rest[..end].to_string());
        }
    }

    if let Some(query_start) = url.find('?') {
        for pair in url[query_start + 1..].split('&') {
            if let Some(id) = pair.strip_prefix("id=") {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }

    None
}

/// URL handed to the native backend. Non-share links pass through untouched.
pub(crate) fn direct_stream_url(url: &str) -> String {
    match extract_share_id(url) {
        Some(id) => format!("https://drive.google.com/uc?export=download&id={id}"),
        None => url.to_string(),
    }
}

/// URL opened in the browser when native playback fails.
pub(crate) fn preview_embed_url(url: &str) -> String {
    match extract_share_id(url) {
        Some(id) => format!("https://drive.google.com/file/d/{id}/preview"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_file_path_shape() {
        assert_eq!(
            extract_share_id("https://drive.google.com/file/d/1AbC_dEf-9/view?usp=sharing")
                .as_deref(),
            Some("1AbC_dEf-9")
        );
        assert_eq!(
            extract_share_id("https://drive.google.com/file/d/xyz").as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn extracts_id_from_query_shape() {
        assert_eq!(
            extract_share_id("https://drive.google.com/open?id=42abc&authuser=0").as_deref(),
            Some("42abc")
        );
        assert_eq!(
            extract_share_id("https://drive.google.com/uc?export=download&id=qq1").as_deref(),
            Some("qq1")
        );
    }

    #[test]
    fn foreign_hosts_and_empty_ids_yield_none() {
        assert!(extract_share_id("https://cdn.example.test/v/abc.mp4").is_none());
        assert!(extract_share_id("https://drive.google.com/file/d//view").is_none());
        assert!(extract_share_id("https://drive.google.com/open?id=").is_none());
    }

    #[test]
    fn direct_and_preview_urls_share_the_same_id() {
        let share = "https://drive.google.com/file/d/media1/view";
        assert_eq!(
            direct_stream_url(share),
            "https://drive.google.com/uc?export=download&id=media1"
        );
        assert_eq!(
            preview_embed_url(share),
            "https://drive.google.com/file/d/media1/preview"
        );
    }

    #[test]
    fn non_share_urls_pass_through() {
        let raw = "https://cdn.example.test/stream.m3u8";
        assert_eq!(direct_stream_url(raw), raw);
        assert_eq!(preview_embed_url(raw), raw);
    }
}
