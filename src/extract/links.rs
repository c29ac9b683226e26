/// Protocol-relative links (`//host/path`) become `https://host/path`.
pub fn normalize_link(href: &str) -> String {
    let href = href.trim();
    match href.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => href.to_string(),
    }
}

pub fn extract_domain(url: &str) -> String {
    url.split("//")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .trim_start_matches("www.")
        .to_lowercase()
}

/// Social and profile hosts, never a product's own website.
pub fn classify_domain(domain: &str) -> Option<&'static str> {
    match domain {
        d if d.ends_with("linkedin.com") => Some("linkedin"),
        d if d.ends_with("twitter.com") || d == "x.com" => Some("twitter"),
        d if d.ends_with("facebook.com") => Some("facebook"),
        d if d.ends_with("crunchbase.com") => Some("crunchbase"),
        d if d.ends_with("github.com") => Some("github"),
        d if d.ends_with("glassdoor.com") => Some("glassdoor"),
        d if d.ends_with("youtube.com") => Some("youtube"),
        d if d.ends_with("instagram.com") => Some("instagram"),
        _ => None,
    }
}

/// An absolute link that is neither on `listing_domain` nor a social profile.
pub fn is_external_website(url: &str, listing_domain: &str) -> bool {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return false;
    }
    let domain = extract_domain(url);
    !domain.is_empty() && !domain.ends_with(listing_domain) && classify_domain(&domain).is_none()
}
