//! CSS helpers for background-image correlation.

/// First `url(...)` target in a computed `background-image` value.
///
/// Accepts `url(a.png)`, `url("a.png")` and `url('a.png')`. Anything inside
/// the parentheses up to the first quote or closing paren is the target;
/// `none` and gradients without a url yield `None`.
pub fn extract_css_url(value: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = value[search_from..].find("url(") {
        let start = search_from + offset + "url(".len();
        if let Some(url) = parse_url_body(&value[start..]) {
            return Some(url);
        }
        search_from = start;
    }
    None
}

fn parse_url_body(body: &str) -> Option<&str> {
    let unquoted = body.strip_prefix(['"', '\'']).unwrap_or(body);
    let end = unquoted.find(['"', '\'', ')'])?;
    if end == 0 {
        return None;
    }

    let (url, rest) = unquoted.split_at(end);
    let rest = rest.strip_prefix(['"', '\'']).unwrap_or(rest);
    rest.starts_with(')').then_some(url)
}

/// `background-image` (or a `background` shorthand carrying a url) from an
/// inline `style` attribute.
pub fn inline_background_image(style: &str) -> Option<String> {
    let mut shorthand = None;
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        match property.as_str() {
            "background-image" => return Some(value.to_string()),
            "background" if value.contains("url(") => shorthand = Some(value.to_string()),
            _ => {}
        }
    }
    shorthand
}

/// Pixel length of an inline style property such as `width: 320px`.
pub fn inline_pixel_length(style: &str, property: &str) -> Option<u32> {
    style.split(';').find_map(|declaration| {
        let (name, value) = declaration.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case(property) {
            return None;
        }
        let value = value.trim();
        let number = value.strip_suffix("px").unwrap_or(value).trim();
        number
            .parse::<f64>()
            .ok()
            .filter(|px| px.is_finite() && *px >= 0.0)
            .map(|px| px.round() as u32)
    })
}
