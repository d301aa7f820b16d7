use url::Url;

use crate::crawler::models::{ElementRecord, PageRecord};

/// Turn arbitrary text into a snake_case Python identifier.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let prefixed = match replaced.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => replaced,
        _ => format!("page_{}", replaced),
    };

    // camelCase -> camel_Case, before lowercasing
    let mut snake = String::with_capacity(prefixed.len() + 4);
    let mut prev: Option<char> = None;
    for c in prefixed.chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            snake.push('_');
        }
        snake.push(c.to_ascii_lowercase());
        prev = Some(c);
    }

    let mut collapsed = String::with_capacity(snake.len());
    for c in snake.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('_').to_string()
}

/// Class name for a page: title, else the last path segment, else
/// `HomePage`. A source with no ASCII letters or digits is skipped. Always
/// starts with a letter and ends in `Page`.
pub fn page_object_name(page: &PageRecord) -> String {
    let segment = Url::parse(page.url()).ok().and_then(|url| {
        url.path()
            .split('/')
            .rfind(|segment| !segment.is_empty())
            .map(str::to_string)
    });

    [Some(page.title().trim().to_string()), segment]
        .into_iter()
        .flatten()
        .map(|source| class_name(&source))
        .find(|name| name != "Page")
        .unwrap_or_else(|| "HomePage".to_string())
}

/// `contact us` -> `ContactUsPage`. Yields bare `Page` when nothing
/// ASCII-alphanumeric survives.
fn class_name(source: &str) -> String {
    if !source.chars().any(|c| c.is_ascii_alphanumeric()) {
        return "Page".to_string();
    }
    let mut name: String = sanitize_name(source).split('_').map(title_case).collect();
    if !name.ends_with("Page") {
        name.push_str("Page");
    }
    name
}

/// Locator name for an element: text, else id, else first class, else
/// the element type. Prefixed with the type when it is not already part
/// of the name.
pub fn element_name(element: &ElementRecord) -> String {
    let source = element
        .text()
        .or_else(|| element.attribute("id"))
        .or_else(|| element.attribute("class").and_then(|c| c.split_whitespace().next()))
        .unwrap_or(element.element_type());

    let name = sanitize_name(source);
    let prefix = sanitize_name(element.element_type());
    if name.contains(&prefix) {
        name
    } else {
        format!("{}_{}", prefix, name)
    }
}

/// Test class name for a page object: `ContactUsPage` -> `TestContactUs`.
pub fn test_name(page_object_name: &str) -> String {
    let base = page_object_name
        .strip_suffix("Page")
        .unwrap_or(page_object_name);
    format!("Test{}", base)
}

/// Uppercase the first letter after every non-letter, lowercase the rest.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut after_letter = false;
    for c in word.chars() {
        if after_letter {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c.to_ascii_uppercase());
        }
        after_letter = c.is_ascii_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_handles_camel_case_and_punctuation() {
        assert_eq!(sanitize_name("Contact Us!"), "contact_us");
        assert_eq!(sanitize_name("loginButton"), "login_button");
        assert_eq!(sanitize_name("--Sign   up--"), "sign_up");
        assert_eq!(sanitize_name("404 Error"), "page_404_error");
        assert_eq!(sanitize_name(""), "page");
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("contact"), "Contact");
        assert_eq!(title_case("2fa"), "2Fa");
    }

    #[test]
    fn test_name_drops_page_suffix() {
        assert_eq!(test_name("ContactUsPage"), "TestContactUs");
        assert_eq!(test_name("Dashboard"), "TestDashboard");
    }

    #[test]
    fn class_name_needs_ascii_content() {
        assert_eq!(class_name("Contact Us"), "ContactUsPage");
        assert_eq!(class_name("404 Error"), "Page404ErrorPage");
        assert_eq!(class_name("Landing Page"), "LandingPage");
        assert_eq!(class_name("お問い合わせ"), "Page");
        assert_eq!(class_name("Page"), "Page");
    }
}
