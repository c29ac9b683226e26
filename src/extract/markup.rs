use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::links::normalize_link;
use super::PersonRecord;

static PROFILE_ANCHORS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="linkedin.com/in"], a[href*="linkedin.com/company"]"#).unwrap()
});

const MAX_ANCESTOR_DEPTH: usize = 3;

/// Founders from rendered markup: profile anchors, deduplicated by link.
///
/// Never fails; empty or malformed markup simply yields nothing.
pub fn extract(html: &str) -> Vec<PersonRecord> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut people = Vec::new();

    for anchor in document.select(&PROFILE_ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let link = normalize_link(href);
        if link.is_empty() || !seen.insert(link.clone()) {
            continue;
        }
        people.push(PersonRecord {
            name: display_name(anchor),
            profile_link: link,
        });
    }

    people
}

/// Anchor text, else the text of the nearest of up to three ancestors.
fn display_name(anchor: ElementRef) -> String {
    let own = collapsed_text(anchor);
    if !own.is_empty() {
        return own;
    }

    let mut node = anchor.parent();
    let mut depth = 0;
    while depth < MAX_ANCESTOR_DEPTH {
        let Some(current) = node else { break };
        if let Some(element) = ElementRef::wrap(current) {
            let text = collapsed_text(element);
            if !text.is_empty() {
                return text;
            }
        }
        node = current.parent();
        depth += 1;
    }
    String::new()
}

fn collapsed_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_relative_links_deduplicate() {
        let html = r#"
            <div><a href="//www.linkedin.com/in/a">Ada</a></div>
            <div><a href="https://www.linkedin.com/in/a">Ada again</a></div>
        "#;
        let people = extract(html);
        assert_eq!(
            people,
            vec![PersonRecord {
                name: "Ada".into(),
                profile_link: "https://www.linkedin.com/in/a".into(),
            }]
        );
    }

    #[test]
    fn name_from_ancestor_text() {
        let html = r#"
            <section>
              <div class="card"><h3>Grace Hopper</h3>
                <span><i><a href="https://linkedin.com/in/grace"><img src="li.svg"></a></i></span>
              </div>
            </section>
        "#;
        let people = extract(html);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "Grace Hopper");
    }

    #[test]
    fn ancestor_walk_is_bounded() {
        // text sits four levels above the anchor, out of reach
        let html = r#"
            <div>Far Away
              <p><b><i><span><a href="https://linkedin.com/in/x"></a></span></i></b></p>
            </div>
        "#;
        let people = extract(html);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "");
        assert_eq!(people[0].profile_link, "https://linkedin.com/in/x");
    }

    #[test]
    fn company_pages_count_other_links_do_not() {
        let html = r#"
            <a href="https://www.linkedin.com/company/acme">Acme</a>
            <a href="https://twitter.com/acme">Twitter</a>
            <a>no href</a>
        "#;
        let people = extract(html);
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].profile_link, "https://www.linkedin.com/company/acme");
    }

    #[test]
    fn empty_and_malformed_markup() {
        assert!(extract("").is_empty());
        assert!(extract("<<<div <a href=").is_empty());
    }

    #[test]
    fn groupahead_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/groupahead.html").unwrap();
        let people = extract(&html);
        let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Brian Glick", "Julian Frumar"]);
        assert!(people.iter().all(|p| p.profile_link.starts_with("https://")));
    }
}
