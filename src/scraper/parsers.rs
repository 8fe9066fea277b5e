use crate::models::{ExtraKey, Gender, ListingPage, ProfileRecord};
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("{field} is not a count: {value:?}")]
    BadCount { field: &'static str, value: String },

    #[error("invalid selector {0:?}")]
    Selector(String),
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

// ── Base page ─────────────────────────────────────────────────────────────────

/// Value of the login form's hidden `_xsrf` input.
pub fn parse_xsrf_token(doc: &Html) -> Option<String> {
    let sel = selector(r#"input[name="_xsrf"]"#).ok()?;
    doc.select(&sel)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(|v| v.to_string())
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Parse the JSON envelope returned by the listing endpoint.
/// Shape: `{"r":0,"msg":[<count>, "<html fragment>"]}`.
pub fn parse_listing_response(body: &str, base_url: &str) -> Result<ListingPage> {
    let envelope: serde_json::Value =
        serde_json::from_str(body).context("Listing response is not JSON")?;
    let fragment = envelope
        .get("msg")
        .and_then(|msg| msg.get(1))
        .and_then(|html| html.as_str())
        .context("Listing response has no markup fragment at msg[1]")?;
    parse_listing_fragment(fragment, base_url)
}

pub fn parse_listing_fragment(fragment: &str, base_url: &str) -> Result<ListingPage> {
    let doc = Html::parse_fragment(fragment);
    let item_sel = selector("div.zm-person-item")?;
    let link_sel = selector("a.zm-list-avatar-medium")?;
    let base = Url::parse(base_url).with_context(|| format!("Bad base url {}", base_url))?;

    let entry_ids = doc
        .select(&item_sel)
        .map(|item| {
            let id = item.value().attr("id").unwrap_or_default();
            parse_entry_id(id).with_context(|| format!("Listing entry with bad id {:?}", id))
        })
        .collect::<Result<Vec<u64>>>()?;

    let profile_urls = doc
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| {
            base.join(href)
                .map(|u| u.to_string())
                .with_context(|| format!("Bad profile link {:?}", href))
        })
        .collect::<Result<Vec<String>>>()?;

    Ok(ListingPage {
        entry_ids,
        profile_urls,
    })
}

/// `mi-1458573819` → 1458573819
fn parse_entry_id(id: &str) -> Option<u64> {
    id.rsplit('-').next()?.parse().ok()
}

// ── Profile page ──────────────────────────────────────────────────────────────

/// Parse a profile page. Mandatory header fields fail the whole record;
/// extra attributes are simply omitted when absent.
pub fn parse_profile(doc: &Html, url: &str) -> Result<ProfileRecord, ExtractError> {
    let header = doc
        .select(&selector("div.zm-profile-header")?)
        .next()
        .ok_or(ExtractError::Missing("profile header"))?;

    let display_name = header
        .select(&selector("span.name")?)
        .next()
        .and_then(|name| name.text().map(str::trim).find(|t| !t.is_empty()))
        .ok_or(ExtractError::Missing("name"))?
        .to_string();

    let upvote_count = header_count(
        header,
        "span.zm-profile-header-user-agree strong",
        "agree count",
    )?;
    let thanks_count = header_count(
        header,
        "span.zm-profile-header-user-thanks strong",
        "thanks count",
    )?;

    let avatar_url = doc
        .select(&selector("img.Avatar.Avatar--l")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or(ExtractError::Missing("avatar"))?
        .to_string();

    let record = ProfileRecord {
        avatar_url,
        display_name,
        extra_attributes: parse_extra_attributes(doc),
        gender: parse_gender(header),
        thanks_count,
        upvote_count,
        url: url.to_string(),
    };
    debug!("parse {} ok. name: {}", url, record.display_name);
    Ok(record)
}

fn header_count(
    header: ElementRef<'_>,
    css: &str,
    field: &'static str,
) -> Result<u64, ExtractError> {
    let text = header
        .select(&selector(css)?)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or(ExtractError::Missing(field))?;
    let text = text.trim();
    text.parse().map_err(|_| ExtractError::BadCount {
        field,
        value: text.to_string(),
    })
}

/// `<span class="item gender"><i class="icon icon-profile-female"></i></span>`
fn parse_gender(header: ElementRef<'_>) -> Gender {
    let Ok(sel) = selector("span.item.gender") else {
        return Gender::Unknown;
    };
    header
        .select(&sel)
        .next()
        .and_then(|span| span.children().find_map(ElementRef::wrap))
        .and_then(|icon| icon.value().attr("class"))
        .and_then(|class| class.split_whitespace().nth(1))
        .map(Gender::from_marker_class)
        .unwrap_or_default()
}

/// `<span class="position item" title="流程设计">`
pub fn parse_extra_attributes(doc: &Html) -> BTreeMap<ExtraKey, String> {
    let mut extra = BTreeMap::new();
    for key in ExtraKey::ALL {
        let Ok(sel) = selector(&format!("span.{}.item", key.css_class())) else {
            continue;
        };
        let Some(node) = doc.select(&sel).next() else {
            continue;
        };
        match node.value().attr("title") {
            Some(title) => {
                extra.insert(key, title.to_string());
            }
            None => debug!("{} node without title, skipping", key.css_class()),
        }
    }
    extra
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const AVATAR: &str = r#"<img class="Avatar Avatar--l" src="https://pic1.zhimg.com/a_l.jpg"/>"#;

    /// Profile page markup; each piece can be dropped to exercise failures.
    pub(crate) fn profile_html(
        name: bool,
        agree: bool,
        thanks: bool,
        avatar: bool,
        extras: &str,
    ) -> String {
        format!(
            r#"<html><body>
            <div class="zm-profile-header">
              {name}
              <span class="item gender"><i class="icon icon-profile-female"></i></span>
              {agree}
              {thanks}
            </div>
            {avatar}
            {extras}
            </body></html>"#,
            name = if name { r#"<span class="name">Alice</span>"# } else { "" },
            agree = if agree {
                r#"<span class="zm-profile-header-user-agree"><span class="zm-profile-header-icon"></span><strong>2803</strong>赞同</span>"#
            } else {
                ""
            },
            thanks = if thanks {
                r#"<span class="zm-profile-header-user-thanks"><span class="zm-profile-header-icon"></span><strong>517</strong>感谢</span>"#
            } else {
                ""
            },
            avatar = if avatar { AVATAR } else { "" },
            extras = extras,
        )
    }

    #[test]
    fn token_is_read_from_hidden_input() {
        let doc = Html::parse_document(
            r#"<form><input type="hidden" name="_xsrf" value="f00d"/></form>"#,
        );
        assert_eq!(parse_xsrf_token(&doc).as_deref(), Some("f00d"));
        assert_eq!(parse_xsrf_token(&Html::parse_document("<p></p>")), None);
    }

    #[test]
    fn listing_envelope_yields_ids_and_absolute_links() {
        let fragment = r#"
            <div class="zm-person-item" id="mi-1001">
              <a class="zm-list-avatar-medium" href="/people/alice"><img/></a>
            </div>
            <div class="zm-person-item" id="mi-1002">
              <a class="zm-list-avatar-medium" href="/people/bob"><img/></a>
            </div>"#;
        let body = serde_json::json!({ "r": 0, "msg": [2, fragment] }).to_string();

        let page = parse_listing_response(&body, "https://www.zhihu.com").unwrap();
        assert_eq!(page.entry_ids, vec![1001, 1002]);
        assert_eq!(
            page.profile_urls,
            vec![
                "https://www.zhihu.com/people/alice".to_string(),
                "https://www.zhihu.com/people/bob".to_string(),
            ]
        );
        assert_eq!(page.last_id(), Some(1002));
    }

    #[test]
    fn listing_without_fragment_is_an_error() {
        assert!(parse_listing_response(r#"{"r":1,"msg":"denied"}"#, "https://x.org").is_err());
        assert!(parse_listing_response("<html>", "https://x.org").is_err());
    }

    #[test]
    fn empty_listing_fragment_is_an_empty_page() {
        let body = serde_json::json!({ "r": 0, "msg": [0, ""] }).to_string();
        let page = parse_listing_response(&body, "https://www.zhihu.com").unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn complete_profile_parses_every_field() {
        let extras = r#"
            <span class="location item" title="杭州"></span>
            <span class="employment item" title="阿里巴巴"></span>
            <span class="education-extra item" title="计算机"></span>"#;
        let doc = Html::parse_document(&profile_html(true, true, true, true, extras));

        let record = parse_profile(&doc, "https://www.zhihu.com/people/alice").unwrap();
        assert_eq!(record.display_name, "Alice");
        assert_eq!(record.upvote_count, 2803);
        assert_eq!(record.thanks_count, 517);
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.avatar_url, "https://pic1.zhimg.com/a_l.jpg");
        assert_eq!(record.extra_attributes.len(), 3);
        assert_eq!(record.extra_attributes[&ExtraKey::Location], "杭州");
        assert_eq!(record.extra_attributes[&ExtraKey::EducationExtra], "计算机");
        assert!(!record.extra_attributes.contains_key(&ExtraKey::Education));
    }

    #[test]
    fn profile_without_extras_has_empty_map() {
        let doc = Html::parse_document(&profile_html(true, true, true, true, ""));
        let record = parse_profile(&doc, "u").unwrap();
        assert!(record.extra_attributes.is_empty());
    }

    #[test]
    fn any_missing_mandatory_field_invalidates_the_profile() {
        let cases = [
            (profile_html(false, true, true, true, ""), ExtractError::Missing("name")),
            (profile_html(true, false, true, true, ""), ExtractError::Missing("agree count")),
            (profile_html(true, true, false, true, ""), ExtractError::Missing("thanks count")),
            (profile_html(true, true, true, false, ""), ExtractError::Missing("avatar")),
        ];
        for (html, expected) in cases {
            let doc = Html::parse_document(&html);
            assert_eq!(parse_profile(&doc, "u").unwrap_err(), expected);
        }

        let doc = Html::parse_document("<html><body><p>gone</p></body></html>");
        assert_eq!(
            parse_profile(&doc, "u").unwrap_err(),
            ExtractError::Missing("profile header")
        );
    }

    #[test]
    fn non_numeric_count_invalidates_the_profile() {
        let html = profile_html(true, true, true, true, "").replace("2803", "2.8k");
        let doc = Html::parse_document(&html);
        assert!(matches!(
            parse_profile(&doc, "u").unwrap_err(),
            ExtractError::BadCount { field: "agree count", .. }
        ));
    }

    #[test]
    fn gender_defaults_to_unknown() {
        let male = profile_html(true, true, true, true, "")
            .replace("icon-profile-female", "icon-profile-male");
        let record = parse_profile(&Html::parse_document(&male), "u").unwrap();
        assert_eq!(record.gender, Gender::Male);

        let marker = r#"<span class="item gender"><i class="icon icon-profile-female"></i></span>"#;
        let unmarked = profile_html(true, true, true, true, "").replace(marker, "");
        let record = parse_profile(&Html::parse_document(&unmarked), "u").unwrap();
        assert_eq!(record.gender, Gender::Unknown);
    }

    #[test]
    fn extra_node_without_title_is_omitted() {
        let doc = Html::parse_document(&profile_html(
            true, true, true, true,
            r#"<span class="position item"></span><span class="education item" title="浙大"></span>"#,
        ));
        let extra = parse_extra_attributes(&doc);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[&ExtraKey::Education], "浙大");
    }
}
