use askama::Template;
use soon_core::models::{Link, Release, ReleaseDraft, DATE_FORMAT};

/// Empty link rows offered below the existing ones.
const BLANK_LINK_ROWS: usize = 3;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub site_name: &'a str,
    pub releases: &'a [Release],
    pub logged_in: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub site_name: &'a str,
    pub error: Option<&'a str>,
}

/// Shared by the add and change pages.
#[derive(Template)]
#[template(path = "release_form.html")]
pub struct ReleaseFormTemplate<'a> {
    pub site_name: &'a str,
    pub heading: &'a str,
    pub action: String,
    pub title: String,
    pub kind: String,
    pub release_date: String,
    pub links: Vec<Link>,
    pub blank_link_rows: usize,
    pub error: Option<String>,
}

impl<'a> ReleaseFormTemplate<'a> {
    pub fn for_new(site_name: &'a str) -> Self {
        Self::from_draft(site_name, "Add release", "/add".into(), ReleaseDraft::default())
    }

    pub fn for_edit(site_name: &'a str, release: &Release) -> Self {
        let draft = ReleaseDraft {
            title: release.title.clone(),
            kind: release.kind.clone(),
            release_date: release.release_date.format(DATE_FORMAT).to_string(),
            links: release.links.clone(),
        };
        Self::from_draft(site_name, "Edit release", format!("/change/{}", release.id), draft)
    }

    /// Re-renders what the operator submitted, e.g. after a validation error.
    pub fn from_draft(site_name: &'a str, heading: &'a str, action: String, draft: ReleaseDraft) -> Self {
        Self {
            site_name,
            heading,
            action,
            title: draft.title,
            kind: draft.kind,
            release_date: draft.release_date,
            links: draft.links,
            blank_link_rows: BLANK_LINK_ROWS,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Template)]
#[template(path = "emails.html")]
pub struct EmailsTemplate<'a> {
    pub site_name: &'a str,
    pub recipients: &'a [String],
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use soon_core::models::parse_date;

    fn release() -> Release {
        Release::new(
            "Game <X>".into(),
            "Game".into(),
            parse_date("2099-01-01").unwrap(),
            vec![Link::new("Trailer", "https://t.example/?a=1&b=2")],
        )
    }

    #[test]
    fn index_escapes_and_shows_controls_only_when_logged_in() {
        let releases = [release()];
        let public = IndexTemplate { site_name: "SOONSITE", releases: &releases, logged_in: false }
            .render()
            .unwrap();
        assert!(public.contains("Game &lt;X&gt;"));
        assert!(public.contains("01 January 2099"));
        assert!(!public.contains("/delete/"));

        let operator = IndexTemplate { site_name: "SOONSITE", releases: &releases, logged_in: true }
            .render()
            .unwrap();
        assert!(operator.contains(&format!("/delete/{}", releases[0].id)));
    }

    #[test]
    fn edit_form_is_prefilled() {
        let release = release();
        let html = ReleaseFormTemplate::for_edit("SOONSITE", &release).render().unwrap();
        assert!(html.contains(&format!("action=\"/change/{}\"", release.id)));
        assert!(html.contains("value=\"2099-01-01\""));
        assert!(html.contains("value=\"Trailer\""));
        assert_eq!(html.matches("name=\"link_text[]\"").count(), 1 + BLANK_LINK_ROWS);
    }

    #[test]
    fn form_error_is_rendered() {
        let html = ReleaseFormTemplate::for_new("SOONSITE")
            .with_error("title is required")
            .render()
            .unwrap();
        assert!(html.contains("title is required"));
    }

    #[test]
    fn recipients_delete_links_are_url_encoded() {
        let recipients = ["a+b@example.com".to_string(), "a/b@x.com".to_string()];
        let html = EmailsTemplate { site_name: "SOONSITE", recipients: &recipients, error: None }
            .render()
            .unwrap();
        assert!(html.contains("/emails/delete/a%2Bb%40example.com"));
        // a raw slash would split the path segment
        assert!(html.contains("/emails/delete/a%2Fb%40x.com"));
    }
}
