use askama::Template;
use askama_web::WebTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) locations: Vec<LocationLink>,
}

pub(crate) struct LocationLink {
    pub(crate) key: String,
    pub(crate) display_name: String,
    pub(crate) ready: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "summary.html")]
pub(crate) struct SummaryTemplate {
    pub(crate) location_name: String,
    pub(crate) summary: String,
    pub(crate) generated_at: String,
}
