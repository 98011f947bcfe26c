use serde::Serialize;

pub const STATIC_ROOT: &str = "/static";

/// Links returned after an election write, pointing at every view of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditContext {
    #[serde(rename = "itemid")]
    pub item_id: i64,
    pub pdf: String,
    pub bubbles: String,
    pub scan: String,
    pub post: String,
    pub edit: String,
    pub url: String,
    #[serde(rename = "staticroot")]
    pub static_root: String,
}

impl EditContext {
    pub fn for_election(id: i64) -> Self {
        Self {
            item_id: id,
            pdf: format!("/election/{id}.pdf"),
            bubbles: format!("/election/{id}_bubbles.json"),
            scan: format!("/election/{id}/scan"),
            post: format!("/election/{id}"),
            edit: format!("/edit/{id}"),
            url: format!("/election/{id}"),
            static_root: STATIC_ROOT.to_string(),
        }
    }
}
