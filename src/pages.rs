use axum::response::Html;

use crate::identity::UserId;
use crate::models::STATIC_ROOT;

pub fn home(user: Option<UserId>) -> Html<String> {
    let who = match user {
        Some(user) => format!("signed in as {user}"),
        None => "not signed in".to_string(),
    };
    Html(format!(
        "<!doctype html>\n<html><head><title>Ballot Studio</title>\
         <link rel=\"stylesheet\" href=\"{STATIC_ROOT}/style.css\"></head>\n\
         <body><h1>Ballot Studio</h1><p>{who}</p></body></html>\n"
    ))
}

/// Upload form that posts the chosen image as the raw request body, so the
/// archiver sees the file's own content type.
pub fn scan_form(election_id: i64) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><title>Scan election {election_id}</title></head>\n\
         <body><h1>Upload scanned ballot for election {election_id}</h1>\n\
         <input id=\"image\" type=\"file\" accept=\"image/*\" capture=\"environment\">\n\
         <button id=\"send\">Upload</button><p id=\"status\"></p>\n\
         <script>\n\
         document.getElementById('send').onclick = async () => {{\n\
           const file = document.getElementById('image').files[0];\n\
           if (!file) return;\n\
           const resp = await fetch('/election/{election_id}/scan', {{\n\
             method: 'POST', body: file, headers: {{'Content-Type': file.type}}}});\n\
           document.getElementById('status').textContent = await resp.text();\n\
         }};\n\
         </script></body></html>\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_shows_signed_in_user() {
        assert!(home(Some(UserId(12))).0.contains("signed in as 12"));
        assert!(home(None).0.contains("not signed in"));
    }

    #[test]
    fn scan_form_posts_to_its_election() {
        assert!(scan_form(3).0.contains("'/election/3/scan'"));
    }
}
