//! Structural path matching for the election surface.
//!
//! A path is decomposed by fixed separators instead of regular expressions:
//! the `/election` prefix is stripped, then suffixes are tried from most to
//! least specific. The resulting shape plus the method picks one row of
//! [`ROUTES`].

use axum::http::Method;

const PREFIX: &str = "/election";

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateElection,
    ReadElection(i64),
    UpdateElection(i64),
    ElectionPdf(i64),
    ElectionBubbles(i64),
    ElectionPng(i64),
    ScanForm(i64),
    ScanUpload(i64),
    /// Known election path with a method it does not serve.
    Unsupported,
    /// Digits that do not fit an election id.
    BadItem,
    Home,
}

impl Operation {
    /// Writes are refused without an authenticated caller.
    pub fn requires_identity(self) -> bool {
        matches!(
            self,
            Self::CreateElection | Self::UpdateElection(_) | Self::ScanUpload(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Collection,
    Document,
    Pdf,
    Bubbles,
    Png,
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
}

struct Route {
    shape: Shape,
    verb: Verb,
    operation: fn(i64) -> Operation,
}

fn create_election(_: i64) -> Operation {
    Operation::CreateElection
}

/// Most specific suffix first; `_bubbles.json` must be tried before any
/// shorter extension.
const SUFFIXES: [(&str, Shape); 4] = [
    ("/scan", Shape::Scan),
    ("_bubbles.json", Shape::Bubbles),
    (".pdf", Shape::Pdf),
    (".png", Shape::Png),
];

const ROUTES: &[Route] = &[
    Route {
        shape: Shape::Collection,
        verb: Verb::Post,
        operation: create_election,
    },
    Route {
        shape: Shape::Document,
        verb: Verb::Get,
        operation: Operation::ReadElection,
    },
    Route {
        shape: Shape::Document,
        verb: Verb::Post,
        operation: Operation::UpdateElection,
    },
    Route {
        shape: Shape::Pdf,
        verb: Verb::Get,
        operation: Operation::ElectionPdf,
    },
    Route {
        shape: Shape::Bubbles,
        verb: Verb::Get,
        operation: Operation::ElectionBubbles,
    },
    Route {
        shape: Shape::Png,
        verb: Verb::Get,
        operation: Operation::ElectionPng,
    },
    Route {
        shape: Shape::Scan,
        verb: Verb::Get,
        operation: Operation::ScanForm,
    },
    Route {
        shape: Shape::Scan,
        verb: Verb::Post,
        operation: Operation::ScanUpload,
    },
];

/// Maps a method and path to the operation it selects.
pub fn resolve(method: &Method, path: &str) -> Operation {
    let Some((shape, digits)) = decompose(path) else {
        return Operation::Home;
    };

    let id = match digits {
        Some(digits) => match digits.parse::<i64>() {
            Ok(id) => id,
            Err(_) => return Operation::BadItem,
        },
        None => 0,
    };

    let verb = if *method == Method::GET {
        Some(Verb::Get)
    } else if *method == Method::POST {
        Some(Verb::Post)
    } else {
        None
    };

    ROUTES
        .iter()
        .find(|route| route.shape == shape && Some(route.verb) == verb)
        .map_or(Operation::Unsupported, |route| (route.operation)(id))
}

fn decompose(path: &str) -> Option<(Shape, Option<&str>)> {
    let rest = path.strip_prefix(PREFIX)?;
    if rest.is_empty() {
        return Some((Shape::Collection, None));
    }

    let tail = rest.strip_prefix('/')?;
    let (shape, stem) = SUFFIXES
        .iter()
        .find_map(|(suffix, shape)| tail.strip_suffix(*suffix).map(|stem| (*shape, stem)))
        .unwrap_or((Shape::Document, tail));

    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((shape, Some(stem)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> Operation {
        resolve(&Method::GET, path)
    }

    fn post(path: &str) -> Operation {
        resolve(&Method::POST, path)
    }

    #[test]
    fn routes_every_row_of_the_table() {
        assert_eq!(post("/election"), Operation::CreateElection);
        assert_eq!(get("/election/7"), Operation::ReadElection(7));
        assert_eq!(post("/election/7"), Operation::UpdateElection(7));
        assert_eq!(get("/election/7.pdf"), Operation::ElectionPdf(7));
        assert_eq!(get("/election/7_bubbles.json"), Operation::ElectionBubbles(7));
        assert_eq!(get("/election/7.png"), Operation::ElectionPng(7));
        assert_eq!(get("/election/7/scan"), Operation::ScanForm(7));
        assert_eq!(post("/election/7/scan"), Operation::ScanUpload(7));
    }

    #[test]
    fn unmatched_paths_fall_through_to_home() {
        assert_eq!(get("/"), Operation::Home);
        assert_eq!(get("/elections"), Operation::Home);
        assert_eq!(get("/election/"), Operation::Home);
        assert_eq!(get("/election/abc"), Operation::Home);
        assert_eq!(get("/election/7.gif"), Operation::Home);
        assert_eq!(get("/election/-7"), Operation::Home);
        assert_eq!(get("/election/7/scan/extra"), Operation::Home);
        assert_eq!(post("/static/app.js"), Operation::Home);
    }

    #[test]
    fn unsupported_methods_are_flagged() {
        assert_eq!(get("/election"), Operation::Unsupported);
        assert_eq!(resolve(&Method::DELETE, "/election/3"), Operation::Unsupported);
        assert_eq!(post("/election/3.pdf"), Operation::Unsupported);
    }

    #[test]
    fn overflowing_id_is_a_bad_item() {
        assert_eq!(get("/election/99999999999999999999.pdf"), Operation::BadItem);
    }

    #[test]
    fn leading_zeros_parse_to_the_same_id() {
        assert_eq!(get("/election/007.png"), Operation::ElectionPng(7));
    }

    #[test]
    fn only_writes_need_identity() {
        assert!(Operation::CreateElection.requires_identity());
        assert!(Operation::UpdateElection(1).requires_identity());
        assert!(Operation::ScanUpload(1).requires_identity());
        assert!(!Operation::ReadElection(1).requires_identity());
        assert!(!Operation::ElectionPdf(1).requires_identity());
        assert!(!Operation::Home.requires_identity());
    }
}
