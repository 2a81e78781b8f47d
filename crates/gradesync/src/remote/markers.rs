//! Text markers the gradebook leaves in response pages.
//!
//! Several endpoints answer with a full HTML page and a 200 status whether
//! the change went through or not, so the body text is the only signal.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::sanitize::truncate_body;

/// Markers meaning the deletion went through. Checked before failures since
/// a success page can still contain words like "error" in scripts.
const DELETE_SUCCESS_MARKERS: &[&str] = &[
    "itemdeleted",
    "categorydeleted",
    "success",
    "redirect",
    "location.replace",
];

const DELETE_FAILURE_MARKERS: &[&str] = &[
    "cannot delete",
    "no se puede eliminar",
    "error",
    "exception",
    "problema",
    "no tiene permisos",
    "permission denied",
];

/// Elements an edit form response uses to report that nothing was saved,
/// most specific first. Every form renders empty feedback placeholders, so
/// only elements with text count.
static EDIT_ERRORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".errormessage",
        ".invalid-feedback",
        "span.error",
        ".alert-danger",
        ".errorbox",
    ]
    .iter()
    .map(|css| Selector::parse(css).unwrap())
    .collect()
});

/// Outcome of a delete request, read from the response page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A success marker was found.
    Confirmed(&'static str),
    /// A failure marker was found.
    Rejected(&'static str),
    /// Neither kind of marker was present.
    Unknown,
}

impl Verdict {
    /// Unknown outcomes count as success: the gradebook often just
    /// re-renders the tree after a delete.
    pub fn is_success(self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }
}

/// Classifies the body returned by a delete request.
pub fn classify_delete(body: &str) -> Verdict {
    let lower = body.to_lowercase();
    if let Some(marker) = DELETE_SUCCESS_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Verdict::Confirmed(marker);
    }
    if let Some(marker) = DELETE_FAILURE_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Verdict::Rejected(marker);
    }
    Verdict::Unknown
}

/// The error message an edit form response carries, if the edit was not
/// saved. A saved edit redirects back to the tree, which has none.
pub fn edit_rejection(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    if !["error", "alert-danger", "invalid-feedback"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return None;
    }

    let document = Html::parse_document(body);
    EDIT_ERRORS.iter().find_map(|selector| {
        document
            .select(selector)
            .map(super::html::text_content)
            .find(|text| !text.is_empty())
            .map(|text| truncate_body(&text))
    })
}

/// True when the page is the login form rather than the page asked for.
pub fn is_login_page(body: &str) -> bool {
    body.contains("name=\"logintoken\"") || body.contains("id=\"login\"")
}
