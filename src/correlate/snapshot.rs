//! Point-in-time view of the page's elements.
//!
//! The content side serializes every element that can render an image, in
//! document order, together with its layout box. Correlation runs against
//! that snapshot rather than the live DOM, which keeps it a pure function and
//! tolerant of the page mutating underneath it.

use std::sync::{Arc, RwLock};

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use super::background::{inline_background_image, inline_pixel_length};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// Upper-case tag name, as the DOM reports `tagName`.
    pub tag: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub srcset: Option<String>,
    #[serde(default)]
    pub current_src: Option<String>,
    /// Computed `background-image` value, e.g. `url("https://…/a.png")`.
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub offset_width: u32,
    #[serde(default)]
    pub offset_height: u32,
}

impl ElementSnapshot {
    pub fn is_img(&self) -> bool {
        self.tag.eq_ignore_ascii_case("img")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub elements: Vec<ElementSnapshot>,
}

impl DocumentSnapshot {
    pub fn new(elements: Vec<ElementSnapshot>) -> Self {
        Self { elements }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Best-effort snapshot from static markup.
    ///
    /// There is no layout engine behind this: the rendered box comes from
    /// `width`/`height` attributes or inline pixel sizes, and background
    /// images only from inline styles. Elements with nothing image-related
    /// are skipped.
    pub fn from_html(markup: &str) -> Self {
        let document = Html::parse_document(markup);
        let elements = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter_map(element_from_html)
            .collect();
        Self { elements }
    }
}

fn element_from_html(element: ElementRef<'_>) -> Option<ElementSnapshot> {
    let value = element.value();
    let attr = |name: &str| value.attr(name).map(str::to_string);

    let style = value.attr("style").unwrap_or_default();
    let background_image = inline_background_image(style);
    let src = attr("src");
    let srcset = attr("srcset");

    let is_img = value.name().eq_ignore_ascii_case("img");
    if !is_img && background_image.is_none() {
        return None;
    }

    let dimension = |name: &str| {
        value
            .attr(name)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .or_else(|| inline_pixel_length(style, name))
            .unwrap_or(0)
    };

    Some(ElementSnapshot {
        tag: value.name().to_ascii_uppercase(),
        current_src: if is_img { src.clone() } else { None },
        src: if is_img { src } else { None },
        srcset: if is_img { srcset } else { None },
        background_image,
        offset_width: dimension("width"),
        offset_height: dimension("height"),
    })
}

/// Most recent snapshot pushed by the page; replaced wholesale on update.
#[derive(Debug, Default)]
pub struct LiveDocument {
    current: RwLock<Arc<DocumentSnapshot>>,
}

impl LiveDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, snapshot: DocumentSnapshot) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(snapshot);
    }

    pub fn snapshot(&self) -> Arc<DocumentSnapshot> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&*guard)
    }
}
