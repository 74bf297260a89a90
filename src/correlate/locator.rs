use serde::{Deserialize, Serialize};

use super::background::extract_css_url;
use super::snapshot::{DocumentSnapshot, ElementSnapshot, LiveDocument};

/// The element that rendered an image, with its layout box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatedElement {
    pub tag: String,
    pub width: u32,
    pub height: u32,
}

impl From<&ElementSnapshot> for LocatedElement {
    fn from(element: &ElementSnapshot) -> Self {
        Self {
            tag: element.tag.clone(),
            width: element.offset_width,
            height: element.offset_height,
        }
    }
}

pub trait ElementLocator: Send + Sync {
    /// Finds the element that rendered `url`, or `None` when nothing on the
    /// page references it. A miss is a normal outcome, not an error.
    fn locate(&self, url: &str) -> Option<LocatedElement>;
}

impl ElementLocator for DocumentSnapshot {
    fn locate(&self, url: &str) -> Option<LocatedElement> {
        locate_in(&self.elements, url).map(LocatedElement::from)
    }
}

impl ElementLocator for LiveDocument {
    fn locate(&self, url: &str) -> Option<LocatedElement> {
        self.snapshot().locate(url)
    }
}

/// Three tiers, first match wins, document order within a tier:
/// 1. `<img>` whose `src` attribute equals the url;
/// 2. `<img>` whose `srcset` mentions the url or whose `currentSrc` equals it;
/// 3. any element whose background-image url equals or contains the url.
pub fn locate_in<'a>(elements: &'a [ElementSnapshot], url: &str) -> Option<&'a ElementSnapshot> {
    let images = || elements.iter().filter(|element| element.is_img());

    images()
        .find(|img| img.src.as_deref() == Some(url))
        .or_else(|| {
            images().find(|img| {
                img.srcset
                    .as_deref()
                    .is_some_and(|srcset| srcset.contains(url))
                    || img.current_src.as_deref() == Some(url)
            })
        })
        .or_else(|| {
            elements.iter().find(|element| {
                element
                    .background_image
                    .as_deref()
                    .filter(|value| *value != "none")
                    .and_then(extract_css_url)
                    .is_some_and(|bg_url| bg_url == url || bg_url.contains(url))
            })
        })
}
