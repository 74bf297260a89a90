use std::collections::HashSet;

use serde::Serialize;

use crate::correlate::ElementLocator;
use crate::db::{ImageRecord, Observation};

/// Anything smaller is treated as an icon or tracking pixel.
pub const MIN_IMAGE_BYTES: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    AlreadyCommitted,
    DuplicateInBatch,
    UnresolvedSize,
    BelowMinimum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub url: String,
    pub reason: RejectReason,
}

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub accepted: Vec<ImageRecord>,
    pub rejected: Vec<Rejection>,
}

/// Turns one batch into the records it should commit.
///
/// Observations are taken in arrival order. A url is accepted at most once:
/// it must be absent from `committed` and from everything accepted earlier in
/// the same pass. Size checks come after the duplicate check, and
/// correlation only runs for observations that survive every filter.
/// `min_image_bytes` can raise the size floor but never lower it.
pub fn run_pass(
    batch: &[Observation],
    committed: &HashSet<String>,
    min_image_bytes: u64,
    locator: &dyn ElementLocator,
) -> PassOutcome {
    let min_image_bytes = min_image_bytes.max(MIN_IMAGE_BYTES);
    let mut outcome = PassOutcome::default();
    let mut accepted_urls: HashSet<&str> = HashSet::new();

    for observation in batch {
        let url = observation.url.as_str();
        let reject = |reason| Rejection {
            url: url.to_string(),
            reason,
        };

        if committed.contains(url) {
            outcome.rejected.push(reject(RejectReason::AlreadyCommitted));
            continue;
        }
        if accepted_urls.contains(url) {
            outcome.rejected.push(reject(RejectReason::DuplicateInBatch));
            continue;
        }

        let Some(size) = observation.size.bytes() else {
            outcome.rejected.push(reject(RejectReason::UnresolvedSize));
            continue;
        };
        if size < min_image_bytes {
            outcome.rejected.push(reject(RejectReason::BelowMinimum));
            continue;
        }

        let element = locator.locate(url);
        accepted_urls.insert(url);
        outcome.accepted.push(ImageRecord {
            url: observation.url.clone(),
            size,
            mime_type: observation.mime_type.clone(),
            element_tag: element.as_ref().map(|found| found.tag.clone()),
            element_width: element.as_ref().map(|found| found.width),
            element_height: element.as_ref().map(|found| found.height),
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::{DocumentSnapshot, ElementSnapshot};
    use crate::db::ObservedSize;

    fn obs(url: &str, size: ObservedSize) -> Observation {
        Observation::new(url, size, "image/png")
    }

    fn page() -> DocumentSnapshot {
        DocumentSnapshot::new(vec![ElementSnapshot {
            tag: "IMG".into(),
            src: Some("b.png".into()),
            current_src: Some("b.png".into()),
            offset_width: 200,
            offset_height: 100,
            ..ElementSnapshot::default()
        }])
    }

    #[test]
    fn drops_small_images() {
        let batch = [
            obs("a.png", ObservedSize::Bytes(500)),
            obs("b.png", ObservedSize::Bytes(2_000)),
        ];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());

        assert_eq!(outcome.accepted.len(), 1);
        let record = &outcome.accepted[0];
        assert_eq!(record.url, "b.png");
        assert_eq!(record.element_tag.as_deref(), Some("IMG"));
        assert_eq!((record.element_width, record.element_height), (Some(200), Some(100)));
        assert_eq!(
            outcome.rejected,
            vec![Rejection { url: "a.png".into(), reason: RejectReason::BelowMinimum }]
        );
    }

    #[test]
    fn boundary_size_is_kept() {
        let batch = [obs("edge.png", ObservedSize::Bytes(MIN_IMAGE_BYTES))];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].element_tag, None);
    }

    #[test]
    fn only_first_of_a_repeated_url_is_accepted() {
        let batch = [
            obs("c.png", ObservedSize::Bytes(3_000)),
            obs("c.png", ObservedSize::Bytes(3_000)),
        ];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected[0].reason, RejectReason::DuplicateInBatch);
    }

    #[test]
    fn small_first_copy_does_not_block_a_valid_second_copy() {
        let batch = [
            obs("f.png", ObservedSize::Bytes(10)),
            obs("f.png", ObservedSize::Bytes(10_000)),
        ];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].size, 10_000);
    }

    #[test]
    fn committed_urls_are_skipped() {
        let committed: HashSet<String> = ["d.png".to_string()].into_iter().collect();
        let batch = [obs("d.png", ObservedSize::Bytes(9_000))];
        let outcome = run_pass(&batch, &committed, MIN_IMAGE_BYTES, &page());
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected[0].reason, RejectReason::AlreadyCommitted);
    }

    #[test]
    fn unresolved_size_is_rejected() {
        let batch = [obs("u.png", ObservedSize::Unknown)];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected[0].reason, RejectReason::UnresolvedSize);
    }

    #[test]
    fn unstorable_size_is_rejected_as_unresolved() {
        let batch = [
            obs("huge.png", ObservedSize::Bytes(u64::MAX)),
            obs("b.png", ObservedSize::Bytes(5_000)),
        ];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].url, "b.png");
        assert_eq!(
            outcome.rejected,
            vec![Rejection { url: "huge.png".into(), reason: RejectReason::UnresolvedSize }]
        );
    }

    #[test]
    fn query_string_variants_are_distinct() {
        let batch = [
            obs("g.png?w=400", ObservedSize::Bytes(4_000)),
            obs("g.png?w=800", ObservedSize::Bytes(8_000)),
        ];
        let outcome = run_pass(&batch, &HashSet::new(), MIN_IMAGE_BYTES, &page());
        assert_eq!(outcome.accepted.len(), 2);
    }
}
