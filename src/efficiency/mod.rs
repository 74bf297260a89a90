//! Bytes-per-pixel grading and the aggregate view over committed records.

pub mod distribution;
pub mod grade;

use serde::Serialize;

use crate::db::ImageRecord;

pub use distribution::{SizeDistribution, SizeSlice};
pub use grade::{bytes_per_pixel, formatted_bytes_per_pixel, EfficiencyGrade};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEfficiency {
    #[serde(flatten)]
    pub record: ImageRecord,
    pub bytes_per_pixel: Option<f64>,
    /// Two-decimal form shown in the popup's tooltip.
    pub formatted_bytes_per_pixel: Option<String>,
    pub grade: EfficiencyGrade,
    pub grade_label: &'static str,
}

impl From<&ImageRecord> for ImageEfficiency {
    fn from(record: &ImageRecord) -> Self {
        let grade = EfficiencyGrade::for_record(record);
        Self {
            record: record.clone(),
            bytes_per_pixel: bytes_per_pixel(record),
            formatted_bytes_per_pixel: formatted_bytes_per_pixel(record),
            grade,
            grade_label: grade.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: EfficiencyGrade,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub images: Vec<ImageEfficiency>,
    pub grades: Vec<GradeCount>,
    pub distribution: SizeDistribution,
}

impl AnalysisReport {
    pub fn from_records(records: &[ImageRecord]) -> Self {
        let images: Vec<ImageEfficiency> = records.iter().map(ImageEfficiency::from).collect();
        let grades = EfficiencyGrade::ALL
            .into_iter()
            .map(|grade| GradeCount {
                grade,
                count: images.iter().filter(|image| image.grade == grade).count(),
            })
            .filter(|entry| entry.count > 0)
            .collect();

        Self {
            images,
            grades,
            distribution: SizeDistribution::from_records(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_grades_and_flattens_records() {
        let records = vec![
            ImageRecord {
                url: "a.webp".into(),
                size: 10_000,
                mime_type: "image/webp".into(),
                element_tag: Some("IMG".into()),
                element_width: Some(200),
                element_height: Some(200),
            },
            ImageRecord {
                url: "b.png".into(),
                size: 400_000,
                mime_type: "image/png".into(),
                element_tag: Some("DIV".into()),
                element_width: Some(100),
                element_height: Some(100),
            },
            ImageRecord {
                url: "c.gif".into(),
                size: 3_000,
                mime_type: "image/gif".into(),
                element_tag: None,
                element_width: None,
                element_height: None,
            },
        ];

        let report = AnalysisReport::from_records(&records);
        let grades: Vec<(EfficiencyGrade, usize)> =
            report.grades.iter().map(|g| (g.grade, g.count)).collect();
        assert_eq!(
            grades,
            vec![
                (EfficiencyGrade::A, 1),
                (EfficiencyGrade::F, 1),
                (EfficiencyGrade::Unknown, 1)
            ]
        );

        let first = serde_json::to_value(&report.images[0]).unwrap();
        assert_eq!(first["url"], "a.webp");
        assert_eq!(first["gradeLabel"], "A (Excellent)");
        assert_eq!(first["bytesPerPixel"], 0.25);
        assert_eq!(first["formattedBytesPerPixel"], "0.25");

        let uncorrelated = serde_json::to_value(&report.images[2]).unwrap();
        assert!(uncorrelated["formattedBytesPerPixel"].is_null());
    }
}
