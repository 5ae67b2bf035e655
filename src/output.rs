//! Result types returned by a successful conversion.

use crate::store::SessionId;
use serde::Serialize;

/// One page's stored PNG.
#[derive(Debug, Clone, Serialize)]
pub struct PageArtifact {
    /// 1-indexed page number.
    pub page_num: usize,
    /// `page_<n>.png`
    pub file_name: String,
    /// `/download/<session_id>/page_<n>.png`
    pub locator: String,
    /// Pixel width of the PNG.
    pub width: u32,
    /// Pixel height of the PNG.
    pub height: u32,
    /// Size of the encoded PNG in bytes.
    pub size_bytes: usize,
}

/// Timing and size figures for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_bytes: u64,
    /// Time spent rasterising and encoding, summed over pages.
    pub render_duration_ms: u64,
    /// Wall-clock time from upload accepted to manifest built.
    pub total_duration_ms: u64,
}

/// Everything a successful conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub session_id: SessionId,
    /// Stored pages in page order; one entry per source page.
    pub pages: Vec<PageArtifact>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// The response body of `POST /convert`.
    pub fn manifest(&self) -> ConversionManifest {
        ConversionManifest {
            session_id: self.session_id.to_string(),
            images: self.pages.iter().map(|p| p.locator.clone()).collect(),
        }
    }
}

/// `{"session_id": "...", "images": ["/download/...", ...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ConversionManifest {
    pub session_id: String,
    pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{locator, PageName};

    #[test]
    fn manifest_lists_locators_in_page_order() {
        let session = SessionId::generate();
        let pages = (0..3)
            .map(|idx| {
                let name = PageName::for_index(idx);
                PageArtifact {
                    page_num: name.page_num(),
                    file_name: name.to_string(),
                    locator: locator(&session, &name),
                    width: 10,
                    height: 10,
                    size_bytes: 100,
                }
            })
            .collect();
        let output = ConversionOutput {
            session_id: session,
            pages,
            stats: ConversionStats::default(),
        };

        let manifest = output.manifest();
        assert_eq!(manifest.session_id, session.to_string());
        assert_eq!(
            manifest.images,
            vec![
                format!("/download/{session}/page_1.png"),
                format!("/download/{session}/page_2.png"),
                format!("/download/{session}/page_3.png"),
            ]
        );

        let json = serde_json::to_value(&manifest).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(json.get("session_id").is_some());
        assert!(json.get("images").is_some());
    }
}
