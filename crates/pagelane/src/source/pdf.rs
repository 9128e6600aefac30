use crate::{PagelaneError, Result};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;

/// Page zoom factor: 72 dpi PDF points rendered at 216 dpi.
const PDF_ZOOM: f32 = 3.0;

pub(crate) fn render_pdf_pages(path: &Path) -> Result<Vec<RgbImage>> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| PagelaneError::input_materialization(format!("Failed to bind pdfium: {}", e)))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        PagelaneError::input_materialization(format!("Failed to open PDF {}: {}", path.display(), e))
    })?;

    let config = PdfRenderConfig::new().scale_page_by_factor(PDF_ZOOM);

    document
        .pages()
        .iter()
        .enumerate()
        .map(|(index, page)| {
            page.render_with_config(&config)
                .map(|bitmap| bitmap.as_image().into_rgb8())
                .map_err(|e| {
                    PagelaneError::input_materialization(format!(
                        "Failed to render page {} of {}: {}",
                        index + 1,
                        path.display(),
                        e
                    ))
                })
        })
        .collect()
}
