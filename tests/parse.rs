
use jmr_probe::parse::PdfDocument;
use jmr_probe::ProbeError;
use pretty_assertions::assert_eq;

use crate::setup::{
    build_pdf, build_pdf_with_config, jmr_form, marathi_form, write_pdf, FormPage, PdfConfig, RuledGrid, BODY_FONT_SIZE,
    CID_FONT_NAME, CID_GLYPH_WIDTH, PAGE_HEIGHT, PAGE_WIDTH,
};

#[test]
fn test_open_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("form.pdf");
    write_pdf(&jmr_form(), &path);

    let doc = PdfDocument::open(&path).unwrap();
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.page_numbers(), vec![1, 2]);
}

#[test]
fn test_missing_file() {
    let err = PdfDocument::open("does/not/exist.pdf").unwrap_err();
    assert!(matches!(err, ProbeError::FileNotFound(_)));
}

#[test]
fn test_not_a_pdf() {
    let err = PdfDocument::from_bytes(b"plain text, no header").unwrap_err();
    assert!(matches!(err, ProbeError::Pdf(_)));
}

#[test]
fn test_page_text_in_reading_order() {
    let doc = PdfDocument::from_bytes(&build_pdf(&jmr_form())).unwrap();
    let page = doc.extract_page(1).unwrap();

    assert_eq!(page.page_number, 1);
    assert_eq!(page.width, PAGE_WIDTH);
    assert_eq!(page.height, PAGE_HEIGHT);
    assert_eq!(
        page.extract_text(),
        Some("Survey No. 12\nDistrict: Pune\nTaluka: Haveli")
    );
}

#[test]
fn test_char_metadata() {
    let doc = PdfDocument::from_bytes(&build_pdf(&jmr_form())).unwrap();
    let page = doc.extract_page(1).unwrap();

    assert_eq!(page.chars.len(), "Survey No. 12District: PuneTaluka: Haveli".len());
    for c in &page.chars {
        assert_eq!(c.font_name, "Helvetica");
        assert!((c.size - BODY_FONT_SIZE).abs() < 1e-3, "{c}");
    }

    // First glyph sits at the Td origin; the baseline is 760pt up the page.
    let first = &page.chars[0];
    assert_eq!(first.text, "S");
    assert!((first.bbox.x0 - 72.0).abs() < 1e-3);
    assert!(first.bbox.y0 < PAGE_HEIGHT - 760.0);
    assert!(first.bbox.y1 > PAGE_HEIGHT - 760.0);

    // Glyphs advance left to right without overlapping.
    for pair in page.chars[..6].windows(2) {
        assert!(pair[1].bbox.x0 >= pair[0].bbox.x1 - 1e-3);
    }
}

#[test]
fn test_ruled_grid_becomes_table() {
    let doc = PdfDocument::from_bytes(&build_pdf(&jmr_form())).unwrap();
    let page = doc.extract_page(2).unwrap();

    assert_eq!(page.lines.len(), 6);
    assert!(page.rects.is_empty());

    let tables = page.extract_tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(
        tables[0],
        vec![
            vec![Some("Survey No".to_string()), Some("Owner".to_string())],
            vec![Some("12".to_string()), Some("Ramesh".to_string())],
        ]
    );

    let text = page.extract_text().unwrap();
    assert!(text.starts_with("Tree and Well details"));
    assert!(text.contains("Survey No Owner"));
}

#[test]
fn test_rectangle_grid_becomes_table() {
    let mut grid = RuledGrid::new(50.0, 400.0, &[&["Village", "Area"], &["Wagholi", "1.2"], &["", ""]]);
    grid.as_rects = true;
    let bytes = build_pdf(&[FormPage::default().grid(grid)]);

    let page = PdfDocument::from_bytes(&bytes).unwrap().extract_page(1).unwrap();
    assert_eq!(page.rects.len(), 6);

    let tables = page.extract_tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].len(), 3);
    assert_eq!(tables[0][2], vec![Some(String::new()), Some(String::new())]);
}

#[test]
fn test_blank_page() {
    let bytes = build_pdf(&[FormPage::default()]);
    let page = PdfDocument::from_bytes(&bytes).unwrap().extract_page(1).unwrap();
    assert_eq!(page.extract_text(), None);
    assert!(page.extract_tables().is_empty());
    assert!(page.chars.is_empty());
}

#[test]
fn test_unknown_page_number() {
    let doc = PdfDocument::from_bytes(&build_pdf(&jmr_form())).unwrap();
    let err = doc.extract_page(9).unwrap_err();
    assert!(matches!(err, ProbeError::PageContent { page: 9, .. }));
}

#[test]
fn test_parallel_extraction_keeps_page_order() {
    let pages: Vec<FormPage> = (0..6)
        .map(|i| FormPage::default().text(&format!("Village {i}"), 72.0, 700.0))
        .collect();
    let doc = PdfDocument::from_bytes(&build_pdf(&pages)).unwrap();

    let sequential: Vec<_> = doc.pages(false).map(|p| p.unwrap()).collect();
    let parallel: Vec<_> = doc.pages(true).map(|p| p.unwrap()).collect();

    assert_eq!(sequential, parallel);
    let texts: Vec<&str> = parallel.iter().filter_map(|p| p.extract_text()).collect();
    assert_eq!(
        texts,
        vec!["Village 0", "Village 1", "Village 2", "Village 3", "Village 4", "Village 5"]
    );
}

#[test]
fn test_composite_font_decodes_through_to_unicode() {
    let doc = PdfDocument::from_bytes(&build_pdf(&marathi_form())).unwrap();
    let page = doc.extract_page(1).unwrap();

    assert_eq!(page.extract_text(), Some("सर्वे नं. 12\nOwner: Ramesh"));

    let marathi: Vec<_> = page.chars.iter().filter(|c| c.font_name == CID_FONT_NAME).collect();
    assert_eq!(marathi.len(), "सर्वे नं. 12".chars().count());
    assert_eq!(marathi[0].text, "स");
    assert!((marathi[0].size - BODY_FONT_SIZE).abs() < 1e-3);

    // Advances come from the descendant font's /W run, not its /DW of 1000.
    let advance = CID_GLYPH_WIDTH as f32 / 1000.0 * BODY_FONT_SIZE;
    for pair in marathi.windows(2) {
        assert!((pair[1].bbox.x0 - pair[0].bbox.x0 - advance).abs() < 1e-3);
    }
}

#[test]
fn test_composite_font_without_to_unicode_shows_cids() {
    let bytes = build_pdf_with_config(&marathi_form(), &PdfConfig { to_unicode: false });
    let page = PdfDocument::from_bytes(&bytes).unwrap().extract_page(1).unwrap();

    let text = page.extract_text().unwrap();
    assert!(text.starts_with("(cid:1)(cid:2)(cid:3)"), "{text}");
    assert!(!text.contains('\0'));
    assert!(text.ends_with("Owner: Ramesh"));
}
