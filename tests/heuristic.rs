
use jmr_probe::heuristic::{analyze_pages, FieldHit, OutcomeStatus};
use jmr_probe::parse::{PageContent, PdfDocument};
use jmr_probe::FieldCatalog;
use pretty_assertions::assert_eq;

use crate::setup::{build_pdf, jmr_form, marathi_form};

#[test]
fn test_survey_label_and_table_across_pages() {
    let catalog = FieldCatalog::jmr().compile().unwrap();
    let pages = vec![
        Ok(PageContent::new(1).with_text("सर्वे नं. 12")),
        Ok(PageContent::new(2).with_table(&[&["Survey No", "Owner"], &["12", "Ramesh"]])),
    ];

    let outcome = analyze_pages(2, pages, &catalog, false);
    assert_eq!(outcome.status(), OutcomeStatus::Complete);
    let result = outcome.result();

    let survey_hits: Vec<_> = result
        .field_hits
        .iter()
        .filter(|h| h.concept == "Survey Number")
        .collect();
    assert_eq!(survey_hits.len(), 1);
    assert!(result.matched_labels.contains(&survey_hits[0].matched));

    let headers: Vec<&str> = result.table_headers.iter().map(String::as_str).collect();
    assert_eq!(headers, vec!["Survey No", "Owner"]);

    assert_eq!(result.table_structure.len(), 1);
    let table = &result.table_structure[0];
    assert_eq!((table.page, table.table, table.rows, table.columns), (2, 1, 1, 2));
    assert_eq!(
        table.sample_data,
        vec![vec![Some("12".to_string()), Some("Ramesh".to_string())]]
    );
}

#[test]
fn test_missing_fields_ignore_pdf_content() {
    let catalog = FieldCatalog::jmr();
    let compiled = catalog.compile().unwrap();
    let expected: Vec<String> = catalog
        .reference_fields
        .iter()
        .filter(|f| !catalog.current_fields.contains(f))
        .cloned()
        .collect();

    let empty = analyze_pages(0, Vec::new(), &compiled, false);
    let busy = analyze_pages(
        1,
        vec![Ok(PageContent::new(1).with_text("Owner Name, Village, Area"))],
        &compiled,
        true,
    );

    for outcome in [&empty, &busy] {
        let report = jmr_probe::AnalysisReport::new(outcome, &catalog);
        assert_eq!(report.suggested_additional_fields, expected);
    }
    assert_eq!(catalog, FieldCatalog::jmr());
}

#[test]
fn test_extracted_pdf_through_heuristic() {
    let catalog = FieldCatalog::jmr().compile().unwrap();
    let doc = PdfDocument::from_bytes(&build_pdf(&jmr_form())).unwrap();

    let outcome = analyze_pages(doc.page_count(), doc.pages(false), &catalog, false);
    assert_eq!(outcome.status(), OutcomeStatus::Complete);
    let result = outcome.result();

    assert_eq!(result.pages_analyzed, 2);
    for label in ["Survey No.", "District", "Taluka", "Tree", "Well", "Survey No"] {
        assert!(result.matched_labels.contains(label), "missing {label}");
    }
    assert_eq!(result.table_structure.len(), 1);
    assert_eq!(result.table_structure[0].rows, 1);
    assert_eq!(result.table_structure[0].columns, 2);
    assert_eq!(
        result.text_diagnostics,
        vec![
            "Page 1: Direct text extraction successful",
            "Page 2: Direct text extraction successful"
        ]
    );
    assert!(result.full_text_sample.starts_with("Survey No. 12"));
    assert_eq!(result.visual_elements.len(), 1);
    assert_eq!(result.visual_elements[0].lines, 6);
}

#[test]
fn test_marathi_survey_label_from_pdf() {
    let catalog = FieldCatalog::jmr().compile().unwrap();
    let doc = PdfDocument::from_bytes(&build_pdf(&marathi_form())).unwrap();

    let outcome = analyze_pages(doc.page_count(), doc.pages(false), &catalog, true);
    assert_eq!(outcome.status(), OutcomeStatus::Complete);
    let result = outcome.result();

    let survey: Vec<&FieldHit> = result
        .field_hits
        .iter()
        .filter(|h| h.concept == "Survey Number")
        .collect();
    assert_eq!(
        survey,
        vec![&FieldHit {
            page: 1,
            concept: "Survey Number".to_string(),
            matched: "सर्वे नं.".to_string(),
        }]
    );
    assert!(result.matched_labels.contains("Owner"));

    let font_labels: Vec<&str> = result.font_hits.iter().map(|h| h.label.as_str()).collect();
    assert_eq!(font_labels, vec!["सर्वे (Font: Mangal_10)"]);
}
