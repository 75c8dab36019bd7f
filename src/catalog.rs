//! Field catalogs: the bilingual label patterns searched for in page text,
//! the fields the downstream system already supports, and the broader set
//! of fields typical for a JMR form.

use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// One candidate data-entry concept and the surface forms it appears under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub name: String,
    pub expressions: Vec<String>,
}

impl FieldPattern {
    pub fn new(name: &str, expressions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            expressions: expressions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// All expressions joined into a single alternation.
    pub fn alternation(&self) -> String {
        self.expressions.join("|")
    }
}

/// Fields to suggest when any matched label contains one of `triggers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRule {
    pub triggers: Vec<String>,
    pub fields: Vec<String>,
}

impl SuggestionRule {
    fn new(triggers: &[&str], fields: &[&str]) -> Self {
        Self {
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn fires_on<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        labels
            .into_iter()
            .any(|label| self.triggers.iter().any(|t| label.contains(t.as_str())))
    }
}

/// The full, uncompiled catalog. This is what `--catalog` files contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub patterns: Vec<FieldPattern>,
    /// Plain substrings looked for inside same-font character runs.
    pub font_keywords: Vec<String>,
    pub current_fields: Vec<String>,
    pub reference_fields: Vec<String>,
    #[serde(default)]
    pub suggestion_rules: Vec<SuggestionRule>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::jmr()
    }
}

impl FieldCatalog {
    /// The catalog for Joint Measurement Report forms.
    pub fn jmr() -> Self {
        let patterns = vec![
            FieldPattern::new(
                "Survey Number",
                &[r"सर्वे\s*(?:नंबर|नं\.?)", r"Survey\s*(?:Number|No\.?)"],
            ),
            FieldPattern::new(
                "Owner",
                &[r"मालकाचे\s*नाव", r"मालक", r"Owner\s*Name", r"Owner"],
            ),
            FieldPattern::new("Area", &[r"क्षेत्रफळ", r"Area", r"एकर", r"Hectare"]),
            FieldPattern::new("District", &[r"जिल्हा", r"District"]),
            FieldPattern::new("Taluka", &[r"तालुका", r"Taluka"]),
            FieldPattern::new("Village", &[r"गाव", r"Village"]),
            FieldPattern::new("Project", &[r"प्रकल्प", r"Project"]),
            FieldPattern::new("Officer", &[r"अधिकारी", r"Officer"]),
            FieldPattern::new("Date", &[r"दिनांक", r"Date", r"तारीख"]),
            FieldPattern::new("Classification", &[r"वर्गीकरण", r"Classification"]),
            FieldPattern::new("Type", &[r"प्रकार", r"Type"]),
            FieldPattern::new("Status", &[r"स्थिती", r"Status"]),
            FieldPattern::new("Remarks", &[r"टिप्पणी", r"Remarks", r"शेरा"]),
            FieldPattern::new("Measurement", &[r"मापन", r"Measurement"]),
            FieldPattern::new("Tribal", &[r"आदिवासी", r"Tribal"]),
            FieldPattern::new("Land", &[r"जमीन", r"Land"]),
            FieldPattern::new("Category", &[r"श्रेणी", r"Category"]),
            FieldPattern::new("Structure", &[r"संरचना", r"Structure"]),
            FieldPattern::new("Tree", &[r"झाड", r"Tree"]),
            FieldPattern::new("Well", &[r"विहीर", r"Well"]),
            FieldPattern::new("Value", &[r"मूल्य", r"Value"]),
            FieldPattern::new("Total", &[r"एकूण", r"Total"]),
            FieldPattern::new("Approval", &[r"मंजूरी", r"Approval"]),
            FieldPattern::new("Document", &[r"कागदपत्र", r"Document"]),
        ];

        let font_keywords = [
            "सर्वे", "मालक", "क्षेत्रफळ", "जिल्हा", "तालुका", "गाव", "प्रकल्प", "अधिकारी",
            "दिनांक", "वर्गीकरण", "प्रकार", "स्थिती", "टिप्पणी", "मापन", "आदिवासी", "जमीन",
            "श्रेणी",
        ];

        let current_fields = [
            "survey_number",
            "owner_id",
            "project_id",
            "officer_id",
            "measurement_date",
            "measured_area",
            "land_type",
            "tribal_classification",
            "village",
            "taluka",
            "district",
            "category",
            "remarks",
            "status",
        ];

        let reference_fields = [
            "sub_division_number",
            "owner_name",
            "father_name",
            "survey_sub_number",
            "plot_area",
            "compensation_amount",
            "structure_compensation",
            "tree_compensation",
            "well_compensation",
            "total_compensation",
            "acquisition_date",
            "possession_date",
            "reference_number",
            "file_number",
            "revenue_village",
            "survey_settlement",
            "land_classification",
            "irrigation_type",
            "crop_type",
            "boundary_north",
            "boundary_south",
            "boundary_east",
            "boundary_west",
            "witness_1",
            "witness_2",
            "surveyor_name",
            "verification_date",
            "approval_authority",
            "gazette_notification",
            "land_record_number",
            "mutation_number",
            "khata_number",
            "khasra_number",
        ];

        let suggestion_rules = vec![
            SuggestionRule::new(
                &["संरचना", "Structure"],
                &["structure_details", "total_structure_value"],
            ),
            SuggestionRule::new(&["झाड", "Tree"], &["tree_details", "total_tree_value"]),
            SuggestionRule::new(&["विहीर", "Well"], &["well_details", "total_well_value"]),
            SuggestionRule::new(
                &["मंजूरी", "Approval"],
                &["approved_by", "approved_at", "rejection_reason"],
            ),
            SuggestionRule::new(&["कागदपत्र", "Document"], &["documents"]),
        ];

        Self {
            patterns,
            font_keywords: font_keywords.iter().map(|k| k.to_string()).collect(),
            current_fields: current_fields.iter().map(|f| f.to_string()).collect(),
            reference_fields: reference_fields.iter().map(|f| f.to_string()).collect(),
            suggestion_rules,
        }
    }

    /// Load a catalog override from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(ProbeError::CatalogFormat)
    }

    /// Reference fields not yet supported, in reference order.
    ///
    /// A pure set difference over the two catalogs; neither side is modified.
    pub fn missing_fields(&self) -> Vec<String> {
        let current: IndexSet<&str> = self.current_fields.iter().map(String::as_str).collect();
        let mut seen = IndexSet::new();
        self.reference_fields
            .iter()
            .filter(|f| !current.contains(f.as_str()))
            .filter(|f| seen.insert(f.as_str()))
            .cloned()
            .collect()
    }

    /// Fields implied by the matched labels through the suggestion rules.
    pub fn suggested_fields<'a, I>(&self, labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String> + Clone,
    {
        self.suggestion_rules
            .iter()
            .filter(|rule| rule.fires_on(labels.clone()))
            .flat_map(|rule| rule.fields.iter().cloned())
            .collect()
    }

    pub fn compile(&self) -> Result<CompiledCatalog> {
        CompiledCatalog::new(self.clone())
    }
}

/// A pattern with its regex built once, ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub source: String,
    pub regex: Regex,
}

/// A catalog whose patterns compiled successfully.
#[derive(Debug, Clone)]
pub struct CompiledCatalog {
    pub catalog: FieldCatalog,
    pub patterns: Vec<CompiledPattern>,
}

impl CompiledCatalog {
    pub fn new(catalog: FieldCatalog) -> Result<Self> {
        let patterns = catalog
            .patterns
            .iter()
            .map(|p| {
                let source = p.alternation();
                RegexBuilder::new(&source)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| CompiledPattern {
                        name: p.name.clone(),
                        source: source.clone(),
                        regex,
                    })
                    .map_err(|source| ProbeError::InvalidPattern {
                        name: p.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { catalog, patterns })
    }

    /// Every `(concept, matched substring)` found in `text`, in pattern order.
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<(&str, &'t str)> {
        self.patterns
            .iter()
            .flat_map(|p| {
                p.regex
                    .find_iter(text)
                    .map(move |m| (p.name.as_str(), m.as_str()))
            })
            .collect()
    }
}
