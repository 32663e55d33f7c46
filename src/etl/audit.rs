use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::UserConfig;
use crate::clean::lookup::DisabledLookup;
use crate::clean::postcode::PostcodeNormalizer;
use crate::clean::street_name::StreetNameNormalizer;
use crate::clean::tag_key::{KeyShape, TagKeyClassifier};
use crate::data::osm::{ElementKind, OsmElement};
use crate::errors::Result;

use super::parse_osm::OsmElements;
use super::Etl;

pub const ETL_NAME: &str = "audit";
pub const OUTPUT_FILE_NAME: &str = "audit.json";

const STREET_KEY: &str = "addr:street";
const POSTCODE_KEY: &str = "addr:postcode";

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct KeyShapeCounts {
    pub lower: usize,
    pub lower_colon: usize,
    pub problemchars: usize,
    pub other: usize,
}

/// Frequency tables gathered by one audit pass.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct AuditReport {
    pub element_counts: BTreeMap<String, usize>,
    pub key_shapes: KeyShapeCounts,
    pub street_types: BTreeMap<String, usize>,
    pub problem_postcodes: BTreeMap<String, usize>,
}

fn log_table(title: &str, table: &BTreeMap<String, usize>) {
    let mut rows: Vec<(&String, &usize)> = table.iter().collect();
    rows.sort_by_key(|(name, _)| name.to_lowercase());
    for (name, count) in rows {
        info!(table = title, name = name.as_str(), count = *count; "Audit count");
    }
}

/// Read-only pass counting what the export would have to clean.
pub struct AuditEtl {
    input_path: PathBuf,
    classifier: TagKeyClassifier,
    street_names: StreetNameNormalizer,
    postcodes: PostcodeNormalizer<'static>,
    report: AuditReport,
}

impl AuditEtl {
    pub fn new(config: &UserConfig) -> Result<Self> {
        Ok(AuditEtl {
            input_path: PathBuf::from(&config.data_path),
            classifier: TagKeyClassifier::new()?,
            street_names: StreetNameNormalizer::with_overrides(&config.street_mapping)?,
            postcodes: PostcodeNormalizer::new(&DisabledLookup)?,
            report: AuditReport::default(),
        })
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    pub fn report_data(&self) -> &AuditReport {
        &self.report
    }
}

impl Etl for AuditEtl {
    type Input = OsmElement;
    type Output = OsmElement;
    type Source = OsmElements<Box<dyn std::io::BufRead>>;
    type Sink = AuditReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            fs::remove_file(Self::output_path(dir))?;
        }
        Ok(())
    }

    fn extract(&mut self) -> Result<Self::Source> {
        OsmElements::from_path(&self.input_path, &ElementKind::ALL)
    }

    fn open(&mut self, dir: &Path) -> Result<Self::Sink> {
        fs::create_dir_all(dir)?;
        Ok(AuditReport::default())
    }

    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>> {
        Ok(Some(input))
    }

    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()> {
        *sink.element_counts.entry(output.kind.name().to_string()).or_insert(0) += 1;
        for child in &output.children {
            *sink.element_counts.entry(child.name.clone()).or_insert(0) += 1;
        }

        for tag in output.tags() {
            let (Some(key), Some(value)) = (tag.attr("k"), tag.attr("v")) else {
                continue;
            };
            match self.classifier.shape(key) {
                KeyShape::Lower => sink.key_shapes.lower += 1,
                KeyShape::LowerColon => sink.key_shapes.lower_colon += 1,
                KeyShape::ProblemChars => sink.key_shapes.problemchars += 1,
                KeyShape::Other => sink.key_shapes.other += 1,
            }
            if key == STREET_KEY {
                if let Some(street_type) = self.street_names.street_type(value) {
                    *sink.street_types.entry(street_type.to_string()).or_insert(0) += 1;
                }
            }
            if key == POSTCODE_KEY && !self.postcodes.is_valid(value) {
                *sink.problem_postcodes.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn close(&mut self, sink: Self::Sink) -> Result<()> {
        self.report = sink;
        Ok(())
    }

    fn report(&mut self, dir: &Path) -> Result<()> {
        let report = self.report_data();
        let file = File::create(Self::output_path(dir))?;
        serde_json::to_writer_pretty(file, report)?;

        log_table("elements", &report.element_counts);
        log_table("street_types", &report.street_types);
        log_table("problem_postcodes", &report.problem_postcodes);
        let shapes = &report.key_shapes;
        info!(
            lower = shapes.lower,
            lower_colon = shapes.lower_colon,
            problemchars = shapes.problemchars,
            other = shapes.other;
            "Keys with suspected problems"
        );
        Ok(())
    }
}
