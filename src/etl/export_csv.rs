use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use csv::{Writer, WriterBuilder};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::UserConfig;
use crate::clean::ElementCleaner;
use crate::clean::lookup::PostcodeLookup;
use crate::clean::postcode::PostcodeNormalizer;
use crate::clean::street_name::StreetNameNormalizer;
use crate::clean::tag_key::TagKeyClassifier;
use crate::data::osm::{ElementKind, OsmElement};
use crate::data::records::{NODE_FIELDS, NODE_TAGS_FIELDS, WAY_FIELDS, WAY_NODES_FIELDS, WAY_TAGS_FIELDS};
use crate::data::ShapedElement;
use crate::errors::Result;
use crate::validate::SchemaValidator;

use super::parse_osm::OsmElements;
use super::shape::ElementShaper;
use super::Etl;

pub const ETL_NAME: &str = "export_csv";
pub const NODES_FILE_NAME: &str = "nodes.csv";
pub const NODE_TAGS_FILE_NAME: &str = "nodes_tags.csv";
pub const WAYS_FILE_NAME: &str = "ways.csv";
pub const WAY_NODES_FILE_NAME: &str = "ways_nodes.csv";
pub const WAY_TAGS_FILE_NAME: &str = "ways_tags.csv";
pub const STAMP_FILE_NAME: &str = "export_csv.done.json";

pub const OUTPUT_FILE_NAMES: [&str; 5] = [
    NODES_FILE_NAME,
    NODE_TAGS_FILE_NAME,
    WAYS_FILE_NAME,
    WAY_NODES_FILE_NAME,
    WAY_TAGS_FILE_NAME,
];

/// One header-first CSV file and the number of rows written to it.
pub struct Table {
    writer: Writer<File>,
    rows: usize,
}

impl Table {
    fn create(path: &Path, header: &[&str]) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(header)?;
        Ok(Table { writer, rows: 0 })
    }

    fn append<S: Serialize>(&mut self, rows: &[S]) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.rows += rows.len();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

/// The five output tables, written in lockstep.
pub struct CsvTables {
    pub nodes: Table,
    pub node_tags: Table,
    pub ways: Table,
    pub way_nodes: Table,
    pub way_tags: Table,
}

impl CsvTables {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(CsvTables {
            nodes: Table::create(&dir.join(NODES_FILE_NAME), &NODE_FIELDS)?,
            node_tags: Table::create(&dir.join(NODE_TAGS_FILE_NAME), &NODE_TAGS_FIELDS)?,
            ways: Table::create(&dir.join(WAYS_FILE_NAME), &WAY_FIELDS)?,
            way_nodes: Table::create(&dir.join(WAY_NODES_FILE_NAME), &WAY_NODES_FIELDS)?,
            way_tags: Table::create(&dir.join(WAY_TAGS_FILE_NAME), &WAY_TAGS_FIELDS)?,
        })
    }

    pub fn write(&mut self, element: &ShapedElement) -> Result<()> {
        match element {
            ShapedElement::Node { node, tags } => {
                self.nodes.append(std::slice::from_ref(node))?;
                self.node_tags.append(tags)?;
            }
            ShapedElement::Way { way, nodes, tags } => {
                self.ways.append(std::slice::from_ref(way))?;
                self.way_nodes.append(nodes)?;
                self.way_tags.append(tags)?;
            }
        }
        Ok(())
    }

    /// Flushes every table, even when an earlier one fails.
    pub fn flush(&mut self) -> Result<()> {
        let results = [
            self.nodes.flush(),
            self.node_tags.flush(),
            self.ways.flush(),
            self.way_nodes.flush(),
            self.way_tags.flush(),
        ];
        results.into_iter().collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RowCounts {
    pub nodes: usize,
    pub node_tags: usize,
    pub ways: usize,
    pub way_nodes: usize,
    pub way_tags: usize,
}

/// Written after a pass that completed. Outputs are reused only while it
/// matches the current input and options.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct ExportStamp {
    input_path: String,
    input_len: u64,
    input_modified_secs: u64,
    validated: bool,
    strict: bool,
}

/// Streams nodes and ways into the five relational tables.
pub struct ExportCsvEtl<'a> {
    input_path: PathBuf,
    strict: bool,
    validated: bool,
    shaper: ElementShaper,
    cleaner: ElementCleaner<'a>,
    validator: Option<SchemaValidator>,
    skipped: usize,
    counts: RowCounts,
}

impl<'a> ExportCsvEtl<'a> {
    pub fn new(config: &UserConfig, lookup: &'a dyn PostcodeLookup) -> Result<Self> {
        let validator = if config.validate {
            Some(SchemaValidator::new()?)
        } else {
            None
        };
        Ok(ExportCsvEtl {
            input_path: PathBuf::from(&config.data_path),
            strict: config.strict,
            validated: config.validate,
            shaper: ElementShaper::new(TagKeyClassifier::new()?),
            cleaner: ElementCleaner::new(
                StreetNameNormalizer::with_overrides(&config.street_mapping)?,
                PostcodeNormalizer::new(lookup)?,
            ),
            validator,
            skipped: 0,
            counts: RowCounts::default(),
        })
    }

    pub fn row_counts(&self) -> &RowCounts {
        &self.counts
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn output_paths(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        OUTPUT_FILE_NAMES.iter().map(move |name| dir.join(name))
    }

    fn stamp_path(dir: &Path) -> PathBuf {
        dir.join(STAMP_FILE_NAME)
    }

    fn stamp(&self) -> Result<ExportStamp> {
        let metadata = fs::metadata(&self.input_path)?;
        let input_modified_secs = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Ok(ExportStamp {
            input_path: self.input_path.to_string_lossy().to_string(),
            input_len: metadata.len(),
            input_modified_secs,
            validated: self.validated,
            strict: self.strict,
        })
    }

    fn remove_stamp(dir: &Path) -> Result<()> {
        let path = Self::stamp_path(dir);
        if path.try_exists()? {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Etl for ExportCsvEtl<'_> {
    type Input = OsmElement;
    type Output = ShapedElement;
    type Source = OsmElements<Box<dyn std::io::BufRead>>;
    type Sink = CsvTables;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        let stamp_path = Self::stamp_path(dir);
        if !stamp_path.try_exists()? {
            return Ok(false);
        }
        for path in Self::output_paths(dir) {
            if !path.try_exists()? {
                return Ok(false);
            }
        }
        // an unreadable input is reported by extract, not here
        let Ok(current) = self.stamp() else {
            return Ok(false);
        };
        match serde_json::from_reader::<_, ExportStamp>(File::open(stamp_path)?) {
            Ok(written) => Ok(written == current),
            Err(_) => Ok(false),
        }
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        Self::remove_stamp(dir)?;
        for path in Self::output_paths(dir) {
            if path.try_exists()? {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn extract(&mut self) -> Result<Self::Source> {
        OsmElements::from_path(&self.input_path, &[ElementKind::Node, ElementKind::Way])
    }

    fn open(&mut self, dir: &Path) -> Result<Self::Sink> {
        Self::remove_stamp(dir)?;
        CsvTables::create(dir)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>> {
        let shaped = match self.shaper.shape(&input) {
            Ok(shaped) => shaped,
            Err(err) if err.is_field_error() && !self.strict => {
                warn!(err = err.message.as_str(); "Skipping element");
                self.skipped += 1;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let Some(mut element) = shaped else {
            return Ok(None);
        };

        self.cleaner.clean(&mut element);
        if let Some(validator) = &self.validator {
            validator.validate(&element)?;
        }
        Ok(Some(element))
    }

    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()> {
        sink.write(&output)
    }

    fn close(&mut self, mut sink: Self::Sink) -> Result<()> {
        self.counts = RowCounts {
            nodes: sink.nodes.rows,
            node_tags: sink.node_tags.rows,
            ways: sink.ways.rows,
            way_nodes: sink.way_nodes.rows,
            way_tags: sink.way_tags.rows,
        };
        sink.flush()
    }

    fn report(&mut self, dir: &Path) -> Result<()> {
        let counts = self.row_counts();
        info!(
            nodes = counts.nodes,
            node_tags = counts.node_tags,
            ways = counts.ways,
            way_nodes = counts.way_nodes,
            way_tags = counts.way_tags,
            skipped = self.skipped();
            "Loading successful"
        );
        for path in Self::output_paths(dir) {
            let megabytes = fs::metadata(&path)?.len() as f64 / 1e6;
            let file = path.file_name().and_then(|name| name.to_str()).unwrap_or("?");
            info!(file = file, size_mb = megabytes; "Output file size");
        }

        let stamp = self.stamp()?;
        serde_json::to_writer_pretty(File::create(Self::stamp_path(dir))?, &stamp)?;
        Ok(())
    }
}
