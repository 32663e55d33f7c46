pub mod audit;
pub mod export_csv;
pub mod parse_osm;
pub mod shape;

use std::path::Path;
use log::{info, error};

use crate::errors::Result;


/// A single streaming pass: every input is transformed and loaded before the
/// next one is pulled from the source.
pub trait Etl {
    type Input;
    type Output;
    type Source: Iterator<Item = Result<Self::Input>>;
    type Sink;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self) -> Result<Self::Source>;
    fn open(&mut self, dir: &Path) -> Result<Self::Sink>;
    fn transform(&mut self, input: Self::Input) -> Result<Option<Self::Output>>;
    fn load(&mut self, sink: &mut Self::Sink, output: Self::Output) -> Result<()>;
    /// Flushes and releases the sink. Runs on every exit path.
    fn close(&mut self, sink: Self::Sink) -> Result<()>;
    /// Runs once after a pass that completed without error.
    fn report(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, source: Self::Source, sink: &mut Self::Sink) -> Result<usize> {
        let mut loaded = 0;
        for input in tqdm::tqdm(source) {
            let output = match input.and_then(|input| self.transform(input)) {
                Ok(output) => output,
                Err(err) => {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Transformation failed with error");
                    return Err(err);
                }
            };
            if let Some(output) = output {
                if let Err(err) = self.load(sink, output) {
                    error!(etl_name = self.etl_name(), err = err.message.as_str(); "Loading failed with error");
                    return Err(err);
                }
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
            return Ok(());
        }

        info!(etl_name = self.etl_name(); "Extracting");
        let source = match self.extract() {
            Ok(source) => Ok(source),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Extraction failed with error");
                Err(err)
            },
        }?;
        let mut sink = match self.open(dir) {
            Ok(sink) => Ok(sink),
            Err(err) => {
                error!(etl_name = self.etl_name(), err = err.message.as_str(); "Opening outputs failed with error");
                Err(err)
            },
        }?;

        info!(etl_name = self.etl_name(); "Transforming and loading");
        let result = self.run(source, &mut sink);
        let closed = self.close(sink);
        let loaded = result?;
        closed?;

        info!(etl_name = self.etl_name(), elements = loaded; "Process finished");
        self.report(dir)
    }
}
