use std::{thread, time::Duration};

use log::debug;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::errors::{Error, Result};

pub const SINGPOST_URL: &str = "http://www.singpost.com/find-postal-code";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/60.0.3112.113 Safari/537.36";

/// Finds the postal code of an address. Failures are reported as
/// `ErrorKind::LookupFailure`.
pub trait PostcodeLookup {
    fn lookup(&self, house_number: &str, street_name: &str) -> Result<String>;
}

/// Used when remote lookups are switched off. Never does any I/O.
pub struct DisabledLookup;

impl PostcodeLookup for DisabledLookup {
    fn lookup(&self, _house_number: &str, _street_name: &str) -> Result<String> {
        Err(Error::lookup_failure("remote postal code lookup is disabled"))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    pub url: String,
    /// Pause before every request, to stay under the service's rate limit.
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            url: SINGPOST_URL.to_string(),
            delay_ms: 5000,
            timeout_ms: 2000,
        }
    }
}

/// Scrapes the Singapore Post "find postal code" form.
pub struct SingpostLookup {
    client: Client,
    config: LookupConfig,
}

impl SingpostLookup {
    pub fn new(config: LookupConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(SingpostLookup { client, config })
    }

    fn fetch(&self, house_number: &str, street_name: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.config.url)
            .form(&[("building", house_number), ("street_name", street_name)])
            .send()?
            .error_for_status()?;
        Ok(response.text()?)
    }
}

impl PostcodeLookup for SingpostLookup {
    fn lookup(&self, house_number: &str, street_name: &str) -> Result<String> {
        thread::sleep(Duration::from_millis(self.config.delay_ms));
        debug!(house_number = house_number, street_name = street_name; "Querying postal code service");

        let body = self
            .fetch(house_number, street_name)
            .map_err(|err| Error::lookup_failure(format!("request failed: {}", err.message)))?;
        parse_postcode(&body)
    }
}

/// Reads the result table of the lookup page. The last six character row wins.
pub fn parse_postcode(body: &str) -> Result<String> {
    let table_selector = Selector::parse("#datatable-1")
        .map_err(|err| Error::lookup_failure(format!("bad selector: {:?}", err)))?;
    let row_selector = Selector::parse("p")
        .map_err(|err| Error::lookup_failure(format!("bad selector: {:?}", err)))?;

    let document = Html::parse_document(body);
    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| Error::lookup_failure("no result table in response"))?;

    table
        .select(&row_selector)
        .map(|row| row.text().collect::<String>().trim().to_string())
        .filter(|text| text.chars().count() == 6)
        .last()
        .ok_or_else(|| Error::lookup_failure("no postal code in result table"))
}
