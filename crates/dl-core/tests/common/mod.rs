//! Shared on-disk fixture: a base directory with one SNMP interface table.

#![allow(dead_code)]

use dl_core::calendar::{day_window, parse_day};
use dl_core::{DataLogger, Session};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PROJECT: &str = "snmp";
pub const TABLE: &str = "ifTable";
pub const DAY: &str = "2024-03-05";

const META: &str = r#"{
    "headers": ["ts", "hostname", "ifDescr", "ifInOctets", "ifOutUtil", "ifSpeed"],
    "delimiter": "\t",
    "ts_keyname": "ts",
    "index_keynames": ["hostname", "ifDescr"],
    "value_keynames": {"ifInOctets": "asis", "ifOutUtil": "percent"},
    "blacklist": ["ifSpeed"]
}"#;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("cache")).unwrap();
        fs::write(
            base.join("datalogger.json"),
            format!(r#"{{"cachedir": "cache", "projects": {{"{PROJECT}": {{"{TABLE}": {{}}}}}}}}"#),
        )
        .unwrap();
        fs::create_dir_all(base.join(PROJECT).join("meta")).unwrap();
        fs::create_dir_all(base.join(PROJECT).join("raw")).unwrap();
        fs::write(base.join(PROJECT).join("meta").join(format!("{TABLE}.json")), META).unwrap();
        Self { dir }
    }

    /// Fixture with the standard raw file for [`DAY`].
    pub fn with_day() -> Self {
        let fixture = Self::new();
        fixture.write_standard_day(DAY);
        fixture
    }

    pub fn basedir(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw_path(&self, day: &str) -> PathBuf {
        self.basedir()
            .join(PROJECT)
            .join("raw")
            .join(format!("{TABLE}_{day}.csv"))
    }

    pub fn cache_dir(&self, day: &str) -> PathBuf {
        self.basedir().join("cache").join(day).join(PROJECT).join(TABLE)
    }

    pub fn datalogger(&self) -> DataLogger {
        DataLogger::open(self.basedir()).unwrap()
    }

    pub fn session(&self) -> Session {
        self.datalogger().setup(PROJECT, TABLE, DAY, 0.0).unwrap()
    }

    /// Write raw rows `(seconds after midnight, host, interface, in, out%)`.
    pub fn write_raw(&self, day: &str, rows: &[(i64, &str, &str, f64, f64)]) {
        let (start, _) = day_window(parse_day(day).unwrap());
        let mut text = String::from("ts\thostname\tifDescr\tifInOctets\tifOutUtil\tifSpeed\n");
        for (offset, host, interface, inbound, outbound) in rows {
            text.push_str(&format!(
                "{}\t{host}\t{interface}\t{inbound}\t{outbound}%\t1000\n",
                start + offset
            ));
        }
        fs::write(self.raw_path(day), text).unwrap();
    }

    /// Two hosts with two interfaces each, twelve samples per key.
    pub fn write_standard_day(&self, day: &str) {
        let mut rows = Vec::new();
        for (h, host) in ["srv1", "srv2"].into_iter().enumerate() {
            for (i, interface) in ["eth0", "eth1"].into_iter().enumerate() {
                for n in 0..12i64 {
                    let inbound = (n * 100 + h as i64 * 1000 + i as i64 * 10) as f64;
                    let outbound = ((n * 7 + h as i64 * 13 + i as i64 * 29) % 100) as f64;
                    rows.push((n * 300, host, interface, inbound, outbound));
                }
            }
        }
        self.write_raw(day, &rows);
    }
}
