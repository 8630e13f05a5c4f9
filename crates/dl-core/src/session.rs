//! The tiered cache orchestrator.
//!
//! A [`DataLogger`] holds the resolved configuration. [`DataLogger::setup`]
//! binds one `(project, table, day)` to a [`Session`], whose `load_*` methods
//! return each derived tier from the cache, rebuilding it from its source tier
//! when the cache file is missing or corrupt.
//!
//! Rebuilds are serialized per tier by a [`BuildLock`] in the cache directory.
//! A builder holding the lock of one tier only ever requests lower tiers, so
//! locks are always taken in descending tier order.

use crate::cache::{
    remove_if_exists, series_array_file_name, series_stats_file_name, BuildLock, CacheError,
    CacheLocation, QUANTILE_FILE, TOTAL_STATS_FILE,
};
use crate::calendar::{self, format_day, parse_day};
use crate::ingest::{resolve_raw_file, RawReader};
use crate::quantile::QuantileArray;
use crate::series::{KeyFilter, SeriesArray, SeriesStats};
use crate::total_stats::TotalStats;
use chrono::NaiveDate;
use dl_common::{decode_filename, ArtifactTier, CompositeKey, Error, Result, SessionId};
use dl_config::{DataLoggerConfig, TableMetadata};
use dl_math::StatFunc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point: configuration plus the table metadata store.
#[derive(Debug, Clone)]
pub struct DataLogger {
    config: Arc<DataLoggerConfig>,
}

impl DataLogger {
    pub fn new(config: DataLoggerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Load `datalogger.json` from `basedir`.
    pub fn open(basedir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(DataLoggerConfig::load(basedir)?))
    }

    pub fn config(&self) -> &DataLoggerConfig {
        &self.config
    }

    pub fn projects(&self) -> Vec<&str> {
        self.config.projects()
    }

    pub fn tables(&self, project: &str) -> Result<Vec<&str>> {
        self.config.tables(project)
    }

    /// Bind a day of one table.
    ///
    /// Fails for an invalid day string, for today's still-growing data, and
    /// for unknown or invalid table definitions. Nothing is read from the
    /// cache or raw directories.
    pub fn setup(&self, project: &str, table: &str, day: &str, timedelta: f64) -> Result<Session> {
        let date = parse_day(day)?;
        if calendar::is_live(date) {
            return Err(Error::LiveData {
                day: format_day(date),
            });
        }
        let meta = Arc::new(self.config.table_metadata(project, table)?);
        let day = format_day(date);
        let location = CacheLocation::new(self.config.cachedir(), &day, project, table);
        let session = Session {
            id: SessionId::new(),
            config: Arc::clone(&self.config),
            meta,
            date,
            day,
            timedelta,
            location,
        };
        debug!(session = %session.id, project, table, day = %session.day, "session ready");
        Ok(session)
    }

    /// Day-by-day values of every statistic of one key and column across a
    /// `YYYY-MM` month.
    ///
    /// Days without raw input are skipped; the walk stops at today.
    pub fn series_stats_longtime(
        &self,
        project: &str,
        table: &str,
        month: &str,
        key: &CompositeKey,
        column: &str,
    ) -> Result<BTreeMap<StatFunc, Vec<(String, f64)>>> {
        let mut out: BTreeMap<StatFunc, Vec<(String, f64)>> = BTreeMap::new();
        for date in calendar::monthwalker(month)? {
            let day = format_day(date);
            let session = match self.setup(project, table, &day, 0.0) {
                Ok(session) => session,
                Err(Error::LiveData { .. }) => {
                    debug!(%day, "reached live data, stopping");
                    break;
                }
                Err(e) => return Err(e),
            };
            let filter = KeyFilter::exact(&session.meta.index_keynames, key);
            let stats = match session.load_series_stats(Some(&filter)) {
                Ok(stats) => stats,
                Err(Error::RawFileMissing { path }) => {
                    warn!(%day, path = %path.display(), "no raw input, skipping day");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(record) = stats.get(key).and_then(|columns| columns.get(column)) else {
                continue;
            };
            for (func, value) in record {
                out.entry(*func).or_default().push((day.clone(), *value));
            }
        }
        Ok(out)
    }
}

/// What currently exists in one session's cache location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInventory {
    pub raw_file: Option<PathBuf>,
    /// Index column names of series array listings.
    pub series_array: Vec<CompositeKey>,
    /// Keys with a sample file.
    pub series: Vec<CompositeKey>,
    /// Index column names of series stats files.
    pub series_stats: Vec<CompositeKey>,
    pub quantile: bool,
    pub total_stats: bool,
}

/// One `(project, table, day)` bound to its cache directory.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    config: Arc<DataLoggerConfig>,
    meta: Arc<TableMetadata>,
    date: NaiveDate,
    day: String,
    timedelta: f64,
    location: CacheLocation,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    pub fn meta(&self) -> &TableMetadata {
        &self.meta
    }

    /// Cache directory of this session; may not exist yet.
    pub fn cache_dir(&self) -> &Path {
        self.location.path()
    }

    /// Per-key time series of the day.
    pub fn load_series_array(&self, filter: Option<&KeyFilter>) -> Result<SeriesArray> {
        let (index_keys, value_keys) = (&self.meta.index_keynames, &self.meta.value_keynames);
        self.load_tier(
            ArtifactTier::SeriesArray,
            || SeriesArray::load(self.cache_dir(), index_keys, value_keys, filter),
            || {
                let reader = RawReader::open(Arc::clone(&self.meta), self.date, self.timedelta)?;
                let array = SeriesArray::from_raw(reader, &self.meta)?;
                array.dump(self.cache_dir())?;
                Ok(match filter {
                    Some(f) => array.filtered(f),
                    None => array,
                })
            },
        )
    }

    /// Per-key statistics of the day.
    pub fn load_series_stats(&self, filter: Option<&KeyFilter>) -> Result<SeriesStats> {
        let (index_keys, value_keys) = (&self.meta.index_keynames, &self.meta.value_keynames);
        self.load_tier(
            ArtifactTier::SeriesStats,
            || SeriesStats::load(self.cache_dir(), index_keys, value_keys, filter),
            || {
                let array = self.load_series_array(None)?;
                let stats = SeriesStats::from_array(&array);
                stats.dump(self.cache_dir())?;
                Ok(match filter {
                    Some(f) => stats.filtered(f),
                    None => stats,
                })
            },
        )
    }

    /// Histograms of every value column.
    pub fn load_quantiles(&self) -> Result<QuantileArray> {
        self.load_tier(
            ArtifactTier::Quantile,
            || QuantileArray::load(self.cache_dir()),
            || {
                let array = self.load_series_array(None)?;
                let quantiles = QuantileArray::new(&array)?;
                quantiles.dump(self.cache_dir())?;
                Ok(quantiles)
            },
        )
    }

    /// Day-wide totals; computed once and then always served from the cache.
    pub fn load_total_stats(&self) -> Result<TotalStats> {
        self.load_tier(
            ArtifactTier::TotalStats,
            || TotalStats::load(self.cache_dir()),
            || {
                let stats = self.load_series_stats(None)?;
                let totals = TotalStats::from_stats(&stats);
                totals.dump(self.cache_dir())?;
                Ok(totals)
            },
        )
    }

    fn load_tier<T>(
        &self,
        tier: ArtifactTier,
        read: impl Fn() -> std::result::Result<T, CacheError>,
        build: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.location.ensure(self.config.ownership())?;
        match read() {
            Ok(artifact) => {
                debug!(session = %self.id, %tier, "cache hit");
                return Ok(artifact);
            }
            Err(CacheError::Missing(_)) => {}
            Err(e) if e.is_recoverable() => {
                warn!(session = %self.id, %tier, error = %e, "discarding corrupt cache file");
            }
            Err(e) => return Err(e.into()),
        }

        let _lock = BuildLock::acquire(self.cache_dir(), tier)?;
        match read() {
            Ok(artifact) => {
                debug!(session = %self.id, %tier, "built concurrently by another caller");
                return Ok(artifact);
            }
            Err(e) if e.is_recoverable() => {}
            Err(e) => return Err(e.into()),
        }
        self.remove_tier_files(tier)?;
        info!(
            session = %self.id,
            %tier,
            source = %tier.source().unwrap_or(ArtifactTier::Raw),
            "rebuilding cache"
        );
        build()
    }

    /// Delete every file of `tier` in the cache location.
    fn remove_tier_files(&self, tier: ArtifactTier) -> Result<()> {
        let index_keys = &self.meta.index_keynames;
        let names: Vec<String> = match tier {
            ArtifactTier::Raw => Vec::new(),
            ArtifactTier::SeriesArray => {
                let mut names: Vec<String> = self
                    .location
                    .cache_files()?
                    .into_iter()
                    .filter(|name| name.starts_with("ts_"))
                    .collect();
                names.push(series_array_file_name(index_keys));
                names
            }
            ArtifactTier::SeriesStats => vec![series_stats_file_name(index_keys)],
            ArtifactTier::Quantile => vec![QUANTILE_FILE.to_string()],
            ArtifactTier::TotalStats => vec![TOTAL_STATS_FILE.to_string()],
        };
        for name in names {
            if remove_if_exists(&self.location.file(&name))? {
                debug!(session = %self.id, file = %name, "removed stale cache file");
            }
        }
        Ok(())
    }

    /// Inject a series array built elsewhere.
    ///
    /// The array must use exactly the table's index and value columns. An
    /// existing series array cache is never overwritten. Series stats and
    /// quantiles are derived and persisted right away.
    pub fn import_series_array(&self, array: &SeriesArray) -> Result<()> {
        if array.index_keys() != self.meta.index_keynames.as_slice() {
            return Err(Error::Config(format!(
                "index columns {:?} do not match table definition {:?}",
                array.index_keys(),
                self.meta.index_keynames
            )));
        }
        if array.value_keys() != self.meta.value_keynames.as_slice() {
            return Err(Error::Config(format!(
                "value columns {:?} do not match table definition {:?}",
                array.value_keys(),
                self.meta.value_keynames
            )));
        }
        self.location.ensure(self.config.ownership())?;
        {
            let _lock = BuildLock::acquire(self.cache_dir(), ArtifactTier::SeriesArray)?;
            let listing = self.location.file(&array.file_name());
            if listing.exists() {
                return Err(Error::CacheConflict(listing));
            }
            array.dump(self.cache_dir())?;
        }
        info!(session = %self.id, keys = array.len(), "imported series array");

        {
            let _lock = BuildLock::acquire(self.cache_dir(), ArtifactTier::SeriesStats)?;
            SeriesStats::from_array(array).dump(self.cache_dir())?;
        }
        if array.is_empty() {
            warn!(session = %self.id, "imported series array is empty, no quantiles derived");
            return Ok(());
        }
        let _lock = BuildLock::acquire(self.cache_dir(), ArtifactTier::Quantile)?;
        QuantileArray::new(array)?.dump(self.cache_dir())
    }

    /// Iterate the day's raw rows without touching the cache.
    pub fn raw_reader(&self) -> Result<RawReader> {
        RawReader::open(Arc::clone(&self.meta), self.date, self.timedelta)
    }

    /// Inventory of the raw input and the cache location.
    pub fn list_caches(&self) -> Result<CacheInventory> {
        let raw_file = match resolve_raw_file(&self.meta.raw_dir, &self.meta.table, self.date) {
            Ok(path) => Some(path),
            Err(Error::RawFileMissing { .. }) => None,
            Err(e) => return Err(e),
        };
        let mut inventory = CacheInventory {
            raw_file,
            series_array: Vec::new(),
            series: Vec::new(),
            series_stats: Vec::new(),
            quantile: false,
            total_stats: false,
        };
        for name in self.location.cache_files()? {
            if name.starts_with("tsastat_") {
                inventory.series_stats.push(decode_filename(&name)?);
            } else if name.starts_with("tsa_") {
                inventory.series_array.push(decode_filename(&name)?);
            } else if name.starts_with("ts_") {
                inventory.series.push(decode_filename(&name)?);
            } else if name == QUANTILE_FILE {
                inventory.quantile = true;
            } else if name == TOTAL_STATS_FILE {
                inventory.total_stats = true;
            }
        }
        Ok(inventory)
    }

    /// Remove every cache artifact of this session; returns how many.
    pub fn delete_caches(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.location.cache_files()? {
            if remove_if_exists(&self.location.file(&name))? {
                removed += 1;
            }
        }
        info!(session = %self.id, removed, "deleted cache files");
        Ok(removed)
    }
}
