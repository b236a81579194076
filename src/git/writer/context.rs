//! Per-session state shared by every writer of one archive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::core::{MetaDataMap, TimeSampling, WrittenSampleId, WrittenSampleKey, WrittenSampleMap};
use crate::git::format::SAMPLE_KEY_SIZE;
use crate::repo::Repository;
use crate::util::{Error, Result};

/// Tables accumulated during a write session and flushed on close.
#[derive(Debug, Default)]
pub(crate) struct SessionTables {
    pub written: WrittenSampleMap,
    pub metadata: MetaDataMap,
    pub time_samplings: Vec<TimeSampling>,
    pub max_samples: Vec<u32>,
}

/// Session context handed to every writer at construction.
#[derive(Debug)]
pub(crate) struct WriteContext {
    repo: Arc<dyn Repository>,
    tables: Mutex<SessionTables>,
    dedup: AtomicBool,
    frozen: AtomicBool,
}

impl WriteContext {
    /// New session; time sampling 0 is always the identity sampling.
    pub(crate) fn new(repo: Arc<dyn Repository>, dedup: bool) -> Arc<Self> {
        let tables = SessionTables {
            time_samplings: vec![TimeSampling::identity()],
            max_samples: vec![0],
            ..SessionTables::default()
        };
        Arc::new(Self {
            repo,
            tables: Mutex::new(tables),
            dedup: AtomicBool::new(dedup),
            frozen: AtomicBool::new(false),
        })
    }

    pub(crate) fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, SessionTables> {
        self.tables.lock()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.frozen.load(Ordering::Acquire) {
            Err(Error::Frozen)
        } else {
            Ok(())
        }
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub(crate) fn set_dedup(&self, enabled: bool) {
        self.dedup.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn dedup_enabled(&self) -> bool {
        self.dedup.load(Ordering::Relaxed)
    }

    /// Register `ts`, reusing the index of an equivalent sampling.
    pub(crate) fn add_time_sampling(&self, ts: TimeSampling) -> Result<u32> {
        self.ensure_open()?;
        ts.validate()?;
        let mut tables = self.tables();
        if let Some(i) = tables.time_samplings.iter().position(|t| t.is_equivalent(&ts)) {
            return Ok(i as u32);
        }
        tables.time_samplings.push(ts);
        tables.max_samples.push(0);
        Ok((tables.time_samplings.len() - 1) as u32)
    }

    pub(crate) fn check_time_sampling(&self, index: u32) -> Result<()> {
        let count = self.tables().time_samplings.len();
        if (index as usize) < count {
            Ok(())
        } else {
            Err(Error::InvalidTimeSampling { index, count })
        }
    }

    /// Raise the max-samples hint of sampling `index`.
    pub(crate) fn record_num_samples(&self, index: u32, num_samples: u32) {
        if let Some(max) = self.tables().max_samples.get_mut(index as usize) {
            *max = (*max).max(num_samples);
        }
    }

    /// Receipt for a payload, writing `digest + payload` unless an
    /// identical payload was already written this session. The flag is
    /// true when an earlier receipt was reused.
    pub(crate) fn store_sample(&self, key: WrittenSampleKey, payload: &[u8]) -> Result<(WrittenSampleId, bool)> {
        let dedup = self.dedup_enabled();
        if dedup {
            if let Some(found) = self.tables().written.find(&key) {
                trace!(digest = %key.digest, location = %found.location, "dedup hit");
                return Ok((found.clone(), true));
            }
        }

        let mut blob = Vec::with_capacity(SAMPLE_KEY_SIZE + payload.len());
        blob.extend_from_slice(key.digest.as_bytes());
        blob.extend_from_slice(payload);
        let location = self.repo.put_blob(&blob)?;

        let receipt = WrittenSampleId::new(key, location);
        if dedup {
            self.tables().written.store(receipt.clone());
        }
        Ok((receipt, false))
    }
}
