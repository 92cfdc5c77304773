//! Per-epoch container size estimations
//!
//! Storage nodes report the size they hold for each container while the
//! window of an epoch is open. Reports are append-only: every node gets one
//! entry per `(epoch, container)` and nothing is overwritten.
//!
//! ## Window
//!
//! ```text
//! (none) ──StartEstimation──► Open ──StopEstimation──► Closed
//! ```
//!
//! ## Aggregation
//!
//! The estimate of a container is the lower median of its reports: sort the
//! sizes ascending and take index `(k - 1) / 2`.

use lode_core::{codec, ContainerId, Context, Epoch, GovError, Notification, Result};
use lode_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::container::{ContainerContract, SIZE_TABLE, WINDOW_TABLE};

/// Estimation window state of one epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowState {
    Open,
    Closed,
}

/// One node's report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReport {
    pub reporter: PublicKey,
    pub size: u64,
}

/// Aggregated estimate of one container for one epoch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Estimation {
    pub epoch: Epoch,
    pub container_id: ContainerId,
    pub reports: Vec<SizeReport>,
    /// Lower median of `reports`
    pub size: u64,
}

/// Lower median; `None` for no reports
pub fn aggregate_size(reports: &[SizeReport]) -> Option<u64> {
    if reports.is_empty() {
        return None;
    }
    let mut sizes: Vec<u64> = reports.iter().map(|r| r.size).collect();
    sizes.sort_unstable();
    Some(sizes[(sizes.len() - 1) / 2])
}

impl ContainerContract {
    pub fn start_estimation(&self, ctx: &mut Context<'_>, epoch: Epoch) -> Result<()> {
        ctx.require_alphabet("startEstimation")?;
        let key = self.ns(WINDOW_TABLE).key(&[&epoch.to_be_bytes()]);
        if let Some(state) = ctx.get_decoded::<WindowState>(&key)? {
            return Err(GovError::Conflict(format!(
                "estimation window for epoch {} already {:?}",
                epoch, state
            )));
        }
        ctx.put_encoded(key, &WindowState::Open)?;
        info!(epoch, "estimation window opened");
        ctx.notify(self.hash(), Notification::StartEstimation { epoch })
    }

    pub fn stop_estimation(&self, ctx: &mut Context<'_>, epoch: Epoch) -> Result<()> {
        ctx.require_alphabet("stopEstimation")?;
        let key = self.ns(WINDOW_TABLE).key(&[&epoch.to_be_bytes()]);
        match ctx.get_decoded::<WindowState>(&key)? {
            None => {
                return Err(GovError::NotFound(format!(
                    "estimation window for epoch {}",
                    epoch
                )))
            }
            Some(WindowState::Closed) => {
                return Err(GovError::Conflict(format!(
                    "estimation window for epoch {} already closed",
                    epoch
                )))
            }
            Some(WindowState::Open) => {}
        }
        ctx.put_encoded(key, &WindowState::Closed)?;
        info!(epoch, "estimation window closed");
        ctx.notify(self.hash(), Notification::StopEstimation { epoch })
    }

    pub fn estimation_window(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Option<WindowState>> {
        ctx.get_decoded(&self.ns(WINDOW_TABLE).key(&[&epoch.to_be_bytes()]))
    }

    /// Record `public_key`'s size report for `container_id`
    ///
    /// The reporter must sign the transaction and be part of the netmap
    /// snapshot of `epoch`.
    pub fn put_container_size(
        &self,
        ctx: &mut Context<'_>,
        epoch: Epoch,
        container_id: ContainerId,
        size: u64,
        public_key: PublicKey,
    ) -> Result<()> {
        ctx.require_witness(&public_key.address(), "putContainerSize")?;
        if self.estimation_window(ctx, epoch)? != Some(WindowState::Open) {
            return Err(GovError::WindowClosed { epoch });
        }
        if !self.netmap(ctx)?.in_snapshot(ctx, epoch, &public_key)? {
            return Err(GovError::AuthorizationFailure(format!(
                "putContainerSize: {} is not in the netmap of epoch {}",
                public_key, epoch
            )));
        }

        let key = self.ns(SIZE_TABLE).key(&[
            &epoch.to_be_bytes(),
            container_id.as_bytes(),
            public_key.as_bytes(),
        ]);
        if ctx.contains(&key) {
            return Err(GovError::Conflict(format!(
                "{} already reported container {} for epoch {}",
                public_key, container_id, epoch
            )));
        }
        let report = SizeReport {
            reporter: public_key,
            size,
        };
        ctx.put_encoded(key, &report)?;
        debug!(epoch, container = %container_id, node = %public_key, size, "size reported");
        Ok(())
    }

    /// Estimate for one container
    pub fn get_container_size(
        &self,
        ctx: &Context<'_>,
        epoch: Epoch,
        container_id: &ContainerId,
    ) -> Result<Estimation> {
        let prefix = self
            .ns(SIZE_TABLE)
            .key(&[&epoch.to_be_bytes(), container_id.as_bytes()]);
        let reports = ctx
            .scan(&prefix)
            .into_iter()
            .map(|(_, raw)| codec::decode::<SizeReport>(&raw))
            .collect::<Result<Vec<_>>>()?;
        let size = aggregate_size(&reports).ok_or_else(|| {
            GovError::NotFound(format!(
                "size estimation for container {} in epoch {}",
                container_id, epoch
            ))
        })?;
        Ok(Estimation {
            epoch,
            container_id: *container_id,
            reports,
            size,
        })
    }

    /// Estimates for every reported container of `epoch`, by container id
    pub fn list_container_sizes(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Vec<Estimation>> {
        let prefix = self.ns(SIZE_TABLE).key(&[&epoch.to_be_bytes()]);
        let mut grouped: BTreeMap<ContainerId, Vec<SizeReport>> = BTreeMap::new();
        for (key, raw) in ctx.scan(&prefix) {
            let rest = &key[prefix.len()..];
            if rest.len() < 32 {
                continue;
            }
            let id = ContainerId::from_slice(&rest[..32])?;
            grouped.entry(id).or_default().push(codec::decode(&raw)?);
        }
        Ok(grouped
            .into_iter()
            .filter_map(|(container_id, reports)| {
                aggregate_size(&reports).map(|size| Estimation {
                    epoch,
                    container_id,
                    reports,
                    size,
                })
            })
            .collect())
    }
}
