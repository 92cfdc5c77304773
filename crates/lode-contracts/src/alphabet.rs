//! Alphabet ballots
//!
//! The Alphabet casts one ballot per epoch for the committee candidates of
//! the next election. Member `i` (in designation order) backs
//! `candidates[i % len]`, so a short list is spread over the whole Alphabet.

use lode_core::{Context, Epoch, GovError, Namespace, Notification, Result};
use lode_crypto::{Address, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{self, Link, Migration};
use crate::netmap::NetmapContract;

const BALLOT_TABLE: u8 = 0x01;

/// One Alphabet member's pick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry {
    pub member: PublicKey,
    pub candidate: PublicKey,
}

/// Handle to a deployed Alphabet contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlphabetContract {
    hash: Address,
}

impl AlphabetContract {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn ballots(&self) -> Namespace {
        Namespace::new(&self.hash, BALLOT_TABLE)
    }

    fn netmap(&self, ctx: &Context<'_>) -> Result<NetmapContract> {
        Ok(NetmapContract::at(common::link(ctx, &self.hash, Link::Netmap)?))
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>, netmap: Address) -> Result<()> {
        common::install(ctx, &self.hash, &[(Link::Netmap, netmap)])
    }

    /// Record the Alphabet ballot for the current epoch
    ///
    /// `epoch` must match the netmap epoch and each epoch takes a single
    /// ballot.
    pub fn vote(&self, ctx: &mut Context<'_>, epoch: Epoch, candidates: Vec<PublicKey>) -> Result<()> {
        ctx.require_alphabet("vote")?;
        let current = self.netmap(ctx)?.epoch(ctx)?;
        if epoch != current {
            return Err(GovError::SequenceViolation {
                expected: current,
                got: epoch,
            });
        }
        if candidates.is_empty() {
            return Err(GovError::InvalidArgument("vote: empty candidate list".into()));
        }
        let key = self.ballots().key(&[&epoch.to_be_bytes()]);
        if ctx.contains(&key) {
            return Err(GovError::Conflict(format!("ballot for epoch {} already cast", epoch)));
        }

        let ballot: Vec<BallotEntry> = ctx
            .alphabet_keys()
            .into_iter()
            .enumerate()
            .map(|(i, member)| BallotEntry {
                member,
                candidate: candidates[i % candidates.len()],
            })
            .collect();
        ctx.put_encoded(key, &ballot)?;
        info!(epoch, members = ballot.len(), candidates = candidates.len(), "alphabet vote");
        ctx.notify(self.hash, Notification::Vote { epoch, candidates })
    }

    pub fn ballot(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Vec<BallotEntry>> {
        ctx.get_decoded(&self.ballots().key(&[&epoch.to_be_bytes()]))?
            .ok_or_else(|| GovError::NotFound(format!("ballot for epoch {}", epoch)))
    }

    /// Members backing each candidate, in first-seen order
    pub fn tally(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Vec<(PublicKey, usize)>> {
        let mut tally: Vec<(PublicKey, usize)> = Vec::new();
        for entry in self.ballot(ctx, epoch)? {
            match tally.iter_mut().find(|(candidate, _)| *candidate == entry.candidate) {
                Some((_, count)) => *count += 1,
                None => tally.push((entry.candidate, 1)),
            }
        }
        Ok(tally)
    }

    pub fn version(&self, ctx: &Context<'_>) -> Result<u32> {
        common::version(ctx, &self.hash)
    }

    pub fn update(&self, ctx: &mut Context<'_>, migration: &Migration) -> Result<()> {
        ctx.require_committee("update")?;
        common::apply_update(ctx, &self.hash, migration)
    }
}
