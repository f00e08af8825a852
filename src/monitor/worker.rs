//! Background funding worker.
//!
//! A single thread drains the pending queue once per block-committed wake,
//! applies cooldown and solvency rules per holding kind, and submits funding
//! transfers through the gateway. Failures while processing one entry are
//! logged with full identifying context and never abort the drain loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, error, warn};

use crate::account::HoldingKind;
use crate::error::FundingResult;
use crate::ledger::{AccountView, LedgerReader};
use crate::monitor::policy::FundingParams;
use crate::monitor::queue::PendingQueue;
use crate::monitor::registry::MonitoredAccount;
use crate::tx::{TransferDraft, TransferGateway, TransferPayload, TRANSFER_DEADLINE_BLOCKS};

/// Everything the worker thread owns.
pub(crate) struct WorkerContext {
    pub ledger: Arc<dyn LedgerReader>,
    pub gateway: Arc<dyn TransferGateway>,
    pub queue: Arc<PendingQueue>,
    pub stopped: Arc<AtomicBool>,
    pub wake_rx: Receiver<()>,
}

/// Worker loop: Idle (blocked on the wake signal) -> Draining -> Idle, until
/// the stop flag is observed or the wake channel disconnects.
pub(crate) fn worker_loop(ctx: &WorkerContext) {
    debug!("funding worker started");
    let mut suspended: Vec<Arc<MonitoredAccount>> = Vec::new();
    loop {
        if ctx.wake_rx.recv().is_err() {
            // All senders gone: the subsystem was dropped.
            break;
        }
        if ctx.stopped.load(Ordering::Acquire) {
            break;
        }
        while let Some(entry) = ctx.queue.dequeue() {
            if let Err(err) = process_entry(ctx, &entry, &mut suspended) {
                let key = entry.monitor().key();
                error!(
                    kind = %key.kind(),
                    account = %entry.address(),
                    property = key.property(),
                    holding = %key.holding(),
                    %err,
                    "unable to process funding check"
                );
            }
        }
        // Entries held back by cooldown are reconsidered on the next wake.
        // Re-enqueueing only after the full drain avoids busy re-checking
        // within the same pass.
        for entry in suspended.drain(..) {
            ctx.queue.enqueue(entry);
        }
    }
    debug!("funding worker stopped");
}

fn process_entry(
    ctx: &WorkerContext,
    entry: &Arc<MonitoredAccount>,
    suspended: &mut Vec<Arc<MonitoredAccount>>,
) -> FundingResult<()> {
    let monitor = entry.monitor();
    let key = monitor.key();

    let target = ctx.ledger.account(entry.account_id())?;
    let funding = ctx.ledger.account(key.funding_account())?;
    let Some(target) = target else {
        error!(account = %entry.address(), "monitored account no longer exists");
        return Ok(());
    };
    let Some(funding) = funding else {
        error!(account = %monitor.funding_address(), "funding account no longer exists");
        return Ok(());
    };

    let state = entry.funding_state();
    let height = ctx.ledger.height();
    if height.saturating_sub(state.last_funded_height) < state.params.interval {
        suspended.push(Arc::clone(entry));
        return Ok(());
    }

    match key.kind() {
        HoldingKind::Coin => fund_coin(ctx, entry, target, funding, state.params.amount, state.params.threshold),
        HoldingKind::Asset => {
            let payload = TransferPayload::Asset {
                asset: key.holding(),
                quantity: state.params.amount,
            };
            fund_holding(ctx, entry, target, funding, state.params, payload)
        }
        HoldingKind::Currency => {
            let payload = TransferPayload::Currency {
                currency: key.holding(),
                units: state.params.amount,
            };
            fund_holding(ctx, entry, target, funding, state.params, payload)
        }
    }
}

/// Native-coin funding: transfer `amount` when the target balance sits below
/// the threshold and the funding account can cover amount plus fee.
fn fund_coin(
    ctx: &WorkerContext,
    entry: &Arc<MonitoredAccount>,
    target: AccountView,
    funding: AccountView,
    amount: u64,
    threshold: u64,
) -> FundingResult<()> {
    if target.balance >= threshold {
        return Ok(());
    }
    let monitor = entry.monitor();
    let draft = TransferDraft {
        recipient: entry.account_id(),
        amount,
        payload: TransferPayload::Coin,
        timestamp: ctx.ledger.last_block_time(),
        deadline_blocks: TRANSFER_DEADLINE_BLOCKS,
    };
    let transfer = ctx.gateway.build(monitor.credential(), draft)?;

    let affordable = amount
        .checked_add(transfer.fee)
        .is_some_and(|total| total <= funding.unconfirmed_balance);
    if !affordable {
        warn!(
            funding = %monitor.funding_address(),
            "funding account has insufficient funds; funding transfer discarded"
        );
        return Ok(());
    }

    let id = transfer.id;
    ctx.gateway.broadcast(transfer)?;
    entry.record_funded(ctx.ledger.height());
    debug!(
        transfer = %id,
        amount,
        from = %monitor.funding_address(),
        to = %entry.address(),
        "coin funding transfer submitted"
    );
    Ok(())
}

/// Asset or currency funding: the moved quantity rides in the payload and the
/// fee must be covered by the funding account's unconfirmed coin balance.
fn fund_holding(
    ctx: &WorkerContext,
    entry: &Arc<MonitoredAccount>,
    target: AccountView,
    funding: AccountView,
    params: FundingParams,
    payload: TransferPayload,
) -> FundingResult<()> {
    let monitor = entry.monitor();
    let key = monitor.key();

    let funding_units = ctx
        .ledger
        .holding_balance(funding.id, key.kind(), key.holding())?;
    if funding_units < params.amount {
        warn!(
            funding = %monitor.funding_address(),
            kind = %key.kind(),
            holding = %key.holding(),
            "funding account has insufficient holding quantity; funding transfer discarded"
        );
        return Ok(());
    }

    let target_units = ctx
        .ledger
        .holding_balance(target.id, key.kind(), key.holding())?;
    if target_units >= params.threshold {
        return Ok(());
    }

    let draft = TransferDraft {
        recipient: entry.account_id(),
        amount: 0,
        payload,
        timestamp: ctx.ledger.last_block_time(),
        deadline_blocks: TRANSFER_DEADLINE_BLOCKS,
    };
    let transfer = ctx.gateway.build(monitor.credential(), draft)?;

    if transfer.fee > funding.unconfirmed_balance {
        warn!(
            funding = %monitor.funding_address(),
            "funding account has insufficient funds; funding transfer discarded"
        );
        return Ok(());
    }

    let id = transfer.id;
    ctx.gateway.broadcast(transfer)?;
    entry.record_funded(ctx.ledger.height());
    debug!(
        transfer = %id,
        quantity = params.amount,
        kind = %key.kind(),
        holding = %key.holding(),
        from = %monitor.funding_address(),
        to = %entry.address(),
        "holding funding transfer submitted"
    );
    Ok(())
}
