use bitcoin::XOnlyPublicKey;
use bitcoin::{network::Network, Script, Transaction};
use rust_decimal::{prelude::*, Decimal};

use crate::error::Error;
use crate::scripts_utils;
use crate::Result;

/// Outputs at or below this value are considered dust
const DUST_THRESHOLD_SAT: u64 = 546;

/// Checks that a transaction is not replaceable and has no locktime
fn check_non_replaceable(tx: &Transaction) -> Result<()> {
    if tx.input.iter().any(|input| input.sequence.is_rbf()) {
        return Err(Error::TxIsReplaceable {});
    }

    if tx.lock_time.to_consensus_u32() > 0 {
        return Err(Error::TxHasLocktime {});
    }

    Ok(())
}

/// Validates a slashing transaction with strict criteria
#[allow(clippy::too_many_arguments)]
fn validate_slashing_tx(
    slashing_tx: &Transaction,
    slashing_pk_script: &Script,
    slashing_rate: Decimal,
    slashing_tx_min_fee: u64,
    staking_output_value: u64,
    staker_pk: &XOnlyPublicKey,
    slashing_change_lock_time: u16,
    network: Network,
) -> Result<()> {
    if slashing_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, slashing_tx.input.len()));
    }

    check_non_replaceable(slashing_tx)?;

    if slashing_tx.output.len() != 2 {
        return Err(Error::TxOutputCountMismatch(2, slashing_tx.output.len()));
    }

    let expected_slashing_amount = (Decimal::from(staking_output_value) * slashing_rate)
        .round()
        .to_u64()
        .ok_or(Error::InvalidSlashingRate {})?;
    if slashing_tx.output[0].value.to_sat() < expected_slashing_amount {
        return Err(Error::InsufficientSlashingAmount(expected_slashing_amount));
    }

    // Verify that the first output pays to the provided slashing address.
    if slashing_tx.output[0].script_pubkey.as_script() != slashing_pk_script {
        return Err(Error::InvalidSlashingAddress {});
    }

    // Verify that the second output pays to the taproot address which locks funds for
    // slashingChangeLockTime
    // Build script based on the timelock details
    let expected_pk_script = scripts_utils::build_relative_time_lock_pk_script(
        staker_pk,
        slashing_change_lock_time,
        network,
    )?;
    if slashing_tx.output[1].script_pubkey.ne(&expected_pk_script) {
        return Err(Error::InvalidSlashingTxChangeOutputScript {});
    }

    // Check for dust outputs
    if slashing_tx
        .output
        .iter()
        .any(|out| out.value.to_sat() <= DUST_THRESHOLD_SAT)
    {
        return Err(Error::TxContainsDustOutputs {});
    }

    // Check fees
    let total_output_value: u64 = slashing_tx
        .output
        .iter()
        .map(|out| out.value.to_sat())
        .sum();
    if staking_output_value <= total_output_value {
        return Err(Error::SlashingTxOverspend {});
    }

    let calculated_fee = staking_output_value - total_output_value;
    if calculated_fee < slashing_tx_min_fee {
        return Err(Error::InsufficientSlashingFee(slashing_tx_min_fee));
    }

    Ok(())
}

/// Checks if the given rate is between the valid range i.e., (0,1) with a precision of at most 2 decimal places.
pub fn is_rate_valid(rate: Decimal) -> bool {
    // Check if the slashing rate is between 0 and 1
    if rate <= Decimal::ZERO || rate >= Decimal::ONE {
        return false;
    }

    // Multiply by 100 to move the decimal places and check if precision is at most 2 decimal places
    let multiplied_rate = rate * Decimal::ONE_HUNDRED;

    // Check if the truncated rate is equal to the original rate
    multiplied_rate == multiplied_rate.trunc()
}

/// Validates all relevant data of slashing and funding transactions.
#[allow(clippy::too_many_arguments)]
pub fn check_transactions(
    slashing_tx: &Transaction,
    funding_transaction: &Transaction,
    funding_output_idx: u32,
    slashing_tx_min_fee: u64,
    slashing_rate: Decimal,
    slashing_pk_script: &Script,
    staker_pk: &XOnlyPublicKey,
    slashing_change_lock_time: u16,
    network: Network,
) -> Result<()> {
    // Check if slashing tx min fee is valid
    if slashing_tx_min_fee == 0 {
        return Err(Error::InvalidSlashingTxMinFee {});
    }

    // Check if slashing rate is in the valid range (0,1)
    if !is_rate_valid(slashing_rate) {
        return Err(Error::InvalidSlashingRate {});
    }

    if funding_output_idx >= funding_transaction.output.len() as u32 {
        return Err(Error::InvalidFundingOutputIndex(
            funding_output_idx,
            funding_transaction.output.len(),
        ));
    }

    let staking_output = &funding_transaction.output[funding_output_idx as usize];

    // Check if slashing transaction is valid
    validate_slashing_tx(
        slashing_tx,
        slashing_pk_script,
        slashing_rate,
        slashing_tx_min_fee,
        staking_output.value.to_sat(),
        staker_pk,
        slashing_change_lock_time,
        network,
    )?;

    // Check that slashing transaction input is pointing to staking transaction
    let staking_tx_hash = funding_transaction.txid(); // Hash of the funding transaction
    if slashing_tx.input[0]
        .previous_output
        .txid
        .ne(&staking_tx_hash)
    {
        return Err(Error::StakingOutputNotSpentBySlashingTx {});
    }

    // Check that index of the funding output matches index of the input in slashing transaction
    if slashing_tx.input[0].previous_output.vout != funding_output_idx {
        return Err(Error::StakingOutputNotSpentBySlashingTx {});
    }

    Ok(())
}

/// Checks that output `output_idx` of `staking_tx` commits to `expected_pk_script`
/// and locks exactly `expected_value` satoshis
pub fn check_staking_output(
    staking_tx: &Transaction,
    output_idx: u32,
    expected_pk_script: &Script,
    expected_value: u64,
) -> Result<()> {
    let output = staking_tx
        .output
        .get(output_idx as usize)
        .ok_or(Error::InvalidFundingOutputIndex(
            output_idx,
            staking_tx.output.len(),
        ))?;
    if output.script_pubkey.as_script() != expected_pk_script {
        return Err(Error::StakingOutputScriptMismatch {});
    }
    if output.value.to_sat() != expected_value {
        return Err(Error::StakingOutputValueMismatch(
            expected_value,
            output.value.to_sat(),
        ));
    }
    Ok(())
}

/// Validates an unbonding transaction: it spends exactly the staking output,
/// is not replaceable, and pays `expected_value` to the unbonding output
pub fn check_unbonding_tx(
    unbonding_tx: &Transaction,
    staking_tx: &Transaction,
    staking_output_idx: u32,
    expected_pk_script: &Script,
    expected_value: u64,
) -> Result<()> {
    if unbonding_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, unbonding_tx.input.len()));
    }
    if unbonding_tx.output.len() != 1 {
        return Err(Error::TxOutputCountMismatch(1, unbonding_tx.output.len()));
    }
    check_non_replaceable(unbonding_tx)?;

    let prev_out = &unbonding_tx.input[0].previous_output;
    if prev_out.txid != staking_tx.txid() || prev_out.vout != staking_output_idx {
        return Err(Error::StakingOutputNotSpentByUnbondingTx {});
    }

    let output = &unbonding_tx.output[0];
    if output.script_pubkey.as_script() != expected_pk_script {
        return Err(Error::UnbondingOutputScriptMismatch {});
    }
    if output.value.to_sat() != expected_value {
        return Err(Error::UnbondingOutputValueMismatch(
            expected_value,
            output.value.to_sat(),
        ));
    }
    Ok(())
}
