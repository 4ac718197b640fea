use std::collections::HashSet;

use babylon_bitcoin::{deserialize, Transaction};

use cosmwasm_std::{Decimal, StdError};

use crate::btc_staking_api::{
    BtcInclusionProof, CovenantSigs, FinalityProviderDescription, NewBtcDelegation,
    NewFinalityProvider, ProofOfPossessionBtc, BIP340_SIG_TYPE, HASH_SIZE,
};
use crate::error::StakingApiError;
use crate::finality_api::Evidence;

/// BIP-340 x-only public key length
const BIP340_PK_LEN: usize = 32;
/// BIP-340 Schnorr signature length
const BIP340_SIG_LEN: usize = 64;

/// A trait for validating the API structs / input.
pub trait Validate {
    fn validate(&self) -> Result<(), StakingApiError>;
}

fn validate_btc_pk_hex(pk_hex: &str) -> Result<(), StakingApiError> {
    if pk_hex.is_empty() {
        return Err(StakingApiError::EmptyBtcPk);
    }
    let pk = hex::decode(pk_hex)?;
    if pk.len() != BIP340_PK_LEN {
        return Err(StakingApiError::InvalidBtcPk(pk_hex.to_string()));
    }
    Ok(())
}

fn validate_sig(sig: &[u8]) -> Result<(), StakingApiError> {
    if sig.is_empty() {
        return Err(StakingApiError::EmptySignature);
    }
    if sig.len() != BIP340_SIG_LEN {
        return Err(StakingApiError::InvalidSignatureLength(
            BIP340_SIG_LEN,
            sig.len(),
        ));
    }
    Ok(())
}

fn validate_tx(tx: &[u8], empty: StakingApiError) -> Result<(), StakingApiError> {
    if tx.is_empty() {
        return Err(empty);
    }
    let _: Transaction = deserialize(tx).map_err(|e| {
        StakingApiError::Std(StdError::generic_err(format!("Invalid BTC tx: {e}")))
    })?;
    Ok(())
}

impl Validate for NewFinalityProvider {
    fn validate(&self) -> Result<(), StakingApiError> {
        self.description
            .as_ref()
            .map(FinalityProviderDescription::validate)
            .transpose()?;

        validate_btc_pk_hex(&self.btc_pk_hex)?;

        match self.pop {
            Some(ref pop) => pop.validate()?,
            None => return Err(StakingApiError::MissingPop),
        }

        if self.commission > Decimal::one() {
            return Err(StakingApiError::InvalidCommission(
                self.commission.to_string(),
            ));
        }

        if self.consumer_id.is_empty() {
            return Err(StakingApiError::EmptyChainId);
        }

        Ok(())
    }
}

impl Validate for FinalityProviderDescription {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.moniker.is_empty() {
            return Err(StakingApiError::description_err("Moniker cannot be empty"));
        }
        if self.moniker.len() > FinalityProviderDescription::MAX_MONIKER_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid moniker length; got: {}, max: {}",
                self.moniker.len(),
                FinalityProviderDescription::MAX_MONIKER_LENGTH
            )));
        }

        if self.identity.len() > FinalityProviderDescription::MAX_IDENTITY_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid identity length; got: {}, max: {}",
                self.identity.len(),
                FinalityProviderDescription::MAX_IDENTITY_LENGTH
            )));
        }

        if self.website.len() > FinalityProviderDescription::MAX_WEBSITE_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid website length; got: {}, max: {}",
                self.website.len(),
                FinalityProviderDescription::MAX_WEBSITE_LENGTH
            )));
        }

        if self.security_contact.len() > FinalityProviderDescription::MAX_SECURITY_CONTACT_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid security contact length; got: {}, max: {}",
                self.security_contact.len(),
                FinalityProviderDescription::MAX_SECURITY_CONTACT_LENGTH
            )));
        }

        if self.details.len() > FinalityProviderDescription::MAX_DETAILS_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid details length; got: {}, max: {}",
                self.details.len(),
                FinalityProviderDescription::MAX_DETAILS_LENGTH
            )));
        }

        Ok(())
    }
}

impl Validate for ProofOfPossessionBtc {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.btc_sig_type != BIP340_SIG_TYPE {
            return Err(StakingApiError::InvalidPopSigType(self.btc_sig_type));
        }
        validate_sig(&self.btc_sig)
    }
}

impl Validate for BtcInclusionProof {
    fn validate(&self) -> Result<(), StakingApiError> {
        let hash = hex::decode(&self.block_hash_hex)?;
        if hash.len() != HASH_SIZE {
            return Err(StakingApiError::Std(StdError::generic_err(
                "Invalid block hash length",
            )));
        }
        if self.merkle_path.len() % HASH_SIZE != 0 {
            return Err(StakingApiError::Std(StdError::generic_err(
                "Merkle path is not a sequence of 32-byte hashes",
            )));
        }
        Ok(())
    }
}

impl Validate for NewBtcDelegation {
    fn validate(&self) -> Result<(), StakingApiError> {
        validate_btc_pk_hex(&self.btc_pk_hex)?;
        self.pop.validate()?;

        // Ensure the list of finality provider BTC PKs is not empty nor duplicated
        if self.fp_btc_pk_list.is_empty() {
            return Err(StakingApiError::EmptyBtcPkList);
        }
        let mut fp_btc_pk_set = HashSet::new();
        for fp_btc_pk in &self.fp_btc_pk_list {
            validate_btc_pk_hex(fp_btc_pk)?;
            if !fp_btc_pk_set.insert(fp_btc_pk) {
                return Err(StakingApiError::DuplicatedBtcPk(fp_btc_pk.clone()));
            }
        }

        if self.staking_time > u16::MAX as u32 {
            return Err(StakingApiError::ErrInvalidStakingTime(
                self.staking_time,
                u16::MAX as u32,
            ));
        }
        if self.unbonding_time > u16::MAX as u32 {
            return Err(StakingApiError::ErrInvalidUnbondingTime(
                self.unbonding_time,
                u16::MAX as u32,
            ));
        }
        if self.unbonding_value >= self.staking_value {
            return Err(StakingApiError::ErrInvalidUnbondingValue(
                self.unbonding_value,
                self.staking_value,
            ));
        }

        validate_tx(&self.staking_tx, StakingApiError::EmptyStakingTx)?;
        validate_tx(&self.slashing_tx, StakingApiError::EmptySlashingTx)?;
        validate_tx(&self.unbonding_tx, StakingApiError::EmptyUnbondingTx)?;
        validate_tx(&self.unbonding_slashing_tx, StakingApiError::EmptySlashingTx)?;

        validate_sig(&self.delegator_slashing_sig)?;
        validate_sig(&self.delegator_unbonding_slashing_sig)?;

        self.staking_tx_inclusion_proof
            .as_ref()
            .map(BtcInclusionProof::validate)
            .transpose()?;

        Ok(())
    }
}

impl Validate for CovenantSigs {
    fn validate(&self) -> Result<(), StakingApiError> {
        validate_btc_pk_hex(&self.pk_hex)?;
        if self.staking_tx_hash_hex.len() != HASH_SIZE * 2 {
            return Err(StakingApiError::InvalidStakingTxHash(HASH_SIZE * 2));
        }
        if self.slashing_tx_sigs.is_empty() {
            return Err(StakingApiError::EmptySignature);
        }
        validate_sig(&self.unbonding_tx_sig)?;
        if let Some(sig) = &self.stake_expansion_tx_sig {
            validate_sig(sig)?;
        }
        Ok(())
    }
}

impl Validate for Evidence {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.fp_btc_pk.len() != BIP340_PK_LEN {
            return Err(StakingApiError::InvalidBtcPk(hex::encode(&self.fp_btc_pk)));
        }
        if self.pub_rand.len() != BIP340_PK_LEN {
            return Err(StakingApiError::InvalidEvidence(
                "invalid public randomness length".to_string(),
            ));
        }
        if self.canonical_app_hash == self.fork_app_hash {
            return Err(StakingApiError::InvalidEvidence(
                "the two blocks are the same".to_string(),
            ));
        }
        if self.canonical_finality_sig.len() != 32 || self.fork_finality_sig.len() != 32 {
            return Err(StakingApiError::InvalidEvidence(
                "invalid finality signature length".to_string(),
            ));
        }
        Ok(())
    }
}
