//! Software transaction signing
//!
//! One [`SignedTransfer`] is produced per [`PreparedTransfer`], in input order.

use crate::contract::{Network, WalletContract, WalletVersion};
use crate::keys::KeyPair;
use crate::signer::Result;
use crate::transfer::{PreparedTransfer, SignedTransfer};
use tonsign_cell::Address;

/// Reverse the messages of one W5 transfer
///
/// The W5 body builder lays out its action list so that the first message
/// is executed last. Reversing beforehand makes the wallet execute the
/// messages in the order the caller listed them. Only the order inside the
/// transfer changes.
#[must_use]
pub fn reverse_messages_for_w5(transfer: &PreparedTransfer) -> PreparedTransfer {
    let mut reversed = transfer.clone();
    reversed.messages.reverse();
    reversed
}

/// Sign `transfers` for the wallet at `address` with `key_pair`
pub fn sign_transfers(
    version: WalletVersion,
    network: Network,
    address: &Address,
    key_pair: &KeyPair,
    transfers: &[PreparedTransfer],
) -> Result<Vec<SignedTransfer>> {
    let wallet = WalletContract::new(
        version,
        network,
        address.workchain,
        *key_pair.public_key(),
        None,
    )?;

    log::debug!(
        "Signing {} transfer(s) for {version} wallet {address}",
        transfers.len()
    );

    transfers
        .iter()
        .map(|transfer| {
            log::debug!(
                "Transfer seqno={} messages={} auth={}",
                transfer.seqno,
                transfer.messages.len(),
                transfer.auth_type
            );
            if version == WalletVersion::W5 {
                wallet.sign_transfer(key_pair, &reverse_messages_for_w5(transfer))
            } else {
                wallet.sign_transfer(key_pair, transfer)
            }
        })
        .collect()
}
