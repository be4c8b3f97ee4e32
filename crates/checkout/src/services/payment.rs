//! Payment recorder.
//!
//! Records a card payment against an order the caller owns and marks the
//! order paid, in one transaction. Card number and CVV are encrypted before
//! they reach the store; holder name and expiry are stored as given.
//!
//! No amount re-validation and no card network: recording a payment is the
//! whole of "paying". A failed attempt leaves the order in `processing`.

use secrecy::ExposeSecret;
use tracing::{info, instrument};

use securecart_core::{OrderId, OrderStatus, PaymentId, UserId};

use crate::config::TransactionPolicy;
use crate::db::{CheckoutStore, StoreTx};
use crate::error::{CheckoutError, Result};
use crate::models::{CardDetails, MaskedCard, NewPaymentRecord, PaymentReceipt};
use crate::services::crypto::EncryptionService;
use crate::services::run_transaction;

/// Records payments and reads back stored cards.
#[derive(Debug, Clone)]
pub struct PaymentRecorder<S> {
    store: S,
    policy: TransactionPolicy,
    crypto: EncryptionService,
}

impl<S: CheckoutStore> PaymentRecorder<S> {
    /// Create a new payment recorder.
    #[must_use]
    pub const fn new(store: S, policy: TransactionPolicy, crypto: EncryptionService) -> Self {
        Self {
            store,
            policy,
            crypto,
        }
    }

    /// Record a payment for `order_id` and mark the order paid.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` if the order does not exist or is not the caller's
    /// - `OrderNotPayable` if the order is not in `processing`
    /// - `EncryptionFailed` if the card data cannot be encrypted
    /// - `Storage`, `Contention` or `Timeout` on store failures
    ///
    /// Nothing is written on any error.
    #[instrument(skip(self, card), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn process_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        card: &CardDetails,
    ) -> Result<PaymentReceipt> {
        let receipt = run_transaction(&self.store, &self.policy, |tx| {
            record_payment(tx, &self.crypto, user_id, order_id, card)
        })
        .await?;

        info!(payment_id = %receipt.payment_id, "Payment recorded");
        Ok(receipt)
    }

    /// The stored card behind a payment, with the number masked.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` if the payment does not exist or is not the
    /// caller's, or `EncryptionFailed` if the stored number cannot be decrypted.
    #[instrument(skip(self), fields(user_id = %user_id, payment_id = %payment_id))]
    pub async fn card_on_file(&self, user_id: UserId, payment_id: PaymentId) -> Result<MaskedCard> {
        run_transaction(&self.store, &self.policy, |tx| {
            masked_card(tx, &self.crypto, user_id, payment_id)
        })
        .await
    }
}

async fn record_payment<T: StoreTx>(
    mut tx: T,
    crypto: &EncryptionService,
    user_id: UserId,
    order_id: OrderId,
    card: &CardDetails,
) -> Result<PaymentReceipt> {
    let order = tx
        .order_for_user(order_id, user_id)
        .await?
        .ok_or(CheckoutError::OrderNotFound { order_id })?;
    if !order.status.is_payable() {
        return Err(CheckoutError::OrderNotPayable {
            order_id,
            status: order.status,
        });
    }

    let record = NewPaymentRecord {
        user_id,
        card_number: crypto.encrypt(Some(card.card_number.expose_secret()))?,
        card_holder: card.card_holder.clone(),
        expiry_date: card.expiry_date.clone(),
        cvv: crypto.encrypt(Some(card.cvv.expose_secret()))?,
    };
    let payment = tx.insert_payment(&record).await?;

    if !tx.mark_order_paid(order_id, payment.id).await? {
        return Err(CheckoutError::OrderNotFound { order_id });
    }
    tx.commit().await?;

    Ok(PaymentReceipt {
        order_id,
        payment_id: payment.id,
        status: OrderStatus::Paid,
    })
}

async fn masked_card<T: StoreTx>(
    mut tx: T,
    crypto: &EncryptionService,
    user_id: UserId,
    payment_id: PaymentId,
) -> Result<MaskedCard> {
    let payment = tx
        .payment_for_user(payment_id, user_id)
        .await?
        .ok_or(CheckoutError::PaymentNotFound)?;
    tx.commit().await?;

    let card_number = crypto
        .decrypt(payment.card_number.as_deref())?
        .map(|number| MaskedCard::mask(&number));

    Ok(MaskedCard {
        payment_id,
        card_number,
        card_holder: payment.card_holder,
        expiry_date: payment.expiry_date,
    })
}
