pub mod payment_reconciler;
